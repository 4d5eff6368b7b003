//! Declarative table transforms for the prepare step.
//!
//! Each legacy SMK table maps to one target table: a DDL template, a list of
//! column mappings (legacy expression -> target column) and any added
//! target-required columns with fixed defaults. Legacy-only columns are
//! dropped by omission. The remapper evaluates these generically; nothing
//! here is per-table procedural code.

pub mod remap;

use crate::config::PrefixConfig;

/// Which prefix family the target table belongs to. The target platform
/// keeps user data under a different naming convention than content data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Content,
    User,
}

/// One column mapping. `source` is a SQL expression over the legacy table
/// (usually a bare column name, sometimes wrapped in COALESCE so NOT NULL
/// target columns are satisfied).
#[derive(Debug, Clone, Copy)]
pub struct ColumnMap {
    pub source: &'static str,
    pub target: &'static str,
}

/// A target column that has no legacy counterpart and is populated with a
/// fixed SQL literal during the copy.
#[derive(Debug, Clone, Copy)]
pub struct DefaultColumn {
    pub column: &'static str,
    pub value: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TableTransform {
    /// Legacy table name without prefix.
    pub source: &'static str,
    /// Target table name without prefix.
    pub target: &'static str,
    pub kind: TargetKind,
    /// CREATE TABLE template; `{table}` is replaced with the prefixed name.
    pub ddl: &'static str,
    pub columns: &'static [ColumnMap],
    pub defaults: &'static [DefaultColumn],
}

impl TableTransform {
    pub fn source_table(&self, prefixes: &PrefixConfig) -> String {
        format!("{}{}", prefixes.old, self.source)
    }

    pub fn target_table(&self, prefixes: &PrefixConfig) -> String {
        let prefix = match self.kind {
            TargetKind::Content => &prefixes.new,
            TargetKind::User => &prefixes.user,
        };
        format!("{prefix}{}", self.target)
    }

    pub fn create_sql(&self, prefixes: &PrefixConfig) -> String {
        self.ddl.replace("{table}", &self.target_table(prefixes))
    }

    /// `INSERT INTO target (..) SELECT .. FROM source`, primary keys copied
    /// verbatim so foreign-key references stay valid without an
    /// id-translation table.
    pub fn copy_sql(&self, prefixes: &PrefixConfig) -> String {
        let mut targets: Vec<&str> = self.columns.iter().map(|c| c.target).collect();
        let mut sources: Vec<&str> = self.columns.iter().map(|c| c.source).collect();
        for d in self.defaults {
            targets.push(d.column);
            sources.push(d.value);
        }
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.target_table(prefixes),
            targets.join(", "),
            sources.join(", "),
            self.source_table(prefixes)
        )
    }
}

/// The full transform set, in copy order. Relationship rows are copied after
/// the tables they reference.
pub const TRANSFORMS: &[TableTransform] = &[
    TableTransform {
        source: "story",
        target: "posts",
        kind: TargetKind::Content,
        ddl: "CREATE TABLE {table} (
            ID INTEGER PRIMARY KEY,
            post_title TEXT NOT NULL,
            post_content TEXT NOT NULL DEFAULT '',
            post_status TEXT NOT NULL DEFAULT 'publish',
            post_date TEXT NOT NULL DEFAULT '',
            post_author INTEGER NOT NULL DEFAULT 0,
            language_code TEXT NOT NULL DEFAULT '',
            translation_key TEXT NOT NULL DEFAULT ''
        )",
        // legacy_layout is legacy-only and dropped.
        columns: &[
            ColumnMap { source: "story_id", target: "ID" },
            ColumnMap { source: "headline", target: "post_title" },
            ColumnMap { source: "COALESCE(body, '')", target: "post_content" },
            ColumnMap { source: "COALESCE(state, 'publish')", target: "post_status" },
            ColumnMap { source: "COALESCE(created_at, '')", target: "post_date" },
            ColumnMap { source: "COALESCE(author_id, 0)", target: "post_author" },
            ColumnMap { source: "COALESCE(language, '')", target: "language_code" },
            ColumnMap { source: "COALESCE(translation_key, '')", target: "translation_key" },
        ],
        defaults: &[],
    },
    TableTransform {
        source: "label",
        target: "terms",
        kind: TargetKind::Content,
        ddl: "CREATE TABLE {table} (
            term_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            taxonomy TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            language_code TEXT NOT NULL DEFAULT '',
            translation_key TEXT NOT NULL DEFAULT ''
        )",
        columns: &[
            ColumnMap { source: "label_id", target: "term_id" },
            ColumnMap { source: "caption", target: "name" },
            ColumnMap { source: "slug", target: "slug" },
            ColumnMap { source: "kind", target: "taxonomy" },
            ColumnMap { source: "COALESCE(language, '')", target: "language_code" },
            ColumnMap { source: "COALESCE(translation_key, '')", target: "translation_key" },
        ],
        defaults: &[],
    },
    TableTransform {
        source: "story_label",
        target: "term_relationships",
        kind: TargetKind::Content,
        ddl: "CREATE TABLE {table} (
            object_id INTEGER NOT NULL,
            term_id INTEGER NOT NULL,
            PRIMARY KEY (object_id, term_id)
        )",
        columns: &[
            ColumnMap { source: "story_id", target: "object_id" },
            ColumnMap { source: "label_id", target: "term_id" },
        ],
        defaults: &[],
    },
    TableTransform {
        source: "settings",
        target: "options",
        kind: TargetKind::Content,
        ddl: "CREATE TABLE {table} (
            option_id INTEGER PRIMARY KEY AUTOINCREMENT,
            option_name TEXT NOT NULL UNIQUE,
            option_value TEXT NOT NULL DEFAULT ''
        )",
        columns: &[
            ColumnMap { source: "name", target: "option_name" },
            ColumnMap { source: "COALESCE(value, '')", target: "option_value" },
        ],
        defaults: &[],
    },
    TableTransform {
        source: "account",
        target: "users",
        kind: TargetKind::User,
        ddl: "CREATE TABLE {table} (
            ID INTEGER PRIMARY KEY,
            user_login TEXT NOT NULL,
            user_pass TEXT NOT NULL,
            user_email TEXT NOT NULL DEFAULT '',
            user_registered TEXT NOT NULL DEFAULT '',
            display_name TEXT NOT NULL DEFAULT '',
            user_status INTEGER NOT NULL DEFAULT 0
        )",
        // access_level is legacy-only and dropped; user_status has no legacy
        // counterpart and defaults to 0 (active).
        columns: &[
            ColumnMap { source: "account_id", target: "ID" },
            ColumnMap { source: "username", target: "user_login" },
            ColumnMap { source: "password_hash", target: "user_pass" },
            ColumnMap { source: "COALESCE(email, '')", target: "user_email" },
            ColumnMap { source: "COALESCE(signup_date, '')", target: "user_registered" },
            ColumnMap { source: "COALESCE(real_name, username)", target: "display_name" },
        ],
        defaults: &[DefaultColumn { column: "user_status", value: "0" }],
    },
];
