//! Shared conversion state for one orchestrator invocation.
//!
//! Language and translation-group lookups are loaded from the database once
//! at the start of convert mode and then kept in memory, owned by the
//! converter instances. Nothing here is process-global, so repeated runs
//! (and tests) never leak state between them.

pub mod posts;
pub mod terms;

use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::Connection;

use crate::config::{PrefixConfig, UNKNOWN_LANGUAGE};
use crate::error::{ConvertError, Result};
use crate::gateway::Gateway;

pub const LANGUAGE_TAXONOMY: &str = "language";
pub const TERM_GROUP_TAXONOMY: &str = "term_translations";
pub const POST_GROUP_TAXONOMY: &str = "post_translations";

/// Taxonomies that hold converter bookkeeping rather than site content.
pub const STRUCTURAL_TAXONOMIES: &[&str] =
    &[LANGUAGE_TAXONOMY, TERM_GROUP_TAXONOMY, POST_GROUP_TAXONOMY];

/// Map a raw legacy language attribute to a language code. Empty or
/// unrecognizable values become the synthetic "unknown" language so the
/// record is converted rather than dropped.
pub fn normalize_language(raw: &str) -> String {
    let code: String = raw
        .trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if code.is_empty() || code.len() > 10 {
        UNKNOWN_LANGUAGE.to_string()
    } else {
        code
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Term,
    Post,
}

impl GroupKind {
    pub fn taxonomy(self) -> &'static str {
        match self {
            Self::Term => TERM_GROUP_TAXONOMY,
            Self::Post => POST_GROUP_TAXONOMY,
        }
    }
}

/// One translation group: the bookkeeping term that represents it and the
/// language -> target-id membership map stored in that term's description.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub group_term_id: i64,
    pub members: BTreeMap<String, i64>,
}

/// Outcome of registering a (language, target) pair in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// Same language, same target: an already-converted record on a re-run.
    AlreadyPresent,
    /// Same language, different target: malformed source data. The caller
    /// reports it and skips the record; the existing member wins.
    DuplicateLanguage { existing: i64 },
}

#[derive(Debug)]
pub struct ConvertState {
    prefixes: PrefixConfig,
    default_language: String,
    languages: BTreeMap<String, i64>,
    term_groups: BTreeMap<String, GroupEntry>,
    post_groups: BTreeMap<String, GroupEntry>,
    /// Copied legacy term id -> canonical target term id.
    term_id_map: HashMap<i64, i64>,
    /// Term ids of language and group bookkeeping terms.
    structural_ids: HashSet<i64>,
    next_placeholder: i64,
    pub languages_created: usize,
    pub groups_created: usize,
}

impl ConvertState {
    /// Load pre-existing language tags and translation groups so a second
    /// run over an already-converted database creates no duplicates.
    pub fn load(
        conn: &Connection,
        prefixes: &PrefixConfig,
        default_language: &str,
    ) -> Result<Self> {
        let mut state = Self {
            prefixes: prefixes.clone(),
            default_language: normalize_language(default_language),
            languages: BTreeMap::new(),
            term_groups: BTreeMap::new(),
            post_groups: BTreeMap::new(),
            term_id_map: HashMap::new(),
            structural_ids: HashSet::new(),
            next_placeholder: 0,
            languages_created: 0,
            groups_created: 0,
        };

        let sql = format!(
            "SELECT term_id, slug, taxonomy, description FROM {}terms
             WHERE taxonomy IN ('{LANGUAGE_TAXONOMY}', '{TERM_GROUP_TAXONOMY}', '{POST_GROUP_TAXONOMY}')
             ORDER BY term_id",
            prefixes.new
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<(i64, String, String, String)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (term_id, slug, taxonomy, description) in rows {
            state.structural_ids.insert(term_id);
            match taxonomy.as_str() {
                LANGUAGE_TAXONOMY => {
                    state.languages.insert(slug, term_id);
                }
                _ => {
                    // A group description that no longer parses means the
                    // bookkeeping can't be trusted; continuing would pick a
                    // fresh canonical and rewrite the map. Abort instead.
                    let members: BTreeMap<String, i64> = serde_json::from_str(&description)
                        .map_err(|e| {
                            ConvertError::CorruptGroup(slug.clone(), e.to_string())
                        })?;
                    let groups = if taxonomy == TERM_GROUP_TAXONOMY {
                        // Canonical term ids resolve to themselves on re-runs.
                        for id in members.values() {
                            state.term_id_map.insert(*id, *id);
                        }
                        &mut state.term_groups
                    } else {
                        &mut state.post_groups
                    };
                    groups.insert(
                        slug,
                        GroupEntry {
                            group_term_id: term_id,
                            members,
                        },
                    );
                }
            }
        }

        Ok(state)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn prefixes(&self) -> &PrefixConfig {
        &self.prefixes
    }

    /// Synthetic id for dry runs, where the gateway returns no generated id.
    /// Negative so it can never collide with a real rowid.
    pub fn placeholder_id(&mut self) -> i64 {
        self.next_placeholder -= 1;
        self.next_placeholder
    }

    pub fn is_structural(&self, term_id: i64) -> bool {
        self.structural_ids.contains(&term_id)
    }

    pub fn canonical_term(&self, term_id: i64) -> Option<i64> {
        self.term_id_map.get(&term_id).copied()
    }

    pub fn map_term(&mut self, legacy_id: i64, canonical_id: i64) {
        self.term_id_map.insert(legacy_id, canonical_id);
    }

    pub fn group(&self, kind: GroupKind, key: &str) -> Option<&GroupEntry> {
        match kind {
            GroupKind::Term => self.term_groups.get(key),
            GroupKind::Post => self.post_groups.get(key),
        }
    }
}

/// Get-or-create the language tag for a normalized code. Created lazily on
/// first encounter, reused for the rest of the run.
pub fn ensure_language(gateway: &mut Gateway, state: &mut ConvertState, code: &str) -> Result<i64> {
    if let Some(id) = state.languages.get(code) {
        return Ok(*id);
    }
    let sql = format!(
        "INSERT INTO {}terms (name, slug, taxonomy) VALUES (?1, ?1, '{LANGUAGE_TAXONOMY}')",
        state.prefixes.new
    );
    let id = gateway
        .insert(&format!("create language tag '{code}'"), &sql, &[code.into()])?
        .unwrap_or_else(|| state.placeholder_id());
    state.languages.insert(code.to_string(), id);
    state.structural_ids.insert(id);
    state.languages_created += 1;
    Ok(id)
}

/// Register `target_id` as the group's member for `language`, creating the
/// group term on first sight and persisting the membership map in its
/// description.
pub fn register_group_member(
    gateway: &mut Gateway,
    state: &mut ConvertState,
    kind: GroupKind,
    key: &str,
    language: &str,
    target_id: i64,
) -> Result<Registration> {
    let groups = match kind {
        GroupKind::Term => &mut state.term_groups,
        GroupKind::Post => &mut state.post_groups,
    };

    if let Some(entry) = groups.get_mut(key) {
        match entry.members.get(language) {
            Some(&existing) if existing == target_id => Ok(Registration::AlreadyPresent),
            Some(&existing) => Ok(Registration::DuplicateLanguage { existing }),
            None => {
                entry.members.insert(language.to_string(), target_id);
                let description = serde_json::to_string(&entry.members)?;
                let sql = format!(
                    "UPDATE {}terms SET description = ?1 WHERE term_id = ?2",
                    state.prefixes.new
                );
                gateway.execute(
                    &format!("add '{language}' to {} group '{key}'", kind.taxonomy()),
                    &sql,
                    &[description.into(), entry.group_term_id.into()],
                )?;
                Ok(Registration::Added)
            }
        }
    } else {
        let mut members = BTreeMap::new();
        members.insert(language.to_string(), target_id);
        let description = serde_json::to_string(&members)?;
        let sql = format!(
            "INSERT INTO {}terms (name, slug, taxonomy, description) VALUES (?1, ?1, '{}', ?2)",
            state.prefixes.new,
            kind.taxonomy()
        );
        let group_term_id = gateway
            .insert(
                &format!("create {} group '{key}'", kind.taxonomy()),
                &sql,
                &[key.into(), description.into()],
            )?
            .unwrap_or_else(|| state.placeholder_id());

        state.structural_ids.insert(group_term_id);
        let groups = match kind {
            GroupKind::Term => &mut state.term_groups,
            GroupKind::Post => &mut state.post_groups,
        };
        groups.insert(
            key.to_string(),
            GroupEntry {
                group_term_id,
                members,
            },
        );
        state.groups_created += 1;
        Ok(Registration::Added)
    }
}
