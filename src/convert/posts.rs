//! Post conversion: link per-language post variants into translation groups
//! and repoint taxonomy references onto canonical terms.
//!
//! Unlike terms, posts are never merged. Every language variant is real
//! content and stays a row of its own; conversion tags each post with its
//! language and records the variants of one article together in a
//! `post_translations` group. A post's taxonomy references are resolved
//! against the canonical ids recorded by the term converter before the post
//! is linked; a post carrying a reference the term converter never resolved
//! is reported and skipped whole, so no half-converted item is left behind.

use std::collections::BTreeMap;

use crate::convert::{
    ConvertState, GroupKind, Registration, ensure_language, normalize_language,
    register_group_member,
};
use crate::error::Result;
use crate::gateway::Gateway;
use crate::output::{Reporter, Warning};

#[derive(Debug)]
pub struct PostReport {
    /// Posts newly linked into a group this run.
    pub posts_converted: usize,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    title: String,
    language: String,
    key: String,
}

pub fn convert_posts(
    gateway: &mut Gateway,
    state: &mut ConvertState,
    reporter: Reporter,
) -> Result<PostReport> {
    let posts = load_posts(gateway, state)?;
    // Snapshot taken before any linking so the rewrite never sees the
    // language relationships inserted below. Keeps the statement sequence
    // identical between dry and live runs.
    let mut references = load_references(gateway, state)?;

    let mut report = PostReport {
        posts_converted: 0,
        warnings: Vec::new(),
    };

    for post in &posts {
        let refs = references.remove(&post.id).unwrap_or_default();

        // An unresolved reference means the term data behind this post is
        // malformed; converting the post anyway would half-attach it. The
        // whole item is skipped and reported for manual remediation.
        if let Some(&unresolved) = refs.iter().find(|&&t| state.canonical_term(t).is_none()) {
            let warning = Warning::new(
                "posts",
                format!(
                    "post '{}' references unknown term {}; skipping item",
                    post.title, unresolved
                ),
            )
            .legacy_id(post.id)
            .group_key(post.key.clone())
            .language(post.language.clone());
            reporter.warn(&warning);
            report.warnings.push(warning);
            continue;
        }

        link_post(gateway, state, reporter, post, &mut report)?;
        rewrite_references(gateway, state, reporter, post.id, &refs, &mut report)?;
    }

    // Relationship rows whose object matches no post row are dangling
    // legacy data; they are still repointed so nothing keeps referencing a
    // merged term.
    for (object_id, refs) in references {
        rewrite_references(gateway, state, reporter, object_id, &refs, &mut report)?;
    }

    Ok(report)
}

fn link_post(
    gateway: &mut Gateway,
    state: &mut ConvertState,
    reporter: Reporter,
    post: &PostRow,
    report: &mut PostReport,
) -> Result<()> {
    let language_term = ensure_language(gateway, state, &post.language)?;

    let registration = register_group_member(
        gateway,
        state,
        GroupKind::Post,
        &post.key,
        &post.language,
        post.id,
    )?;

    match registration {
        Registration::Added => report.posts_converted += 1,
        Registration::AlreadyPresent => {}
        Registration::DuplicateLanguage { existing } => {
            let warning = Warning::new(
                "posts",
                format!(
                    "post '{}' duplicates language '{}' in group '{}'; keeping post {}",
                    post.title, post.language, post.key, existing
                ),
            )
            .legacy_id(post.id)
            .group_key(post.key.clone())
            .language(post.language.clone());
            reporter.warn(&warning);
            report.warnings.push(warning);
            return Ok(());
        }
    }

    // Idempotent under re-runs; the relationship key is (object, term).
    let sql = format!(
        "INSERT OR IGNORE INTO {}term_relationships (object_id, term_id) VALUES (?1, ?2)",
        state.prefixes().new
    );
    gateway.execute(
        &format!("tag post {} with language '{}'", post.id, post.language),
        &sql,
        &[post.id.into(), language_term.into()],
    )?;
    Ok(())
}

/// Repoint one object's references from merged term duplicates at the
/// canonical term. Unresolved references can only occur here for dangling
/// relationship rows; posts are checked before they are linked.
fn rewrite_references(
    gateway: &mut Gateway,
    state: &ConvertState,
    reporter: Reporter,
    object_id: i64,
    refs: &[i64],
    report: &mut PostReport,
) -> Result<()> {
    let prefix = state.prefixes().new.clone();
    for &term_id in refs {
        match state.canonical_term(term_id) {
            Some(canonical) if canonical == term_id => {}
            Some(canonical) => {
                gateway.execute(
                    &format!(
                        "detach post {} from merged term {}",
                        object_id, term_id
                    ),
                    &format!(
                        "DELETE FROM {prefix}term_relationships
                         WHERE object_id = ?1 AND term_id = ?2"
                    ),
                    &[object_id.into(), term_id.into()],
                )?;
                // OR IGNORE: the post may already carry the canonical term
                // through another language variant's relationship.
                gateway.execute(
                    &format!(
                        "attach post {} to canonical term {}",
                        object_id, canonical
                    ),
                    &format!(
                        "INSERT OR IGNORE INTO {prefix}term_relationships (object_id, term_id)
                         VALUES (?1, ?2)"
                    ),
                    &[object_id.into(), canonical.into()],
                )?;
            }
            None => {
                let warning = Warning::new(
                    "posts",
                    format!(
                        "object {} references unknown term {}; relationship left untouched",
                        object_id, term_id
                    ),
                )
                .legacy_id(object_id);
                reporter.warn(&warning);
                report.warnings.push(warning);
            }
        }
    }
    Ok(())
}

fn load_posts(gateway: &Gateway, state: &ConvertState) -> Result<Vec<PostRow>> {
    let sql = format!(
        "SELECT ID, post_title, language_code, translation_key
         FROM {}posts ORDER BY ID",
        state.prefixes().new
    );
    let conn = gateway.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let language: String = row.get(2)?;
            let key: String = row.get(3)?;
            Ok(PostRow {
                id,
                title: row.get(1)?,
                language: normalize_language(&language),
                // Ungrouped posts form singleton groups so every post gets
                // a language tag even without translations.
                key: if key.is_empty() {
                    format!("post-{id}")
                } else {
                    key
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Content relationships grouped by object, in a fixed order. Rows pointing
/// at language or bookkeeping terms from an earlier run are not rewrite
/// candidates.
fn load_references(
    gateway: &Gateway,
    state: &ConvertState,
) -> Result<BTreeMap<i64, Vec<i64>>> {
    let sql = format!(
        "SELECT object_id, term_id FROM {}term_relationships ORDER BY object_id, term_id",
        state.prefixes().new
    );
    let conn = gateway.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<(i64, i64)>, _>>()?;

    let mut references: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for (object_id, term_id) in rows {
        if state.is_structural(term_id) {
            continue;
        }
        references.entry(object_id).or_default().push(term_id);
    }
    Ok(references)
}
