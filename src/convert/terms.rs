//! Term conversion: merge per-language duplicates of one taxonomy concept
//! into a single canonical term.
//!
//! Legacy taxonomies carry one term row per language for what should be one
//! entry. For each translation-key group exactly one row survives as the
//! canonical term (keeping its primary key, so existing references stay
//! resolvable), every language in the group is registered against it in a
//! `term_translations` group, and the merged duplicates are removed. The
//! legacy-id -> canonical-id mapping feeds the post converter's taxonomy
//! reference rewrite.

use std::collections::BTreeMap;

use crate::convert::{
    ConvertState, GroupKind, STRUCTURAL_TAXONOMIES, ensure_language, normalize_language,
    register_group_member,
};
use crate::error::Result;
use crate::gateway::Gateway;
use crate::output::{Reporter, Warning};

#[derive(Debug)]
pub struct TermReport {
    /// Canonical terms established this run (one per new group).
    pub terms_converted: usize,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
struct TermRow {
    id: i64,
    name: String,
    language: String,
    key: String,
}

pub fn convert_terms(
    gateway: &mut Gateway,
    state: &mut ConvertState,
    reporter: Reporter,
) -> Result<TermReport> {
    let rows = load_content_terms(gateway, state)?;
    let groups = group_rows(rows);

    let mut report = TermReport {
        terms_converted: 0,
        warnings: Vec::new(),
    };

    for (key, mut members) in groups {
        // Deterministic canonical choice: the configured default language
        // first, then the lexicographically smallest language code, then
        // the lowest id. Repeated runs always pick the same variant.
        let default = state.default_language().to_string();
        members.sort_by_key(|row| (row.language != default, row.language.clone(), row.id));

        let existing_canonical = state
            .group(GroupKind::Term, &key)
            .and_then(|entry| entry.members.values().next().copied());

        let canonical_id = match existing_canonical {
            Some(id) => id,
            None => {
                report.terms_converted += 1;
                members[0].id
            }
        };

        for row in &members {
            let already_member = state
                .group(GroupKind::Term, &key)
                .is_some_and(|entry| entry.members.contains_key(&row.language));

            if already_member {
                if row.id == canonical_id {
                    // Canonical row revisited on a re-run.
                    state.map_term(row.id, canonical_id);
                    continue;
                }
                // Two "same" terms claiming the same language: malformed
                // source data. Keep the existing member, report, skip.
                let warning = Warning::new(
                    "terms",
                    format!(
                        "term '{}' duplicates language '{}' in group '{}'; keeping term {}",
                        row.name, row.language, key, canonical_id
                    ),
                )
                .legacy_id(row.id)
                .group_key(key.clone())
                .language(row.language.clone());
                reporter.warn(&warning);
                report.warnings.push(warning);
                continue;
            }

            let language_term = ensure_language(gateway, state, &row.language)?;
            register_group_member(
                gateway,
                state,
                GroupKind::Term,
                &key,
                &row.language,
                canonical_id,
            )?;
            state.map_term(row.id, canonical_id);

            if row.id == canonical_id {
                // The surviving variant is tagged with its own language; the
                // other languages live in the group membership map.
                let sql = format!(
                    "INSERT OR IGNORE INTO {}term_relationships (object_id, term_id)
                     VALUES (?1, ?2)",
                    state.prefixes().new
                );
                gateway.execute(
                    &format!("tag term {} with language '{}'", canonical_id, row.language),
                    &sql,
                    &[canonical_id.into(), language_term.into()],
                )?;
            } else {
                merge_duplicate(gateway, state, row, canonical_id, &key)?;
            }
        }
    }

    Ok(report)
}

/// Content taxonomy rows still carrying legacy language attributes, in a
/// fixed order so grouping and canonical choice are reproducible.
fn load_content_terms(gateway: &Gateway, state: &ConvertState) -> Result<Vec<TermRow>> {
    let quoted: Vec<String> = STRUCTURAL_TAXONOMIES
        .iter()
        .map(|t| format!("'{t}'"))
        .collect();
    let sql = format!(
        "SELECT term_id, name, slug, language_code, translation_key
         FROM {}terms WHERE taxonomy NOT IN ({}) ORDER BY term_id",
        state.prefixes().new,
        quoted.join(", ")
    );
    let conn = gateway.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let slug: String = row.get(2)?;
            let language: String = row.get(3)?;
            let key: String = row.get(4)?;
            Ok(TermRow {
                id: row.get(0)?,
                name: row.get(1)?,
                language: normalize_language(&language),
                // Ungrouped terms convert as singleton groups keyed by
                // their own slug, so nothing is silently lost.
                key: if key.is_empty() { slug } else { key },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn group_rows(rows: Vec<TermRow>) -> BTreeMap<String, Vec<TermRow>> {
    let mut groups: BTreeMap<String, Vec<TermRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.key.clone()).or_default().push(row);
    }
    groups
}

/// Remove a merged per-language duplicate. Its relationships are rewritten
/// to the canonical id by the post converter using the recorded mapping.
fn merge_duplicate(
    gateway: &mut Gateway,
    state: &ConvertState,
    row: &TermRow,
    canonical_id: i64,
    key: &str,
) -> Result<()> {
    let sql = format!(
        "DELETE FROM {}terms WHERE term_id = ?1",
        state.prefixes().new
    );
    gateway.execute(
        &format!(
            "merge term {} ('{}', group '{}') into canonical term {}",
            row.id, row.name, key, canonical_id
        ),
        &sql,
        &[row.id.into()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrefixConfig;
    use crate::output::Format;

    fn prefixes() -> PrefixConfig {
        PrefixConfig {
            old: "smk_".to_string(),
            new: "wp_".to_string(),
            user: "wpu_".to_string(),
        }
    }

    fn gateway() -> Gateway {
        let gw = Gateway::open_memory(false, Reporter::new(Format::Json)).unwrap();
        gw.conn()
            .execute_batch(
                "CREATE TABLE wp_terms (
                    term_id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    slug TEXT NOT NULL,
                    taxonomy TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    language_code TEXT NOT NULL DEFAULT '',
                    translation_key TEXT NOT NULL DEFAULT ''
                );
                CREATE TABLE wp_term_relationships (
                    object_id INTEGER NOT NULL,
                    term_id INTEGER NOT NULL,
                    PRIMARY KEY (object_id, term_id)
                );",
            )
            .unwrap();
        gw
    }

    fn seed_term(gw: &Gateway, id: i64, name: &str, slug: &str, lang: &str, key: &str) {
        gw.conn()
            .execute(
                "INSERT INTO wp_terms (term_id, name, slug, taxonomy, language_code, translation_key)
                 VALUES (?1, ?2, ?3, 'category', ?4, ?5)",
                rusqlite::params![id, name, slug, lang, key],
            )
            .unwrap();
    }

    fn state(gw: &Gateway, default_language: &str) -> ConvertState {
        ConvertState::load(gw.conn(), &prefixes(), default_language).unwrap()
    }

    fn run(gw: &mut Gateway, st: &mut ConvertState) -> TermReport {
        convert_terms(gw, st, Reporter::new(Format::Json)).unwrap()
    }

    fn count(gw: &Gateway, sql: &str) -> i64 {
        gw.conn().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn en_de_pair_merges_into_one_canonical_term() {
        let mut gw = gateway();
        seed_term(&gw, 1, "News", "news", "en", "key-5");
        seed_term(&gw, 2, "Neuigkeiten", "neuigkeiten", "de", "key-5");

        let mut st = state(&gw, "en");
        let report = run(&mut gw, &mut st);

        assert_eq!(report.terms_converted, 1);
        assert!(report.warnings.is_empty());

        // The English variant survives with its id; the German one is merged.
        let remaining: Vec<(i64, String)> = gw
            .conn()
            .prepare("SELECT term_id, name FROM wp_terms WHERE taxonomy = 'category'")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(remaining, vec![(1, "News".to_string())]);

        // Two language tags, one group with both languages on the canonical.
        assert_eq!(
            count(&gw, "SELECT COUNT(*) FROM wp_terms WHERE taxonomy = 'language'"),
            2
        );
        let entry = st.group(GroupKind::Term, "key-5").unwrap();
        assert_eq!(entry.members.get("en"), Some(&1));
        assert_eq!(entry.members.get("de"), Some(&1));

        assert_eq!(st.canonical_term(1), Some(1));
        assert_eq!(st.canonical_term(2), Some(1));

        // The canonical carries one language relationship, for its own
        // surviving variant.
        let en_term: i64 = gw
            .conn()
            .query_row(
                "SELECT term_id FROM wp_terms WHERE taxonomy = 'language' AND slug = 'en'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(
            count(
                &gw,
                &format!(
                    "SELECT COUNT(*) FROM wp_term_relationships WHERE object_id = 1 AND term_id = {en_term}"
                )
            ),
            1
        );
        assert_eq!(count(&gw, "SELECT COUNT(*) FROM wp_term_relationships"), 1);
    }

    #[test]
    fn default_language_drives_canonical_choice() {
        let mut gw = gateway();
        seed_term(&gw, 1, "News", "news", "en", "key-5");
        seed_term(&gw, 2, "Neuigkeiten", "neuigkeiten", "de", "key-5");

        let mut st = state(&gw, "de");
        run(&mut gw, &mut st);

        let name: String = gw
            .conn()
            .query_row(
                "SELECT name FROM wp_terms WHERE taxonomy = 'category'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "Neuigkeiten");
        assert_eq!(st.canonical_term(1), Some(2));
    }

    #[test]
    fn absent_default_falls_back_to_lexicographic_language() {
        let mut gw = gateway();
        seed_term(&gw, 1, "Nyheter", "nyheter", "sv", "key-5");
        seed_term(&gw, 2, "Neuigkeiten", "neuigkeiten", "de", "key-5");

        let mut st = state(&gw, "en");
        run(&mut gw, &mut st);

        // "de" < "sv", so the German variant is canonical.
        assert_eq!(st.canonical_term(1), Some(2));
    }

    #[test]
    fn duplicate_language_in_group_warns_and_keeps_first() {
        let mut gw = gateway();
        seed_term(&gw, 1, "Sport", "sport", "de", "key-9");
        seed_term(&gw, 2, "Sport (alt)", "sport-alt", "de", "key-9");

        let mut st = state(&gw, "en");
        let report = run(&mut gw, &mut st);

        assert_eq!(report.terms_converted, 1);
        assert_eq!(report.warnings.len(), 1);
        let warning = &report.warnings[0];
        assert_eq!(warning.stage, "terms");
        assert_eq!(warning.legacy_id, Some(2));
        assert_eq!(warning.group_key.as_deref(), Some("key-9"));
        assert_eq!(warning.language.as_deref(), Some("de"));

        // The rejected duplicate is not overwritten or deleted.
        assert_eq!(
            count(&gw, "SELECT COUNT(*) FROM wp_terms WHERE term_id = 2"),
            1
        );
        assert_eq!(st.canonical_term(2), None);
    }

    #[test]
    fn empty_language_converts_under_unknown_tag() {
        let mut gw = gateway();
        seed_term(&gw, 1, "Misc", "misc", "", "key-1");

        let mut st = state(&gw, "en");
        let report = run(&mut gw, &mut st);

        assert_eq!(report.terms_converted, 1);
        let entry = st.group(GroupKind::Term, "key-1").unwrap();
        assert_eq!(entry.members.get("zz"), Some(&1));
        assert_eq!(
            count(&gw, "SELECT COUNT(*) FROM wp_terms WHERE taxonomy = 'language' AND slug = 'zz'"),
            1
        );
    }

    #[test]
    fn empty_translation_key_forms_singleton_group_by_slug() {
        let mut gw = gateway();
        seed_term(&gw, 1, "Orphan", "orphan", "en", "");

        let mut st = state(&gw, "en");
        let report = run(&mut gw, &mut st);

        assert_eq!(report.terms_converted, 1);
        assert!(st.group(GroupKind::Term, "orphan").is_some());
    }

    #[test]
    fn second_run_creates_nothing_new() {
        let mut gw = gateway();
        seed_term(&gw, 1, "News", "news", "en", "key-5");
        seed_term(&gw, 2, "Neuigkeiten", "neuigkeiten", "de", "key-5");

        let mut st = state(&gw, "en");
        run(&mut gw, &mut st);

        let terms_after_first = count(&gw, "SELECT COUNT(*) FROM wp_terms");

        // Fresh state, as a separate invocation would have.
        let mut st2 = state(&gw, "en");
        let report = run(&mut gw, &mut st2);

        assert_eq!(report.terms_converted, 0);
        assert!(report.warnings.is_empty());
        assert_eq!(count(&gw, "SELECT COUNT(*) FROM wp_terms"), terms_after_first);
        assert_eq!(st2.canonical_term(1), Some(1));
    }

    #[test]
    fn new_language_variant_joins_existing_group() {
        let mut gw = gateway();
        seed_term(&gw, 1, "News", "news", "en", "key-5");

        let mut st = state(&gw, "en");
        run(&mut gw, &mut st);

        // A French variant shows up after the first conversion.
        seed_term(&gw, 50, "Nouvelles", "nouvelles", "fr", "key-5");
        let mut st2 = state(&gw, "en");
        let report = run(&mut gw, &mut st2);

        assert_eq!(report.terms_converted, 0);
        let entry = st2.group(GroupKind::Term, "key-5").unwrap();
        assert_eq!(entry.members.get("fr"), Some(&1));
        assert_eq!(st2.canonical_term(50), Some(1));
        // Merged into the existing canonical, so the variant row is gone.
        assert_eq!(
            count(&gw, "SELECT COUNT(*) FROM wp_terms WHERE term_id = 50"),
            0
        );
    }
}
