//! Convert-mode readiness check.
//!
//! Conversion assumes the operator has finished the manual steps that follow
//! prepare: installing the target platform over the prepared database and
//! activating the multilanguage plugin. This check answers yes or no before
//! the first conversion write, so a half-done installation fails fast
//! instead of half-converting.

use rusqlite::{Connection, OptionalExtension};

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::schema::TRANSFORMS;
use crate::schema::remap::table_exists;

/// Marker that must appear in the active plugin list before conversion.
const LANGUAGE_PLUGIN: &str = "polylang";

pub fn verify_ready(conn: &Connection, config: &Config) -> Result<()> {
    if !config.target.root_path.is_dir() {
        return Err(ConvertError::BadTargetRoot(config.target.root_path.clone()));
    }

    for transform in TRANSFORMS {
        let table = transform.target_table(&config.prefixes);
        if !table_exists(conn, &table)? {
            return Err(ConvertError::NotPrepared(table));
        }
    }

    match read_option(conn, config, "siteurl")? {
        Some(value) if !value.is_empty() => {}
        _ => {
            return Err(ConvertError::TargetNotReady(
                "option 'siteurl' is not set; install the target platform first".to_string(),
            ));
        }
    }

    let plugins = read_option(conn, config, "active_plugins")?.unwrap_or_default();
    if !plugins.contains(LANGUAGE_PLUGIN) {
        return Err(ConvertError::TargetNotReady(format!(
            "'{LANGUAGE_PLUGIN}' is not in the active plugin list"
        )));
    }

    Ok(())
}

fn read_option(conn: &Connection, config: &Config, name: &str) -> Result<Option<String>> {
    let sql = format!(
        "SELECT option_value FROM {}options WHERE option_name = ?1",
        config.prefixes.new
    );
    let value = conn
        .query_row(&sql, [name], |row| row.get(0))
        .optional()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CleanupConfig, DatabaseConfig, LanguageConfig, PrefixConfig, TargetConfig,
    };
    use tempfile::TempDir;

    fn config(root: &TempDir) -> Config {
        Config {
            database: DatabaseConfig {
                path: root.path().join("site.db"),
            },
            target: TargetConfig {
                root_path: root.path().to_path_buf(),
            },
            prefixes: PrefixConfig {
                old: "smk_".to_string(),
                new: "wp_".to_string(),
                user: "wpu_".to_string(),
            },
            languages: LanguageConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }

    fn prepared_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE wp_posts (ID INTEGER PRIMARY KEY);
             CREATE TABLE wp_terms (term_id INTEGER PRIMARY KEY);
             CREATE TABLE wp_term_relationships (object_id INTEGER, term_id INTEGER);
             CREATE TABLE wp_options (
                option_id INTEGER PRIMARY KEY AUTOINCREMENT,
                option_name TEXT NOT NULL UNIQUE,
                option_value TEXT NOT NULL DEFAULT ''
             );
             CREATE TABLE wpu_users (ID INTEGER PRIMARY KEY);",
        )
        .unwrap();
        conn
    }

    fn set_option(conn: &Connection, name: &str, value: &str) {
        conn.execute(
            "INSERT OR REPLACE INTO wp_options (option_name, option_value) VALUES (?1, ?2)",
            [name, value],
        )
        .unwrap();
    }

    #[test]
    fn ready_when_installed_and_plugin_active() {
        let root = TempDir::new().unwrap();
        let conn = prepared_conn();
        set_option(&conn, "siteurl", "http://example.test");
        set_option(&conn, "active_plugins", "polylang/polylang.php");

        verify_ready(&conn, &config(&root)).unwrap();
    }

    #[test]
    fn missing_target_root_rejected() {
        let root = TempDir::new().unwrap();
        let mut cfg = config(&root);
        cfg.target.root_path = root.path().join("missing");
        let conn = prepared_conn();

        let err = verify_ready(&conn, &cfg).unwrap_err();
        assert_eq!(err.code(), "bad_target_root");
    }

    #[test]
    fn unprepared_schema_rejected() {
        let root = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();

        let err = verify_ready(&conn, &config(&root)).unwrap_err();
        assert_eq!(err.code(), "not_prepared");
    }

    #[test]
    fn missing_siteurl_rejected() {
        let root = TempDir::new().unwrap();
        let conn = prepared_conn();
        set_option(&conn, "active_plugins", "polylang/polylang.php");

        let err = verify_ready(&conn, &config(&root)).unwrap_err();
        assert_eq!(err.code(), "target_not_ready");
        assert!(err.to_string().contains("siteurl"));
    }

    #[test]
    fn inactive_language_plugin_rejected() {
        let root = TempDir::new().unwrap();
        let conn = prepared_conn();
        set_option(&conn, "siteurl", "http://example.test");
        set_option(&conn, "active_plugins", "akismet/akismet.php");

        let err = verify_ready(&conn, &config(&root)).unwrap_err();
        assert_eq!(err.code(), "target_not_ready");
        assert!(err.to_string().contains("polylang"));
    }
}
