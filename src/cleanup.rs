//! Optional post-conversion cleanup: drop the legacy language columns from
//! the target content tables once the conversion has been checked by hand.
//!
//! Disabled by default. The columns cost nothing and keep the conversion
//! re-runnable, so stripping them is an explicit operator decision via the
//! `cleanup.strip_language_columns` config flag. Idempotent: already-dropped
//! columns are skipped.

use rusqlite::Connection;

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::gateway::Gateway;
use crate::schema::remap::table_exists;

/// Columns carried through prepare for convert's benefit only.
const LANGUAGE_COLUMNS: &[&str] = &["language_code", "translation_key"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub columns_dropped: usize,
}

pub fn cleanup(gateway: &mut Gateway, config: &Config) -> Result<CleanupReport> {
    let mut report = CleanupReport { columns_dropped: 0 };
    if !config.cleanup.strip_language_columns {
        return Ok(report);
    }

    for table in ["posts", "terms"] {
        let table = format!("{}{table}", config.prefixes.new);
        if !table_exists(gateway.conn(), &table)? {
            return Err(ConvertError::NotPrepared(table));
        }
        for column in LANGUAGE_COLUMNS {
            if !column_exists(gateway.conn(), &table, column)? {
                continue;
            }
            gateway.ddl(
                &format!("drop column {table}.{column}"),
                &format!("ALTER TABLE {table} DROP COLUMN {column}"),
            )?;
            report.columns_dropped += 1;
        }
    }

    Ok(report)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}
