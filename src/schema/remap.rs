use rusqlite::Connection;

use crate::config::PrefixConfig;
use crate::error::{ConvertError, Result};
use crate::gateway::Gateway;
use crate::schema::TRANSFORMS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapReport {
    pub tables_remapped: usize,
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Relocate every legacy table to its target-prefixed counterpart.
///
/// All-or-nothing at the run level: preconditions are checked for every
/// table before the first write, and any transform failing aborts the whole
/// remap through the gateway. Primary keys are copied verbatim so references
/// recorded by later steps stay valid.
pub fn remap(gateway: &mut Gateway, prefixes: &PrefixConfig) -> Result<RemapReport> {
    // Preconditions for the whole set before any write: the legacy schema
    // must be complete, and the target schema must be empty. This step is
    // not designed to merge into a populated target.
    for transform in TRANSFORMS {
        let source = transform.source_table(prefixes);
        if !table_exists(gateway.conn(), &source)? {
            return Err(ConvertError::LegacySchemaIncomplete(source));
        }
        let target = transform.target_table(prefixes);
        if table_exists(gateway.conn(), &target)? {
            return Err(ConvertError::TargetNotEmpty(target));
        }
    }

    for transform in TRANSFORMS {
        let source = transform.source_table(prefixes);
        let target = transform.target_table(prefixes);
        gateway.ddl(
            &format!("create table {target}"),
            &transform.create_sql(prefixes),
        )?;
        gateway.execute(
            &format!("copy {source} -> {target}"),
            &transform.copy_sql(prefixes),
            &[],
        )?;
    }

    Ok(RemapReport {
        tables_remapped: TRANSFORMS.len(),
    })
}
