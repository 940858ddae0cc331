use anyhow::{bail, Context, Result};
use rusqlite::{Connection, Transaction};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

const CURRENT_SCHEMA: &str = include_str!("schemas/schema_v1.sql");

/// Single-step upgrade from `from` to `from + 1`.
struct Migration {
    from: i32,
    sql: &'static str,
}

/// Registered upgrade steps. Empty while the schema is still at version 1.
const MIGRATIONS: &[Migration] = &[];

/// How to treat a store whose schema is older than the one this build declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationPolicy {
    /// Drop every table and recreate the schema when no upgrade path exists.
    /// Existing history is lost.
    pub destructive_fallback: bool,
}

impl Default for MigrationPolicy {
    fn default() -> Self {
        Self {
            destructive_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate,
    Created,
    Upgraded { from_version: i32 },
    Recreated { from_version: i32 },
}

pub fn run_migrations(conn: &mut Connection, policy: MigrationPolicy) -> Result<MigrationOutcome> {
    migrate_to(
        conn,
        CURRENT_SCHEMA_VERSION,
        CURRENT_SCHEMA,
        MIGRATIONS,
        policy,
    )
}

fn migrate_to(
    conn: &mut Connection,
    target_version: i32,
    schema_sql: &str,
    steps: &[Migration],
    policy: MigrationPolicy,
) -> Result<MigrationOutcome> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > target_version {
        bail!(
            "database version ({}) is newer than supported schema ({})",
            version,
            target_version
        );
    }

    if version == target_version {
        return Ok(MigrationOutcome::UpToDate);
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    let outcome = if version == 0 {
        tx.execute_batch(schema_sql)
            .context("failed to create schema")?;
        MigrationOutcome::Created
    } else if has_upgrade_path(steps, version, target_version) {
        for from in version..target_version {
            apply_step(&tx, steps, from)
                .with_context(|| format!("migration to version {} failed", from + 1))?;
        }
        MigrationOutcome::Upgraded {
            from_version: version,
        }
    } else if policy.destructive_fallback {
        drop_all_tables(&tx)?;
        tx.execute_batch(schema_sql)
            .context("failed to recreate schema")?;
        MigrationOutcome::Recreated {
            from_version: version,
        }
    } else {
        bail!(
            "no migration path from schema version {} to {}",
            version,
            target_version
        );
    };

    tx.pragma_update(None, "user_version", target_version)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(outcome)
}

fn has_upgrade_path(steps: &[Migration], from: i32, to: i32) -> bool {
    (from..to).all(|version| steps.iter().any(|step| step.from == version))
}

fn apply_step(tx: &Transaction<'_>, steps: &[Migration], from: i32) -> Result<()> {
    let step = steps
        .iter()
        .find(|step| step.from == from)
        .with_context(|| format!("no migration registered from version {from}"))?;
    tx.execute_batch(step.sql)?;
    Ok(())
}

fn drop_all_tables(tx: &Transaction<'_>) -> Result<()> {
    let tables = {
        let mut stmt = tx.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()?
    };

    for table in tables {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{table}\""))
            .with_context(|| format!("failed to drop table {table}"))?;
    }

    Ok(())
}
