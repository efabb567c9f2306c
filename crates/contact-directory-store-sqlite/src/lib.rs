use std::path::Path;

use anyhow::{anyhow, Context, Result};
use contact_directory_core::{ContactId, ContactRecord, RecordStore, StagedWrite};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use ulid::Ulid;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS contacts (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL CHECK (length(trim(name)) > 0),
  email TEXT NOT NULL,
  phone TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_contacts_phone ON contacts(phone);
";

const SELECT_CONTACT_COLUMNS: &str = "SELECT id, name, email, phone FROM contacts";

/// `SQLite`-backed [`RecordStore`]. Writes are buffered until [`RecordStore::commit`],
/// which flushes them in a single transaction.
pub struct SqliteStore {
    conn: Connection,
    staged: Vec<StagedWrite>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

impl SqliteStore {
    /// Open a SQLite-backed contact store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn, staged: Vec::new() })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when a migration step fails or the database was written by a
    /// newer schema than this build understands.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version < 1 {
            self.apply_migration_1()?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    fn apply_migration_1(&mut self) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start migration v1 transaction")?;
        tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
        record_schema_version(&tx, 1)?;
        tx.commit().context("failed to commit migration v1")?;
        debug!(version = 1, "applied schema migration");
        Ok(())
    }

    /// Number of writes waiting for the next commit.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    fn apply_staged(tx: &rusqlite::Transaction<'_>, write: &StagedWrite) -> Result<()> {
        match write {
            StagedWrite::Insert(record) => {
                tx.execute(
                    "INSERT INTO contacts(id, name, email, phone) VALUES (?1, ?2, ?3, ?4)",
                    params![record.id.to_string(), record.name, record.email, record.phone],
                )
                .with_context(|| format!("failed to insert contact {}", record.id))?;
            }
            StagedWrite::Replace(record) => {
                let changed = tx
                    .execute(
                        "UPDATE contacts SET name = ?2, email = ?3, phone = ?4 WHERE id = ?1",
                        params![record.id.to_string(), record.name, record.email, record.phone],
                    )
                    .with_context(|| format!("failed to update contact {}", record.id))?;
                if changed == 0 {
                    return Err(anyhow!("cannot replace unknown contact: {}", record.id));
                }
            }
            StagedWrite::Delete(id) => {
                let changed = tx
                    .execute("DELETE FROM contacts WHERE id = ?1", params![id.to_string()])
                    .with_context(|| format!("failed to delete contact {id}"))?;
                if changed == 0 {
                    return Err(anyhow!("cannot remove unknown contact: {id}"));
                }
            }
        }
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn add(&mut self, record: ContactRecord) -> Result<()> {
        self.staged.push(StagedWrite::Insert(record));
        Ok(())
    }

    fn update(&mut self, record: ContactRecord) -> Result<()> {
        self.staged.push(StagedWrite::Replace(record));
        Ok(())
    }

    fn remove(&mut self, id: ContactId) -> Result<()> {
        self.staged.push(StagedWrite::Delete(id));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction().context("failed to start transaction")?;
        for write in &staged {
            Self::apply_staged(&tx, write)?;
        }
        tx.commit().context("failed to commit write transaction")?;
        debug!(writes = staged.len(), "committed staged contact writes");
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<ContactRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_CONTACT_COLUMNS} ORDER BY id ASC"))
            .context("failed to prepare contact listing")?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(contact_from_row(row)?);
        }

        Ok(records)
    }

    fn find_by_id(&self, id: ContactId) -> Result<Option<ContactRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_CONTACT_COLUMNS} WHERE id = ?1"))
            .context("failed to prepare contact lookup")?;
        stmt.query_row(params![id.to_string()], |row| Ok(contact_from_row(row)))
            .optional()
            .with_context(|| format!("failed to look up contact {id}"))?
            .transpose()
    }
}

fn contact_from_row(row: &Row<'_>) -> Result<ContactRecord> {
    let raw_id: String = row.get(0)?;
    Ok(ContactRecord {
        id: parse_contact_id(&raw_id)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
    })
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_contact_id(raw: &str) -> Result<ContactId> {
    let parsed = Ulid::from_string(raw).with_context(|| format!("invalid ULID: {raw}"))?;
    Ok(ContactId(parsed))
}
