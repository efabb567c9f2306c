use std::path::PathBuf;

use anyhow::Result;
use contact_directory_core::{
    parse_contact_id, ContactDirectoryService, ContactRecord, CreateContactRequest,
    DirectoryError, DirectoryResult, UpdateContactRequest,
};
use contact_directory_store_sqlite::{SchemaStatus, SqliteStore};
use serde::{Deserialize, Serialize};

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateResult {
    pub dry_run: bool,
    pub current_version: i64,
    pub target_version: i64,
    pub would_apply_versions: Vec<i64>,
    pub after_version: Option<i64>,
    pub up_to_date: Option<bool>,
}

/// Entry point shared by the HTTP service and the CLI.
///
/// Holds only the database location. Every call opens its own connection, brings the
/// schema up to date, and hands the store to a fresh [`ContactDirectoryService`].
#[derive(Debug, Clone)]
pub struct ContactDirectoryApi {
    db_path: PathBuf,
}

impl ContactDirectoryApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path)
    }

    fn open_service(&self) -> DirectoryResult<ContactDirectoryService<SqliteStore>> {
        let mut store = self.open_store().map_err(|err| DirectoryError::storage(&err))?;
        store.migrate().map_err(|err| DirectoryError::storage(&err))?;
        Ok(ContactDirectoryService::new(store))
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = self.open_store()?;
        store.schema_status()
    }

    /// Apply pending migrations, or return planned versions for dry-run mode.
    ///
    /// # Errors
    /// Returns an error when migration planning or execution fails.
    pub fn migrate(&self, dry_run: bool) -> Result<MigrateResult> {
        let mut store = self.open_store()?;
        let before = store.schema_status()?;
        if dry_run {
            return Ok(MigrateResult {
                dry_run: true,
                current_version: before.current_version,
                target_version: before.target_version,
                would_apply_versions: before.pending_versions,
                after_version: None,
                up_to_date: None,
            });
        }

        let planned_versions = before.pending_versions;
        store.migrate()?;
        let after = store.schema_status()?;
        Ok(MigrateResult {
            dry_run: false,
            current_version: before.current_version,
            target_version: before.target_version,
            would_apply_versions: planned_versions,
            after_version: Some(after.current_version),
            up_to_date: Some(after.pending_versions.is_empty()),
        })
    }

    /// # Errors
    /// Returns a validation error listing every invalid field, or a storage error.
    pub fn create_contact(&self, request: CreateContactRequest) -> DirectoryResult<ContactRecord> {
        self.open_service()?.create(request)
    }

    /// # Errors
    /// Returns a storage error when the database cannot be read.
    pub fn list_contacts(&self) -> DirectoryResult<Vec<ContactRecord>> {
        self.open_service()?.list_all()
    }

    /// # Errors
    /// Returns a storage error when the database cannot be read.
    pub fn list_contacts_by_area_code(&self, code: &str) -> DirectoryResult<Vec<ContactRecord>> {
        self.open_service()?.list_by_area_code(code)
    }

    /// # Errors
    /// Returns not-found for an unknown or malformed id, or a storage error.
    pub fn get_contact(&self, id: &str) -> DirectoryResult<ContactRecord> {
        let id = parse_contact_id(id)?;
        self.open_service()?.get_by_id(id)
    }

    /// # Errors
    /// Returns not-found for an unknown or malformed id, a validation error for an invalid
    /// present field, or a storage error.
    pub fn update_contact(
        &self,
        id: &str,
        request: UpdateContactRequest,
    ) -> DirectoryResult<ContactRecord> {
        let id = parse_contact_id(id)?;
        self.open_service()?.update(id, request)
    }

    /// # Errors
    /// Returns not-found for an unknown or malformed id, or a storage error.
    pub fn delete_contact(&self, id: &str) -> DirectoryResult<ContactRecord> {
        let id = parse_contact_id(id)?;
        self.open_service()?.delete(id)
    }
}
