use tracing::{debug, info};

use crate::{
    validate_create, validate_update, ContactId, ContactRecord, CreateContactRequest,
    DirectoryError, DirectoryResult, RecordStore, UpdateContactRequest,
};

/// Business rules for the contact directory, layered over an injected [`RecordStore`].
///
/// The service holds no state of its own between calls. Update and delete read before
/// they write, so concurrent callers racing on one id get last-writer-wins semantics.
#[derive(Debug)]
pub struct ContactDirectoryService<S> {
    store: S,
}

impl<S: RecordStore> ContactDirectoryService<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate and persist a new contact under a freshly generated id.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Validation`] listing every invalid field, or
    /// [`DirectoryError::Storage`] when the store rejects the write.
    pub fn create(&mut self, request: CreateContactRequest) -> DirectoryResult<ContactRecord> {
        validate_create(&request).into_result()?;

        let record = ContactRecord {
            id: ContactId::new(),
            name: request.name,
            email: request.email,
            phone: request.phone,
        };
        self.store.add(record.clone()).map_err(|err| DirectoryError::storage(&err))?;
        self.store.commit().map_err(|err| DirectoryError::storage(&err))?;

        info!(contact_id = %record.id, "contact created");
        Ok(record)
    }

    /// # Errors
    /// Returns [`DirectoryError::Storage`] when the store cannot be read.
    pub fn list_all(&self) -> DirectoryResult<Vec<ContactRecord>> {
        let records = self.store.list_all().map_err(|err| DirectoryError::storage(&err))?;
        debug!(count = records.len(), "listed contacts");
        Ok(records)
    }

    /// Contacts whose phone starts with the literal text `(code)`.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Storage`] when the store cannot be read.
    pub fn list_by_area_code(&self, code: &str) -> DirectoryResult<Vec<ContactRecord>> {
        let records = self
            .store
            .find_where(&|record| record.has_area_code(code))
            .map_err(|err| DirectoryError::storage(&err))?;
        debug!(area_code = code, count = records.len(), "filtered contacts by area code");
        Ok(records)
    }

    /// # Errors
    /// Returns [`DirectoryError::NotFound`] for an unknown id, or
    /// [`DirectoryError::Storage`] when the store cannot be read.
    pub fn get_by_id(&self, id: ContactId) -> DirectoryResult<ContactRecord> {
        self.find_existing(id)
    }

    /// Overwrite the fields the request sets and keep every other field.
    ///
    /// # Errors
    /// Returns [`DirectoryError::NotFound`] for an unknown id (checked before the
    /// payload), [`DirectoryError::Validation`] for an invalid present field, or
    /// [`DirectoryError::Storage`] when the write fails.
    pub fn update(
        &mut self,
        id: ContactId,
        request: UpdateContactRequest,
    ) -> DirectoryResult<ContactRecord> {
        let mut record = self.find_existing(id)?;
        validate_update(&request).into_result()?;

        request.apply_to(&mut record);
        self.store.update(record.clone()).map_err(|err| DirectoryError::storage(&err))?;
        self.store.commit().map_err(|err| DirectoryError::storage(&err))?;

        info!(contact_id = %id, "contact updated");
        Ok(record)
    }

    /// Remove a contact and return it as it was just before removal.
    ///
    /// # Errors
    /// Returns [`DirectoryError::NotFound`] for an unknown id, or
    /// [`DirectoryError::Storage`] when the removal fails.
    pub fn delete(&mut self, id: ContactId) -> DirectoryResult<ContactRecord> {
        let record = self.find_existing(id)?;
        self.store.remove(id).map_err(|err| DirectoryError::storage(&err))?;
        self.store.commit().map_err(|err| DirectoryError::storage(&err))?;

        info!(contact_id = %id, "contact deleted");
        Ok(record)
    }

    fn find_existing(&self, id: ContactId) -> DirectoryResult<ContactRecord> {
        self.store
            .find_by_id(id)
            .map_err(|err| DirectoryError::storage(&err))?
            .ok_or_else(|| DirectoryError::not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use anyhow::{anyhow, Result};
    use proptest::prelude::*;

    use super::*;
    use crate::{FieldUpdate, MemoryStore};

    fn wally() -> CreateContactRequest {
        CreateContactRequest {
            name: "Wally West".to_string(),
            email: "wally.west@example.com".to_string(),
            phone: "(11) 91234-5678".to_string(),
        }
    }

    fn artemis() -> CreateContactRequest {
        CreateContactRequest {
            name: "Artemis Crock".to_string(),
            email: "artemis.crock@example.com".to_string(),
            phone: "(21) 98765-4321".to_string(),
        }
    }

    fn service() -> ContactDirectoryService<MemoryStore> {
        ContactDirectoryService::new(MemoryStore::new())
    }

    /// Reads succeed with no records; every commit fails.
    #[derive(Debug, Default)]
    struct BrokenDiskStore;

    impl RecordStore for BrokenDiskStore {
        fn add(&mut self, _record: ContactRecord) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, _record: ContactRecord) -> Result<()> {
            Ok(())
        }

        fn remove(&mut self, _id: ContactId) -> Result<()> {
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            Err(anyhow!("disk I/O error"))
        }

        fn list_all(&self) -> Result<Vec<ContactRecord>> {
            Ok(Vec::new())
        }

        fn find_by_id(&self, _id: ContactId) -> Result<Option<ContactRecord>> {
            Ok(None)
        }
    }

    #[test]
    fn create_returns_stored_record_with_fresh_id() -> Result<()> {
        let mut service = service();
        let first = service.create(wally())?;
        let second = service.create(wally())?;

        assert_ne!(first.id, second.id);
        assert!(!first.id.to_string().is_empty());
        assert_eq!(first.name, "Wally West");
        assert_eq!(first.email, "wally.west@example.com");
        assert_eq!(first.phone, "(11) 91234-5678");
        assert_eq!(service.store().len(), 2);
        Ok(())
    }

    #[test]
    fn create_with_invalid_payload_leaves_store_untouched() {
        let mut service = service();
        let result = service.create(CreateContactRequest { name: String::new(), ..wally() });

        let Err(DirectoryError::Validation(errors)) = result else {
            panic!("expected validation error, got {result:?}");
        };
        assert_eq!(errors.fields(), vec!["name"]);
        assert_eq!(errors.violations()[0].message, "name MUST be non-empty");
        assert!(service.store().is_empty());
        assert!(service.store().staged().is_empty());
    }

    #[test]
    fn create_surfaces_storage_failures() {
        let mut service = ContactDirectoryService::new(BrokenDiskStore);
        let result = service.create(wally());
        assert_eq!(result, Err(DirectoryError::Storage("disk I/O error".to_string())));
    }

    #[test]
    fn list_by_area_code_matches_literal_prefix() -> Result<()> {
        let mut service = service();
        service.create(wally())?;
        service.create(artemis())?;

        let filtered = service.list_by_area_code("11")?;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].phone, "(11) 91234-5678");

        assert!(service.list_by_area_code("011")?.is_empty());
        assert!(service.list_by_area_code("99")?.is_empty());
        Ok(())
    }

    #[test]
    fn get_by_id_round_trips_created_record() -> Result<()> {
        let mut service = service();
        let created = service.create(wally())?;
        assert_eq!(service.get_by_id(created.id)?, created);
        Ok(())
    }

    #[test]
    fn get_by_id_reports_unknown_id() {
        let service = service();
        let id = ContactId::new();
        assert_eq!(service.get_by_id(id), Err(DirectoryError::not_found(id)));
    }

    #[test]
    fn update_overwrites_only_present_fields() -> Result<()> {
        let mut service = service();
        let created = service.create(CreateContactRequest {
            email: "a@b.com".to_string(),
            ..wally()
        })?;

        let updated = service.update(
            created.id,
            UpdateContactRequest {
                email: FieldUpdate::Set("c@d.com".to_string()),
                ..UpdateContactRequest::default()
            },
        )?;

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Wally West");
        assert_eq!(updated.phone, "(11) 91234-5678");
        assert_eq!(updated.email, "c@d.com");
        assert_eq!(service.get_by_id(created.id)?, updated);
        Ok(())
    }

    #[test]
    fn update_rejects_invalid_present_field_without_writing() -> Result<()> {
        let mut service = service();
        let created = service.create(wally())?;

        let result = service.update(
            created.id,
            UpdateContactRequest {
                name: FieldUpdate::Set("Wally".to_string()),
                phone: FieldUpdate::Set(String::new()),
                ..UpdateContactRequest::default()
            },
        );

        assert!(matches!(result, Err(DirectoryError::Validation(_))));
        assert_eq!(service.get_by_id(created.id)?, created);
        Ok(())
    }

    #[test]
    fn update_of_unknown_id_is_not_found_even_with_invalid_payload() {
        let mut service = service();
        let id = ContactId::new();
        let result = service.update(
            id,
            UpdateContactRequest {
                email: FieldUpdate::Set("invalid-email".to_string()),
                ..UpdateContactRequest::default()
            },
        );
        assert_eq!(result, Err(DirectoryError::not_found(id)));
    }

    #[test]
    fn delete_returns_snapshot_then_reports_not_found() -> Result<()> {
        let mut service = service();
        let created = service.create(wally())?;

        assert_eq!(service.delete(created.id)?, created);
        assert_eq!(service.get_by_id(created.id), Err(DirectoryError::not_found(created.id)));
        assert_eq!(service.delete(created.id), Err(DirectoryError::not_found(created.id)));
        assert!(service.store().is_empty());
        Ok(())
    }

    #[test]
    fn consecutive_list_all_calls_return_the_same_set() -> Result<()> {
        let mut service = service();
        service.create(wally())?;
        service.create(artemis())?;

        let first = service.list_all()?.into_iter().map(|record| record.id).collect::<BTreeSet<_>>();
        let second =
            service.list_all()?.into_iter().map(|record| record.id).collect::<BTreeSet<_>>();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        Ok(())
    }

    proptest! {
        #[test]
        fn property_created_ids_are_distinct(count in 1_usize..24) {
            let mut service = service();
            let mut ids = BTreeSet::new();
            for _ in 0..count {
                let record = service.create(wally());
                prop_assert!(record.is_ok());
                if let Ok(record) = record {
                    ids.insert(record.id);
                }
            }
            prop_assert_eq!(ids.len(), count);
            prop_assert_eq!(service.store().len(), count);
        }

        #[test]
        fn property_invalid_phone_never_reaches_store(phone in "[0-9a-z ()-]{0,16}") {
            prop_assume!(!crate::is_valid_phone(&phone));
            let mut service = service();
            let result = service.create(CreateContactRequest { phone, ..wally() });
            prop_assert!(matches!(result, Err(DirectoryError::Validation(_))));
            prop_assert!(service.store().is_empty());
        }
    }
}
