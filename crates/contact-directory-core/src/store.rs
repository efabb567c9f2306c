use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::{ContactId, ContactRecord};

/// One write waiting for the next [`RecordStore::commit`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StagedWrite {
    Insert(ContactRecord),
    Replace(ContactRecord),
    Delete(ContactId),
}

/// Keyed persistence for contact records.
///
/// Writes are staged and only become visible to reads, and durable, once `commit`
/// succeeds. A failed commit applies none of the staged writes and discards them.
pub trait RecordStore {
    /// Stage a new record. Committing fails if the id already exists.
    ///
    /// # Errors
    /// Returns an error when the write cannot be staged.
    fn add(&mut self, record: ContactRecord) -> Result<()>;

    /// Stage a full overwrite of an existing record. Committing fails if the id is unknown.
    ///
    /// # Errors
    /// Returns an error when the write cannot be staged.
    fn update(&mut self, record: ContactRecord) -> Result<()>;

    /// Stage a hard removal. Committing fails if the id is unknown.
    ///
    /// # Errors
    /// Returns an error when the write cannot be staged.
    fn remove(&mut self, id: ContactId) -> Result<()>;

    /// Apply all staged writes atomically.
    ///
    /// # Errors
    /// Returns an error when any staged write is rejected or persistence fails.
    fn commit(&mut self) -> Result<()>;

    /// # Errors
    /// Returns an error when committed records cannot be read.
    fn list_all(&self) -> Result<Vec<ContactRecord>>;

    /// # Errors
    /// Returns an error when committed records cannot be read.
    fn find_by_id(&self, id: ContactId) -> Result<Option<ContactRecord>>;

    /// # Errors
    /// Returns an error when committed records cannot be read.
    fn find_where(&self, predicate: &dyn Fn(&ContactRecord) -> bool) -> Result<Vec<ContactRecord>> {
        Ok(self.list_all()?.into_iter().filter(|record| predicate(record)).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: BTreeMap<ContactId, ContactRecord>,
    staged: Vec<StagedWrite>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    #[must_use]
    pub fn staged(&self) -> &[StagedWrite] {
        &self.staged
    }
}

impl RecordStore for MemoryStore {
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
        let mut next = self.committed.clone();

        for write in staged {
            match write {
                StagedWrite::Insert(record) => {
                    if next.contains_key(&record.id) {
                        return Err(anyhow!("contact id already exists: {}", record.id));
                    }
                    next.insert(record.id, record);
                }
                StagedWrite::Replace(record) => {
                    let Some(slot) = next.get_mut(&record.id) else {
                        return Err(anyhow!("cannot replace unknown contact: {}", record.id));
                    };
                    *slot = record;
                }
                StagedWrite::Delete(id) => {
                    if next.remove(&id).is_none() {
                        return Err(anyhow!("cannot remove unknown contact: {id}"));
                    }
                }
            }
        }

        self.committed = next;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<ContactRecord>> {
        Ok(self.committed.values().cloned().collect())
    }

    fn find_by_id(&self, id: ContactId) -> Result<Option<ContactRecord>> {
        Ok(self.committed.get(&id).cloned())
    }
}
