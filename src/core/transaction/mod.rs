// src/core/transaction/mod.rs

//! Transaction boundary for the execution core. Writes go straight to the
//! store (so same-transaction reads observe them) while an undo log of
//! before-images makes rollback possible. Durability of committed state is
//! the storage engine's concern, not this module's.

use crate::core::common::types::{Rid, TransactionId};
use crate::core::common::QuiverError;
use crate::core::storage::{Record, RecordStore};

/// Before-image recorded for every mutation inside an active transaction.
#[derive(Debug, Clone)]
pub enum UndoEntry {
    /// The record did not exist before; rollback deletes it.
    Created(Rid),
    /// The record existed with this image; rollback restores it.
    Updated(Record),
    /// The record was deleted; rollback re-saves this image.
    Deleted(Record),
}

#[derive(Debug)]
struct ActiveTransaction {
    id: TransactionId,
    undo: Vec<UndoEntry>,
}

/// One logical transaction per session at a time; nesting is rejected.
#[derive(Debug, Default)]
pub struct TransactionManager {
    active: Option<ActiveTransaction>,
    next_tx_id: u64,
    committed: Vec<TransactionId>,
}

impl TransactionManager {
    #[must_use]
    pub fn new() -> Self {
        Self { active: None, next_tx_id: 1, committed: Vec::new() }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn begin(&mut self) -> Result<TransactionId, QuiverError> {
        if let Some(tx) = &self.active {
            return Err(QuiverError::InvalidState(format!(
                "transaction {} is already active, nested BEGIN is not supported",
                tx.id
            )));
        }
        let id = TransactionId(self.next_tx_id);
        self.next_tx_id = self.next_tx_id.wrapping_add(1);
        self.active = Some(ActiveTransaction { id, undo: Vec::new() });
        log::debug!("transaction {id} begun");
        Ok(id)
    }

    /// Records a before-image. Outside a transaction this is a no-op: the
    /// mutation is auto-committed.
    pub fn record_undo(&mut self, entry: UndoEntry) {
        if let Some(tx) = &mut self.active {
            tx.undo.push(entry);
        }
    }

    /// Commits the active transaction. Returns `None` when no transaction is
    /// active, which callers report as a no-op rather than an error.
    pub fn commit(&mut self) -> Option<TransactionId> {
        let tx = self.active.take()?;
        self.committed.push(tx.id);
        log::debug!("transaction {} committed ({} undo entries discarded)", tx.id, tx.undo.len());
        Some(tx.id)
    }

    /// Rolls back the active transaction by replaying before-images in
    /// reverse order. Returns `None` when no transaction is active.
    pub fn rollback(
        &mut self,
        store: &mut dyn RecordStore,
    ) -> Result<Option<TransactionId>, QuiverError> {
        let Some(tx) = self.active.take() else {
            return Ok(None);
        };
        for entry in tx.undo.into_iter().rev() {
            match entry {
                UndoEntry::Created(rid) => {
                    store.delete(rid)?;
                }
                UndoEntry::Updated(image) | UndoEntry::Deleted(image) => {
                    store.save(image)?;
                }
            }
        }
        log::debug!("transaction {} rolled back", tx.id);
        Ok(Some(tx.id))
    }

    #[must_use]
    pub fn committed_ids(&self) -> &[TransactionId] {
        &self.committed
    }
}
