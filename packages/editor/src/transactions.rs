//! # Transaction Manager
//!
//! Bookkeeping for optimistic mutations.
//!
//! ## Design
//!
//! Each transaction is a small state machine:
//!
//! ```text
//! Pending ──commit──▶ Committed
//!    │
//!    └────revert───▶ Reverted
//! ```
//!
//! - At most one transaction is pending per [`ResourceKey`]
//! - A pending transaction holds the snapshot taken at `BEGIN` and a log of
//!   every intent reduced since, so a revert can restore the snapshot and
//!   replay the work that happened in between
//! - Settled transactions leave no entry behind; only a short outcome
//!   journal is kept for diagnostics

use crate::errors::TransactionError;
use crate::intent::Intent;
use crate::reusable::ReusableRef;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

const SETTLED_JOURNAL_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Hands out increasing transaction ids
#[derive(Debug, Default)]
pub struct TransactionIds {
    last: u64,
}

impl TransactionIds {
    pub fn allocate(&mut self) -> TransactionId {
        self.last += 1;
        TransactionId(self.last)
    }
}

/// Logical resource guarded by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKey {
    CurrentPost,
    Reusable(ReusableRef),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::CurrentPost => f.write_str("current post"),
            ResourceKey::Reusable(id) => write!(f, "reusable block {id}"),
        }
    }
}

/// What a transaction is doing to its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    SavePost,
    TrashPost,
    SaveReusable,
    DeleteReusable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionPhase {
    Pending,
    Committed,
    Reverted,
}

/// Phase transition carried by an intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Begin {
        resource: ResourceKey,
        operation: Operation,
    },
    Commit,
    Revert,
}

#[derive(Debug, Clone)]
pub struct PendingTransaction<S> {
    pub id: TransactionId,
    pub resource: ResourceKey,
    pub operation: Operation,
    before: S,
    log: Vec<Intent>,
}

impl<S> PendingTransaction<S> {
    pub fn before(&self) -> &S {
        &self.before
    }

    /// Intents reduced since this transaction began
    pub fn log(&self) -> &[Intent] {
        &self.log
    }

    pub fn into_parts(self) -> (S, Vec<Intent>) {
        (self.before, self.log)
    }
}

#[derive(Debug, Clone)]
pub struct TransactionTable<S> {
    /// Pending transactions in `BEGIN` order
    pending: Vec<PendingTransaction<S>>,

    /// Most recent outcomes, oldest first
    settled: VecDeque<(TransactionId, TransactionPhase)>,
}

impl<S> Default for TransactionTable<S> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            settled: VecDeque::new(),
        }
    }
}

impl<S> TransactionTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if `resource` already has a pending transaction
    pub fn check_available(&self, resource: &ResourceKey) -> Result<(), TransactionError> {
        match self.pending_for(resource) {
            Some(existing) => Err(TransactionError::InFlight {
                resource: resource.clone(),
                txn: existing.id,
            }),
            None => Ok(()),
        }
    }

    pub fn begin(
        &mut self,
        id: TransactionId,
        resource: ResourceKey,
        operation: Operation,
        before: S,
    ) -> Result<(), TransactionError> {
        self.check_available(&resource)?;
        self.pending.push(PendingTransaction {
            id,
            resource,
            operation,
            before,
            log: Vec::new(),
        });
        Ok(())
    }

    pub fn check_pending(&self, id: TransactionId) -> Result<(), TransactionError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(TransactionError::Unknown(id))
        }
    }

    pub fn commit(&mut self, id: TransactionId) -> Result<(), TransactionError> {
        self.take(id)?;
        self.journal(id, TransactionPhase::Committed);
        Ok(())
    }

    /// Retire `id` as reverted, dropping its intents from every other log
    pub fn revert(&mut self, id: TransactionId) -> Result<PendingTransaction<S>, TransactionError> {
        let entry = self.take(id)?;
        for other in &mut self.pending {
            other
                .log
                .retain(|intent| intent.transaction_id() != Some(id));
        }
        self.journal(id, TransactionPhase::Reverted);
        Ok(entry)
    }

    /// Append `intent` to the log of every pending transaction it does not
    /// itself belong to
    pub fn record(&mut self, intent: &Intent) {
        let own = intent.transaction_id();
        for entry in &mut self.pending {
            if own != Some(entry.id) {
                entry.log.push(intent.clone());
            }
        }
    }

    /// Replace the `BEGIN` snapshot of a pending transaction
    pub fn rebase(&mut self, id: TransactionId, before: S) {
        if let Some(entry) = self.pending.iter_mut().find(|entry| entry.id == id) {
            entry.before = before;
        }
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.pending.iter().any(|entry| entry.id == id)
    }

    pub fn get(&self, id: TransactionId) -> Option<&PendingTransaction<S>> {
        self.pending.iter().find(|entry| entry.id == id)
    }

    pub fn pending_for(&self, resource: &ResourceKey) -> Option<&PendingTransaction<S>> {
        self.pending.iter().find(|entry| entry.resource == *resource)
    }

    pub fn phase(&self, id: TransactionId) -> Option<TransactionPhase> {
        if self.contains(id) {
            return Some(TransactionPhase::Pending);
        }
        self.settled
            .iter()
            .rev()
            .find(|(settled, _)| *settled == id)
            .map(|(_, phase)| *phase)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTransaction<S>> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn take(&mut self, id: TransactionId) -> Result<PendingTransaction<S>, TransactionError> {
        let index = self
            .pending
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(TransactionError::Unknown(id))?;
        Ok(self.pending.remove(index))
    }

    fn journal(&mut self, id: TransactionId, phase: TransactionPhase) {
        self.settled.push_back((id, phase));
        if self.settled.len() > SETTLED_JOURNAL_LEN {
            self.settled.pop_front();
        }
    }
}
