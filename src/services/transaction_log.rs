use std::collections::VecDeque;

use serde::Serialize;

use crate::models::Transaction;

/// Append-only history, most recent first
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TransactionLog {
    entries: VecDeque<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, tx: Transaction) {
        self.entries.push_front(tx);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    /// The `n` most recent entries
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().take(n)
    }

    pub fn latest(&self) -> Option<&Transaction> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
