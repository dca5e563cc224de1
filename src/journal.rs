//! Submission journal
//!
//! Append-only `sled` store of every [`SubmissionAttempt`], keyed by
//! `ordinal (u64 BE) | attempt id`, so a scan returns attempts in ordinal
//! order. The journal is an audit aid: write failures are reported to the
//! caller, which logs them and carries on.

use crate::submitter::attempt::SubmissionAttempt;
use sled::Tree;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal storage: {0}")]
    Sled(#[from] sled::Error),

    #[error("journal encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub struct SubmissionJournal {
    db: sled::Db,
    attempts: Tree,
}

impl SubmissionJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let db = sled::open(path)?;
        let attempts = db.open_tree("attempts")?;
        Ok(Self { db, attempts })
    }

    pub fn record(&self, attempt: &SubmissionAttempt) -> Result<(), JournalError> {
        let value = serde_json::to_vec(attempt)?;
        self.attempts.insert(key(attempt.ordinal, attempt.id.as_bytes()), value)?;
        Ok(())
    }

    /// Attempts that claimed `ordinal`
    pub fn for_ordinal(&self, ordinal: u64) -> Result<Vec<SubmissionAttempt>, JournalError> {
        self.attempts
            .scan_prefix(ordinal.to_be_bytes())
            .values()
            .map(decode)
            .collect()
    }

    pub fn all(&self) -> Result<Vec<SubmissionAttempt>, JournalError> {
        self.attempts
            .iter()
            .values()
            .map(decode)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn flush(&self) -> Result<(), JournalError> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode(value: sled::Result<sled::IVec>) -> Result<SubmissionAttempt, JournalError> {
    Ok(serde_json::from_slice(&value?)?)
}

fn key(ordinal: u64, id: &[u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&ordinal.to_be_bytes());
    key.extend_from_slice(id);
    key
}
