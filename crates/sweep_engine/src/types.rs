use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persist::PersistError;

/// Opaque message identifier assigned by the mail service.
pub type MessageId = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: u64,
}

/// Outcome of a scan, persisted as the "last known" snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Domains sorted by descending count.
    pub top: Vec<DomainCount>,
    /// Messages that contributed to the tally.
    pub processed: u64,
    /// Page cap the scan was started with.
    pub pages: u32,
    /// Pages actually tallied.
    pub pages_scanned: u32,
    pub completed_at: DateTime<Utc>,
}

impl ScanResult {
    /// Drops every row whose domain matches `predicate`. Returns true if anything was removed.
    pub fn remove_domains(&mut self, mut predicate: impl FnMut(&str) -> bool) -> bool {
        let before = self.top.len();
        self.top.retain(|row| !predicate(&row.domain));
        self.top.len() != before
    }
}

/// Label changes applied by a bulk mutate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelChange {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelChange {
    /// Move to trash and out of the inbox.
    pub fn trash() -> Self {
        Self {
            add: vec!["TRASH".to_string()],
            remove: vec!["INBOX".to_string()],
        }
    }
}

/// What a bulk mutation resolves its message IDs from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Domain(String),
    Query(String),
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationTarget::Domain(domain) => write!(f, "domain {domain}"),
            MutationTarget::Query(query) => write!(f, "query \"{query}\""),
        }
    }
}

/// Operations that are mutually exclusive with themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Scan,
    Mutation,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Scan => write!(f, "scan"),
            OperationClass::Mutation => write!(f, "mutation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub processed: u64,
    /// 1-based number of the page that was just tallied.
    pub page: u32,
    pub skipped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationProgress {
    pub target: MutationTarget,
    pub processed: usize,
    /// 1-based number of the chunk that was just applied.
    pub chunk: usize,
    pub total: usize,
}

/// Events emitted by the engine. Every operation produces zero or more
/// progress events followed by exactly one terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ScanProgress(ScanProgress),
    ScanDone(ScanResult),
    ScanFailed {
        error: SweepError,
        partial: Option<ScanResult>,
    },
    MutationProgress(MutationProgress),
    MutationDone {
        target: MutationTarget,
        trashed: usize,
    },
    MutationFailed {
        target: MutationTarget,
        processed: usize,
        total: usize,
        error: SweepError,
    },
    LastResult(Option<ScanResult>),
    IgnoreList(Vec<String>),
    Rejected {
        class: OperationClass,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SweepError {
    pub kind: FailureKind,
    pub message: String,
}

impl SweepError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, message)
    }
}

impl From<PersistError> for SweepError {
    fn from(err: PersistError) -> Self {
        Self::new(FailureKind::Storage, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Token acquisition failed.
    Auth,
    /// Non-success response; the message carries the body text.
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidResponse,
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Auth => write!(f, "authentication failed"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
            FailureKind::Storage => write!(f, "storage error"),
        }
    }
}
