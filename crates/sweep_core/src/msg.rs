use crate::{MutationTarget, OperationKind, ScanSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Front-end opened; persisted state should be loaded.
    Startup,
    /// Persisted ignore list arrived.
    IgnoreListLoaded(Vec<String>),
    /// Persisted last scan result arrived.
    LastResultLoaded(Option<ScanSnapshot>),
    /// User asked for a (re)scan. `None` keeps the current page setting.
    ScanRequested { pages: Option<u32> },
    ScanProgress { processed: u64, page: u32 },
    ScanFinished(ScanSnapshot),
    /// Scan stopped; `partial` is the best tally gathered before the error.
    ScanFailed {
        error: String,
        partial: Option<ScanSnapshot>,
    },
    TrashDomainRequested { domain: String },
    PurgeRequested { query: String },
    MutationProgress {
        target: MutationTarget,
        processed: usize,
        total: usize,
    },
    MutationFinished {
        target: MutationTarget,
        trashed: usize,
    },
    MutationFailed {
        target: MutationTarget,
        processed: usize,
        total: usize,
        error: String,
    },
    IgnoreRequested { domain: String },
    UnignoreRequested { domain: String },
    /// The engine refused to start an operation because one of its class is running.
    OperationRejected { kind: OperationKind, reason: String },
    /// Render tick.
    Tick,
    NoOp,
}
