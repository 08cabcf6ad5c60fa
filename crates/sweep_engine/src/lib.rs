//! Sweep engine: mail API client, scan and bulk-trash pipelines, persistence.
mod api;
mod auth;
mod bounded;
mod config;
mod engine;
mod lock;
mod mutate;
mod paginate;
mod persist;
mod scan;
mod sink;
mod tally;
mod types;

pub use api::{
    ApiSettings, ListPage, ListRequest, MailApi, MessageMetadata, ReqwestMailApi,
    DEFAULT_API_BASE,
};
pub use auth::{CommandTokenProvider, MissingTokenProvider, StaticTokenProvider, TokenProvider};
pub use bounded::{bounded_map, fetch_metadata};
pub use config::{EngineConfig, SweepSettings};
pub use engine::{EngineCommand, EngineHandle};
pub use lock::{LockError, OperationGuard, OperationLock};
pub use mutate::{run_bulk_trash, MutationFailure, MutationSummary};
pub use paginate::Paginator;
pub use persist::{
    ensure_state_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, PersistError,
    StateStore, IGNORE_LIST_KEY, LAST_RESULT_KEY,
};
pub use scan::{run_scan, ScanFailure, ScanRequest};
pub use sink::{ChannelProgressSink, ProgressSink};
pub use tally::{
    extract_domain, extract_email, ignore_query, scan_query, sender_domain, DomainTally,
    IgnoreSet, TallySnapshot,
};
pub use types::{
    DomainCount, EngineEvent, FailureKind, LabelChange, MessageId, MutationProgress,
    MutationTarget, OperationClass, ScanProgress, ScanResult, SweepError,
};
