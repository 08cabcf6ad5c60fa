use crate::ScanSnapshot;

/// Work the front-end asks the engine to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadIgnoreList,
    LoadLastResult,
    StartScan { pages: u32 },
    TrashDomain { domain: String },
    PurgeByQuery { query: String },
    SaveIgnoreList(Vec<String>),
    SaveLastResult(ScanSnapshot),
}
