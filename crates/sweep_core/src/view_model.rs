use crate::{MutationTarget, Notice, ScanStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub scan: ScanStatus,
    pub pages: u32,
    pub processed: u64,
    pub rows: Vec<DomainRowView>,
    pub ignored: Vec<String>,
    pub notice: Notice,
    pub mutation: Option<MutationTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRowView {
    pub domain: String,
    pub count: u64,
}

impl AppViewModel {
    /// The `limit` highest-count rows; rows are already sorted.
    pub fn top_rows(&self, limit: usize) -> &[DomainRowView] {
        &self.rows[..self.rows.len().min(limit)]
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.notice,
            Notice::ScanFailed { .. } | Notice::MutationFailed { .. } | Notice::Rejected { .. }
        )
    }
}
