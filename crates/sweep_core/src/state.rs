use std::collections::BTreeSet;

use crate::view_model::{AppViewModel, DomainRowView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainCount {
    pub domain: String,
    pub count: u64,
}

/// A scan result as the front-end sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSnapshot {
    pub top: Vec<DomainCount>,
    pub processed: u64,
    pub pages: u32,
    pub pages_scanned: u32,
    /// Unix epoch milliseconds.
    pub completed_at_ms: i64,
}

impl ScanSnapshot {
    fn contains(&self, domain: &str) -> bool {
        self.top.iter().any(|row| row.domain == domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Domain(String),
    Query(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStatus {
    #[default]
    Idle,
    Scanning,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Scan,
    Mutation,
}

/// The one-line status shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Notice {
    #[default]
    None,
    Loading,
    NoSavedResult,
    ShowingSaved {
        completed_at_ms: i64,
    },
    Scanning {
        pages: u32,
        processed: u64,
    },
    ScanComplete {
        completed_at_ms: i64,
    },
    /// `processed` is set when a partial result is on display.
    ScanFailed {
        error: String,
        processed: Option<u64>,
    },
    Mutating {
        target: MutationTarget,
        processed: usize,
        total: usize,
    },
    Mutated {
        target: MutationTarget,
        trashed: usize,
    },
    MutationFailed {
        target: MutationTarget,
        processed: usize,
        total: usize,
        error: String,
    },
    Ignored {
        domain: String,
    },
    Unignored {
        domain: String,
    },
    Rejected {
        kind: OperationKind,
        reason: String,
    },
}

/// Page cap bounds, supplied by whoever runs the scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_pages: u32,
    pub max_pages: u32,
}

impl PageLimits {
    /// Clamps a requested page cap to `1..=max_pages`; zero falls back to the default.
    pub fn clamp(&self, requested: u32) -> u32 {
        let requested = if requested == 0 {
            self.default_pages
        } else {
            requested
        };
        requested.clamp(1, self.max_pages.max(1))
    }
}

/// Trimmed, lowercased domain; `None` when nothing is left.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_start_matches('@').to_ascii_lowercase();
    (!domain.is_empty()).then_some(domain)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    limits: PageLimits,
    pages: u32,
    top: Vec<DomainCount>,
    processed: u64,
    last_result: Option<ScanSnapshot>,
    ignored: BTreeSet<String>,
    scan: ScanStatus,
    mutation: Option<MutationTarget>,
    pending_loads: u8,
    notice: Notice,
    dirty: bool,
}

impl AppState {
    pub fn new(limits: PageLimits) -> Self {
        Self {
            limits,
            pages: limits.clamp(limits.default_pages),
            top: Vec::new(),
            processed: 0,
            last_result: None,
            ignored: BTreeSet::new(),
            scan: ScanStatus::Idle,
            mutation: None,
            pending_loads: 0,
            notice: Notice::None,
            dirty: false,
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            scan: self.scan,
            pages: self.pages,
            processed: self.processed,
            rows: self
                .top
                .iter()
                .map(|row| DomainRowView {
                    domain: row.domain.clone(),
                    count: row.count,
                })
                .collect(),
            ignored: self.ignored.iter().cloned().collect(),
            notice: self.notice.clone(),
            mutation: self.mutation.clone(),
        }
    }

    /// True while a load, scan or mutation is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending_loads > 0 || self.scan == ScanStatus::Scanning || self.mutation.is_some()
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn last_result(&self) -> Option<&ScanSnapshot> {
        self.last_result.as_ref()
    }

    pub fn is_ignored(&self, domain: &str) -> bool {
        self.ignored.contains(domain)
    }

    pub(crate) fn scan_status(&self) -> ScanStatus {
        self.scan
    }

    pub(crate) fn mutation(&self) -> Option<&MutationTarget> {
        self.mutation.as_ref()
    }

    pub(crate) fn pages(&self) -> u32 {
        self.pages
    }

    pub(crate) fn limits(&self) -> PageLimits {
        self.limits
    }

    pub(crate) fn set_notice(&mut self, notice: Notice) {
        self.notice = notice;
        self.dirty = true;
    }

    pub(crate) fn begin_loading(&mut self, loads: u8) {
        self.pending_loads = loads;
        self.set_notice(Notice::Loading);
    }

    pub(crate) fn finish_load(&mut self) {
        self.pending_loads = self.pending_loads.saturating_sub(1);
        self.dirty = true;
    }

    pub(crate) fn set_ignored(&mut self, domains: Vec<String>) {
        self.ignored = domains
            .iter()
            .filter_map(|d| normalize_domain(d))
            .collect();
        self.filter_top();
    }

    /// Adds a domain to the ignore set. Returns false if it was already there.
    pub(crate) fn ignore(&mut self, domain: &str) -> bool {
        if !self.ignored.insert(domain.to_string()) {
            return false;
        }
        self.filter_top();
        true
    }

    pub(crate) fn unignore(&mut self, domain: &str) -> bool {
        let removed = self.ignored.remove(domain);
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub(crate) fn ignored_list(&self) -> Vec<String> {
        self.ignored.iter().cloned().collect()
    }

    pub(crate) fn start_scan(&mut self, pages: u32) {
        self.pages = pages;
        self.scan = ScanStatus::Scanning;
        self.top.clear();
        self.processed = 0;
        self.set_notice(Notice::Scanning {
            pages,
            processed: 0,
        });
    }

    pub(crate) fn apply_scan_progress(&mut self, processed: u64) {
        if self.scan != ScanStatus::Scanning {
            return;
        }
        self.processed = self.processed.max(processed);
        self.set_notice(Notice::Scanning {
            pages: self.pages,
            processed: self.processed,
        });
    }

    pub(crate) fn end_scan(&mut self, status: ScanStatus) {
        self.scan = status;
        self.dirty = true;
    }

    /// Shows `snapshot` minus ignored domains. Returns the filtered snapshot if
    /// filtering removed anything, so the caller can persist it.
    pub(crate) fn apply_result(&mut self, snapshot: ScanSnapshot) -> Option<ScanSnapshot> {
        let mut filtered = snapshot;
        let before = filtered.top.len();
        filtered
            .top
            .retain(|row| !self.ignored.contains(&row.domain));
        let changed = filtered.top.len() != before;

        self.top = filtered.top.clone();
        self.processed = filtered.processed;
        self.pages = self.limits.clamp(filtered.pages);
        self.last_result = Some(filtered.clone());
        self.dirty = true;
        changed.then_some(filtered)
    }

    /// Drops a domain from the list and the remembered result. Returns the
    /// updated result if it changed.
    pub(crate) fn forget_domain(&mut self, domain: &str) -> Option<ScanSnapshot> {
        let before = self.top.len();
        self.top.retain(|row| row.domain != domain);
        if self.top.len() != before {
            self.dirty = true;
        }

        let result = self.last_result.as_mut()?;
        if !result.contains(domain) {
            return None;
        }
        result.top.retain(|row| row.domain != domain);
        Some(result.clone())
    }

    pub(crate) fn start_mutation(&mut self, target: MutationTarget) {
        self.mutation = Some(target.clone());
        self.set_notice(Notice::Mutating {
            target,
            processed: 0,
            total: 0,
        });
    }

    pub(crate) fn end_mutation(&mut self) {
        self.mutation = None;
        self.dirty = true;
    }

    fn filter_top(&mut self) {
        let before = self.top.len();
        let ignored = &self.ignored;
        self.top.retain(|row| !ignored.contains(&row.domain));
        if self.top.len() != before {
            self.dirty = true;
        }
    }
}
