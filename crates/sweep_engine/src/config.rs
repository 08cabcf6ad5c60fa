use crate::{ApiSettings, LabelChange};

/// Knobs for the scan and bulk-trash pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    /// List page size; also the bulk-mutate chunk size.
    pub page_size: usize,
    /// Maximum metadata requests in flight during a scan.
    pub fetch_concurrency: usize,
    /// Label the scan is restricted to.
    pub scan_label: Option<String>,
    pub scan_base_query: String,
    /// Prepended to `from:{domain}` when resolving a domain for trashing.
    pub domain_query_prefix: String,
    pub trash: LabelChange,
    pub default_pages: u32,
    pub max_pages: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            page_size: 500,
            fetch_concurrency: 10,
            scan_label: Some("INBOX".to_string()),
            scan_base_query: "has:nouserlabels".to_string(),
            domain_query_prefix: "in:anywhere has:nouserlabels".to_string(),
            trash: LabelChange::trash(),
            default_pages: 5,
            max_pages: 50,
        }
    }
}

impl SweepSettings {
    /// Clamps a requested page cap to `1..=max_pages`; zero means the default.
    pub fn clamp_pages(&self, requested: u32) -> u32 {
        let requested = if requested == 0 {
            self.default_pages
        } else {
            requested
        };
        requested.clamp(1, self.max_pages.max(1))
    }

    pub fn domain_query(&self, domain: &str) -> String {
        if self.domain_query_prefix.is_empty() {
            format!("from:{domain}")
        } else {
            format!("{} from:{domain}", self.domain_query_prefix)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub api: ApiSettings,
    pub sweep: SweepSettings,
}
