use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::{DomainCount, ScanResult};

/// Domains excluded from both the scan query and the tally.
pub type IgnoreSet = BTreeSet<String>;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_.+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern compiles")
});

/// First email-looking substring of a header value, lowercased.
pub fn extract_email(header: &str) -> Option<String> {
    EMAIL_PATTERN
        .find(header)
        .map(|m| m.as_str().to_lowercase())
}

/// The part after the sole `@`.
pub fn extract_domain(email: &str) -> Option<&str> {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(domain), None) if !domain.is_empty() => Some(domain),
        _ => None,
    }
}

/// Sender domain of a `From` header, if one can be parsed.
pub fn sender_domain(header: Option<&str>) -> Option<String> {
    let email = extract_email(header?)?;
    extract_domain(&email).map(str::to_string)
}

/// Search terms that keep ignored domains out of a listing: `-from:a -from:b`.
pub fn ignore_query(ignore: &IgnoreSet) -> String {
    ignore
        .iter()
        .map(|domain| format!("-from:{domain}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn scan_query(base: &str, ignore: &IgnoreSet) -> String {
    let excluded = ignore_query(ignore);
    match (base.is_empty(), excluded.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => excluded,
        (false, false) => format!("{base} {excluded}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TallySnapshot {
    pub top: Vec<DomainCount>,
    pub processed: u64,
    pub skipped: u64,
}

impl TallySnapshot {
    pub fn into_result(self, pages: u32, pages_scanned: u32, completed_at: DateTime<Utc>) -> ScanResult {
        ScanResult {
            top: self.top,
            processed: self.processed,
            pages,
            pages_scanned,
            completed_at,
        }
    }
}

/// Running per-domain counts for one scan.
#[derive(Debug, Clone, Default)]
pub struct DomainTally {
    counts: HashMap<String, u64>,
    processed: u64,
    skipped: u64,
    ignore: IgnoreSet,
}

impl DomainTally {
    pub fn new(ignore: IgnoreSet) -> Self {
        Self {
            ignore,
            ..Self::default()
        }
    }

    /// Counts one message by its `From` header. Returns whether it was counted.
    ///
    /// Unparseable senders are skipped; ignored domains are dropped silently.
    pub fn record(&mut self, from: Option<&str>) -> bool {
        let Some(domain) = sender_domain(from) else {
            self.skipped += 1;
            return false;
        };
        if self.ignore.contains(&domain) {
            return false;
        }
        *self.counts.entry(domain).or_insert(0) += 1;
        self.processed += 1;
        true
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Domains by descending count; equal counts fall back to name order.
    pub fn snapshot(&self) -> TallySnapshot {
        let mut top: Vec<DomainCount> = self
            .counts
            .iter()
            .map(|(domain, count)| DomainCount {
                domain: domain.clone(),
                count: *count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));

        TallySnapshot {
            top,
            processed: self.processed,
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_display_name_header() {
        let email = extract_email("Jane Doe <Jane.Doe+news@Sub.Example.COM>").unwrap();
        assert_eq!(email, "jane.doe+news@sub.example.com");
        assert_eq!(extract_domain(&email), Some("sub.example.com"));
    }

    #[test]
    fn header_without_at_sign_has_no_domain() {
        assert_eq!(sender_domain(Some("Mailer Daemon")), None);
        assert_eq!(sender_domain(Some("")), None);
        assert_eq!(sender_domain(None), None);
    }

    #[test]
    fn domain_requires_exactly_one_at() {
        assert_eq!(extract_domain("a@b@c.com"), None);
        assert_eq!(extract_domain("nobody"), None);
    }

    #[test]
    fn scan_query_appends_exclusions() {
        let ignore: IgnoreSet = ["b.com".to_string(), "a.com".to_string()].into();
        assert_eq!(
            scan_query("has:nouserlabels", &ignore),
            "has:nouserlabels -from:a.com -from:b.com"
        );
        assert_eq!(scan_query("has:nouserlabels", &IgnoreSet::new()), "has:nouserlabels");
    }
}
