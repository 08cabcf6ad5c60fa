//! Plain-text rendering of the view model.

use chrono::{DateTime, Local};
use sweep_core::{AppViewModel, MutationTarget, Notice, OperationKind};

const SEARCH_URL_PREFIX: &str = "https://mail.google.com/mail/u/0/#search/from%3A";

/// Web search link listing the mail from `domain`.
pub fn search_url(domain: &str) -> String {
    format!("{SEARCH_URL_PREFIX}{domain}")
}

pub fn format_with_commas(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_timestamp(epoch_ms: i64) -> String {
    match DateTime::from_timestamp_millis(epoch_ms) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => "an unknown time".to_string(),
    }
}

fn describe_target(target: &MutationTarget) -> String {
    match target {
        MutationTarget::Domain(domain) => domain.clone(),
        MutationTarget::Query(query) => format!("\"{query}\""),
    }
}

pub fn status_line(view: &AppViewModel) -> String {
    match &view.notice {
        Notice::None => String::new(),
        Notice::Loading => "Loading saved state...".to_string(),
        Notice::NoSavedResult => "No saved scan yet. Run `inbox-sweep scan` first.".to_string(),
        Notice::ShowingSaved { completed_at_ms } => {
            format!("Last scan from {}.", format_timestamp(*completed_at_ms))
        }
        Notice::Scanning { pages, processed } => format!(
            "Scanning up to {pages} pages... {} messages counted",
            format_with_commas(*processed)
        ),
        Notice::ScanComplete { completed_at_ms } => format!(
            "Scan complete: {} messages counted ({}).",
            format_with_commas(view.processed),
            format_timestamp(*completed_at_ms)
        ),
        Notice::ScanFailed {
            error,
            processed: Some(processed),
        } => format!(
            "Scan stopped after {} messages: {error}. Showing partial results.",
            format_with_commas(*processed)
        ),
        Notice::ScanFailed {
            error,
            processed: None,
        } => format!("Scan failed: {error}"),
        Notice::Mutating {
            target,
            total: 0,
            ..
        } => format!("Collecting messages from {}...", describe_target(target)),
        Notice::Mutating {
            target,
            processed,
            total,
        } => format!(
            "Trashing {}: {} of {}",
            describe_target(target),
            format_with_commas(*processed as u64),
            format_with_commas(*total as u64)
        ),
        Notice::Mutated { target, trashed } => format!(
            "Moved {} messages from {} to trash.",
            format_with_commas(*trashed as u64),
            describe_target(target)
        ),
        Notice::MutationFailed {
            target,
            processed,
            total,
            error,
        } => format!(
            "Trashing {} stopped after {} of {}: {error}",
            describe_target(target),
            format_with_commas(*processed as u64),
            format_with_commas(*total as u64)
        ),
        Notice::Ignored { domain } => format!("Ignoring {domain} in future scans."),
        Notice::Unignored { domain } => format!("{domain} will be counted in the next scan."),
        Notice::Rejected { kind, reason } => {
            let what = match kind {
                OperationKind::Scan => "Scan",
                OperationKind::Mutation => "Trash",
            };
            format!("{what} refused: {reason}")
        }
    }
}

/// Ranked domain table with search links; empty when there is nothing to show.
pub fn domain_table(view: &AppViewModel, limit: usize) -> String {
    let rows = view.top_rows(limit);
    if rows.is_empty() {
        return String::new();
    }

    let domain_width = rows
        .iter()
        .map(|row| row.domain.len())
        .max()
        .unwrap_or(0)
        .max("DOMAIN".len());
    let counts: Vec<String> = rows.iter().map(|row| format_with_commas(row.count)).collect();
    let count_width = counts
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("COUNT".len());

    let mut out = format!(
        "{:>3}  {:<domain_width$}  {:>count_width$}  SEARCH\n",
        "#", "DOMAIN", "COUNT"
    );
    for (rank, (row, count)) in rows.iter().zip(&counts).enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<domain_width$}  {:>count_width$}  {}\n",
            rank + 1,
            row.domain,
            count,
            search_url(&row.domain)
        ));
    }
    if view.rows.len() > rows.len() {
        out.push_str(&format!(
            "     ... {} more domains (use --top to show more)\n",
            view.rows.len() - rows.len()
        ));
    }
    out
}

pub fn ignored_list(view: &AppViewModel) -> String {
    if view.ignored.is_empty() {
        return "No ignored domains.\n".to_string();
    }
    view.ignored
        .iter()
        .map(|domain| format!("{domain}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sweep_core::DomainRowView;

    fn view_with(rows: &[(&str, u64)]) -> AppViewModel {
        AppViewModel {
            rows: rows
                .iter()
                .map(|(domain, count)| DomainRowView {
                    domain: domain.to_string(),
                    count: *count,
                })
                .collect(),
            ..AppViewModel::default()
        }
    }

    #[test]
    fn commas_group_thousands() {
        assert_eq!(format_with_commas(0), "0");
        assert_eq!(format_with_commas(999), "999");
        assert_eq!(format_with_commas(1000), "1,000");
        assert_eq!(format_with_commas(1234567), "1,234,567");
    }

    #[test]
    fn search_url_escapes_the_operator() {
        assert_eq!(
            search_url("news.example"),
            "https://mail.google.com/mail/u/0/#search/from%3Anews.example"
        );
    }

    #[test]
    fn table_is_aligned_and_truncated() {
        let view = view_with(&[("a.example", 1200), ("bb.example", 7), ("c.example", 1)]);
        let table = domain_table(&view, 2);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "  #  DOMAIN      COUNT  SEARCH");
        assert_eq!(
            lines[1],
            "  1  a.example   1,200  https://mail.google.com/mail/u/0/#search/from%3Aa.example"
        );
        assert_eq!(
            lines[2],
            "  2  bb.example      7  https://mail.google.com/mail/u/0/#search/from%3Abb.example"
        );
        assert_eq!(lines[3], "     ... 1 more domains (use --top to show more)");
    }

    #[test]
    fn empty_table_renders_nothing() {
        assert_eq!(domain_table(&view_with(&[]), 10), "");
    }

    #[test]
    fn mutation_status_reads_naturally() {
        let mut view = view_with(&[]);
        view.notice = Notice::Mutating {
            target: MutationTarget::Domain("a.example".into()),
            processed: 1000,
            total: 1200,
        };
        assert_eq!(status_line(&view), "Trashing a.example: 1,000 of 1,200");

        view.notice = Notice::Mutating {
            target: MutationTarget::Query("label:promotions".into()),
            processed: 0,
            total: 0,
        };
        assert_eq!(
            status_line(&view),
            "Collecting messages from \"label:promotions\"..."
        );
    }

    #[test]
    fn failed_scan_mentions_the_partial_count() {
        let mut view = view_with(&[]);
        view.notice = Notice::ScanFailed {
            error: "timeout: request timed out".into(),
            processed: Some(1500),
        };
        assert_eq!(
            status_line(&view),
            "Scan stopped after 1,500 messages: timeout: request timed out. Showing partial results."
        );
    }

    #[test]
    fn ignored_list_has_a_placeholder() {
        let mut view = view_with(&[]);
        assert_eq!(ignored_list(&view), "No ignored domains.\n");
        view.ignored = vec!["a.example".into(), "b.example".into()];
        assert_eq!(ignored_list(&view), "a.example\nb.example\n");
    }
}
