use chrono::Utc;
use sweep_logging::{sweep_debug, sweep_info, sweep_warn};

use crate::bounded::fetch_metadata;
use crate::paginate::Paginator;
use crate::tally::{scan_query, DomainTally, IgnoreSet, TallySnapshot};
use crate::{
    EngineEvent, MailApi, ProgressSink, ScanProgress, ScanResult, SweepError, SweepSettings,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Requested page cap; clamped by the settings.
    pub pages: u32,
    /// Snapshot of the ignore list taken when the scan starts.
    pub ignore: IgnoreSet,
}

/// A scan that stopped early, with the last complete per-page snapshot if any.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scan failed: {error}")]
pub struct ScanFailure {
    pub error: SweepError,
    pub partial: Option<ScanResult>,
}

/// Lists, fetches and tallies page by page until the page cap is reached, a
/// page comes back empty, or no continuation token remains.
///
/// A `ScanProgress` event is emitted after every tallied page.
pub async fn run_scan(
    api: &dyn MailApi,
    settings: &SweepSettings,
    request: ScanRequest,
    sink: &dyn ProgressSink,
) -> Result<ScanResult, ScanFailure> {
    let pages = settings.clamp_pages(request.pages);
    let query = scan_query(&settings.scan_base_query, &request.ignore);
    sweep_info!("Scanning up to {} pages with query {:?}", pages, query);

    let mut paginator = Paginator::new(api, query, settings.page_size)
        .with_label(settings.scan_label.clone())
        .with_page_limit(pages as usize);
    let mut tally = DomainTally::new(request.ignore);
    let mut last_snapshot: Option<TallySnapshot> = None;
    let mut pages_scanned: u32 = 0;

    let fail = |error: SweepError, snapshot: Option<TallySnapshot>, pages_scanned: u32| {
        sweep_warn!(
            "Scan stopped after {} pages: {}",
            pages_scanned,
            error
        );
        ScanFailure {
            error,
            partial: snapshot.map(|s| s.into_result(pages, pages_scanned, Utc::now())),
        }
    };

    loop {
        let page = match paginator.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(error) => return Err(fail(error, last_snapshot, pages_scanned)),
        };
        if page.ids.is_empty() {
            sweep_debug!("Page {} is empty; scan complete", paginator.pages_fetched());
            break;
        }

        let metadata = match fetch_metadata(api, &page.ids, settings.fetch_concurrency).await {
            Ok(metadata) => metadata,
            Err(error) => return Err(fail(error, last_snapshot, pages_scanned)),
        };
        for message in &metadata {
            tally.record(message.from.as_deref());
        }

        pages_scanned += 1;
        sink.emit(EngineEvent::ScanProgress(ScanProgress {
            processed: tally.processed(),
            page: pages_scanned,
            skipped: tally.skipped(),
        }));
        last_snapshot = Some(tally.snapshot());
    }

    let result = tally
        .snapshot()
        .into_result(pages, pages_scanned, Utc::now());
    sweep_info!(
        "Scan finished: {} messages across {} domains in {} pages",
        result.processed,
        result.top.len(),
        pages_scanned
    );
    Ok(result)
}
