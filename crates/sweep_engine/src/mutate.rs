use sweep_logging::{sweep_debug, sweep_info, sweep_warn};

use crate::paginate::Paginator;
use crate::{
    EngineEvent, MailApi, MutationProgress, MutationTarget, ProgressSink, SweepError,
    SweepSettings,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSummary {
    pub target: MutationTarget,
    pub trashed: usize,
}

/// A bulk mutation that stopped at a failed list or chunk call.
///
/// Chunks before the failure stay mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bulk trash failed after {processed} of {total}: {error}")]
pub struct MutationFailure {
    pub error: SweepError,
    pub processed: usize,
    pub total: usize,
}

impl MutationTarget {
    pub fn query(&self, settings: &SweepSettings) -> String {
        match self {
            MutationTarget::Domain(domain) => settings.domain_query(domain),
            MutationTarget::Query(query) => query.clone(),
        }
    }
}

/// Resolves every matching ID, then trashes them one chunk at a time.
///
/// A `MutationProgress` event follows each applied chunk.
pub async fn run_bulk_trash(
    api: &dyn MailApi,
    settings: &SweepSettings,
    target: &MutationTarget,
    sink: &dyn ProgressSink,
) -> Result<MutationSummary, MutationFailure> {
    let query = target.query(settings);
    sweep_info!("Resolving messages for {}", target);

    let ids = Paginator::new(api, query, settings.page_size)
        .collect_ids()
        .await
        .map_err(|error| MutationFailure {
            error,
            processed: 0,
            total: 0,
        })?;
    let total = ids.len();
    sweep_info!("Trashing {} messages for {}", total, target);

    let mut processed = 0;
    for (index, chunk) in ids.chunks(settings.page_size.max(1)).enumerate() {
        if let Err(error) = api.batch_modify(chunk, &settings.trash).await {
            sweep_warn!(
                "Chunk {} for {} failed after {} of {}: {}",
                index + 1,
                target,
                processed,
                total,
                error
            );
            return Err(MutationFailure {
                error,
                processed,
                total,
            });
        }
        processed += chunk.len();
        sweep_debug!("Chunk {} applied ({}/{})", index + 1, processed, total);
        sink.emit(EngineEvent::MutationProgress(MutationProgress {
            target: target.clone(),
            processed,
            chunk: index + 1,
            total,
        }));
    }

    Ok(MutationSummary {
        target: target.clone(),
        trashed: total,
    })
}

