use chrono::DateTime;
use sweep_core::{DomainCount, Effect, Msg, MutationTarget, OperationKind, ScanSnapshot};
use sweep_engine::{EngineCommand, EngineEvent, EngineHandle, OperationClass, ScanResult};
use sweep_logging::{sweep_debug, sweep_info, sweep_warn};

/// Forwards core effects to the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            let command = command_for(effect);
            sweep_debug!("Engine command: {}", command_label(&command));
            self.engine.send(command);
        }
    }

    /// Blocks for the next engine event. `None` once the engine has stopped.
    pub fn next_msg(&self) -> Option<Msg> {
        self.engine.recv().map(msg_for_event)
    }

    /// Waits for pending writes and running operations.
    pub fn shutdown(self) {
        self.engine.shutdown();
    }
}

fn command_label(command: &EngineCommand) -> &'static str {
    match command {
        EngineCommand::StartScan { .. } => "StartScan",
        EngineCommand::TrashDomain { .. } => "TrashDomain",
        EngineCommand::PurgeByQuery { .. } => "PurgeByQuery",
        EngineCommand::GetLastResult => "GetLastResult",
        EngineCommand::GetIgnoreList => "GetIgnoreList",
        EngineCommand::SaveLastResult(_) => "SaveLastResult",
        EngineCommand::SaveIgnoreList(_) => "SaveIgnoreList",
    }
}

pub(crate) fn command_for(effect: Effect) -> EngineCommand {
    match effect {
        Effect::LoadIgnoreList => EngineCommand::GetIgnoreList,
        Effect::LoadLastResult => EngineCommand::GetLastResult,
        Effect::StartScan { pages } => EngineCommand::StartScan { pages },
        Effect::TrashDomain { domain } => EngineCommand::TrashDomain { domain },
        Effect::PurgeByQuery { query } => EngineCommand::PurgeByQuery { query },
        Effect::SaveIgnoreList(domains) => EngineCommand::SaveIgnoreList(domains),
        Effect::SaveLastResult(snapshot) => EngineCommand::SaveLastResult(Some(to_result(snapshot))),
    }
}

pub(crate) fn msg_for_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::ScanProgress(progress) => {
            sweep_debug!(
                "Scan page {}: {} counted, {} skipped",
                progress.page,
                progress.processed,
                progress.skipped
            );
            Msg::ScanProgress {
                processed: progress.processed,
                page: progress.page,
            }
        }
        EngineEvent::ScanDone(result) => {
            sweep_info!(
                "Scan finished: {} messages over {} pages",
                result.processed,
                result.pages_scanned
            );
            Msg::ScanFinished(to_snapshot(result))
        }
        EngineEvent::ScanFailed { error, partial } => {
            sweep_warn!("Scan failed: {}", error);
            Msg::ScanFailed {
                error: error.to_string(),
                partial: partial.map(to_snapshot),
            }
        }
        EngineEvent::MutationProgress(progress) => Msg::MutationProgress {
            target: to_core_target(progress.target),
            processed: progress.processed,
            total: progress.total,
        },
        EngineEvent::MutationDone { target, trashed } => Msg::MutationFinished {
            target: to_core_target(target),
            trashed,
        },
        EngineEvent::MutationFailed {
            target,
            processed,
            total,
            error,
        } => {
            sweep_warn!("Trash for {} failed after {}/{}: {}", target, processed, total, error);
            Msg::MutationFailed {
                target: to_core_target(target),
                processed,
                total,
                error: error.to_string(),
            }
        }
        EngineEvent::LastResult(result) => Msg::LastResultLoaded(result.map(to_snapshot)),
        EngineEvent::IgnoreList(domains) => Msg::IgnoreListLoaded(domains),
        EngineEvent::Rejected { class, reason } => Msg::OperationRejected {
            kind: match class {
                OperationClass::Scan => OperationKind::Scan,
                OperationClass::Mutation => OperationKind::Mutation,
            },
            reason,
        },
    }
}

fn to_snapshot(result: ScanResult) -> ScanSnapshot {
    ScanSnapshot {
        top: result
            .top
            .into_iter()
            .map(|row| DomainCount {
                domain: row.domain,
                count: row.count,
            })
            .collect(),
        processed: result.processed,
        pages: result.pages,
        pages_scanned: result.pages_scanned,
        completed_at_ms: result.completed_at.timestamp_millis(),
    }
}

fn to_result(snapshot: ScanSnapshot) -> ScanResult {
    ScanResult {
        top: snapshot
            .top
            .into_iter()
            .map(|row| sweep_engine::DomainCount {
                domain: row.domain,
                count: row.count,
            })
            .collect(),
        processed: snapshot.processed,
        pages: snapshot.pages,
        pages_scanned: snapshot.pages_scanned,
        completed_at: DateTime::from_timestamp_millis(snapshot.completed_at_ms).unwrap_or_default(),
    }
}

fn to_core_target(target: sweep_engine::MutationTarget) -> MutationTarget {
    match target {
        sweep_engine::MutationTarget::Domain(domain) => MutationTarget::Domain(domain),
        sweep_engine::MutationTarget::Query(query) => MutationTarget::Query(query),
    }
}
