use crate::{
    normalize_domain, AppState, Effect, MutationTarget, Msg, Notice, OperationKind, ScanStatus,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Startup => {
            state.begin_loading(2);
            vec![Effect::LoadIgnoreList, Effect::LoadLastResult]
        }
        Msg::IgnoreListLoaded(domains) => {
            state.set_ignored(domains);
            state.finish_load();
            Vec::new()
        }
        Msg::LastResultLoaded(result) => {
            state.finish_load();
            // A scan started before the load finished owns the display.
            if state.scan_status() == ScanStatus::Scanning {
                return (state, Vec::new());
            }
            match result {
                Some(snapshot) => {
                    let completed_at_ms = snapshot.completed_at_ms;
                    let filtered = state.apply_result(snapshot);
                    state.set_notice(Notice::ShowingSaved { completed_at_ms });
                    filtered.map(Effect::SaveLastResult).into_iter().collect()
                }
                None => {
                    state.set_notice(Notice::NoSavedResult);
                    Vec::new()
                }
            }
        }
        Msg::ScanRequested { pages } => {
            if state.scan_status() == ScanStatus::Scanning {
                return (state, Vec::new());
            }
            let pages = state.limits().clamp(pages.unwrap_or_else(|| state.pages()));
            state.start_scan(pages);
            vec![Effect::StartScan { pages }]
        }
        Msg::ScanProgress { processed, .. } => {
            state.apply_scan_progress(processed);
            Vec::new()
        }
        Msg::ScanFinished(snapshot) => {
            let completed_at_ms = snapshot.completed_at_ms;
            state.end_scan(ScanStatus::Done);
            let filtered = state.apply_result(snapshot);
            state.set_notice(Notice::ScanComplete { completed_at_ms });
            filtered.map(Effect::SaveLastResult).into_iter().collect()
        }
        Msg::ScanFailed { error, partial } => {
            state.end_scan(ScanStatus::Failed);
            match partial {
                Some(snapshot) => {
                    let processed = Some(snapshot.processed);
                    let filtered = state.apply_result(snapshot);
                    state.set_notice(Notice::ScanFailed { error, processed });
                    filtered.map(Effect::SaveLastResult).into_iter().collect()
                }
                None => {
                    state.set_notice(Notice::ScanFailed {
                        error,
                        processed: None,
                    });
                    Vec::new()
                }
            }
        }
        Msg::TrashDomainRequested { domain } => {
            let Some(domain) = normalize_domain(&domain) else {
                return (state, Vec::new());
            };
            if state.mutation().is_some() {
                return (state, Vec::new());
            }
            state.start_mutation(MutationTarget::Domain(domain.clone()));
            vec![Effect::TrashDomain { domain }]
        }
        Msg::PurgeRequested { query } => {
            let query = query.trim().to_string();
            if query.is_empty() || state.mutation().is_some() {
                return (state, Vec::new());
            }
            state.start_mutation(MutationTarget::Query(query.clone()));
            vec![Effect::PurgeByQuery { query }]
        }
        Msg::MutationProgress {
            target,
            processed,
            total,
        } => {
            if state.mutation() == Some(&target) {
                state.set_notice(Notice::Mutating {
                    target,
                    processed,
                    total,
                });
            }
            Vec::new()
        }
        Msg::MutationFinished { target, trashed } => {
            state.end_mutation();
            let saved = match &target {
                MutationTarget::Domain(domain) => state.forget_domain(domain),
                MutationTarget::Query(_) => None,
            };
            state.set_notice(Notice::Mutated { target, trashed });
            saved.map(Effect::SaveLastResult).into_iter().collect()
        }
        Msg::MutationFailed {
            target,
            processed,
            total,
            error,
        } => {
            state.end_mutation();
            state.set_notice(Notice::MutationFailed {
                target,
                processed,
                total,
                error,
            });
            Vec::new()
        }
        Msg::IgnoreRequested { domain } => {
            let Some(domain) = normalize_domain(&domain) else {
                return (state, Vec::new());
            };
            if !state.ignore(&domain) {
                return (state, Vec::new());
            }
            let saved = state.forget_domain(&domain);
            state.set_notice(Notice::Ignored { domain });
            let mut effects = vec![Effect::SaveIgnoreList(state.ignored_list())];
            effects.extend(saved.map(Effect::SaveLastResult));
            effects
        }
        Msg::UnignoreRequested { domain } => {
            let Some(domain) = normalize_domain(&domain) else {
                return (state, Vec::new());
            };
            if !state.unignore(&domain) {
                return (state, Vec::new());
            }
            state.set_notice(Notice::Unignored { domain });
            vec![Effect::SaveIgnoreList(state.ignored_list())]
        }
        Msg::OperationRejected { kind, reason } => {
            match kind {
                OperationKind::Scan => {
                    if state.scan_status() == ScanStatus::Scanning {
                        state.end_scan(ScanStatus::Idle);
                        if let Some(snapshot) = state.last_result().cloned() {
                            state.apply_result(snapshot);
                        }
                    }
                }
                OperationKind::Mutation => state.end_mutation(),
            }
            state.set_notice(Notice::Rejected { kind, reason });
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
