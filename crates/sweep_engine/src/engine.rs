use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use sweep_logging::{sweep_error, sweep_info, sweep_warn};

use crate::lock::{OperationGuard, OperationLock};
use crate::mutate::run_bulk_trash;
use crate::persist::{KeyValueStore, StateStore};
use crate::scan::{run_scan, ScanRequest};
use crate::sink::ChannelProgressSink;
use crate::tally::IgnoreSet;
use crate::{
    EngineConfig, EngineEvent, MailApi, MutationTarget, OperationClass, ReqwestMailApi,
    ScanResult, SweepError, SweepSettings, TokenProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    StartScan { pages: u32 },
    TrashDomain { domain: String },
    PurgeByQuery { query: String },
    GetLastResult,
    GetIgnoreList,
    SaveLastResult(Option<ScanResult>),
    SaveIgnoreList(Vec<String>),
}

/// Runs commands on a background tokio runtime and reports back over a channel.
///
/// Storage commands are applied in the order they are sent. Scans and bulk
/// mutations run concurrently with each other but never with themselves, also
/// across engines sharing a file store directory.
pub struct EngineHandle {
    cmd_tx: Option<mpsc::Sender<EngineCommand>>,
    event_rx: mpsc::Receiver<EngineEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(
        config: EngineConfig,
        tokens: Arc<dyn TokenProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, SweepError> {
        let api = ReqwestMailApi::new(config.api, tokens)?;
        Ok(Self::with_api(Arc::new(api), config.sweep, store))
    }

    pub fn with_api(
        api: Arc<dyn MailApi>,
        settings: SweepSettings,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let lock = match store.lock_dir() {
            Some(dir) => OperationLock::with_lock_dir(dir),
            None => OperationLock::new(),
        };
        let context = Arc::new(EngineContext {
            api,
            settings,
            store: StateStore::new(store),
            lock,
        });

        let worker = thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    sweep_error!("Failed to start engine runtime: {}", err);
                    return;
                }
            };

            let mut running = Vec::new();
            while let Ok(command) = cmd_rx.recv() {
                running.retain(|task: &tokio::task::JoinHandle<()>| !task.is_finished());
                if let Some(task) = context.dispatch(&runtime, command, &event_tx) {
                    running.push(task);
                }
            }

            // Command channel closed: let running operations reach their terminal event.
            runtime.block_on(async {
                for task in running {
                    let _ = task.await;
                }
            });
        });

        Self {
            cmd_tx: Some(cmd_tx),
            event_rx,
            worker: Some(worker),
        }
    }

    pub fn send(&self, command: EngineCommand) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(command);
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks until the next event. `None` once the engine thread has exited.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Stops accepting commands and waits for running operations and pending writes.
    pub fn shutdown(mut self) {
        self.cmd_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                sweep_error!("Engine thread panicked");
            }
        }
    }
}

struct EngineContext {
    api: Arc<dyn MailApi>,
    settings: SweepSettings,
    store: StateStore,
    lock: OperationLock,
}

impl EngineContext {
    fn dispatch(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Runtime,
        command: EngineCommand,
        event_tx: &mpsc::Sender<EngineEvent>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        match command {
            EngineCommand::StartScan { pages } => {
                let guard = self.acquire(OperationClass::Scan, event_tx)?;
                let context = Arc::clone(self);
                let event_tx = event_tx.clone();
                Some(runtime.spawn(async move {
                    context.scan(pages, event_tx).await;
                    drop(guard);
                }))
            }
            EngineCommand::TrashDomain { domain } => {
                self.spawn_mutation(runtime, MutationTarget::Domain(domain), event_tx)
            }
            EngineCommand::PurgeByQuery { query } => {
                self.spawn_mutation(runtime, MutationTarget::Query(query), event_tx)
            }
            EngineCommand::GetLastResult => {
                let result = self.store.load_last_result().unwrap_or_else(|err| {
                    sweep_warn!("Failed to load last result: {}", err);
                    None
                });
                let _ = event_tx.send(EngineEvent::LastResult(result));
                None
            }
            EngineCommand::GetIgnoreList => {
                let ignore = self.store.load_ignore_list().unwrap_or_else(|err| {
                    sweep_warn!("Failed to load ignore list: {}", err);
                    IgnoreSet::new()
                });
                let _ = event_tx.send(EngineEvent::IgnoreList(ignore.into_iter().collect()));
                None
            }
            EngineCommand::SaveLastResult(result) => {
                if let Err(err) = self.store.save_last_result(result.as_ref()) {
                    sweep_error!("Failed to save last result: {}", err);
                }
                None
            }
            EngineCommand::SaveIgnoreList(domains) => {
                let ignore: IgnoreSet = domains.into_iter().collect();
                if let Err(err) = self.store.save_ignore_list(&ignore) {
                    sweep_error!("Failed to save ignore list: {}", err);
                }
                None
            }
        }
    }

    fn acquire(
        &self,
        class: OperationClass,
        event_tx: &mpsc::Sender<EngineEvent>,
    ) -> Option<OperationGuard> {
        match self.lock.try_acquire(class) {
            Ok(guard) => Some(guard),
            Err(err) => {
                sweep_warn!("Rejected {} request: {}", class, err);
                let _ = event_tx.send(EngineEvent::Rejected {
                    class,
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    fn spawn_mutation(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Runtime,
        target: MutationTarget,
        event_tx: &mpsc::Sender<EngineEvent>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let guard = self.acquire(OperationClass::Mutation, event_tx)?;
        let context = Arc::clone(self);
        let event_tx = event_tx.clone();
        Some(runtime.spawn(async move {
            context.mutate(target, event_tx).await;
            drop(guard);
        }))
    }

    async fn scan(&self, pages: u32, event_tx: mpsc::Sender<EngineEvent>) {
        let ignore = match self.store.load_ignore_list() {
            Ok(ignore) => ignore,
            Err(err) => {
                let _ = event_tx.send(EngineEvent::ScanFailed {
                    error: err.into(),
                    partial: None,
                });
                return;
            }
        };

        let sink = ChannelProgressSink::new(event_tx.clone());
        let request = ScanRequest { pages, ignore };
        match run_scan(self.api.as_ref(), &self.settings, request, &sink).await {
            Ok(result) => {
                self.persist_result(&result);
                let _ = event_tx.send(EngineEvent::ScanDone(result));
            }
            Err(failure) => {
                let partial = failure.partial.map(|mut partial| {
                    // Domains ignored while the scan was running are dropped from the partial view.
                    if let Ok(current) = self.store.load_ignore_list() {
                        partial.remove_domains(|domain| current.contains(domain));
                    }
                    self.persist_result(&partial);
                    partial
                });
                let _ = event_tx.send(EngineEvent::ScanFailed {
                    error: failure.error,
                    partial,
                });
            }
        }
    }

    async fn mutate(&self, target: MutationTarget, event_tx: mpsc::Sender<EngineEvent>) {
        let sink = ChannelProgressSink::new(event_tx.clone());
        let event = match run_bulk_trash(self.api.as_ref(), &self.settings, &target, &sink).await {
            Ok(summary) => {
                sweep_info!("Trashed {} messages for {}", summary.trashed, summary.target);
                EngineEvent::MutationDone {
                    target: summary.target,
                    trashed: summary.trashed,
                }
            }
            Err(failure) => EngineEvent::MutationFailed {
                target,
                processed: failure.processed,
                total: failure.total,
                error: failure.error,
            },
        };
        let _ = event_tx.send(event);
    }

    fn persist_result(&self, result: &ScanResult) {
        if let Err(err) = self.store.save_last_result(Some(result)) {
            sweep_error!("Failed to save scan result: {}", err);
        }
    }
}
