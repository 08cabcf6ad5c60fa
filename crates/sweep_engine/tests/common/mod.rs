#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sweep_engine::{
    EngineEvent, FailureKind, LabelChange, ListPage, ListRequest, MailApi, MessageId,
    MessageMetadata, ProgressSink, SweepError,
};

/// Scripted mail backend. Pages are addressed by their index, which doubles as
/// the continuation token.
#[derive(Default)]
pub struct FakeMailApi {
    pages: Vec<Vec<MessageId>>,
    senders: HashMap<MessageId, String>,
    endless: bool,
    fail_list_at: Option<usize>,
    fail_metadata_for: Option<MessageId>,
    fail_modify_at: Option<usize>,
    delays: HashMap<MessageId, Duration>,
    list_delay: Option<Duration>,
    list_calls: Mutex<Vec<ListRequest>>,
    modify_calls: Mutex<Vec<(Vec<MessageId>, LabelChange)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeMailApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one list page; each entry is `(id, from header)`.
    pub fn with_page(mut self, messages: &[(&str, &str)]) -> Self {
        let mut ids = Vec::new();
        for (id, from) in messages {
            ids.push(id.to_string());
            self.senders.insert(id.to_string(), from.to_string());
        }
        self.pages.push(ids);
        self
    }

    /// Splits `count` generated IDs into pages of `page_size`.
    pub fn with_ids(mut self, count: usize, page_size: usize) -> Self {
        let ids: Vec<MessageId> = (0..count).map(|i| format!("id-{i}")).collect();
        for chunk in ids.chunks(page_size) {
            self.pages.push(chunk.to_vec());
        }
        self
    }

    /// Every page returns one ID and a continuation token.
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Fails the n-th list call (1-based).
    pub fn fail_list_at(mut self, call: usize) -> Self {
        self.fail_list_at = Some(call);
        self
    }

    pub fn fail_metadata_for(mut self, id: &str) -> Self {
        self.fail_metadata_for = Some(id.to_string());
        self
    }

    /// Fails the n-th batch modify call (1-based).
    pub fn fail_modify_at(mut self, call: usize) -> Self {
        self.fail_modify_at = Some(call);
        self
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn list_calls(&self) -> Vec<ListRequest> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn modify_calls(&self) -> Vec<(Vec<MessageId>, LabelChange)> {
        self.modify_calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn backend_error() -> SweepError {
    SweepError {
        kind: FailureKind::HttpStatus(500),
        message: "backend unavailable".to_string(),
    }
}

#[async_trait::async_trait]
impl MailApi for FakeMailApi {
    async fn list_messages(&self, request: &ListRequest) -> Result<ListPage, SweepError> {
        let call = {
            let mut calls = self.list_calls.lock().unwrap();
            calls.push(request.clone());
            calls.len()
        };
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_list_at == Some(call) {
            return Err(backend_error());
        }
        if self.endless {
            return Ok(ListPage {
                ids: vec![format!("endless-{call}")],
                next_page_token: Some(call.to_string()),
            });
        }

        let index: usize = request
            .page_token
            .as_deref()
            .and_then(|token| token.parse().ok())
            .unwrap_or(0);
        let ids = self.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        Ok(ListPage {
            ids,
            next_page_token,
        })
    }

    async fn message_metadata(&self, id: &str) -> Result<MessageMetadata, SweepError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .delays
            .get(id)
            .copied()
            .unwrap_or(Duration::from_millis(2));
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_metadata_for.as_deref() == Some(id) {
            return Err(backend_error());
        }
        Ok(MessageMetadata {
            id: id.to_string(),
            from: self.senders.get(id).cloned(),
        })
    }

    async fn batch_modify(
        &self,
        ids: &[MessageId],
        change: &LabelChange,
    ) -> Result<(), SweepError> {
        let call = {
            let mut calls = self.modify_calls.lock().unwrap();
            calls.push((ids.to_vec(), change.clone()));
            calls.len()
        };
        if self.fail_modify_at == Some(call) {
            return Err(backend_error());
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn init_logging() {
    sweep_logging::initialize_for_tests();
}
