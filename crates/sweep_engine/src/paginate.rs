use sweep_logging::sweep_debug;

use crate::{ListPage, ListRequest, MailApi, MessageId, SweepError};

/// Walks the list endpoint one page at a time using continuation tokens.
///
/// Stops when a page carries no continuation token or when the page limit is
/// reached. A failed page leaves the cursor where it was, so calling
/// `next_page` again re-requests the same page.
pub struct Paginator<'a> {
    api: &'a dyn MailApi,
    request: ListRequest,
    page_limit: Option<usize>,
    pages_fetched: usize,
    exhausted: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(api: &'a dyn MailApi, query: impl Into<String>, page_size: usize) -> Self {
        Self {
            api,
            request: ListRequest {
                query: query.into(),
                page_size: page_size.max(1),
                label: None,
                page_token: None,
            },
            page_limit: None,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.request.label = label;
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// True while another call to `next_page` may hit the network.
    pub fn has_more(&self) -> bool {
        !self.exhausted && self.page_limit.is_none_or(|limit| self.pages_fetched < limit)
    }

    pub async fn next_page(&mut self) -> Result<Option<ListPage>, SweepError> {
        if !self.has_more() {
            return Ok(None);
        }

        let page = self.api.list_messages(&self.request).await?;
        self.pages_fetched += 1;
        sweep_debug!(
            "Listed page {} with {} ids (more: {})",
            self.pages_fetched,
            page.ids.len(),
            page.next_page_token.is_some()
        );

        match &page.next_page_token {
            Some(token) => self.request.page_token = Some(token.clone()),
            None => self.exhausted = true,
        }
        Ok(Some(page))
    }

    /// Drains every remaining page into one ID list.
    pub async fn collect_ids(mut self) -> Result<Vec<MessageId>, SweepError> {
        let mut ids = Vec::new();
        while let Some(page) = self.next_page().await? {
            ids.extend(page.ids);
        }
        Ok(ids)
    }
}
