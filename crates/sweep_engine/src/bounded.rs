use std::future::Future;

use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::{MailApi, MessageId, MessageMetadata, SweepError};

/// Maps `items` through `f` with at most `limit` futures outstanding.
///
/// A slot is refilled as soon as any future completes, so the pool stays
/// saturated until the input runs out. Output order matches input order. The
/// first error is returned and the remaining in-flight futures are dropped.
pub async fn bounded_map<'a, T, R, E, F, Fut>(
    items: &'a [T],
    limit: usize,
    f: F,
) -> Result<Vec<R>, E>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let limit = limit.max(1);
    let mut slots: Vec<Option<R>> = Vec::with_capacity(items.len());
    slots.resize_with(items.len(), || None);

    let start = |index: usize| {
        let fut = f(&items[index]);
        async move { (index, fut.await) }
    };

    let mut in_flight = FuturesUnordered::new();
    let mut cursor = 0;
    while cursor < items.len() && in_flight.len() < limit {
        in_flight.push(start(cursor));
        cursor += 1;
    }

    while let Some((index, result)) = in_flight.next().await {
        slots[index] = Some(result?);
        if cursor < items.len() {
            in_flight.push(start(cursor));
            cursor += 1;
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Fetches sender metadata for `ids`, `limit` requests at a time.
pub async fn fetch_metadata(
    api: &dyn MailApi,
    ids: &[MessageId],
    limit: usize,
) -> Result<Vec<MessageMetadata>, SweepError> {
    bounded_map(ids, limit, |id| api.message_metadata(id)).await
}
