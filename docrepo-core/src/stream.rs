//! Pull-driven paging over store queries.
//!
//! [`paged`] turns the page-at-a-time [`StoreConnection::query_page`] primitive into a
//! [`futures::Stream`]. At most one page is buffered ahead of the consumer: the stream
//! requests a page only when its buffer is empty and the consumer polls for more.

use bson::Bson;
use futures::{StreamExt, stream::try_unfold};
use std::collections::VecDeque;
use tracing::debug;

use crate::{
    backend::{DocumentStream, StoreConnection},
    query::Statement,
};

struct PageCursor {
    statement: Statement,
    continuation: Option<String>,
    buffer: VecDeque<Bson>,
    pages: usize,
    exhausted: bool,
}

/// Streams the results of `statement` in pages of at most `page_size` documents.
///
/// The first page is fetched on the first poll, not when the stream is created. An error
/// from the store is yielded once and ends the stream.
pub fn paged<'a, C>(
    connection: &'a C,
    container: &'a str,
    statement: Statement,
    page_size: usize,
) -> DocumentStream<'a>
where
    C: StoreConnection + ?Sized,
{
    let cursor = PageCursor {
        statement,
        continuation: None,
        buffer: VecDeque::new(),
        pages: 0,
        exhausted: false,
    };
    let page_size = page_size.max(1);

    try_unfold(cursor, move |mut cursor| async move {
        loop {
            if let Some(document) = cursor.buffer.pop_front() {
                return Ok(Some((document, cursor)));
            }
            if cursor.exhausted {
                return Ok(None);
            }

            let page = connection
                .query_page(
                    container,
                    &cursor.statement,
                    cursor.continuation.take(),
                    page_size,
                )
                .await?;

            cursor.pages += 1;
            debug!(
                container,
                page = cursor.pages,
                items = page.items.len(),
                has_more = page.has_more(),
                "Fetched result page"
            );

            cursor.exhausted = !page.has_more();
            cursor.continuation = page.continuation;
            cursor.buffer.extend(page.items);
        }
    })
    .boxed()
}
