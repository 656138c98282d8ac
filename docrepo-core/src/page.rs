//! Result pages for incremental query execution.
//!
//! Streaming queries pull results one [`Page`] at a time. Each page carries an opaque
//! continuation token; passing it back to the store fetches the next page, and a page
//! without one is the last.

/// A single page of query results.
///
/// # Example
///
/// ```ignore
/// use docrepo::page::Page;
///
/// let page: Page<String> = Page::builder(vec!["item1".to_string()])
///     .with_continuation(Some("1".to_string()))
///     .build();
///
/// assert!(page.has_more());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page, in store order.
    pub items: Vec<T>,
    /// Token for fetching the next page, `None` on the last page.
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Returns `true` if the store has more results after this page.
    pub fn has_more(&self) -> bool {
        self.continuation.is_some()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            continuation: self.continuation,
        }
    }

    /// Converts the items of this page, keeping the continuation.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self
                .items
                .into_iter()
                .map(f)
                .collect::<Result<Vec<_>, _>>()?,
            continuation: self.continuation,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self { items: Vec::new(), continuation: None }
    }
}

/// Builder for constructing [`Page`] instances.
pub struct PageBuilder<T> {
    items: Vec<T>,
    continuation: Option<String>,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, continuation: None }
    }

    /// Sets the continuation token (or `None` if this is the last page).
    pub fn with_continuation(mut self, continuation: Option<String>) -> Self {
        self.continuation = continuation;
        self
    }

    pub fn build(self) -> Page<T> {
        Page { items: self.items, continuation: self.continuation }
    }
}

/// Slices an ordered result set into a page using an offset-style continuation token.
///
/// The token is the decimal offset of the first item of the next page. Stores without a
/// native cursor format use this to page through their matches. At most
/// `offset + max_items + 1` items are pulled from `items`; the extra one only decides
/// whether a continuation is returned.
///
/// Returns `None` if `continuation` is not a valid offset token.
pub fn paginate_by_offset<T>(
    items: impl IntoIterator<Item = T>,
    continuation: Option<&str>,
    max_items: usize,
) -> Option<Page<T>> {
    let offset = match continuation {
        Some(token) => token.parse::<usize>().ok()?,
        None => 0,
    };
    let max_items = max_items.max(1);

    let mut items = items
        .into_iter()
        .skip(offset)
        .take(max_items.saturating_add(1))
        .collect::<Vec<_>>();
    let has_more = items.len() > max_items;
    items.truncate(max_items);

    let next = offset.saturating_add(items.len());

    Some(
        Page::builder(items)
            .with_continuation(has_more.then(|| next.to_string()))
            .build(),
    )
}
