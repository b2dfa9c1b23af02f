use crate::r#trait::MlolClient;
use crate::types::{Book, SearchPage, SearchQuery, DEFAULT_MAX_CONCURRENCY};
use crate::Result;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

/// Async iterator trait for paginated MLOL data.
///
/// This trait provides a common interface for walking paginated listings.
/// Every call to a search operation starts a fresh walk; a walk only moves
/// forward.
#[async_trait(?Send)]
pub trait AsyncPaginatedIterator<T> {
    /// Fetch the next item from the iterator.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(item))` - Next item in the sequence
    /// - `Ok(None)` - No more items available
    /// - `Err(...)` - Network error occurred
    async fn next(&mut self) -> Result<Option<T>>;

    /// Collect all remaining items into a Vec.
    ///
    /// **Warning**: This fetches ALL remaining pages. Use [`take`](Self::take)
    /// for bounded collection.
    async fn collect_all(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Take up to n items from the iterator.
    async fn take(&mut self, n: usize) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for _ in 0..n {
            match self.next().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    /// Get the current page number (1-indexed, 0 before the first page is yielded).
    fn current_page(&self) -> u32;

    /// Get the total number of pages, if known.
    fn total_pages(&self) -> Option<u32> {
        None
    }
}

/// Iterator over the pages of a search, yielding one batch of books per page.
///
/// In a shallow walk each batch holds the partial records of the listing page.
/// In a deep walk every listing record is replaced by its full detail record,
/// fetched concurrently by at most `max_concurrency` requests at a time; the
/// batch keeps listing order regardless of which fetch finishes first.
pub struct SearchIterator<C: MlolClient> {
    client: C,
    query: SearchQuery,
    deep: bool,
    max_concurrency: usize,
    current_page: u32,
    total_pages: Option<u32>,
    prefetched: Option<SearchPage>,
}

#[async_trait(?Send)]
impl<C: MlolClient> AsyncPaginatedIterator<Vec<Book>> for SearchIterator<C> {
    async fn next(&mut self) -> Result<Option<Vec<Book>>> {
        let Some(page) = self.next_page().await? else {
            return Ok(None);
        };

        if !self.deep {
            return Ok(Some(page.books));
        }

        let books = enrich_books(&self.client, page.books, self.max_concurrency).await?;
        Ok(Some(books))
    }

    fn current_page(&self) -> u32 {
        self.current_page
    }

    fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }
}

impl<C: MlolClient> SearchIterator<C> {
    /// Create a search iterator; nothing is fetched until the first call to `next`.
    pub fn new(client: C, query: SearchQuery, deep: bool) -> Self {
        Self {
            client,
            query,
            deep,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            current_page: 0,
            total_pages: None,
            prefetched: None,
        }
    }

    /// Set the deep search concurrency cap (at least 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Issue the initial search request now, so the page count is known and
    /// transport failures surface before iteration starts.
    pub async fn start(mut self) -> Result<Self> {
        if self.total_pages.is_none() {
            self.prefetched = self.fetch_page().await?;
        }
        Ok(self)
    }

    /// Fetch the next listing page and advance the walk past it.
    ///
    /// The initial request (without a page number) doubles as page 1 and tells
    /// how many pages there are.
    pub async fn next_page(&mut self) -> Result<Option<SearchPage>> {
        let page = match self.prefetched.take() {
            Some(page) => page,
            None => match self.fetch_page().await? {
                Some(page) => page,
                None => return Ok(None),
            },
        };

        self.current_page = page.page_number;
        Ok(Some(page))
    }

    async fn fetch_page(&mut self) -> Result<Option<SearchPage>> {
        match self.total_pages {
            None => {
                let page = self.client.get_search_page(&self.query, None).await?;
                log::debug!(
                    "Search {:?} has {} page(s)",
                    self.query,
                    page.total_pages
                );
                self.total_pages = Some(page.total_pages);
                Ok(Some(page))
            }
            Some(total) if self.current_page < total => {
                let next = self.current_page + 1;
                log::debug!("Fetching search page {next} of {total}");
                let page = self.client.get_search_page(&self.query, Some(next)).await?;
                Ok(Some(page))
            }
            Some(_) => Ok(None),
        }
    }

    pub fn is_deep(&self) -> bool {
        self.deep
    }
}

/// Replace listing records with full detail records.
///
/// At most `max_concurrency` detail fetches run at once. Results are gathered in
/// dispatch order, so the output order equals the input order. The first failing
/// fetch aborts the whole batch. A book whose detail page turns out to be
/// unavailable keeps its listing record.
pub async fn enrich_books<C: MlolClient + ?Sized>(
    client: &C,
    books: Vec<Book>,
    max_concurrency: usize,
) -> Result<Vec<Book>> {
    if books.is_empty() {
        return Ok(books);
    }

    let workers = books.len().min(max_concurrency.max(1));
    log::debug!(
        "Fetching details of {} books with {workers} workers",
        books.len()
    );

    stream::iter(books)
        .map(|book| async move {
            let details = client.get_book_by_id(&book.id).await?;
            Result::<Book>::Ok(match details {
                Some(full) => full,
                None => {
                    log::warn!(
                        "No details for book {}, keeping the listing record",
                        book.id
                    );
                    book
                }
            })
        })
        .buffered(workers)
        .try_collect()
        .await
}
