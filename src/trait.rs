use crate::types::{Book, SearchPage, SearchQuery};
use crate::Result;
use async_trait::async_trait;

/// Trait for MLOL client operations that can be mocked for testing.
///
/// This trait abstracts the portal operations so that code built on top of the
/// client (and the search iterator itself) can be tested without network access.
///
/// Business failures are reported as `Ok(None)` together with a log message:
/// a book that is not available to the library, a download that did not yield a
/// fulfillment token, a reservation with an unrecognised outcome. `Err` is
/// reserved for transport faults.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockMlolClient`
/// that implements this trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait MlolClient {
    /// Base URL of the tenant portal.
    fn base_url(&self) -> String;

    /// Whether the session carries the authentication cookie.
    fn is_authenticated(&self) -> bool;

    /// Fetch one page of listing results.
    ///
    /// `page` is `None` for the initial request of a search, which the portal
    /// answers with the first page and the pager.
    async fn get_search_page(&self, query: &SearchQuery, page: Option<u32>)
        -> Result<SearchPage>;

    /// Fetch the full record of a book.
    ///
    /// Returns `Ok(None)` if the portal redirects to its "not available" notice or
    /// the page has no title.
    async fn get_book_by_id(&self, book_id: &str) -> Result<Option<Book>>;

    /// Refresh a (possibly partial) record.
    async fn get_book(&self, book: &Book) -> Result<Option<Book>> {
        self.get_book_by_id(&book.id).await
    }

    /// Download the e-book content (an ACSM fulfillment token).
    ///
    /// Requires authentication. Owned books are downloaded again through the
    /// user's loan; available books are borrowed and downloaded; any other status
    /// returns `Ok(None)`.
    async fn download_book_by_id(&self, book_id: &str) -> Result<Option<Vec<u8>>>;

    async fn download_book(&self, book: &Book) -> Result<Option<Vec<u8>>> {
        self.download_book_by_id(&book.id).await
    }

    /// Reserve a book that is currently taken, notifying `email` when it frees up.
    ///
    /// Returns `Some(true)` when the reservation is confirmed or already active,
    /// `Some(false)` when the portal refuses it and `None` when the outcome is unknown
    /// or authentication is missing.
    async fn reserve_book_by_id(&self, book_id: &str, email: &str) -> Result<Option<bool>>;

    async fn reserve_book(&self, book: &Book, email: &str) -> Result<Option<bool>> {
        self.reserve_book_by_id(&book.id, email).await
    }

    /// Canonical public URL of a book.
    fn get_book_url_by_id(&self, book_id: &str) -> String;

    fn get_book_url(&self, book: &Book) -> String {
        self.get_book_url_by_id(&book.id)
    }
}
