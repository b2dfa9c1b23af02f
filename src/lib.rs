//! # mlol-client
//!
//! A Rust crate for MLOL (MediaLibraryOnLine) library-lending portals.
//!
//! The portal has no public API, so this crate drives its web pages: it logs in
//! through the tenant's login form, walks search listings page by page, scrapes
//! book detail pages into typed records, downloads e-book fulfillment tokens and
//! places holds on books that are out on loan.
//!
//! Start with [`MlolClientImpl`] and the [`MlolClient`] trait. Page markup is
//! described by a [`PageSchema`], so a layout change on the portal is a data
//! update rather than a code change.

pub mod client;
pub mod error;
pub mod headers;
pub mod http;
pub mod iterator;
pub mod login;
pub mod parsing;
pub mod retry;
pub mod schema;
pub mod session;
pub mod r#trait;
pub mod types;

pub use client::MlolClientImpl;
pub use error::MlolError;
pub use iterator::{AsyncPaginatedIterator, SearchIterator};
pub use parsing::MlolParser;
pub use r#trait::MlolClient;
pub use schema::{Endpoints, PageSchema};
pub use session::CookieJar;
pub use types::{
    Book, BookDetails, BookStatus, ClientConfig, MlolSession, RetryConfig, SearchPage,
    SearchQuery,
};

#[cfg(feature = "mock")]
pub use r#trait::MockMlolClient;

// Re-export scraper types for testing
pub use scraper::Html;

pub type Result<T> = std::result::Result<T, MlolError>;
