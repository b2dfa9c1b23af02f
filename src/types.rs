//! Data types for MLOL book metadata and client state.
//!
//! This module contains the core data structures used throughout the crate:
//! book records and their lending status, search pages, session state and
//! client configuration.

use crate::schema::PageSchema;
use crate::session::CookieJar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

// ================================================================================================
// BOOK METADATA
// ================================================================================================

/// Lending status of a book, as shown on its detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    /// Can be borrowed and downloaded right now
    Available,
    /// Already borrowed by the current user; can be downloaded again
    Owned,
    /// Reserved by the current user
    Reserved,
    /// Borrowed by someone else; can be reserved
    Taken,
    /// Not lendable
    Unavailable,
    /// The status text did not match any known phrase
    Unknown,
}

/// Status phrases, checked in order against the lower-cased indicator text.
const STATUS_VOCABULARY: &[(&str, BookStatus)] = &[
    ("scarica", BookStatus::Available),
    ("ripeti", BookStatus::Owned),
    ("prenotato", BookStatus::Reserved),
    ("occupato", BookStatus::Taken),
    ("non disponibile", BookStatus::Unavailable),
];

impl BookStatus {
    /// Map the text of a status indicator to a status.
    ///
    /// Matching is a case-insensitive substring search; text that matches no
    /// known phrase yields [`BookStatus::Unknown`].
    ///
    /// ```rust
    /// use mlol_client::BookStatus;
    ///
    /// assert_eq!(BookStatus::from_indicator("  RIPETI DOWNLOAD  "), BookStatus::Owned);
    /// assert_eq!(BookStatus::from_indicator("boh"), BookStatus::Unknown);
    /// ```
    pub fn from_indicator(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        STATUS_VOCABULARY
            .iter()
            .find(|(phrase, _)| text.contains(phrase))
            .map(|(_, status)| *status)
            .unwrap_or(BookStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Owned => "owned",
            BookStatus::Reserved => "reserved",
            BookStatus::Taken => "taken",
            BookStatus::Unavailable => "unavailable",
            BookStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A book as listed on the portal.
///
/// Records built from a search listing carry only `id`, `title` and possibly
/// `authors`. Records built from a detail page may carry every field. A `None`
/// field means the information was not present on the page it was parsed from.
///
/// # Examples
///
/// ```rust
/// use mlol_client::{Book, BookStatus};
///
/// let book = Book {
///     status: Some(BookStatus::Available),
///     formats: Some(vec!["epub".to_string()]),
///     ..Book::partial("150148950", "Il nome della rosa", Some(vec!["Umberto Eco".to_string()]))
/// };
///
/// assert_eq!(book.to_string(), "Umberto Eco - Il nome della rosa");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Book {
    /// Portal-assigned identifier
    pub id: String,
    /// Title
    pub title: String,
    /// Authors, in page order
    pub authors: Option<Vec<String>>,
    /// Publisher name
    pub publisher: Option<String>,
    /// Every ISBN listed for the book
    pub isbns: Option<Vec<String>>,
    /// Language, as written on the page
    pub language: Option<String>,
    /// Description text
    pub description: Option<String>,
    /// Publication year
    pub year: Option<i32>,
    /// Lower-cased format tags, e.g. `epub`, `pdf`
    pub formats: Option<Vec<String>>,
    /// Whether the download is DRM protected
    pub drm: Option<bool>,
    /// Lending status
    pub status: Option<BookStatus>,
}

impl Book {
    /// A record with only the fields a listing page provides.
    pub fn partial(id: &str, title: &str, authors: Option<Vec<String>>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            authors,
            publisher: None,
            isbns: None,
            language: None,
            description: None,
            year: None,
            formats: None,
            drm: None,
            status: None,
        }
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.authors {
            Some(authors) if !authors.is_empty() => {
                write!(f, "{} - {}", authors.join("; "), self.title)
            }
            _ => write!(f, "{}", self.title),
        }
    }
}

/// Fields extracted from a detail page.
///
/// Every field is extracted independently; `None` means the corresponding markup
/// was missing or could not be read, and says nothing about the other fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDetails {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub publisher: Option<String>,
    pub isbns: Option<Vec<String>>,
    pub status: Option<BookStatus>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub year: Option<i32>,
    pub formats: Option<Vec<String>>,
    pub drm: Option<bool>,
}

impl BookDetails {
    /// Build a full record, or `None` when no title was found.
    pub fn into_book(self, id: &str) -> Option<Book> {
        let title = self.title?;
        Some(Book {
            id: id.to_string(),
            title,
            authors: self.authors,
            publisher: self.publisher,
            isbns: self.isbns,
            language: self.language,
            description: self.description,
            year: self.year,
            formats: self.formats,
            drm: self.drm,
            status: self.status,
        })
    }
}

// ================================================================================================
// SEARCH
// ================================================================================================

/// Which listing a search walks through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Free-text keyword search
    Keywords(String),
    /// Books added to the catalog in the last fifteen days
    Latest,
}

impl SearchQuery {
    /// Number of results requested per page
    pub const RESULTS_PER_PAGE: u32 = 48;

    /// Query parameters of the first request, without a page number.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("seltip".to_string(), "310".to_string())];
        match self {
            SearchQuery::Keywords(query) => {
                params.push(("keywords".to_string(), query.trim().to_string()));
            }
            SearchQuery::Latest => {
                params.push(("news".to_string(), "15day".to_string()));
            }
        }
        params.push(("nris".to_string(), Self::RESULTS_PER_PAGE.to_string()));
        params
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Partial records, in page order
    pub books: Vec<Book>,
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Total number of pages reported by the pager
    pub total_pages: u32,
}

// ================================================================================================
// SESSION MANAGEMENT
// ================================================================================================

/// Serializable session state that can be persisted and restored.
///
/// This contains the authentication state needed to resume an MLOL session
/// without submitting the login form again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlolSession {
    /// The username the session was opened with (empty when anonymous)
    pub username: String,
    /// Session cookies
    pub cookies: CookieJar,
    /// Base URL of the tenant portal
    pub base_url: String,
}

impl MlolSession {
    /// Name of the cookie the portal sets on successful login
    pub const AUTH_COOKIE: &'static str = ".ASPXAUTH";

    pub fn new(username: String, cookies: CookieJar, base_url: String) -> Self {
        Self {
            username,
            cookies,
            base_url,
        }
    }

    /// Whether the session carries the authentication cookie.
    ///
    /// This doesn't guarantee the session is still active on the server; expiry
    /// only shows up when an authenticated request is refused.
    pub fn is_authenticated(&self) -> bool {
        self.cookies.contains(Self::AUTH_COOKIE)
    }

    /// Serialize session to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize session from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ================================================================================================
// CLIENT CONFIGURATION
// ================================================================================================

/// Default portal address used when no tenant domain is configured
pub const DEFAULT_BASE_URL: &str = "https://medialibrary.it";

/// Default cap on concurrent detail fetches during a deep search
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Configuration for the transport retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts per request, the first one included
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff_factor * 2^(n-1)`
    pub backoff_factor: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Statuses that trigger a retry
    pub retry_statuses: BTreeSet<u16>,
    /// Whether retries are enabled at all
    pub enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
            retry_statuses: [404, 429, 500, 502, 503, 504].into_iter().collect(),
            enabled: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with retries disabled
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            enabled: false,
            ..Default::default()
        }
    }

    /// Create a config with a custom attempt count
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            enabled: max_attempts > 1,
            ..Default::default()
        }
    }

    /// Set the backoff factor
    pub fn with_backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Whether a response with this status should be retried
    pub fn is_retryable(&self, status: u16) -> bool {
        self.enabled && self.retry_statuses.contains(&status)
    }

    /// Delay to wait before the given retry (1-indexed)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(retry.saturating_sub(1));
        std::cmp::min(
            self.backoff_factor.saturating_mul(multiplier),
            self.max_delay,
        )
    }
}

/// Unified client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the tenant portal, without trailing slash
    pub base_url: String,
    /// Transport retry policy
    pub retry: RetryConfig,
    /// Cap on concurrent detail fetches during a deep search
    pub max_concurrency: usize,
    /// Markup description used by the parsers
    pub schema: PageSchema,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            schema: PageSchema::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at a tenant subdomain, e.g. `milano.medialibrary.it`.
    ///
    /// Any scheme and trailing slash are stripped; the portal is always reached
    /// over HTTPS.
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.base_url = normalize_domain(domain);
        self
    }

    /// Use an exact base URL (useful for testing against a local server)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry = retry_config;
        self
    }

    /// Set the deep search concurrency cap (at least 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Set a custom page schema
    pub fn with_schema(mut self, schema: PageSchema) -> Self {
        self.schema = schema;
        self
    }
}

/// Turn a tenant domain into a base URL.
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('/');
    let host = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain);
    format!("https://{host}")
}

// ================================================================================================
// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_vocabulary() {
        assert_eq!(BookStatus::from_indicator("Scarica"), BookStatus::Available);
        assert_eq!(
            BookStatus::from_indicator("  RIPETI DOWNLOAD  "),
            BookStatus::Owned
        );
        assert_eq!(
            BookStatus::from_indicator("Già prenotato da te"),
            BookStatus::Reserved
        );
        assert_eq!(
            BookStatus::from_indicator("Occupato - Prenota"),
            BookStatus::Taken
        );
        assert_eq!(
            BookStatus::from_indicator("Titolo NON DISPONIBILE"),
            BookStatus::Unavailable
        );
        assert_eq!(BookStatus::from_indicator(""), BookStatus::Unknown);
        assert_eq!(
            BookStatus::from_indicator("Consultazione in sede"),
            BookStatus::Unknown
        );
    }

    #[test]
    fn test_book_details_without_title_is_not_a_book() {
        let details = BookDetails {
            publisher: Some("Bompiani".to_string()),
            ..Default::default()
        };
        assert_eq!(details.into_book("1"), None);

        let details = BookDetails {
            title: Some("Baudolino".to_string()),
            year: Some(2000),
            ..Default::default()
        };
        let book = details.into_book("42").unwrap();
        assert_eq!(book.id, "42");
        assert_eq!(book.year, Some(2000));
        assert_eq!(book.authors, None);
    }

    #[test]
    fn test_search_query_params() {
        let params = SearchQuery::Keywords("  dante  ".to_string()).params();
        assert_eq!(
            params,
            vec![
                ("seltip".to_string(), "310".to_string()),
                ("keywords".to_string(), "dante".to_string()),
                ("nris".to_string(), "48".to_string()),
            ]
        );

        let params = SearchQuery::Latest.params();
        assert!(params.contains(&("news".to_string(), "15day".to_string())));
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(
            normalize_domain("https://milano.medialibrary.it/"),
            "https://milano.medialibrary.it"
        );
        assert_eq!(
            normalize_domain("http://roma.medialibrary.it"),
            "https://roma.medialibrary.it"
        );
        assert_eq!(
            normalize_domain("torino.medialibrary.it"),
            "https://torino.medialibrary.it"
        );
    }

    #[test]
    fn test_retry_delays() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_retry(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_retry(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_retry(3), Duration::from_secs(4));
        assert_eq!(config.delay_for_retry(30), Duration::from_secs(120));

        assert!(config.is_retryable(503));
        assert!(config.is_retryable(404));
        assert!(!config.is_retryable(403));
        assert!(!RetryConfig::disabled().is_retryable(503));
    }

    #[test]
    fn test_session_authentication_and_serialization() {
        let anonymous = MlolSession::new(
            String::new(),
            CookieJar::from_pairs(vec!["ASP.NET_SessionId=xyz".to_string()]),
            DEFAULT_BASE_URL.to_string(),
        );
        assert!(!anonymous.is_authenticated());

        let session = MlolSession::new(
            "reader".to_string(),
            CookieJar::from_pairs(vec![
                "ASP.NET_SessionId=xyz".to_string(),
                ".ASPXAUTH=0123ABCD".to_string(),
            ]),
            "https://milano.medialibrary.it".to_string(),
        );
        assert!(session.is_authenticated());

        let json = session.to_json().unwrap();
        let restored = MlolSession::from_json(&json).unwrap();
        assert_eq!(restored, session);
    }
}
