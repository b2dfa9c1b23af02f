use crate::headers::ACCEPT_FRAGMENT;
use crate::http::{HttpSession, PageRequest, PageResponse};
use crate::iterator::SearchIterator;
use crate::login::LoginManager;
use crate::parsing::MlolParser;
use crate::r#trait::MlolClient;
use crate::schema::Endpoints;
use crate::types::{
    Book, BookStatus, ClientConfig, MlolSession, SearchPage, SearchQuery,
};
use crate::{MlolError, Result};
use async_trait::async_trait;
use http_client::HttpClient;
use scraper::Html;
use std::sync::Arc;

/// Reservation message fragment of a confirmed reservation
const RESERVATION_CONFIRMED: &str = "con successo";
/// Reservation message fragment of a reservation that already exists
const RESERVATION_ALREADY_ACTIVE: &str = "prenotazione attiva";

/// Main client for interacting with an MLOL tenant portal.
///
/// This client owns the session cookies, the HTTP transport and the page parser,
/// and provides search, metadata lookup, download and reservation through web
/// scraping. It is cheap to clone; clones share the same session.
///
/// # Examples
///
/// ```rust,no_run
/// use mlol_client::{AsyncPaginatedIterator, ClientConfig, MlolClient, MlolClientImpl, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let http_client = http_client::native::NativeClient::new();
///     let config = ClientConfig::new().with_domain("milano.medialibrary.it");
///     let client =
///         MlolClientImpl::login_with_credentials(Box::new(http_client), config, "user", "pass")
///             .await?;
///
///     let mut results = client.search_books("calvino", false).await?;
///     while let Some(batch) = results.next().await? {
///         for book in batch {
///             println!("{book} -> {}", client.get_book_url(&book));
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MlolClientImpl {
    http: Arc<HttpSession>,
    parser: Arc<MlolParser>,
    username: String,
    max_concurrency: usize,
}

impl MlolClientImpl {
    /// Create an anonymous client.
    ///
    /// Searching and metadata lookup work without authentication; downloads and
    /// reservations will be refused.
    pub fn new(client: Box<dyn HttpClient + Send + Sync>, config: ClientConfig) -> Result<Self> {
        log::warn!(
            "You did not provide authentication credentials and a subdomain. You will not be able to perform actions that require authentication."
        );
        let session = MlolSession::new(String::new(), Default::default(), config.base_url.clone());
        Self::build(Arc::from(client), session, config)
    }

    /// Log in by submitting the tenant's login form and create an authenticated client.
    ///
    /// Fails with [`MlolError::LoginFormNotFound`] if the login page has no form
    /// with the username field.
    pub async fn login_with_credentials(
        client: Box<dyn HttpClient + Send + Sync>,
        config: ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let client: Arc<dyn HttpClient + Send + Sync> = Arc::from(client);
        let login_manager = LoginManager::new(
            client.clone(),
            config.base_url.clone(),
            config.retry.clone(),
            config.schema.clone(),
        );
        let session = login_manager.login(username, password).await?;
        Self::build(client, session, config)
    }

    /// Resume a previously saved session.
    ///
    /// The session's base URL takes precedence over the one in `config`.
    pub fn from_session(
        client: Box<dyn HttpClient + Send + Sync>,
        session: MlolSession,
        config: ClientConfig,
    ) -> Result<Self> {
        Self::build(Arc::from(client), session, config)
    }

    fn build(
        client: Arc<dyn HttpClient + Send + Sync>,
        session: MlolSession,
        config: ClientConfig,
    ) -> Result<Self> {
        let parser = MlolParser::with_schema(config.schema)?;
        let http = HttpSession::new(client, session.base_url, session.cookies, config.retry);

        Ok(Self {
            http: Arc::new(http),
            parser: Arc::new(parser),
            username: session.username,
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    /// Extract the current session state for persistence.
    pub fn get_session(&self) -> MlolSession {
        MlolSession::new(
            self.username.clone(),
            self.http.cookies().clone(),
            self.http.base_url().to_string(),
        )
    }

    /// The username the session was opened with (empty when anonymous).
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Search the catalog, one batch of books per result page.
    ///
    /// The initial request is issued right away; the remaining pages are fetched
    /// as the iterator advances. With `deep` set, every batch holds full detail
    /// records instead of listing records.
    pub async fn search_books(&self, query: &str, deep: bool) -> Result<SearchIterator<Self>> {
        self.walk(SearchQuery::Keywords(query.to_string()), deep).await
    }

    /// Walk the books added to the catalog in the last fifteen days.
    pub async fn get_latest_books(&self, deep: bool) -> Result<SearchIterator<Self>> {
        self.walk(SearchQuery::Latest, deep).await
    }

    async fn walk(&self, query: SearchQuery, deep: bool) -> Result<SearchIterator<Self>> {
        SearchIterator::new(self.clone(), query, deep)
            .with_max_concurrency(self.max_concurrency)
            .start()
            .await
    }

    /// Find the user's loan of an owned book and request its redownload.
    async fn redownload_owned_book(&self, book_id: &str) -> Result<Option<PageResponse>> {
        let response = self.http.send(self.http.get(Endpoints::RESOURCES)?).await?;
        let loan_id = {
            let document = Html::parse_document(&response.text());
            self.parser.parse_loan_id(&document, book_id)
        };

        let Some(loan_id) = loan_id else {
            log::error!("Failed to find owned book {book_id} in your profile");
            return Ok(None);
        };
        log::debug!("Book {book_id} is on loan {loan_id}");

        let referer = format!(
            "{}{}?idp={loan_id}",
            self.http.base_url(),
            Endpoints::REDOWNLOAD_REFERER
        );
        let request = self
            .http
            .get(Endpoints::REDOWNLOAD)?
            .query("idp", &loan_id)
            .header("Referer", &referer)
            .without_redirects();

        Ok(Some(self.http.send(request).await?))
    }

    /// Borrow an available book and request its download.
    async fn request_download(&self, book_id: &str) -> Result<PageResponse> {
        let referer = format!(
            "{}{}?unid={book_id}&form=epub",
            self.http.base_url(),
            Endpoints::DOWNLOAD_REFERER
        );
        let request = self
            .http
            .get(Endpoints::DOWNLOAD)?
            .query("unid", book_id)
            .query("form", "epub")
            .header("Referer", &referer)
            .without_redirects();

        self.http.send(request).await
    }

    /// Follow the single redirect a download endpoint answers with, if any.
    async fn follow_download_redirect(&self, response: PageResponse) -> Result<PageResponse> {
        if !response.is_redirect() {
            return Ok(response);
        }
        let Some(location) = response.location.clone() else {
            return Ok(response);
        };

        let target = response
            .url
            .join(&location)
            .map_err(|e| MlolError::Parse(format!("Invalid download redirect {location}: {e}")))?;
        log::debug!("Following download redirect to {target}");

        let request = PageRequest::get(target).header("Sec-Fetch-Site", "cross-site");
        self.http.send(request).await
    }
}

fn status_label(status: Option<BookStatus>) -> &'static str {
    status.map_or("unknown", |status| status.as_str())
}

#[async_trait(?Send)]
impl MlolClient for MlolClientImpl {
    fn base_url(&self) -> String {
        self.http.base_url().to_string()
    }

    fn is_authenticated(&self) -> bool {
        self.http.cookies().contains(MlolSession::AUTH_COOKIE)
    }

    async fn get_search_page(
        &self,
        query: &SearchQuery,
        page: Option<u32>,
    ) -> Result<SearchPage> {
        let mut request = self.http.get(Endpoints::SEARCH)?;
        for (name, value) in query.params() {
            request = request.query(&name, &value);
        }
        if let Some(page) = page {
            request = request.query("page", &page.to_string());
        }

        let response = self.http.send(request).await?;
        let (books, total_pages) = {
            let document = Html::parse_document(&response.text());
            (
                self.parser.parse_search_page(&document),
                self.parser.parse_page_count(&document),
            )
        };

        Ok(SearchPage {
            books,
            page_number: page.unwrap_or(1),
            total_pages,
        })
    }

    async fn get_book_by_id(&self, book_id: &str) -> Result<Option<Book>> {
        log::debug!("Fetching book {book_id}");
        let request = self.http.get(Endpoints::GET_BOOK)?.query("id", book_id);
        let response = self.http.send(request).await?;

        if self.parser.is_unavailable_page(response.url.as_str()) {
            log::warn!("Failed to fetch book {book_id}. Might not be available to your library.");
            return Ok(None);
        }

        let details = {
            let document = Html::parse_document(&response.text());
            self.parser.parse_book_page(&document)
        };

        match details.into_book(book_id) {
            Some(book) => Ok(Some(book)),
            None => {
                log::warn!("Failed to get book title for id {book_id}, skipping...");
                Ok(None)
            }
        }
    }

    async fn download_book_by_id(&self, book_id: &str) -> Result<Option<Vec<u8>>> {
        if !self.is_authenticated() {
            log::error!("You need to be authenticated to MLOL in order to download books.");
            return Ok(None);
        }

        let Some(book) = self.get_book_by_id(book_id).await? else {
            log::error!("Book is not available for download.");
            return Ok(None);
        };

        let response = match book.status {
            Some(BookStatus::Owned) => {
                log::info!("You already own this book. Redownloading...");
                match self.redownload_owned_book(book_id).await? {
                    Some(response) => response,
                    None => return Ok(None),
                }
            }
            Some(BookStatus::Available) => self.request_download(book_id).await?,
            other => {
                log::error!(
                    "Book is not available for download. Status: {}",
                    status_label(other)
                );
                return Ok(None);
            }
        };

        let response = self.follow_download_redirect(response).await?;

        if self.parser.is_fulfillment_token(&response.body) {
            log::info!("Book {book_id} downloaded");
            Ok(Some(response.body))
        } else {
            log::error!("Failed to download book {book_id}");
            log::debug!("{}", response.text());
            Ok(None)
        }
    }

    async fn reserve_book_by_id(&self, book_id: &str, email: &str) -> Result<Option<bool>> {
        if !self.is_authenticated() {
            log::error!("You need to be authenticated to MLOL in order to reserve books.");
            return Ok(None);
        }

        // The portal has the final word; a wrong status is only worth a warning
        match self.get_book_by_id(book_id).await?.and_then(|book| book.status) {
            Some(BookStatus::Taken) => {}
            status => log::warn!(
                "You can only reserve taken books. Book status: {}",
                status_label(status)
            ),
        }

        let referer = format!(
            "{}{}?id={book_id}",
            self.http.base_url(),
            Endpoints::PRE_RESERVE
        );
        // The email goes into the query as typed, without percent-encoding
        let request = self
            .http
            .get(Endpoints::RESERVE)?
            .raw_query(&format!("id={book_id}&email={email}"))
            .header("Referer", &referer)
            .header("Accept", ACCEPT_FRAGMENT);
        let response = self.http.send(request).await?;

        let message = {
            let document = Html::parse_document(&response.text());
            self.parser.parse_reservation_message(&document)
        };

        match message {
            Some(message) if message.contains(RESERVATION_CONFIRMED) => {
                log::info!("Book #{book_id} reserved");
                Ok(Some(true))
            }
            Some(message) if message.contains(RESERVATION_ALREADY_ACTIVE) => {
                log::warn!("You already have an active reservation for book #{book_id}");
                Ok(Some(true))
            }
            Some(message) => {
                log::error!("Failed to reserve book #{book_id}: {message}");
                Ok(Some(false))
            }
            None => {
                log::error!("Failed to reserve book with ID {book_id} (unknown outcome)");
                Ok(None)
            }
        }
    }

    fn get_book_url_by_id(&self, book_id: &str) -> String {
        format!(
            "{}{}?id={book_id}",
            self.http.base_url(),
            Endpoints::GET_BOOK
        )
    }
}
