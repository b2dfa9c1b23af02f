//! Thin HTTP session on top of any [`HttpClient`].
//!
//! The session owns the base address of the tenant portal, the cookie jar and the
//! retry policy. It sends browser-like default headers, follows redirects itself
//! (unless a request opts out), retries idempotent requests on transient statuses
//! and turns any final 4xx/5xx status into [`MlolError::Status`].
//!
//! The cookie jar is fixed when the session is built. Cookies set while a single
//! request is in flight (for example along a redirect chain) are carried through
//! that request only, so concurrent requests never observe each other's state.

use crate::headers;
use crate::retry::retry_with_backoff;
use crate::session::CookieJar;
use crate::types::RetryConfig;
use crate::{MlolError, Result};
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use std::sync::Arc;

/// Maximum number of redirects followed for a single request
const MAX_REDIRECTS: u32 = 5;

/// A request to be sent through an [`HttpSession`].
#[derive(Debug, Clone)]
pub struct PageRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<String>,
    follow_redirects: bool,
}

impl PageRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
            follow_redirects: true,
        }
    }

    /// A form submission with an `application/x-www-form-urlencoded` body.
    pub fn post_form(url: Url, fields: &[(String, String)]) -> Self {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        Self {
            method: Method::Post,
            url,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
            follow_redirects: true,
        }
    }

    /// Append a form-encoded query parameter.
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Replace the query string verbatim.
    ///
    /// Only characters that can never appear in a query are escaped by the URL
    /// parser; everything else (`@`, `+`, ...) is sent as written.
    pub fn raw_query(mut self, query: &str) -> Self {
        self.url.set_query(Some(query));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Return 3xx responses to the caller instead of following them.
    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// URL of the last request in the redirect chain
    pub url: Url,
    pub status: u16,
    /// `Location` header, if any
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl PageResponse {
    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// HTTP session bound to one portal.
///
/// Cookies only travel to the portal's own host: requests to any other host
/// (such as a fulfillment server a download redirects to) are sent without
/// them, and cookies those hosts set are ignored.
pub struct HttpSession {
    client: Arc<dyn HttpClient + Send + Sync>,
    base_url: String,
    portal_host: Option<String>,
    cookies: CookieJar,
    retry: RetryConfig,
}

impl HttpSession {
    pub fn new(
        client: Arc<dyn HttpClient + Send + Sync>,
        base_url: String,
        cookies: CookieJar,
        retry: RetryConfig,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let portal_host = Url::parse(&base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));

        Self {
            client,
            base_url,
            portal_host,
            cookies,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Whether a URL points at the portal host the cookies belong to.
    pub fn is_portal_url(&self, url: &Url) -> bool {
        match (&self.portal_host, url.host_str()) {
            (Some(portal), Some(host)) => host.eq_ignore_ascii_case(portal),
            _ => false,
        }
    }

    /// Resolve a portal-relative path (or pass through an absolute URL).
    pub fn url(&self, path: &str) -> Result<Url> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };
        url.parse::<Url>()
            .map_err(|e| MlolError::Parse(format!("Invalid URL {url}: {e}")))
    }

    /// Start a GET request for a portal-relative path.
    pub fn get(&self, path: &str) -> Result<PageRequest> {
        Ok(PageRequest::get(self.url(path)?))
    }

    /// Send a request with the session's cookies.
    pub async fn send(&self, request: PageRequest) -> Result<PageResponse> {
        let mut jar = self.cookies.clone();
        self.send_with_jar(request, &mut jar).await
    }

    /// Send a request with an explicit cookie jar, absorbing any cookies the
    /// portal sets along the way into it.
    pub async fn send_with_jar(
        &self,
        request: PageRequest,
        jar: &mut CookieJar,
    ) -> Result<PageResponse> {
        let mut current = request;
        let mut redirect_count = 0;

        loop {
            let response = self.execute(&current, jar).await?;

            if !current.follow_redirects || !response.is_redirect() {
                return Ok(response);
            }
            let Some(location) = response.location.as_deref() else {
                return Ok(response);
            };
            if redirect_count >= MAX_REDIRECTS {
                return Err(MlolError::Http(format!(
                    "Too many redirects starting from {}",
                    current.url
                )));
            }

            let next_url = response
                .url
                .join(location)
                .map_err(|e| MlolError::Parse(format!("Invalid redirect {location}: {e}")))?;
            log::debug!("Following redirect from {} to {next_url}", response.url);

            redirect_count += 1;
            current = PageRequest {
                method: Method::Get,
                url: next_url,
                headers: current.headers,
                body: None,
                follow_redirects: true,
            };
            current
                .headers
                .retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
        }
    }

    /// One hop: GET requests go through the retry policy, other methods don't.
    async fn execute(&self, request: &PageRequest, jar: &mut CookieJar) -> Result<PageResponse> {
        let same_host = self.is_portal_url(&request.url);
        let cookie_header = if same_host { jar.header_value() } else { None };
        let cookie_header = cookie_header.as_deref();

        let (response, set_cookies) = if request.method == Method::Get {
            let operation_name = request.url.path().to_string();
            retry_with_backoff(&self.retry, &operation_name, move || {
                self.send_once(request, cookie_header)
            })
            .await?
            .result
        } else {
            self.send_once(request, cookie_header).await?
        };

        if same_host {
            for cookie in &set_cookies {
                jar.absorb_set_cookie(cookie);
            }
        } else if !set_cookies.is_empty() {
            log::debug!("Ignoring cookies set by {}", request.url);
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        request: &PageRequest,
        cookie_header: Option<&str>,
    ) -> Result<(PageResponse, Vec<String>)> {
        let mut http_request = Request::new(request.method, request.url.clone());
        headers::add_default_headers(&mut http_request);
        headers::add_cookies(&mut http_request, cookie_header);
        headers::add_extra_headers(&mut http_request, &request.headers);
        if let Some(body) = &request.body {
            http_request.set_body(body.clone());
        }

        log::debug!("{} {}", request.method, request.url);
        let mut response = self
            .client
            .send(http_request)
            .await
            .map_err(|e| MlolError::Http(e.to_string()))?;

        let status: u16 = response.status().into();
        log::debug!("{} answered {status}", request.url);
        if status >= 400 {
            return Err(MlolError::Status {
                status,
                url: request.url.to_string(),
            });
        }

        let set_cookies = response
            .header("set-cookie")
            .map(|values| values.iter().map(|v| v.as_str().to_string()).collect())
            .unwrap_or_default();
        let location = response
            .header("location")
            .and_then(|values| values.get(0))
            .map(|value| value.as_str().to_string());
        let body = response
            .body_bytes()
            .await
            .map_err(|e| MlolError::Http(e.to_string()))?;

        Ok((
            PageResponse {
                url: request.url.clone(),
                status,
                location,
                body,
            },
            set_cookies,
        ))
    }
}
