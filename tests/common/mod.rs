#![allow(dead_code)]
use async_trait::async_trait;
use http_client::{Error, HttpClient, Request, Response};
use http_types::Url;
use mlol_client::{ClientConfig, CookieJar, MlolClientImpl, MlolSession, RetryConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "https://milano.medialibrary.it";

/// Headers copied into every recorded request
const RECORDED_HEADERS: &[&str] = &[
    "Cookie",
    "Referer",
    "Accept",
    "Content-Type",
    "Sec-Fetch-Site",
    "User-Agent",
];

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|e| panic!("Failed to read fixture {name}: {e}"))
}

/// A canned portal response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub latency: Duration,
}

impl Canned {
    pub fn html(body: impl Into<String>) -> Self {
        Self::bytes(body.into().into_bytes())
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            headers: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            body: Vec::new(),
            headers: vec![("Location".to_string(), location.to_string())],
            latency: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            headers: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    pub fn with_cookie(mut self, set_cookie: &str) -> Self {
        self.headers
            .push(("Set-Cookie".to_string(), set_cookie.to_string()));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// A request as seen by the fake portal.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

#[derive(Debug)]
struct Route {
    method: Option<String>,
    path: String,
    query: Option<String>,
    responses: VecDeque<Canned>,
}

impl Route {
    fn matches(&self, method: &str, url: &Url) -> bool {
        if self.method.as_deref().is_some_and(|m| m != method) || self.path != url.path() {
            return false;
        }
        let Some(fragment) = &self.query else {
            return true;
        };
        let query = url.query().unwrap_or("");
        fragment
            .split('&')
            .all(|pair| query.split('&').any(|candidate| candidate == pair))
    }

    /// The last response repeats once the sequence is exhausted.
    fn next_response(&mut self) -> Canned {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap()
        } else {
            self.responses.front().cloned().unwrap()
        }
    }
}

#[derive(Debug, Default)]
struct PortalState {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Scripted stand-in for an MLOL tenant portal.
///
/// Routes are matched by method, path and query pairs in registration order, so
/// register the specific ones first. Unmatched requests get a 404.
#[derive(Debug, Clone, Default)]
pub struct FakePortal {
    state: Arc<Mutex<PortalState>>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_route(&self, method: Option<&str>, path: &str, query: Option<&str>, responses: Vec<Canned>) {
        assert!(!responses.is_empty(), "a route needs at least one response");
        self.state.lock().unwrap().routes.push(Route {
            method: method.map(str::to_string),
            path: path.to_string(),
            query: query.map(str::to_string),
            responses: responses.into(),
        });
    }

    pub fn on(&self, path: &str, response: Canned) -> &Self {
        self.add_route(None, path, None, vec![response]);
        self
    }

    pub fn on_query(&self, path: &str, query: &str, response: Canned) -> &Self {
        self.add_route(None, path, Some(query), vec![response]);
        self
    }

    pub fn on_method(&self, method: &str, path: &str, response: Canned) -> &Self {
        self.add_route(Some(method), path, None, vec![response]);
        self
    }

    pub fn on_sequence(&self, path: &str, responses: Vec<Canned>) -> &Self {
        self.add_route(None, path, None, responses);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.path() == path)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn http_client(&self) -> Box<dyn HttpClient + Send + Sync> {
        Box::new(self.clone())
    }

    /// Client with an authenticated session and retries disabled.
    pub fn authenticated_client(&self) -> MlolClientImpl {
        let cookies = CookieJar::from_pairs(vec![
            "ASP.NET_SessionId=k2j3h4g5".to_string(),
            format!("{}=0A1B2C3D", MlolSession::AUTH_COOKIE),
        ]);
        let session = MlolSession::new("reader".to_string(), cookies, BASE_URL.to_string());
        MlolClientImpl::from_session(self.http_client(), session, test_config()).unwrap()
    }

    /// Anonymous client with retries disabled.
    pub fn anonymous_client(&self) -> MlolClientImpl {
        MlolClientImpl::new(self.http_client(), test_config()).unwrap()
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new()
        .with_base_url(BASE_URL)
        .with_retry_config(RetryConfig::disabled())
}

#[async_trait]
impl HttpClient for FakePortal {
    async fn send(&self, mut req: Request) -> Result<Response, Error> {
        let body = req.body_string().await?;
        let method = req.method().to_string();
        let url = req.url().clone();
        let headers = RECORDED_HEADERS
            .iter()
            .filter_map(|name| {
                req.header(*name).map(|values| {
                    let value = values
                        .iter()
                        .map(|value| value.as_str())
                        .collect::<Vec<_>>()
                        .join("; ");
                    (name.to_string(), value)
                })
            })
            .collect();

        let canned = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(RecordedRequest {
                method: method.clone(),
                url: url.clone(),
                headers,
                body,
            });
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state
                .routes
                .iter_mut()
                .find(|route| route.matches(&method, &url))
                .map(Route::next_response)
                .unwrap_or_else(|| Canned::status(404))
        };

        if !canned.latency.is_zero() {
            tokio::time::sleep(canned.latency).await;
        }
        self.state.lock().unwrap().in_flight -= 1;

        let mut response = Response::new(canned.status);
        for (name, value) in &canned.headers {
            response.append_header(name.as_str(), value.as_str());
        }
        response.set_body(canned.body);
        Ok(response)
    }
}
