use thiserror::Error;

/// Error types for MLOL operations.
///
/// Only faults that a caller cannot sensibly ignore are reported through this enum:
/// transport failures, non-success HTTP statuses that survived the retry policy,
/// a login page without a usable form, and an invalid page schema.
///
/// Business outcomes such as "this book cannot be downloaded right now" are *not*
/// errors. Operations report them as `Ok(None)` and log the reason, so callers check
/// for presence instead of matching on error variants.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use mlol_client::{ClientConfig, MlolClient, MlolClientImpl, MlolError};
///
/// #[tokio::main]
/// async fn main() {
///     let http_client = http_client::native::NativeClient::new();
///     let config = ClientConfig::new().with_domain("milano.medialibrary.it");
///
///     match MlolClientImpl::login_with_credentials(Box::new(http_client), config, "user", "pass").await {
///         Ok(client) => println!("Logged in: {}", client.is_authenticated()),
///         Err(MlolError::LoginFormNotFound) => eprintln!("The login page has no login form"),
///         Err(MlolError::Status { status, url }) => eprintln!("{url} answered {status}"),
///         Err(e) => eprintln!("Other error: {e}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum MlolError {
    /// HTTP/network related errors.
    ///
    /// This includes connection failures, timeouts, DNS errors, and other
    /// low-level networking issues reported by the HTTP backend.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The portal answered with a non-success status.
    ///
    /// Retryable statuses only surface here once the retry policy is exhausted.
    #[error("HTTP status {status} for {url}")]
    Status {
        /// Final HTTP status code
        status: u16,
        /// URL of the request that failed
        url: String,
    },

    /// No form containing the username field was found on the login page.
    ///
    /// This typically indicates that the portal's page structure has changed.
    #[error("Login form not found")]
    LoginFormNotFound,

    /// Failed to interpret the portal's response or build a request URL.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A selector or pattern in a custom [`PageSchema`](crate::PageSchema) is invalid.
    #[error("Invalid page schema: {0}")]
    InvalidSchema(String),
}
