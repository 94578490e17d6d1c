use thiserror::Error;

/// Error types for Last.fm retrieval.
///
/// Transport failures, upstream API errors and exhausted retry budgets all
/// abort a page collection: callers receive either the complete, limit-truncated
/// item list or exactly one of these errors, never a list with a silent gap.
///
/// Responses that merely fail to match the expected page shape are *not*
/// errors; the fetcher turns them into an empty page, which ends pagination.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use scrobble_harvest::{ClientConfig, FmError, LastFmClient, RecentTracksQuery};
///
/// #[tokio::main]
/// async fn main() {
///     let config = ClientConfig::new("api-key", "username");
///     let client = LastFmClient::with_http_client(
///         Box::new(http_client::native::NativeClient::new()),
///         config,
///     );
///
///     match client.recent_tracks(RecentTracksQuery::default().with_limit(50)).await {
///         Ok(scrobbles) => println!("{} scrobbles", scrobbles.len()),
///         Err(FmError::RetriesExhausted { attempts, error_code, .. }) => {
///             eprintln!("Gave up after {attempts} retries (code {error_code})");
///         }
///         Err(FmError::Api { http_code, message, .. }) => {
///             eprintln!("Last.fm rejected the request ({http_code}): {message}");
///         }
///         Err(e) => eprintln!("Other error: {e}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum FmError {
    /// HTTP/network related errors.
    ///
    /// Connection failures, timeouts, DNS errors and unreadable response
    /// bodies. Not retried on their own.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Last.fm answered with a non-2xx status and a non-retryable error code.
    ///
    /// `error_code` is `None` when the body did not carry an error envelope.
    #[error("Last.fm API error (HTTP {http_code}, code {error_code:?}): {message}")]
    Api {
        /// HTTP status of the failing response
        http_code: u16,
        /// Last.fm `error` field, if present
        error_code: Option<u32>,
        /// Last.fm `message` field
        message: String,
    },

    /// A transient error code kept coming back after the retry ceiling.
    #[error(
        "Retries exhausted after {attempts} attempts (HTTP {http_code}, code {error_code}): {message}"
    )]
    RetriesExhausted {
        /// Number of retries issued before giving up
        attempts: u32,
        /// HTTP status of the last response
        http_code: u16,
        /// Last.fm error code of the last response
        error_code: u32,
        /// Last.fm message of the last response
        message: String,
    },

    /// Failed to decode an entity from a Last.fm response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The caller supplied an argument the operation cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was aborted through its [`CancellationState`](crate::CancellationState).
    #[error("Operation cancelled")]
    Cancelled,
}
