//! Retry logic with exponential backoff
//!
//! Two retry loops live here:
//!
//! - [`download_with_retry`] is a plain backoff loop for small HTTP side requests
//!   (cover art).
//! - [`retry_with_connectivity`] drives item fetches. It waits on the
//!   [`ConnectivityMonitor`] before every attempt, retries only errors classified as
//!   network failures, and reports how many attempts were used.
//!
//! # Network classification
//!
//! The retrieval tool reports failures as free-form text, so network failures are
//! recognized by matching the diagnostic against [`NETWORK_ERROR_SIGNATURES`]. This is
//! fragile: a tool upgrade that rewords its messages silently turns retryable failures
//! into permanent ones. Keep the list in sync with the messages yt-dlp and its HTTP
//! stack actually print.
//!
//! # Example
//!
//! ```no_run
//! use playlist_dl::config::{Config, RetryConfig};
//! use playlist_dl::connectivity::{ConnectivityMonitor, HttpConnectivityProbe};
//! use playlist_dl::error::FetchError;
//! use playlist_dl::retry::retry_with_connectivity;
//! use std::sync::Arc;
//!
//! # async fn example() -> playlist_dl::Result<()> {
//! let config = Config::default();
//! let probe = Arc::new(HttpConnectivityProbe::from_config(&config.connectivity)?);
//! let monitor = ConnectivityMonitor::new(probe, &config.connectivity);
//!
//! let outcome = retry_with_connectivity(
//!     &RetryConfig::default(),
//!     &monitor,
//!     |attempt, e: &FetchError| eprintln!("attempt {attempt} failed: {e}"),
//!     |attempt| async move {
//!         // "Connection reset" is a network signature, so this is retried
//!         Err::<(), _>(FetchError::new(format!("attempt {attempt}: Connection reset by peer")))
//!     },
//! )
//! .await;
//! assert_eq!(outcome.attempts, 4);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Lowercase fragments that mark a diagnostic as a network failure
///
/// Covers DNS resolution failures, connection resets, timeouts and unreachable
/// hosts as reported by yt-dlp, Python's socket layer and libc.
pub const NETWORK_ERROR_SIGNATURES: &[&str] = &[
    // DNS resolution
    "getaddrinfo",
    "name or service not known",
    "temporary failure in name resolution",
    "nodename nor servname provided",
    "could not resolve",
    "failed to resolve",
    "no address associated with hostname",
    "enotfound",
    "eai_again",
    // connection reset
    "connection reset",
    "connection aborted",
    "econnreset",
    "remote end closed connection",
    "broken pipe",
    // timeout
    "timed out",
    "timeout",
    "etimedout",
    // unreachable
    "network is unreachable",
    "no route to host",
    "enetunreach",
    "ehostunreach",
    "unreachable",
];

/// Whether `text` looks like a network failure
pub fn is_network_error(text: &str) -> bool {
    let lower = text.to_lowercase();
    NETWORK_ERROR_SIGNATURES
        .iter()
        .any(|signature| lower.contains(signature))
}

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection reset, DNS hiccups) should return `true`.
/// Permanent failures (unavailable item, bad credentials, disk full) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        is_network_error(&self.diagnostic)
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(e) => e.is_retryable(),
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Retry on timeouts, but not on "not found" errors
            Error::ExternalTool(msg) => is_network_error(msg),
            // Conversion runs once; a bad input stays bad
            Error::Transcode(_) => false,
            // Waiting for the network already gave up
            Error::Offline { .. } => false,
            Error::Config { .. }
            | Error::InvalidUrl(_)
            | Error::Source(_)
            | Error::EmptyBatch
            | Error::Serialization(_)
            | Error::Tagging { .. }
            | Error::Archive(_)
            | Error::NotSupported(_)
            | Error::Other(_) => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts,
/// sleeping with exponential backoff between attempts
///
/// Ungated: use [`retry_with_connectivity`] for work that should pause during an
/// outage. `config.max_attempts` is the total number of calls, including the first.
///
/// # Returns
///
/// Returns the successful result or the last error after all attempts are exhausted.
///
/// # Example
///
/// ```no_run
/// use playlist_dl::retry::download_with_retry;
/// use playlist_dl::config::RetryConfig;
/// use playlist_dl::error::Error;
///
/// # async fn example() -> Result<(), Error> {
/// let config = RetryConfig::default();
/// let cover = download_with_retry(&config, || async {
///     let response = reqwest::get("https://i.ytimg.com/vi/abc/hqdefault.jpg").await?;
///     Ok::<_, Error>(response.error_for_status()?.bytes().await?)
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(backoff_delay(config, delay)).await;
                delay = next_delay(config, delay);
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Why a connectivity-gated operation gave up
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The operation failed with a non-retryable error or ran out of attempts
    Failed(E),
    /// Connectivity did not return within the monitor's offline timeout
    Offline {
        /// The monitor's error
        error: Error,
        /// The last error returned by the operation, if it ran at all
        last: Option<E>,
    },
}

impl<E: std::fmt::Display> RetryFailure<E> {
    /// Text describing the failure, preferring the operation's own last error
    pub fn describe(&self) -> String {
        match self {
            RetryFailure::Failed(e) => e.to_string(),
            RetryFailure::Offline {
                last: Some(last), ..
            } => last.to_string(),
            RetryFailure::Offline { error, last: None } => error.to_string(),
        }
    }
}

/// Result of [`retry_with_connectivity`] plus the number of attempts made
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result
    pub result: Result<T, RetryFailure<E>>,
    /// Number of times the operation was called
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails permanently or exhausts its attempts,
/// waiting for connectivity before every call
///
/// `operation` receives the 1-based attempt number. `on_retry` is called with the
/// failed attempt number and its error each time a retry is scheduled. Between
/// attempts the usual exponential backoff applies, followed by the connectivity gate.
pub async fn retry_with_connectivity<F, Fut, T, E, R>(
    config: &RetryConfig,
    monitor: &ConnectivityMonitor,
    mut on_retry: R,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    R: FnMut(u32, &E),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;
    let mut delay = config.initial_delay;
    let mut last = None;

    loop {
        if let Err(error) = monitor.await_connectivity().await {
            return RetryOutcome {
                result: Err(RetryFailure::Offline { error, last }),
                attempts,
            };
        }

        attempts += 1;
        match operation(attempts).await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(attempts, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts,
                };
            }
            Err(e) if e.is_retryable() && attempts < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    max_attempts,
                    "Network error, retrying once connectivity is confirmed"
                );
                on_retry(attempts, &e);

                tokio::time::sleep(backoff_delay(config, delay)).await;
                delay = next_delay(config, delay);
                last = Some(e);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return RetryOutcome {
                    result: Err(RetryFailure::Failed(e)),
                    attempts,
                };
            }
        }
    }
}

fn backoff_delay(config: &RetryConfig, delay: Duration) -> Duration {
    if config.jitter {
        add_jitter(delay)
    } else {
        delay
    }
}

fn next_delay(config: &RetryConfig, delay: Duration) -> Duration {
    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier).min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
