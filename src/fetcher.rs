//! HTTP page fetching with exponential backoff retry logic.
//!
//! All page requests go through one shared [`reqwest::Client`] that presents a
//! desktop browser identity and asks for French content first, so sites that
//! vary by locale answer in a deterministic language.
//!
//! # Retry Strategy
//!
//! - Up to 3 retries after the first attempt
//! - Retried on 429, 500, 502, 503, 504 and on transport failures
//! - Exponential backoff starting at 600ms, capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//! - A `Retry-After: <seconds>` header replaces the computed delay

use rand::{Rng, rng};
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use scraper::Html;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Browser identity sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Language preference sent with every request.
pub const PREFERRED_LANGUAGES: &str = "fr-FR,fr;q=0.9,en;q=0.8";

/// Default timeout for a single page request.
pub const DEFAULT_FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Statuses that are worth asking again for.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Why a page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Outcome of a page fetch: a parsed document or the reason there is none.
pub type FetchResult = Result<Html, FetchError>;

/// Backoff parameters for retried requests.
///
/// The delay before retry `n` (1-based) is:
/// ```text
/// delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter)
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry (doubles with each attempt).
    pub base_delay: StdDuration,
    /// Upper bound on any single delay.
    pub max_delay: StdDuration,
    /// Upper bound on the random jitter added to each delay.
    pub jitter: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: StdDuration::from_millis(600),
            max_delay: StdDuration::from_secs(30),
            jitter: StdDuration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: usize, retry_after: Option<StdDuration>) -> StdDuration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        let mut delay = retry_after.unwrap_or_else(|| self.base_delay.saturating_mul(1 << exponent));
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_max = self.jitter.as_millis() as u64;
        if jitter_max == 0 {
            return delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=jitter_max);
        delay + StdDuration::from_millis(jitter_ms)
    }

    fn is_retryable(status: StatusCode) -> bool {
        RETRYABLE_STATUSES.contains(&status.as_u16())
    }
}

/// Build the process-wide HTTP client shared by the fetcher and the notifier.
pub fn build_client() -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(PREFERRED_LANGUAGES));
    Client::builder().default_headers(headers).build()
}

/// Fetches and parses HTML pages.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: StdDuration,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Create a fetcher over a shared client.
    pub fn new(client: Client, timeout: StdDuration, retry: RetryPolicy) -> Self {
        Self {
            client,
            timeout,
            retry,
        }
    }

    /// Fetch `url` with the default timeout.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        self.fetch_with_timeout(url, self.timeout).await
    }

    /// Fetch `url` and parse it as an HTML document.
    ///
    /// Never panics on network conditions; every failure comes back as a
    /// [`FetchError`] once the retry budget is spent.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn fetch_with_timeout(&self, url: &str, timeout: StdDuration) -> FetchResult {
        let parsed = url::Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let outcome = self
                .client
                .get(parsed.clone())
                .timeout(timeout)
                .send()
                .await;

            let (failure, retry_after) = match outcome {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await.map_err(|source| FetchError::Body {
                        url: url.to_string(),
                        source,
                    })?;
                    debug!(
                        bytes = body.len(),
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        "Fetched page"
                    );
                    return Ok(Html::parse_document(&body));
                }
                Ok(response) => {
                    let status = response.status();
                    let failure = FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                    if !RetryPolicy::is_retryable(status) {
                        warn!(status = status.as_u16(), "Non-retryable HTTP status");
                        return Err(failure);
                    }
                    (failure, parse_retry_after(&response))
                }
                Err(source) if source.is_timeout() => {
                    (FetchError::Timeout { url: url.to_string() }, None)
                }
                Err(source) => (
                    FetchError::Transport {
                        url: url.to_string(),
                        source,
                    },
                    None,
                ),
            };

            attempt += 1;
            let attempt_dt = attempt_t0.elapsed();
            let total_dt = total_t0.elapsed();

            if attempt > self.retry.max_retries {
                error!(
                    attempt,
                    max = self.retry.max_retries,
                    elapsed_ms_attempt = attempt_dt.as_millis(),
                    elapsed_ms_total = total_dt.as_millis(),
                    error = %failure,
                    "fetch exhausted retries"
                );
                return Err(failure);
            }

            let delay = self.retry.delay_for(attempt, retry_after);
            warn!(
                attempt,
                max = self.retry.max_retries,
                elapsed_ms_attempt = attempt_dt.as_millis(),
                ?delay,
                error = %failure,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

fn parse_retry_after(response: &Response) -> Option<StdDuration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(StdDuration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: StdDuration::from_millis(5),
            max_delay: StdDuration::from_millis(20),
            jitter: StdDuration::ZERO,
        }
    }

    fn fetcher(max_retries: usize) -> Fetcher {
        Fetcher::new(
            build_client().unwrap(),
            StdDuration::from_secs(5),
            fast_policy(max_retries),
        )
    }

    fn title_of(doc: &Html) -> String {
        let selector = Selector::parse("title").unwrap();
        doc.select(&selector)
            .next()
            .map(|t| t.text().collect::<String>())
            .unwrap_or_default()
    }

    #[test]
    fn test_default_policy_matches_backoff_schedule() {
        let policy = RetryPolicy {
            jitter: StdDuration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(1, None), StdDuration::from_millis(600));
        assert_eq!(policy.delay_for(2, None), StdDuration::from_millis(1200));
        assert_eq!(policy.delay_for(3, None), StdDuration::from_millis(2400));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            jitter: StdDuration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(20, None), StdDuration::from_secs(30));
        assert_eq!(
            policy.delay_for(1, Some(StdDuration::from_secs(3600))),
            StdDuration::from_secs(30)
        );
        assert_eq!(
            policy.delay_for(1, Some(StdDuration::from_secs(2))),
            StdDuration::from_secs(2)
        );
    }

    #[test]
    fn test_jitter_is_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay_for(1, None);
            assert!(delay >= StdDuration::from_millis(600));
            assert!(delay <= StdDuration::from_millis(850));
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><head><title>Accueil</title></head></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let doc = fetcher(0)
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(title_of(&doc), "Accueil");

        let requests = server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        assert_eq!(
            headers.get("user-agent").unwrap().to_str().unwrap(),
            BROWSER_USER_AGENT
        );
        assert_eq!(
            headers.get("accept-language").unwrap().to_str().unwrap(),
            PREFERRED_LANGUAGES
        );
    }

    #[tokio::test]
    async fn test_fetch_retries_retryable_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<title>enfin</title>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let doc = fetcher(3)
            .fetch(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(title_of(&doc), "enfin");
    }

    #[tokio::test]
    async fn test_fetch_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>ok</title>"))
            .expect(1)
            .mount(&server)
            .await;

        // A long computed backoff would blow the timeout below; Retry-After: 0 replaces it.
        let patient = Fetcher::new(
            build_client().unwrap(),
            StdDuration::from_secs(5),
            RetryPolicy {
                max_retries: 1,
                base_delay: StdDuration::from_secs(20),
                max_delay: StdDuration::from_secs(30),
                jitter: StdDuration::ZERO,
            },
        );
        let doc = tokio::time::timeout(
            StdDuration::from_secs(5),
            patient.fetch(&format!("{}/limited", server.uri())),
        )
        .await
        .expect("Retry-After should replace the 20s backoff")
        .unwrap();
        assert_eq!(title_of(&doc), "ok");
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .expect(4)
            .mount(&server)
            .await;

        let err = fetcher(3)
            .fetch(&format!("{}/down", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher(3)
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(3)))
            .mount(&server)
            .await;

        let err = fetcher(0)
            .fetch_with_timeout(
                &format!("{}/slow", server.uri()),
                StdDuration::from_millis(200),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = fetcher(1)
            .fetch(&format!("http://127.0.0.1:{port}/gone"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport { .. } | FetchError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let err = fetcher(0).fetch("pas une url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
