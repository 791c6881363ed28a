use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::warn;

/// One retry on transient failures; the pipeline is best-effort per record.
pub const MAX_RETRIES: u32 = 1;
pub const BASE_BACKOFF_MS: u64 = 2000;

const USER_AGENT: &str = concat!("wp_pagegen/", env!("CARGO_PKG_VERSION"));

pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

pub fn default_backoff() -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS)
}

/// Outcome of a single request attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth one more try (rate limit, overload, gateway errors).
    Transient(String),
    Permanent(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transient(m) | AttemptError::Permanent(m) => f.write_str(m),
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or retries run out.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    backoff: Duration,
    mut attempt: F,
) -> Result<T, AttemptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut tries = 0u32;
    loop {
        match attempt().await {
            Err(AttemptError::Transient(msg)) if tries < MAX_RETRIES => {
                let wait = backoff * 2u32.pow(tries);
                warn!(
                    "{}: transient failure ({}), attempt {}/{}, backing off {:.1}s",
                    label,
                    msg,
                    tries + 1,
                    MAX_RETRIES,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
                tries += 1;
            }
            other => return other,
        }
    }
}

/// Status codes an LLM provider uses for temporary conditions.
pub fn is_transient_llm_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Gateway errors only: a 500 from WordPress may already have written the page.
pub fn is_transient_gateway_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}
