//! Blocking HTTP plumbing shared by the embedder and generator clients.
//!
//! Every request has a global timeout. Failures are classified into
//! [`ServiceError`] so callers can wrap them in their own error category.

use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::ServiceError;

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
    retry_attempts: u32,
    backoff_base: Duration,
}

impl HttpTransport {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            timeout,
            retry_attempts: 1,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self.timeout = timeout;
        self
    }

    /// Total attempts per request, including the first. Only server errors
    /// and transport failures are retried.
    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    pub fn get(
        &self,
        operation: &str,
        url: &Url,
        bearer: Option<&str>,
    ) -> Result<String, ServiceError> {
        self.send_with_retry(operation, || {
            let mut request = self.agent.get(url.as_str());
            if let Some(token) = bearer {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    pub fn post_json(
        &self,
        operation: &str,
        url: &Url,
        bearer: Option<&str>,
        body: &str,
    ) -> Result<String, ServiceError> {
        self.send_with_retry(operation, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = bearer {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn send_with_retry<F>(&self, operation: &str, mut request_fn: F) -> Result<String, ServiceError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "{}: HTTP request attempt {}/{}",
                operation, attempt, self.retry_attempts
            );

            match request_fn() {
                Ok(response_text) => {
                    debug!("{}: request succeeded on attempt {}", operation, attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let classified = classify(operation, &error);
                    if !is_retryable(&error) {
                        warn!("{}: non-retryable error: {}", operation, error);
                        return Err(classified);
                    }

                    warn!(
                        "{}: transient error: {}, attempt {}/{}",
                        operation, error, attempt, self.retry_attempts
                    );
                    last_error = Some(classified);

                    if attempt < self.retry_attempts {
                        let delay = self.backoff_base * 2_u32.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("{}: all {} attempts failed", operation, self.retry_attempts);
        Err(last_error.unwrap_or_else(|| {
            ServiceError::Unreachable(format!("{} failed after retries", operation))
        }))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

/// Map a ureq failure onto the service error taxonomy
pub fn classify(operation: &str, error: &ureq::Error) -> ServiceError {
    match error {
        ureq::Error::Timeout(_) => ServiceError::Timeout {
            operation: operation.to_string(),
        },
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            ServiceError::Timeout {
                operation: operation.to_string(),
            }
        }
        ureq::Error::StatusCode(status) if *status == 401 || *status == 403 => {
            ServiceError::Misconfigured(format!("credential rejected (HTTP {})", status))
        }
        ureq::Error::StatusCode(status) => ServiceError::Rejected {
            status: *status,
            message: format!("{} failed", operation),
        },
        _ => ServiceError::Unreachable(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        assert_eq!(
            classify("embed", &ureq::Error::StatusCode(401)),
            ServiceError::Misconfigured("credential rejected (HTTP 401)".to_string())
        );
        assert!(matches!(
            classify("embed", &ureq::Error::StatusCode(503)),
            ServiceError::Rejected { status: 503, .. }
        ));
        assert!(matches!(
            classify("embed", &ureq::Error::ConnectionFailed),
            ServiceError::Unreachable(_)
        ));
    }

    #[test]
    fn retry_policy() {
        assert!(is_retryable(&ureq::Error::StatusCode(502)));
        assert!(!is_retryable(&ureq::Error::StatusCode(404)));
        assert!(is_retryable(&ureq::Error::HostNotFound));
    }

    #[test]
    fn retry_attempts_never_zero() {
        let transport = HttpTransport::new(Duration::from_secs(5)).with_retry_attempts(0);
        assert_eq!(transport.retry_attempts(), 1);
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unreachable_host_is_not_a_timeout() {
        let transport = HttpTransport::new(Duration::from_secs(2))
            .with_backoff_base(Duration::from_millis(1))
            .with_retry_attempts(2);
        let url = Url::parse("http://127.0.0.1:9/nothing").expect("valid url");

        let result = transport.get("probe", &url, None);
        assert!(matches!(result, Err(ServiceError::Unreachable(_))));
    }
}
