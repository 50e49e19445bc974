// Media-engine HTTP client.
//
// `reqwest::Client` for transport (pooled, shared across calls), wrapped
// with a retry/backoff loop and a `CircuitBreaker`. Retries apply only to
// transient transport errors, timeouts, and 5xx; 4xx is never retried.

use super::circuit_breaker::CircuitBreaker;
use crate::{
    config::MediaMtxConfig,
    error::{ErrorKind, ServiceError},
};
use bytes::Bytes;
use rand::Rng;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
enum AttemptError {
    Transport(anyhow::Error),
    Timeout,
    HttpStatus(StatusCode, String),
    Cancelled,
}
impl AttemptError {
    fn retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::HttpStatus(status, _) => status.is_server_error(),
            Self::Cancelled => false,
        }
    }
}
impl From<AttemptError> for ServiceError {
    fn from(value: AttemptError) -> Self {
        match value {
            AttemptError::Transport(error) => ServiceError::new(ErrorKind::Transport, error),
            AttemptError::Timeout => ServiceError::from_kind(ErrorKind::Timeout),
            AttemptError::HttpStatus(status, body) => ServiceError::new(
                ErrorKind::HttpStatus,
                anyhow::anyhow!("media engine returned {status}: {body}"),
            ),
            AttemptError::Cancelled => ServiceError::from_kind(ErrorKind::Cancelled),
        }
    }
}

#[derive(Debug)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    retry_attempts: u32,
    retry_base_delay: Duration,
    retry_jitter_min: f64,
    retry_jitter_max: f64,
    breaker: CircuitBreaker,
}
impl Client {
    pub fn new(config: &MediaMtxConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from(config.pool_idle_timeout))
            .build()
            .map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;

        let base_url = format!(
            "{}:{}",
            config.base_url.trim_end_matches('/'),
            config.api_port
        );

        Ok(Self {
            base_url,
            http,
            timeout: config.timeout.into(),
            retry_attempts: config.retry_attempts,
            retry_base_delay: config.retry_base_delay.into(),
            retry_jitter_min: config.retry_jitter_min,
            retry_jitter_max: config.retry_jitter_max,
            breaker: CircuitBreaker::new(
                config.circuit_failure_threshold,
                config.circuit_recovery_timeout.into(),
                config.circuit_recovery_confirmation_threshold,
                config.circuit_max_backoff.into(),
            ),
        })
    }

    pub fn circuit_state(&self) -> super::circuit_breaker::CircuitState {
        self.breaker.state()
    }

    pub async fn get(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ServiceError> {
        self.request(Method::GET, endpoint, None, cancel).await
    }
    pub async fn post(
        &self,
        endpoint: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ServiceError> {
        self.request(Method::POST, endpoint, body, cancel).await
    }
    pub async fn put(
        &self,
        endpoint: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ServiceError> {
        self.request(Method::PUT, endpoint, body, cancel).await
    }
    pub async fn delete(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ServiceError> {
        self.request(Method::DELETE, endpoint, None, cancel).await
    }
    pub async fn patch(
        &self,
        endpoint: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ServiceError> {
        self.request(Method::PATCH, endpoint, body, cancel).await
    }

    pub async fn health_check(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        self.get("/v3/paths/list", cancel).await.map(|_| ())
    }

    pub async fn close(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ServiceError> {
        self.breaker.try_acquire()?;

        let result = self.request_with_retry(method, endpoint, body, cancel).await;
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(error) if error.kind != ErrorKind::Cancelled => self.breaker.record_failure(),
            Err(_) => {}
        }
        result
    }

    async fn request_with_retry(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ServiceError> {
        let mut delay = self.retry_base_delay;
        let mut last_error = None;

        for attempt in 0..self.retry_attempts.max(1) {
            match self.attempt_once(method.clone(), endpoint, body.clone(), cancel).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => {
                    let retryable = error.retryable();
                    last_error = Some(error);
                    let is_last = attempt + 1 == self.retry_attempts.max(1);
                    if !retryable || is_last {
                        break;
                    }

                    let jitter_fraction =
                        rand::thread_rng().gen_range(self.retry_jitter_min..=self.retry_jitter_max);
                    let jittered = delay + delay.mul_f64(jitter_fraction);
                    tokio::select! {
                        () = tokio::time::sleep(jittered) => {},
                        () = cancel.cancelled() => {
                            last_error = Some(AttemptError::Cancelled);
                            break;
                        }
                    }
                    delay *= 2;
                }
            }
        }

        Err(last_error.expect("at least one attempt always runs").into())
    }

    async fn attempt_once(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, AttemptError> {
        if cancel.is_cancelled() {
            return Err(AttemptError::Cancelled);
        }

        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.http.request(method, &url).timeout(self.timeout);
        if let Some(body) = body {
            request = request.body(body).header("content-type", "application/json");
        }

        let response = tokio::select! {
            result = request.send() => match result {
                Ok(response) => response,
                Err(error) if error.is_timeout() => return Err(AttemptError::Timeout),
                Err(error) if error.is_connect() || error.is_request() => {
                    return Err(AttemptError::Transport(error.into()))
                }
                Err(error) => return Err(AttemptError::Transport(error.into())),
            },
            () = cancel.cancelled() => return Err(AttemptError::Cancelled),
        };

        let status = response.status();
        if status.is_success() {
            tokio::select! {
                result = response.bytes() => result.map_err(|error| AttemptError::Transport(error.into())),
                () = cancel.cancelled() => Err(AttemptError::Cancelled),
            }
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AttemptError::HttpStatus(status, body))
        }
    }
}

#[cfg(test)]
mod test_client {
    use super::AttemptError;
    use reqwest::StatusCode;

    #[test]
    fn server_errors_are_retryable() {
        let error = AttemptError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR, String::new());
        assert!(error.retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let error = AttemptError::HttpStatus(StatusCode::NOT_FOUND, String::new());
        assert!(!error.retryable());
    }

    #[test]
    fn timeouts_are_retryable() {
        assert!(AttemptError::Timeout.retryable());
    }
}
