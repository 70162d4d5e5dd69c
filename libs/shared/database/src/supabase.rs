use std::time::Duration;

use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::error::StoreError;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    max_retries: u32,
    budget: Duration,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(config.store_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            max_retries: config.store_max_retries,
            budget: config.store_timeout(),
        }
    }

    fn get_headers(&self, extra: Option<HeaderMap>) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| StoreError::Rejected(format!("invalid API key header: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|e| StoreError::Rejected(format!("invalid API key header: {}", e)))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(extra) = extra {
            headers.extend(extra);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, StoreError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, body, None).await
    }

    /// Reads are retried with exponential backoff on transient failures.
    /// Writes get exactly one attempt: a retried insert could double-apply.
    ///
    /// Every attempt and every backoff sleep together fit inside the store
    /// timeout, so a caller bounding the whole call still sees the retries.
    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         body: Option<Value>, headers: Option<HeaderMap>)
                                         -> Result<T, StoreError>
    where T: DeserializeOwned {
        let attempts = if method == Method::GET { self.max_retries + 1 } else { 1 };
        let per_attempt = attempt_timeout(self.budget, attempts);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(method.clone(), path, body.clone(), headers.clone(), per_attempt).await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = backoff_delay(attempt);
                    warn!("Transient store failure on {} (attempt {}/{}): {}; retrying in {:?}",
                          path, attempt, attempts, e, delay);
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once<T>(&self, method: Method, path: &str,
                          body: Option<Value>, headers: Option<HeaderMap>, timeout: Duration)
                          -> Result<T, StoreError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url)
            .timeout(timeout)
            .headers(self.get_headers(headers)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(map_status_error(status, error_text));
        }

        response.json::<T>().await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.pow(attempt - 1)
}

/// Split `budget` across `attempts` tries after reserving the backoff sleeps.
fn attempt_timeout(budget: Duration, attempts: u32) -> Duration {
    let attempts = attempts.max(1);
    let backoff: Duration = (1..attempts).map(backoff_delay).sum();
    let share = budget.saturating_sub(backoff) / attempts;
    if share.is_zero() { budget / attempts } else { share }
}

fn map_transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(Duration::ZERO)
    } else {
        StoreError::Unavailable(err.to_string())
    }
}

fn map_status_error(status: StatusCode, body: String) -> StoreError {
    match status.as_u16() {
        404 => StoreError::NotFound,
        // PostgREST answers 409 for unique/exclusion constraint violations (23505)
        409 => StoreError::UniqueViolation(body),
        408 | 504 => StoreError::Timeout(Duration::ZERO),
        429 | 500..=599 => StoreError::Unavailable(format!("{}: {}", status, body)),
        _ => StoreError::Rejected(format!("{}: {}", status, body)),
    }
}
