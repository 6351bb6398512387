use crate::utils::error::{NavError, Result};
use reqwest::{Client, Response};
use std::future::Future;
use std::time::Duration;

pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("paid-search-nav/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// 非 2xx 回應轉為 ProviderError；Google API 錯誤格式為 `{"error": {"message": ...}}`
pub async fn ensure_success(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: Option<serde_json::Value> = serde_json::from_str(&body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| {
            // searchStream 的錯誤是包在陣列裡
            let error = v.get("error").or_else(|| v.get(0).and_then(|b| b.get("error")))?;
            error.get("message")?.as_str().map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(300).collect());

    Err(NavError::ProviderError {
        provider: provider.to_string(),
        status: status.as_u16(),
        message,
    })
}

/// 可重試錯誤以指數退避重試：delay、2×delay、4×delay...
pub async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                attempt += 1;
                tracing::warn!(
                    "🔁 {} failed ({}), retry {}/{} in {:?}",
                    label,
                    e,
                    attempt,
                    attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_stops_after_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("test", 3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(NavError::RateLimited { retry_after_secs: 0 })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_returned_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff("test", 5, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(NavError::validation("bad request")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff("test", 2, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(NavError::ProviderError {
                    provider: "google_ads".to_string(),
                    status: 503,
                    message: "unavailable".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
