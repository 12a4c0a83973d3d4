use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Runs `operation` up to `attempts` times, sleeping `step * attempt` between
/// failures (linear backoff). Returns the last error when every attempt fails.
pub async fn with_linear_backoff<F, Fut, T, E>(
    label: &str,
    attempts: u32,
    step: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!("{} failed (attempt {}/{}): {}", label, attempt, attempts, e);
                tokio::time::sleep(step * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
