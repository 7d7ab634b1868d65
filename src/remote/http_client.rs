use std::future::Future;

use super::*;

/// Retries idempotent reads only; writes are left to the caller's own
/// retry triggers.
pub(super) async fn with_retries<T, F, Fut>(label: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    const ATTEMPTS: usize = 3;
    let mut last: Option<anyhow::Error> = None;
    for i in 0..ATTEMPTS {
        match f().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                tracing::debug!(label, attempt = i + 1, error = %err, "remote read failed");
                last = Some(err);
                if i + 1 < ATTEMPTS {
                    tokio::time::sleep(std::time::Duration::from_millis(200 * (1 << i))).await;
                }
            }
        }
    }
    Err(last
        .unwrap_or_else(|| anyhow::anyhow!("unknown error"))
        .context(label.to_string()))
}

impl HttpRemote {
    pub(super) fn ensure_ok(
        &self,
        resp: reqwest::Response,
        label: &str,
    ) -> Result<reqwest::Response> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            anyhow::bail!("unauthorized (token invalid/expired; check remote.token in config.json)");
        }
        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            anyhow::bail!("forbidden (insufficient permissions for this workspace)");
        }
        resp.error_for_status()
            .with_context(|| format!("{} status", label))
    }

    /// Attaches the bearer token when one is configured.
    pub(super) fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.remote.token.as_deref() {
            Some(token) => req.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token)),
            None => req,
        }
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{}", self.remote.base_url.trim_end_matches('/'), path)
    }
}
