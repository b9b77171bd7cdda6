//! Backend client over HTTP/JSON.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use netlab_core::{ComputeId, ComputeSpec};

use super::{Compute, ComputeError, Timeout};

const API_PREFIX: &str = "/v2/compute";

/// A compute reached through its REST API.
pub struct HttpCompute {
    spec: ComputeSpec,
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpCompute {
    pub fn new(spec: ComputeSpec, default_timeout: Duration) -> Self {
        HttpCompute {
            spec,
            client: reqwest::Client::new(),
            default_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.spec.base_url(), API_PREFIX, path)
    }

    fn prepare(&self, mut req: reqwest::RequestBuilder, timeout: Timeout) -> reqwest::RequestBuilder {
        if let Some(user) = &self.spec.user {
            req = req.basic_auth(user, self.spec.password.as_ref());
        }
        match timeout {
            Timeout::Default => req.timeout(self.default_timeout),
            Timeout::After(d) => req.timeout(d),
            Timeout::Never => req,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ComputeError {
        if err.is_timeout() {
            ComputeError::Timeout {
                compute_id: self.spec.compute_id.to_string(),
            }
        } else {
            ComputeError::Unreachable {
                compute_id: self.spec.compute_id.to_string(),
                reason: err.to_string(),
            }
        }
    }

    async fn read(&self, response: reqwest::Response) -> Result<Value, ComputeError> {
        let status = response.status();
        let body = response.text().await.map_err(|err| self.transport_error(err))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(ComputeError::Http {
                compute_id: self.spec.compute_id.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| ComputeError::InvalidResponse {
            compute_id: self.spec.compute_id.to_string(),
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl Compute for HttpCompute {
    fn id(&self) -> &ComputeId {
        &self.spec.compute_id
    }

    fn spec(&self) -> ComputeSpec {
        self.spec.redacted()
    }

    async fn post(&self, path: &str, body: Value, timeout: Timeout) -> Result<Value, ComputeError> {
        tracing::debug!("POST {} on compute {}", path, self.spec.compute_id);
        let req = self.prepare(self.client.post(self.url(path)).json(&body), timeout);
        let response = req.send().await.map_err(|err| self.transport_error(err))?;
        self.read(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ComputeError> {
        tracing::debug!("DELETE {} on compute {}", path, self.spec.compute_id);
        let req = self.prepare(self.client.delete(self.url(path)), Timeout::Default);
        let response = req.send().await.map_err(|err| self.transport_error(err))?;
        self.read(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_prefixed_with_the_compute_api() {
        let spec = ComputeSpec::new(ComputeId::new("vm"), "10.0.0.2", 3080);
        let compute = HttpCompute::new(spec, Duration::from_secs(5));
        assert_eq!(
            compute.url("/projects"),
            "http://10.0.0.2:3080/v2/compute/projects"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_reported() {
        let spec = ComputeSpec::new(ComputeId::new("vm"), "127.0.0.1", 9);
        let compute = HttpCompute::new(spec, Duration::from_secs(2));
        let err = compute
            .post("/projects", serde_json::json!({}), Timeout::Default)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ComputeError::Unreachable { .. } | ComputeError::Timeout { .. }
        ));
    }

    #[test]
    fn spec_never_leaks_the_password() {
        let mut spec = ComputeSpec::new(ComputeId::new("vm"), "h", 1);
        spec.password = Some("secret".into());
        let compute = HttpCompute::new(spec, Duration::from_secs(1));
        assert!(compute.spec().password.is_none());
    }
}
