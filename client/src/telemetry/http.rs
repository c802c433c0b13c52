use std::time::Duration;

use pitwatch_shared::{
    AttributeScope, Attributes, Device, DeviceQuery, LoginRequest, LoginResponse, TimeseriesData,
};
use reqwest::Url;

use super::transport::{HistoryWindow, TelemetryApi};
use crate::config::Credentials;
use crate::error::TelemetryError;

/// [`TelemetryApi`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTelemetryApi {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTelemetryApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TelemetryError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| TelemetryError::Network(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TelemetryError::Network(format!("{base_url} cannot be a base url")));
        }
        let http = reqwest::Client::builder()
            .user_agent("pitwatch-client/0.1")
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(3)))
            .build()
            .map_err(|e| TelemetryError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    /// Append percent-encoded path segments to the base url.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TelemetryError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| TelemetryError::Network(format!("{} cannot be a base url", self.base_url)))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
        query: &[(&str, String)],
    ) -> Result<T, TelemetryError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

fn keys_param(keys: &[String]) -> String {
    keys.join(",")
}

impl TelemetryApi for HttpTelemetryApi {
    async fn login(&self, credentials: &Credentials) -> Result<String, TelemetryError> {
        let url = self.endpoint(&["auth", "login"])?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .send()
            .await
            .map_err(|e| TelemetryError::Network(e.to_string()))?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(TelemetryError::Auth(format!("login rejected (HTTP {status})")));
        }
        if !status.is_success() {
            return Err(TelemetryError::Network(format!("login failed (HTTP {status})")));
        }
        let body: LoginResponse = response.json().await?;
        if body.token.is_empty() {
            return Err(TelemetryError::Auth("login returned an empty token".into()));
        }
        Ok(body.token)
    }

    async fn devices(&self, token: &str, query: &DeviceQuery) -> Result<Vec<Device>, TelemetryError> {
        let url = self.endpoint(&["devices"])?;
        let mut params = vec![
            ("pageSize", query.page_size.to_string()),
            ("page", query.page.to_string()),
        ];
        if let Some(device_type) = &query.device_type {
            params.push(("type", device_type.clone()));
        }
        self.get_json(url, token, &params).await
    }

    async fn latest_telemetry(
        &self,
        token: &str,
        device_id: &str,
        keys: &[String],
    ) -> Result<TimeseriesData, TelemetryError> {
        let url = self.endpoint(&["devices", device_id, "telemetry", "latest"])?;
        self.get_json(url, token, &[("keys", keys_param(keys))]).await
    }

    async fn telemetry_history(
        &self,
        token: &str,
        device_id: &str,
        keys: &[String],
        window: HistoryWindow,
    ) -> Result<TimeseriesData, TelemetryError> {
        let url = self.endpoint(&["devices", device_id, "telemetry", "history"])?;
        let params = [
            ("keys", keys_param(keys)),
            ("startTs", window.start_ts.to_string()),
            ("endTs", window.end_ts.to_string()),
            ("limit", window.limit.to_string()),
        ];
        self.get_json(url, token, &params).await
    }

    async fn attributes(
        &self,
        token: &str,
        device_id: &str,
        scope: AttributeScope,
    ) -> Result<Attributes, TelemetryError> {
        let url = self.endpoint(&["devices", device_id, "attributes", scope.as_str()])?;
        self.get_json(url, token, &[]).await
    }

    async fn save_attributes(
        &self,
        token: &str,
        device_id: &str,
        scope: AttributeScope,
        attributes: &Attributes,
    ) -> Result<(), TelemetryError> {
        let url = self.endpoint(&["devices", device_id, "attributes", scope.as_str()])?;
        self.http
            .post(url)
            .bearer_auth(token)
            .json(attributes)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let api = HttpTelemetryApi::new("http://pit.local:8080/api/", Duration::from_secs(1))
            .expect("valid base url");
        let url = api
            .endpoint(&["devices", "HT 101/a", "telemetry", "latest"])
            .expect("endpoint builds");
        assert_eq!(
            url.as_str(),
            "http://pit.local:8080/api/devices/HT%20101%2Fa/telemetry/latest"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(HttpTelemetryApi::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpTelemetryApi::new("mailto:ops@pit.local", Duration::from_secs(1)).is_err());
    }
}
