use std::time::Duration;

use biya_common::error::{ExporterError, Result};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Builds the HTTP client shared by every upstream adapter.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| ExporterError::InternalError(format!("failed to build http client: {err}")))
}

pub(crate) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// GETs `base_url + path` and decodes the JSON body, ignoring unknown fields.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    upstream: &str,
    base_url: &str,
    path: &str,
    query: &[(&str, String)],
) -> Result<T> {
    if base_url.is_empty() {
        return Err(ExporterError::InvalidConfig(format!(
            "{upstream} base url is empty"
        )));
    }

    let url = format!("{base_url}{path}");
    fetch_json(client.get(&url).query(query), upstream, url).await
}

/// Response wrapper of the Biya REST APIs: `{"code": 0, "message": "...", "data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

/// GETs a Biya REST API endpoint with bearer auth and returns the envelope's
/// `data` once `code` reports success.
pub(crate) async fn get_api_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    upstream: &str,
    api: &ApiEndpoint,
    path: &str,
    query: &[(&str, String)],
) -> Result<T> {
    if api.base_url.is_empty() {
        return Err(ExporterError::InvalidConfig(format!(
            "{upstream} base url is empty"
        )));
    }
    if api.api_key.is_empty() {
        return Err(ExporterError::InvalidConfig(format!("{upstream} api key is empty")));
    }

    let url = format!("{}{path}", api.base_url);
    let request = client.get(&url).query(query).bearer_auth(&api.api_key);
    let envelope: Envelope = fetch_json(request, upstream, url.clone()).await?;
    if envelope.code != 0 {
        return Err(ExporterError::Upstream(format!(
            "{upstream} {url} answered code={} message={:?}",
            envelope.code, envelope.message
        )));
    }
    if envelope.data.is_null() {
        return Err(ExporterError::MalformedPayload(format!(
            "{upstream} payload from {url}: data is empty"
        )));
    }

    serde_json::from_value(envelope.data).map_err(|err| {
        ExporterError::MalformedPayload(format!("{upstream} payload from {url}: {err}"))
    })
}

/// Base url and bearer token of one Biya REST API.
#[derive(Debug, Clone)]
pub(crate) struct ApiEndpoint {
    pub base_url: String,
    pub api_key: String,
}

impl ApiEndpoint {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            api_key: api_key.trim().to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}

async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    upstream: &str,
    url: String,
) -> Result<T> {
    let response = request
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|err| ExporterError::Upstream(format!("{upstream} request to {url} failed: {err}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExporterError::UpstreamStatus {
            url,
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|err| ExporterError::Upstream(format!("{upstream} body from {url} failed: {err}")))?;
    serde_json::from_slice(&body).map_err(|err| {
        ExporterError::MalformedPayload(format!("{upstream} payload from {url}: {err}"))
    })
}

/// Parses the decimal strings upstreams use for large integers.
pub(crate) fn parse_number(field: &str, raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExporterError::MalformedPayload(format!("{field} is empty")));
    }
    trimmed
        .parse::<f64>()
        .map_err(|err| ExporterError::MalformedPayload(format!("{field} {raw:?}: {err}")))
}

/// Reads a JSON number or numeric string.
pub(crate) fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// First of `keys` present at the top level of `value` that holds a number.
pub(crate) fn field_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(number_value))
}

/// Searches `value` depth-first for each of `keys` in turn and returns the
/// first hit that reads as a number.
pub(crate) fn find_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| find_key(value, key).and_then(number_value))
}

fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|nested| find_key(nested, key))),
        Value::Array(items) => items.iter().find_map(|item| find_key(item, key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Json, Router, http::HeaderMap, routing::get};
    use biya_common::error::ExporterError;
    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::{
        ApiEndpoint, field_number, find_number, get_api_json, http_client, normalize_base_url,
        parse_number,
    };
    use crate::test_support::serve;

    #[test]
    fn base_url_loses_trailing_slashes() {
        assert_eq!(normalize_base_url(" http://rpc:26657// "), "http://rpc:26657");
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn numeric_strings() {
        assert_eq!(parse_number("total", " 42 ").unwrap(), 42.0);
        assert_eq!(parse_number("bonded", "1000000000000000000000").unwrap(), 1e21);
        assert!(parse_number("total", "").is_err());
        assert!(parse_number("total", "forty").is_err());
    }

    #[test]
    fn loose_number_lookup() {
        let value = json!({"tps": "7.5", "nested": {"rows": [{"height": 12}]}, "label": "x"});
        assert_eq!(field_number(&value, &["missing", "tps"]), Some(7.5));
        assert_eq!(field_number(&value, &["height"]), None);
        assert_eq!(find_number(&value, &["height"]), Some(12.0));
        assert_eq!(find_number(&value, &["label"]), None);
    }

    #[derive(Debug, Deserialize)]
    struct Greeting {
        hello: String,
    }

    fn envelope_router() -> Router {
        Router::new()
            .route(
                "/ok",
                get(|headers: HeaderMap| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({"code": 0, "message": "success", "data": {"hello": auth}}))
                }),
            )
            .route(
                "/denied",
                get(|| async { Json(json!({"code": 401, "message": "bad key", "data": {}})) }),
            )
            .route("/empty", get(|| async { Json(json!({"code": 0, "message": "success"})) }))
    }

    #[tokio::test]
    async fn api_envelope_is_unwrapped_with_bearer_auth() {
        let base_url = serve(envelope_router()).await;
        let client = http_client(Duration::from_secs(2)).unwrap();
        let api = ApiEndpoint::new(&format!("{base_url}/"), " k ");

        let greeting: Greeting = get_api_json(&client, "test api", &api, "/ok", &[]).await.unwrap();
        assert_eq!(greeting.hello, "Bearer k");

        let err = get_api_json::<Value>(&client, "test api", &api, "/denied", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExporterError::Upstream(message) if message.contains("code=401")));

        let err = get_api_json::<Value>(&client, "test api", &api, "/empty", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "payload");
    }

    #[tokio::test]
    async fn api_key_is_required() {
        let client = http_client(Duration::from_secs(1)).unwrap();
        let api = ApiEndpoint::new("http://127.0.0.1:9", "");
        assert!(!api.is_configured());

        let err = get_api_json::<Value>(&client, "test api", &api, "/ok", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExporterError::InvalidConfig(_)));
    }
}
