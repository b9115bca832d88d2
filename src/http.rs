use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::{Span, debug, instrument};
use url::Url;

use crate::error::ForemanError;
use crate::transport::{HttpMethod, Params, Transport};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SLOW_TIMEOUT_SECS: u64 = 600;

static FOOTER_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Version\s+(?P<version>[^\s<]+)").expect("valid version footer pattern")
});

#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { user: String, password: String },
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// Per-verb request timeouts. `None` means no timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    default: Option<Duration>,
    per_method: HashMap<HttpMethod, Option<Duration>>,
}

impl Default for Timeouts {
    fn default() -> Self {
        let mut timeouts = Self {
            default: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            per_method: HashMap::new(),
        };
        timeouts.set(HttpMethod::Post, DEFAULT_SLOW_TIMEOUT_SECS);
        timeouts.set(HttpMethod::Delete, DEFAULT_SLOW_TIMEOUT_SECS);
        timeouts
    }
}

impl Timeouts {
    pub fn get(&self, method: HttpMethod) -> Option<Duration> {
        self.per_method
            .get(&method)
            .copied()
            .unwrap_or(self.default)
    }

    /// Zero seconds disables the timeout.
    pub fn set(&mut self, method: HttpMethod, secs: u64) {
        self.per_method.insert(method, seconds(secs));
    }

    pub fn set_default(&mut self, secs: u64) {
        self.default = seconds(secs);
    }

    /// Makes `method` fall back to the default timeout again.
    pub fn unset(&mut self, method: HttpMethod) {
        self.per_method.remove(&method);
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
    api_version: u32,
    auth: Option<Auth>,
    timeouts: Timeouts,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("http", &self.http)
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("auth", &self.auth)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl HttpTransport {
    pub fn builder(base_url: impl AsRef<str>) -> Result<HttpTransportBuilder, ForemanError> {
        let value = base_url.as_ref();
        let mut parsed = Url::parse(value).map_err(|source| ForemanError::InvalidBaseUrl {
            base_url: value.to_string(),
            source,
        })?;

        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        Ok(HttpTransportBuilder {
            base_url: parsed,
            api_version: 1,
            auth: None,
            timeouts: Timeouts::default(),
            verify: false,
            http_client: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    fn url(&self, path: &str) -> Result<Url, ForemanError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: HttpMethod, url: Url) -> RequestBuilder {
        let verb = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self
            .http
            .request(verb, url)
            .header(ACCEPT, format!("application/json; version={}", self.api_version))
            .header(CONTENT_TYPE, "application/json");

        builder = match &self.auth {
            Some(Auth::Basic { user, password }) => builder.basic_auth(user, Some(password)),
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };

        match self.timeouts.get(method) {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    #[instrument(
        name = "foreman_request",
        skip(self, params),
        fields(
            http.method = %method,
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
        )
    )]
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
    ) -> Result<Value, ForemanError> {
        let url = self.url(path)?;
        Span::current().record("http.url", url.as_str());

        let mut builder = self.request(method, url.clone());
        builder = match method {
            HttpMethod::Get => builder.query(&flatten_query_pairs(params)),
            HttpMethod::Post | HttpMethod::Put => builder.json(params),
            HttpMethod::Delete => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());
        let body = response.text().await?;

        if status.is_success() {
            return Ok(match serde_json::from_str(&body) {
                Ok(value) => value,
                Err(_) => Value::String(body),
            });
        }

        debug!(status = status.as_u16(), url = %url, body = %body, "request failed");
        let url = url.to_string();
        match status.as_u16() {
            404 if method == HttpMethod::Get => Ok(Value::Array(Vec::new())),
            404 => Err(ForemanError::NotFound { url, body }),
            406 => Err(ForemanError::Unacceptable { url, body }),
            status => Err(ForemanError::Transport { status, url, body }),
        }
    }

    pub async fn fetch(&self, path: &str) -> Result<(u16, String), ForemanError> {
        let response = self.request(HttpMethod::Get, self.url(path)?).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.text().await?))
    }

    /// Reads the server version from the home page footer, falling back to
    /// `/api/status` on servers that no longer print it.
    pub async fn detect_version(&self) -> Result<String, ForemanError> {
        let (_, home_page) = self.fetch("").await?;
        if let Some(version) = FOOTER_VERSION
            .captures(&home_page)
            .and_then(|captures| captures.name("version"))
        {
            return Ok(version.as_str().to_string());
        }

        let (status, body) = self.fetch("api/status").await?;
        if !(200..300).contains(&status) {
            return Err(ForemanError::Transport {
                status,
                url: self.url("api/status")?.to_string(),
                body,
            });
        }

        let status: Value = serde_json::from_str(&body)?;
        status
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ForemanError::VersionDetection("status has no version".to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.send(HttpMethod::Get, url, params).await
    }

    async fn post(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.send(HttpMethod::Post, url, params).await
    }

    async fn put(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.send(HttpMethod::Put, url, params).await
    }

    async fn delete(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.send(HttpMethod::Delete, url, params).await
    }
}

pub struct HttpTransportBuilder {
    base_url: Url,
    api_version: u32,
    auth: Option<Auth>,
    timeouts: Timeouts,
    verify: bool,
    http_client: Option<Client>,
}

impl HttpTransportBuilder {
    pub fn api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Verify TLS certificates. Off by default.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn http_client(mut self, http_client: Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn build(self) -> Result<HttpTransport, ForemanError> {
        let http = match self.http_client {
            Some(client) => client,
            None => Client::builder()
                .danger_accept_invalid_certs(!self.verify)
                .build()?,
        };

        Ok(HttpTransport {
            http,
            base_url: self.base_url,
            api_version: self.api_version,
            auth: self.auth,
            timeouts: self.timeouts,
        })
    }
}

fn flatten_query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut fields = Vec::new();

    for (key, item) in params {
        flatten_query_value(key, item, &mut fields);
    }

    fields
}

fn flatten_query_value(prefix: &str, value: &Value, fields: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(boolean) => fields.push((
            prefix.to_string(),
            if *boolean { "true" } else { "false" }.to_string(),
        )),
        Value::Number(number) => fields.push((prefix.to_string(), number.to_string())),
        Value::String(string) => fields.push((prefix.to_string(), string.to_string())),
        Value::Array(array) => {
            for (index, item) in array.iter().enumerate() {
                let next = format!("{prefix}[{index}]");
                flatten_query_value(&next, item, fields);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let next = format!("{prefix}[{key}]");
                flatten_query_value(&next, item, fields);
            }
        }
    }
}
