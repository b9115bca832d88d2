use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ForemanError;

pub type Params = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(value.to_string()),
        }
    }
}

/// Verb primitives every generated endpoint dispatches to.
///
/// `url` is relative to the server root (`/api/hosts/1`). Implementations map
/// non-2xx answers to errors, except a 404 on GET which yields an empty array.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, params: &Params) -> Result<Value, ForemanError>;

    async fn post(&self, url: &str, params: &Params) -> Result<Value, ForemanError>;

    async fn put(&self, url: &str, params: &Params) -> Result<Value, ForemanError>;

    async fn delete(&self, url: &str, params: &Params) -> Result<Value, ForemanError>;

    async fn dispatch(
        &self,
        method: HttpMethod,
        url: &str,
        params: &Params,
    ) -> Result<Value, ForemanError> {
        match method {
            HttpMethod::Get => self.get(url, params).await,
            HttpMethod::Post => self.post(url, params).await,
            HttpMethod::Put => self.put(url, params).await,
            HttpMethod::Delete => self.delete(url, params).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::{HttpMethod, Params, Transport};
    use crate::error::ForemanError;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct RecordedCall {
        pub method: HttpMethod,
        pub url: String,
        pub params: Params,
    }

    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        calls: Mutex<Vec<RecordedCall>>,
        responses: Mutex<HashMap<(HttpMethod, String), Value>>,
    }

    impl MockTransport {
        pub(crate) fn respond(&self, method: HttpMethod, url: &str, value: Value) {
            self.responses
                .lock()
                .unwrap()
                .insert((method, url.to_string()), value);
        }

        pub(crate) fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, method: HttpMethod, url: &str, params: &Params) -> Value {
            self.calls.lock().unwrap().push(RecordedCall {
                method,
                url: url.to_string(),
                params: params.clone(),
            });
            self.responses
                .lock()
                .unwrap()
                .get(&(method, url.to_string()))
                .cloned()
                .unwrap_or_else(|| json!({ "ok": true }))
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
            Ok(self.record(HttpMethod::Get, url, params))
        }

        async fn post(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
            Ok(self.record(HttpMethod::Post, url, params))
        }

        async fn put(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
            Ok(self.record(HttpMethod::Put, url, params))
        }

        async fn delete(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
            Ok(self.record(HttpMethod::Delete, url, params))
        }
    }
}
