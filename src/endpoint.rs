use std::collections::BTreeMap;
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;
use tracing::debug;

use crate::definition::{ApiDefinition, MethodDefinition};
use crate::error::ForemanError;
use crate::naming::{endpoint_name, global_name, resource_from_url};
use crate::params::{Signature, param_doc, url_params};
use crate::request::CallArgs;
use crate::transport::{HttpMethod, Params, Transport};

const PATH_PARAM_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone)]
pub struct Endpoint {
    name: String,
    resource: String,
    declaring_resource: String,
    http_method: HttpMethod,
    url_params: Vec<String>,
    signature: Signature,
    method: Arc<MethodDefinition>,
    api: ApiDefinition,
}

impl Endpoint {
    pub fn synthesize(
        declaring_resource: &str,
        method: &Arc<MethodDefinition>,
        api: &ApiDefinition,
    ) -> Result<Self, ForemanError> {
        let http_method = api.http_method.parse::<HttpMethod>().map_err(|verb| {
            ForemanError::InvalidDefinition(format!(
                "unsupported HTTP method `{verb}` for {}",
                api.api_url
            ))
        })?;

        let resource = resource_from_url(&api.api_url).unwrap_or_default();
        let name = endpoint_name(&api.api_url, &method.name, declaring_resource, &resource);
        let url_params = url_params(&api.api_url);
        let signature = Signature::build(&url_params, &method.params);

        Ok(Self {
            name,
            resource,
            declaring_resource: declaring_resource.to_string(),
            http_method,
            url_params,
            signature,
            method: Arc::clone(method),
            api: api.clone(),
        })
    }

    pub(crate) fn rebind(mut self, resource: &str, name: &str) -> Self {
        self.resource = resource.to_string();
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn declaring_resource(&self) -> &str {
        &self.declaring_resource
    }

    pub fn is_foreign(&self) -> bool {
        self.resource != self.declaring_resource
    }

    pub fn global_name(&self) -> String {
        global_name(&self.resource, &self.name)
    }

    pub fn url(&self) -> &str {
        &self.api.api_url
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn short_description(&self) -> &str {
        &self.api.short_description
    }

    pub fn url_params(&self) -> &[String] {
        &self.url_params
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn method(&self) -> &MethodDefinition {
        &self.method
    }

    pub fn api(&self) -> &ApiDefinition {
        &self.api
    }

    pub fn doc(&self) -> String {
        let mut doc = self.api.short_description.clone();
        doc.push('\n');
        for param in self.signature.params() {
            doc.push('\n');
            doc.push_str(&param_doc(param, None));
        }
        doc
    }

    /// Binds the arguments to the signature, dropping empty values.
    pub fn bind(&self, args: CallArgs) -> Result<BTreeMap<String, Value>, ForemanError> {
        let CallArgs { positional, named } = args;

        if positional.len() > self.signature.len() {
            return Err(ForemanError::TooManyArguments {
                endpoint: self.name.clone(),
                expected: self.signature.len(),
                given: positional.len(),
            });
        }

        let mut bound = BTreeMap::new();
        for (param, value) in self.signature.params().zip(positional) {
            bound.insert(param.name.clone(), value);
        }

        for (name, value) in named {
            if !self.signature.contains(&name) {
                return Err(ForemanError::UnexpectedArgument {
                    endpoint: self.name.clone(),
                    name,
                });
            }
            if bound.contains_key(&name) {
                return Err(ForemanError::DuplicateArgument {
                    endpoint: self.name.clone(),
                    name,
                });
            }
            bound.insert(name, value);
        }

        bound.retain(|_, value| !is_empty(value));
        Ok(bound)
    }

    pub fn fill_url(&self, values: &BTreeMap<String, Value>) -> Result<String, ForemanError> {
        let url = &self.api.api_url;
        let mut filled = Vec::new();

        for segment in url.split('/') {
            let Some(name) = segment.strip_prefix(':').filter(|name| !name.is_empty()) else {
                filled.push(segment.to_string());
                continue;
            };

            let value = values
                .get(name)
                .filter(|value| !is_empty(value))
                .ok_or_else(|| ForemanError::MissingUrlParameter {
                    url: url.clone(),
                    name: name.to_string(),
                })?;

            let rendered = value_to_string(value);
            // url joins drop dot segments, even percent-encoded ones
            if rendered == "." || rendered == ".." {
                return Err(ForemanError::InvalidUrlParameter {
                    url: url.clone(),
                    name: name.to_string(),
                    value: rendered,
                });
            }
            filled.push(utf8_percent_encode(&rendered, PATH_PARAM_ENCODE_SET).to_string());
        }

        Ok(filled.join("/"))
    }

    pub fn prepare(&self, args: CallArgs) -> Result<(String, Params), ForemanError> {
        let values = self.bind(args)?;
        let url = self.fill_url(&values)?;

        if let Some(missing) = self
            .signature
            .required
            .iter()
            .find(|param| !values.contains_key(&param.name))
        {
            return Err(ForemanError::MissingArgument {
                endpoint: self.name.clone(),
                name: missing.name.clone(),
            });
        }

        Ok((url, values.into_iter().collect()))
    }

    /// Calls the endpoint and returns the transport's result unchanged.
    pub async fn call(
        &self,
        transport: &dyn Transport,
        args: CallArgs,
    ) -> Result<Value, ForemanError> {
        let (url, params) = self.prepare(args)?;
        debug!(
            endpoint = %self.name,
            resource = %self.resource,
            method = %self.http_method,
            url = %url,
            "calling endpoint"
        );
        transport.dispatch(self.http_method, &url, &params).await
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(string) => string.is_empty(),
        Value::Array(array) => array.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(string) => string.clone(),
        other => other.to_string(),
    }
}
