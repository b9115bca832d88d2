use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::definition::{ApiDefinition, MethodDefinition, ParamDefinition};
use crate::endpoint::Endpoint;
use crate::error::ForemanError;
use crate::resource::{ConflictKind, Resource};

pub const PLUGINS_RESOURCE: &str = "plugins";

const SUPPORTED_VERBS: [&str; 4] = ["GET", "PUT", "POST", "DELETE"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluginParam {
    pub ptype: String,
    #[serde(default)]
    pub required: bool,
}

impl PluginParam {
    pub fn new(ptype: impl Into<String>, required: bool) -> Self {
        Self {
            ptype: ptype.into(),
            required,
        }
    }
}

type PluginEndpoints = BTreeMap<String, BTreeMap<String, PluginParam>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PluginDefs {
    verbs: BTreeMap<String, PluginEndpoints>,
}

impl PluginDefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint<I, N>(mut self, verb: &str, name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (N, PluginParam)>,
        N: Into<String>,
    {
        let params = params
            .into_iter()
            .map(|(name, param)| (name.into(), param))
            .collect();
        self.verbs
            .entry(verb.to_string())
            .or_default()
            .insert(name.into(), params);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, ForemanError> {
        serde_json::from_str(raw).map_err(|source| ForemanError::InvalidPlugin(source.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ForemanError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn to_methods(&self) -> Vec<MethodDefinition> {
        self.verbs
            .iter()
            .flat_map(|(verb, endpoints)| convert_plugin_def(verb, endpoints))
            .collect()
    }
}

pub fn convert_plugin_def(verb: &str, endpoints: &PluginEndpoints) -> Vec<MethodDefinition> {
    if !SUPPORTED_VERBS.contains(&verb) {
        error!(verb = %verb, "plugin load failure, unsupported HTTP method");
        return Vec::new();
    }

    endpoints
        .iter()
        .map(|(name, params)| MethodDefinition {
            name: name.clone(),
            apis: vec![ApiDefinition {
                api_url: format!("/api/{name}"),
                http_method: verb.to_string(),
                short_description: "no-doc".to_string(),
            }],
            params: params
                .iter()
                .map(|(param_name, param)| ParamDefinition {
                    name: param_name.clone(),
                    required: param.required,
                    description: String::new(),
                    validator: format!("Must be {}", param.ptype),
                    params: Vec::new(),
                })
                .collect(),
        })
        .collect()
}

/// Builds the `plugins` resource from every plugin table.
pub fn plugin_resource(plugins: &[PluginDefs]) -> Resource {
    let mut resource = Resource::new(PLUGINS_RESOURCE, "Binds plugin endpoints");

    for method in plugins.iter().flat_map(PluginDefs::to_methods) {
        let method = Arc::new(method);
        for api in &method.apis {
            match Endpoint::synthesize(PLUGINS_RESOURCE, &method, api) {
                Ok(endpoint) => {
                    debug!(method = %method.name, "registering plugin method");
                    let endpoint = endpoint.rebind(PLUGINS_RESOURCE, &method.name);
                    resource.bind(endpoint, ConflictKind::Own);
                }
                Err(error) => warn!(method = %method.name, %error, "skipping plugin method"),
            }
        }
    }

    resource
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tracing_test::traced_test;

    use super::{PluginDefs, PluginParam, plugin_resource};
    use crate::resource::ConflictKind;
    use crate::transport::HttpMethod;

    const RESERVE: &str = r#"{
        "GET": {
            "hosts_reserve": {
                "query": { "ptype": "String", "required": false },
                "reason": { "ptype": "String", "required": true },
                "amount": { "ptype": "Integer", "required": false }
            },
            "show_reserved": {
                "query": { "ptype": "String", "required": false }
            }
        }
    }"#;

    #[test]
    fn plugin_endpoints_bind_under_their_plain_name() {
        let plugins = PluginDefs::from_json(RESERVE).unwrap();
        let resource = plugin_resource(&[plugins]);

        let names: Vec<_> = resource.own_methods().collect();
        assert_eq!(names, vec!["hosts_reserve", "show_reserved"]);

        let reserve = resource.get("hosts_reserve").unwrap();
        assert_eq!(reserve.url(), "/api/hosts_reserve");
        assert_eq!(reserve.resource(), "plugins");
        assert_eq!(reserve.http_method(), HttpMethod::Get);
        assert_eq!(reserve.signature().required[0].name, "reason");
        assert_eq!(reserve.signature().required[0].validator, "Must be String");
        assert_eq!(reserve.signature().optional.len(), 2);
    }

    #[test]
    #[traced_test]
    fn unsupported_verbs_are_rejected() {
        let plugins = PluginDefs::new()
            .endpoint("PATCH", "hosts_touch", Vec::<(String, PluginParam)>::new())
            .endpoint("POST", "hosts_release", [("amount", PluginParam::new("Integer", false))]);

        let resource = plugin_resource(&[plugins]);
        let names: Vec<_> = resource.own_methods().collect();
        assert_eq!(names, vec!["hosts_release"]);
        assert!(logs_contain("unsupported HTTP method"));
    }

    #[test]
    fn same_endpoint_from_two_plugins_is_a_conflict() {
        let first = PluginDefs::new().endpoint("GET", "status", Vec::<(String, PluginParam)>::new());
        let second = PluginDefs::new().endpoint("POST", "status", Vec::<(String, PluginParam)>::new());

        let resource = plugin_resource(&[first, second]);
        assert_eq!(resource.len(), 1);
        assert_eq!(resource.get("status").unwrap().http_method(), HttpMethod::Get);
        assert_eq!(resource.conflicts()[0].kind, ConflictKind::Own);
    }

    #[test]
    fn from_path_reads_json_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RESERVE.as_bytes()).unwrap();

        let plugins = PluginDefs::from_path(file.path()).unwrap();
        assert_eq!(plugins.to_methods().len(), 2);

        let error = PluginDefs::from_json("[]").unwrap_err();
        assert!(error.to_string().starts_with("invalid plugin definition"));
    }
}
