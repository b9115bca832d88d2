use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ForemanError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParamDefinition {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub validator: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: Vec<ParamDefinition>,
}

impl ParamDefinition {
    /// A required parameter with no documentation, used for URL markers the
    /// description forgot to declare.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiDefinition {
    pub api_url: String,
    pub http_method: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub short_description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MethodDefinition {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub apis: Vec<ApiDefinition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: Vec<ParamDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceDefinition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<MethodDefinition>,
}

impl ResourceDefinition {
    /// The resource documentation, falling back to the short description of
    /// the first method exposed through a single API.
    pub fn documentation(&self) -> &str {
        if !self.full_description.is_empty() {
            return &self.full_description;
        }

        self.methods
            .iter()
            .find(|method| method.apis.len() == 1)
            .map(|method| method.apis[0].short_description.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiDefinitionSet {
    resources: BTreeMap<String, ResourceDefinition>,
}

impl ApiDefinitionSet {
    pub fn new(resources: BTreeMap<String, ResourceDefinition>) -> Self {
        let mut set = Self::default();
        for (name, resource) in resources {
            set.insert(name, resource);
        }
        set
    }

    pub fn from_json(raw: &str) -> Result<Self, ForemanError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    pub fn from_value(document: &Value) -> Result<Self, ForemanError> {
        let resources = document
            .pointer("/docs/resources")
            .or_else(|| document.get("resources"))
            .ok_or_else(|| {
                ForemanError::InvalidDefinition("document has no `resources` section".to_string())
            })?;

        let Value::Object(map) = resources else {
            return Err(ForemanError::InvalidDefinition(
                "`resources` must be an object".to_string(),
            ));
        };

        let mut set = Self::default();
        for (name, raw_resource) in map {
            let resource = ResourceDefinition::deserialize(raw_resource).map_err(|source| {
                ForemanError::InvalidDefinition(format!("resource `{name}`: {source}"))
            })?;
            set.insert(name.clone(), resource);
        }
        Ok(set)
    }

    fn insert(&mut self, name: String, resource: ResourceDefinition) {
        let key = name.to_lowercase();
        match self.resources.get_mut(&key) {
            Some(existing) => {
                warn!(resource = %name, "resource defined twice, merging its methods");
                existing.methods.extend(resource.methods);
            }
            None => {
                self.resources.insert(key, resource);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceDefinition)> {
        self.resources
            .iter()
            .map(|(name, resource)| (name.as_str(), resource))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::{ApiDefinitionSet, ResourceDefinition};

    use serde_json::json;

    #[test]
    fn parses_wrapped_document_and_lowercases_names() {
        let document = json!({
            "docs": {
                "resources": {
                    "Hosts": {
                        "full_description": "Hosts",
                        "methods": [{
                            "name": "index",
                            "apis": [{ "api_url": "/api/hosts", "http_method": "GET", "short_description": null }],
                            "params": [{ "name": "search", "required": false, "description": null, "validator": "String" }]
                        }]
                    }
                }
            }
        });

        let set = ApiDefinitionSet::from_value(&document).unwrap();
        let hosts = set.get("hosts").unwrap();

        assert_eq!(hosts.methods[0].apis[0].short_description, "");
        assert_eq!(hosts.methods[0].params[0].description, "");
        assert_eq!(hosts.methods[0].params[0].validator, "String");
    }

    #[test]
    fn parses_bare_resources_document() {
        let document = json!({ "resources": { "domains": { "methods": [] } } });
        let set = ApiDefinitionSet::from_value(&document).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("domains").unwrap().full_description, "");
    }

    #[test]
    fn rejects_document_without_resources() {
        let error = ApiDefinitionSet::from_value(&json!({ "docs": {} })).unwrap_err();
        assert!(error.to_string().contains("no `resources` section"));
    }

    #[test]
    fn merges_resources_that_differ_only_in_case() {
        let document = json!({ "resources": {
            "Hosts": { "methods": [{ "name": "index", "apis": [] }] },
            "hosts": { "methods": [{ "name": "show", "apis": [] }] }
        }});
        let set = ApiDefinitionSet::from_value(&document).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("hosts").unwrap().methods.len(), 2);
    }

    #[test]
    fn documentation_falls_back_to_single_api_method() {
        let resource: ResourceDefinition = serde_json::from_value(json!({
            "full_description": "",
            "methods": [
                { "name": "index", "apis": [
                    { "api_url": "/api/hosts", "http_method": "GET", "short_description": "a" },
                    { "api_url": "/api/v2/hosts", "http_method": "GET", "short_description": "b" }
                ]},
                { "name": "show", "apis": [
                    { "api_url": "/api/hosts/:id", "http_method": "GET", "short_description": "Show a host" }
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(resource.documentation(), "Show a host");
    }
}
