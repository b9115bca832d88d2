use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::definition::ApiDefinitionSet;
use crate::endpoint::Endpoint;
use crate::error::ForemanError;
use crate::http::{Auth, HttpTransport, Timeouts};
use crate::loader::{CacheMatch, DefinitionCache, DefinitionLoader, DefinitionSource};
use crate::plugins::{PLUGINS_RESOURCE, PluginDefs, plugin_resource};
use crate::request::CallArgs;
use crate::resource::{ConflictKind, MethodConflict, Resource, assemble};
use crate::transport::{HttpMethod, Params, Transport};

const LEGACY_ALIASED_METHODS: [&str; 5] = ["index", "show", "update", "destroy", "create"];

pub struct Foreman {
    transport: Arc<dyn Transport>,
    resources: BTreeMap<String, Resource>,
    globals: BTreeMap<String, (String, String)>,
    version: Option<String>,
    api_version: u32,
}

impl std::fmt::Debug for Foreman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Foreman")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("version", &self.version)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Foreman {
    pub fn builder(url: impl Into<String>) -> ForemanBuilder {
        ForemanBuilder {
            url: url.into(),
            auth: None,
            version: None,
            api_version: None,
            use_cache: true,
            cache_match: CacheMatch::default(),
            cache_dir: None,
            default_cache_dir: true,
            timeouts: Timeouts::default(),
            verify: false,
            plugins: Vec::new(),
            transport: None,
            definitions: None,
        }
    }

    pub fn from_definitions(
        document: &Value,
        transport: Arc<dyn Transport>,
        plugins: &[PluginDefs],
    ) -> Result<Self, ForemanError> {
        let definitions = ApiDefinitionSet::from_value(document)?;
        Ok(Self::assemble(&definitions, transport, plugins, None, 1))
    }

    fn assemble(
        definitions: &ApiDefinitionSet,
        transport: Arc<dyn Transport>,
        plugins: &[PluginDefs],
        version: Option<String>,
        api_version: u32,
    ) -> Self {
        let mut resources = assemble(definitions);

        let plugins = plugin_resource(plugins);
        let plugin_names: Vec<String> = plugins.own_methods().map(str::to_string).collect();
        if !plugins.is_empty() {
            match resources.get_mut(PLUGINS_RESOURCE) {
                Some(existing) => {
                    for endpoint in plugins.endpoints() {
                        existing.bind(endpoint.clone(), ConflictKind::Own);
                    }
                }
                None => {
                    resources.insert(PLUGINS_RESOURCE.to_string(), plugins);
                }
            }
        }

        let mut globals = BTreeMap::new();
        let mut register = |global: String, resource: &str, name: &str| {
            if globals.contains_key(&global) {
                debug!(global = %global, resource = %resource, "global method already bound");
                return;
            }
            globals.insert(global, (resource.to_string(), name.to_string()));
        };

        for resource in resources.values() {
            for endpoint in resource.endpoints() {
                register(endpoint.global_name(), resource.name(), endpoint.name());
            }
        }
        // older clients exposed `index_computeresources` style names
        for resource in resources.values() {
            let alias_suffix = resource.name().replace('_', "");
            for method in LEGACY_ALIASED_METHODS {
                if resource.get(method).is_some() {
                    register(format!("{method}_{alias_suffix}"), resource.name(), method);
                }
            }
        }
        for name in plugin_names {
            debug!(method = %name, "registering plugin method");
            register(name.clone(), PLUGINS_RESOURCE, &name);
        }

        info!(
            resources = resources.len(),
            globals = globals.len(),
            "generated API bindings"
        );

        Self {
            transport,
            resources,
            globals,
            version,
            api_version,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn resource(&self, name: &str) -> Option<ResourceHandle<'_>> {
        self.resources.get(name).map(|resource| ResourceHandle {
            resource,
            transport: self.transport.as_ref(),
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceHandle<'_>> {
        self.resources.values().map(|resource| ResourceHandle {
            resource,
            transport: self.transport.as_ref(),
        })
    }

    pub fn plugins(&self) -> Option<ResourceHandle<'_>> {
        self.resource(PLUGINS_RESOURCE)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &MethodConflict> {
        self.resources
            .values()
            .flat_map(|resource| resource.conflicts().iter())
    }

    pub async fn call(
        &self,
        resource: &str,
        method: &str,
        args: CallArgs,
    ) -> Result<Value, ForemanError> {
        let handle = self
            .resource(resource)
            .ok_or_else(|| ForemanError::UnknownResource(resource.to_string()))?;
        handle.call(method, args).await
    }

    /// Names callable through [`Foreman::call_global`]: `{resource}_{method}`
    /// for every bound endpoint, `index_hosts` style aliases of the common
    /// methods, and the plain plugin endpoint names.
    pub fn global_methods(&self) -> impl Iterator<Item = &str> {
        self.globals.keys().map(String::as_str)
    }

    pub async fn call_global(&self, name: &str, args: CallArgs) -> Result<Value, ForemanError> {
        let (resource, method) = self
            .globals
            .get(name)
            .ok_or_else(|| ForemanError::UnknownGlobalMethod(name.to_string()))?;
        self.call(resource, method, args).await
    }

    pub async fn do_get(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.transport.dispatch(HttpMethod::Get, url, params).await
    }

    pub async fn do_post(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.transport.dispatch(HttpMethod::Post, url, params).await
    }

    pub async fn do_put(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.transport.dispatch(HttpMethod::Put, url, params).await
    }

    pub async fn do_delete(&self, url: &str, params: &Params) -> Result<Value, ForemanError> {
        self.transport.dispatch(HttpMethod::Delete, url, params).await
    }
}

#[derive(Clone, Copy)]
pub struct ResourceHandle<'a> {
    resource: &'a Resource,
    transport: &'a dyn Transport,
}

impl std::fmt::Debug for ResourceHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResourceHandle").field(self.resource).finish()
    }
}

impl<'a> ResourceHandle<'a> {
    pub fn endpoint(&self, method: &str) -> Result<&'a Endpoint, ForemanError> {
        self.resource
            .get(method)
            .ok_or_else(|| ForemanError::UnknownMethod {
                resource: self.resource.name().to_string(),
                method: method.to_string(),
            })
    }

    pub async fn call(&self, method: &str, args: CallArgs) -> Result<Value, ForemanError> {
        self.endpoint(method)?.call(self.transport, args).await
    }
}

impl Deref for ResourceHandle<'_> {
    type Target = Resource;

    fn deref(&self) -> &Resource {
        self.resource
    }
}

pub struct ForemanBuilder {
    url: String,
    auth: Option<Auth>,
    version: Option<String>,
    api_version: Option<u32>,
    use_cache: bool,
    cache_match: CacheMatch,
    cache_dir: Option<PathBuf>,
    default_cache_dir: bool,
    timeouts: Timeouts,
    verify: bool,
    plugins: Vec<PluginDefs>,
    transport: Option<Arc<dyn Transport>>,
    definitions: Option<Arc<dyn DefinitionSource>>,
}

impl ForemanBuilder {
    pub fn auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Auth::Basic {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::Bearer(token.into()));
        self
    }

    /// Server version; detected from the server when not set.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn api_version(mut self, api_version: u32) -> Self {
        self.api_version = Some(api_version);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn cache_match(mut self, cache_match: CacheMatch) -> Self {
        self.cache_match = cache_match;
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    /// Whether `~/.foreman-client` is searched after `cache_dir`.
    pub fn default_cache_dir(mut self, enabled: bool) -> Self {
        self.default_cache_dir = enabled;
        self
    }

    /// Timeout in seconds for verbs without their own; zero disables it.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeouts.set_default(secs);
        self
    }

    pub fn timeout_post(mut self, secs: u64) -> Self {
        self.timeouts.set(HttpMethod::Post, secs);
        self
    }

    pub fn timeout_put(mut self, secs: u64) -> Self {
        self.timeouts.set(HttpMethod::Put, secs);
        self
    }

    pub fn timeout_delete(mut self, secs: u64) -> Self {
        self.timeouts.set(HttpMethod::Delete, secs);
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn plugin(mut self, plugin: PluginDefs) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn definitions(mut self, source: Arc<dyn DefinitionSource>) -> Self {
        self.definitions = Some(source);
        self
    }

    pub async fn build(self) -> Result<Foreman, ForemanError> {
        let api_version = self.api_version.unwrap_or_else(|| {
            warn!("API v1 will not stay the default, ask for it explicitly or move to v2");
            1
        });

        let mut http = HttpTransport::builder(&self.url)?
            .api_version(api_version)
            .timeouts(self.timeouts)
            .verify(self.verify);
        if let Some(auth) = self.auth {
            http = http.auth(auth);
        }
        let http = http.build()?;

        let version = match self.version {
            Some(version) => version,
            None => http.detect_version().await?,
        };

        let source = match self.definitions {
            Some(source) => source,
            None => {
                let cache = if self.default_cache_dir {
                    DefinitionCache::with_default_dirs(self.cache_dir)
                } else {
                    DefinitionCache::new(self.cache_dir.into_iter().collect())
                };
                let loader =
                    DefinitionLoader::new(cache, Some(http.clone())).use_cache(self.use_cache);
                Arc::new(loader)
            }
        };

        let document = source.load(&version, api_version, self.cache_match).await?;
        let definitions = ApiDefinitionSet::from_value(&document)?;
        let transport = self.transport.unwrap_or_else(|| Arc::new(http));

        Ok(Foreman::assemble(
            &definitions,
            transport,
            &self.plugins,
            Some(version),
            api_version,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::Foreman;
    use crate::error::ForemanError;
    use crate::loader::StaticDefinitions;
    use crate::plugins::{PluginDefs, PluginParam};
    use crate::request::CallArgs;
    use crate::transport::mock::MockTransport;
    use crate::transport::{HttpMethod, Params};

    fn document() -> Value {
        json!({ "docs": { "resources": {
            "hosts": {
                "full_description": "Hosts",
                "methods": [
                    { "name": "index", "params": [], "apis": [
                        { "api_url": "/api/hosts", "http_method": "GET", "short_description": "list" }
                    ]},
                    { "name": "destroy", "params": [], "apis": [
                        { "api_url": "/api/hosts/:id", "http_method": "DELETE", "short_description": "" }
                    ]}
                ]
            },
            "interfaces": {
                "methods": [
                    { "name": "show", "params": [], "apis": [
                        { "api_url": "/api/hosts/:host_id/interfaces/:id", "http_method": "GET", "short_description": "" }
                    ]}
                ]
            },
            "empty": { "methods": [] }
        }}})
    }

    fn client(transport: Arc<MockTransport>) -> Foreman {
        let plugins = PluginDefs::new().endpoint(
            "GET",
            "hosts_reserve",
            [("reason", PluginParam::new("String", true))],
        );
        Foreman::from_definitions(&document(), transport, &[plugins]).unwrap()
    }

    #[tokio::test]
    async fn resource_call_issues_get_and_returns_result_unchanged() {
        let transport = Arc::new(MockTransport::default());
        transport.respond(HttpMethod::Get, "/api/hosts", json!([{ "id": 1 }]));
        let foreman = client(transport.clone());

        let hosts = foreman.resource("hosts").unwrap();
        assert_eq!(hosts.description(), "Hosts");

        let result = hosts.call("index", CallArgs::new()).await.unwrap();
        assert_eq!(result, json!([{ "id": 1 }]));

        let calls = transport.calls();
        assert_eq!(calls[0].method, HttpMethod::Get);
        assert_eq!(calls[0].url, "/api/hosts");
        assert!(calls[0].params.is_empty());
    }

    #[tokio::test]
    async fn foreign_and_global_methods_are_reachable() {
        let transport = Arc::new(MockTransport::default());
        let foreman = client(transport.clone());

        assert!(foreman.resource("interfaces").is_none());
        assert!(foreman.resource("empty").is_none());

        let globals: Vec<_> = foreman.global_methods().collect();
        assert_eq!(
            globals,
            vec![
                "destroy_hosts",
                "hosts_destroy",
                "hosts_index",
                "hosts_interfaces_interfaces_show",
                "hosts_reserve",
                "index_hosts",
                "plugins_hosts_reserve"
            ]
        );

        foreman
            .call_global(
                "hosts_interfaces_interfaces_show",
                CallArgs::new().positional(4).positional(2),
            )
            .await
            .unwrap();
        foreman
            .call_global("hosts_reserve", CallArgs::new().arg("reason", "tests"))
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].url, "/api/hosts/4/interfaces/2");
        assert_eq!(calls[1].url, "/api/hosts_reserve");
        assert_eq!(calls[1].params.get("reason"), Some(&json!("tests")));
    }

    #[tokio::test]
    async fn common_methods_keep_their_legacy_global_names() {
        let transport = Arc::new(MockTransport::default());
        let document = json!({ "resources": {
            "compute_resources": { "methods": [
                { "name": "index", "params": [], "apis": [
                    { "api_url": "/api/compute_resources", "http_method": "GET", "short_description": "" }
                ]},
                { "name": "available_images", "params": [], "apis": [
                    { "api_url": "/api/compute_resources/:id/available_images", "http_method": "GET", "short_description": "" }
                ]}
            ]}
        }});
        let foreman = Foreman::from_definitions(&document, transport.clone(), &[]).unwrap();

        let globals: Vec<_> = foreman.global_methods().collect();
        assert!(globals.contains(&"index_computeresources"));
        assert!(!globals.iter().any(|name| name.starts_with("available_images_")));

        foreman
            .call_global("index_computeresources", CallArgs::new())
            .await
            .unwrap();
        assert_eq!(transport.calls()[0].url, "/api/compute_resources");
    }

    #[tokio::test]
    async fn unknown_names_are_errors() {
        let foreman = client(Arc::new(MockTransport::default()));

        let error = foreman.call("nope", "index", CallArgs::new()).await.unwrap_err();
        assert!(matches!(error, ForemanError::UnknownResource(_)));

        let error = foreman.call("hosts", "nope", CallArgs::new()).await.unwrap_err();
        assert!(matches!(error, ForemanError::UnknownMethod { .. }));

        let error = foreman.call_global("nope", CallArgs::new()).await.unwrap_err();
        assert!(matches!(error, ForemanError::UnknownGlobalMethod(_)));
    }

    #[tokio::test]
    async fn missing_id_fails_before_any_request() {
        let transport = Arc::new(MockTransport::default());
        let foreman = client(transport.clone());

        let error = foreman
            .call("hosts", "destroy", CallArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(error, ForemanError::MissingUrlParameter { ref name, .. } if name == "id"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn verb_primitives_go_straight_to_the_transport() {
        let transport = Arc::new(MockTransport::default());
        let foreman = client(transport.clone());

        let mut params = Params::new();
        params.insert("name".to_string(), json!("web"));
        foreman.do_put("/api/hosts/1", &params).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].method, HttpMethod::Put);
        assert_eq!(calls[0].params, params);
    }

    #[tokio::test]
    async fn builder_uses_given_definitions_and_transport() {
        let transport = Arc::new(MockTransport::default());
        let foreman = Foreman::builder("https://foreman.example.com")
            .version("1.15.6")
            .api_version(2)
            .definitions(Arc::new(StaticDefinitions(document())))
            .transport(transport)
            .build()
            .await
            .unwrap();

        assert_eq!(foreman.version(), Some("1.15.6"));
        assert_eq!(foreman.api_version(), 2);
        assert!(foreman.plugins().is_none());
        assert_eq!(foreman.conflicts().count(), 0);
        assert!(foreman.resource("hosts").unwrap().get("destroy").is_some());
    }
}
