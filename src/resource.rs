use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::definition::{ApiDefinitionSet, ResourceDefinition};
use crate::endpoint::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Two variants declared by the resource itself resolved to one name.
    Own,
    /// A variant declared by another resource collided with a bound name.
    Foreign,
}

#[derive(Debug, Clone)]
pub struct MethodConflict {
    pub kind: ConflictKind,
    pub resource: String,
    pub existing_url: String,
    pub rejected: Endpoint,
}

impl MethodConflict {
    pub fn name(&self) -> &str {
        self.rejected.name()
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    description: String,
    endpoints: BTreeMap<String, Endpoint>,
    conflicts: Vec<MethodConflict>,
}

impl Resource {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            endpoints: BTreeMap::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    pub fn own_methods(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn conflicts(&self) -> &[MethodConflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Binds the endpoint unless its name is taken; the first binding wins.
    pub(crate) fn bind(&mut self, endpoint: Endpoint, kind: ConflictKind) -> bool {
        let Some(existing) = self.endpoints.get(endpoint.name()) else {
            self.endpoints.insert(endpoint.name().to_string(), endpoint);
            return true;
        };

        let existing_url = existing.url().to_string();
        if existing_url == endpoint.url() {
            debug!(
                resource = %self.name,
                method = %endpoint.name(),
                url = %existing_url,
                "skipping repeated method definition"
            );
        } else {
            warn!(
                resource = %self.name,
                method = %endpoint.name(),
                declaring_resource = %endpoint.declaring_resource(),
                new_url = %endpoint.url(),
                old_url = %existing_url,
                "conflict trying to redefine method"
            );
        }

        self.conflicts.push(MethodConflict {
            kind,
            resource: self.name.clone(),
            existing_url,
            rejected: endpoint,
        });
        false
    }
}

type PendingForeign = BTreeMap<String, Vec<Endpoint>>;

/// Builds every resource of the definition set.
///
/// Own variants are bound while each resource is parsed; foreign variants are
/// queued and merged once all resources exist, so a resource's own method
/// always wins over a foreign one of the same name. Resources left without
/// endpoints are dropped.
pub fn assemble(definitions: &ApiDefinitionSet) -> BTreeMap<String, Resource> {
    let mut resources = BTreeMap::new();
    let mut pending = PendingForeign::new();

    for (name, definition) in definitions.iter() {
        let resource = parse_resource(name, definition, &mut pending);
        resources.insert(name.to_string(), resource);
    }

    for (owner, endpoints) in pending {
        let resource = resources
            .entry(owner.clone())
            .or_insert_with(|| Resource::new(owner, ""));
        for endpoint in endpoints {
            resource.bind(endpoint, ConflictKind::Foreign);
        }
    }

    resources.retain(|name, resource| {
        if resource.is_empty() {
            debug!(resource = %name, "skipping empty resource");
        }
        !resource.is_empty()
    });

    resources
}

fn parse_resource(
    name: &str,
    definition: &ResourceDefinition,
    pending: &mut PendingForeign,
) -> Resource {
    let mut resource = Resource::new(name, definition.documentation());

    for method in &definition.methods {
        let method = Arc::new(method.clone());
        for api in &method.apis {
            let endpoint = match Endpoint::synthesize(name, &method, api) {
                Ok(endpoint) => endpoint,
                Err(error) => {
                    warn!(resource = %name, method = %method.name, %error, "skipping API variant");
                    continue;
                }
            };

            if endpoint.is_foreign() {
                pending
                    .entry(endpoint.resource().to_string())
                    .or_default()
                    .push(endpoint);
            } else {
                resource.bind(endpoint, ConflictKind::Own);
            }
        }
    }

    resource
}
