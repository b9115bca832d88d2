//! Client for the Foreman API whose endpoints are generated at runtime.
//!
//! The server describes its API as an apipie document: resources, their
//! methods, and for every method one or more URL templates with an HTTP verb.
//! [`Foreman`] loads that document once, builds an [`Endpoint`] for every API
//! variant and groups them into [`Resource`]s:
//!
//! ```rust,ignore
//! use foreman_client::{CallArgs, Foreman};
//!
//! let foreman = Foreman::builder("https://foreman.example.com")
//!     .auth("admin", "changeme")
//!     .api_version(2)
//!     .build()
//!     .await?;
//!
//! let hosts = foreman.resource("hosts").unwrap();
//! let page = hosts.call("index", CallArgs::new().arg("search", "os = CentOS")).await?;
//! let host = hosts.call("show", CallArgs::new().positional("web01.example.com")).await?;
//! ```

pub mod client;
pub mod definition;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod loader;
pub mod naming;
pub mod params;
pub mod plugins;
pub mod request;
pub mod resource;
pub mod transport;
pub mod version;

pub use client::{Foreman, ForemanBuilder, ResourceHandle};
pub use definition::{
    ApiDefinition, ApiDefinitionSet, MethodDefinition, ParamDefinition, ResourceDefinition,
};
pub use endpoint::Endpoint;
pub use error::ForemanError;
pub use http::{Auth, HttpTransport, HttpTransportBuilder, Timeouts};
pub use loader::{CacheMatch, DefinitionCache, DefinitionLoader, DefinitionSource, StaticDefinitions};
pub use plugins::{PluginDefs, PluginParam};
pub use request::CallArgs;
pub use resource::{ConflictKind, MethodConflict, Resource};
pub use transport::{HttpMethod, Params, Transport};
pub use version::Version;
