use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ForemanError;
use crate::http::HttpTransport;
use crate::version::Version;

const DEFAULT_CACHE_DIR: &str = ".foreman-client";
const DEFINITIONS_DIR: &str = "definitions";

/// Whether a cached description of a different patch level may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMatch {
    /// Only a description of exactly the requested version.
    #[default]
    ExactOnly,
    /// The newest cached description sharing the requested major.minor.
    AllowNearestMinor,
}

/// Produces the raw description document for a server/API version pair.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn load(
        &self,
        server_version: &str,
        api_version: u32,
        policy: CacheMatch,
    ) -> Result<Value, ForemanError>;
}

#[derive(Debug, Clone)]
pub struct StaticDefinitions(pub Value);

#[async_trait]
impl DefinitionSource for StaticDefinitions {
    async fn load(
        &self,
        _server_version: &str,
        _api_version: u32,
        _policy: CacheMatch,
    ) -> Result<Value, ForemanError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionCache {
    dirs: Vec<PathBuf>,
}

impl DefinitionCache {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// The configured directory, if any, followed by `~/.foreman-client`.
    pub fn with_default_dirs(cache_dir: Option<PathBuf>) -> Self {
        let mut dirs: Vec<PathBuf> = cache_dir.into_iter().collect();
        if let Some(default) = Self::default_dir()
            && !dirs.contains(&default)
        {
            dirs.push(default);
        }
        Self { dirs }
    }

    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_CACHE_DIR))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn file_name(server_version: &str, api_version: u32) -> String {
        format!("{server_version}-v{api_version}.json")
    }

    pub fn lookup(
        &self,
        server_version: &str,
        api_version: u32,
        policy: CacheMatch,
    ) -> Result<Value, ForemanError> {
        let requested = Version::parse(server_version);
        let suffix = format!("-v{api_version}.json");
        let mut nearest: Option<PathBuf> = None;
        let mut available = Vec::new();

        for dir in &self.dirs {
            let mut files = cached_files(&dir.join(DEFINITIONS_DIR), &suffix);
            files.sort_by(|(a_path, a), (b_path, b)| a.cmp(b).then_with(|| a_path.cmp(b_path)));

            for (path, version) in files {
                available.push(path.display().to_string());
                if version == requested {
                    debug!(path = %path.display(), "found cached definitions");
                    return read_json(&path);
                }
                if version.same_minor(&requested) {
                    nearest = Some(path);
                }
                if version.major() > requested.major() {
                    break;
                }
            }
        }

        match (nearest, policy) {
            (Some(path), CacheMatch::AllowNearestMinor) => {
                warn!(
                    path = %path.display(),
                    version = %server_version,
                    "no exact cached definitions, using the nearest version"
                );
                read_json(&path)
            }
            (Some(path), CacheMatch::ExactOnly) => Err(ForemanError::VersionResolution(format!(
                "no cached definitions for Foreman {server_version}, but found the similar {}; \
                 allow the nearest minor version to use it",
                path.display()
            ))),
            (None, _) => Err(ForemanError::VersionResolution(format!(
                "no suitable cache found for version={server_version} api_version={api_version} \
                 policy={policy:?}; available: [{}]",
                available.join(", ")
            ))),
        }
    }

    pub fn store(
        &self,
        server_version: &str,
        api_version: u32,
        document: &Value,
    ) -> Result<PathBuf, ForemanError> {
        let dir = self.dirs.first().ok_or_else(|| {
            ForemanError::VersionResolution("no cache directory configured".to_string())
        })?;
        let defs_dir = dir.join(DEFINITIONS_DIR);
        fs::create_dir_all(&defs_dir)?;

        let path = defs_dir.join(Self::file_name(server_version, api_version));
        fs::write(&path, serde_json::to_vec_pretty(document)?)?;
        debug!(path = %path.display(), "wrote cache file");
        Ok(path)
    }
}

fn cached_files(dir: &Path, suffix: &str) -> Vec<(PathBuf, Version)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let version = Version::parse(name.strip_suffix(suffix)?);
            Some((path, version))
        })
        .collect()
}

fn read_json(path: &Path) -> Result<Value, ForemanError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[derive(Debug, Clone)]
pub struct DefinitionLoader {
    cache: DefinitionCache,
    use_cache: bool,
    remote: Option<HttpTransport>,
}

impl DefinitionLoader {
    pub fn new(cache: DefinitionCache, remote: Option<HttpTransport>) -> Self {
        Self {
            cache,
            use_cache: true,
            remote,
        }
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    async fn fetch_remote(
        &self,
        remote: &HttpTransport,
        server_version: &str,
        api_version: u32,
    ) -> Result<Value, ForemanError> {
        let path = format!("apidoc/v{api_version}.json");
        let (status, body) = remote.fetch(&path).await.map_err(|error| {
            ForemanError::VersionResolution(format!("unable to fetch {path}: {error}"))
        })?;

        if !(200..300).contains(&status) {
            if status == 404 {
                warn!(
                    path = %path,
                    "unable to get API definitions from the server; make sure apipie's \
                     config.use_cache is disabled, or allow the nearest cached version"
                );
            }
            return Err(ForemanError::VersionResolution(format!(
                "error trying to get API definitions from {path}: status {status}"
            )));
        }

        let document: Value = serde_json::from_str(&body).map_err(|error| {
            ForemanError::VersionResolution(format!("invalid API definitions at {path}: {error}"))
        })?;
        if let Err(error) = self.cache.store(server_version, api_version, &document) {
            debug!(%error, "unable to write cache file");
        }
        Ok(document)
    }
}

#[async_trait]
impl DefinitionSource for DefinitionLoader {
    async fn load(
        &self,
        server_version: &str,
        api_version: u32,
        policy: CacheMatch,
    ) -> Result<Value, ForemanError> {
        if self.use_cache {
            debug!("trying local cached definitions first");
            match self.cache.lookup(server_version, api_version, policy) {
                Ok(document) => return Ok(document),
                Err(error) => debug!(%error, "no usable cached definitions"),
            }
        }

        let Some(remote) = &self.remote else {
            return Err(ForemanError::VersionResolution(format!(
                "no cached definitions for Foreman {server_version} and no server to ask"
            )));
        };

        debug!("checking remote server for definitions");
        self.fetch_remote(remote, server_version, api_version).await
    }
}
