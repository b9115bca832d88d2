use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForemanError {
    #[error("missing required url parameter `{name}` for {url}")]
    MissingUrlParameter { url: String, name: String },

    #[error("url parameter `{name}` for {url} cannot be `{value}`")]
    InvalidUrlParameter {
        url: String,
        name: String,
        value: String,
    },

    #[error("missing required argument `{name}` for {endpoint}")]
    MissingArgument { endpoint: String, name: String },

    #[error("unexpected argument `{name}` for {endpoint}")]
    UnexpectedArgument { endpoint: String, name: String },

    #[error("argument `{name}` given twice for {endpoint}")]
    DuplicateArgument { endpoint: String, name: String },

    #[error("{endpoint} takes {expected} positional arguments but {given} were given")]
    TooManyArguments {
        endpoint: String,
        expected: usize,
        given: usize,
    },

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("unknown method `{method}` on resource `{resource}`")]
    UnknownMethod { resource: String, method: String },

    #[error("unknown global method: {0}")]
    UnknownGlobalMethod(String),

    #[error("invalid API definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid plugin definition: {0}")]
    InvalidPlugin(String),

    #[error("unable to resolve API definitions: {0}")]
    VersionResolution(String),

    #[error("unable to detect Foreman version: {0}")]
    VersionDetection(String),

    #[error("not found: {url}")]
    NotFound { url: String, body: String },

    #[error("unacceptable request to {url}: {body}")]
    Unacceptable { url: String, body: String },

    #[error("request to {url} failed with status {status}: {body}")]
    Transport {
        status: u16,
        url: String,
        body: String,
    },

    #[error("invalid base URL `{base_url}`: {source}")]
    InvalidBaseUrl {
        base_url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ForemanError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ForemanError::NotFound { .. } => Some(404),
            ForemanError::Unacceptable { .. } => Some(406),
            ForemanError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn response_body(&self) -> Option<&str> {
        match self {
            ForemanError::NotFound { body, .. }
            | ForemanError::Unacceptable { body, .. }
            | ForemanError::Transport { body, .. } => Some(body),
            _ => None,
        }
    }
}
