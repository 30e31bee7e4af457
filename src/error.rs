use thiserror::Error;

/// Configuration, lookup and repository problems.
///
/// Recoverable only by the operator fixing the config file or the
/// repository state, so every variant names what to look at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Section [{0}] missing")]
    MissingSection(String),

    #[error("No option '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },

    #[error("Option '{key}' in section [{section}] must not be empty")]
    EmptyValue { section: String, key: String },

    #[error("Not a boolean: '{value}' for option '{key}' in section [{section}]")]
    InvalidBoolean {
        section: String,
        key: String,
        value: String,
    },

    #[error("Not a number: '{value}' for option '{key}' in section [{section}]")]
    InvalidNumber {
        section: String,
        key: String,
        value: String,
    },

    #[error("Cannot parse config file: {0}")]
    Parse(String),

    #[error("Cannot open repository: {0}")]
    Repository(String),

    #[error("Can't find file '{file}' in '{ref_name}'")]
    ScriptNotFound { file: String, ref_name: String },
}

/// Authentication failures and rejected remote operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Login unsuccessful for {user}:***@{host}, starttls={starttls}, authmech={}", .authmech.as_deref().unwrap_or("auto"))]
    LoginFailed {
        user: String,
        host: String,
        starttls: bool,
        authmech: Option<String>,
    },

    #[error("script invalid.")]
    ScriptInvalid,

    #[error("could not upload script.")]
    UploadFailed,

    #[error("could not set script active")]
    ActivateFailed,

    #[error("Cannot connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Server does not support {0}")]
    Unsupported(String),

    #[error("{command} rejected: {reason}")]
    Rejected { command: String, reason: String },

    #[error("Server closed the connection: {0}")]
    Bye(String),

    #[error("Malformed server response: {0}")]
    Malformed(String),

    #[error("Connection error: {0}")]
    Io(String),
}

/// Everything a hook handler can fail with.
///
/// `Config` and `Protocol` are the two expected kinds; the dispatcher turns
/// them into exit code 1. `Io` covers faults outside both kinds, such as an
/// unreadable config file, and is propagated unchanged.
#[derive(Error, Debug)]
pub enum HookError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in sieve-git-pushdeploy
pub type Result<T> = std::result::Result<T, HookError>;

impl ProtocolError {
    /// Wrap a transport failure
    pub fn io(err: impl std::fmt::Display) -> Self {
        ProtocolError::Io(err.to_string())
    }

    /// Create a malformed-response error with context
    pub fn malformed(msg: impl Into<String>) -> Self {
        ProtocolError::Malformed(msg.into())
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::io(err)
    }
}

impl HookError {
    /// Whether this error belongs to one of the two expected kinds
    pub fn is_expected(&self) -> bool {
        matches!(self, HookError::Config(_) | HookError::Protocol(_))
    }
}
