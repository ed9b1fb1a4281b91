use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidDuration(String),
    DirectoryDoesNotExist(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidDuration(e) => write!(f, "Invalid duration: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

/// Failures of the capture retention subsystem.
///
/// Per-file problems during a sweep are not represented here: they are logged
/// and counted in the sweep report. Only failures that abort a whole cycle are.
#[derive(Debug)]
pub enum RetentionError {
    DirectoryUnreadable(PathBuf, std::io::Error),
    IoError(std::io::Error),
}

impl fmt::Display for RetentionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionError::DirectoryUnreadable(path, e) => {
                write!(f, "Capture directory {} unreadable: {}", path.display(), e)
            }
            RetentionError::IoError(e) => write!(f, "Retention IO error: {}", e),
        }
    }
}

impl std::error::Error for RetentionError {}

impl From<std::io::Error> for RetentionError {
    fn from(err: std::io::Error) -> Self {
        RetentionError::IoError(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// The script threw, or could not be parsed. Carries the engine message verbatim.
    Runtime(String),
    /// The script did not finish within the configured wall-clock budget.
    Timeout(Duration),
    /// Too many callers are already running or waiting.
    Busy,
    Disabled,
    WorkerFailed(String),
}

impl ScriptError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScriptError::Timeout(_))
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Runtime(e) => write!(f, "Script error: {}", e),
            ScriptError::Timeout(d) => {
                write!(f, "Script execution timed out after {}ms", d.as_millis())
            }
            ScriptError::Busy => write!(f, "Script sandbox is busy"),
            ScriptError::Disabled => write!(f, "Scripting is disabled"),
            ScriptError::WorkerFailed(e) => write!(f, "Script worker failed: {}", e),
        }
    }
}

impl std::error::Error for ScriptError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    RetentionError(RetentionError),
    WebError(WebError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::RetentionError(e) => write!(f, "Retention error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<RetentionError> for ControllerError {
    fn from(err: RetentionError) -> Self {
        ControllerError::RetentionError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
