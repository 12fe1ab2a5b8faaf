//! Configuration types for the bindings.
//!
//! Options can be built in code or loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::api::{self, DEFAULT_API_SYMBOL};
use crate::error::{SciterError, SciterResult};
use sciter_sys::ValueApi;

/// When the catch-all handler runs relative to named handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawMode {
    /// Never run the catch-all handler.
    #[default]
    Off,
    /// Run it before looking up named handlers.
    First,
    /// Run it only when no named handler matches.
    Fallback,
}

/// Dispatcher behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Serve script calls at all.
    /// Default: true
    pub enabled: bool,

    /// Only expose methods declared with [`script_method`](crate::script_method).
    /// Default: false
    pub require_marker: bool,

    /// Rebuild the handler table on every call instead of once.
    /// Default: false
    pub dynamic_handlers: bool,

    /// Catch-all handler placement.
    /// Default: off
    pub raw_mode: RawMode,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            require_marker: false,
            dynamic_handlers: false,
            raw_mode: RawMode::Off,
        }
    }
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn require_marker(mut self, required: bool) -> Self {
        self.require_marker = required;
        self
    }

    pub fn dynamic_handlers(mut self, dynamic: bool) -> Self {
        self.dynamic_handlers = dynamic;
        self
    }

    pub fn raw_mode(mut self, mode: RawMode) -> Self {
        self.raw_mode = mode;
        self
    }
}

/// Per-handler options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerOptions {
    /// Name exposed to scripts, if different from the method name.
    pub name: Option<String>,

    /// Convert arguments to host values; otherwise they arrive as
    /// [`HostValue::Native`](crate::HostValue::Native).
    /// Default: true
    pub convert: bool,

    /// Turn handler failures into error strings without consulting the
    /// error hook.
    /// Default: true
    pub safe: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            name: None,
            convert: true,
            safe: true,
        }
    }
}

impl HandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the handler under a different name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn convert(mut self, convert: bool) -> Self {
        self.convert = convert;
        self
    }

    pub fn safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }
}

/// Top-level binding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Engine library to load. When absent the in-process engine is used.
    pub library: Option<PathBuf>,

    /// Entry point exported by the library.
    /// Default: "SciterValueAPI"
    pub api_symbol: String,

    /// Dispatcher options.
    pub dispatch: DispatchOptions,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            library: None,
            api_symbol: DEFAULT_API_SYMBOL.to_string(),
            dispatch: DispatchOptions::default(),
        }
    }
}

impl BindingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a JSON string.
    pub fn from_json_str(json: &str) -> SciterResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> SciterResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading binding config");
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Set the engine library path.
    pub fn library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library = Some(path.into());
        self
    }

    /// Set the library entry point name.
    pub fn api_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.api_symbol = symbol.into();
        self
    }

    /// Set the dispatcher options.
    pub fn dispatch(mut self, options: DispatchOptions) -> Self {
        self.dispatch = options;
        self
    }

    fn validate(&self) -> SciterResult<()> {
        if self.api_symbol.trim().is_empty() {
            return Err(SciterError::Config("api_symbol must not be empty".into()));
        }
        Ok(())
    }

    /// Fix the process-wide value table according to this configuration.
    pub fn apply(&self) -> SciterResult<&'static ValueApi> {
        self.validate()?;
        match &self.library {
            Some(path) => api::load_library(path, &self.api_symbol),
            None => Ok(api::current()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BindingConfig::default();
        assert_eq!(config.api_symbol, "SciterValueAPI");
        assert!(config.library.is_none());
        assert!(config.dispatch.enabled);
        assert!(!config.dispatch.require_marker);
        assert_eq!(config.dispatch.raw_mode, RawMode::Off);

        let handler = HandlerOptions::default();
        assert!(handler.convert && handler.safe);
        assert!(handler.name.is_none());
    }

    #[test]
    fn test_builders() {
        let options = DispatchOptions::new()
            .require_marker(true)
            .raw_mode(RawMode::Fallback);
        assert!(options.require_marker);
        assert_eq!(options.raw_mode, RawMode::Fallback);

        let handler = HandlerOptions::new().named("sum").safe(false);
        assert_eq!(handler.name.as_deref(), Some("sum"));
        assert!(!handler.safe);
    }

    #[test]
    fn test_partial_json() {
        let config =
            BindingConfig::from_json_str(r#"{"dispatch": {"raw_mode": "first", "enabled": false}}"#)
                .unwrap();
        assert_eq!(config.dispatch.raw_mode, RawMode::First);
        assert!(!config.dispatch.enabled);
        assert_eq!(config.api_symbol, "SciterValueAPI");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            BindingConfig::from_json_str(r#"{"api_symbol": ""}"#),
            Err(SciterError::Config(_))
        ));
        assert!(matches!(
            BindingConfig::from_json_str("{not json"),
            Err(SciterError::Json(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"library": "/opt/sciter/libsciter.so"}}"#).unwrap();
        let config = BindingConfig::from_path(file.path()).unwrap();
        assert_eq!(
            config.library.as_deref(),
            Some(Path::new("/opt/sciter/libsciter.so"))
        );

        let missing = BindingConfig::from_path("/nonexistent/sciter.json");
        assert!(matches!(missing, Err(SciterError::Io(_))));
    }
}
