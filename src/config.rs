use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

/// Minimum severity of the diagnostics the engine emits.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
    None,
}

impl LogLevel {
    /// Returns true if a message of `level` should be emitted.
    pub fn allows(self, level: LogLevel) -> bool {
        level != LogLevel::None && level >= self
    }
}

/// Options passed to the engine instead of process-wide debug switches.
///
/// The connection related switches are not used by the renderer itself; they are carried here
/// so that the serving layer reads every option from one place.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub show_connection_lifetime: bool,
    /// Disables the keep-alive quick fix for browsers that keep idle sockets open.
    pub disable_keepalive_fix: bool,
    pub disable_keepalive: bool,
    /// Print every request to stdout.
    pub output_requests: bool,
    pub log_level: LogLevel,
    /// How deep if/for bodies and loaded blocks may nest before rendering is aborted.
    pub max_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            show_connection_lifetime: false,
            disable_keepalive_fix: false,
            disable_keepalive: false,
            output_requests: false,
            log_level: LogLevel::Info,
            max_depth: 64,
        }
    }
}

impl RenderConfig {
    /// Parses the configuration from JSON. Missing keys keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// let config = stencil::RenderConfig::from_json(r#"{ "log_level" : "error" }"#).unwrap();
    /// assert_eq!(config.log_level, stencil::LogLevel::Error);
    /// assert_eq!(config.max_depth, 64);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads the configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[test]
fn level_ordering() {
    assert!(LogLevel::Info.allows(LogLevel::Warning));
    assert!(LogLevel::Warning.allows(LogLevel::Error));
    assert!(!LogLevel::Error.allows(LogLevel::Warning));
    assert!(!LogLevel::None.allows(LogLevel::Error));
}

#[test]
fn parse_full_config() {
    let config = RenderConfig::from_json(
        r#"{
            "show_connection_lifetime" : true,
            "disable_keepalive_fix" : true,
            "disable_keepalive" : false,
            "output_requests" : true,
            "log_level" : "warning",
            "max_depth" : 8
        }"#,
    )
    .unwrap();

    assert!(config.show_connection_lifetime);
    assert!(config.disable_keepalive_fix);
    assert!(!config.disable_keepalive);
    assert!(config.output_requests);
    assert_eq!(config.log_level, LogLevel::Warning);
    assert_eq!(config.max_depth, 8);
}

#[test]
fn parse_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stencil.json");
    fs::write(&path, r#"{ "disable_keepalive" : true }"#).unwrap();

    let config = RenderConfig::from_file(&path).unwrap();
    assert!(config.disable_keepalive);
    assert_eq!(config.log_level, LogLevel::Info);

    fs::write(&path, "{ not json").unwrap();
    assert!(RenderConfig::from_file(&path).is_err());
}
