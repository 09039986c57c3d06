//! Schema files describing an application and its commands.
//!
//! TOML, YAML (with the `yaml` feature) and JSON are supported.

use std::path::Path;

use serde::Deserialize;

use crate::command::Command;
use crate::error::{CommandError, CommandResult};

/// Root of a schema file.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Application metadata
    pub app: AppConfig,

    /// Commands, each with its full path
    #[serde(default)]
    pub commands: Vec<Command>,

    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1".to_string()
}

/// Application metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Binary name
    pub name: String,

    /// Application version
    #[serde(default)]
    pub version: String,

    /// One-line summary
    #[serde(default)]
    pub summary: Option<String>,

    /// Long description shown in help
    #[serde(default)]
    pub description: Option<String>,

    /// Prefix for runtime environment variables, e.g. `MY_APP_`
    #[serde(default)]
    pub env_prefix: Option<String>,
}

impl AppConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

fn read(path: &Path) -> CommandResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CommandError::schema(format!("Failed to read {}: {}", path.display(), e))
    })
}

impl CliConfig {
    /// Parse a TOML schema.
    pub fn from_toml_str(content: &str) -> CommandResult<Self> {
        toml::from_str(content).map_err(|e| CommandError::schema(format!("Failed to parse TOML: {}", e)))
    }

    /// Parse a YAML schema.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(content: &str) -> CommandResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| CommandError::schema(format!("Failed to parse YAML: {}", e)))
    }

    /// Parse a JSON schema.
    pub fn from_json_str(content: &str) -> CommandResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| CommandError::schema(format!("Failed to parse JSON: {}", e)))
    }

    /// Load config from TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> CommandResult<Self> {
        Self::from_toml_str(&read(path.as_ref())?)
    }

    /// Load config from YAML file
    #[cfg(feature = "yaml")]
    pub fn from_yaml_file(path: impl AsRef<Path>) -> CommandResult<Self> {
        Self::from_yaml_str(&read(path.as_ref())?)
    }

    /// Load config from JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> CommandResult<Self> {
        Self::from_json_str(&read(path.as_ref())?)
    }

    /// Load a schema, picking the format from the file extension.
    ///
    /// Unknown extensions are tried as TOML, then YAML, then JSON.
    pub fn from_file(path: impl AsRef<Path>) -> CommandResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            #[cfg(feature = "yaml")]
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => {
                let content = read(path)?;
                Self::from_toml_str(&content)
                    .or_else(|_| {
                        #[cfg(feature = "yaml")]
                        {
                            Self::from_yaml_str(&content)
                        }
                        #[cfg(not(feature = "yaml"))]
                        {
                            Err(CommandError::schema("YAML support not enabled"))
                        }
                    })
                    .or_else(|_| Self::from_json_str(&content))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{SourceKind, Value, ValueType};

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [app]
            name = "test"
            version = "1.0.0"
        "#;

        let config = CliConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.app.name, "test");
        assert_eq!(config.app.version, "1.0.0");
        assert_eq!(config.version, "1");
        assert!(config.commands.is_empty());
    }

    #[test]
    fn test_parse_toml_commands() {
        let toml = r#"
            [app]
            name = "test"
            version = "1.0.0"

            [[commands]]
            path = ["db", "migrate"]
            summary = "Run migrations"
            exec = "echo migrating {{ Arg \"target\" }}"

            [[commands.arguments]]
            name = "target"
            required = true
            values = { static = ["up", "down"] }

            [commands.options.steps]
            type = "int"
            default = 1
            short-name = "s"
        "#;

        let config = CliConfig::from_toml_str(toml).unwrap();
        let cmd = &config.commands[0];
        assert_eq!(cmd.full_name(), "db migrate");
        assert!(cmd.arguments[0].required);
        assert!(matches!(
            cmd.arguments[0].values.as_ref().map(|v| v.kind()),
            Some(SourceKind::Static(_))
        ));
        assert_eq!(cmd.options["steps"].kind, ValueType::Int);
        assert_eq!(cmd.options["steps"].default, Some(Value::Int(1)));
        assert_eq!(cmd.options["steps"].short_name, Some('s'));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_parse_yaml_commands() {
        let yaml = r#"
app:
  name: test
  version: 0.1.0
commands:
  - path: [deploy]
    summary: Deploy things
    arguments:
      - name: environment
        values:
          script: "echo dev; echo prod"
          timeout: 2
    options:
      tag:
        repeated: true
        values:
          static: [a, b]
          suggest-only: true
"#;

        let config = CliConfig::from_yaml_str(yaml).unwrap();
        let cmd = &config.commands[0];
        let source = cmd.arguments[0].values.as_ref().unwrap();
        assert!(matches!(source.kind(), SourceKind::Script(_)));
        assert_eq!(source.timeout, 2);
        assert!(cmd.options["tag"].repeated);
        assert!(cmd.options["tag"].values.as_ref().unwrap().suggestion);
    }

    #[test]
    fn test_parse_json_rejects_ambiguous_source() {
        let json = r#"{
            "app": {"name": "test", "version": "1"},
            "commands": [{
                "path": ["x"],
                "arguments": [{"name": "a", "values": {"static": ["a"], "dirs": "."}}]
            }]
        }"#;

        let err = CliConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, CommandError::Schema(_)));
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.json");
        std::fs::write(&path, r#"{"app": {"name": "from-json", "version": "2"}}"#).unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.app.name, "from-json");

        let missing = CliConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert_eq!(missing.exit_code(), crate::error::status::CONFIG_ERROR);
    }
}
