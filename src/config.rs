//! Runtime configuration.
//!
//! Loaded from `testsmith.yml` (or an explicit path), then overridden by
//! `TESTSMITH_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "testsmith.yml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub toolchain: ToolchainConfig,
    pub generation: GenerationConfig,
    pub standards_dir: StandardsDir,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Gradle entrypoint, resolved relative to the project root.
    pub gradle_command: String,
    /// Exported as `JAVA_HOME` for every Gradle invocation when set.
    pub java_home: Option<PathBuf>,
    /// Tasks passed as `-x <task>`.
    pub excluded_tasks: Vec<String>,
    pub timeout_secs: u64,
    /// Module used when a target path has no leading module segment.
    pub default_module: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            gradle_command: "./gradlew".to_string(),
            java_home: None,
            excluded_tasks: vec![
                "kaptKotlin".to_string(),
                "kaptGenerateStubsKotlin".to_string(),
                "kaptTestKotlin".to_string(),
                "kaptGenerateStubsTestKotlin".to_string(),
            ],
            timeout_secs: 600,
            default_module: "app".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Source annotation that marks a framework entrypoint.
    pub framework_marker: String,
    /// Package used when none can be derived from a service path.
    pub default_package: String,
    /// Persist the output of failed toolchain attempts under `.testsmith/`.
    pub record_attempts: bool,
    /// Repair rules switched off by name, e.g. `string_for_boolean`.
    pub disabled_repair_rules: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            framework_marker: "@SpringBootApplication".to_string(),
            default_package: "com.example".to_string(),
            record_attempts: true,
            disabled_repair_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardsDir(pub PathBuf);

impl Default for StandardsDir {
    fn default() -> Self {
        StandardsDir(PathBuf::from("standards"))
    }
}

impl AppConfig {
    /// Loads the config file (explicit path or `testsmith.yml` if present) and
    /// applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    AppConfig::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(content).context("Failed to parse YAML config")
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(gradle) = lookup("TESTSMITH_GRADLE") {
            self.toolchain.gradle_command = gradle;
        }
        if let Some(java_home) = lookup("TESTSMITH_JAVA_HOME") {
            self.toolchain.java_home = Some(PathBuf::from(java_home));
        }
        if let Some(secs) = lookup("TESTSMITH_TOOL_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.toolchain.timeout_secs = secs;
        }
        if let Some(dir) = lookup("TESTSMITH_STANDARDS_DIR") {
            self.standards_dir = StandardsDir(PathBuf::from(dir));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_gradle_conventions() {
        let config = AppConfig::default();
        assert_eq!(config.toolchain.gradle_command, "./gradlew");
        assert_eq!(config.toolchain.excluded_tasks.len(), 4);
        assert_eq!(config.toolchain.timeout_secs, 600);
        assert_eq!(config.generation.framework_marker, "@SpringBootApplication");
        assert_eq!(config.standards_dir.0, PathBuf::from("standards"));
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = r#"
toolchain:
  default_module: olive-domain
  timeout_secs: 30
generation:
  record_attempts: false
  disabled_repair_rules: [string_for_boolean]
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.toolchain.default_module, "olive-domain");
        assert_eq!(config.toolchain.timeout_secs, 30);
        assert_eq!(config.toolchain.gradle_command, "./gradlew");
        assert!(!config.generation.record_attempts);
        assert_eq!(config.generation.disabled_repair_rules, vec!["string_for_boolean"]);
        assert_eq!(config.generation.default_package, "com.example");
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = AppConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.toolchain.default_module, "app");
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("TESTSMITH_GRADLE", "gradle"),
            ("TESTSMITH_JAVA_HOME", "/opt/jdk17"),
            ("TESTSMITH_TOOL_TIMEOUT_SECS", "45"),
            ("TESTSMITH_STANDARDS_DIR", "/etc/testsmith"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.toolchain.gradle_command, "gradle");
        assert_eq!(config.toolchain.java_home, Some(PathBuf::from("/opt/jdk17")));
        assert_eq!(config.toolchain.timeout_secs, 45);
        assert_eq!(config.standards_dir.0, PathBuf::from("/etc/testsmith"));
    }

    #[test]
    fn unparsable_timeout_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|key| (key == "TESTSMITH_TOOL_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(config.toolchain.timeout_secs, 600);
    }
}
