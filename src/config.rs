//! Crate configuration
//!
//! Layered the usual way: serde defaults, then an optional config file,
//! then `TINYORM__*` environment variables
//! (`TINYORM__DATABASE__PATH=/var/lib/app.db`).

use std::path::{Path, PathBuf};

use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Which database the bundled backend opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Logical database name, used in log output
    #[serde(default = "default_database_name")]
    pub name: String,
    /// Snapshot file; `None` keeps everything in memory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_database_name() -> String {
    "main".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_database_name(),
            path: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path` (optional) and the environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix("TINYORM").separator("__"))
    }

    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self> {
        let config = ConfigBuilder::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(env.try_parsing(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use config::Environment;

    use super::{Config, DatabaseConfig};
    use crate::error::Result;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::with_prefix("TINYORM").separator("__").source(Some(source))
    }

    #[test]
    fn test_missing_file_uses_defaults() -> Result<()> {
        let config = Config::load_with_env("/nonexistent/tinyorm.toml", env(&[]))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.database.name, "main");
        assert!(config.database.path.is_none());
        Ok(())
    }

    #[test]
    fn test_file_then_env() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "[database]\nname = \"app\"\npath = \"/tmp/app.db\"")?;

        let config = Config::load_with_env(file.path(), env(&[]))?;
        assert_eq!(
            config.database,
            DatabaseConfig {
                name: "app".into(),
                path: Some("/tmp/app.db".into()),
            }
        );

        let config = Config::load_with_env(file.path(), env(&[("TINYORM__DATABASE__NAME", "override")]))?;
        assert_eq!(config.database.name, "override");
        assert_eq!(config.database.path, Some("/tmp/app.db".into()));
        Ok(())
    }
}
