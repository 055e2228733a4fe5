//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{GatewayConfig, StoreKind};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env(e) => write!(f, "Environment error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// What happened while looking for a `.env` file.
#[derive(Debug)]
pub enum DotenvOutcome {
    Loaded(PathBuf),
    NotFound,
    Failed { file: PathBuf, error: String },
}

impl DotenvOutcome {
    /// Report the outcome. Call once logging is initialized.
    pub fn log(&self) {
        match self {
            DotenvOutcome::Loaded(path) => {
                tracing::info!(path = %path.display(), "Loaded environment file")
            }
            DotenvOutcome::NotFound => tracing::debug!("No environment file found"),
            DotenvOutcome::Failed { file, error } => {
                tracing::warn!(file = %file.display(), error = %error, "Cannot load environment file")
            }
        }
    }
}

/// Load `.env` from the working directory or its parent, if present.
pub fn load_dotenv() -> DotenvOutcome {
    load_dotenv_from(&[Path::new(".env"), Path::new("../.env")])
}

fn load_dotenv_from(candidates: &[&Path]) -> DotenvOutcome {
    for candidate in candidates {
        match dotenvy::from_filename(candidate) {
            Ok(path) => return DotenvOutcome::Loaded(path),
            Err(e) if e.not_found() => continue,
            Err(e) => {
                return DotenvOutcome::Failed {
                    file: candidate.to_path_buf(),
                    error: e.to_string(),
                }
            }
        }
    }
    DotenvOutcome::NotFound
}

/// Load configuration: TOML file (if given and present), then environment
/// overrides, then validation. A missing file means defaults.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        _ => GatewayConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay deployment environment variables onto `config`.
///
/// - `MYSQL_URL`: database URL
/// - `MYSQL_URL_FILE`: file holding the database URL (wins over `MYSQL_URL`)
/// - `HTTP_PORT`: listener port, keeping the configured bind host
/// - `GATEWAY_FIXTURE`: switch to the fixture store at this path
pub fn apply_env<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("MYSQL_URL").filter(|v| !v.is_empty()) {
        config.store.database_url = url;
    }

    if let Some(file) = lookup("MYSQL_URL_FILE").filter(|v| !v.is_empty()) {
        let url = fs::read_to_string(&file)
            .map_err(|e| ConfigError::Env(format!("MYSQL_URL_FILE {}: {}", file, e)))?;
        config.store.database_url = url.trim().to_string();
    }

    if let Some(port) = lookup("HTTP_PORT").filter(|v| !v.is_empty()) {
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::Env(format!("HTTP_PORT '{}' is not a port", port)))?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(path) = lookup("GATEWAY_FIXTURE").filter(|v| !v.is_empty()) {
        config.store.kind = StoreKind::Fixture;
        config.store.fixture_path = path;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env(
            &mut config,
            env(&[("MYSQL_URL", "mysql://a@db/x"), ("HTTP_PORT", "8090")]),
        )
        .unwrap();

        assert_eq!(config.store.database_url, "mysql://a@db/x");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8090");
    }

    #[test]
    fn test_url_file_wins() {
        let path = std::env::temp_dir().join("dle_gateway_mysql_url_test");
        fs::write(&path, "  mysql://from@file/db\n").unwrap();

        let mut config = GatewayConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("MYSQL_URL", "mysql://from@env/db"),
                ("MYSQL_URL_FILE", path.to_str().unwrap()),
            ]),
        )
        .unwrap();
        assert_eq!(config.store.database_url, "mysql://from@file/db");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_bad_port_and_missing_file() {
        let mut config = GatewayConfig::default();
        assert!(matches!(
            apply_env(&mut config, env(&[("HTTP_PORT", "http")])),
            Err(ConfigError::Env(_))
        ));
        assert!(matches!(
            apply_env(&mut config, env(&[("MYSQL_URL_FILE", "/nonexistent/dle_gateway")])),
            Err(ConfigError::Env(_))
        ));
    }

    #[test]
    fn test_fixture_switch() {
        let mut config = GatewayConfig::default();
        apply_env(&mut config, env(&[("GATEWAY_FIXTURE", "tenants.json")])).unwrap();
        assert_eq!(config.store.kind, StoreKind::Fixture);
        assert_eq!(config.store.fixture_path, "tenants.json");
    }

    #[test]
    fn test_dotenv_outcome() {
        let missing = std::env::temp_dir().join("dle_gateway_no_such.env");
        assert!(matches!(load_dotenv_from(&[missing.as_path()]), DotenvOutcome::NotFound));

        let path = std::env::temp_dir().join("dle_gateway_test.env");
        fs::write(&path, "DLE_GATEWAY_DOTENV_TEST=1\n").unwrap();
        let outcome = load_dotenv_from(&[missing.as_path(), path.as_path()]);
        assert!(matches!(outcome, DotenvOutcome::Loaded(ref p) if p == &path));

        fs::remove_file(&path).unwrap_or_default();
    }
}
