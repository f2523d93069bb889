#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use solmc_ast::Program;
use solmc_core::TranslationConfig;
use thiserror::Error;

pub const CONFIG_FILE: &str = "solmc.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("configuration error: {message}")]
#[diagnostic(code(solmc::config))]
pub struct ConfigError {
    pub message: String,
    #[help]
    pub help: Option<String>,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            help: None,
        }
    }
}

/// `solmc.toml`. Only the `[model]` table is read.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    model: TranslationConfig,
}

/// Command-line values that take precedence over the manifest.
#[derive(Debug, Default)]
pub struct Overrides {
    pub lockstep_time: bool,
    pub address_count: Option<u64>,
    pub actors: Vec<String>,
}

pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        let candidate = cur.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        match cur.parent() {
            Some(p) => cur = p.to_path_buf(),
            None => return None,
        }
    }
}

pub fn load_config(path: &Path) -> Result<TranslationConfig, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| ConfigError::new(format!("failed to read {}: {e}", path.display())))?;
    let parsed: Manifest = toml::from_str(&raw)
        .map_err(|e| ConfigError::new(format!("failed to parse {}: {e}", path.display())))?;
    Ok(parsed.model)
}

/// The explicit file if given, otherwise the nearest `solmc.toml` above
/// `input`, otherwise the defaults.
pub fn resolve_config(
    input: &Path,
    explicit: Option<&Path>,
    overrides: Overrides,
) -> Result<TranslationConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => {
            // A relative input has an empty parent; search from the working directory.
            let start = match input.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            match find_config(&start) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "config found");
                    load_config(&path)?
                }
                None => TranslationConfig::default(),
            }
        }
    };

    if overrides.lockstep_time {
        config.lockstep_time = true;
    }
    if let Some(count) = overrides.address_count {
        config.address_count = count;
    }
    if !overrides.actors.is_empty() {
        config.actors = Some(overrides.actors);
    }
    if config.address_count == 0 {
        return Err(ConfigError::new("the model needs at least one address"));
    }
    Ok(config)
}

/// Every explicitly named actor must be a contract of `program`.
pub fn check_actors(config: &TranslationConfig, program: &Program) -> Result<(), ConfigError> {
    let Some(actors) = &config.actors else {
        return Ok(());
    };
    for name in actors {
        if program.contract_by_name(name).is_none() {
            let known: Vec<&str> = program.contracts.iter().map(|c| c.name.as_str()).collect();
            return Err(ConfigError {
                message: format!("actor `{name}` names no contract"),
                help: Some(format!("contracts in the input: {}", known.join(", "))),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_table_uses_kebab_case_keys() {
        let parsed: Manifest = toml::from_str(
            "[model]\nlockstep-time = true\naddresses = 8\nactors = [\"Bank\", \"Bank\"]\n",
        )
        .unwrap();
        assert!(parsed.model.lockstep_time);
        assert_eq!(parsed.model.address_count, 8);
        assert_eq!(
            parsed.model.actors,
            Some(vec!["Bank".to_string(), "Bank".to_string()])
        );
    }

    #[test]
    fn missing_keys_take_defaults() {
        let parsed: Manifest = toml::from_str("[model]\nlockstep-time = true\n").unwrap();
        assert_eq!(parsed.model.address_count, solmc_core::DEFAULT_ADDRESS_COUNT);
        assert_eq!(parsed.model.actors, None);

        let empty: Manifest = toml::from_str("").unwrap();
        assert_eq!(empty.model, TranslationConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Manifest>("[model]\nlockstep = true\n").is_err());
        assert!(toml::from_str::<Manifest>("[solver]\n").is_err());
    }
}
