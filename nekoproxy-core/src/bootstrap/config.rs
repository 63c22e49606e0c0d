//! Configuration loading

use anyhow::Result;
use std::path::Path;

use crate::Config;

const CONFIG_PATH_ENV: &str = "NEKOPROXY_CONFIG_PATH";

/// Load configuration from a config file or environment variables
///
/// Config file search order:
/// 1. `explicit_path` (from the command line)
/// 2. `NEKOPROXY_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
/// 4. /config/config.yaml (container mount path)
/// 5. Fall back to environment variables only
pub fn load_config(explicit_path: Option<&str>) -> Result<Config> {
    let config = match find_config_file(explicit_path) {
        Some(path) => {
            if !Path::new(&path).exists() {
                anyhow::bail!("Config file {path} does not exist");
            }
            eprintln!("Loading config from {path}");
            Config::from_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
        }
        None => {
            eprintln!("No config file found, using environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?
        }
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}

fn find_config_file(explicit_path: Option<&str>) -> Option<String> {
    if let Some(path) = explicit_path {
        // An explicit path that does not exist is a mistake, not a fallback
        return Some(path.to_string());
    }

    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| existing("config.yaml"))
        .or_else(|| existing("/config/config.yaml"))
}

fn existing(path: &str) -> Option<String> {
    Path::new(path).exists().then(|| path.to_string())
}
