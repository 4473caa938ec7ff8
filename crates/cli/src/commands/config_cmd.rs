//! `parley config`: Configuration management commands.

use std::path::Path;

use parley_config::{AppConfig, ConfigError};

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config.to_toml()?);
    Ok(())
}

pub fn path(custom: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = custom.map_or_else(AppConfig::config_path, Path::to_path_buf);
    println!("{}", config_path.display());
    Ok(())
}

pub fn validate(loaded: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let known = parley_tools::builtin_names();
    let unknown: Vec<&String> = config
        .tools
        .enabled
        .iter()
        .filter(|name| !known.contains(*name))
        .collect();
    if unknown.is_empty() {
        println!("   All checks passed");
    } else {
        for name in unknown {
            println!("   Warning: unknown tool '{name}' will be skipped");
        }
    }

    println!();
    println!("   Executor:  {}", config.executor);
    println!("   Model:     {}", config.model_id);
    println!("   Tools:     {}", config.tools.enabled.join(", "));
    if let Some(timeout) = config.run_timeout_secs {
        println!("   Timeout:   {timeout}s");
    }
    Ok(())
}
