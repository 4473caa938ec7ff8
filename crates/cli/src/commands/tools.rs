//! `parley tools`: List the tools offered to the model.

use parley_config::AppConfig;

pub fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tools = parley_tools::registry_with(&config.tools.enabled);
    println!("{}", serde_json::to_string_pretty(&tools.definitions())?);
    Ok(())
}
