//! `parley ask`: Single-message mode.

use parley_config::AppConfig;
use parley_core::Message;

use super::runtime::Runtime;

pub async fn run(config: &AppConfig, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::from_config(config)?;
    let output = runtime.run(vec![Message::user(message)]).await?;

    match output.response_message.content() {
        Some(text) => println!("{text}"),
        None => println!("{}", serde_json::to_string_pretty(&output.response_message)?),
    }
    Ok(())
}
