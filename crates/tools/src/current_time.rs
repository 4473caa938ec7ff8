//! Current time tool: reports the local date and time.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use parley_core::{RunContext, Tool, ToolError};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "CurrentTimeTool"
    }

    fn description(&self) -> &str {
        "Get the current day and time."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _context: &RunContext,
    ) -> Result<String, ToolError> {
        Ok(describe_time(&Local::now()))
    }
}

/// e.g. `The current time is Thursday, October 15, 2026 at 3:04:05 PM +00:00`
pub fn describe_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "The current time is {}",
        now.format("%A, %B %-d, %Y at %-I:%M:%S %p %:z")
    )
}
