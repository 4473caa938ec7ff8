//! `parley chat`: Interactive mode.
//!
//! History carries the user's messages and the assistant's text replies
//! between runs; tool traffic stays inside each run.

use std::io::Write;

use parley_config::AppConfig;
use parley_core::Message;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::runtime::Runtime;

/// What the REPL should do with one input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    Clear,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "exit" | "quit" => Input::Exit,
        "clear" => Input::Clear,
        text => Input::Message(text),
    }
}

/// Messages from a run worth keeping for the next one.
fn history_entries(output: &[Message]) -> impl Iterator<Item = Message> + '_ {
    output
        .iter()
        .filter(|m| matches!(m, Message::Assistant { .. }))
        .cloned()
}

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::from_config(config)?;

    println!();
    println!("  Parley: Interactive Mode");
    println!();
    println!("  Model:     {}", runtime.model_id());
    println!("  Tools:     {}", runtime.tool_names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'clear' to reset the conversation, 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<Message> = Vec::new();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match classify(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Clear => {
                history.clear();
                println!("  (conversation cleared)");
                println!();
                continue;
            }
            Input::Message(text) => {
                history.push(Message::user(text));
                match runtime.run(history.clone()).await {
                    Ok(output) => {
                        println!();
                        for reply in history_entries(&output.response_messages) {
                            for line in reply.content().unwrap_or_default().lines() {
                                println!("  Assistant > {line}");
                            }
                            history.push(reply);
                        }
                        println!();
                    }
                    Err(e) => {
                        history.pop();
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{ToolCall, ToolStatus};

    #[test]
    fn classifies_commands() {
        assert_eq!(classify("   "), Input::Empty);
        assert_eq!(classify("exit"), Input::Exit);
        assert_eq!(classify(" quit "), Input::Exit);
        assert_eq!(classify("clear"), Input::Clear);
        assert_eq!(classify(" hi there "), Input::Message("hi there"));
    }

    #[test]
    fn history_keeps_only_assistant_text() {
        let output = vec![
            Message::tool_call(vec![ToolCall::with_id("c1", "CurrentTimeTool", serde_json::json!({}))]),
            Message::tool_result("c1", "CurrentTimeTool", "noon", ToolStatus::Success),
            Message::assistant("It is noon."),
        ];
        let kept: Vec<_> = history_entries(&output).collect();
        assert_eq!(kept, vec![Message::assistant("It is noon.")]);
    }
}
