use std::io::{self, BufRead, Write};

use leadflow_agent::{AssistantRuntime, OpenAiCompatClient};
use leadflow_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

const GREETING: &str = "Buenos días. Soy tu asistente, ¿cómo puedo ayudarte?";

/// Interactive assistant prototype on stdin/stdout. An empty line or EOF ends
/// the session.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let llm = match OpenAiCompatClient::new(&config.llm) {
        Ok(llm) => llm,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "llm_init",
                format!("failed to initialize llm client: {error}"),
                3,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let mut assistant = AssistantRuntime::with_prototype_tools(llm);
    let mut turns = 0usize;

    println!("{GREETING}");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let text = line.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("exit") {
            break;
        }

        match runtime.block_on(assistant.handle_message(text)) {
            Ok(reply) => {
                turns += 1;
                println!("{reply}");
                let _ = io::stdout().flush();
            }
            Err(error) => {
                return CommandResult::failure(
                    "chat",
                    "assistant",
                    format!("assistant turn failed: {error}"),
                    4,
                );
            }
        }
    }

    CommandResult::success("chat", format!("session ended after {turns} turns"))
}
