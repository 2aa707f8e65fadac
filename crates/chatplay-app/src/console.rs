//! Terminal front end: status output, operator commands and stdin chat.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chatplay_action::{parse_chat_line, ActionTable, CommandSwitch, Presentation};
use chatplay_core::{ChatMessage, ChatPlayConfig};
use tokio::sync::mpsc;

/// Prints status lines to stdout. Exit is requested by Ctrl-C or `/quit`.
#[derive(Debug, Default)]
pub struct ConsolePresentation {
    exit: AtomicBool,
}

impl ConsolePresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }
}

impl Presentation for ConsolePresentation {
    fn tick(&self) {
        let _ = std::io::stdout().flush();
    }

    fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    fn status(&self, line: &str) {
        println!("{line}");
    }
}

/// Operator commands typed into the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Enable,
    Disable,
    Quit,
    Unknown(String),
}

/// `/enable`, `/disable` or `/quit`. `None` for ordinary chat lines.
pub fn parse_console_command(line: &str) -> Option<ConsoleCommand> {
    let command = line.trim().strip_prefix('/')?;
    Some(match command.trim().to_lowercase().as_str() {
        "enable" => ConsoleCommand::Enable,
        "disable" => ConsoleCommand::Disable,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => ConsoleCommand::Unknown(other.to_string()),
    })
}

/// Apply an operator command. Returns false once the console should stop reading.
pub fn apply_console_command(
    command: &ConsoleCommand,
    switch: &CommandSwitch,
    presentation: &ConsolePresentation,
) -> bool {
    match command {
        ConsoleCommand::Enable => {
            switch.set(true);
            presentation.status("Commands enabled");
        }
        ConsoleCommand::Disable => {
            switch.set(false);
            presentation.status("Commands disabled");
        }
        ConsoleCommand::Quit => {
            presentation.request_exit();
            return false;
        }
        ConsoleCommand::Unknown(name) => {
            presentation.status(&format!("Unknown command '/{name}' (try /enable, /disable, /quit)"));
        }
    }
    true
}

/// Read stdin on a dedicated thread, forwarding chat lines to `tx`.
///
/// The thread ends on EOF, on `/quit`, or when the dispatcher drops the
/// receiving side.
pub fn spawn_stdin_reader(
    tx: mpsc::Sender<ChatMessage>,
    switch: CommandSwitch,
    presentation: Arc<ConsolePresentation>,
    default_channel: String,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-chat".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "Console read failed");
                        break;
                    }
                };
                if let Some(command) = parse_console_command(&line) {
                    if !apply_console_command(&command, &switch, &presentation) {
                        break;
                    }
                    continue;
                }
                let Some(msg) = parse_chat_line(&line, &default_channel) else {
                    if !line.trim().is_empty() {
                        tracing::debug!(line = %line, "Ignoring console line without 'user: text'");
                    }
                    continue;
                };
                if tx.blocking_send(msg).is_err() {
                    break;
                }
            }
            tracing::debug!("Console reader stopped");
        })
}

/// Request exit on Ctrl-C.
pub fn spawn_ctrl_c(presentation: Arc<ConsolePresentation>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received");
                presentation.request_exit();
            }
            Err(e) => tracing::warn!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Banner shown at startup: the command list viewers can paste and the
/// configured channels.
pub fn preamble(config: &ChatPlayConfig, table: &ActionTable) -> String {
    format!(
        "\n\t\t---  chatplay  ---\n\
         #\tChat plays with commands, for live game streams.\n\n\
         Valid commands are:\n{}\n\n\
         Channels set in config:\n{}\n",
        table.commands_str(),
        config.channels.join(", ")
    )
}

/// Connection summary: channels listened to and who may elevate.
pub fn connected_line(config: &ChatPlayConfig) -> String {
    let superusers = &config.access.superusers;
    format!(
        "Connected to channel{}: {}\nSuperuser{}: {}",
        plural(config.channels.len()),
        config.channels.join(", "),
        plural(superusers.len()),
        superusers.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use chatplay_action::{ActionContext, ActionRegistry};

    use super::*;

    #[test]
    fn test_parse_console_command() {
        assert_eq!(parse_console_command("/enable"), Some(ConsoleCommand::Enable));
        assert_eq!(parse_console_command("  /DISABLE "), Some(ConsoleCommand::Disable));
        assert_eq!(parse_console_command("/quit"), Some(ConsoleCommand::Quit));
        assert_eq!(
            parse_console_command("/dance"),
            Some(ConsoleCommand::Unknown("dance".to_string()))
        );
        assert_eq!(parse_console_command("bob: jump"), None);
    }

    #[test]
    fn test_apply_console_command() {
        let switch = CommandSwitch::new(true);
        let presentation = ConsolePresentation::new();

        assert!(apply_console_command(&ConsoleCommand::Disable, &switch, &presentation));
        assert!(!switch.is_enabled());
        assert!(apply_console_command(&ConsoleCommand::Enable, &switch, &presentation));
        assert!(switch.is_enabled());

        assert!(!presentation.exit_requested());
        assert!(!apply_console_command(&ConsoleCommand::Quit, &switch, &presentation));
        assert!(presentation.exit_requested());
    }

    #[test]
    fn test_preamble_lists_commands_and_channels() {
        let config = ChatPlayConfig::default();
        let table = ActionTable::from_config(
            &config,
            &ActionRegistry::with_defaults(),
            &ActionContext::default(),
        )
        .unwrap();

        let text = preamble(&config, &table);
        assert!(text.contains("Valid commands are:"));
        assert!(text.contains(&table.commands_str()));
        assert!(text.contains("mychannel"));
    }

    #[test]
    fn test_connected_line_pluralizes() {
        let mut config = ChatPlayConfig::default();
        config.channels = vec!["one".to_string()];
        config.access.superusers = vec!["alice".to_string(), "bob".to_string()];
        assert_eq!(
            connected_line(&config),
            "Connected to channel: one\nSuperusers: alice, bob"
        );
    }
}
