//! Slash commands and input classification for interactive mode

mod files;

use quill_agent::Session;

/// What a line of user input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Command(Command),
    /// `!cmd`: run directly, without the model
    Shell(String),
    Request(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Drop(String),
    Files,
    Clear,
    Undo,
    Help,
    Exit,
    Unknown(String),
}

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
}

pub fn parse_input(input: &str) -> Input {
    let input = input.trim();
    if input.is_empty() {
        return Input::Empty;
    }
    if let Some(command) = input.strip_prefix('!') {
        let command = command.trim();
        return if command.is_empty() {
            Input::Empty
        } else {
            Input::Shell(command.to_string())
        };
    }
    if input.starts_with('/') {
        return Input::Command(parse_command(input));
    }
    Input::Request(input.to_string())
}

fn parse_command(input: &str) -> Command {
    let mut parts = input[1..].splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().map(str::trim).unwrap_or("").to_string();

    match name.as_str() {
        "add" | "a" => Command::Add(arg),
        "drop" | "d" => Command::Drop(arg),
        "files" | "f" => Command::Files,
        "clear" | "c" => Command::Clear,
        "undo" | "u" => Command::Undo,
        "help" | "h" | "?" => Command::Help,
        "exit" | "quit" | "q" => Command::Exit,
        _ => Command::Unknown(name),
    }
}

/// Execute a slash command against the session
pub async fn execute_command(command: Command, session: &mut Session) -> CommandResult {
    match command {
        Command::Add(pattern) => CommandResult::Message(files::add(session, &pattern)),
        Command::Drop(path) => CommandResult::Message(files::drop(session, &path)),
        Command::Files => CommandResult::Message(files::list(session)),
        Command::Clear => {
            session.clear_history();
            CommandResult::Message("History cleared.".to_string())
        }
        Command::Undo => match session.undo().await {
            Ok(()) => CommandResult::Message("Undid last commit; its changes stay staged.".to_string()),
            Err(e) => CommandResult::Message(format!("Undo failed: {}", e)),
        },
        Command::Help => CommandResult::Message(help_message()),
        Command::Exit => CommandResult::Exit,
        Command::Unknown(name) => CommandResult::Message(format!(
            "Unknown command: /{}\nType /help for available commands.",
            name
        )),
    }
}

fn help_message() -> String {
    r#"Available commands:
  /add, /a <glob>      Add files to context (relative to the repository root)
  /drop, /d <file>     Remove a file from context
  /files, /f           List files in context
  /clear, /c           Clear conversation history
  /undo, /u            Undo the last commit (changes stay staged)
  /help, /h, /?        Show this help message
  /exit, /quit, /q     Exit quill
  !<cmd>               Run a shell command, then choose whether to add its output

End a request with Ctrl-D. Ctrl-C interrupts a reply or command."#
        .to_string()
}
