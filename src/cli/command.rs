//! Slash commands accepted at the prompt.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    New,
    List,
    Open(String),
    Delete(String),
    Rename(String),
    Memory,
    Forget(i64),
    /// Pending reminders, or all recent ones including fired.
    Reminders { all: bool },
    Unremind(i64),
    Clear,
    Regenerate,
    /// Copy the last reply, or its n-th complete code block.
    Copy(Option<usize>),
    Stats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Chat(String),
    Command(Command),
    /// A slash command that could not be parsed; carries the usage hint.
    Invalid(String),
}

pub const HELP_TEXT: &str = "
Commands:
  /new              Start a new conversation
  /list             List conversations
  /open <id>        Open a conversation
  /delete <id>      Delete a conversation
  /rename <title>   Rename the current conversation
  /memory           Show long-term memories
  /forget <id>      Remove a long-term memory by ID
  /reminders [all]  Show pending reminders (or recent ones, fired included)
  /unremind <id>    Cancel a reminder by ID
  /clear            Clear short-term history on the server
  /regen            Regenerate the last reply
  /copy [n]         Copy the last reply, or its n-th code block
  /stats            Show timing of the last reply
  /help             Show this help
  /exit             Quit (Ctrl-D also works; Ctrl-C cancels a streaming reply)
";

pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Chat(line.to_string());
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };
    let command = match name.to_lowercase().as_str() {
        "/exit" | "/quit" => Command::Exit,
        "/help" => Command::Help,
        "/new" => Command::New,
        "/list" => Command::List,
        "/open" if !arg.is_empty() => Command::Open(arg.to_string()),
        "/open" => {
            return Input::Invalid("Usage: /open <id>  (use /list to see IDs)".into());
        }
        "/delete" if !arg.is_empty() => Command::Delete(arg.to_string()),
        "/delete" => {
            return Input::Invalid("Usage: /delete <id>".into());
        }
        "/rename" if !arg.is_empty() => Command::Rename(arg.to_string()),
        "/rename" => {
            return Input::Invalid("Usage: /rename <title>".into());
        }
        "/memory" => Command::Memory,
        "/forget" =>
            match arg.parse::<i64>() {
                Ok(id) => Command::Forget(id),
                Err(_) => {
                    return Input::Invalid("Usage: /forget <id>  (use /memory to see IDs)".into());
                }
            }
        "/reminders" if arg.is_empty() => Command::Reminders { all: false },
        "/reminders" if arg.eq_ignore_ascii_case("all") => Command::Reminders { all: true },
        "/reminders" => {
            return Input::Invalid("Usage: /reminders [all]".into());
        }
        "/unremind" =>
            match arg.parse::<i64>() {
                Ok(id) => Command::Unremind(id),
                Err(_) => {
                    return Input::Invalid("Usage: /unremind <id>  (use /reminders to see IDs)".into());
                }
            }
        "/clear" => Command::Clear,
        "/regen" | "/regenerate" => Command::Regenerate,
        "/copy" if arg.is_empty() => Command::Copy(None),
        "/copy" =>
            match arg.parse::<usize>() {
                Ok(n) => Command::Copy(Some(n)),
                Err(_) => {
                    return Input::Invalid("Usage: /copy [n]".into());
                }
            }
        "/stats" => Command::Stats,
        other => {
            return Input::Invalid(format!("Unknown command: {}. Type /help for options.", other));
        }
    };
    Input::Command(command)
}
