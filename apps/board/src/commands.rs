//! Interactive commands read from stdin.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Connect,
    Show,
    Status,
    Post(String),
    Help,
    Quit,
}

pub const HELP: &str = "commands: connect | show | status | post <message> | help | quit";

/// Parses one input line. `post` keeps the rest of the line as typed so
/// leading and trailing spaces reach the board untouched.
pub fn parse_command(line: &str) -> Result<UserCommand, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    let (word, rest) = match trimmed.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (trimmed, ""),
    };

    match word {
        "connect" => Ok(UserCommand::Connect),
        "show" => Ok(UserCommand::Show),
        "status" => Ok(UserCommand::Status),
        "post" => Ok(UserCommand::Post(rest.to_string())),
        "help" | "?" => Ok(UserCommand::Help),
        "quit" | "exit" => Ok(UserCommand::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command '{other}'")),
    }
}

pub fn command_name(cmd: &UserCommand) -> &'static str {
    match cmd {
        UserCommand::Connect => "connect",
        UserCommand::Show => "show",
        UserCommand::Status => "status",
        UserCommand::Post(_) => "post",
        UserCommand::Help => "help",
        UserCommand::Quit => "quit",
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
