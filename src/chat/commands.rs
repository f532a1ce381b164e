//! Routing of user input.
//!
//! Input that starts with `/` is a command; everything else is chat.  A handful of commands
//! are handled by the client itself ([`LocalCommand`]); every other command goes to the server,
//! which answers synchronously.  Chat messages are streamed.

/// The prefix that marks a command.
pub const COMMAND_MARKER: char = '/';

/// Where a line of input should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// A command, sent as-is (marker included) to the command endpoint.
    Command(&'a str),
    /// A chat message, sent to the streaming endpoint.
    Chat(&'a str),
}

/// Routes a line of input.  Leading and trailing whitespace is not part of the message.
///
/// # Examples
///
/// ```
/// # use ctf_client::chat::{Route, route};
/// assert_eq!(route("/hint"), Route::Command("/hint"));
/// assert_eq!(route("  what is the secret? "), Route::Chat("what is the secret?"));
/// ```
pub fn route(input: &str) -> Route<'_> {
    let input = input.trim();
    if input.starts_with(COMMAND_MARKER) {
        Route::Command(input)
    } else {
        Route::Chat(input)
    }
}

/// A command the client handles without asking the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    /// Exit the chat application.
    Quit,

    /// Export the session to a file (a default name when `None`).
    Export(Option<String>),

    /// Import a session from a file.
    Import(String),

    /// Show the current session.
    Session,

    /// Start a new session, optionally under a new name.
    New(Option<String>),

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for client-side commands.
///
/// Returns `None` for chat messages and for commands the server handles.
pub fn parse_local_command(input: &str) -> Option<LocalCommand> {
    let Route::Command(input) = route(input) else {
        return None;
    };

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts
        .next()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let result = match command.as_str() {
        "quit" | "exit" | "q" => LocalCommand::Quit,
        "export" => LocalCommand::Export(argument),
        "import" => match argument {
            Some(path) => LocalCommand::Import(path),
            None => LocalCommand::Invalid("/import requires a file path".to_string()),
        },
        "session" => LocalCommand::Session,
        "new" => LocalCommand::New(argument),
        _ => return None,
    };
    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Game commands (answered by the server):
  /help                  Show the server's help
  /hint                  Get a hint for the current stage
  /stage                 Show the current stage
  /submit <flag>         Submit a flag
  /reset                 Clear the conversation history
Client commands:
  /session               Show the current session
  /new [name]            Start a new session
  /export [file]         Save the session to a file
  /import <file>         Restore a session from a file
  /quit                  Exit the chat"#
}
