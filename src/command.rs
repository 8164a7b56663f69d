//! `/shell` chat command parsing.
//!
//! `/shell <TOKEN_NAME>` starts a ready check, `/shell setup` opens the decoy
//! tool. Anything that does not start with `/shell` followed by whitespace
//! or end of input is ordinary chat.

use crate::error::ShellError;

const COMMAND: &str = "/shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    StartCheck(String),
    Setup,
}

/// `None` for ordinary chat; otherwise the parsed command or a usage error.
#[must_use]
pub fn parse(content: &str) -> Option<Result<ChatCommand, ShellError>> {
    let rest = content.trim_start().strip_prefix(COMMAND)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let arg = rest.trim();
    Some(match arg {
        "" => Err(ShellError::Usage),
        "setup" => Ok(ChatCommand::Setup),
        name => Ok(ChatCommand::StartCheck(name.to_owned())),
    })
}
