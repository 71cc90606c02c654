/// A slash command recognised by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Clear,
    Settings,
    SetModel(Option<String>),
    SetTemp(Option<String>),
    SetMaxTokens(Option<String>),
    Unknown(String),
}

impl Command {
    /// Parses `text` as a command. Returns `None` for plain text, which goes to the model.
    ///
    /// Only a leading `/name` word made of letters, digits and `_` is a command,
    /// so text such as `/etc/hosts` still reaches the model. A `@botname` suffix
    /// on the command word is ignored, as Telegram appends one in group chats.
    /// Only the first argument is used.
    pub fn parse(text: &str) -> Option<Command> {
        let mut parts = text.trim().split_whitespace();
        let word = parts.next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        let arg = parts.next().map(str::to_string);

        let command = match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "clear" => Command::Clear,
            "settings" => Command::Settings,
            "set_model" => Command::SetModel(arg),
            "set_temp" => Command::SetTemp(arg),
            "set_max_tokens" => Command::SetMaxTokens(arg),
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}
