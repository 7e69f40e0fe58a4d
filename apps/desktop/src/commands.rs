//! Slash commands typed at the chat prompt.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Login { email: String, password: String },
    Signup {
        username: String,
        email: String,
        password: String,
    },
    ToggleMode,
    Logout,
    Persona(Option<String>),
    Reset,
    Voice(String),
    Google,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  <text>                               send a message
  /login <email> <password>            sign in
  /signup <username> <email> <password> create an account
  /mode                                switch the auth form between sign in and sign up
  /logout                              sign out
  /persona [name]                      show or select the persona
  /voice <transcript>                  feed a speech recognition result
  /reset                               clear the chat
  /google                              print the Google sign-in URL
  /quit                                exit";

/// Lines without a leading `/` are chat input. Unknown or malformed
/// commands yield an error with a usage hint.
pub fn parse(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("login", [email, password]) => Ok(Command::Login {
            email: email.to_string(),
            password: password.to_string(),
        }),
        ("login", _) => Err("usage: /login <email> <password>".into()),
        ("signup", [username, email, password]) => Ok(Command::Signup {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }),
        ("signup", _) => Err("usage: /signup <username> <email> <password>".into()),
        ("mode", []) => Ok(Command::ToggleMode),
        ("logout", []) => Ok(Command::Logout),
        ("persona", []) => Ok(Command::Persona(None)),
        ("persona", [name]) => Ok(Command::Persona(Some(name.to_string()))),
        ("persona", _) => Err("usage: /persona [name]".into()),
        ("voice", words) if !words.is_empty() => Ok(Command::Voice(words.join(" "))),
        ("voice", _) => Err("usage: /voice <transcript>".into()),
        ("reset", []) => Ok(Command::Reset),
        ("google", []) => Ok(Command::Google),
        ("help", _) => Ok(Command::Help),
        ("quit" | "exit", _) => Ok(Command::Quit),
        _ => Err(format!("unknown command '/{name}', try /help")),
    }
}
