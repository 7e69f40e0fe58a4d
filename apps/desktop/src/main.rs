mod commands;
mod terminal_view;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::normalize_base_url, load_settings, AuthClient, AuthForm, AuthMode, AuthOutcome,
    ChatDispatcher, DispatchOrigin, FileTokenStore, SessionEvent, SessionManager, SpeechBridge,
    SpeechEvent,
};
use shared::domain::{Persona, KNOWN_PERSONAS};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::EnvFilter;

use crate::{
    commands::{parse, Command, HELP},
    terminal_view::TerminalView,
};

#[derive(Parser, Debug)]
#[command(name = "yuna", about = "Terminal client for the Yuna voice/text chat backend")]
struct Args {
    /// Settings file (defaults to ./yuna.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    auth_url: Option<String>,
    #[arg(long)]
    token_file: Option<PathBuf>,
    #[arg(long)]
    persona: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = &args.backend_url {
        settings.backend_base_url = normalize_base_url(url).context("--backend-url")?;
    }
    if let Some(url) = &args.auth_url {
        settings.auth_base_url = normalize_base_url(url).context("--auth-url")?;
    }
    if let Some(path) = args.token_file {
        settings.token_path = path;
    }
    if let Some(persona) = &args.persona {
        settings.default_persona = Persona::new(persona.as_str());
    }
    tracing::debug!(?settings, "loaded settings");

    let session = SessionManager::new(
        settings.auth_base_url.clone(),
        Arc::new(FileTokenStore::new(&settings.token_path)),
    );
    let view = Arc::new(TerminalView::new());
    let chat = ChatDispatcher::from_settings(Arc::clone(&session), view.clone(), &settings);
    let auth = AuthClient::new(Arc::clone(&session));
    let speech = SpeechBridge::new(None, Arc::clone(&chat), view.clone());
    let mut form = AuthForm::default();

    spawn_reset_listener(&session, &chat);

    if !session.is_logged_in() {
        print_auth_prompt(&form);
    }
    println!("persona: {} (type /help for commands)", chat.persona());

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        match command {
            Command::Send(text) => {
                chat.dispatch(&text, DispatchOrigin::Typed);
            }
            Command::Login { email, password } => {
                form.mode = AuthMode::Login;
                form.email = email;
                form.password = password;
                submit(&auth, &mut form).await;
            }
            Command::Signup {
                username,
                email,
                password,
            } => {
                form.mode = AuthMode::Signup;
                form.username = username;
                form.email = email;
                form.password = password;
                submit(&auth, &mut form).await;
            }
            Command::ToggleMode => {
                form.toggle_mode();
                print_auth_prompt(&form);
            }
            Command::Logout => session.logout(),
            Command::Persona(None) => {
                println!(
                    "persona: {} (known: {})",
                    chat.persona(),
                    KNOWN_PERSONAS.join(", ")
                );
            }
            Command::Persona(Some(name)) => {
                let persona = chat.select_persona(&name);
                println!("persona set to {persona}");
            }
            Command::Voice(transcript) => {
                speech.handle_event(SpeechEvent::Result(transcript));
            }
            Command::Reset => chat.reset(),
            Command::Google => println!("open {} to sign in with Google", auth.google_auth_url()),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    Ok(())
}

async fn submit(auth: &AuthClient, form: &mut AuthForm) {
    match auth.submit(form).await {
        Ok(outcome) => {
            println!("** {}", outcome.notice());
            // Signup flips the form back to sign in.
            if outcome == AuthOutcome::SignedUp {
                print_auth_prompt(form);
            }
        }
        Err(err) => println!("** {}", err.user_message()),
    }
}

fn print_auth_prompt(form: &AuthForm) {
    let labels = form.labels();
    println!("== {}: {}", labels.title, labels.subtitle);
    match form.mode {
        AuthMode::Login => println!("   /login <email> <password>"),
        AuthMode::Signup => println!("   /signup <username> <email> <password>"),
    }
    println!(
        "   {} /mode to {}",
        labels.switch_prompt,
        labels.switch.to_lowercase()
    );
}

/// A cleared session discards the chat, like reloading the page.
fn spawn_reset_listener(session: &Arc<SessionManager>, chat: &Arc<ChatDispatcher>) {
    let mut events = session.subscribe_events();
    let chat = Arc::clone(chat);
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Reset) => {
                    chat.reset();
                    print_auth_prompt(&AuthForm::default());
                }
                Ok(event) => tracing::debug!(?event, "session event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session events lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
