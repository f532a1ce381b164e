//! Interactive client for the CTF chat game.
//!
//! # Usage
//!
//! ```bash
//! # Play against a local server
//! ctf-chat --name mallory
//!
//! # Play against a deployed server over a live event stream
//! ctf-chat --base-url https://ctf.example.com --push
//!
//! # Keep a JSON-lines record of everything the server said
//! ctf-chat --log ctf.jsonl
//! ```
//!
//! # Commands
//!
//! - `/hint`, `/stage`, `/submit <flag>`, `/reset`, `/help` - answered by the server
//! - `/export [file]`, `/import <file>` - save or restore the session
//! - `/session`, `/new [name]` - show or restart the session
//! - `/quit` - Exit the application

use std::sync::{Arc, Mutex, PoisonError};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use ctf_client::chat::{
    ChatArgs, ChatConfig, ChatSession, LocalCommand, SESSION_EXPIRED_NOTICE, default_export_path,
    help_text, parse_local_command,
};
use ctf_client::{CtfClient, Error, JsonLinesLogger, PlainTextRenderer, Renderer, Session};

/// Main entry point for the ctf-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("ctf-chat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;

    let mut client = CtfClient::new(config.client.clone())?;
    if let Some(path) = &config.log_path {
        client = client.with_logger(Arc::new(JsonLinesLogger::open(path)?));
    }
    let mut chat = ChatSession::new(client);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Each reply gets a fresh token; Ctrl+C cancels whichever one is current.
    let cancel = Arc::new(Mutex::new(CancellationToken::new()));
    let handler_cancel = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    })?;

    println!(
        "CTF Chat ({}, {} transport)",
        chat.client().base_url(),
        config.client.transport
    );
    for line in help_text().lines() {
        println!("    {line}");
    }
    println!();

    match chat.start(&config.user_name).await {
        Ok(session) => print_session(&mut renderer, session),
        Err(err) => report(&mut renderer, &err),
    }

    loop {
        let readline = rl.readline("> ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_local_command(line) {
                    match cmd {
                        LocalCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        LocalCommand::Session => match chat.session() {
                            Some(session) => print_session(&mut renderer, session),
                            None => renderer.print_info("No active session. Use /new to start one."),
                        },
                        LocalCommand::New(name) => {
                            let name = name.unwrap_or_else(|| config.user_name.clone());
                            match chat.start(&name).await {
                                Ok(session) => print_session(&mut renderer, session),
                                Err(err) => report(&mut renderer, &err),
                            }
                        }
                        LocalCommand::Export(path) => {
                            let path = path.map(Into::into).unwrap_or_else(default_export_path);
                            match chat.save_export_to(&path).await {
                                Ok(()) => renderer
                                    .print_info(&format!("Session exported to {}", path.display())),
                                Err(err) => report(&mut renderer, &err),
                            }
                        }
                        LocalCommand::Import(path) => match chat.import_from(&path).await {
                            Ok(info) => {
                                renderer.print_info(
                                    info.message.as_deref().unwrap_or("Session imported."),
                                );
                                if let Some(session) = chat.session() {
                                    print_session(&mut renderer, session);
                                }
                            }
                            Err(err) => report(&mut renderer, &err),
                        },
                        LocalCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                if chat.session().is_none() {
                    renderer.print_error("No active session. Use /new to start one.");
                    continue;
                }

                let token = {
                    let mut current = cancel.lock().unwrap_or_else(PoisonError::into_inner);
                    *current = CancellationToken::new();
                    current.clone()
                };
                if let Err(err) = chat.send(line, &mut renderer, &token).await {
                    report(&mut renderer, &err);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn print_session(renderer: &mut dyn Renderer, session: &Session) {
    renderer.print_info(&format!(
        "Playing as {} (session {})",
        session.user_name, session.session_id
    ));
    renderer.print_stage(session.current_stage);
}

fn report(renderer: &mut dyn Renderer, err: &Error) {
    if err.is_abort() {
        // The renderer has already shown the interruption.
        return;
    }
    if err.is_session_expired() {
        renderer.print_error(SESSION_EXPIRED_NOTICE);
    } else {
        renderer.print_error(&err.to_string());
    }
}
