//! Chat application module for playing the game interactively.
//!
//! This module provides the session router behind the `ctf-chat` REPL. It supports:
//!
//! - Streaming chat replies with a cold-start notice
//! - Server-side slash commands with stage tracking
//! - Client-side commands for session export, import and restart
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Session state and routing of input to the server
//! - [`commands`]: Input routing and client-side command parsing

mod commands;
mod config;
mod session;

pub use commands::{COMMAND_MARKER, LocalCommand, Route, help_text, parse_local_command, route};
pub use config::{ChatArgs, ChatConfig, DEFAULT_USER_NAME};
pub use session::{ChatSession, Reply, SESSION_EXPIRED_NOTICE, default_export_path};
