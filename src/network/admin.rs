//! Administrative Commands
//!
//! Overrides and diagnostics for the command-dispatch collaborator. Every
//! command bypasses validation and is only accepted from configured admins.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::core::post::{AuthorId, Post, PostId};
use crate::game::state::StateSnapshot;
use crate::network::platform::PlatformError;
use crate::network::session::{CountingSession, SessionError};
use crate::VERSION;

/// Command parse errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminError {
    /// Unknown command name.
    #[error("Unknown command {0}")]
    UnknownCommand(String),

    /// Command needs an argument.
    #[error("Command {0} needs an argument")]
    MissingArgument(&'static str),

    /// Argument is not a non-negative integer.
    #[error("Not a number: {0}")]
    NotANumber(String),
}

/// An administrative command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    /// Set the current number
    OverrideCurrent(u64),
    /// Set the best streak
    OverrideBest(u64),
    /// Move the reset anchor to a post
    OverrideLastResetAnchor(PostId),
    /// Dump the state as JSON
    PrintState,
    /// Report the crate version
    Version,
}

impl AdminCommand {
    /// Parse a command by name and optional argument.
    pub fn parse(name: &str, arg: Option<&str>) -> Result<Self, AdminError> {
        let number = |command: &'static str| -> Result<u64, AdminError> {
            let raw = arg.map(str::trim).ok_or(AdminError::MissingArgument(command))?;
            raw.parse()
                .map_err(|_| AdminError::NotANumber(raw.to_string()))
        };

        match name {
            "override-current" => Ok(AdminCommand::OverrideCurrent(number("override-current")?)),
            "override-best" => Ok(AdminCommand::OverrideBest(number("override-best")?)),
            "override-last-reset-anchor" => arg
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| AdminCommand::OverrideLastResetAnchor(PostId::new(id)))
                .ok_or(AdminError::MissingArgument("override-last-reset-anchor")),
            "print-state" => Ok(AdminCommand::PrintState),
            "version" => Ok(AdminCommand::Version),
            other => Err(AdminError::UnknownCommand(other.to_string())),
        }
    }
}

/// Reply to an administrative command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminReply {
    /// Command was carried out
    pub accepted: bool,
    /// Text for the invoker
    pub text: String,
}

impl AdminReply {
    fn accepted(text: impl Into<String>) -> Self {
        Self {
            accepted: true,
            text: text.into(),
        }
    }

    fn refused(text: impl Into<String>) -> Self {
        Self {
            accepted: false,
            text: text.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrintedState<'a> {
    #[serde(flatten)]
    state: StateSnapshot,
    unique_users: usize,
    window: Vec<WindowEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WindowEntry<'a> {
    id: &'a PostId,
    author_id: &'a AuthorId,
    content: &'a str,
    is_system_authored: bool,
}

impl<'a> From<&'a Post> for WindowEntry<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            id: &post.id,
            author_id: &post.author_id,
            content: &post.content,
            is_system_authored: post.is_system_authored,
        }
    }
}

impl CountingSession {
    /// Run an administrative command for `invoker`.
    pub async fn handle_admin(
        &mut self,
        invoker: AuthorId,
        command: AdminCommand,
    ) -> Result<AdminReply, SessionError> {
        if !self.config.is_admin(&invoker) {
            info!("Refused {:?} from non-admin {}", command, invoker);
            return Ok(AdminReply::refused("You are not allowed to use this command"));
        }

        info!("Admin {} issued {:?}", invoker, command);
        let reply = match command {
            AdminCommand::OverrideCurrent(number) => {
                self.state.override_current(number).await;
                self.publish_status().await;
                AdminReply::accepted(format!("Number overridden to {}", number))
            }
            AdminCommand::OverrideBest(best) => {
                self.state.override_best(best).await;
                self.publish_status().await;
                AdminReply::accepted(format!("Best overridden to {}", best))
            }
            AdminCommand::OverrideLastResetAnchor(id) => {
                match self.platform.fetch_post(&self.config.channel_id, &id).await {
                    Ok(post) => {
                        self.state.override_anchor(id.clone(), post.created_at).await;
                        AdminReply::accepted(format!("Reset anchor moved to {}", id))
                    }
                    Err(PlatformError::PostNotFound(_)) => {
                        AdminReply::refused(format!("Post {} not found", id))
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            AdminCommand::PrintState => AdminReply::accepted(self.print_state()),
            AdminCommand::Version => AdminReply::accepted(VERSION),
        };
        Ok(reply)
    }

    /// JSON snapshot of state and window.
    pub fn print_state(&self) -> String {
        let posts = self.window.snapshot();
        let printed = PrintedState {
            state: self.state.snapshot(),
            unique_users: self.config.unique_users,
            window: posts.iter().map(WindowEntry::from).collect(),
        };
        serde_json::to_string_pretty(&printed).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}
