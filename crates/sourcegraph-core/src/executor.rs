use std::{sync::Arc, time::Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    host::UiScope,
    state::{AppContext, CommandDefinition},
};

#[derive(Clone)]
pub struct CommandExecutor {
    context: Arc<AppContext>,
    options: ExecutorOptions,
}

#[derive(Clone)]
struct ExecutorOptions {
    log_invocations: bool,
}

#[derive(Clone)]
pub struct CommandExecutorBuilder {
    context: Arc<AppContext>,
    options: ExecutorOptions,
}

impl CommandExecutorBuilder {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            context,
            options: ExecutorOptions {
                log_invocations: true,
            },
        }
    }

    #[must_use]
    pub fn log_invocations(mut self, enabled: bool) -> Self {
        self.options.log_invocations = enabled;
        self
    }

    pub fn build(self) -> CommandExecutor {
        CommandExecutor {
            context: self.context,
            options: self.options,
        }
    }
}

impl CommandExecutor {
    pub fn builder(context: Arc<AppContext>) -> CommandExecutorBuilder {
        CommandExecutorBuilder::new(context)
    }

    pub async fn list_commands(&self) -> Vec<CommandDefinition> {
        self.context.commands.definitions().await
    }

    /// Runs the UI-side part of a command. Background work it starts is
    /// delivered through the UI dispatcher afterwards.
    pub async fn execute(&self, name: &str, scope: UiScope) -> Result<(), CommandExecutorError> {
        let Some(entry) = self.context.commands.get(name).await else {
            return Err(CommandExecutorError::UnknownCommand(name.to_string()));
        };

        let handler = entry.handler.clone();
        let started = Instant::now();
        let result = handler(self.context.clone(), scope).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                if self.options.log_invocations {
                    info!(
                        target: "sourcegraph_executor",
                        command = %name,
                        latency_ms,
                        success = true,
                        "command completed"
                    );
                }
                Ok(())
            }
            Err(source) => {
                if self.options.log_invocations {
                    warn!(
                        target: "sourcegraph_executor",
                        command = %name,
                        latency_ms,
                        error = %source,
                        "command failed"
                    );
                }
                Err(CommandExecutorError::Execution {
                    name: name.to_string(),
                    source,
                })
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandExecutorError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("command `{name}` failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
