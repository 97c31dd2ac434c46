use std::sync::Arc;

use anyhow::Result;

pub mod commands;
pub mod context;
pub mod dispatch;
pub mod executor;
pub mod host;
pub mod settings;
pub mod state;

use dispatch::{ui_channel, UiDispatcher};
use host::UiScope;
use settings::PluginSettings;
use state::AppContext;
use tracing::{debug, info};

pub use executor::{CommandExecutor, CommandExecutorBuilder, CommandExecutorError};

/// Command executor plus the dispatcher that runs their deferred UI work.
pub struct CoreRuntime {
    executor: CommandExecutor,
    dispatcher: UiDispatcher,
}

impl CoreRuntime {
    pub fn executor(&self) -> CommandExecutor {
        self.executor.clone()
    }

    pub fn dispatcher(&mut self) -> &mut UiDispatcher {
        &mut self.dispatcher
    }

    /// Executes `name` and then waits until every worker it started has been
    /// handled on the calling task.
    pub async fn invoke(
        &mut self,
        name: &str,
        scope: &UiScope,
    ) -> Result<(), CommandExecutorError> {
        self.executor.execute(name, scope.clone()).await?;
        let ran = self.dispatcher.run_until_idle(scope).await;
        debug!(target: "sourcegraph_core", command = name, ui_tasks = ran, "command settled");
        Ok(())
    }
}

pub async fn bootstrap(settings: PluginSettings) -> Result<CoreRuntime> {
    let (ui, dispatcher) = ui_channel();
    let context = Arc::new(AppContext::new(settings, ui));
    bootstrap_with(context, dispatcher).await
}

/// Like [`bootstrap`] for callers that assembled the context themselves.
pub async fn bootstrap_with(
    context: Arc<AppContext>,
    dispatcher: UiDispatcher,
) -> Result<CoreRuntime> {
    commands::register_commands(context.clone()).await;

    info!(
        target: "sourcegraph_core",
        base_url = %context.settings.base_url,
        language = %context.settings.language,
        "Sourcegraph commands registered"
    );

    let executor = CommandExecutor::builder(context).build();
    Ok(CoreRuntime {
        executor,
        dispatcher,
    })
}
