use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use sourcegraph_client::{Fetch, SourcegraphClient};
use tokio::sync::RwLock;

use crate::{
    context::ContextResolver, dispatch::UiSender, host::UiScope, settings::PluginSettings,
};

#[derive(Clone)]
pub struct AppContext {
    pub client: Arc<SourcegraphClient>,
    /// Used for every network read; defaults to `client`.
    pub fetcher: Arc<dyn Fetch>,
    pub resolver: Arc<ContextResolver>,
    pub settings: Arc<PluginSettings>,
    pub commands: Arc<CommandRegistry>,
    pub ui: UiSender,
}

impl AppContext {
    pub fn new(settings: PluginSettings, ui: UiSender) -> Self {
        let client = Arc::new(SourcegraphClient::with_config(settings.client_config()));
        Self {
            fetcher: client.clone(),
            client,
            resolver: Arc::new(ContextResolver::new(settings.resolver_config())),
            settings: Arc::new(settings),
            commands: Arc::new(CommandRegistry::default()),
            ui,
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }
}

/// Whether a command acts on the active view or on the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Text,
    Window,
}

#[derive(Clone, Debug)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub kind: CommandKind,
}

pub type CommandFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type CommandHandler = Arc<dyn Fn(Arc<AppContext>, UiScope) -> CommandFuture + Send + Sync>;

#[derive(Clone)]
pub struct CommandEntry {
    pub definition: CommandDefinition,
    pub handler: CommandHandler,
}

#[derive(Default)]
pub struct CommandRegistry {
    entries: RwLock<HashMap<String, CommandEntry>>,
}

impl CommandRegistry {
    pub async fn insert(&self, entry: CommandEntry) {
        self.entries
            .write()
            .await
            .insert(entry.definition.name.clone(), entry);
    }

    pub async fn get(&self, name: &str) -> Option<CommandEntry> {
        self.entries.read().await.get(name).cloned()
    }

    /// Definitions ordered by command name.
    pub async fn definitions(&self) -> Vec<CommandDefinition> {
        let mut definitions: Vec<_> = self
            .entries
            .read()
            .await
            .values()
            .map(|entry| entry.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}
