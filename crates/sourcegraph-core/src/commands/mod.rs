use std::{future::Future, sync::Arc};

use sourcegraph_client::SearchRequest;
use tracing::warn;

use crate::{
    host::{Selection, UiScope},
    state::{AppContext, CommandDefinition, CommandEntry, CommandHandler},
};

pub mod search_from_input;
pub mod search_selection;
pub mod show_info;

pub use show_info::{info_choices, NO_RESULTS_PLACEHOLDER};

pub const SEARCH_SELECTION: &str = "sourcegraph_search_selection";
pub const SHOW_INFO: &str = "sourcegraph_show_info";
pub const SEARCH_FROM_INPUT: &str = "sourcegraph_search_from_input";

pub async fn register_commands(context: Arc<AppContext>) {
    let registry = context.commands.clone();
    for (definition, handler) in [
        search_selection::definition(),
        show_info::definition(),
        search_from_input::definition(),
    ] {
        registry.insert(CommandEntry { definition, handler }).await;
    }
}

pub(crate) fn wrap_handler<F, Fut>(func: F) -> CommandHandler
where
    F: Fn(Arc<AppContext>, UiScope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |context, scope| Box::pin(func(context, scope)))
}

pub(crate) fn command_definition(
    name: &str,
    description: &str,
    kind: crate::state::CommandKind,
) -> CommandDefinition {
    CommandDefinition {
        name: name.to_string(),
        description: description.to_string(),
        kind,
    }
}

/// Builds the assist query for one selection. An empty selection searches
/// the word under the caret.
pub(crate) async fn search_request(
    context: &AppContext,
    scope: &UiScope,
    selection: Selection,
) -> SearchRequest {
    let selection = if selection.is_empty() {
        scope.host.word(selection)
    } else {
        selection
    };
    let name = scope.host.substr(selection);
    let libs = context
        .resolver
        .resolve_libraries(scope.host.file_name().as_deref())
        .await;
    SearchRequest::new(name, context.settings.language.clone(), libs)
}

pub(crate) fn open_in_browser(scope: &UiScope, url: &str) {
    if let Err(error) = scope.browser.open_new_tab(url) {
        warn!(target: "sourcegraph_commands", url, error = %error, "failed to open browser");
    }
}
