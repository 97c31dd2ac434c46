use std::sync::Arc;

use anyhow::Result;
use sourcegraph_client::AssistEndpoint;
use tracing::info;

use crate::{
    commands::{
        command_definition, open_in_browser, search_request, wrap_handler, SEARCH_SELECTION,
    },
    host::UiScope,
    state::{AppContext, CommandDefinition, CommandHandler, CommandKind},
};

pub fn definition() -> (CommandDefinition, CommandHandler) {
    (
        command_definition(
            SEARCH_SELECTION,
            "Open the best Sourcegraph match for each selection (or the word under the caret)",
            CommandKind::Text,
        ),
        wrap_handler(handle),
    )
}

async fn handle(context: Arc<AppContext>, scope: UiScope) -> Result<()> {
    for selection in scope.host.selections() {
        let request = search_request(&context, &scope, selection).await;
        let url = context.client.symbol_url(AssistEndpoint::Goto, &request);
        info!(target: "sourcegraph_commands", name = %request.name, url = %url, "opening symbol search");
        open_in_browser(&scope, &url);
    }
    Ok(())
}
