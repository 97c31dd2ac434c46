use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    commands::{command_definition, open_in_browser, wrap_handler, SEARCH_FROM_INPUT},
    host::UiScope,
    state::{AppContext, CommandDefinition, CommandHandler, CommandKind},
};

pub const INPUT_CAPTION: &str = "Search Sourcegraph for";

pub fn definition() -> (CommandDefinition, CommandHandler) {
    (
        command_definition(
            SEARCH_FROM_INPUT,
            "Prompt for a query and open Sourcegraph search results",
            CommandKind::Window,
        ),
        wrap_handler(handle),
    )
}

// Only confirmation matters; the panel does not search as the user types.
async fn handle(context: Arc<AppContext>, scope: UiScope) -> Result<()> {
    let Some(input) = scope.host.show_input_panel(INPUT_CAPTION, "") else {
        debug!(target: "sourcegraph_commands", "search input cancelled");
        return Ok(());
    };

    let query = input.trim();
    if query.is_empty() {
        debug!(target: "sourcegraph_commands", "empty search input ignored");
        return Ok(());
    }

    let url = context.client.search_url(query);
    info!(target: "sourcegraph_commands", query, url = %url, "opening search");
    open_in_browser(&scope, &url);
    Ok(())
}
