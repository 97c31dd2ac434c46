//! Symbol popup for the selection.
//!
//! Each selection moves through two stages. While *fetching*, a background
//! worker requests `/api/assist/info` and parses the JSON list. When it is
//! done, the *display* stage runs on the UI thread, shows the choices and
//! opens the picked symbol. Fetch and parse failures end the flow without a
//! popup; only a failed fetch is reported to the user.

use std::sync::Arc;

use anyhow::Result;
use sourcegraph_client::{parse_symbols, AssistEndpoint, ClientError, SymbolResult};
use tracing::{debug, error, info, warn};

use crate::{
    commands::{command_definition, open_in_browser, search_request, wrap_handler, SHOW_INFO},
    dispatch::UiTask,
    host::UiScope,
    state::{AppContext, CommandDefinition, CommandHandler, CommandKind},
};

pub const NO_RESULTS_PLACEHOLDER: &str = "(no results found)";
pub const FETCH_FAILURE_MESSAGE: &str = "Can't fetch results from the Sourcegraph API: \
the direct request failed and the fallback command failed too.";
pub const DIRECT_FAILURE_MESSAGE: &str = "Can't fetch results from the Sourcegraph API.";

pub fn definition() -> (CommandDefinition, CommandHandler) {
    (
        command_definition(
            SHOW_INFO,
            "Show matching Sourcegraph symbols for each selection in a popup",
            CommandKind::Text,
        ),
        wrap_handler(handle),
    )
}

async fn handle(context: Arc<AppContext>, scope: UiScope) -> Result<()> {
    for selection in scope.host.selections() {
        let request = search_request(&context, &scope, selection).await;
        let url = context.client.symbol_url(AssistEndpoint::Info, &request);
        debug!(target: "sourcegraph_commands", name = %request.name, url = %url, "fetching symbol info");
        context
            .ui
            .spawn_worker("show_info", fetch_symbols(context.clone(), url));
    }
    Ok(())
}

/// Background half of the flow: never touches the host, only returns the
/// UI work to schedule.
pub async fn fetch_symbols(context: Arc<AppContext>, url: String) -> Option<UiTask> {
    let body = match context.fetcher.fetch(&url).await {
        Ok(body) => body,
        Err(err) => {
            error!(target: "sourcegraph_commands", url = %url, error = %err, "failed to get symbols");
            if !err.is_fetch_failure() {
                return None;
            }
            let message = fetch_failure_message(&err);
            return Some(Box::new(move |scope: &UiScope| {
                scope.host.error_message(&message);
            }));
        }
    };

    match parse_symbols(&body) {
        Ok(symbols) => {
            info!(target: "sourcegraph_commands", count = symbols.len(), "received symbols");
            Some(Box::new(move |scope: &UiScope| {
                display(&context, scope, &symbols);
            }))
        }
        Err(err) => {
            error!(target: "sourcegraph_commands", url = %url, error = %err, "failed to parse symbols");
            None
        }
    }
}

/// Dialog text for a fetch that produced no body. The fallback is only
/// mentioned when it actually ran.
pub fn fetch_failure_message(err: &ClientError) -> String {
    let summary = if err.is_fallback_failure() {
        FETCH_FAILURE_MESSAGE
    } else {
        DIRECT_FAILURE_MESSAGE
    };
    format!("{summary}\n\n{err}")
}

/// Popup labels for `symbols`; a lone placeholder when there are none.
pub fn info_choices(symbols: &[SymbolResult]) -> Vec<String> {
    if symbols.is_empty() {
        return vec![NO_RESULTS_PLACEHOLDER.to_string()];
    }
    symbols.iter().map(SymbolResult::label).collect()
}

fn display(context: &AppContext, scope: &UiScope, symbols: &[SymbolResult]) {
    let choices = info_choices(symbols);
    let picked = if scope.host.supports_popup_menu() {
        scope.host.show_popup_menu(&choices)
    } else {
        debug!(target: "sourcegraph_commands", "popup menu unavailable; using quick panel");
        scope.host.show_quick_panel(&choices)
    };
    on_pick(context, scope, symbols, picked);
}

fn on_pick(
    context: &AppContext,
    scope: &UiScope,
    symbols: &[SymbolResult],
    picked: Option<usize>,
) {
    let Some(index) = picked else {
        return;
    };
    // The placeholder is the only choice when there are no symbols.
    if symbols.is_empty() {
        return;
    }
    let Some(symbol) = symbols.get(index) else {
        warn!(target: "sourcegraph_commands", index, count = symbols.len(), "picked index out of range");
        return;
    };

    let url = context.client.symbol_page_url(symbol);
    info!(target: "sourcegraph_commands", symbol = %symbol.specific_path, url = %url, "opening symbol page");
    open_in_browser(scope, &url);
}
