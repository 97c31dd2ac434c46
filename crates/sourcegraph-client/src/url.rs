use std::fmt;

use urlencoding::encode;

use crate::types::{SearchRequest, SymbolResult};

/// The assist endpoints understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistEndpoint {
    /// Redirects the browser to the best match for a symbol.
    Goto,
    /// Returns a JSON array of candidate symbols.
    Info,
}

impl AssistEndpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            AssistEndpoint::Goto => "goto",
            AssistEndpoint::Info => "info",
        }
    }
}

impl fmt::Display for AssistEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{base}/api/assist/{endpoint}?_via={via}&name=..&lang=..&libs=..`
pub fn symbol_url(
    base: &str,
    via: &str,
    endpoint: AssistEndpoint,
    request: &SearchRequest,
) -> String {
    format!(
        "{}/api/assist/{endpoint}?_via={}&name={}&lang={}&libs={}",
        trim_base(base),
        encode(via),
        encode(&request.name),
        encode(&request.lang),
        encode(&request.libs),
    )
}

/// Generic search page for free-text queries.
pub fn search_url(base: &str, via: &str, query: &str) -> String {
    format!(
        "{}/search?q={}&_via={}",
        trim_base(base),
        encode(query),
        encode(via)
    )
}

/// Detail page for a symbol picked from an info popup.
pub fn symbol_page_url(base: &str, symbol: &SymbolResult) -> String {
    format!(
        "{}/{}/symbols/{}/{}",
        trim_base(base),
        encode_path(&symbol.repo),
        encode_path(&symbol.lang),
        encode_path(&symbol.path),
    )
}

fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

// Slashes stay literal so repo and symbol paths keep their hierarchy.
fn encode_path(value: &str) -> String {
    value.split('/').map(encode).collect::<Vec<_>>().join("/")
}
