use serde::{Deserialize, Serialize};

/// Separator placed between a symbol's qualified path and its repository in
/// popup labels.
pub const LABEL_SEPARATOR: &str = "   \u{2014}   ";

/// Query sent to the `/api/assist/*` endpoints for one editor selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub name: String,
    pub lang: String,
    pub libs: String,
}

impl SearchRequest {
    pub fn new(
        name: impl Into<String>,
        lang: impl Into<String>,
        libs: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            libs: libs.into(),
        }
    }
}

/// One entry of the JSON array returned by `/api/assist/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub repo: String,
    pub lang: String,
    pub path: String,
    #[serde(rename = "specificPath")]
    pub specific_path: String,
    #[serde(rename = "typeExpr", default, skip_serializing_if = "Option::is_none")]
    pub type_expr: Option<String>,
}

impl SymbolResult {
    /// Human-readable popup label: `{specificPath}{typeExpr}   —   {repo}`.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{}{}{LABEL_SEPARATOR}{}",
            self.specific_path,
            self.type_expr.as_deref().unwrap_or_default(),
            self.repo
        )
    }
}

/// Parses an info response body into symbol results.
pub fn parse_symbols(body: &str) -> Result<Vec<SymbolResult>, serde_json::Error> {
    serde_json::from_str(body)
}
