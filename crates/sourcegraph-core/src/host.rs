//! Seams between the commands and the editor they run in.
//!
//! Hosts are only ever called from the UI dispatcher's thread; background
//! workers never receive a [`UiScope`].

use std::{path::PathBuf, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word regex"));

/// A half-open byte range into the active buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn caret(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// UI primitives a text editor exposes to the commands.
pub trait EditorHost: Send + Sync {
    /// Path of the file backing the active buffer, `None` for unsaved buffers.
    fn file_name(&self) -> Option<PathBuf>;
    fn selections(&self) -> Vec<Selection>;
    /// Expands `selection` to the word that encloses or touches it.
    fn word(&self, selection: Selection) -> Selection;
    fn substr(&self, selection: Selection) -> String;

    /// Older hosts only offer a quick panel.
    fn supports_popup_menu(&self) -> bool {
        true
    }
    /// Returns the picked index, or `None` when the user dismissed the menu.
    fn show_popup_menu(&self, items: &[String]) -> Option<usize>;
    fn show_quick_panel(&self, items: &[String]) -> Option<usize>;
    /// Returns the confirmed text, or `None` when the panel was cancelled.
    fn show_input_panel(&self, caption: &str, initial_text: &str) -> Option<String>;
    fn error_message(&self, message: &str);
}

pub trait Browser: Send + Sync {
    fn open_new_tab(&self, url: &str) -> std::io::Result<()>;
}

/// Handles available to code running on the UI thread.
#[derive(Clone)]
pub struct UiScope {
    pub host: Arc<dyn EditorHost>,
    pub browser: Arc<dyn Browser>,
}

impl UiScope {
    pub fn new(host: Arc<dyn EditorHost>, browser: Arc<dyn Browser>) -> Self {
        Self { host, browser }
    }
}

/// In-memory buffer used by hosts that do not have a native text model.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    pub path: Option<PathBuf>,
    pub text: String,
    pub selections: Vec<Selection>,
}

impl TextBuffer {
    pub fn new(path: Option<PathBuf>, text: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self {
            path,
            text: text.into(),
            selections,
        }
    }

    pub fn word(&self, selection: Selection) -> Selection {
        WORD.find_iter(&self.text)
            .find(|word| word.start() <= selection.start && selection.end <= word.end())
            .map_or(selection, |word| Selection::new(word.start(), word.end()))
    }

    /// Text covered by `selection`; out-of-range or non-boundary offsets
    /// yield an empty string.
    pub fn substr(&self, selection: Selection) -> String {
        self.text
            .get(selection.start..selection.end)
            .unwrap_or_default()
            .to_string()
    }
}
