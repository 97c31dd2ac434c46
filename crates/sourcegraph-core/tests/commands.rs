use std::{
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use httpmock::prelude::*;
use sourcegraph_client::{ClientError, Fetch};
use sourcegraph_core::{
    bootstrap_with,
    commands::{
        show_info::{DIRECT_FAILURE_MESSAGE, FETCH_FAILURE_MESSAGE},
        SEARCH_FROM_INPUT, SEARCH_SELECTION, SHOW_INFO,
    },
    dispatch::ui_channel,
    host::{Browser, EditorHost, Selection, TextBuffer, UiScope},
    settings::PluginSettings,
    state::AppContext,
    CommandExecutorError, CoreRuntime,
};
use tempfile::tempdir;

const ONE_RESULT: &str = r#"[{"repo":"r1","lang":"ruby","path":"p1","specificPath":"Foo#bar"}]"#;

struct Recorder {
    buffer: TextBuffer,
    popup_supported: bool,
    pick: Option<usize>,
    input: Option<String>,
    popups: Mutex<Vec<Vec<String>>>,
    quick_panels: Mutex<Vec<Vec<String>>>,
    captions: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

impl Recorder {
    fn new(buffer: TextBuffer) -> Self {
        Self {
            buffer,
            popup_supported: true,
            pick: None,
            input: None,
            popups: Mutex::default(),
            quick_panels: Mutex::default(),
            captions: Mutex::default(),
            errors: Mutex::default(),
            opened: Mutex::default(),
        }
    }

    fn picking(mut self, pick: Option<usize>) -> Self {
        self.pick = pick;
        self
    }

    fn popups(&self) -> Vec<Vec<String>> {
        self.popups.lock().expect("popups lock").clone()
    }

    fn quick_panels(&self) -> Vec<Vec<String>> {
        self.quick_panels.lock().expect("quick panel lock").clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("errors lock").clone()
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("opened lock").clone()
    }
}

impl EditorHost for Recorder {
    fn file_name(&self) -> Option<PathBuf> {
        self.buffer.path.clone()
    }

    fn selections(&self) -> Vec<Selection> {
        self.buffer.selections.clone()
    }

    fn word(&self, selection: Selection) -> Selection {
        self.buffer.word(selection)
    }

    fn substr(&self, selection: Selection) -> String {
        self.buffer.substr(selection)
    }

    fn supports_popup_menu(&self) -> bool {
        self.popup_supported
    }

    fn show_popup_menu(&self, items: &[String]) -> Option<usize> {
        self.popups.lock().expect("popups lock").push(items.to_vec());
        self.pick
    }

    fn show_quick_panel(&self, items: &[String]) -> Option<usize> {
        self.quick_panels
            .lock()
            .expect("quick panel lock")
            .push(items.to_vec());
        self.pick
    }

    fn show_input_panel(&self, caption: &str, _initial_text: &str) -> Option<String> {
        self.captions
            .lock()
            .expect("captions lock")
            .push(caption.to_string());
        self.input.clone()
    }

    fn error_message(&self, message: &str) {
        self.errors
            .lock()
            .expect("errors lock")
            .push(message.to_string());
    }
}

impl Browser for Recorder {
    fn open_new_tab(&self, url: &str) -> std::io::Result<()> {
        self.opened
            .lock()
            .expect("opened lock")
            .push(url.to_string());
        Ok(())
    }
}

/// Serves a fixed body and remembers the URLs it was asked for.
struct StaticFetch {
    body: String,
    urls: Mutex<Vec<String>>,
}

impl StaticFetch {
    fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            urls: Mutex::default(),
        })
    }
}

#[async_trait]
impl Fetch for StaticFetch {
    async fn fetch(&self, url: &str) -> Result<String, ClientError> {
        self.urls.lock().expect("urls lock").push(url.to_string());
        Ok(self.body.clone())
    }
}

fn settings() -> PluginSettings {
    PluginSettings {
        manifest_command: vec!["false".to_string()],
        fallback_command: vec!["false".to_string()],
        ..PluginSettings::default()
    }
}

async fn runtime(settings: PluginSettings, fetcher: Option<Arc<dyn Fetch>>) -> CoreRuntime {
    let (ui, dispatcher) = ui_channel();
    let mut context = AppContext::new(settings, ui);
    if let Some(fetcher) = fetcher {
        context = context.with_fetcher(fetcher);
    }
    bootstrap_with(Arc::new(context), dispatcher)
        .await
        .expect("bootstrap succeeds")
}

fn scope(host: &Arc<Recorder>) -> UiScope {
    UiScope::new(host.clone(), host.clone())
}

fn caret_buffer(text: &str, offset: usize) -> TextBuffer {
    TextBuffer::new(None, text, vec![Selection::caret(offset)])
}

#[tokio::test]
async fn search_selection_opens_one_tab_per_selection() {
    let mut runtime = runtime(settings(), None).await;
    let host = Arc::new(Recorder::new(TextBuffer::new(
        None,
        "User.find_by(email)",
        vec![Selection::new(0, 4), Selection::caret(7)],
    )));

    runtime
        .invoke(SEARCH_SELECTION, &scope(&host))
        .await
        .expect("command succeeds");

    assert_eq!(
        host.opened(),
        vec![
            "https://sourcegraph.com/api/assist/goto?_via=sourcegraph-sublime-1&name=User&lang=ruby&libs=rails%2Cruby",
            "https://sourcegraph.com/api/assist/goto?_via=sourcegraph-sublime-1&name=find_by&lang=ruby&libs=rails%2Cruby",
        ]
    );
    assert!(host.popups().is_empty());
}

#[tokio::test]
async fn search_selection_scopes_to_manifest_dependencies() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("Gemfile"), "gem 'sinatra'\n").expect("gemfile");
    let settings = PluginSettings {
        manifest_command: vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf 'sinatra\\nrack\\n'".to_string(),
        ],
        ..settings()
    };
    let mut runtime = runtime(settings, None).await;
    let host = Arc::new(Recorder::new(TextBuffer::new(
        Some(dir.path().join("app.rb")),
        "get '/' do",
        vec![Selection::caret(0)],
    )));

    runtime
        .invoke(SEARCH_SELECTION, &scope(&host))
        .await
        .expect("command succeeds");

    let opened = host.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].contains("name=get"), "{}", opened[0]);
    assert!(opened[0].contains("libs=sinatra%2Crack"), "{}", opened[0]);
}

#[tokio::test]
async fn show_info_lists_symbols_and_opens_pick() {
    let fetcher = StaticFetch::new(ONE_RESULT);
    let mut runtime = runtime(settings(), Some(fetcher.clone())).await;
    let host = Arc::new(Recorder::new(caret_buffer("foo.bar", 5)).picking(Some(0)));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    assert_eq!(host.popups(), vec![vec!["Foo#bar   \u{2014}   r1".to_string()]]);
    assert_eq!(host.opened(), vec!["https://sourcegraph.com/r1/symbols/ruby/p1"]);
    assert!(host.errors().is_empty());

    let urls = fetcher.urls.lock().expect("urls lock").clone();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("https://sourcegraph.com/api/assist/info?"));
    assert!(urls[0].contains("name=bar"));
}

#[tokio::test]
async fn show_info_without_results_offers_inert_placeholder() {
    let mut runtime = runtime(settings(), Some(StaticFetch::new("[]"))).await;
    let host = Arc::new(Recorder::new(caret_buffer("missing_method", 0)).picking(Some(0)));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    assert_eq!(host.popups(), vec![vec!["(no results found)".to_string()]]);
    assert!(host.opened().is_empty());
}

#[tokio::test]
async fn cancelled_popup_opens_nothing() {
    let mut runtime = runtime(settings(), Some(StaticFetch::new(ONE_RESULT))).await;
    let host = Arc::new(Recorder::new(caret_buffer("bar", 0)).picking(None));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    assert_eq!(host.popups().len(), 1);
    assert!(host.opened().is_empty());
}

#[tokio::test]
async fn out_of_range_pick_is_ignored() {
    let mut runtime = runtime(settings(), Some(StaticFetch::new(ONE_RESULT))).await;
    let host = Arc::new(Recorder::new(caret_buffer("bar", 0)).picking(Some(3)));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    assert!(host.opened().is_empty());
}

#[tokio::test]
async fn hosts_without_popup_use_quick_panel() {
    let mut runtime = runtime(settings(), Some(StaticFetch::new(ONE_RESULT))).await;
    let mut recorder = Recorder::new(caret_buffer("bar", 0)).picking(Some(0));
    recorder.popup_supported = false;
    let host = Arc::new(recorder);

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    assert!(host.popups().is_empty());
    assert_eq!(host.quick_panels().len(), 1);
    assert_eq!(host.opened().len(), 1);
}

#[tokio::test]
async fn malformed_response_fails_silently() {
    let mut runtime = runtime(settings(), Some(StaticFetch::new("<html>oops</html>"))).await;
    let host = Arc::new(Recorder::new(caret_buffer("bar", 0)).picking(Some(0)));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    assert!(host.popups().is_empty());
    assert!(host.errors().is_empty());
    assert!(host.opened().is_empty());
}

#[tokio::test]
async fn failed_fallback_shows_one_error_and_no_popup() {
    let settings = PluginSettings {
        base_url: "http://127.0.0.1:9".to_string(),
        ..settings()
    };
    let mut runtime = runtime(settings, None).await;
    let host = Arc::new(Recorder::new(caret_buffer("bar", 0)).picking(Some(0)));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    let errors = host.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with(FETCH_FAILURE_MESSAGE), "{}", errors[0]);
    assert!(host.popups().is_empty());
    assert!(host.quick_panels().is_empty());
}

#[tokio::test]
async fn disabled_fallback_reports_direct_failure() {
    let settings = PluginSettings {
        base_url: "http://127.0.0.1:9".to_string(),
        fallback_command: Vec::new(),
        ..settings()
    };
    let mut runtime = runtime(settings, None).await;
    let host = Arc::new(Recorder::new(caret_buffer("bar", 0)).picking(Some(0)));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    let errors = host.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with(DIRECT_FAILURE_MESSAGE), "{}", errors[0]);
    assert!(!errors[0].contains("fallback"), "{}", errors[0]);
    assert!(host.popups().is_empty());
}

#[tokio::test]
async fn each_selection_gets_its_own_popup() {
    let mut runtime = runtime(settings(), Some(StaticFetch::new(ONE_RESULT))).await;
    let host = Arc::new(Recorder::new(TextBuffer::new(
        None,
        "alpha beta",
        vec![Selection::caret(0), Selection::caret(6)],
    )));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    assert_eq!(host.popups().len(), 2);
}

#[tokio::test]
async fn show_info_round_trips_through_http() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/assist/info")
                .query_param("_via", "sourcegraph-sublime-1")
                .query_param("name", "find")
                .query_param("lang", "ruby")
                .query_param("libs", "rails,ruby");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    r#"[{"repo":"github.com/rails/rails","lang":"ruby","path":"ActiveRecord/Base/find","specificPath":"ActiveRecord::Base.find","typeExpr":"(*args)"}]"#,
                );
        })
        .await;

    let settings = PluginSettings {
        base_url: server.base_url(),
        ..settings()
    };
    let mut runtime = runtime(settings, None).await;
    let host = Arc::new(Recorder::new(caret_buffer("User.find(1)", 6)).picking(Some(0)));

    runtime
        .invoke(SHOW_INFO, &scope(&host))
        .await
        .expect("command succeeds");

    mock.assert_async().await;
    assert_eq!(
        host.popups(),
        vec![vec![
            "ActiveRecord::Base.find(*args)   \u{2014}   github.com/rails/rails".to_string()
        ]]
    );
    assert_eq!(
        host.opened(),
        vec![format!(
            "{}/github.com/rails/rails/symbols/ruby/ActiveRecord/Base/find",
            server.base_url()
        )]
    );
}

#[tokio::test]
async fn search_from_input_opens_search_page() {
    let mut runtime = runtime(settings(), None).await;
    let mut recorder = Recorder::new(TextBuffer::default());
    recorder.input = Some("has_many through".to_string());
    let host = Arc::new(recorder);

    runtime
        .invoke(SEARCH_FROM_INPUT, &scope(&host))
        .await
        .expect("command succeeds");

    assert_eq!(
        host.captions.lock().expect("captions lock").clone(),
        vec!["Search Sourcegraph for"]
    );
    assert_eq!(
        host.opened(),
        vec!["https://sourcegraph.com/search?q=has_many%20through&_via=sourcegraph-sublime-1"]
    );
}

#[tokio::test]
async fn search_from_input_ignores_cancel_and_blank_text() {
    let mut runtime = runtime(settings(), None).await;

    let cancelled = Arc::new(Recorder::new(TextBuffer::default()));
    runtime
        .invoke(SEARCH_FROM_INPUT, &scope(&cancelled))
        .await
        .expect("command succeeds");
    assert!(cancelled.opened().is_empty());

    let mut recorder = Recorder::new(TextBuffer::default());
    recorder.input = Some("   ".to_string());
    let blank = Arc::new(recorder);
    runtime
        .invoke(SEARCH_FROM_INPUT, &scope(&blank))
        .await
        .expect("command succeeds");
    assert!(blank.opened().is_empty());
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let mut runtime = runtime(settings(), None).await;
    let host = Arc::new(Recorder::new(TextBuffer::default()));

    let error = runtime
        .invoke("sourcegraph_missing", &scope(&host))
        .await
        .expect_err("unknown command");
    assert!(matches!(error, CommandExecutorError::UnknownCommand(_)));
}
