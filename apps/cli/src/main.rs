use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indicatif::ProgressBar;
use progress::spinner;
use sourcegraph_core::{
    bootstrap,
    commands::{SEARCH_FROM_INPUT, SEARCH_SELECTION, SHOW_INFO},
    host::{Browser, Selection, UiScope},
    settings::PluginSettings,
    state::{CommandDefinition, CommandKind},
    CommandExecutorError, CoreRuntime,
};
use terminal::{PrintBrowser, SystemBrowser, TerminalHost};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "sourcegraph",
    version,
    about = "Look up the code under your cursor on Sourcegraph from the shell."
)]
struct Cli {
    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Disable ANSI colors in log output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical CLI output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators while requests are in flight.
    #[arg(long, global = true)]
    no_progress: bool,
    /// Print URLs to stdout instead of launching a browser.
    #[arg(long, global = true)]
    print_urls: bool,
    /// Behave like a host without popup menus and pick from a quick panel.
    #[arg(long, global = true)]
    quick_panel: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Open the best match for each selection in the browser.
    SearchSelection(BufferArgs),
    /// List matching symbols for each selection and open the one picked.
    ShowInfo(BufferArgs),
    /// Prompt for a query and open the search page.
    SearchFromInput,
    /// List registered editor commands.
    Commands,
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args, Clone)]
struct BufferArgs {
    /// File loaded as the active buffer.
    #[arg(long)]
    file: PathBuf,
    /// Byte range to search, written START:END (may be repeated).
    #[arg(long = "select", value_parser = parse_selection)]
    selections: Vec<Selection>,
    /// Caret byte offset; the word under it is searched (may be repeated).
    #[arg(long = "at")]
    carets: Vec<usize>,
}

impl BufferArgs {
    fn selections(&self) -> Vec<Selection> {
        let mut selections = self.selections.clone();
        selections.extend(self.carets.iter().copied().map(Selection::caret));
        if selections.is_empty() {
            selections.push(Selection::caret(0));
        }
        selections
    }
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if let Command::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "sourcegraph", &mut std::io::stdout());
        return Ok(());
    }

    let settings = PluginSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    let mut runtime = bootstrap(settings).await?;

    match &cli.command {
        Command::SearchSelection(args) => {
            let host = TerminalHost::from_file(&args.file, args.selections(), !cli.quick_panel)?;
            run_command(&mut runtime, &cli, SEARCH_SELECTION, host).await
        }
        Command::ShowInfo(args) => {
            let host = TerminalHost::from_file(&args.file, args.selections(), !cli.quick_panel)?;
            run_command(&mut runtime, &cli, SHOW_INFO, host).await
        }
        Command::SearchFromInput => {
            let host = TerminalHost::window(!cli.quick_panel);
            run_command(&mut runtime, &cli, SEARCH_FROM_INPUT, host).await
        }
        Command::Commands => {
            let definitions = runtime.executor().list_commands().await;
            if cli.quiet {
                return Ok(());
            }
            for definition in &definitions {
                println!("{}", command_line(definition));
            }
            Ok(())
        }
        Command::Completions { .. } => Ok(()),
    }
}

async fn run_command(
    runtime: &mut CoreRuntime,
    cli: &Cli,
    name: &str,
    host: TerminalHost,
) -> Result<()> {
    let browser: Arc<dyn Browser> = if cli.print_urls {
        Arc::new(PrintBrowser)
    } else {
        Arc::new(SystemBrowser)
    };
    let scope = UiScope::new(Arc::new(host), browser);

    match runtime.executor().execute(name, scope.clone()).await {
        Ok(()) => {}
        Err(CommandExecutorError::UnknownCommand(_)) => bail!("unknown command: {name}"),
        Err(CommandExecutorError::Execution { source, .. }) => {
            return Err(source.context(format!("command `{name}` failed")));
        }
    }

    let dispatcher = runtime.dispatcher();
    loop {
        let pending = dispatcher.pending();
        let progress = if pending > 0 {
            spinner(
                cli.progress_enabled(),
                format!("Waiting for {pending} Sourcegraph request(s)..."),
            )
        } else {
            None
        };
        let completion = dispatcher.next_completion().await;
        finish_spinner(progress);
        let Some(completion) = completion else {
            break;
        };
        debug!(target: "sourcegraph_cli", worker = completion.worker(), "worker finished");
        completion.run(&scope);
    }
    Ok(())
}

fn command_line(definition: &CommandDefinition) -> String {
    let kind = match definition.kind {
        CommandKind::Text => "text",
        CommandKind::Window => "window",
    };
    format!("{} ({kind}): {}", definition.name, definition.description)
}

fn parse_selection(raw: &str) -> Result<Selection, String> {
    let (start, end) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got `{raw}`"))?;
    let start = start
        .trim()
        .parse::<usize>()
        .map_err(|error| format!("invalid start offset `{start}`: {error}"))?;
    let end = end
        .trim()
        .parse::<usize>()
        .map_err(|error| format!("invalid end offset `{end}`: {error}"))?;
    Ok(Selection::new(start, end))
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sourcegraph_cli=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>) {
    if let Some(progress) = spinner {
        progress.finish_and_clear();
    }
}

mod terminal {
    use std::{
        fs,
        io::{self, BufRead, Write},
        path::{Path, PathBuf},
        process::{Command, Stdio},
    };

    use anyhow::{Context, Result};
    use sourcegraph_core::host::{Browser, EditorHost, Selection, TextBuffer};

    /// Editor host backed by a file on disk and prompts on stderr/stdin.
    pub struct TerminalHost {
        buffer: TextBuffer,
        popup: bool,
    }

    impl TerminalHost {
        pub fn from_file(path: &Path, selections: Vec<Selection>, popup: bool) -> Result<Self> {
            let path = fs::canonicalize(path)
                .with_context(|| format!("failed to resolve {}", path.display()))?;
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(Self {
                buffer: TextBuffer::new(Some(path), text, selections),
                popup,
            })
        }

        pub fn window(popup: bool) -> Self {
            Self {
                buffer: TextBuffer::default(),
                popup,
            }
        }

        fn choose(&self, title: &str, items: &[String]) -> Option<usize> {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "{title}");
            for (index, item) in items.iter().enumerate() {
                let _ = writeln!(stderr, "  {:>2}. {item}", index + 1);
            }
            let _ = write!(stderr, "Pick a number (empty to cancel): ");
            let _ = stderr.flush();
            drop(stderr);

            read_line().and_then(|line| parse_choice(&line, items.len()))
        }
    }

    impl EditorHost for TerminalHost {
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
            self.popup
        }

        fn show_popup_menu(&self, items: &[String]) -> Option<usize> {
            self.choose("Sourcegraph symbols:", items)
        }

        fn show_quick_panel(&self, items: &[String]) -> Option<usize> {
            self.choose("Sourcegraph (quick panel):", items)
        }

        fn show_input_panel(&self, caption: &str, initial_text: &str) -> Option<String> {
            let mut stderr = io::stderr().lock();
            let _ = write!(stderr, "{caption}: {initial_text}");
            let _ = stderr.flush();
            drop(stderr);
            read_line().map(|line| format!("{initial_text}{line}"))
        }

        fn error_message(&self, message: &str) {
            eprintln!("error: {message}");
        }
    }

    /// `None` on end of input, which hosts treat as a cancel.
    fn read_line() -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    /// Maps a 1-based answer onto an item index.
    pub fn parse_choice(line: &str, count: usize) -> Option<usize> {
        let number = line.trim().parse::<usize>().ok()?;
        (1..=count).contains(&number).then(|| number - 1)
    }

    /// Hands URLs to the platform's default browser.
    pub struct SystemBrowser;

    impl Browser for SystemBrowser {
        fn open_new_tab(&self, url: &str) -> io::Result<()> {
            let mut command = if cfg!(target_os = "macos") {
                Command::new("open")
            } else if cfg!(windows) {
                let mut command = Command::new("cmd");
                command.args(["/C", "start", ""]);
                command
            } else {
                Command::new("xdg-open")
            };

            let status = command
                .arg(url)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()?;
            if status.success() {
                Ok(())
            } else {
                Err(io::Error::other(format!("browser launcher exited with {status}")))
            }
        }
    }

    pub struct PrintBrowser;

    impl Browser for PrintBrowser {
        fn open_new_tab(&self, url: &str) -> io::Result<()> {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{url}")?;
            stdout.flush()
        }
    }

}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    pub fn spinner(message_enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !message_enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(80));
        Some(progress)
    }
}
