use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use mailroom_core::{AnalyticsSink, BackupStore, FsBackupStore, MailboxKind, init_logging, log_path};
use mailroom_jmap::{EngineConfig, JmapClient, MailEngine, MailEvent, MailProvider, Session};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc::Receiver;
use tracing::{info, warn};

mod cli;
mod config_mod;
mod input_mod;
mod mailbox_mod;
mod nav_mod;
mod reduce_mod;
mod render_mod;
mod ui_theme_mod;
mod window_mod;
mod wizard_mod;

use cli::{Cli, output_error, run_cli};
use config_mod::{
    AccountSettings, AppConfig, ensure_default_config_exists, load_config, save_account,
};
use input_mod::translate_key;
use mailbox_mod::MailboxView;
use nav_mod::{MainChoice, Menu, NavMemory, Screen};
use reduce_mod::{Effect, Msg, reduce};
use ui_theme_mod::UiTheme;

const TICK_RATE: Duration = Duration::from_millis(200);
const CLI_SCHEMA_VERSION: &str = "mailroom.cli.v1";
const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) fetch_limit: usize,
    pub(crate) page_size: usize,
    pub(crate) speech: bool,
    pub(crate) backup_dir: PathBuf,
    pub(crate) log_path: PathBuf,
}

impl Settings {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            fetch_limit: config.fetch_limit,
            page_size: config.page_size,
            speech: config.speech.is_some(),
            backup_dir: config.backup_dir.clone(),
            log_path: log_path(),
        }
    }
}

/// Everything the event loop owns. Only `reduce` changes it.
#[derive(Debug, Clone)]
pub(crate) struct App {
    pub(crate) screen: Screen,
    pub(crate) memory: NavMemory,
    /// Transient line above the screen, cleared on the next navigation key.
    pub(crate) status: Option<String>,
    pub(crate) account: Option<AccountSettings>,
    pub(crate) session: Option<Session>,
    pub(crate) authenticating: bool,
    /// Bumped per sign-in request and on account replacement; other completions are stale.
    pub(crate) auth_attempt: u64,
    /// Mailbox waiting for the session before its refresh can go out.
    pub(crate) pending_mailbox: Option<MailboxKind>,
    pub(crate) mailbox: MailboxView,
    /// Bumped on every refresh; fetch completions carrying another value are stale.
    pub(crate) generation: u64,
    pub(crate) probes: Vec<(String, Result<String, String>)>,
    pub(crate) settings: Settings,
    pub(crate) spinner: usize,
}

impl App {
    pub(crate) fn new(settings: Settings, account: Option<AccountSettings>) -> Self {
        Self {
            screen: Screen::MainMenu(Menu::new(MainChoice::all(), 0)),
            memory: NavMemory::default(),
            status: None,
            account,
            session: None,
            authenticating: false,
            auth_attempt: 0,
            pending_mailbox: None,
            mailbox: MailboxView::new(MailboxKind::Inbox, settings.page_size),
            generation: 0,
            probes: Vec::new(),
            settings,
            spinner: 0,
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        let detail_loading = matches!(&self.screen, Screen::EmailDetail(view) if view.is_loading());
        self.authenticating
            || self.mailbox.loading
            || !self.mailbox.busy.is_empty()
            || detail_loading
    }

    pub(crate) fn spinner_frame(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner % SPINNER_FRAMES.len()]
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logging = init_logging();
    if cli.config.is_none() {
        if let Err(err) = ensure_default_config_exists() {
            warn!(error = %err, "config bootstrap failed");
        }
    }
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) if cli.command.is_some() => return output_error(&format!("{:#}", err)),
        Err(err) => return Err(err),
    };
    info!(logging, config = %config.path.display(), "mailroom starting");

    if let Some(command) = cli.command {
        let rt = tokio::runtime::Runtime::new()?;
        if let Err(err) = run_cli(&rt, command, &config) {
            return output_error(&format!("{:#}", err));
        }
        return Ok(());
    }
    run_tui(config)
}

fn run_tui(config: AppConfig) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let provider: Arc<dyn MailProvider> = Arc::new(JmapClient::new(config.request_timeout)?);
    let store: Arc<dyn BackupStore> = Arc::new(FsBackupStore::new(config.backup_dir.clone()));
    let analytics = config
        .analytics_enabled
        .then(|| Arc::new(AnalyticsSink::new(config.analytics_path.clone())));
    let engine_config = EngineConfig {
        provider,
        store,
        analytics,
        probes: config.probes.clone(),
        speech: config.speech.clone(),
        timeout: config.request_timeout,
    };
    let (engine, events) = rt.block_on(async { MailEngine::start(engine_config) });

    let app = App::new(Settings::from_config(&config), config.account.clone());
    let theme = UiTheme::from_name(&config.theme);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, &theme, &engine, events, &config.path);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    rt.shutdown_timeout(Duration::from_millis(200));
    res
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App,
    theme: &UiTheme,
    engine: &MailEngine,
    mut events: Receiver<MailEvent>,
    config_path: &Path,
) -> Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|frame| render_mod::ui(frame, &app, theme))?;

        // At most one engine event per iteration, then input.
        let drained = match events.try_recv() {
            Ok(event) => {
                let (next, quit) = apply(app, Msg::Engine(event), engine, config_path);
                app = next;
                if quit {
                    return Ok(());
                }
                true
            }
            Err(_) => false,
        };

        let timeout = if drained {
            Duration::ZERO
        } else {
            TICK_RATE.saturating_sub(last_tick.elapsed())
        };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if let Some(key) = translate_key(key) {
                    let (next, quit) = apply(app, Msg::Key(key), engine, config_path);
                    app = next;
                    if quit {
                        return Ok(());
                    }
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
            app = apply(app, Msg::Tick, engine, config_path).0;
        }
    }
}

/// Runs the reducer, then its effects. Effect failures come back as notices.
fn apply(app: App, msg: Msg, engine: &MailEngine, config_path: &Path) -> (App, bool) {
    let (mut app, effects) = reduce(app, msg);
    let mut quit = false;
    for effect in effects {
        match run_effect(effect, engine, config_path) {
            Ok(stop) => quit |= stop,
            Err(err) => {
                warn!(error = %err, "effect failed");
                app = reduce(app, Msg::Notice(format!("{:#}", err))).0;
            }
        }
    }
    (app, quit)
}

fn run_effect(effect: Effect, engine: &MailEngine, config_path: &Path) -> Result<bool> {
    match effect {
        Effect::Dispatch(command) => engine.send(command)?,
        Effect::SaveAccount(account) => save_account(config_path, &account)
            .with_context(|| format!("saving account to {}", config_path.display()))?,
        Effect::Quit => return Ok(true),
    }
    Ok(false)
}
