use std::io::{self, stdout, Stdout};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, TryRecvError};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{backend::CrosstermBackend, Terminal};

use waypoint::app::{AppExit, LogicThread};
use waypoint::config::Config;
use waypoint::headless;
use waypoint::host::{Route, RouteParams, WorkflowHost, DISABLE_PERSISTENCE};
use waypoint::pages;
use waypoint::progress::{FileKvStore, ProgressStore};
use waypoint::render::RenderState;
use waypoint::workflow::{Destination, WorkflowContext, WorkflowId};
use waypoint::{ui, wlog, wlog_error, Error, Result};

const FRAME_DURATION: Duration = Duration::from_micros(16_666); // 60fps

/// Route opened when no command is given.
const DEFAULT_ROUTE: &str = "workflow/demo";

type Host = WorkflowHost<FileKvStore>;

/// Waypoint - resumable step-by-step workflows in the terminal
#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    WAYPOINT_DEBUG=1     Enable debug logging (alternative to --debug)\n    WAYPOINT_LOG=<level> Explicit log level (error, warn, info, debug, trace)\n    WAYPOINT_HOME=<dir>  Config, log and progress directory (default ~/.waypoint)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.waypoint/waypoint.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Progress file to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub progress_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a route, e.g. "workflow/seller-onboarding?exitTo=dashboard"
    Open {
        route: String,
    },

    /// Run a workflow by id
    Run {
        /// Workflow id (selects the page set and the progress record)
        workflow_id: String,

        /// Destination after completion or leaving the first page
        #[arg(long)]
        exit_to: Option<String>,

        /// Destination for "back" on the first page only
        #[arg(long)]
        first_back_to: Option<String>,

        /// Start from the first page and do not save progress
        #[arg(long)]
        no_persist: bool,

        /// Run without the TUI and print transitions as JSON
        #[arg(long)]
        headless: bool,

        /// Signals to send in headless mode, e.g. "next,next,back"
        #[arg(long, requires = "headless", default_value = "")]
        script: String,
    },

    /// Show stored progress
    Progress {
        /// Only this workflow
        workflow_id: Option<String>,
    },

    /// Forget stored progress
    Reset {
        /// Workflow to reset
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        workflow_id: Option<String>,

        /// Reset every workflow
        #[arg(long)]
        all: bool,
    },

    /// List the available workflows
    List,
}

impl Command {
    /// Route params for `run`; `None` for other commands.
    fn route_params(&self) -> Option<Result<RouteParams>> {
        let Command::Run {
            workflow_id,
            exit_to,
            first_back_to,
            no_persist,
            ..
        } = self
        else {
            return None;
        };
        Some(workflow_id.parse::<WorkflowId>().map(|id| RouteParams {
            workflow_id: id,
            exit_to: exit_to.as_deref().map(Destination::from),
            persist: no_persist.then(|| DISABLE_PERSISTENCE.to_string()),
            first_back_to: first_back_to.as_deref().map(Destination::from),
        }))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = Config::log_path().ok();
    waypoint::log::init(cli.debug, log_path.as_deref());
    if cli.debug {
        wlog!("Waypoint starting (debug mode enabled)");
    } else {
        wlog!("Waypoint starting");
    }

    let mut config = Config::load()?;
    if let Some(path) = &cli.progress_file {
        config.progress_file = Some(path.display().to_string());
    }
    let store = FileKvStore::new(config.progress_path()?);
    let host = Arc::new(WorkflowHost::new(Arc::new(ProgressStore::new(store)), config));

    let command = cli.command.unwrap_or(Command::Open {
        route: DEFAULT_ROUTE.to_string(),
    });

    let result = dispatch(host, &command);
    if let Err(e) = &result {
        wlog_error!("Command failed: {}", e);
        if let Some(path) = waypoint::log::log_file() {
            eprintln!("See {} for details.", path.display());
        }
    }
    result
}

fn dispatch(host: Arc<Host>, command: &Command) -> Result<()> {
    match command {
        Command::Open { route } => open(host, route.parse()?),
        Command::Run {
            headless, script, ..
        } => {
            let params = command
                .route_params()
                .ok_or_else(|| Error::Validation("not a run command".to_string()))??;
            if *headless {
                run_headless(&host, params, script)
            } else {
                open(host, Route::Workflow(params))
            }
        }
        Command::Progress { workflow_id } => run_progress(&host, workflow_id.as_deref()),
        Command::Reset { workflow_id, all } => run_reset(&host, workflow_id.as_deref(), *all),
        Command::List => run_list(&host),
    }
}

/// Open `route` in the TUI, following exit targets that are workflow routes.
fn open(host: Arc<Host>, route: Route) -> Result<()> {
    let mut params = match route {
        Route::Workflow(params) => params,
        Route::Screen(dest) => {
            println!("{}", dest);
            return Ok(());
        }
    };

    let mut terminal = setup_terminal()?;
    let result = loop {
        wlog!("Opening workflow '{}'", params.workflow_id);
        let persisted = params.persistence_enabled();
        match run_tui(&mut terminal, host.clone(), params) {
            Ok(AppExit::Navigate(dest)) => match dest.as_str().parse::<Route>() {
                Ok(Route::Workflow(next)) => params = next,
                _ => break Ok((AppExit::Navigate(dest), persisted)),
            },
            other => break other.map(|exit| (exit, persisted)),
        }
    };
    restore_terminal(&mut terminal)?;

    match result? {
        (AppExit::Quit, persisted) => println!("{}", quit_message(persisted)),
        (AppExit::Navigate(dest), _) => println!("{}", dest),
    }
    Ok(())
}

fn quit_message(persisted: bool) -> &'static str {
    if persisted {
        "Progress saved. Run the same command to resume."
    } else {
        "Progress was not saved for this run."
    }
}

/// One workflow in the TUI: logic thread plus render loop on this thread.
fn run_tui(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    host: Arc<Host>,
    params: RouteParams,
) -> Result<AppExit> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let (state_tx, state_rx) = crossbeam_channel::bounded::<RenderState>(1);

    let shutdown_clone = shutdown.clone();
    let logic_handle =
        thread::spawn(move || LogicThread::run(host, params, state_tx, shutdown_clone));

    let render_result = render_loop(terminal, state_rx, &shutdown);

    shutdown.store(true, Ordering::SeqCst);
    let exit = logic_handle
        .join()
        .map_err(|_| Error::TaskJoin("logic thread panicked".to_string()))??;
    render_result?;
    Ok(exit)
}

fn run_headless(host: &Host, params: RouteParams, script: &str) -> Result<()> {
    let signals = headless::parse_script(script)?;
    wlog!(
        "Headless run: workflow={} signals={}",
        params.workflow_id,
        signals.len()
    );
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let run = host.engine(&params)?;
        headless::run(run, &signals).await
    })?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_progress(host: &Host, workflow_id: Option<&str>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match workflow_id {
            Some(id) => {
                let id: WorkflowId = id.parse()?;
                let index = host.progress().get_progress(&id).await;
                println!("{}: {}", id, index);
            }
            None => {
                let records = host.progress().list_progress().await?;
                if records.is_empty() {
                    println!("No saved progress.");
                }
                for (id, index) in records {
                    println!("{}: {}", id, index);
                }
            }
        }
        Ok::<_, Error>(())
    })
}

fn run_reset(host: &Host, workflow_id: Option<&str>, all: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let cleared = rt.block_on(async {
        let ids = if all {
            host.progress()
                .list_progress()
                .await?
                .into_iter()
                .map(|(id, _)| id)
                .collect()
        } else {
            let id = workflow_id
                .ok_or_else(|| Error::Validation("reset needs a workflow id or --all".to_string()))?;
            vec![id.parse::<WorkflowId>()?]
        };
        for id in &ids {
            host.progress().clear_progress(id).await?;
        }
        Ok::<_, Error>(ids)
    })?;

    wlog!("Reset command cleared {} record(s)", cleared.len());
    for id in &cleared {
        println!("Reset {}", id);
    }
    if cleared.is_empty() {
        println!("No saved progress.");
    }
    Ok(())
}

fn run_list(host: &Host) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        for name in pages::names() {
            let count = pages::build(name, &WorkflowContext::new()).map_or(0, |p| p.len());
            let stored = host.progress().get_progress(&WorkflowId::new(name)).await;
            println!(
                "{:<20} {} pages, saved at step {}",
                name,
                count,
                stored.min(count.saturating_sub(1)) + 1
            );
        }
    });
    Ok(())
}

fn render_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state_rx: Receiver<RenderState>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut state = RenderState::default();
    let mut last_version: u64 = 0;
    let mut last_frame = Instant::now();
    let mut dirty = true;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match state_rx.try_recv() {
            Ok(s) => {
                dirty = dirty || s.version != last_version;
                state = s;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        if last_frame.elapsed() < FRAME_DURATION {
            thread::sleep(Duration::from_micros(500));
            continue;
        }
        last_frame = Instant::now();

        if dirty {
            terminal.draw(|f| ui::draw(f, &state))?;
            last_version = state.version;
            dirty = false;
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.hide_cursor()?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(disable_raw_mode()?)
}
