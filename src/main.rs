use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use kubeconsole_k8s::{ConsoleTarget, KubeClient, PodEventSource, PodLogSource};
use kubeconsole_logs::{
    BufferConfig, BufferManager, BufferType, MatchUpdate, PollMode, Poller, PollerHandle,
    SharedBuffer, StatusAggregator,
};
use kubeconsole_tui::{
    Action, AppState, ConsoleScreen, Event, EventHandler, KeyBindings, KeyContext, Tui,
};

mod config;

use config::{CONFIG_ENV, Config, Overrides};

/// Tick rate of the terminal event loop
const TICK_RATE: Duration = Duration::from_millis(100);

/// Kubeconsole - follow a pod's logs and events in the terminal
#[derive(Parser, Debug)]
#[command(name = "kubeconsole")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pod to follow
    #[arg(value_name = "POD")]
    pod: String,

    /// Namespace (defaults to the context's namespace, then "default")
    #[arg(short, long)]
    namespace: Option<String>,

    /// Kubernetes context name (defaults to the current context)
    #[arg(long)]
    context: Option<String>,

    /// Container within the pod
    #[arg(short, long)]
    container: Option<String>,

    /// Config file (defaults to $KUBECONSOLE_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Milliseconds between fetches
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Consecutive fetch failures before a poller stops
    #[arg(long)]
    max_failures: Option<u32>,

    /// Byte budget of the log buffer
    #[arg(long)]
    buffer_bytes: Option<usize>,

    /// Records per buffer chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Log lines requested on the first fetch
    #[arg(long)]
    tail_lines: Option<i64>,

    /// Write diagnostics to a file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            interval_ms: self.interval_ms,
            max_failures: self.max_failures,
            buffer_bytes: self.buffer_bytes,
            chunk_size: self.chunk_size,
            tail_lines: self.tail_lines,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_file.as_deref())?;

    let result = run_app(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

/// The two buffers and the pollers feeding them
struct Console {
    logs: SharedBuffer,
    events: SharedBuffer,
    log_poller: PollerHandle,
    event_poller: PollerHandle,
}

impl Console {
    fn buffer(&self, buffer_type: BufferType) -> &SharedBuffer {
        match buffer_type {
            BufferType::Logs => &self.logs,
            BufferType::Events => &self.events,
        }
    }

    fn poller(&self, buffer_type: BufferType) -> &PollerHandle {
        match buffer_type {
            BufferType::Logs => &self.log_poller,
            BufferType::Events => &self.event_poller,
        }
    }

    fn size(&self, buffer_type: BufferType) -> usize {
        self.buffer(buffer_type).lock().size()
    }

    /// Search terms apply to both tabs
    fn change_search_term(&self, term: &str) {
        self.logs.lock().change_search_term(term);
        self.events.lock().change_search_term(term);
    }

    fn flush_notifications(&self) {
        self.logs.lock().flush_notifications();
        self.events.lock().flush_notifications();
    }

    fn stop(&self) {
        self.log_poller.stop();
        self.event_poller.stop();
    }
}

/// Buffer whose match updates are forwarded to the event loop
fn shared_buffer(config: BufferConfig, updates: &mpsc::UnboundedSender<MatchUpdate>) -> SharedBuffer {
    let mut manager = BufferManager::new(config);
    let updates = updates.clone();
    manager.add_listener(move |update| {
        let _ = updates.send(update.clone());
    });
    manager.into_shared()
}

async fn run_app(args: Args) -> Result<()> {
    let config_path = config::resolve_path(args.config.clone(), std::env::var_os(CONFIG_ENV));
    let mut config = Config::load(config_path.as_deref())?;
    config.apply_overrides(&args.overrides());

    // Resolve the target against the kubeconfig
    let kube_client = KubeClient::new()?;
    let context = args
        .context
        .clone()
        .or_else(|| kube_client.current_context().map(str::to_string));
    let namespace = args
        .namespace
        .clone()
        .or_else(|| context.as_deref().and_then(|c| kube_client.default_namespace(c)))
        .unwrap_or_else(|| "default".to_string());
    let client = kube_client.client_for_context(context.as_deref()).await?;

    let mut target = ConsoleTarget::new(namespace, args.pod.clone());
    target.context = context;
    target.container = args.container.clone();
    info!(target = %target.label(), "starting console");

    // Buffers notify the loop, pollers report through the aggregator
    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<MatchUpdate>();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<String>();

    let status = StatusAggregator::new();
    status.subscribe(move |summary| {
        let _ = status_tx.send(summary.to_string());
    });

    let logs = shared_buffer(config.log_buffer(), &update_tx);
    let events = shared_buffer(config.event_buffer(), &update_tx);

    let log_poller = Poller::new(
        "logs",
        PodLogSource::new(client.clone(), &target, config.poll.tail_lines),
        logs.clone(),
        PollMode::Merge,
        config.poller(),
        status.clone(),
    )
    .spawn();
    let event_poller = Poller::new(
        "events",
        PodEventSource::new(client, &target),
        events.clone(),
        PollMode::Replace,
        config.poller(),
        status.clone(),
    )
    .spawn();

    let console = Console {
        logs,
        events,
        log_poller,
        event_poller,
    };

    let mut state = AppState::new(target);
    state.status_summary = status.summary();

    let mut tui = Tui::new().context("Failed to set up terminal")?;
    let mut terminal_events = EventHandler::new(TICK_RATE);
    let keybindings = KeyBindings::new();

    render(&mut tui, &mut state, &console)?;

    loop {
        tokio::select! {
            Some(event) = terminal_events.next() => {
                match event {
                    Event::Key(key) => {
                        let context = if state.search_active {
                            KeyContext::SearchInput
                        } else if state.help_visible {
                            KeyContext::Help
                        } else {
                            KeyContext::Console
                        };

                        if let Some(action) = keybindings.get_action(context, &key) {
                            handle_action(&mut state, &console, action);
                        }
                    }
                    Event::Tick => {
                        // Trailing match notifications are delivered from here
                        console.flush_notifications();
                        state.logs.fetch_status = console.log_poller.status();
                        state.events.fetch_status = console.event_poller.status();
                        state.tick(Instant::now());
                    }
                    Event::Resize(_, _) => {}
                    Event::Error(e) => {
                        warn!(error = %e, "terminal event error");
                        state.push_notice(e);
                    }
                }
            }

            Some(update) = update_rx.recv() => {
                state.apply_update(&update);
            }

            Some(summary) = status_rx.recv() => {
                state.status_summary = summary;
            }

            else => break,
        }

        if state.should_quit {
            break;
        }

        render(&mut tui, &mut state, &console)?;
    }

    terminal_events.shutdown();
    console.stop();
    tui.restore().context("Failed to restore terminal")?;

    Ok(())
}

fn handle_action(state: &mut AppState, console: &Console, action: Action) {
    let active = state.active_tab;

    match action {
        Action::Quit => state.should_quit = true,
        Action::ToggleHelp => state.help_visible = !state.help_visible,
        Action::SwitchTab => state.switch_tab(),

        Action::OpenSearch => state.start_search(),
        Action::CloseSearch => state.cancel_search(),
        Action::SearchInput(c) => state.search_input_char(c),
        Action::SearchBackspace => state.search_input_backspace(),
        Action::SearchClear => state.search_input_clear(),
        Action::ApplySearch => {
            let term = state.apply_search();
            console.change_search_term(&term);
        }
        Action::ClearSearch => {
            if state.clear_search() {
                console.change_search_term("");
            }
        }

        Action::NextMatch | Action::PrevMatch => {
            let forward = action == Action::NextMatch;
            let found = {
                let buffer = console.buffer(active).lock();
                state.step_match(&buffer, forward)
            };
            if !found && state.search_term.is_some() {
                state.push_notice("No matches");
            }
        }

        Action::TogglePause => {
            let poller = console.poller(active);
            let paused = poller.toggle_pause();
            state.tab_mut().fetch_status = poller.status();
            let verb = if paused { "paused" } else { "resumed" };
            state.push_notice(format!("{} {}", active.label(), verb));
        }
        Action::ClearLogs => {
            console.buffer(active).lock().clear_logs();
            state.tab_mut().reset();
            state.push_notice(format!("{} cleared", active.label()));
        }

        Action::ScrollUp(lines) => state.scroll_up(lines, console.size(active)),
        Action::ScrollDown(lines) => state.scroll_down(lines, console.size(active)),
        Action::PageUp => state.page_up(console.size(active)),
        Action::PageDown => state.page_down(console.size(active)),
        Action::ScrollToTop => state.tab_mut().scroll_to_top(),
        Action::ScrollToBottom => state.tab_mut().scroll_to_bottom(),
        Action::ToggleAutoScroll => {
            let following = state.toggle_auto_scroll(console.size(active));
            state.push_notice(if following { "Following" } else { "Follow off" });
        }
    }
}

fn render(tui: &mut Tui, state: &mut AppState, console: &Console) -> Result<()> {
    let buffer = console.buffer(state.active_tab).lock();
    tui.terminal()
        .draw(|frame| ConsoleScreen::render(frame, state, &buffer))?;
    Ok(())
}
