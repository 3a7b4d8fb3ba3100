//! Terminal application
//!
//! [`TerminalApp`] is the I/O-free core: session state, the command table and
//! the bookkeeping for backend jobs. [`App`] mounts it on the host terminal and
//! drives everything from one cooperative loop: the rain tick, key events, job
//! output and the welcome banner all interleave there, and nothing else ever
//! touches the screen.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::commands::{self, output_line, CommandContext, Dispatcher, Job, JobContext, JobEvent, JobSink};
use crate::config::Config;
use crate::core::editor::InputEvent;
use crate::core::session::Session;
use crate::credentials::CredentialStore;
use crate::net::backend::Backend;
use crate::net::stream::{new_cancellation, CancellationSignal};
use crate::ui::{Frame, KeyAction, KeyMapper, PanelLayout, PanelStatus, RainField, Renderer};

const BUSY_PULSE: Duration = Duration::from_millis(500);

const LOGO: &[&str] = &[
    r" __  __       _        _      ",
    r"|  \/  | __ _| |_ _ __(_)_  __",
    r"| |\/| |/ _` | __| '__| \ \/ /",
    r"| |  | | (_| | |_| |  | |>  < ",
    r"|_|  |_|\__,_|\__|_|  |_/_/\_\",
];

/// Session core, independent of the host terminal
pub struct TerminalApp {
    session: Session,
    dispatcher: Dispatcher,
    credentials: CredentialStore,
    backend: Arc<dyn Backend>,
    developer_message: String,
    cancel: CancellationSignal,
    jobs: JoinSet<()>,
    events_tx: UnboundedSender<JobEvent>,
    events_rx: UnboundedReceiver<JobEvent>,
    /// Jobs whose `Finished` has not been applied yet
    running: usize,
    /// Banner lines still to be written
    banner: VecDeque<String>,
    /// Keys typed while the banner was running
    queued: Vec<InputEvent>,
    mounted: bool,
}

impl TerminalApp {
    pub fn new(
        backend: Arc<dyn Backend>,
        credentials: CredentialStore,
        developer_message: impl Into<String>,
        cols: u16,
        rows: u16,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session: Session::new(cols, rows),
            dispatcher: Dispatcher::new(),
            credentials,
            backend,
            developer_message: developer_message.into(),
            cancel: new_cancellation(),
            jobs: JoinSet::new(),
            events_tx,
            events_rx,
            running: 0,
            banner: VecDeque::new(),
            queued: Vec::new(),
            mounted: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether no job output is outstanding
    pub fn is_idle(&self) -> bool {
        self.running == 0
    }

    pub fn in_welcome(&self) -> bool {
        !self.banner.is_empty()
    }

    /// Restore persisted state and arm the terminal. With `welcome` the
    /// banner is queued and the prompt follows its last line.
    pub fn mount(&mut self, welcome: bool) {
        self.mounted = true;
        if let Some(credential) = self.credentials.load() {
            info!("Restored local credential");
            self.session.set_credential(Some(credential));
        }

        if welcome {
            self.banner = self.banner_lines().into();
        } else {
            self.session.show_prompt();
        }
    }

    fn banner_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = LOGO.iter().map(|l| output_line(l)).collect();
        lines.push(String::new());
        lines.push(output_line("Wake up... The Matrix has you."));
        lines.push(commands::info_line(&format!(
            "Backend: {}",
            self.backend.describe()
        )));
        if self.session.credential().is_some() {
            lines.push(commands::info_line("Using your saved API key."));
        }
        lines.push(output_line(&format!(
            "Commands: {}",
            self.dispatcher.names().collect::<Vec<_>>().join(", ")
        )));
        lines.push(output_line("Type a command to begin..."));
        lines.push(String::new());
        lines
    }

    /// Write the next banner line; the prompt is armed after the last one
    pub fn advance_welcome(&mut self) {
        let Some(line) = self.banner.pop_front() else {
            return;
        };
        self.session.transcript.append_line(line);
        if self.banner.is_empty() {
            self.session.show_prompt();
            for event in std::mem::take(&mut self.queued) {
                self.handle_input(event);
            }
        }
    }

    /// Feed one key through the editor, dispatching on commit
    pub fn handle_input(&mut self, event: InputEvent) {
        if !self.mounted {
            return;
        }
        if self.in_welcome() {
            self.queued.push(event);
            return;
        }
        if let Some(line) = self.session.on_key(event) {
            self.dispatch(&line);
        }
    }

    /// Type pasted text key by key
    pub fn paste(&mut self, text: &str) {
        for event in KeyMapper::paste_events(text) {
            self.handle_input(event);
        }
    }

    fn dispatch(&mut self, line: &str) {
        let mut ctx = CommandContext {
            session: &mut self.session,
            credentials: &self.credentials,
        };
        match self.dispatcher.dispatch(&mut ctx, line) {
            Some(job) => self.spawn(job),
            None => self.session.show_prompt(),
        }
    }

    fn spawn(&mut self, job: Job) {
        debug!("Spawning {} job", job.name());
        let sink = JobSink::new(self.events_tx.clone(), self.cancel.clone(), &job);
        let ctx = JobContext {
            backend: Arc::clone(&self.backend),
            developer_message: self.developer_message.clone(),
            cancel: self.cancel.clone(),
        };
        self.running += 1;
        self.jobs.spawn(commands::jobs::run(job, ctx, sink));
    }

    /// Next report from a running job; `None` once unmounted
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events_rx.recv().await
    }

    /// Apply a job report to the session
    pub fn apply(&mut self, event: JobEvent) {
        if !self.mounted {
            return;
        }
        match event {
            JobEvent::Output(text) => self.session.append_output(text),
            JobEvent::Finished { releases_busy } => {
                self.running = self.running.saturating_sub(1);
                if releases_busy && !self.session.end_busy() {
                    warn!("Busy flag was already clear");
                }
                self.session.show_prompt();
            }
        }
    }

    /// Collect finished job tasks
    pub fn reap(&mut self) {
        while let Some(joined) = self.jobs.try_join_next() {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!("Job panicked: {}", e);
                }
            }
        }
    }

    /// Stop all background work; nothing reaches the session afterwards
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.cancel.store(true, Ordering::SeqCst);
        self.jobs.abort_all();
        self.events_rx.close();
        self.banner.clear();
        self.queued.clear();
        info!("Terminal unmounted");
    }
}

impl Drop for TerminalApp {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Start-up options that are not part of the config file
#[derive(Debug, Clone, Copy)]
pub struct LaunchOptions {
    pub rain: bool,
    pub welcome: bool,
}

/// The terminal mounted on the host console
pub struct App {
    terminal: TerminalApp,
    config: Config,
    options: LaunchOptions,
    renderer: Renderer,
    rain: Option<RainField>,
    layout: PanelLayout,
    screen: (u16, u16),
    pulse: bool,
}

enum Flow {
    Continue,
    Quit,
}

impl App {
    pub fn new(
        config: Config,
        options: LaunchOptions,
        backend: Arc<dyn Backend>,
        credentials: CredentialStore,
    ) -> anyhow::Result<Self> {
        let (cols, rows) = Renderer::size()?;
        info!("Terminal size: {}x{}", cols, rows);

        let layout = PanelLayout::compute(cols, rows, &config.panel);
        let (inner_cols, inner_rows) = layout.inner_size();
        let terminal = TerminalApp::new(
            backend,
            credentials,
            config.developer_message.clone(),
            inner_cols,
            inner_rows,
        );
        let rain = (options.rain && config.rain.enabled).then(|| RainField::new(cols, rows, &config.rain));

        Ok(Self {
            terminal,
            config,
            options,
            renderer: Renderer::new(),
            rain,
            layout,
            screen: (cols, rows),
            pulse: true,
        })
    }

    /// Mount, run until the user quits, then unmount and restore the console
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.renderer.init()?;
        let welcome = self.options.welcome && self.config.welcome.enabled;
        self.terminal.mount(welcome);

        let result = self.main_loop().await;

        self.terminal.unmount();
        self.renderer.cleanup()?;
        result
    }

    async fn main_loop(&mut self) -> anyhow::Result<()> {
        let mut events = EventStream::new();

        let mut rain_tick = tokio::time::interval(self.config.rain.tick());
        rain_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut welcome_tick = tokio::time::interval(self.config.welcome.line_delay());
        welcome_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pulse_tick = tokio::time::interval(BUSY_PULSE);

        self.redraw()?;

        loop {
            let animating = self.rain.is_some();
            let welcoming = self.terminal.in_welcome();
            let busy = self.terminal.session().is_busy();

            tokio::select! {
                _ = rain_tick.tick(), if animating => {
                    if let Some(rain) = self.rain.as_mut() {
                        rain.tick();
                    }
                }
                _ = welcome_tick.tick(), if welcoming => {
                    self.terminal.advance_welcome();
                }
                _ = pulse_tick.tick(), if busy => {
                    self.pulse = !self.pulse;
                }
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(event)) => {
                        if let Flow::Quit = self.handle_event(event) {
                            info!("Quit requested");
                            return Ok(());
                        }
                    }
                    Some(Err(e)) => {
                        error!("Input error: {}", e);
                        return Err(e.into());
                    }
                    None => return Ok(()),
                },
                Some(job_event) = self.terminal.next_event() => {
                    self.terminal.apply(job_event);
                }
            }

            self.terminal.reap();
            self.redraw()?;
        }
    }

    fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Key(key) => match KeyMapper::map(&key) {
                KeyAction::Quit => return Flow::Quit,
                KeyAction::Input(input) => self.terminal.handle_input(input),
                KeyAction::Paste => self.paste_clipboard(),
                KeyAction::ScrollUp => {
                    let page = self.page();
                    self.terminal.session_mut().transcript.grid_mut().scroll_view_up(page);
                }
                KeyAction::ScrollDown => {
                    let page = self.page();
                    self.terminal.session_mut().transcript.grid_mut().scroll_view_down(page);
                }
                KeyAction::Ignore => {}
            },
            Event::Paste(text) => self.terminal.paste(&text),
            Event::Resize(cols, rows) => self.resize(cols, rows),
            _ => {}
        }
        Flow::Continue
    }

    fn paste_clipboard(&mut self) {
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
            Ok(text) => self.terminal.paste(&text),
            Err(e) => warn!("Clipboard unavailable: {}", e),
        }
    }

    fn page(&self) -> usize {
        (self.layout.inner_size().1 as usize / 2).max(1)
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        info!("Resize to {}x{}", cols, rows);
        self.screen = (cols, rows);
        self.layout = PanelLayout::compute(cols, rows, &self.config.panel);
        let (inner_cols, inner_rows) = self.layout.inner_size();
        self.terminal
            .session_mut()
            .transcript
            .resize(inner_cols, inner_rows);
        if let Some(rain) = self.rain.as_mut() {
            rain.resize(cols, rows);
        }
        self.renderer.invalidate();
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let (cols, rows) = self.screen;
        if cols == 0 || rows == 0 {
            return Ok(());
        }

        let mut frame = Frame::new(cols, rows);
        if let Some(rain) = &self.rain {
            // Surface may have changed size since the last tick
            if rain.size() == self.screen {
                frame.draw_rain(rain);
            }
        }

        let session = self.terminal.session();
        let grid = session.transcript.grid();
        let status = PanelStatus {
            busy_pulse: session.is_busy().then_some(self.pulse),
            scroll_offset: grid.scroll_offset(),
        };
        frame.draw_panel(&self.layout, grid, status);

        let cursor = (grid.scroll_offset() == 0).then(|| {
            let (inner_x, inner_y) = self.layout.inner_origin();
            let (inner_cols, _) = self.layout.inner_size();
            let at = grid.cursor();
            (inner_x + at.col.min(inner_cols - 1), inner_y + at.row)
        });

        self.renderer.render(&frame, cursor)?;
        Ok(())
    }
}
