pub mod ui;

use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use nback::{
    app_dirs::AppDirs,
    audio::{AudioOutput, CommandAudio, SilentAudio},
    config::{AudioProvider, ConfigStore, FileConfigStore, Settings},
    history::{GameStats, HistoryStore, SqliteHistory},
    logging::init_logging,
    runtime::{channel_for_key, CrosstermEventSource, EventSource, FixedTicker, NbackEvent, Runner},
    session::{GameState, Session},
    summary::SessionSummary,
    TICK_RATE_MS,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};

/// dual n-back working memory trainer
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    version,
    about,
    long_about = "Dual n-back training in the terminal. Watch the square on the grid and listen to the letters; press 'a' when the position matches the one n steps back and 'l' when the letter does."
)]
pub struct Cli {
    /// n-back level (1-5)
    #[clap(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=5))]
    n_level: Option<u32>,

    /// seconds per stimulus (1-5, in steps of 0.5)
    #[clap(short = 'd', long, value_parser = parse_duration)]
    duration: Option<f64>,

    /// number of trials per session (10-50, in steps of 5)
    #[clap(short = 't', long, value_parser = parse_trials)]
    trials: Option<u32>,

    /// where letter sounds come from
    #[clap(short = 'a', long, value_enum)]
    audio: Option<AudioProvider>,

    /// voice name passed to the speech synthesizer
    #[clap(long)]
    voice: Option<String>,

    /// directory holding recorded letters (c.wav, h.wav, ...)
    #[clap(long)]
    sounds_dir: Option<PathBuf>,

    /// play without any sound
    #[clap(long)]
    mute: bool,

    /// seed for the stimulus sequence, for reproducible sessions
    #[clap(long)]
    seed: Option<u64>,
}

fn parse_duration(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if !(1.0..=5.0).contains(&secs) || (secs * 2.0).fract() != 0.0 {
        return Err("duration must be between 1 and 5 seconds in steps of 0.5".to_string());
    }
    Ok(secs)
}

fn parse_trials(s: &str) -> Result<u32, String> {
    let trials: u32 = s.parse().map_err(|_| format!("`{s}` is not a whole number"))?;
    if !(10..=50).contains(&trials) || trials % 5 != 0 {
        return Err("trials must be between 10 and 50 in steps of 5".to_string());
    }
    Ok(trials)
}

impl Cli {
    /// Overlay the flags that were given on top of stored settings
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(n) = self.n_level {
            settings.n_level = n;
        }
        if let Some(d) = self.duration {
            settings.duration_seconds = d;
        }
        if let Some(t) = self.trials {
            settings.total_trials = t;
        }
        if let Some(audio) = self.audio {
            settings.audio_provider = audio;
        }
        if let Some(voice) = &self.voice {
            settings.tts_voice = Some(voice.clone());
        }
        settings
    }

    fn audio_output(&self) -> Box<dyn AudioOutput> {
        if self.mute {
            Box::new(SilentAudio)
        } else {
            Box::new(CommandAudio::new(
                self.sounds_dir.clone().or_else(AppDirs::sounds_dir),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Game,
    Results,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    Continue,
    Exit,
}

pub struct App {
    pub settings: Settings,
    pub session: Session,
    pub state: AppState,
    pub stats: GameStats,
    pub last_summary: Option<SessionSummary>,
    /// one-line message for the learner, e.g. a failed save
    pub notice: Option<String>,
    pub history_scroll: usize,
    audio: Box<dyn AudioOutput>,
    history: Option<Box<dyn HistoryStore>>,
    rng: StdRng,
}

impl App {
    pub fn new(
        settings: Settings,
        audio: Box<dyn AudioOutput>,
        history: Option<Box<dyn HistoryStore>>,
        seed: Option<u64>,
    ) -> Self {
        let stats = match history.as_ref().map(|h| h.load()) {
            Some(Ok(stats)) => stats,
            Some(Err(e)) => {
                tracing::error!("failed to load history: {e}");
                GameStats::default()
            }
            None => GameStats::default(),
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            session: Session::new(settings.clone()),
            settings,
            state: AppState::Game,
            stats,
            last_summary: None,
            notice: None,
            history_scroll: 0,
            audio,
            history,
            rng,
        }
    }

    /// Fresh session in `Loading`; the run loop finishes loading after the
    /// loading screen is drawn.
    pub fn start_game(&mut self) {
        self.session = Session::new(self.settings.clone());
        self.session.request_start();
        self.state = AppState::Game;
        self.notice = None;
    }

    pub fn finish_loading(&mut self, now: Instant) {
        if let Err(e) = self.session.load(self.audio.as_mut(), &mut self.rng, now) {
            tracing::error!("could not start session: {e}");
            self.notice = Some(e.to_string());
            self.session.quit();
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.session.tick(now, self.audio.as_mut());
    }

    /// Persist the finished session and switch to the results screen.
    /// A failed save is logged and reported but never blocks the results.
    pub fn save_results(&mut self) {
        let Some(summary) = self.session.summary(Local::now()) else {
            return;
        };

        let saved = self.history.as_mut().map(|h| h.persist(&summary));
        self.stats = match saved {
            Some(Ok(stats)) => stats,
            Some(Err(e)) => {
                tracing::error!("failed to save session: {e}");
                self.notice = Some(format!("session not saved: {e}"));
                self.stats
                    .clone()
                    .record(summary.clone(), Local::now().date_naive())
            }
            None => self
                .stats
                .clone()
                .record(summary.clone(), Local::now().date_naive()),
        };

        self.last_summary = Some(summary);
        self.session.quit();
        self.state = AppState::Results;
    }

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Exit;
        }

        match self.state {
            AppState::Game => match self.session.state() {
                GameState::Idle => match key.code {
                    KeyCode::Enter | KeyCode::Char(' ') => self.start_game(),
                    KeyCode::Char('h') => {
                        self.history_scroll = 0;
                        self.state = AppState::History;
                    }
                    KeyCode::Esc | KeyCode::Char('q') => return Control::Exit,
                    _ => {}
                },
                GameState::Loading => {}
                GameState::Playing => {
                    if let Some(channel) = channel_for_key(&key) {
                        self.session.acknowledge(channel, now);
                    } else if key.code == KeyCode::Esc {
                        self.session.quit();
                    }
                }
                GameState::Finished => {
                    if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Esc) {
                        self.save_results();
                    }
                }
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') | KeyCode::Enter => self.start_game(),
                KeyCode::Char('h') => {
                    self.history_scroll = 0;
                    self.state = AppState::History;
                }
                KeyCode::Char('b') | KeyCode::Backspace => self.state = AppState::Game,
                KeyCode::Esc | KeyCode::Char('q') => return Control::Exit,
                _ => {}
            },
            AppState::History => match key.code {
                KeyCode::Up => self.history_scroll = self.history_scroll.saturating_sub(1),
                KeyCode::Down => self.history_scroll += 1,
                KeyCode::PageUp => self.history_scroll = self.history_scroll.saturating_sub(10),
                KeyCode::PageDown => self.history_scroll += 10,
                KeyCode::Home => self.history_scroll = 0,
                KeyCode::Char('b') | KeyCode::Backspace => self.state = AppState::Game,
                KeyCode::Char('r') | KeyCode::Enter => self.start_game(),
                KeyCode::Esc | KeyCode::Char('q') => return Control::Exit,
                _ => {}
            },
        }
        Control::Continue
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        if let Err(e) = init_logging(&log_path) {
            eprintln!("logging disabled: {e}");
        }
    }

    let config_store = FileConfigStore::new();
    let settings = cli.apply(config_store.load());
    if let Err(e) = config_store.save(&settings) {
        tracing::warn!("failed to save settings: {e}");
    }

    let history: Option<Box<dyn HistoryStore>> = match SqliteHistory::new() {
        Ok(store) => Some(Box::new(store)),
        Err(e) => {
            tracing::error!("history unavailable, sessions will not be saved: {e}");
            None
        }
    };

    let mut app = App::new(settings, cli.audio_output(), history, cli.seed);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: EventSource, T: nback::runtime::Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;

        if app.session.state() == GameState::Loading {
            app.finish_loading(Instant::now());
            continue;
        }

        match runner.step_until(app.session.deadline(), Instant::now()) {
            NbackEvent::Tick => app.on_tick(Instant::now()),
            NbackEvent::Resize => {}
            NbackEvent::Key(key) => {
                if app.on_key(key, Instant::now()) == Control::Exit {
                    app.session.quit();
                    break;
                }
            }
        }
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    let screen = ui::screen::current_screen(&app.state);
    screen.render(app, f);
}
