// main.rs for geonet-mapper: terminal client for the GEO NET analysis backend
mod analysis;
mod app;
mod client;
mod config;
mod error;
mod event;
mod export;
mod files;
mod geometry;
mod handler;
mod overlay;
mod palette;
mod ui;
mod ui_state;

use std::error::Error;
use std::fs::{self, File};
use std::io::{self, Stdout};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

use crate::app::{App, BackendEvent};
use crate::client::{AnalysisBackend, HttpBackend};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::handler::Command;

type Tui = Terminal<CrosstermBackend<Stdout>>;

fn init_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    // The terminal belongs to the UI, so logs go to a file.
    let file = File::create(&config.log_file)?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(config.log_level)
        .try_init()
        .map_err(|e| e as Box<dyn Error>)?;
    Ok(())
}

fn setup_terminal() -> Result<Tui, Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Tui) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs a request on its own thread and posts the outcome back to the UI.
fn dispatch(command: Command, backend: &Arc<dyn AnalysisBackend>, sender: &Sender<Event>) {
    let backend = Arc::clone(backend);
    let sender = sender.clone();
    thread::spawn(move || {
        let event = match command {
            Command::RunAnalysis(request) => BackendEvent::AnalysisFinished {
                class_count: request.class_count,
                outcome: backend.analyze(&request),
            },
            Command::Download(collection) => {
                BackendEvent::DownloadFinished(backend.download(&collection))
            }
        };
        // The receiver is gone only when the UI has already shut down.
        let _ = sender.send(Event::Backend(event));
    });
}

fn run(terminal: &mut Tui, app: &mut App, config: &Config) -> Result<(), Box<dyn Error>> {
    let backend: Arc<dyn AnalysisBackend> = Arc::new(HttpBackend::new(
        &config.api_url,
        config.request_timeout,
    )?);
    let events = EventHandler::new(config.tick_rate);
    let sender = events.sender();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(frame, app))?;

        match events.next()? {
            Event::Tick => app.tick(Instant::now()),
            Event::Input(key) => {
                if let Some(command) = handler::handle_key(app, key, Instant::now()) {
                    dispatch(command, &backend, &sender);
                }
            }
            Event::Mouse(mouse) => {
                let width = terminal.size()?.width;
                handler::handle_mouse(app, mouse, width);
            }
            Event::TerminalEvent(_) => {
                terminal.autoresize()?;
            }
            Event::Backend(BackendEvent::AnalysisFinished {
                class_count,
                outcome,
            }) => app.apply_analysis_outcome(class_count, outcome, Instant::now()),
            Event::Backend(BackendEvent::DownloadFinished(outcome)) => {
                app.finish_download(outcome, Instant::now())
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env();
    init_logging(&config)?;
    info!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "starting");

    fs::create_dir_all(&config.output_dir)?;

    let mut app = App::new(config.data_dir.clone(), config.output_dir.clone());
    app.rescan_upload_dir(Instant::now());

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &mut app, &config);
    restore_terminal(&mut terminal)?;

    if let Err(e) = &result {
        error!("exiting on error: {e}");
    }
    info!("shutting down");
    result
}
