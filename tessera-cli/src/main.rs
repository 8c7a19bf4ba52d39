//! Tessera CLI - terminal host for the sectioned document engine

mod app;
mod io;
mod ui;

use std::fs::OpenOptions;
use std::io::stdout;
use std::path::Path;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

use tessera_config::Config;
use tessera_core::{AnnotationKey, SectionEditor};

use app::{App, Mode};

struct Args {
    file: String,
    entity_id: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut file = None;
    let mut entity_id = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--entity-id" => {
                entity_id = Some(args.next().context("--entity-id needs a value")?);
            }
            _ if file.is_none() => file = Some(arg),
            other => bail!("Unexpected argument: {other}"),
        }
    }

    let file = file.context("Usage: tessera <file> [--entity-id <id>]")?;
    Ok(Args { file, entity_id })
}

/// The terminal belongs to the UI, so logs go to a file in the data directory
fn init_logging(config: &Config) -> Result<()> {
    io::ensure_dir(&config.data_dir)?;
    let log_path = config.data_dir.join("tessera.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn build_app(config: &Config, args: Args) -> Result<App> {
    let loaded = io::load_file(&args.file)?;
    let entity_id = args.entity_id.unwrap_or_else(|| loaded.stem.clone());
    let key = AnnotationKey::new(&config.entity_type, &entity_id, &config.field_name);
    let data_dir: &Path = &config.data_dir;

    let context = match io::load_context(data_dir, &entity_id) {
        Ok(context) => context,
        Err(e) => {
            log::warn!("Ignoring export context: {e:#}");
            Default::default()
        }
    };

    let editor = SectionEditor::open(
        key,
        loaded.content,
        io::FileAnnotationStore::new(data_dir),
        io::FileDocumentSink::new(loaded.path),
    )
    .with_preview_chars(config.preview_chars);

    let mut app = App::new(
        editor,
        loaded.stem,
        context,
        io::FileCommentSource::new(data_dir),
        io::FileExportSink::new(data_dir),
    );
    app.refresh_comments();
    app.set_status(&format!("Loaded {} sections", app.editor.section_count()));
    Ok(app)
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = Config::load_or_default()?;
    init_logging(&config)?;

    let mut app = build_app(&config, args)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = res {
        eprintln!("Error: {}", e);
    }

    if let Some(text) = app.stash.stashed.take() {
        println!("{text}");
    }
    if app.editor.is_unsaved() {
        eprintln!("Warning: some changes were not saved; see {}", config.data_dir.join("tessera.log").display());
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while app.running {
        terminal.draw(|f| ui::draw(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            // Clear status on any key
            app.clear_status();

            match app.mode {
                Mode::Normal => handle_normal_mode(app, key.code),
                Mode::Help => {
                    app.mode = Mode::Normal;
                }
            }
        }
    }
    Ok(())
}

fn handle_normal_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.running = false,
        KeyCode::Char('?') => app.mode = Mode::Help,

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => app.move_down(),
        KeyCode::Char('k') | KeyCode::Up => app.move_up(),
        KeyCode::Char('g') | KeyCode::Home => app.move_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.move_to_bottom(),

        // Annotations
        KeyCode::Char(' ') => app.toggle_selected(),
        KeyCode::Char('x') | KeyCode::Esc => app.clear_selection(),
        KeyCode::Char('c') => app.toggle_caution(),
        KeyCode::Char('f') => app.toggle_flagged(),

        // Structure
        KeyCode::Char('m') => app.combine_selected(),
        KeyCode::Char('r') => app.combine_to_cursor(),
        KeyCode::Char('s') => app.separate(),

        // Comments, export, saving
        KeyCode::Char('R') => app.refresh_comments(),
        KeyCode::Char('e') => app.export(false),
        KeyCode::Char('E') => app.export(true),
        KeyCode::Char('w') => app.retry_save(),

        _ => {}
    }
}
