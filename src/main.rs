use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

mod cli;
mod config;
mod errors;
mod history;
mod log;
mod parse;
mod present;
mod prompt;
mod provider;
mod session;
mod ux;
mod wire;

use cli::Command;
use config::{GatewayConfig, SensorPresets, Settings};
use history::RefinementHistory;
use present::{FieldStore, Surface};
use session::commands::{self, SessionCommand};
use session::{Action, Session};
use ux::TerminalSurface;
use wire::ModuleId;

const DEFAULT_FORM: &str = "gateway.toml";

fn load_config(settings: &Settings) -> anyhow::Result<GatewayConfig> {
    GatewayConfig::load(Path::new(&settings.config_path))
        .with_context(|| format!("loading config {}", settings.config_path))
}

fn open_session(settings: &Settings, store: FieldStore) -> anyhow::Result<Session<TerminalSurface>> {
    let config = load_config(settings)?;
    let presets = SensorPresets::load(Path::new(&settings.sensors_path))
        .with_context(|| format!("loading sensor presets {}", settings.sensors_path))?;
    let history_path = settings.history_path();
    let history = RefinementHistory::load(&history_path)
        .with_context(|| format!("loading history {}", history_path.display()))?;
    Ok(Session::new(TerminalSurface::new(store), config, presets, settings.clone(), history))
}

fn save_state(settings: &Settings, store: &FieldStore, form: &Path, history: &RefinementHistory) -> anyhow::Result<()> {
    store.save(form).with_context(|| format!("saving form {}", form.display()))?;
    let history_path = settings.history_path();
    history
        .save(&history_path)
        .with_context(|| format!("saving history {}", history_path.display()))?;
    if settings.debug {
        println!("debug: form saved at {}", form.display());
        println!("debug: history saved at {}", history_path.display());
    }
    Ok(())
}

/// Runs one generation or refinement against a form file and writes the
/// results back into it.
async fn one_shot(settings: &Settings, form: &str, action: Action) -> anyhow::Result<()> {
    let form_path = PathBuf::from(form);
    let store = FieldStore::load(&form_path).with_context(|| format!("reading form {}", form_path.display()))?;
    let mut session = open_session(settings, store)?;

    let Some(model) = settings.model.clone() else {
        bail!("no model selected; pass --model (see `models`)");
    };
    session.select_model(&model)?;

    let before = session.history().len();
    session.dispatch(action)?;
    if settings.progress {
        session.surface_mut().start_spinner(&format!("waiting for {model}"));
    }
    session.wait_idle().await;
    session.surface_mut().finish_spinner();

    let produced = session.history().len() > before;
    let (surface, history) = session.into_parts();
    save_state(settings, surface.store(), &form_path, &history)?;
    if !produced {
        bail!("no code was produced; see the feedback above");
    }
    println!("form updated: {}", form_path.display());
    Ok(())
}

async fn interactive(settings: &Settings, form: Option<String>) -> anyhow::Result<()> {
    let mut form_path = PathBuf::from(form.unwrap_or_else(|| DEFAULT_FORM.to_string()));
    let store = if form_path.exists() {
        FieldStore::load(&form_path).with_context(|| format!("reading form {}", form_path.display()))?
    } else {
        FieldStore::new()
    };
    let mut session = open_session(settings, store)?;
    if let Some(model) = settings.model.clone() {
        // Shown on the surface; the session still starts without a model.
        let _ = session.select_model(&model);
    }

    ux::print_banner(session.model_name());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    ux::prompt();
    loop {
        tokio::select! {
            Some(event) = session.next_event() => session.handle_event(event),
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else { break };
                match commands::parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(SessionCommand::Quit)) => break,
                    Ok(Some(cmd)) => run_command(&mut session, cmd, &mut form_path),
                    Err(msg) => ux::print_error(&msg),
                }
                ux::prompt();
            }
        }
    }

    if session.in_flight() > 0 {
        println!("waiting for {} request(s) to finish...", session.in_flight());
        session.wait_idle().await;
    }
    let (surface, history) = session.into_parts();
    save_state(settings, surface.store(), &form_path, &history)?;
    println!("saved {}", form_path.display());
    Ok(())
}

/// Failures are already reported on the surface; the loop keeps going.
fn run_command(session: &mut Session<TerminalSurface>, cmd: SessionCommand, form_path: &mut PathBuf) {
    match cmd {
        SessionCommand::Help => println!("{}", commands::HELP),
        SessionCommand::Fields => ux::print_fields(session.surface().store()),
        SessionCommand::Show(f) => ux::print_field(f, &session.surface().get(f)),
        SessionCommand::Set(f, text) => session.surface_mut().set(f, &text),
        SessionCommand::Load(path) => match FieldStore::load(Path::new(&path)) {
            Ok(store) => {
                session.surface_mut().load_fields(&store);
                *form_path = PathBuf::from(path);
                println!("loaded {}", form_path.display());
            }
            Err(e) => ux::print_error(&e.to_string()),
        },
        SessionCommand::Save(path) => {
            if let Some(p) = path {
                *form_path = PathBuf::from(p);
            }
            match session.surface().store().save(form_path) {
                Ok(()) => println!("saved {}", form_path.display()),
                Err(e) => ux::print_error(&e.to_string()),
            }
        }
        SessionCommand::Preset(name) => {
            let _ = session.apply_preset(&name);
        }
        SessionCommand::Presets => ux::print_presets(session.presets()),
        SessionCommand::Run(action) => {
            let _ = session.dispatch(action);
        }
        SessionCommand::History => ux::print_history(session.history()),
        SessionCommand::Boards => ux::print_boards(session.config()),
        SessionCommand::AddBoard(name) => {
            let _ = session.add_board(&name);
        }
        SessionCommand::Tech(name) => match session.show_technology(&name) {
            Some(details) => println!("{details}"),
            None => ux::print_error(&format!("unknown technology '{name}'")),
        },
        SessionCommand::Models => {
            let selected = session.model_name().map(str::to_string);
            ux::print_models(session.config(), selected.as_deref());
        }
        SessionCommand::Model(name) => {
            let _ = session.select_model(&name);
        }
        SessionCommand::Quit => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    log::init_tracing(args.debug);
    let settings = Settings::from_args(&args);
    if args.debug {
        println!("debug: flag enabled");
        println!("debug: state directory {}", settings.state_dir().display());
    }

    match args.command.clone().unwrap_or(Command::Session { form: None }) {
        Command::Session { form } => interactive(&settings, form).await,
        Command::Generate { module, form } => {
            if module == ModuleId::DataFormat {
                bail!("use `suggest` for the data format");
            }
            one_shot(&settings, &form, Action::Generate(module)).await
        }
        Command::Suggest { form } => one_shot(&settings, &form, Action::Generate(ModuleId::DataFormat)).await,
        Command::Refine { module, request, form } => one_shot(&settings, &form, Action::Refine { module, request }).await,
        Command::AddBoard { name } => {
            let mut cfg = load_config(&settings)?;
            match cfg.add_board(&name)? {
                config::BoardAdded::Added => {
                    cfg.save(Path::new(&settings.config_path))
                        .with_context(|| format!("saving config {}", settings.config_path))?;
                    println!("Added new board: {}", name.trim());
                }
                config::BoardAdded::AlreadyExists => println!("Board already exists."),
            }
            Ok(())
        }
        Command::Boards => {
            ux::print_boards(&load_config(&settings)?);
            Ok(())
        }
        Command::Technologies => {
            ux::print_technologies(&load_config(&settings)?);
            Ok(())
        }
        Command::Models => {
            ux::print_models(&load_config(&settings)?, settings.model.as_deref());
            Ok(())
        }
        Command::History => {
            let history = RefinementHistory::load(&settings.history_path())?;
            ux::print_history(&history);
            Ok(())
        }
        Command::InitForm { path } => {
            let path = PathBuf::from(path);
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            FieldStore::new().save(&path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}
