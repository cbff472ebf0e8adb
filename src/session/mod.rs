//! The consumer side of the pipeline.
//!
//! `Session` owns the display fields and the refinement history. Worker tasks
//! only talk to it through `SessionEvent`s, so every field write and history
//! append happens here, on one task.

use std::path::Path;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::config::{BoardAdded, GatewayConfig, SensorPresets, Settings};
use crate::errors::{GatewayError, GatewayResult};
use crate::history::RefinementHistory;
use crate::log;
use crate::present::{self, Field, LogLevel, LogLine, Surface};
use crate::prompt;
use crate::provider::{self, DynClient};
use crate::wire::{GenerationResult, HistoryEntry, ModuleId, RefineRequest};

pub mod commands;
pub mod worker;

pub use worker::{Job, JobKind, Outcome, SessionEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Generate code for a module; `DataFormat` asks for a format suggestion.
    Generate(ModuleId),
    /// `module: None` targets whatever was generated last. `request: None`
    /// reads the modification-request field.
    Refine { module: Option<ModuleId>, request: Option<String> },
}

pub struct Session<S: Surface> {
    surface: S,
    history: RefinementHistory,
    config: GatewayConfig,
    presets: SensorPresets,
    settings: Settings,
    client: Option<DynClient>,
    tx: UnboundedSender<SessionEvent>,
    rx: UnboundedReceiver<SessionEvent>,
    in_flight: usize,
}

impl<S: Surface> Session<S> {
    pub fn new(surface: S, config: GatewayConfig, presets: SensorPresets, settings: Settings, history: RefinementHistory) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            surface,
            history,
            config,
            presets,
            settings,
            client: None,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn with_client(mut self, client: DynClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn history(&self) -> &RefinementHistory {
        &self.history
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn presets(&self) -> &SensorPresets {
        &self.presets
    }

    /// Name of the selected model, if any.
    pub fn model_name(&self) -> Option<&str> {
        self.client.as_deref().map(|c| c.model())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn into_parts(self) -> (S, RefinementHistory) {
        (self.surface, self.history)
    }

    /// Writes to the surface log and mirrors the line to tracing.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let line = LogLine::now(level, message);
        match level {
            LogLevel::Error => tracing::error!("{}", line.message),
            LogLevel::Warning => tracing::warn!("{}", line.message),
            LogLevel::Debug => tracing::debug!("{}", line.message),
            LogLevel::Info | LogLevel::Request => tracing::info!("{}", line.message),
        }
        self.surface.append_log(line);
    }

    fn feedback(&mut self, text: &str) {
        self.surface.set(Field::Feedback, text);
    }

    /// Shows `err` to the user and hands it back.
    fn reject(&mut self, err: GatewayError) -> GatewayError {
        let msg = err.to_string();
        self.feedback(&msg);
        self.log(LogLevel::Error, msg);
        err
    }

    pub fn select_model(&mut self, name: &str) -> GatewayResult<()> {
        match provider::make_client(&self.config, Some(name), &self.settings) {
            Ok(client) => {
                let description = self
                    .config
                    .model(name)
                    .map(|m| m.description.clone())
                    .unwrap_or_default();
                let description = if description.is_empty() { "No description available.".to_string() } else { description };
                self.client = Some(client);
                self.feedback(&format!("Selected Model: {name}\n\nDescription: {description}"));
                self.log(LogLevel::Info, format!("Selected model: {name}"));
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Validates, builds the prompt and starts a worker. Precondition failures
    /// are reported before anything is sent.
    pub fn dispatch(&mut self, action: Action) -> GatewayResult<Uuid> {
        let job = match self.prepare(&action) {
            Ok(job) => job,
            Err(e) => return Err(self.reject(e)),
        };
        let client = match self.client.clone() {
            Some(c) => c,
            None => {
                return Err(self.reject(GatewayError::precondition(
                    "Error: No ChatGPT model selected. Please select a model first.",
                )))
            }
        };

        self.log(LogLevel::Debug, format!("Prompt for {}:\n{}", job.stage(), job.prompt));
        let id = job.id;
        self.in_flight += 1;
        worker::spawn_job(client, job, self.tx.clone());
        Ok(id)
    }

    fn prepare(&mut self, action: &Action) -> GatewayResult<Job> {
        match action {
            Action::Generate(module) => {
                let what = match module {
                    ModuleId::DataFormat => "Initiating data format suggestion.".to_string(),
                    m => format!("Initiating code generation for {m}."),
                };
                self.log(LogLevel::Info, what);

                let req = present::generation_request(&self.surface, *module);
                req.validate()?;
                Ok(Job {
                    id: Uuid::new_v4(),
                    kind: JobKind::Generate,
                    module: *module,
                    prompt: prompt::build_prompt(&req),
                    modification: None,
                })
            }
            Action::Refine { module, request } => {
                self.log(LogLevel::Info, "Initiating code refinement/modification.");
                let modification = match request {
                    Some(r) => r.trim().to_string(),
                    None => self.surface.get(Field::ModificationRequest).trim().to_string(),
                };
                self.log(
                    LogLevel::Request,
                    format!("Modification Request:\n{}", prompt::tagged_request(&modification)),
                );

                let target = self.history.refinement_target(*module)?;
                if modification.is_empty() {
                    return Err(GatewayError::precondition("Error: Enter a code modification request first."));
                }
                let req = RefineRequest {
                    target: target.module,
                    original_code: target.code.clone(),
                    modification: modification.clone(),
                };
                Ok(Job {
                    id: Uuid::new_v4(),
                    kind: JobKind::Refine,
                    module: req.target,
                    prompt: prompt::prompt_refine(&req),
                    modification: Some(modification),
                })
            }
        }
    }

    /// Applies one worker event to the fields and history.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Log(line) => self.surface.append_log(line),
            SessionEvent::Finished(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.finish(outcome);
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        let Outcome { job, raw, result } = outcome;
        let stage = job.stage();

        if self.settings.save_artifacts {
            match log::save_stage(&self.settings.state_dir(), &stage, job.id, &job.prompt, raw.as_deref(), &result) {
                Ok(saved) if self.settings.debug => log::print_saved_paths(&stage, &saved),
                Ok(_) => {}
                Err(e) => self.log(LogLevel::Warning, format!("Could not save artifacts for {stage}: {e}")),
            }
        }

        present::apply_result(&mut self.surface, job.module, &result);

        match &result {
            GenerationResult::Failure { error, .. } => {
                self.log(LogLevel::Error, format!("API Error: {error}"));
            }
            GenerationResult::Success(reply) if reply.is_explanation_only() => {
                self.log(
                    LogLevel::Warning,
                    format!("No code found in the response for {}; showing the explanation only.", job.module),
                );
            }
            GenerationResult::Success(reply) => {
                let entry = HistoryEntry::new(job.module, job.prompt, reply, job.modification);
                match self.history.append(entry) {
                    Ok(()) => {
                        let done = match job.kind {
                            JobKind::Generate if job.module == ModuleId::DataFormat => "Data format suggested successfully.".to_string(),
                            JobKind::Generate => format!("Code generation for {} completed.", job.module),
                            JobKind::Refine => format!("Code refinement/modification for {} completed.", job.module),
                        };
                        self.log(LogLevel::Info, done);
                    }
                    Err(e) => self.log(LogLevel::Warning, e.to_string()),
                }
            }
        }
    }

    /// Waits for the next worker event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Drains events until no worker is running.
    pub async fn wait_idle(&mut self) {
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(ev) => self.handle_event(ev),
                None => break,
            }
        }
        while let Ok(ev) = self.rx.try_recv() {
            self.handle_event(ev);
        }
    }

    pub fn add_board(&mut self, name: &str) -> GatewayResult<()> {
        match self.config.add_board(name) {
            Ok(BoardAdded::Added) => {
                self.config
                    .save(Path::new(&self.settings.config_path))
                    .map_err(|e| self.reject(e))?;
                let name = name.trim();
                self.feedback(&format!("Added new board: {name}"));
                self.log(LogLevel::Info, format!("Added new board: {name}"));
                Ok(())
            }
            Ok(BoardAdded::AlreadyExists) => {
                self.feedback("Board already exists.");
                self.log(LogLevel::Warning, "Attempted to add a board that already exists.");
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn show_technology(&mut self, name: &str) -> Option<String> {
        match self.config.technology_details(name).map(str::to_string) {
            Some(details) => {
                self.log(LogLevel::Info, format!("Selected technology: {name}"));
                Some(format!("Details: {details}"))
            }
            None => {
                self.log(LogLevel::Warning, format!("Selected unknown technology: {name}"));
                None
            }
        }
    }

    pub fn apply_preset(&mut self, name: &str) -> GatewayResult<()> {
        match self.presets.get(name).cloned() {
            Some(preset) => {
                present::apply_preset(&mut self.surface, &preset);
                self.log(LogLevel::Info, format!("Loaded example details for sensor: {name}"));
                Ok(())
            }
            None => {
                self.log(LogLevel::Warning, format!("No example data found for sensor: {name}"));
                Err(GatewayError::precondition(format!("No example data found for sensor: {name}")))
            }
        }
    }
}
