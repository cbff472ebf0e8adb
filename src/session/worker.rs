use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::parse;
use crate::present::{LogLevel, LogLine};
use crate::provider::{CompletionClient, DynClient};
use crate::wire::{GenerationResult, ModuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Generate,
    Refine,
}

/// One prompt on its way to the completion service.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub module: ModuleId,
    pub prompt: String,
    pub modification: Option<String>,
}

impl Job {
    pub fn stage(&self) -> String {
        match self.kind {
            JobKind::Generate => self.module.to_string(),
            JobKind::Refine => format!("refine_{}", self.module),
        }
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub job: Job,
    /// Completion text as received; `None` when the request itself failed.
    pub raw: Option<String>,
    pub result: GenerationResult,
}

#[derive(Debug)]
pub enum SessionEvent {
    Log(LogLine),
    Finished(Outcome),
}

/// Completion followed by parsing. Never fails: errors come back as the failure shape.
pub async fn run_completion(client: &dyn CompletionClient, prompt: &str) -> (Option<String>, GenerationResult) {
    match client.complete(prompt).await {
        Ok(raw) => {
            let result = parse::parse(&raw);
            (Some(raw), result)
        }
        Err(e) => (None, GenerationResult::from(e)),
    }
}

/// Runs `job` on its own task. Exactly one `Finished` event is sent, even if
/// the completion panics.
pub fn spawn_job(client: DynClient, job: Job, events: UnboundedSender<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = events.send(SessionEvent::Log(LogLine::now(
            LogLevel::Info,
            format!("Sending prompt to {} for {}.", client.model(), job.module),
        )));

        let prompt = job.prompt.clone();
        let inner = tokio::spawn(async move { run_completion(client.as_ref(), &prompt).await });
        let (raw, result) = match inner.await {
            Ok(done) => done,
            Err(e) => (
                None,
                GenerationResult::Failure {
                    error: format!("An unexpected error occurred while processing {}: {e}", job.module),
                    raw_response: String::new(),
                },
            ),
        };

        let _ = events.send(SessionEvent::Finished(Outcome { job, raw, result }));
    })
}
