use fs_err as fs;
use serde_json::to_string_pretty;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::errors::{GatewayError, GatewayResult};
use crate::wire::GenerationResult;

/// Session messages already reach the terminal through the surface, so the
/// stderr subscriber only shows warnings unless `--debug` or `RUST_LOG` say otherwise.
pub fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub struct SavedPaths {
    pub dir: PathBuf,
    pub prompt: PathBuf,
    pub response: Option<PathBuf>,
    pub result: PathBuf,
}

fn tx_dir(state_dir: &Path, tx: Uuid) -> PathBuf {
    state_dir.join("tx").join(tx.to_string())
}

/// Writes one completion round trip under `<state_dir>/tx/<tx>/`.
pub fn save_stage(
    state_dir: &Path,
    stage: &str,
    tx: Uuid,
    prompt: &str,
    raw_response: Option<&str>,
    result: &GenerationResult,
) -> GatewayResult<SavedPaths> {
    let dir = tx_dir(state_dir, tx);
    fs::create_dir_all(&dir)?;

    let prompt_path = dir.join(format!("{stage}.prompt.txt"));
    fs::write(&prompt_path, prompt)?;

    let mut response_path = None;
    if let Some(raw) = raw_response {
        let p = dir.join(format!("{stage}.response.txt"));
        fs::write(&p, raw)?;
        response_path = Some(p);
    }

    let result_path = dir.join(format!("{stage}.result.json"));
    let json = to_string_pretty(result).map_err(|e| GatewayError::Config(e.to_string()))?;
    fs::write(&result_path, json)?;

    Ok(SavedPaths { dir, prompt: prompt_path, response: response_path, result: result_path })
}

pub fn print_saved_paths(stage: &str, saved: &SavedPaths) {
    eprintln!("debug[{stage}]: artifacts directory: {}", saved.dir.display());
    eprintln!("debug[{stage}]: prompt saved at: {}", saved.prompt.display());
    match &saved.response {
        Some(p) => eprintln!("debug[{stage}]: response saved at: {}", p.display()),
        None => eprintln!("debug[{stage}]: no response body (request failed)"),
    }
    eprintln!("debug[{stage}]: result saved at: {}", saved.result.display());
    std::io::stderr().flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::CodeReply;

    #[test]
    fn writes_prompt_response_and_result() {
        let dir = tempfile::tempdir().unwrap();
        let tx = Uuid::new_v4();
        let result = GenerationResult::Success(CodeReply::new("int x;", "why"));
        let saved = save_stage(dir.path(), "module_a", tx, "the prompt", Some("raw"), &result).unwrap();

        assert!(saved.dir.ends_with(tx.to_string()));
        assert_eq!(fs::read_to_string(&saved.prompt).unwrap(), "the prompt");
        assert_eq!(fs::read_to_string(saved.response.as_ref().unwrap()).unwrap(), "raw");
        let json = fs::read_to_string(&saved.result).unwrap();
        assert!(json.contains("\"status\": \"success\""));
        assert!(json.contains("\"code\": \"int x;\""));
    }

    #[test]
    fn failed_request_has_no_response_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = GenerationResult::Failure { error: "refused".into(), raw_response: String::new() };
        let saved = save_stage(dir.path(), "refine", Uuid::new_v4(), "p", None, &result).unwrap();
        assert!(saved.response.is_none());
        assert!(fs::read_to_string(&saved.result).unwrap().contains("\"error\": \"refused\""));
    }
}
