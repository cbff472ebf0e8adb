use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{GatewayError, GatewayResult};

/// ========================================
/// Generation protocol data model
/// ========================================

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    #[value(name = "a", alias = "module_a", alias = "module-a")]
    ModuleA,
    #[value(name = "b", alias = "module_b", alias = "module-b")]
    ModuleB,
    #[value(name = "format", alias = "data_format", alias = "data-format")]
    DataFormat,
}

impl ModuleId {
    pub const ALL: [ModuleId; 3] = [ModuleId::ModuleA, ModuleId::ModuleB, ModuleId::DataFormat];

    pub fn label(self) -> &'static str {
        match self {
            ModuleId::ModuleA => "Module A",
            ModuleId::ModuleB => "Module B",
            ModuleId::DataFormat => "data format",
        }
    }

    /// Parses the short names used on the command line and in the session.
    pub fn parse(s: &str) -> Option<ModuleId> {
        <ModuleId as ValueEnum>::from_str(s.trim(), true).ok()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModuleId::ModuleA => "module_a",
            ModuleId::ModuleB => "module_b",
            ModuleId::DataFormat => "data_format",
        })
    }
}

/// User-entered description of one side of the gateway.
/// For Module A `kind` is the sensor type, for Module B the endpoint type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleInputs {
    pub kind: String,
    pub description: String,
    pub technology: String,
    pub board: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub module: ModuleId,
    pub inputs: ModuleInputs,
    pub data_format: String,
    pub examples: Vec<String>,
}

impl GenerationRequest {
    /// Checks the fields the prompt for `module` cannot do without.
    pub fn validate(&self) -> GatewayResult<()> {
        let blank = |s: &str| s.trim().is_empty();
        match self.module {
            ModuleId::ModuleA => {
                if blank(&self.inputs.kind) || blank(&self.inputs.description) || blank(&self.data_format) {
                    return Err(GatewayError::precondition(
                        "Error: Fill all fields for module_a and define the data format.",
                    ));
                }
            }
            ModuleId::ModuleB => {
                if blank(&self.data_format) {
                    return Err(GatewayError::precondition(
                        "Error: Fill all fields for module_b and define the data format.",
                    ));
                }
            }
            ModuleId::DataFormat => {
                if blank(&self.inputs.kind) || blank(&self.inputs.description) {
                    return Err(GatewayError::precondition(
                        "Error: Please fill out the sensor type and description fields.",
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn example(&self, idx: usize) -> &str {
        self.examples.get(idx).map(|s| s.trim()).unwrap_or("")
    }
}

/// Follow-up request that asks the model to rework previously generated code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineRequest {
    pub target: ModuleId,
    pub original_code: String,
    pub modification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReply {
    pub code: String,
    pub explanation: String,
}

impl CodeReply {
    pub fn new(code: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self { code: code.into(), explanation: explanation.into() }
    }

    /// No usable code was recovered; only the explanation can be shown.
    pub fn is_explanation_only(&self) -> bool {
        self.code.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerationResult {
    Success(CodeReply),
    Failure { error: String, raw_response: String },
}

impl From<GatewayError> for GenerationResult {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Transport { message, raw_response } => {
                GenerationResult::Failure { error: message, raw_response }
            }
            other => GenerationResult::Failure { error: other.to_string(), raw_response: String::new() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub module: ModuleId,
    pub prompt: String,
    pub code: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_request: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(module: ModuleId, prompt: String, reply: &CodeReply, modification_request: Option<String>) -> Self {
        Self {
            module,
            prompt,
            code: reply.code.clone(),
            explanation: reply.explanation.clone(),
            modification_request,
            created_at: Utc::now(),
        }
    }
}
