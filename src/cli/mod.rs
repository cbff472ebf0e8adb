use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::wire::ModuleId;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[value(alias = "open-ai", alias = "openai")]
    OpenAI,
    #[value(alias = "anthropic")]
    Anthropic,
    #[value(alias = "ollama")]
    Ollama,
}

#[derive(Parser, Debug)]
#[command(name = "gateway_codegen", version, about = "Generate Arduino code for a two-module IoT gateway with an LLM")]
pub struct Args {
    /// Workspace root; run state lives in <root>/.gateway
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Gateway configuration (boards, technologies, models)
    #[arg(long, default_value = "config.json")]
    pub config: String,

    /// Sensor presets file
    #[arg(long, default_value = "sensors.json")]
    pub sensors: String,

    /// Configured model to use
    #[arg(long)]
    pub model: Option<String>,

    /// Overrides the provider named in the model's config entry
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Request timeout; no timeout when omitted
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, default_value_t = 1500)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub save_artifacts: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub progress: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive session (default)
    Session {
        /// Form file to load at start and save on quit
        #[arg(long)]
        form: Option<String>,
    },
    /// Generate code for Module A or Module B from a form file
    Generate {
        #[arg(long, value_enum)]
        module: ModuleId,
        #[arg(long, default_value = "gateway.toml")]
        form: String,
    },
    /// Suggest the A to B data format from the sensor fields of a form file
    Suggest {
        #[arg(long, default_value = "gateway.toml")]
        form: String,
    },
    /// Rework previously generated code
    Refine {
        /// Defaults to the most recently generated module
        #[arg(long, value_enum)]
        module: Option<ModuleId>,
        /// Falls back to the form's modification_request field
        #[arg(long)]
        request: Option<String>,
        #[arg(long, default_value = "gateway.toml")]
        form: String,
    },
    /// Register a development board in the config file
    AddBoard { name: String },
    Boards,
    Technologies,
    Models,
    /// List stored generation history
    History,
    /// Write an empty form file
    InitForm {
        #[arg(default_value = "gateway.toml")]
        path: String,
    },
}
