//! Named text fields the core reads its inputs from and writes results to.

use chrono::{DateTime, Local};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::config::SensorPreset;
use crate::errors::{GatewayError, GatewayResult};
use crate::wire::{GenerationRequest, GenerationResult, ModuleId, ModuleInputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    SensorType,
    SensorDescription,
    SensorTechnology,
    SensorBoard,
    ModuleACode,
    EndpointType,
    EndpointDescription,
    EndpointTechnology,
    EndpointBoard,
    ModuleBCode,
    DataFormat,
    Feedback,
    ModificationRequest,
    ExampleCode1,
    ExampleCode2,
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::SensorType,
        Field::SensorDescription,
        Field::SensorTechnology,
        Field::SensorBoard,
        Field::ModuleACode,
        Field::EndpointType,
        Field::EndpointDescription,
        Field::EndpointTechnology,
        Field::EndpointBoard,
        Field::ModuleBCode,
        Field::DataFormat,
        Field::Feedback,
        Field::ModificationRequest,
        Field::ExampleCode1,
        Field::ExampleCode2,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::SensorType => "sensor_type",
            Field::SensorDescription => "sensor_description",
            Field::SensorTechnology => "sensor_technology",
            Field::SensorBoard => "sensor_board",
            Field::ModuleACode => "module_a_code",
            Field::EndpointType => "endpoint_type",
            Field::EndpointDescription => "endpoint_description",
            Field::EndpointTechnology => "endpoint_technology",
            Field::EndpointBoard => "endpoint_board",
            Field::ModuleBCode => "module_b_code",
            Field::DataFormat => "data_format",
            Field::Feedback => "feedback",
            Field::ModificationRequest => "modification_request",
            Field::ExampleCode1 => "example_code_1",
            Field::ExampleCode2 => "example_code_2",
        }
    }

    /// Where generated output for `module` is shown.
    pub fn code_field(module: ModuleId) -> Field {
        match module {
            ModuleId::ModuleA => Field::ModuleACode,
            ModuleId::ModuleB => Field::ModuleBCode,
            ModuleId::DataFormat => Field::DataFormat,
        }
    }

    /// Input fields describing one side of the gateway: kind, description, technology, board.
    fn inputs_of(module: ModuleId) -> [Field; 4] {
        match module {
            ModuleId::ModuleA | ModuleId::DataFormat => [
                Field::SensorType,
                Field::SensorDescription,
                Field::SensorTechnology,
                Field::SensorBoard,
            ],
            ModuleId::ModuleB => [
                Field::EndpointType,
                Field::EndpointDescription,
                Field::EndpointTechnology,
                Field::EndpointBoard,
            ],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| GatewayError::precondition(format!("unknown field '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
    Request,
}

impl LogLevel {
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
            LogLevel::Request => "REQUEST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self { at: Local::now(), level, message: message.into() }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.at.format("%Y-%m-%d %H:%M:%S"), self.level.tag(), self.message)
    }
}

/// What the core needs from a display: replace a field's text, read it back,
/// and append to a log.
pub trait Surface {
    fn get(&self, field: Field) -> String;
    fn set(&mut self, field: Field, text: &str);
    fn append_log(&mut self, line: LogLine);
}

/// In-memory fields; saved to and loaded from a flat TOML form.
#[derive(Debug, Clone, Default)]
pub struct FieldStore {
    values: BTreeMap<Field, String>,
    log: Vec<LogLine>,
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct FormFile(BTreeMap<String, String>);

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &[LogLine] {
        &self.log
    }

    pub fn from_toml(text: &str) -> GatewayResult<Self> {
        let form: FormFile = toml::from_str(text).map_err(|e| GatewayError::Config(e.to_string()))?;
        let mut store = Self::new();
        for (k, v) in form.0 {
            match k.parse::<Field>() {
                Ok(f) => store.set(f, &v),
                Err(_) => tracing::warn!(key = %k, "ignoring unknown form key"),
            }
        }
        Ok(store)
    }

    /// Every field is written, empty ones included, so the file doubles as a template.
    pub fn to_toml(&self) -> GatewayResult<String> {
        let map: BTreeMap<String, String> =
            Field::ALL.into_iter().map(|f| (f.key().to_string(), self.get(f))).collect();
        toml::to_string(&FormFile(map)).map_err(|e| GatewayError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> GatewayResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| match e {
            GatewayError::Config(m) => GatewayError::Config(format!("{}: {m}", path.display())),
            other => other,
        })
    }

    pub fn save(&self, path: &Path) -> GatewayResult<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

impl Surface for FieldStore {
    fn get(&self, field: Field) -> String {
        self.values.get(&field).cloned().unwrap_or_default()
    }

    fn set(&mut self, field: Field, text: &str) {
        self.values.insert(field, text.to_string());
    }

    fn append_log(&mut self, line: LogLine) {
        self.log.push(line);
    }
}

pub fn module_inputs(surface: &dyn Surface, module: ModuleId) -> ModuleInputs {
    let [kind, description, technology, board] = Field::inputs_of(module).map(|f| surface.get(f).trim().to_string());
    ModuleInputs { kind, description, technology, board }
}

/// Snapshot of the fields a generation for `module` reads.
pub fn generation_request(surface: &dyn Surface, module: ModuleId) -> GenerationRequest {
    GenerationRequest {
        module,
        inputs: module_inputs(surface, module),
        data_format: surface.get(Field::DataFormat).trim().to_string(),
        examples: vec![
            surface.get(Field::ExampleCode1).trim().to_string(),
            surface.get(Field::ExampleCode2).trim().to_string(),
        ],
    }
}

pub fn apply_preset(surface: &mut dyn Surface, preset: &SensorPreset) {
    let inputs = preset.inputs();
    let [kind, description, technology, board] = Field::inputs_of(ModuleId::ModuleA);
    surface.set(kind, &inputs.kind);
    surface.set(description, &inputs.description);
    surface.set(technology, &inputs.technology);
    surface.set(board, &inputs.board);
    surface.set(Field::DataFormat, &preset.data_format_text());
}

/// Routes a result onto the display. An explanation-only reply leaves the
/// module's code field untouched.
pub fn apply_result(surface: &mut dyn Surface, module: ModuleId, result: &GenerationResult) {
    match result {
        GenerationResult::Success(reply) => {
            if !reply.is_explanation_only() {
                surface.set(Field::code_field(module), &reply.code);
            }
            surface.set(Field::Feedback, &reply.explanation);
        }
        GenerationResult::Failure { error, raw_response } => {
            let text = format!("Error: {error}\n{raw_response}");
            surface.set(Field::Feedback, text.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::CodeReply;

    #[test]
    fn field_names_round_trip() {
        for f in Field::ALL {
            assert_eq!(f.key().parse::<Field>().unwrap(), f);
        }
        assert_eq!("Module_A_Code".parse::<Field>().unwrap(), Field::ModuleACode);
        assert!("nope".parse::<Field>().is_err());
    }

    #[test]
    fn request_reads_module_fields() {
        let mut s = FieldStore::new();
        s.set(Field::SensorType, " DHT22 ");
        s.set(Field::SensorDescription, "temp + humidity");
        s.set(Field::EndpointType, "REST");
        s.set(Field::DataFormat, "{\"t\":1}\n");
        s.set(Field::ExampleCode2, "// two");

        let a = generation_request(&s, ModuleId::ModuleA);
        assert_eq!(a.inputs.kind, "DHT22");
        assert_eq!(a.data_format, "{\"t\":1}");
        assert_eq!(a.examples, ["", "// two"]);

        let b = generation_request(&s, ModuleId::ModuleB);
        assert_eq!(b.inputs.kind, "REST");

        let f = generation_request(&s, ModuleId::DataFormat);
        assert_eq!(f.inputs.kind, "DHT22");
    }

    #[test]
    fn success_routes_code_and_explanation() {
        let mut s = FieldStore::new();
        apply_result(&mut s, ModuleId::ModuleB, &GenerationResult::Success(CodeReply::new("void loop(){}", "- loops")));
        assert_eq!(s.get(Field::ModuleBCode), "void loop(){}");
        assert_eq!(s.get(Field::Feedback), "- loops");

        apply_result(&mut s, ModuleId::DataFormat, &GenerationResult::Success(CodeReply::new("{t:1}", "short")));
        assert_eq!(s.get(Field::DataFormat), "{t:1}");
    }

    #[test]
    fn explanation_only_keeps_existing_code() {
        let mut s = FieldStore::new();
        s.set(Field::ModuleACode, "old");
        apply_result(&mut s, ModuleId::ModuleA, &GenerationResult::Success(CodeReply::new("", "I cannot help with that.")));
        assert_eq!(s.get(Field::ModuleACode), "old");
        assert_eq!(s.get(Field::Feedback), "I cannot help with that.");
    }

    #[test]
    fn failure_shows_error_and_raw_body() {
        let mut s = FieldStore::new();
        let r = GenerationResult::Failure { error: "Error parsing response.".into(), raw_response: "<html>".into() };
        apply_result(&mut s, ModuleId::ModuleA, &r);
        assert_eq!(s.get(Field::Feedback), "Error: Error parsing response.\n<html>");

        let r = GenerationResult::Failure { error: "timed out".into(), raw_response: String::new() };
        apply_result(&mut s, ModuleId::ModuleA, &r);
        assert_eq!(s.get(Field::Feedback), "Error: timed out");
    }

    #[test]
    fn form_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        let mut s = FieldStore::new();
        s.set(Field::SensorType, "Ruuvitag");
        s.set(Field::ModuleACode, "void setup() {\n  Serial.begin(115200);\n}\n");
        s.save(&path).unwrap();

        let back = FieldStore::load(&path).unwrap();
        assert_eq!(back.get(Field::SensorType), "Ruuvitag");
        assert_eq!(back.get(Field::ModuleACode), s.get(Field::ModuleACode));
        assert_eq!(back.get(Field::Feedback), "");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("endpoint_board"));
    }

    #[test]
    fn unknown_form_keys_are_ignored() {
        let s = FieldStore::from_toml("sensor_type = \"x\"\ncolour = \"red\"\n").unwrap();
        assert_eq!(s.get(Field::SensorType), "x");
    }

    #[test]
    fn log_line_format() {
        let line = LogLine::now(LogLevel::Request, "[REQUEST] add deep sleep");
        let text = line.to_string();
        assert!(text.ends_with("] [REQUEST] [REQUEST] add deep sleep"));
    }
}
