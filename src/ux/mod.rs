use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

use crate::config::{GatewayConfig, SensorPresets};
use crate::history::RefinementHistory;
use crate::present::{Field, FieldStore, LogLevel, LogLine, Surface};
use crate::wire::ModuleId;

/// Fields echoed to the terminal whenever they change.
const ECHOED: [Field; 4] = [Field::ModuleACode, Field::ModuleBCode, Field::DataFormat, Field::Feedback];

/// Terminal rendition of the display: values live in a `FieldStore`, output
/// fields and log lines are printed as they arrive.
pub struct TerminalSurface {
    store: FieldStore,
    spinner: Option<ProgressBar>,
}

impl TerminalSurface {
    pub fn new(store: FieldStore) -> Self {
        Self { store, spinner: None }
    }

    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    /// Replaces every field value with the one in `other`; the log is kept.
    pub fn load_fields(&mut self, other: &FieldStore) {
        for f in Field::ALL {
            self.store.set(f, &other.get(f));
        }
    }

    pub fn start_spinner(&mut self, msg: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(msg.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    pub fn finish_spinner(&mut self) {
        if let Some(s) = self.spinner.take() {
            s.finish_and_clear();
        }
    }

    fn emit(&self, text: String) {
        match &self.spinner {
            Some(s) => s.suspend(|| println!("{text}")),
            None => println!("{text}"),
        }
    }
}

impl Surface for TerminalSurface {
    fn get(&self, field: Field) -> String {
        self.store.get(field)
    }

    fn set(&mut self, field: Field, text: &str) {
        self.store.set(field, text);
        if ECHOED.contains(&field) {
            self.emit(format!("\n{}\n{}\n", header(field), text));
        }
    }

    fn append_log(&mut self, line: LogLine) {
        self.emit(colored_line(&line));
        self.store.append_log(line);
    }
}

fn header(field: Field) -> String {
    format!("=== {} ===", field.key().to_uppercase()).bold().to_string()
}

fn colored_line(line: &LogLine) -> String {
    let tag = format!("[{}]", line.level.tag());
    let tag = match line.level {
        LogLevel::Info => tag.green(),
        LogLevel::Warning => tag.yellow(),
        LogLevel::Error => tag.red().bold(),
        LogLevel::Debug => tag.blue(),
        LogLevel::Request => tag.magenta(),
    };
    format!("[{}] {} {}", line.at.format("%Y-%m-%d %H:%M:%S"), tag, line.message)
}

pub fn prompt() {
    print!("{} ", "gateway>".cyan().bold());
    let _ = io::stdout().flush();
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn print_banner(model: Option<&str>) {
    println!("{}", "IoT gateway code generator".bold());
    match model {
        Some(m) => println!("model: {}", m.green()),
        None => println!("model: {}  (use 'models' and 'model <name>')", "none".yellow()),
    }
    println!("type 'help' for commands\n");
}

pub fn print_field(field: Field, text: &str) {
    println!("{}", header(field));
    if text.is_empty() {
        println!("{}", "(empty)".dimmed());
    } else {
        println!("{text}");
    }
}

/// One line per field with the first line of its text.
pub fn print_fields(store: &FieldStore) {
    for f in Field::ALL {
        let value = store.get(f);
        let first = value.lines().next().unwrap_or("");
        let more = if value.lines().count() > 1 { " ..." } else { "" };
        println!("  {:<22} {}{}", f.key().bold(), first, more.dimmed());
    }
}

pub fn print_history(history: &RefinementHistory) {
    if history.is_empty() {
        println!("(no history)");
        return;
    }
    let counts: Vec<String> = ModuleId::ALL
        .into_iter()
        .map(|m| format!("{}: {}", m.label(), history.entries(m).len()))
        .collect();
    println!("{}", counts.join("   ").bold());
    for (i, e) in history.iter().enumerate() {
        let label = match e.module {
            ModuleId::ModuleA => "[MODULE A]".green().bold(),
            ModuleId::ModuleB => "[MODULE B]".yellow().bold(),
            ModuleId::DataFormat => "[FORMAT]".cyan().bold(),
        };
        println!("{}. {}  {}", i + 1, label, e.created_at.format("%Y-%m-%d %H:%M:%S"));
        if let Some(m) = &e.modification_request {
            println!("{}", indent(&format!("request: {m}"), 3));
        }
        let lines = e.code.lines().count();
        println!("{}", indent(&format!("{lines} line(s) of code"), 3));
    }
}

pub fn print_boards(cfg: &GatewayConfig) {
    println!("{}", "Boards:".bold());
    for b in &cfg.boards {
        println!("  {b}");
    }
}

pub fn print_technologies(cfg: &GatewayConfig) {
    println!("{}", "Technologies:".bold());
    for (name, details) in &cfg.technologies {
        println!("  {}\n{}", name.bold(), indent(details, 4));
    }
}

pub fn print_models(cfg: &GatewayConfig, selected: Option<&str>) {
    println!("{}", "Models:".bold());
    for (name, m) in &cfg.models {
        let mark = if Some(name.as_str()) == selected { "*".green().bold().to_string() } else { " ".to_string() };
        let key = if m.key.trim().is_empty() { "no key".yellow().to_string() } else { "key set".to_string() };
        println!("{mark} {}  ({:?}, {key})", name.bold(), m.provider);
        if !m.description.is_empty() {
            println!("{}", indent(&m.description, 4));
        }
    }
}

pub fn print_presets(presets: &SensorPresets) {
    if presets.sensors.is_empty() {
        println!("(no sensor presets)");
        return;
    }
    println!("{}", "Sensor presets:".bold());
    for (name, p) in &presets.sensors {
        println!("  {}  {} / {}", name.bold(), p.technology, p.board);
    }
}

fn indent(s: &str, n: usize) -> String {
    let pad = " ".repeat(n);
    s.lines()
        .map(|l| format!("{}{}", pad, l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_keeps_values_and_log() {
        let mut t = TerminalSurface::new(FieldStore::new());
        t.set(Field::Feedback, "hello");
        t.set(Field::SensorType, "DHT22");
        t.append_log(LogLine::now(LogLevel::Info, "started"));
        assert_eq!(t.get(Field::Feedback), "hello");
        assert_eq!(t.store().get(Field::SensorType), "DHT22");
        assert_eq!(t.store().log().len(), 1);
    }

    #[test]
    fn load_fields_overwrites_values() {
        let mut t = TerminalSurface::new(FieldStore::new());
        t.set(Field::SensorBoard, "Uno");
        let mut other = FieldStore::new();
        other.set(Field::SensorType, "BME280");
        t.load_fields(&other);
        assert_eq!(t.get(Field::SensorType), "BME280");
        assert_eq!(t.get(Field::SensorBoard), "");
    }

    #[test]
    fn indent_pads_every_line() {
        assert_eq!(indent("a\nb", 2), "  a\n  b");
    }
}
