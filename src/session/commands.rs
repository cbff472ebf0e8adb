use crate::present::Field;
use crate::wire::ModuleId;

use super::Action;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Help,
    Fields,
    Show(Field),
    Set(Field, String),
    Load(String),
    Save(Option<String>),
    Preset(String),
    Presets,
    Run(Action),
    History,
    Boards,
    AddBoard(String),
    Tech(String),
    Models,
    Model(String),
    Quit,
}

pub const HELP: &str = "\
commands:
  fields                       list every field and a preview of its text
  show <field>                 print a field
  set <field> <text>           replace a field (quote text with spaces or use \\n)
  load <form.toml> | save [form.toml]
  presets | preset <name>      sensor examples from the presets file
  generate a|b                 generate code for Module A or Module B
  suggest                      suggest the A to B data format
  refine [a|b|format] <text>   rework the last generated code
  history                      list generated entries
  boards | add-board <name> | tech <name>
  models | model <name>        list or select the model
  quit";

/// Parses one interactive line. `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<SessionCommand>, String> {
    let words = shlex::split(line).ok_or_else(|| "unbalanced quotes".to_string())?;
    let Some((head, rest)) = words.split_first() else {
        return Ok(None);
    };
    let joined = || rest.join(" ");
    let need = |what: &str| -> Result<String, String> {
        let text = rest.join(" ");
        if text.trim().is_empty() {
            Err(format!("{head}: missing {what}"))
        } else {
            Ok(text)
        }
    };

    let cmd = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => SessionCommand::Help,
        "fields" => SessionCommand::Fields,
        "show" => SessionCommand::Show(field(&need("field")?)?),
        "set" => {
            let (name, text) = rest.split_first().ok_or_else(|| "set: missing field".to_string())?;
            SessionCommand::Set(field(name)?, text.join(" ").replace("\\n", "\n"))
        }
        "load" => SessionCommand::Load(need("path")?),
        "save" => SessionCommand::Save(Some(joined()).filter(|p| !p.is_empty())),
        "preset" => SessionCommand::Preset(need("preset name")?),
        "presets" => SessionCommand::Presets,
        "generate" | "gen" => {
            let module = module(&need("module")?)?;
            if module == ModuleId::DataFormat {
                return Err("use 'suggest' for the data format".into());
            }
            SessionCommand::Run(Action::Generate(module))
        }
        "suggest" => SessionCommand::Run(Action::Generate(ModuleId::DataFormat)),
        "refine" => {
            let (target, text) = match rest.split_first() {
                Some((first, tail)) => match ModuleId::parse(first) {
                    Some(m) => (Some(m), tail.join(" ")),
                    None => (None, rest.join(" ")),
                },
                None => (None, String::new()),
            };
            let request = Some(text).filter(|t| !t.trim().is_empty());
            SessionCommand::Run(Action::Refine { module: target, request })
        }
        "history" => SessionCommand::History,
        "boards" => SessionCommand::Boards,
        "add-board" | "add_board" => SessionCommand::AddBoard(need("board name")?),
        "tech" => SessionCommand::Tech(need("technology")?),
        "models" => SessionCommand::Models,
        "model" => SessionCommand::Model(need("model name")?),
        "quit" | "exit" | "q" => SessionCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(cmd))
}

fn field(name: &str) -> Result<Field, String> {
    name.parse::<Field>().map_err(|e| e.to_string())
}

fn module(name: &str) -> Result<ModuleId, String> {
    ModuleId::parse(name).ok_or_else(|| format!("unknown module '{name}' (a, b or format)"))
}
