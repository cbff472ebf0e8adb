//! Append-only record of successful generations.
//!
//! Entries are kept per module; a separate arrival order answers "what was
//! generated last", which is what refinement targets when no module is named.

use fs_err as fs;
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{GatewayError, GatewayResult};
use crate::wire::{HistoryEntry, ModuleId};

#[derive(Debug, Clone, Default)]
pub struct RefinementHistory {
    entries: BTreeMap<ModuleId, Vec<HistoryEntry>>,
    /// (module, index into that module's entries), oldest first.
    order: Vec<(ModuleId, usize)>,
}

impl RefinementHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: HistoryEntry) -> GatewayResult<()> {
        if entry.code.trim().is_empty() {
            return Err(GatewayError::precondition("history entries need generated code"));
        }
        let module = entry.module;
        let list = self.entries.entry(module).or_default();
        list.push(entry);
        self.order.push((module, list.len() - 1));
        Ok(())
    }

    pub fn last(&self, module: ModuleId) -> Option<&HistoryEntry> {
        self.entries.get(&module).and_then(|v| v.last())
    }

    /// Most recent entry across all modules.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        let (module, idx) = self.order.last()?;
        self.entries.get(module).and_then(|v| v.get(*idx))
    }

    /// Entry a refinement works on: the named module's newest, or the newest overall.
    pub fn refinement_target(&self, module: Option<ModuleId>) -> GatewayResult<&HistoryEntry> {
        let found = match module {
            Some(m) => self.last(m),
            None => self.latest(),
        };
        match found {
            Some(e) if !e.code.trim().is_empty() => Ok(e),
            Some(_) => Err(GatewayError::precondition("Error: Original code is missing from history.")),
            None => Err(GatewayError::precondition(match module {
                Some(m) => format!("Error: No code history available for {m}."),
                None => "Error: No code history available for refinement.".to_string(),
            })),
        }
    }

    pub fn entries(&self, module: ModuleId) -> &[HistoryEntry] {
        self.entries.get(&module).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.order
            .iter()
            .filter_map(|(m, i)| self.entries.get(m).and_then(|v| v.get(*i)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn load(path: &Path) -> GatewayResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let entries: Vec<HistoryEntry> = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))?;
        let mut history = Self::new();
        for entry in entries {
            history.append(entry)?;
        }
        Ok(history)
    }

    /// Stored as a flat list in arrival order.
    pub fn save(&self, path: &Path) -> GatewayResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let flat: Vec<&HistoryEntry> = self.iter().collect();
        let json = serde_json::to_string_pretty(&flat)
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::CodeReply;

    fn entry(module: ModuleId, code: &str) -> HistoryEntry {
        HistoryEntry::new(module, format!("prompt for {code}"), &CodeReply::new(code, "why"), None)
    }

    #[test]
    fn append_then_last_returns_it() {
        let mut h = RefinementHistory::new();
        let e = entry(ModuleId::ModuleA, "int a;");
        h.append(e.clone()).unwrap();
        assert_eq!(h.last(ModuleId::ModuleA), Some(&e));
        assert_eq!(h.latest(), Some(&e));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn empty_code_is_rejected() {
        let mut h = RefinementHistory::new();
        assert!(h.append(entry(ModuleId::ModuleB, "  ")).is_err());
        assert!(h.is_empty());
    }

    #[test]
    fn modules_keep_separate_sequences() {
        let mut h = RefinementHistory::new();
        h.append(entry(ModuleId::ModuleA, "a1")).unwrap();
        h.append(entry(ModuleId::ModuleB, "b1")).unwrap();
        h.append(entry(ModuleId::ModuleA, "a2")).unwrap();

        assert_eq!(h.last(ModuleId::ModuleA).unwrap().code, "a2");
        assert_eq!(h.last(ModuleId::ModuleB).unwrap().code, "b1");
        assert!(h.last(ModuleId::DataFormat).is_none());
        assert_eq!(h.latest().unwrap().code, "a2");
        assert_eq!(h.entries(ModuleId::ModuleA).len(), 2);

        let codes: Vec<&str> = h.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["a1", "b1", "a2"]);
    }

    #[test]
    fn refinement_target_by_module_or_latest() {
        let mut h = RefinementHistory::new();
        assert!(h.refinement_target(None).unwrap_err().is_precondition());

        h.append(entry(ModuleId::ModuleA, "a1")).unwrap();
        h.append(entry(ModuleId::ModuleB, "b1")).unwrap();
        assert_eq!(h.refinement_target(Some(ModuleId::ModuleA)).unwrap().code, "a1");
        assert_eq!(h.refinement_target(None).unwrap().module, ModuleId::ModuleB);

        let err = h.refinement_target(Some(ModuleId::DataFormat)).unwrap_err();
        assert!(err.to_string().contains("data_format"));
    }

    #[test]
    fn save_and_load_preserve_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.json");

        let mut h = RefinementHistory::new();
        h.append(entry(ModuleId::ModuleB, "b1")).unwrap();
        h.append(entry(ModuleId::ModuleA, "a1")).unwrap();
        h.save(&path).unwrap();

        let loaded = RefinementHistory::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.latest().unwrap().code, "a1");
        assert_eq!(loaded.iter().next().unwrap().code, "b1");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let h = RefinementHistory::load(&dir.path().join("nope.json")).unwrap();
        assert!(h.is_empty());
    }
}
