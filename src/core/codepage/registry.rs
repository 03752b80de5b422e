//! Code-page registry
//!
//! Descriptors are registered (and validated) up front; each table is built
//! lazily on first request and then shared. The registry is an ordinary value
//! handed to sessions, so tests and applications can each own one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use super::descriptor::CodepageDescriptor;
use super::table::CodepageTable;
use super::TableConverter;
use crate::core::error::{Error, Result};

macro_rules! builtin_pages {
    ($($id:literal),* $(,)?) => {
        &[$(($id, include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/codepages/ccsid", $id, ".json")))),*]
    };
}

/// Descriptors shipped with the library
const BUILTIN: &[(&str, &str)] = builtin_pages!(
    "37", "273", "277", "278", "280", "284", "285", "297", "424", "500", "870", "871", "875",
    "930", "1025", "1026", "1112", "1122", "1140", "1141", "1147", "1148",
);

struct Entry {
    descriptor: CodepageDescriptor,
    table: OnceLock<Arc<CodepageTable>>,
}

/// Registry of code-page descriptors and their lazily built tables
#[derive(Default)]
pub struct CodepageRegistry {
    entries: HashMap<String, Entry>,
}

impl std::fmt::Debug for CodepageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodepageRegistry")
            .field("codepages", &self.available())
            .finish()
    }
}

/// Canonical lookup key: `037`, `CCSID37`, `cp037` and `IBM-037` all become `37`
pub fn normalize_id(id: &str) -> String {
    let trimmed = id.trim();
    let lower = trimmed.to_ascii_lowercase();
    let stripped = ["ccsid-", "ccsid", "ibm-", "ibm", "cp"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(&lower);
    if !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_digit()) {
        let digits = stripped.trim_start_matches('0');
        if digits.is_empty() {
            "0".to_string()
        } else {
            digits.to_string()
        }
    } else {
        lower
    }
}

impl CodepageRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in code page
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for (id, json) in BUILTIN {
            let descriptor = CodepageDescriptor::from_json(json)
                .map_err(|e| Error::Configuration(format!("Built-in code page {id}: {e}")))?;
            registry.register(descriptor)?;
        }
        debug!("Loaded {} built-in code pages", registry.len());
        Ok(registry)
    }

    /// Register a descriptor, validating it now
    pub fn register(&mut self, descriptor: CodepageDescriptor) -> Result<()> {
        descriptor.validate()?;
        let key = normalize_id(&descriptor.id);
        if self.entries.contains_key(&key) {
            return Err(Error::Configuration(format!(
                "Code page '{}' is already registered",
                descriptor.id
            )));
        }
        self.entries.insert(
            key,
            Entry {
                descriptor,
                table: OnceLock::new(),
            },
        );
        Ok(())
    }

    /// Register every descriptor contained in a JSON document
    pub fn load_json(&mut self, json: &str) -> Result<usize> {
        let descriptors = CodepageDescriptor::parse_many(json)?;
        let count = descriptors.len();
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(count)
    }

    /// Register every `*.json` descriptor file in a directory
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let read_dir = std::fs::read_dir(dir).map_err(|e| {
            Error::Configuration(format!("Cannot read code page directory {}: {e}", dir.display()))
        })?;

        let mut paths: Vec<_> = read_dir
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut count = 0;
        for path in paths {
            let json = std::fs::read_to_string(&path).map_err(|e| {
                Error::Configuration(format!("Cannot read {}: {e}", path.display()))
            })?;
            count += self
                .load_json(&json)
                .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
        }
        info!("Loaded {} code pages from {}", count, dir.display());
        Ok(count)
    }

    /// Shared table for a code page, built on first use
    pub fn table(&self, id: &str) -> Result<Arc<CodepageTable>> {
        let entry = self
            .entries
            .get(&normalize_id(id))
            .ok_or_else(|| Error::unknown_codepage(id))?;
        Ok(entry
            .table
            .get_or_init(|| {
                debug!("Building code page table {}", entry.descriptor.id);
                Arc::new(CodepageTable::from_descriptor(&entry.descriptor))
            })
            .clone())
    }

    /// Fresh converter (with its own shift state) for a code page
    pub fn converter(&self, id: &str) -> Result<TableConverter> {
        self.table(id).map(TableConverter::new)
    }

    /// Whether a code page id resolves
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(&normalize_id(id))
    }

    /// Descriptor for a code page id
    pub fn descriptor(&self, id: &str) -> Option<&CodepageDescriptor> {
        self.entries.get(&normalize_id(id)).map(|e| &e.descriptor)
    }

    /// Registered ids, numeric ids in numeric order first
    pub fn available(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.values().map(|e| e.descriptor.id.as_str()).collect();
        ids.sort_by_key(|id| (id.parse::<u32>().unwrap_or(u32::MAX), id.to_string()));
        ids
    }

    /// Number of registered code pages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
