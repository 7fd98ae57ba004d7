// src/identity.rs

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Canonicalizes account handles through an old-name -> new-name rename
/// table. Resolution follows chains ("a" -> "b" -> "c") and stops the moment
/// a handle would be revisited, so rename cycles terminate instead of
/// looping. With no table loaded, resolution is a no-op.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    map: HashMap<String, String>,
}

impl IdentityResolver {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a rename table from a JSON object file: {"old": "new", ...}.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open username map {}", path.display()))?;
        let map: HashMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse username map {}", path.display()))?;
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn resolve(&self, handle: &str) -> String {
        let mut current = handle;
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(next) = self.map.get(current) {
            if !seen.insert(current) {
                break;
            }
            current = next;
        }
        current.to_string()
    }
}
