use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::Token;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub tokens: Vec<Token>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self { version: 1, tokens: vec![] }
    }
}

/// Tracked tokens as one pretty-printed JSON document.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let st = serde_json::from_str(&raw)?;
        Ok(Some(st))
    }

    pub fn save(&self, st: &PersistedState) -> Result<()> {
        let raw = serde_json::to_string_pretty(st)?;
        // Atomic replace.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TokenStatus;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("tokens.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_keeps_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("tokens.json"));
        let mut token = Token::new("Mint1", "One", "Dev1");
        token.status = TokenStatus::Suspicious;
        token.risk_score = 81.5;

        store.save(&PersistedState { version: 1, tokens: vec![token] }).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.tokens.len(), 1);
        assert_eq!(loaded.tokens[0].address, "Mint1");
        assert_eq!(loaded.tokens[0].status, TokenStatus::Suspicious);
        assert_eq!(loaded.tokens[0].risk_score, 81.5);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{not json").unwrap();
        assert!(StateStore::new(&path).load().is_err());
    }
}
