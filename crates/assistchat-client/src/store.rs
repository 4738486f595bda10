//! Client-local storage for the conversation identifier.
//!
//! The identifier survives restarts the way the original widget kept it
//! in browser storage: one small file, read at startup, cleared only on
//! a confirmed "conversation not found".

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct IdentifierStore {
    path: PathBuf,
}

impl IdentifierStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store under the platform's local data directory, e.g.
    /// `~/.local/share/assistchat/conversation_id`.
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_local_dir().context("no local data directory available")?;
        Ok(Self::new(base.join("assistchat").join("conversation_id")))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let id = raw.trim().to_string();
                if id.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(id))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("failed to read stored conversation identifier"),
        }
    }

    pub fn save(&self, conversation_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, conversation_id)
            .context("failed to persist conversation identifier")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("failed to clear stored conversation identifier"),
        }
    }
}
