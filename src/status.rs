//! Status files for an external avatar view.
//!
//! The voice state, the last transcript heard and the last reply spoken are
//! each written to their own file under `~/.kiia/`, overwriting the previous
//! value.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::voice::VoiceState;

pub struct StatusFiles {
    base: PathBuf,
}

impl StatusFiles {
    /// Use `~/.kiia`, creating it if needed.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("no home directory"))?;
        Self::in_dir(home.join(".kiia"))
    }

    pub fn in_dir(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)
            .with_context(|| format!("failed to create status directory {}", base.display()))?;
        Ok(Self { base })
    }

    pub fn dir(&self) -> &Path {
        &self.base
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.base.join(name);
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn write_state(&self, state: VoiceState) -> Result<()> {
        self.write("kiia.state", state.as_str())
    }

    pub fn write_heard(&self, text: &str) -> Result<()> {
        self.write("kiia.heard", text)
    }

    pub fn write_spoken(&self, text: &str) -> Result<()> {
        self.write("kiia.spoken", text)
    }

    pub fn set_pid(&self) -> Result<()> {
        self.write("kiia.pid", &std::process::id().to_string())
    }

    pub fn current_state(&self) -> Option<String> {
        fs::read_to_string(self.base.join("kiia.state"))
            .ok()
            .map(|s| s.trim().to_string())
    }
}
