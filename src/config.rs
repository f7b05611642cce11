//! Configuration for the view and disassembly engines.
//!
//! Every section has defaults matching the interactive panel, and
//! deserialization fills missing fields from them so a partial JSON file is
//! enough to override one knob.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MemViewError, Result};

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Size and placement of the fetched window around a pointer.
    pub window: WindowConfig,
    /// Background population pacing and stop bound.
    pub populator: PopulatorConfig,
    /// Disassembly bounds.
    pub disasm: DisasmConfig,
}

impl ViewConfig {
    /// Parse a JSON document, then validate it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ViewConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.window.page_size == 0 || !self.window.page_size.is_power_of_two() {
            return Err(MemViewError::Config(format!(
                "window.page_size must be a non-zero power of two, got {:#x}",
                self.window.page_size
            )));
        }
        if self.populator.stop_timeout_ms == 0 {
            return Err(MemViewError::Config(
                "populator.stop_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.disasm.instruction_limit == 0 {
            return Err(MemViewError::Config(
                "disasm.instruction_limit must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Window fetched by `open_range`: the page holding the pointer plus
/// neighbours on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Page granularity in bytes (default: 0x1000).
    pub page_size: u64,
    /// Pages fetched before the pointer's page (default: 1).
    pub pages_before: u64,
    /// Pages fetched after the pointer's page (default: 1).
    pub pages_after: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            page_size: 0x1000,
            pages_before: 1,
            pages_after: 1,
        }
    }
}

impl WindowConfig {
    /// Page-aligned `(base, size)` of the window around `ptr`, clamped to the
    /// address space.
    pub fn window_for(&self, ptr: u64) -> (u64, u64) {
        let anchor = self.page_of(ptr);
        let base = anchor.saturating_sub(self.pages_before.saturating_mul(self.page_size));
        let end = anchor
            .saturating_add(self.pages_after.saturating_add(1).saturating_mul(self.page_size));
        (base, end - base)
    }

    /// Start of the page containing `ptr`. A zero page size leaves `ptr` as is.
    pub fn page_of(&self, ptr: u64) -> u64 {
        ptr & !self.page_size.saturating_sub(1)
    }
}

/// Pacing for the incremental populator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulatorConfig {
    /// Pause between population steps (default: 10ms).
    pub step_interval_ms: u64,
    /// Upper bound on waiting for a running population to stop (default: 2000ms).
    pub stop_timeout_ms: u64,
}

impl Default for PopulatorConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: 10,
            stop_timeout_ms: 2000,
        }
    }
}

impl PopulatorConfig {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Disassembly bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisasmConfig {
    /// Maximum instructions decoded per pass (default: 1024).
    pub instruction_limit: usize,
}

impl Default for DisasmConfig {
    fn default() -> Self {
        Self {
            instruction_limit: 1024,
        }
    }
}
