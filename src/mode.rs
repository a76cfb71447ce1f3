//! Render mode - raw passthrough vs. normal rendering
//!
//! The mode is process-wide: initialised from config at startup, flipped by the
//! `!raw` command, read by every webhook request. Last toggle wins.

use std::sync::atomic::{AtomicBool, Ordering};

/// Render mode for incoming webhooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Normal,
    Raw,
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Normal => "normal",
            RenderMode::Raw => "raw",
        }
    }

    pub fn from_raw_flag(raw: bool) -> Self {
        if raw {
            RenderMode::Raw
        } else {
            RenderMode::Normal
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, RenderMode::Raw)
    }
}

/// Shared, atomically updated render mode
#[derive(Debug, Default)]
pub struct ModeSwitch {
    raw: AtomicBool,
}

impl ModeSwitch {
    pub fn new(initial: RenderMode) -> Self {
        Self {
            raw: AtomicBool::new(initial.is_raw()),
        }
    }

    /// Current mode
    pub fn current(&self) -> RenderMode {
        RenderMode::from_raw_flag(self.raw.load(Ordering::Acquire))
    }

    /// Flip the mode and return the new one
    pub fn toggle(&self) -> RenderMode {
        let was_raw = self.raw.fetch_xor(true, Ordering::AcqRel);
        RenderMode::from_raw_flag(!was_raw)
    }
}
