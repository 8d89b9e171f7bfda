//! Core domain types for jjgate.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
pub use ids::SessionId;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Gate State
// ============================================================================

/// Per-session lock controlling whether mutating tools may execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateState {
    /// Whether mutating tools are currently permitted.
    pub unlocked: bool,
    /// Session this one inherited its unlocked status from at creation.
    ///
    /// Informational only. Never re-resolved after creation.
    pub parent: Option<SessionId>,
}

impl GateState {
    #[must_use]
    pub const fn locked() -> Self {
        Self {
            unlocked: false,
            parent: None,
        }
    }

    #[must_use]
    pub const fn unlocked() -> Self {
        Self {
            unlocked: true,
            parent: None,
        }
    }

    #[must_use]
    pub fn inherited_from(parent: SessionId) -> Self {
        Self {
            unlocked: true,
            parent: Some(parent),
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        if self.unlocked { "unlocked" } else { "locked" }
    }
}

// ============================================================================
// Gated Tools
// ============================================================================

/// A host tool that mutates files and therefore requires an unlocked gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatedTool {
    Write,
    Edit,
    RenameSymbol,
    ResolveCodeAction,
    StructuralReplace,
}

impl GatedTool {
    pub const ALL: [GatedTool; 5] = [
        Self::Write,
        Self::Edit,
        Self::RenameSymbol,
        Self::ResolveCodeAction,
        Self::StructuralReplace,
    ];

    /// Exact-match lookup of a host tool name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "write" => Some(Self::Write),
            "edit" => Some(Self::Edit),
            "rename-symbol" => Some(Self::RenameSymbol),
            "resolve-code-action" => Some(Self::ResolveCodeAction),
            "structural-replace" => Some(Self::StructuralReplace),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Edit => "edit",
            Self::RenameSymbol => "rename-symbol",
            Self::ResolveCodeAction => "resolve-code-action",
            Self::StructuralReplace => "structural-replace",
        }
    }
}

impl std::fmt::Display for GatedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Intent Description
// ============================================================================

/// Minimum trimmed length (in characters) of a checkpoint description.
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// Minimum number of whitespace-separated words in a checkpoint description.
pub const MIN_DESCRIPTION_WORDS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptionError {
    #[error(
        "Description too short ({chars} characters). Use at least {min} characters describing what you are about to do.",
        min = MIN_DESCRIPTION_CHARS
    )]
    TooShort { chars: usize },
    #[error(
        "Description must be at least {min} words (got {words}). Say what you are about to change, e.g. \"Add retry to upload client\".",
        min = MIN_DESCRIPTION_WORDS
    )]
    TooFewWords { words: usize },
}

/// A checkpoint description that passed the minimal shape checks.
///
/// Stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentDescription(String);

impl IntentDescription {
    pub fn new(value: impl AsRef<str>) -> Result<Self, DescriptionError> {
        let trimmed = value.as_ref().trim();
        let chars = trimmed.chars().count();
        if chars < MIN_DESCRIPTION_CHARS {
            return Err(DescriptionError::TooShort { chars });
        }
        let words = trimmed.split_whitespace().count();
        if words < MIN_DESCRIPTION_WORDS {
            return Err(DescriptionError::TooFewWords { words });
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IntentDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tool Definitions
// ============================================================================

/// Definition of a tool exposed to the host agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (function name).
    pub name: String,
    /// A description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
