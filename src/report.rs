//! User-visible outcome of a bake run: info/warning diagnostics plus what was produced.

use std::path::PathBuf;

use serde::Serialize;

use crate::{color::Value, quantity::Quantity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

impl Diagnostic {
    /// Build an info diagnostic and emit it to the log.
    pub fn info(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::info!("{message}");
        Self {
            level: Level::Info,
            message,
        }
    }

    /// Build a warning diagnostic and emit it to the log.
    pub fn warning(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!("{message}");
        Self {
            level: Level::Warning,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BakedImage {
    pub object: String,
    pub quantity: Quantity,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldedConstant {
    pub object: String,
    pub quantity: Quantity,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BakeReport {
    pub diagnostics: Vec<Diagnostic>,
    pub baked: Vec<BakedImage>,
    /// Quantities whose target image already existed and overwrite was off.
    pub skipped: Vec<BakedImage>,
    pub constants: Vec<FoldedConstant>,
    pub materials_created: Vec<String>,
    pub rasterizer_calls: usize,
}

impl BakeReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == Level::Warning)
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }
}
