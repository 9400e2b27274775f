//! Dependent engines the harness supervises.
//!
//! Their real internals live elsewhere; here they are `StubEngine` stand-ins
//! built from a roster.

pub mod stub;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use stub::{StubEngine, StubIngress, DEFAULT_RETAIN};

/// The engine the gateway forwards to.
pub const MOTHER_ENGINE_ID: &str = "ENGINE_002";

/// One `[[engines]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl EngineSpec {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            depends_on: Vec::new(),
        }
    }

    pub fn after(mut self, id: &str) -> Self {
        self.depends_on.push(id.to_string());
        self
    }

    pub fn build(&self) -> StubEngine {
        let label = if self.label.is_empty() { &self.id } else { &self.label };
        StubEngine::new(self.id.clone(), label.clone())
            .with_dependencies(self.depends_on.iter().cloned())
    }
}

/// Perception, session, understanding, signal classifier, then the mother engine.
pub fn standard_roster() -> Vec<EngineSpec> {
    vec![
        EngineSpec::new("ENGINE_003", "Perception"),
        EngineSpec::new("ENGINE_004", "Session Manager"),
        EngineSpec::new("ENGINE_005", "Understanding"),
        EngineSpec::new("ENGINE_006", "Signal Classifier").after("ENGINE_005"),
        EngineSpec::new(MOTHER_ENGINE_ID, "Mother"),
    ]
}

/// Builds every engine in the roster, in roster order.
pub fn build_roster(specs: &[EngineSpec]) -> Vec<Arc<StubEngine>> {
    specs.iter().map(|spec| Arc::new(spec.build())).collect()
}
