//! Pipeline definition loading for Gatekeep.
//!
//! Definitions are YAML documents read once at startup. This crate:
//!
//! 1. **Loads** definitions and patches (`loader`)
//! 2. **Patches** them as a pure function of base and patch (`patch`)
//! 3. **Validates** structure and compiles every pattern (`validation`, `compiled`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatekeep_config::load;
//!
//! let definition = load(Path::new("pipeline.yaml"), &["patches/freeze.yaml"])?;
//! for trigger in definition.triggers() {
//!     println!("{}", trigger.name());
//! }
//! ```

pub mod compiled;
pub mod loader;
pub mod patch;
pub mod patterns;
pub mod validation;

pub use compiled::{CompiledDefinition, CompiledFreezeWindow, CompiledTrigger};
pub use loader::{load, parse_definition, parse_patch, read_definition, read_patch};
pub use patch::{PipelinePatch, apply, apply_all};
pub use patterns::{BranchLimit, BranchPattern, CommentRule, Polarity};
pub use validation::{ValidationReport, validate};

/// JSON schema of the definition document, for editor tooling.
pub fn definition_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(gatekeep_core::pipeline::PipelineDefinition);
    serde_json::to_value(schema).unwrap_or_default()
}
