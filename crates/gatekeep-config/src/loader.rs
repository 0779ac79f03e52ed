//! Loading definitions and patches from YAML.

use crate::compiled::CompiledDefinition;
use crate::patch::{PipelinePatch, apply_all};
use gatekeep_core::pipeline::PipelineDefinition;
use gatekeep_core::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

/// Parse a definition from YAML text.
pub fn parse_definition(yaml: &str) -> Result<PipelineDefinition> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Parse a patch from YAML text.
pub fn parse_patch(yaml: &str) -> Result<PipelinePatch> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn read_definition(path: &Path) -> Result<PipelineDefinition> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidDefinition(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_definition(&content).map_err(|e| {
        Error::InvalidDefinition(format!("Failed to parse {}: {}", path.display(), e))
    })
}

pub fn read_patch(path: &Path) -> Result<PipelinePatch> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidDefinition(format!("Failed to read patch {}: {}", path.display(), e))
    })?;
    parse_patch(&content).map_err(|e| {
        Error::InvalidDefinition(format!("Failed to parse patch {}: {}", path.display(), e))
    })
}

/// Read a definition, apply patches in the given order and compile it.
pub fn load<P: AsRef<Path>>(path: &Path, patches: &[P]) -> Result<CompiledDefinition> {
    let base = read_definition(path)?;
    let patches = patches
        .iter()
        .map(|p| {
            debug!(patch = %p.as_ref().display(), "Reading patch");
            read_patch(p.as_ref())
        })
        .collect::<Result<Vec<_>>>()?;

    let definition = apply_all(&base, &patches)?;
    let compiled = CompiledDefinition::compile(definition)?;

    info!(
        pipeline = %compiled.name(),
        triggers = compiled.triggers().len(),
        parameters = compiled.parameters().len(),
        patches = patches.len(),
        "Loaded pipeline definition"
    );
    Ok(compiled)
}
