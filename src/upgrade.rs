//! Re-saving old FBX files before conversion.

use crate::backend::{Blender, RunContext, resave_with_tool};
use crate::capability::Capabilities;
use crate::error::MethodError;
use crate::method::Method;
use crate::request::ConversionOptions;
use std::path::{Path, PathBuf};

/// How an FBX file gets upgraded: the SDK tool when present, else a Blender round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upgrader {
    SdkTool(PathBuf),
    Blender(Blender),
}

impl Upgrader {
    pub fn resolve(
        capabilities: &Capabilities,
        options: &ConversionOptions,
    ) -> Result<Upgrader, MethodError> {
        if let Some(tool) = capabilities.upgrade_tool().tool() {
            return Ok(Upgrader::SdkTool(tool.to_path_buf()));
        }
        if let Some(tool) = capabilities.availability(Method::Blender).tool() {
            return Ok(Upgrader::Blender(Blender::new(tool, options)));
        }
        Err(MethodError::Unavailable(
            "neither the FBX SDK upgrade tool nor Blender is installed".to_string(),
        ))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Upgrader::SdkTool(_) => "upgrade-tool",
            Upgrader::Blender(_) => "blender",
        }
    }

    /// Writes an upgraded copy of `input` to `output`.
    pub fn upgrade(&self, input: &Path, output: &Path, ctx: &RunContext) -> Result<(), MethodError> {
        match self {
            Upgrader::SdkTool(tool) => resave_with_tool(tool, input, output, ctx),
            Upgrader::Blender(blender) => blender.resave(input, output, ctx),
        }
    }
}
