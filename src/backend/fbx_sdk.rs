use super::{Blender, Fbx2gltf, RunContext, remove_scratch, run_tool};
use crate::capability::Capabilities;
use crate::error::MethodError;
use crate::method::Method;
use crate::process::Invocation;
use crate::request::ConversionOptions;
use std::path::{Path, PathBuf};

/// The tool that turns the SDK's re-saved FBX into GLB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relay {
    Fbx2gltf(Fbx2gltf),
    Blender(Blender),
}

impl Relay {
    /// fbx2gltf when installed, otherwise Blender.
    pub fn resolve(capabilities: &Capabilities, options: &ConversionOptions) -> Option<Relay> {
        if let Some(tool) = capabilities.availability(Method::Fbx2gltf).tool() {
            return Some(Relay::Fbx2gltf(Fbx2gltf::new(tool, options)));
        }
        capabilities
            .availability(Method::Blender)
            .tool()
            .map(|tool| Relay::Blender(Blender::new(tool, options)))
    }

    fn convert(&self, input: &Path, output: &Path, ctx: &RunContext) -> Result<(), MethodError> {
        match self {
            Relay::Fbx2gltf(relay) => relay.convert(input, output, ctx),
            Relay::Blender(relay) => relay.convert(input, output, ctx),
        }
    }
}

/// The FBX SDK route: `upgrade_fbx <input> <tmp.fbx>` followed by the relay.
///
/// The SDK has no GLB writer, the re-save only normalises the file to the SDK's current FBX
/// version, which the relay then reads more reliably than the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FbxSdk {
    pub tool: PathBuf,
    pub relay: Relay,
}

impl FbxSdk {
    pub fn new(tool: &Path, relay: Relay) -> Self {
        Self {
            tool: tool.to_path_buf(),
            relay,
        }
    }

    pub fn convert(&self, input: &Path, output: &Path, ctx: &RunContext) -> Result<(), MethodError> {
        let scratch = ctx.fs.scratch_dir()?;
        let resaved = scratch.join(resaved_name(input));
        let result = resave_with_tool(&self.tool, input, &resaved, ctx)
            .and_then(|()| self.relay.convert(&resaved, output, ctx));
        remove_scratch(ctx.fs, &resaved);
        result
    }
}

/// `<stem>.fbx`, so tools that report the file name still show the model's own name.
pub(crate) fn resaved_name(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_else(|| "model".as_ref());
    Path::new(stem).with_extension("fbx")
}

/// Runs the compiled upgrade tool, which takes exactly an input and an output path.
pub(crate) fn resave_with_tool(
    tool: &Path,
    input: &Path,
    output: &Path,
    ctx: &RunContext,
) -> Result<(), MethodError> {
    run_tool(ctx, Invocation::new(tool).arg(input).arg(output))?;
    if !ctx.fs.exists(output) {
        return Err(MethodError::MissingOutput(output.to_path_buf()));
    }
    Ok(())
}
