//! The conversion backends.
//!
//! Each [`Backend`] variant carries everything needed to build its command lines, resolved
//! from a [`Capabilities`] snapshot and the request's [`ConversionOptions`]. Backends write to
//! whatever output path they are given; promoting that file to its final location is up to
//! the dispatcher.

mod blender;
mod fbx2gltf;
mod fbx_sdk;

pub use blender::Blender;
pub use fbx2gltf::Fbx2gltf;
pub use fbx_sdk::{FbxSdk, Relay};
pub(crate) use fbx_sdk::{resave_with_tool, resaved_name};

use crate::capability::Capabilities;
use crate::error::MethodError;
use crate::filesystem::FileSystem;
use crate::method::Method;
use crate::process::{Exit, Invocation, ProcessOutput, ProcessRunner, stderr_excerpt};
use crate::request::ConversionOptions;
use std::path::Path;
use std::time::Duration;

/// How many trailing stderr lines end up in a failure reason.
const STDERR_LINES: usize = 20;

/// The seams and limits a backend runs with.
pub struct RunContext<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub fs: &'a dyn FileSystem,
    pub timeout: Option<Duration>,
    pub echo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    FbxSdk(FbxSdk),
    Fbx2gltf(Fbx2gltf),
    Blender(Blender),
}

impl Backend {
    /// The backend for `method`, or `None` when the tools it needs are not installed.
    pub fn resolve(
        method: Method,
        capabilities: &Capabilities,
        options: &ConversionOptions,
    ) -> Option<Backend> {
        let tool = capabilities.availability(method).tool()?;
        match method {
            Method::Fbx2gltf => Some(Backend::Fbx2gltf(Fbx2gltf::new(tool, options))),
            Method::Blender => Some(Backend::Blender(Blender::new(tool, options))),
            Method::FbxSdk => {
                let relay = Relay::resolve(capabilities, options)?;
                Some(Backend::FbxSdk(FbxSdk::new(tool, relay)))
            }
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Backend::FbxSdk(_) => Method::FbxSdk,
            Backend::Fbx2gltf(_) => Method::Fbx2gltf,
            Backend::Blender(_) => Method::Blender,
        }
    }

    /// Converts `input` into a GLB at `output`.
    pub fn convert(&self, input: &Path, output: &Path, ctx: &RunContext) -> Result<(), MethodError> {
        match self {
            Backend::FbxSdk(backend) => backend.convert(input, output, ctx),
            Backend::Fbx2gltf(backend) => backend.convert(input, output, ctx),
            Backend::Blender(backend) => backend.convert(input, output, ctx),
        }
    }
}

/// Runs one tool and turns anything but a clean exit into a [`MethodError`].
pub(crate) fn run_tool(ctx: &RunContext, invocation: Invocation) -> Result<ProcessOutput, MethodError> {
    let invocation = invocation.timeout(ctx.timeout).echo(ctx.echo);
    let output = ctx
        .runner
        .run(&invocation)
        .map_err(|error| MethodError::Spawn {
            program: invocation.program_name(),
            error,
        })?;
    match output.exit {
        Exit::Code(0) => Ok(output),
        Exit::TimedOut => Err(MethodError::Timeout(ctx.timeout.unwrap_or_default())),
        Exit::Code(code) => Err(MethodError::Failed {
            code: Some(code),
            stderr: stderr_excerpt(&output.stderr, STDERR_LINES),
        }),
        Exit::Signal => Err(MethodError::Failed {
            code: None,
            stderr: stderr_excerpt(&output.stderr, STDERR_LINES),
        }),
    }
}

/// Removes a scratch file, a failure only leaves litter in the temp directory.
pub(crate) fn remove_scratch(fs: &dyn FileSystem, path: &Path) {
    if fs.exists(path) {
        if let Err(error) = fs.remove_file(path) {
            log::warn!("Could not remove temporary file {}: {error}", path.display());
        }
    }
}

/// Checks that `path` holds a binary glTF container.
pub fn verify_glb(fs: &dyn FileSystem, path: &Path) -> Result<(), MethodError> {
    if !fs.exists(path) {
        return Err(MethodError::MissingOutput(path.to_path_buf()));
    }
    let data = fs.read_file(path)?;
    gltf::Glb::from_slice(&data)
        .map(|_| ())
        .map_err(|error| MethodError::InvalidOutput {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })
}
