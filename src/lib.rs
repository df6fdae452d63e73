//!
//! fbx2glb converts FBX models to GLB by driving the converters that are installed on the
//! machine: an FBX SDK based re-save tool, Facebook's `fbx2gltf` and Blender.
//!
//! The library owns the decisions around those tools. It detects which of them work, tries
//! them in order until one produces a valid GLB, cleans up after the ones that fail and
//! reports what happened. Directories can be converted in bulk and a React Three Fiber
//! component can be generated for a converted model.
//!
//! ```no_run
//! use fbx2glb::capability::ToolPaths;
//! use fbx2glb::request::{ConversionOptions, ConversionRequest};
//!
//! let request = ConversionRequest::new("robot.fbx")
//!     .with_options(ConversionOptions::new().force(true));
//! let outcome = fbx2glb::convert(&request, &ToolPaths::default());
//! if !outcome.is_success() {
//!     eprintln!("{}", outcome.failure_summary());
//! }
//! ```

pub mod backend;
pub mod batch;
pub mod capability;
pub mod cli;
pub mod component;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exit;
pub mod fbx_version;
pub mod filesystem;
pub mod method;
pub mod outcome;
pub mod process;
pub mod request;
pub mod upgrade;

#[cfg(test)]
mod testing;

use capability::{Capabilities, ToolPaths};
use dispatch::Dispatcher;
use filesystem::RealFileSystem;
use outcome::ConversionOutcome;
use process::SystemRunner;
use request::ConversionRequest;

/// Detects the installed tools and converts a single file on the real file system.
pub fn convert(request: &ConversionRequest, tools: &ToolPaths) -> ConversionOutcome {
    let capabilities = Capabilities::detect(tools, &SystemRunner);
    Dispatcher::new(&capabilities, &SystemRunner, &RealFileSystem).dispatch(request)
}
