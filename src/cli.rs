//! Pieces shared by the command line tools.

use crate::capability::{Capabilities, ToolPaths};
use crate::config::{Config, ConfigError};
use crate::filesystem::RealFileSystem;
use crate::method::{Method, ParseMethodError, parse_method_list};
use crate::request::MethodOrder;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// `info` by default, `debug` with `--verbose`. `RUST_LOG` still wins.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// A comma separated `--method` value such as `fbx2gltf,blender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodList(pub Vec<Method>);

impl FromStr for MethodList {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_method_list(s).map(MethodList)
    }
}

/// Tool locations and configuration, shared by `fbx2glb` and `fbx2glb-batch`.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ToolArgs {
    /// Path to the Blender executable
    #[arg(long, value_name = "PATH")]
    pub blender_path: Option<PathBuf>,

    /// Path to the fbx2gltf executable
    #[arg(long, value_name = "PATH")]
    pub fbx2gltf_path: Option<PathBuf>,

    /// Path to the FBX SDK upgrade tool
    #[arg(long, value_name = "PATH")]
    pub upgrade_tool_path: Option<PathBuf>,

    /// Kill a conversion tool after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Configuration file, instead of looking for .fbx2glb.json
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ToolArgs {
    /// Loads `--config`, or the `.fbx2glb.json` found from the working directory upwards.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let cwd = std::env::current_dir().map_err(|error| ConfigError::Io {
            path: PathBuf::from("."),
            error,
        })?;
        Config::load_or_default(&RealFileSystem, self.config.as_deref(), &cwd)
    }

    /// Command line paths, falling back to the configured ones.
    pub fn tool_paths(&self, config: &Config) -> ToolPaths {
        let configured = config.tool_paths();
        ToolPaths {
            fbx2gltf: self.fbx2gltf_path.clone().or(configured.fbx2gltf),
            blender: self.blender_path.clone().or(configured.blender),
            upgrade_tool: self.upgrade_tool_path.clone().or(configured.upgrade_tool),
        }
    }

    pub fn timeout(&self, config: &Config) -> Option<Duration> {
        self.timeout.map(Duration::from_secs).or(config.timeout())
    }
}

/// The `--method` list when given, otherwise what the configuration asks for.
pub fn method_order(methods: Option<&MethodList>, config: &Config) -> MethodOrder {
    match methods {
        Some(MethodList(methods)) => MethodOrder::Explicit(methods.clone()),
        None => config.method_order(),
    }
}

/// Human readable availability of every tool, as printed by `--check-dependencies`.
pub fn dependency_report(capabilities: &Capabilities) -> String {
    let mut lines = vec!["Conversion methods:".to_string()];
    for (method, availability) in capabilities.iter() {
        lines.push(describe(method.id(), availability.tool(), availability.diagnostic()));
    }
    lines.push("Tools:".to_string());
    let upgrade_tool = capabilities.upgrade_tool();
    lines.push(describe(
        "upgrade-tool",
        upgrade_tool.tool(),
        upgrade_tool.diagnostic(),
    ));
    lines.join("\n")
}

fn describe(name: &str, tool: Option<&Path>, diagnostic: Option<&str>) -> String {
    match tool {
        Some(tool) => format!("  ✅ {name:<12} {}", tool.display()),
        None => format!("  ❌ {name:<12} {}", diagnostic.unwrap_or("unavailable")),
    }
}
