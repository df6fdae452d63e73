//! Finding out which converters are installed.
//!
//! Detection never fails: a missing tool is recorded as unavailable together with a
//! diagnostic that can be shown to the user.

use crate::method::Method;
use crate::process::{Invocation, ProcessRunner};
use log::debug;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

pub const FBX2GLTF_CANDIDATES: [&str; 2] = ["fbx2gltf", "FBX2glTF"];
pub const BLENDER_CANDIDATES: [&str; 2] =
    ["/Applications/Blender.app/Contents/MacOS/Blender", "blender"];
pub const UPGRADE_TOOL_CANDIDATES: [&str; 2] = ["upgrade_fbx", "tools/upgrade_fbx"];

/// Blender can take a while to print its version on a cold start.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Where to look for the external tools. `None` means "try the usual names".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    pub fbx2gltf: Option<PathBuf>,
    pub blender: Option<PathBuf>,
    pub upgrade_tool: Option<PathBuf>,
}

/// Whether one tool can be used, and if so which executable to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    tool: Option<PathBuf>,
    diagnostic: Option<String>,
}

impl Availability {
    pub fn found<P: Into<PathBuf>>(tool: P) -> Self {
        Self {
            tool: Some(tool.into()),
            diagnostic: None,
        }
    }

    pub fn missing<S: Into<String>>(diagnostic: S) -> Self {
        Self {
            tool: None,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.tool.is_some()
    }

    pub fn tool(&self) -> Option<&Path> {
        self.tool.as_deref()
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }
}

/// Snapshot of the installed converters, taken once and handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    methods: BTreeMap<Method, Availability>,
    upgrade_tool: Availability,
}

impl Capabilities {
    /// Probes every tool by running it with `--version`.
    #[instrument(skip(runner))]
    pub fn detect(paths: &ToolPaths, runner: &dyn ProcessRunner) -> Self {
        let fbx2gltf = probe(runner, paths.fbx2gltf.as_deref(), &FBX2GLTF_CANDIDATES, false);
        let blender = probe(runner, paths.blender.as_deref(), &BLENDER_CANDIDATES, true);
        let upgrade_tool = probe(
            runner,
            paths.upgrade_tool.as_deref(),
            &UPGRADE_TOOL_CANDIDATES,
            false,
        );
        let capabilities = Self::from_tools(fbx2gltf, blender, upgrade_tool);
        for (method, availability) in &capabilities.methods {
            match availability.tool() {
                Some(tool) => debug!("{method}: available ({})", tool.display()),
                None => debug!(
                    "{method}: unavailable ({})",
                    availability.diagnostic().unwrap_or_default()
                ),
            }
        }
        capabilities
    }

    /// Builds a snapshot from already known tool states.
    ///
    /// The FBX SDK method needs the upgrade tool plus something that can write GLB, so its
    /// availability is derived from the other two.
    pub fn from_tools(fbx2gltf: Availability, blender: Availability, upgrade_tool: Availability) -> Self {
        let fbx_sdk = match (upgrade_tool.tool(), fbx2gltf.is_available() || blender.is_available()) {
            (Some(tool), true) => Availability::found(tool),
            (Some(_), false) => Availability::missing(
                "FBX SDK upgrade tool found but neither fbx2gltf nor Blender is available to write GLB",
            ),
            (None, _) => Availability::missing(format!(
                "FBX SDK upgrade tool not found ({})",
                upgrade_tool.diagnostic().unwrap_or("not configured")
            )),
        };
        let mut methods = BTreeMap::new();
        methods.insert(Method::FbxSdk, fbx_sdk);
        methods.insert(Method::Fbx2gltf, fbx2gltf);
        methods.insert(Method::Blender, blender);
        Self {
            methods,
            upgrade_tool,
        }
    }

    pub fn availability(&self, method: Method) -> &Availability {
        // every method is inserted in from_tools
        &self.methods[&method]
    }

    pub fn is_available(&self, method: Method) -> bool {
        self.availability(method).is_available()
    }

    pub fn any_available(&self) -> bool {
        self.methods.values().any(Availability::is_available)
    }

    pub fn upgrade_tool(&self) -> &Availability {
        &self.upgrade_tool
    }

    pub fn iter(&self) -> impl Iterator<Item = (Method, &Availability)> {
        self.methods.iter().map(|(method, availability)| (*method, availability))
    }
}

/// Tries the configured program, or each candidate in turn, and keeps the first that answers.
fn probe(
    runner: &dyn ProcessRunner,
    configured: Option<&Path>,
    candidates: &[&str],
    require_success: bool,
) -> Availability {
    let programs: Vec<PathBuf> = match configured {
        Some(path) => vec![path.to_path_buf()],
        None => candidates.iter().map(PathBuf::from).collect(),
    };
    let mut problems = Vec::new();
    for program in programs {
        let invocation = Invocation::new(&program)
            .arg("--version")
            .timeout(Some(PROBE_TIMEOUT));
        match runner.run(&invocation) {
            Ok(output) if !require_success || output.success() => {
                return Availability::found(program);
            }
            Ok(output) => problems.push(format!(
                "'{}' --version ended with {:?}",
                program.display(),
                output.exit
            )),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                problems.push(format!("'{}' not found on PATH", program.display()))
            }
            Err(error) => problems.push(format!("'{}' could not be run: {error}", program.display())),
        }
    }
    Availability::missing(problems.join("; "))
}
