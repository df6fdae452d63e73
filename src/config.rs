//! Project configuration from `.fbx2glb.json`.
//!
//! ```json
//! {
//!   "defaultMethod": "blender",
//!   "fallbackMethods": ["fbx2gltf"],
//!   "blenderPath": "/opt/blender/blender",
//!   "preserveAnimations": true,
//!   "timeoutSeconds": 300
//! }
//! ```
//!
//! Every key is optional. Values from the command line take precedence.

use crate::capability::ToolPaths;
use crate::filesystem::FileSystem;
use crate::method::Method;
use crate::request::{ConversionOptions, MethodOrder};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = ".fbx2glb.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Glb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub default_method: Option<Method>,
    pub fallback_methods: Vec<Method>,
    pub blender_path: Option<PathBuf>,
    pub fbx2gltf_path: Option<PathBuf>,
    pub upgrade_tool_path: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub preserve_animations: bool,
    pub optimize_meshes: bool,
    pub timeout_seconds: Option<u64>,
    pub upgrade_mandatory: bool,
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_method: None,
            fallback_methods: default_fallback_methods(),
            blender_path: None,
            fbx2gltf_path: None,
            upgrade_tool_path: None,
            output_format: OutputFormat::Glb,
            preserve_animations: true,
            optimize_meshes: true,
            timeout_seconds: None,
            upgrade_mandatory: false,
            workers: None,
        }
    }
}

fn default_fallback_methods() -> Vec<Method> {
    vec![Method::Fbx2gltf, Method::Blender]
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, error: io::Error },
    Parse { path: PathBuf, error: serde_json::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, error } => {
                write!(f, "could not read configuration {}: {error}", path.display())
            }
            ConfigError::Parse { path, error } => {
                write!(f, "invalid configuration {}: {error}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { error, .. } => Some(error),
            ConfigError::Parse { error, .. } => Some(error),
        }
    }
}

impl Config {
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Config, ConfigError> {
        let data = fs.read_file(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        serde_json::from_slice(&data).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// The nearest `.fbx2glb.json` in `start` or one of its parents.
    pub fn discover(fs: &dyn FileSystem, start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| fs.exists(candidate))
    }

    /// Loads the explicitly named file, or else the discovered one.
    ///
    /// An explicit file that cannot be loaded is an error. A broken discovered file is only
    /// warned about and the defaults are used instead.
    pub fn load_or_default(
        fs: &dyn FileSystem,
        explicit: Option<&Path>,
        cwd: &Path,
    ) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading configuration from {}", path.display());
            return Config::load(fs, path);
        }
        let Some(path) = Config::discover(fs, cwd) else {
            return Ok(Config::default());
        };
        debug!("Loading configuration from {}", path.display());
        match Config::load(fs, &path) {
            Ok(config) => Ok(config),
            Err(error) => {
                warn!("{error}, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// `defaultMethod` followed by `fallbackMethods`. Without a default method the built in
    /// order is used, unless the fallback list was changed.
    pub fn method_order(&self) -> MethodOrder {
        match self.default_method {
            Some(method) => {
                let mut methods = vec![method];
                methods.extend(self.fallback_methods.iter().copied());
                MethodOrder::Explicit(methods)
            }
            None if self.fallback_methods != default_fallback_methods() => {
                MethodOrder::Explicit(self.fallback_methods.clone())
            }
            None => MethodOrder::Auto,
        }
    }

    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            fbx2gltf: self.fbx2gltf_path.clone(),
            blender: self.blender_path.clone(),
            upgrade_tool: self.upgrade_tool_path.clone(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    /// Conversion defaults taken from this configuration.
    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions::new()
            .preserve_animations(self.preserve_animations)
            .optimize_meshes(self.optimize_meshes)
            .upgrade_mandatory(self.upgrade_mandatory)
            .timeout(self.timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFileSystem;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.method_order(), MethodOrder::Auto);
        assert_eq!(config.tool_paths(), ToolPaths::default());
    }

    #[test]
    fn camel_case_keys() {
        let json = r#"{
            "defaultMethod": "fbx_sdk",
            "fallbackMethods": ["blender"],
            "blenderPath": "/opt/blender/blender",
            "fbx2gltfPath": "/usr/local/bin/FBX2glTF",
            "outputFormat": "glb",
            "preserveAnimations": false,
            "optimizeMeshes": false,
            "timeoutSeconds": 90,
            "upgradeMandatory": true,
            "workers": 4
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.method_order(),
            MethodOrder::Explicit(vec![Method::FbxSdk, Method::Blender])
        );
        assert_eq!(
            config.tool_paths().blender,
            Some(PathBuf::from("/opt/blender/blender"))
        );
        assert_eq!(
            config.tool_paths().fbx2gltf,
            Some(PathBuf::from("/usr/local/bin/FBX2glTF"))
        );
        assert_eq!(config.workers, Some(4));
        let options = config.conversion_options();
        assert_eq!(
            options,
            ConversionOptions::new()
                .preserve_animations(false)
                .optimize_meshes(false)
                .upgrade_mandatory(true)
                .timeout(Some(Duration::from_secs(90)))
        );
    }

    #[test]
    fn changed_fallbacks_without_default() {
        let config: Config = serde_json::from_str(r#"{"fallbackMethods": ["blender"]}"#).unwrap();
        assert_eq!(
            config.method_order(),
            MethodOrder::Explicit(vec![Method::Blender])
        );
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"outputFormat": "fbx"}"#).is_err());
    }

    #[test]
    fn discovered_in_parent_directory() {
        let fs = MemoryFileSystem::new();
        fs.write_file(
            Path::new("/project/.fbx2glb.json"),
            br#"{"defaultMethod": "blender"}"#,
        )
        .unwrap();
        assert_eq!(
            Config::discover(&fs, Path::new("/project/assets/models")),
            Some(PathBuf::from("/project/.fbx2glb.json"))
        );
        let config = Config::load_or_default(&fs, None, Path::new("/project/assets")).unwrap();
        assert_eq!(config.default_method, Some(Method::Blender));
    }

    #[test]
    fn broken_discovered_file_falls_back_to_defaults() {
        let fs = MemoryFileSystem::new();
        fs.write_file(Path::new("/project/.fbx2glb.json"), b"{ not json")
            .unwrap();
        let config = Config::load_or_default(&fs, None, Path::new("/project")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn broken_explicit_file_is_an_error() {
        let fs = MemoryFileSystem::new();
        fs.write_file(Path::new("custom.json"), b"[]").unwrap();
        assert!(matches!(
            Config::load_or_default(&fs, Some(Path::new("custom.json")), Path::new("/")),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::load_or_default(&fs, Some(Path::new("missing.json")), Path::new("/")),
            Err(ConfigError::Io { .. })
        ));
    }
}
