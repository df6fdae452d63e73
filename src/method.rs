//! The set of conversion backends the dispatcher knows about.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A conversion backend, identified on the command line and in configuration by
/// `fbx-sdk`, `fbx2gltf` or `blender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Re-save through the FBX SDK upgrade tool, then hand the result to a GLB writer.
    #[serde(alias = "fbx_sdk")]
    FbxSdk,
    /// Facebook's `fbx2gltf` command line converter.
    Fbx2gltf,
    /// Blender in background mode with a generated import/export script.
    Blender,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::FbxSdk, Method::Fbx2gltf, Method::Blender];

    /// Order used when the caller does not ask for specific methods.
    pub const DEFAULT_ORDER: [Method; 3] = Method::ALL;

    pub fn id(&self) -> &'static str {
        match self {
            Method::FbxSdk => "fbx-sdk",
            Method::Fbx2gltf => "fbx2gltf",
            Method::Blender => "blender",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMethodError {
    Unknown(String),
    /// A list without a single method in it, such as `""` or `","`.
    Empty,
}

impl Display for ParseMethodError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMethodError::Unknown(method) => write!(
                f,
                "unknown conversion method '{method}', expected one of: fbx-sdk, fbx2gltf, blender"
            ),
            ParseMethodError::Empty => write!(
                f,
                "no conversion method given, expected one or more of: fbx-sdk, fbx2gltf, blender"
            ),
        }
    }
}

impl Error for ParseMethodError {}

impl FromStr for Method {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fbx-sdk" | "fbx_sdk" | "fbxsdk" => Ok(Method::FbxSdk),
            "fbx2gltf" => Ok(Method::Fbx2gltf),
            "blender" => Ok(Method::Blender),
            _ => Err(ParseMethodError::Unknown(s.to_string())),
        }
    }
}

/// Parses a comma separated list such as `fbx2gltf,blender`. At least one method is required.
pub fn parse_method_list(s: &str) -> Result<Vec<Method>, ParseMethodError> {
    let methods = s
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(Method::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if methods.is_empty() {
        return Err(ParseMethodError::Empty);
    }
    Ok(methods)
}
