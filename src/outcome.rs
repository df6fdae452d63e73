use crate::error::{ConvertError, MethodError};
use crate::fbx_version::FbxVersion;
use crate::method::Method;
use crate::request::ConversionRequest;
use serde::{Serialize, Serializer};
use std::fmt::Write;
use std::path::PathBuf;
use std::time::Duration;

/// One method tried by the dispatcher.
#[derive(Debug)]
pub struct Attempt {
    pub method: Method,
    pub result: Result<(), MethodError>,
    pub elapsed: Duration,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// The optional re-save step that ran before the attempts.
#[derive(Debug)]
pub struct UpgradeRecord {
    /// Header version of the original input, when it could be read.
    pub version: Option<FbxVersion>,
    /// `upgrade-tool` or `blender`, `None` when nothing could perform the upgrade.
    pub tool: Option<&'static str>,
    pub result: Result<(), MethodError>,
}

/// Everything that happened for one request.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub method_used: Option<Method>,
    pub upgrade: Option<UpgradeRecord>,
    pub attempts: Vec<Attempt>,
    pub error: Option<ConvertError>,
}

impl ConversionOutcome {
    pub(crate) fn new(request: &ConversionRequest) -> Self {
        Self {
            input: request.input().to_path_buf(),
            output: request.output().to_path_buf(),
            method_used: None,
            upgrade: None,
            attempts: Vec::new(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.method_used.is_some() && self.error.is_none()
    }

    /// Methods that were actually run, in order.
    pub fn attempted_methods(&self) -> Vec<Method> {
        self.attempts.iter().map(|attempt| attempt.method).collect()
    }

    /// Multi-line description naming the file, every attempted method and why it failed.
    pub fn failure_summary(&self) -> String {
        let mut summary = String::new();
        let _ = write!(summary, "Conversion failed: {}", self.input.display());
        if let Some(error) = &self.error {
            let _ = write!(summary, "\n  {error}");
        }
        if let Some(UpgradeRecord {
            result: Err(error), ..
        }) = &self.upgrade
        {
            let _ = write!(summary, "\n  upgrade: {error}");
        }
        for attempt in &self.attempts {
            match &attempt.result {
                Ok(()) => {
                    let _ = write!(summary, "\n  {}: ok", attempt.method);
                }
                Err(error) => {
                    let _ = write!(summary, "\n  {}: {error}", attempt.method);
                }
            }
        }
        summary
    }

    pub fn report(&self) -> OutcomeReport {
        OutcomeReport {
            input: self.input.display().to_string(),
            output: self.output.display().to_string(),
            success: self.is_success(),
            method_used: self.method_used,
            upgrade: self.upgrade.as_ref().map(|upgrade| UpgradeReport {
                version: upgrade.version.map(|version| version.to_string()),
                tool: upgrade.tool,
                status: Status::of(&upgrade.result),
                reason: upgrade.result.as_ref().err().map(ToString::to_string),
            }),
            attempts: self
                .attempts
                .iter()
                .map(|attempt| AttemptReport {
                    method: attempt.method,
                    status: Status::of(&attempt.result),
                    reason: attempt.result.as_ref().err().map(ToString::to_string),
                    elapsed_ms: attempt.elapsed.as_millis() as u64,
                })
                .collect(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

impl Serialize for ConversionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.report().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
}

impl Status {
    fn of(result: &Result<(), MethodError>) -> Self {
        match result {
            Ok(()) => Status::Ok,
            Err(_) => Status::Failed,
        }
    }
}

/// Serializable view of a [`ConversionOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub input: String,
    pub output: String,
    pub success: bool,
    pub method_used: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<UpgradeReport>,
    pub attempts: Vec<AttemptReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReport {
    pub method: Method,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeReport {
    pub version: Option<String>,
    pub tool: Option<&'static str>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
