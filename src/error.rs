use crate::method::Method;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Why a single method attempt (or the upgrade step) did not produce a usable file.
#[derive(Debug)]
pub enum MethodError {
    /// The tool ran and exited unsuccessfully.
    Failed { code: Option<i32>, stderr: String },
    /// The tool was killed after exceeding the configured timeout.
    Timeout(Duration),
    /// The tool could not be started at all.
    Spawn { program: String, error: io::Error },
    /// The tool reported success but the expected file is not there.
    MissingOutput(PathBuf),
    /// The tool produced something that is not a GLB container.
    InvalidOutput { path: PathBuf, reason: String },
    /// The required tool is not installed.
    Unavailable(String),
    Io(io::Error),
}

impl Error for MethodError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MethodError::Spawn { error, .. } => Some(error),
            MethodError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for MethodError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodError::Failed { code, stderr } => {
                match code {
                    Some(code) => write!(f, "exited with code {code}")?,
                    None => write!(f, "terminated by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            MethodError::Timeout(limit) => {
                write!(f, "timed out after {:.1}s", limit.as_secs_f64())
            }
            MethodError::Spawn { program, error } => {
                write!(f, "could not start '{program}': {error}")
            }
            MethodError::MissingOutput(path) => {
                write!(f, "reported success but produced no file at {}", path.display())
            }
            MethodError::InvalidOutput { path, reason } => {
                write!(f, "produced an invalid GLB at {}: {reason}", path.display())
            }
            MethodError::Unavailable(diagnostic) => write!(f, "unavailable: {diagnostic}"),
            MethodError::Io(error) => write!(f, "IO error: {error}"),
        }
    }
}

impl From<io::Error> for MethodError {
    fn from(error: io::Error) -> Self {
        MethodError::Io(error)
    }
}

/// Terminal error of a conversion request.
///
/// Per-method failures never surface on their own, they are collected in the outcome and
/// only reported as [`ConvertError::AllMethodsFailed`] once every candidate has been tried.
#[derive(Debug)]
pub enum ConvertError {
    InputNotFound(PathBuf),
    AlreadyExists(PathBuf),
    /// None of the requested methods is installed. Carries one diagnostic per method.
    NoMethodAvailable { diagnostics: Vec<(Method, String)> },
    AllMethodsFailed { attempted: Vec<Method> },
    /// The upgrade step was mandatory and did not succeed.
    UpgradeFailed { reason: String },
    /// A partially written file could not be removed.
    PartialWrite { path: PathBuf, error: io::Error },
    /// Another file of the same batch already converts to this output.
    DuplicateOutput { output: PathBuf, claimed_by: PathBuf },
    Io(io::Error),
}

impl Error for ConvertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConvertError::PartialWrite { error, .. } => Some(error),
            ConvertError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::InputNotFound(path) => {
                write!(f, "input file '{}' does not exist", path.display())
            }
            ConvertError::AlreadyExists(path) => write!(
                f,
                "output file '{}' already exists, use force to overwrite",
                path.display()
            ),
            ConvertError::NoMethodAvailable { diagnostics } => {
                write!(f, "no conversion method available")?;
                for (method, diagnostic) in diagnostics {
                    write!(f, "; {method}: {diagnostic}")?;
                }
                Ok(())
            }
            ConvertError::AllMethodsFailed { attempted } => {
                let names: Vec<&str> = attempted.iter().map(Method::id).collect();
                write!(f, "all attempted methods failed ({})", names.join(", "))
            }
            ConvertError::UpgradeFailed { reason } => write!(f, "FBX upgrade failed: {reason}"),
            ConvertError::PartialWrite { path, error } => write!(
                f,
                "could not remove partial output '{}': {error}",
                path.display()
            ),
            ConvertError::DuplicateOutput { output, claimed_by } => write!(
                f,
                "output file '{}' is already produced from '{}'",
                output.display(),
                claimed_by.display()
            ),
            ConvertError::Io(error) => write!(f, "IO error: {error}"),
        }
    }
}

impl From<io::Error> for ConvertError {
    fn from(error: io::Error) -> Self {
        ConvertError::Io(error)
    }
}
