//! Stand-ins for the external converters used by the unit tests.

use crate::filesystem::{FileSystem, MemoryFileSystem};
use crate::process::{Exit, Invocation, ProcessOutput, ProcessRunner};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// What a scripted tool does when asked to convert.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    /// Writes a valid file to its output argument and exits 0.
    Succeed,
    Fail { code: i32, stderr: &'static str },
    Timeout,
    /// Exits 0 but writes something that is not a GLB.
    WriteGarbage,
    /// Leaves a truncated file behind and exits 1.
    PartialThenFail,
    /// Exits 0 without writing anything.
    NoOutput,
    /// `--version` exits 1, conversions fail.
    Broken,
}

/// A [`ProcessRunner`] that pretends to be the installed tools.
///
/// Unknown programs fail to spawn with `NotFound`. The output of a conversion is always the
/// last argument of the invocation, mirroring how the backends build their command lines.
pub(crate) struct ScriptedRunner {
    fs: MemoryFileSystem,
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub(crate) fn new(fs: &MemoryFileSystem) -> Self {
        Self {
            fs: fs.clone(),
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn tool(mut self, program: &str, script: Script) -> Self {
        self.scripts.insert(program.to_string(), script);
        self
    }

    /// Programs that were asked to convert something, in call order.
    pub(crate) fn conversions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|invocation| !is_probe(invocation))
            .map(Invocation::program_name)
            .collect()
    }

    pub(crate) fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

fn is_probe(invocation: &Invocation) -> bool {
    invocation.args.len() == 1 && invocation.args[0] == "--version"
}

fn exited(code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        exit: Exit::Code(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let program = invocation.program_name();
        let Some(script) = self.scripts.get(&program).copied() else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{program}: command not found"),
            ));
        };
        self.calls.lock().unwrap().push(invocation.clone());

        if is_probe(invocation) {
            return Ok(match script {
                Script::Broken => exited(1, "broken install"),
                _ => exited(0, ""),
            });
        }

        let output = invocation
            .args
            .last()
            .map(PathBuf::from)
            .unwrap_or_default();
        Ok(match script {
            Script::Succeed => {
                let data = if output.extension().is_some_and(|ext| ext == "fbx") {
                    fbx_bytes()
                } else {
                    glb_bytes()
                };
                self.fs.write_file(&output, &data)?;
                exited(0, "")
            }
            Script::Fail { code, stderr } => exited(code, stderr),
            Script::Timeout => ProcessOutput {
                exit: Exit::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
            },
            Script::WriteGarbage => {
                self.fs.write_file(&output, b"definitely not binary gltf")?;
                exited(0, "")
            }
            Script::PartialThenFail => {
                self.fs.write_file(&output, &glb_bytes()[..10])?;
                exited(1, "crashed while writing")
            }
            Script::NoOutput => exited(0, ""),
            Script::Broken => exited(1, "broken install"),
        })
    }
}

/// The smallest container `gltf::Glb` accepts: a header and a padded JSON chunk.
pub(crate) fn glb_bytes() -> Vec<u8> {
    let mut json = br#"{"asset":{"version":"2.0"}}"#.to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let total = 12 + 8 + json.len();
    let mut data = Vec::with_capacity(total);
    data.extend_from_slice(b"glTF");
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&(total as u32).to_le_bytes());
    data.extend_from_slice(&(json.len() as u32).to_le_bytes());
    data.extend_from_slice(b"JSON");
    data.extend_from_slice(&json);
    data
}

/// A binary FBX header announcing version 7.4.
pub(crate) fn fbx_bytes() -> Vec<u8> {
    fbx_bytes_with_version(7400)
}

pub(crate) fn fbx_bytes_with_version(version: u32) -> Vec<u8> {
    let mut data = b"Kaydara FBX Binary  \x00\x1a\x00".to_vec();
    data.extend_from_slice(&version.to_le_bytes());
    data.extend_from_slice(&[0u8; 32]);
    data
}
