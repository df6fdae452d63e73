use fbx2glb::capability::{Availability, Capabilities};
use fbx2glb::process::{Exit, Invocation, ProcessOutput, ProcessRunner};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut entries = WalkDir::new(dir).sort_by_file_name().into_iter();
    let os_extension = OsStr::new(extension);
    entries.try_for_each(|entry| {
        let dir_entry = entry?;
        let path = dir_entry.path();
        if path.is_file() {
            match path.extension() {
                Some(ex) if ex == os_extension => found.push(path.to_path_buf()),
                _ => {}
            }
        }
        Ok::<(), io::Error>(())
    })?;
    Ok(found)
}

/// Header plus a padded JSON chunk, the smallest GLB a reader accepts.
pub fn glb_bytes() -> Vec<u8> {
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

pub fn fbx_bytes() -> Vec<u8> {
    let mut data = b"Kaydara FBX Binary  \x00\x1a\x00".to_vec();
    data.extend_from_slice(&7400u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 32]);
    data
}

#[derive(Debug, Clone, Copy)]
pub enum Tool {
    /// Writes a GLB to the last argument.
    Succeed,
    /// Writes half a file and exits 1.
    Crash,
}

/// Pretends to be the external converters, writing to the real file system.
#[derive(Default)]
pub struct FakeTools {
    tools: HashMap<String, Tool>,
    calls: Mutex<Vec<String>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(mut self, program: &str, tool: Tool) -> Self {
        self.tools.insert(program.to_string(), tool);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Every registered tool counts as installed, nothing else does.
    pub fn capabilities(&self) -> Capabilities {
        let availability = |name: &str| {
            if self.tools.contains_key(name) {
                Availability::found(name)
            } else {
                Availability::missing(format!("'{name}' not found on PATH"))
            }
        };
        Capabilities::from_tools(
            availability("fbx2gltf"),
            availability("blender"),
            availability("upgrade_fbx"),
        )
    }
}

impl ProcessRunner for FakeTools {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let program = invocation.program_name();
        let tool = self.tools.get(&program).copied().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{program} not found"))
        })?;
        self.calls.lock().unwrap().push(program);
        let output = invocation
            .args
            .last()
            .map(PathBuf::from)
            .unwrap_or_default();
        let (code, data) = match tool {
            Tool::Succeed => (0, glb_bytes()),
            Tool::Crash => (1, glb_bytes()[..8].to_vec()),
        };
        std::fs::write(&output, data)?;
        Ok(ProcessOutput {
            exit: Exit::Code(code),
            stdout: String::new(),
            stderr: if code == 0 {
                String::new()
            } else {
                "segmentation fault".to_string()
            },
        })
    }
}
