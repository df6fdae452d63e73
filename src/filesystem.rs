use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// File operations the dispatcher performs around the external converters.
///
/// The converters themselves write through the operating system, the dispatcher only
/// inspects, promotes and cleans up what they leave behind.
pub trait FileSystem: Sync {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    /// Moves `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn file_len(&self, path: &Path) -> io::Result<u64>;
    /// A fresh directory for intermediate files that nobody else can write into.
    fn scratch_dir(&self) -> io::Result<ScratchDir>;
}

/// Holds generated scripts and intermediate FBX files while a tool runs.
///
/// On disk this is a `tempfile::TempDir`, created with a random name and owner only
/// permissions, and removed together with its contents when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    _dir: Option<tempfile::TempDir>,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.path.join(name)
    }
}

pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        std::fs::metadata(path).map(|metadata| metadata.len())
    }

    fn scratch_dir(&self) -> io::Result<ScratchDir> {
        let dir = tempfile::Builder::new().prefix("fbx2glb-").tempdir()?;
        Ok(ScratchDir {
            path: dir.path().to_path_buf(),
            _dir: Some(dir),
        })
    }
}

/// In-memory file system, mostly useful for exercising the dispatcher without touching disk.
///
/// Directories are implicit, `create_dir_all` always succeeds.
#[derive(Default, Clone)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    scratch_dirs: Arc<AtomicU64>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            scratch_dirs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.read().unwrap();
        files.get(path).cloned()
    }

    pub fn list_files(&self) -> Vec<String> {
        let files = self.files.read().unwrap();
        let mut names: Vec<String> = files.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        let mut files = self.files.write().unwrap();
        files.clear();
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("File not found: {}", path),
    )
}

impl FileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path_str = key(path);
        let files = self.files.read().unwrap();
        files.get(&path_str).cloned().ok_or_else(|| not_found(&path_str))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut files = self.files.write().unwrap();
        files.insert(key(path), data.to_vec());
        Ok(())
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read().unwrap();
        files.contains_key(&key(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from_str = key(from);
        let mut files = self.files.write().unwrap();
        match files.remove(&from_str) {
            Some(data) => {
                files.insert(key(to), data);
                Ok(())
            }
            None => Err(not_found(&from_str)),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let path_str = key(path);
        let mut files = self.files.write().unwrap();
        files
            .remove(&path_str)
            .map(|_| ())
            .ok_or_else(|| not_found(&path_str))
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        let path_str = key(path);
        let files = self.files.read().unwrap();
        files
            .get(&path_str)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(&path_str))
    }

    fn scratch_dir(&self) -> io::Result<ScratchDir> {
        let n = self.scratch_dirs.fetch_add(1, Ordering::Relaxed);
        Ok(ScratchDir {
            path: PathBuf::from(format!("/scratch/{n}")),
            _dir: None,
        })
    }
}
