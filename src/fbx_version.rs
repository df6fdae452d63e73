//! Reading the version out of an FBX file header.
//!
//! Only the first kilobyte is looked at. Binary files carry the version as a little endian
//! `u32` right after the `Kaydara FBX Binary` magic, ASCII files mention it in the header
//! comment or in `FBXVersion: 7300`.

use crate::filesystem::FileSystem;
use byteorder::{ByteOrder, LittleEndian};
use regex::bytes::Regex;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::Path;
use std::sync::LazyLock;

const BINARY_MAGIC: &[u8] = b"Kaydara FBX Binary";
const VERSION_OFFSET: usize = 23;
const HEADER_LEN: usize = 1024;

/// Files older than 7.1 are not understood by current converters.
pub const MIN_SUPPORTED_VERSION: u32 = 7100;

static FBX_VERSION_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FBXVersion:\s*(\d+)").expect("valid regex"));
static FBX_HEADER_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*FBX (\d+)\.(\d+)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FbxEncoding {
    Binary,
    Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FbxVersion {
    pub encoding: FbxEncoding,
    /// e.g. `7400` for FBX 7.4
    pub version: Option<u32>,
}

impl FbxVersion {
    /// Whether the file should be re-saved before conversion.
    pub fn needs_upgrade(&self) -> bool {
        matches!(
            (self.encoding, self.version),
            (FbxEncoding::Binary, Some(version)) if version < MIN_SUPPORTED_VERSION
        )
    }
}

impl Display for FbxVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let encoding = match self.encoding {
            FbxEncoding::Binary => "Binary",
            FbxEncoding::Ascii => "ASCII",
        };
        match self.version {
            Some(version) => write!(
                f,
                "{encoding} FBX {}.{}",
                version / 1000,
                (version % 1000) / 100
            ),
            None => write!(f, "{encoding} FBX (version unknown)"),
        }
    }
}

/// Determines encoding and version from the start of a file.
pub fn sniff(header: &[u8]) -> FbxVersion {
    let header = &header[..header.len().min(HEADER_LEN)];
    if header.starts_with(BINARY_MAGIC) {
        let version = header
            .get(VERSION_OFFSET..VERSION_OFFSET + 4)
            .map(LittleEndian::read_u32);
        return FbxVersion {
            encoding: FbxEncoding::Binary,
            version,
        };
    }
    let version = FBX_VERSION_FIELD
        .captures(header)
        .and_then(|captures| parse_number(&captures[1]))
        .or_else(|| {
            FBX_HEADER_COMMENT.captures(header).and_then(|captures| {
                let major = parse_number(&captures[1])?;
                let minor = parse_number(&captures[2])?;
                Some(major * 1000 + minor * 100)
            })
        });
    FbxVersion {
        encoding: FbxEncoding::Ascii,
        version,
    }
}

fn parse_number(digits: &[u8]) -> Option<u32> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

pub fn detect_fbx_version(fs: &dyn FileSystem, path: &Path) -> io::Result<FbxVersion> {
    let data = fs.read_file(path)?;
    Ok(sniff(&data))
}
