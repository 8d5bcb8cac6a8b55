use crate::ArchiveKind;
use crate::error::{Error, ErrorKind};
use std::str::FromStr;

// Local file header, plus the empty-archive and spanned-archive markers.
const ZIP_MAGIC: [[u8; 4]; 3] = [*b"PK\x03\x04", *b"PK\x05\x06", *b"PK\x07\x08"];
// Shared prefix of the RAR 4 (`Rar!\x1A\x07\x00`) and RAR 5 (`Rar!\x1A\x07\x01\x00`) signatures.
const RAR_MAGIC: [u8; 6] = *b"Rar!\x1A\x07";

impl FromStr for ArchiveKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zip" | "cbz" => Ok(ArchiveKind::Zip),
            "rar" | "cbr" => Ok(ArchiveKind::Rar),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ArchiveKind {
    /// Detect the container format from the leading bytes of a file.
    ///
    /// Returns `None` if no signature matches or the input is too short. Only
    /// the first [`MAGIC_LEN`](crate::MAGIC_LEN) bytes are ever inspected.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if ZIP_MAGIC.iter().any(|magic| bytes.starts_with(magic)) {
            return Some(ArchiveKind::Zip);
        }
        if bytes.starts_with(&RAR_MAGIC) {
            return Some(ArchiveKind::Rar);
        }
        None
    }
}
