//! Path validation for untrusted, request-supplied names.
//!
//! Two layers: [`validate`] is purely lexical and rejects anything that could
//! climb above its anchor; [`ensure_within`] runs after canonicalization and
//! catches symlinks that point elsewhere.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Lexically normalize a relative path, refusing to climb above its anchor.
///
/// `..` is allowed as long as it never pops past the first component. NUL
/// bytes, Windows prefixes and paths that normalize to nothing are rejected.
/// Leading `/` is ignored, so an absolute-looking request stays anchored.
///
/// # Returns
/// The normalized relative path, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use toonshelf_storage::validate_path;
/// assert!(validate_path("001.jpg").is_ok());
/// assert!(validate_path("extras/../002.png").is_ok());
/// assert!(validate_path("../../etc/passwd").is_err());
/// assert!(validate_path("a\0b.jpg").is_err());
/// assert_eq!(validate_path("/./extras//cover.jpg").unwrap(), Path::new("extras/cover.jpg"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let reject = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Path::components() lets NUL through on Unix, but syscalls would truncate at it.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(reject());
                }
                components.push(s);
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(reject()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(reject());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(reject());
    }
    Ok(components.into_iter().collect())
}

/// Check that an already-canonical `resolved` path lies inside the canonical `root`.
///
/// `requested` is only used for the error.
pub(crate) fn ensure_within(root: &Path, resolved: &Path, requested: &Path) -> Result<()> {
    // Component-based, so "/lib/ab" is not inside "/lib/a".
    if resolved.starts_with(root) && resolved != root {
        return Ok(());
    }
    exn::bail!(ErrorKind::Escape(requested.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("001.jpg", "001.jpg")]
    #[case("extras/cover.png", "extras/cover.png")]
    #[case("a//b//c.jpg", "a/b/c.jpg")]
    #[case("a/./b/./c.jpg", "a/b/c.jpg")]
    #[case("extras/../001.jpg", "001.jpg")]
    #[case("/001.jpg", "001.jpg")]
    #[case("pages/", "pages")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("../../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    #[case("a\0b")]
    #[case("\0")]
    fn test_rejected_paths(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[rstest]
    #[case("/lib/a", "/lib/a/001.jpg", true)]
    #[case("/lib/a", "/lib/a/x/002.jpg", true)]
    #[case("/lib/a", "/lib/ab/001.jpg", false)]
    #[case("/lib/a", "/etc/passwd", false)]
    #[case("/lib/a", "/lib/a", false)]
    fn test_ensure_within(#[case] root: &str, #[case] resolved: &str, #[case] inside: bool) {
        let result = ensure_within(Path::new(root), Path::new(resolved), Path::new("req"));
        assert_eq!(result.is_ok(), inside);
    }
}
