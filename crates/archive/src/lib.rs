//! Archive-backed episodes with content-based format detection.
//!
//! Comic collections store episodes either as plain directories of images or
//! as zip/rar containers, frequently with misleading suffixes (`.cbz` files
//! that are really rar, `.cbr` files that are really zip). This crate:
//!
//! - **Detects** the container format from magic bytes ([`ArchiveKind::from_magic_bytes`]),
//!   never from the file extension.
//! - **Lists** the image entries of an archive ([`list_images`], [`try_list_images`]).
//! - **Streams** a single entry in [`CHUNK_SIZE`] chunks ([`stream_image`])
//!   without ever holding the whole entry in memory.
//!
//! Both formats sit behind the [`Format`] trait; callers pick the variant once
//! via [`Archive::open`] and never branch on the kind again. All archive work
//! is blocking and runs on Tokio's blocking pool, bounded by a caller-supplied
//! timeout for the open step.

mod construct;
pub mod error;
mod format;
mod image;
mod stream;
mod util;

pub use crate::format::{Archive, Entry, Format};
pub use crate::image::{IMAGE_EXTENSIONS, content_type, is_image_name};
pub use crate::stream::{ImageStream, list_images, stream_image, try_list_images};

/// Size of every chunk produced by entry and file streams (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Number of leading bytes needed to recognise every supported container.
pub const MAGIC_LEN: usize = 8;

/// A supported archive container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ArchiveKind {
    /// PKWARE zip container (`.zip`, `.cbz`, ...)
    #[display("zip")]
    Zip,
    /// RAR 4 or RAR 5 container (`.rar`, `.cbr`, ...)
    #[display("rar")]
    Rar,
}
