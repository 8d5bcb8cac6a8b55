use crate::ArchiveKind;

impl AsRef<str> for ArchiveKind {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl ArchiveKind {
    /// Returns the short name used for persistence and display.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Rar => "rar",
        }
    }
}
