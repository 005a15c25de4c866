//! Document format version.

use std::fmt;

/// Format version of the document whose code is being interpreted.
///
/// A handful of coercions changed behaviour between format versions. Rather
/// than reading a process-wide "current movie" the version travels with the
/// runtime that owns the document and is passed to every gated conversion.
///
/// # Examples
///
/// ```
/// use core_types::ScriptVersion;
///
/// let legacy = ScriptVersion::new(6);
/// assert!(legacy.undefined_is_empty_string());
/// assert!(!legacy.strings_test_non_empty());
/// assert!(ScriptVersion::default().strings_test_non_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptVersion(u8);

impl ScriptVersion {
    /// The version assumed when a document does not say.
    pub const DEFAULT: ScriptVersion = ScriptVersion(8);

    /// Wraps a raw header version number.
    pub const fn new(version: u8) -> Self {
        ScriptVersion(version)
    }

    /// Raw version number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Undefined converts to `""` instead of `"undefined"` (version 6 and older).
    pub const fn undefined_is_empty_string(self) -> bool {
        self.0 <= 6
    }

    /// Undefined converts to 0 instead of NaN (version 6 and older).
    pub const fn undefined_is_zero(self) -> bool {
        self.0 <= 6
    }

    /// String to Boolean is a non-empty test (version 7 and newer).
    pub const fn strings_test_non_empty(self) -> bool {
        self.0 >= 7
    }
}

impl Default for ScriptVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ScriptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
