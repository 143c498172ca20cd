//! Zone identifier → archive file name
//!
//! Zone names come from the remote API and are untrusted. They are
//! percent-encoded (everything outside the RFC 3986 unreserved set) and
//! the result is then validated to be a single, ordinary path component.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use std::path::{Component, Path};

use crate::error::{Error, Result};
use crate::traits::ZoneName;

/// Characters escaped in a path segment: all but `A-Z a-z 0-9 - . _ ~`
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Longest file name accepted by common filesystems
const MAX_FILE_NAME_BYTES: usize = 255;

/// Percent-encode a string for use as a single path or URL segment
pub fn encode_path_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// A validated file name for one zone inside the archive
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneFileName(String);

impl ZoneFileName {
    /// Sanitize and validate a zone name
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` when the encoded name is empty, `.`, `..`,
    /// `.git` (any case), too long, or otherwise not a plain file name.
    pub fn from_zone(zone: &ZoneName) -> Result<Self> {
        let encoded = encode_path_segment(zone.as_str());
        Self::validate(&encoded)?;
        Ok(Self(encoded))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_input("Zone name is empty"));
        }
        if name == "." || name == ".." || name.eq_ignore_ascii_case(".git") {
            return Err(Error::invalid_input(format!(
                "Zone name '{}' is reserved and cannot be archived",
                name
            )));
        }
        if name.len() > MAX_FILE_NAME_BYTES {
            return Err(Error::invalid_input(format!(
                "Zone file name too long: {} bytes (max {})",
                name.len(),
                MAX_FILE_NAME_BYTES
            )));
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(Error::invalid_input(format!(
                "Zone file name '{}' is not a single path component",
                name
            ))),
        }
    }

    /// The file name as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file name as a path relative to the archive root
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for ZoneFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_name(zone: &str) -> Result<ZoneFileName> {
        ZoneFileName::from_zone(&ZoneName::new(zone))
    }

    #[test]
    fn test_plain_domain_unchanged() {
        assert_eq!(file_name("example.com").unwrap().as_str(), "example.com");
        assert_eq!(file_name("a-b_c~d.example").unwrap().as_str(), "a-b_c~d.example");
    }

    #[test]
    fn test_unsafe_characters_encoded() {
        assert_eq!(file_name("a/b").unwrap().as_str(), "a%2Fb");
        assert_eq!(file_name("with space").unwrap().as_str(), "with%20space");
        assert_eq!(file_name("what?now").unwrap().as_str(), "what%3Fnow");
        assert_eq!(file_name("100%").unwrap().as_str(), "100%25");
        assert_eq!(file_name("back\\slash").unwrap().as_str(), "back%5Cslash");
    }

    #[test]
    fn test_traversal_attempts_stay_in_one_component() {
        let name = file_name("../../etc/passwd").unwrap();
        assert_eq!(name.as_str(), "..%2F..%2Fetc%2Fpasswd");
        assert_eq!(name.as_path().components().count(), 1);
    }

    #[test]
    fn test_unicode_encoded() {
        assert_eq!(file_name("bücher.de").unwrap().as_str(), "b%C3%BCcher.de");
    }

    #[test]
    fn test_reserved_names_rejected() {
        for zone in ["", ".", "..", ".git", ".GIT"] {
            let err = file_name(zone).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{zone:?} should be rejected");
        }
    }

    #[test]
    fn test_too_long_rejected() {
        assert!(file_name(&"a".repeat(255)).is_ok());
        assert!(file_name(&"a".repeat(256)).is_err());
        // 100 slashes encode to 300 bytes
        assert!(file_name(&"/".repeat(100)).is_err());
    }
}
