//! Server API version

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version reported by `apiinfo.version`, e.g. `6.0.12`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True when this version is `major.minor` or newer
    #[must_use]
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self::new(5, 0, 0)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("Invalid server version '{s}'"));

        // Pre-release builds report things like "7.0.0alpha3"
        let mut parts = s.trim().split('.').map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().map_err(|_| invalid())
        });

        let major = parts.next().ok_or_else(invalid)??;
        let minor = parts.next().transpose()?.unwrap_or(0);
        let patch = parts.next().transpose()?.unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!(
            "6.0.12".parse::<ServerVersion>().unwrap(),
            ServerVersion::new(6, 0, 12)
        );
        assert_eq!(
            "5.4".parse::<ServerVersion>().unwrap(),
            ServerVersion::new(5, 4, 0)
        );
        assert_eq!(
            "7.0.0alpha3".parse::<ServerVersion>().unwrap(),
            ServerVersion::new(7, 0, 0)
        );
        assert!("latest".parse::<ServerVersion>().is_err());
        assert!("".parse::<ServerVersion>().is_err());
    }

    #[test]
    fn test_at_least() {
        let v = ServerVersion::new(6, 2, 1);
        assert!(v.at_least(6, 2));
        assert!(v.at_least(5, 4));
        assert!(!v.at_least(6, 4));
        assert!(!v.at_least(7, 0));
    }
}
