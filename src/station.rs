//! Flag stations: the discrete heights the halyard moves between.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A target or observed flag height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Station {
    /// Fully raised.
    Full,
    /// Half-staff.
    Half,
    /// Not confirmed by any sensor, or no station scheduled.
    #[default]
    Unknown,
}

impl Station {
    /// Single-letter code used in status lines and schedule summaries.
    pub fn letter(self) -> char {
        match self {
            Station::Full => 'F',
            Station::Half => 'H',
            Station::Unknown => '?',
        }
    }

    pub fn is_known(self) -> bool {
        self != Station::Unknown
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Station::Full => write!(f, "FULL"),
            Station::Half => write!(f, "HALF"),
            Station::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_and_display() {
        assert_eq!(Station::Full.letter(), 'F');
        assert_eq!(Station::Half.letter(), 'H');
        assert_eq!(Station::Unknown.letter(), '?');
        assert_eq!(Station::Half.to_string(), "HALF");
        assert!(!Station::default().is_known());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Station::Full).unwrap(), "\"full\"");
        let parsed: Station = serde_json::from_str("\"half\"").unwrap();
        assert_eq!(parsed, Station::Half);
    }
}
