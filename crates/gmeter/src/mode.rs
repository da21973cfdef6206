//! Proxy modes and cassette names.

use std::fmt;

use serde::Serialize;

use crate::error::SwitchError;

/// Operating mode of the proxy. Exactly one is active at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "cassette", rename_all = "lowercase")]
pub enum Mode {
    Uninitialized,
    Recording(CassetteName),
    Playing(CassetteName),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Uninitialized => "uninitialized",
            Mode::Recording(_) => "recording",
            Mode::Playing(_) => "playing",
        }
    }

    pub fn cassette(&self) -> Option<&CassetteName> {
        match self {
            Mode::Uninitialized => None,
            Mode::Recording(name) | Mode::Playing(name) => Some(name),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cassette() {
            Some(name) => write!(f, "{}({})", self.name(), name),
            None => f.write_str(self.name()),
        }
    }
}

/// Name of a cassette. Never empty; it also names a file in the cassette
/// directory, so path separators and dot segments are refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CassetteName(String);

impl CassetteName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CassetteName {
    type Error = SwitchError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        if name.is_empty() {
            return Err(SwitchError::BadSwitchRequest("empty cassette name".into()));
        }
        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(SwitchError::BadSwitchRequest(format!(
                "cassette name {name:?} must not contain path components"
            )));
        }
        Ok(Self(name))
    }
}

impl TryFrom<&str> for CassetteName {
    type Error = SwitchError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::try_from(name.to_string())
    }
}

impl fmt::Display for CassetteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cassette_name_rejects_empty() {
        let err = CassetteName::try_from("").unwrap_err();
        assert!(matches!(err, SwitchError::BadSwitchRequest(_)));
    }

    #[test]
    fn test_cassette_name_rejects_path_components() {
        for name in ["..", ".", "a/b", "..\\evil", "nul\0"] {
            assert!(CassetteName::try_from(name).is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn test_cassette_name_allows_spaces() {
        let name = CassetteName::try_from("nice music").unwrap();
        assert_eq!(name.as_str(), "nice music");
    }

    #[test]
    fn test_mode_serializes_with_cassette() {
        let name = CassetteName::try_from("session1").unwrap();
        assert_eq!(
            serde_json::to_value(Mode::Recording(name)).unwrap(),
            serde_json::json!({"mode": "recording", "cassette": "session1"})
        );
        assert_eq!(
            serde_json::to_value(Mode::Uninitialized).unwrap(),
            serde_json::json!({"mode": "uninitialized"})
        );
    }

    #[test]
    fn test_mode_display() {
        let name = CassetteName::try_from("x").unwrap();
        assert_eq!(Mode::Playing(name).to_string(), "playing(x)");
        assert_eq!(Mode::Uninitialized.to_string(), "uninitialized");
    }
}
