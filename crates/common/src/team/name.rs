use std::fmt;

use serde::{Deserialize, Serialize};

const MIN_PART_LEN: usize = 2;
const MAX_PART_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeamNameError {
    #[error("zero length team name")]
    Empty,
    #[error("team name part '{0}' must be between 2 and 16 characters")]
    WrongSize(String),
    #[error("invalid team name part '{0}'")]
    InvalidPart(String),
    #[error("'{0}' is not a root team name")]
    NotRoot(String),
}

/// A validated, lowercased team name.
///
/// Names are dot-separated: `acme` is a root team, `acme.eng` is the `eng`
/// subteam of `acme`. Each part is 2–16 characters of `[a-z0-9_]`, starting
/// with a letter or digit and never containing `__`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamName(String);

fn validate_part(part: &str) -> Result<(), TeamNameError> {
    if part.len() < MIN_PART_LEN || part.len() > MAX_PART_LEN {
        return Err(TeamNameError::WrongSize(part.to_string()));
    }
    let mut prev_underscore = true;
    for c in part.chars() {
        match c {
            'a'..='z' | '0'..='9' => prev_underscore = false,
            '_' if !prev_underscore => prev_underscore = true,
            _ => return Err(TeamNameError::InvalidPart(part.to_string())),
        }
    }
    Ok(())
}

impl TeamName {
    /// Parse and lowercase a team name
    pub fn parse(name: &str) -> Result<Self, TeamNameError> {
        if name.is_empty() {
            return Err(TeamNameError::Empty);
        }
        let lowered = name.to_lowercase();
        for part in lowered.split('.') {
            validate_part(part)?;
        }
        Ok(TeamName(lowered))
    }

    /// Parse a name that must not have a parent
    pub fn parse_root(name: &str) -> Result<Self, TeamNameError> {
        let name = Self::parse(name)?;
        if !name.is_root() {
            return Err(TeamNameError::NotRoot(name.0));
        }
        Ok(name)
    }

    pub fn is_root(&self) -> bool {
        !self.0.contains('.')
    }

    pub fn depth(&self) -> usize {
        self.0.split('.').count()
    }

    /// The last component, e.g. `eng` for `acme.eng`
    pub fn last_part(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// The root team's name, e.g. `acme` for `acme.eng.infra`
    pub fn root_ancestor(&self) -> TeamName {
        TeamName(self.0.split('.').next().unwrap_or(&self.0).to_string())
    }

    pub fn parent(&self) -> Option<TeamName> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| TeamName(parent.to_string()))
    }

    /// The fully-qualified name of a direct child
    pub fn append(&self, child: &str) -> Result<TeamName, TeamNameError> {
        let lowered = child.to_lowercase();
        validate_part(&lowered)?;
        Ok(TeamName(format!("{}.{}", self.0, lowered)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TeamName {
    type Error = TeamNameError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        TeamName::parse(&value)
    }
}

impl From<TeamName> for String {
    fn from(name: TeamName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["acme", "ab", "a_b", "team_2024", "acme.eng", "Acme.ENG.infra"] {
            assert!(TeamName::parse(name).is_ok(), "{}", name);
        }
        assert_eq!(TeamName::parse("Acme.ENG").unwrap().as_str(), "acme.eng");
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(TeamName::parse(""), Err(TeamNameError::Empty));
        for name in [
            "a",
            "seventeen_chars_x",
            "_acme",
            "ac__me",
            "ac-me",
            "acme.",
            ".acme",
            "acme..eng",
            "acmé",
        ] {
            assert!(TeamName::parse(name).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_hierarchy() {
        let name = TeamName::parse("acme.eng.infra").unwrap();
        assert!(!name.is_root());
        assert_eq!(name.depth(), 3);
        assert_eq!(name.last_part(), "infra");
        assert_eq!(name.root_ancestor().as_str(), "acme");
        assert_eq!(name.parent().unwrap().as_str(), "acme.eng");
        assert!(TeamName::parse("acme").unwrap().parent().is_none());
    }

    #[test]
    fn test_append() {
        let acme = TeamName::parse_root("acme").unwrap();
        assert_eq!(acme.append("Eng").unwrap().as_str(), "acme.eng");
        assert!(acme.append("e").is_err());
        assert!(acme.append("a.b").is_err());
        assert!(TeamName::parse_root("acme.eng").is_err());
    }

    #[test]
    fn test_serde() {
        let name: TeamName = serde_json::from_str("\"acme.eng\"").unwrap();
        assert_eq!(name.as_str(), "acme.eng");
        assert!(serde_json::from_str::<TeamName>("\"a\"").is_err());
    }
}
