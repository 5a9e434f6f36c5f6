use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable user identifier.  Callers are authenticated before they reach the
/// core, so this value is always trusted as-is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Who a user wants to be shown.  `Both` matches either gender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    Male,
    Female,
    Both,
}

impl GenderPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderPreference::Male => "male",
            GenderPreference::Female => "female",
            GenderPreference::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "male" => Some(GenderPreference::Male),
            "female" => Some(GenderPreference::Female),
            "both" => Some(GenderPreference::Both),
            _ => None,
        }
    }

    /// Whether this preference accepts the given gender.
    pub fn accepts(&self, gender: Gender) -> bool {
        match self {
            GenderPreference::Male => gender == Gender::Male,
            GenderPreference::Female => gender == Gender::Female,
            GenderPreference::Both => true,
        }
    }
}

/// The public subset of a profile sent in match payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSummary {
    pub id: UserId,
    pub name: String,
    pub image: String,
}

/// One entry of a user's match list, with the per-match unread badges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: UserId,
    pub name: String,
    pub image: String,
    /// The counterpart sent something this user has not yet seen.
    pub has_new_message: bool,
    /// This user sent something the counterpart has not yet seen.
    pub has_unseen_by_counterpart: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_accepts() {
        assert!(GenderPreference::Both.accepts(Gender::Male));
        assert!(GenderPreference::Both.accepts(Gender::Female));
        assert!(GenderPreference::Male.accepts(Gender::Male));
        assert!(!GenderPreference::Male.accepts(Gender::Female));
        assert!(!GenderPreference::Female.accepts(Gender::Male));
    }

    #[test]
    fn gender_round_trip() {
        for g in [Gender::Male, Gender::Female] {
            assert_eq!(Gender::from_str(g.as_str()), Some(g));
        }
        for p in [
            GenderPreference::Male,
            GenderPreference::Female,
            GenderPreference::Both,
        ] {
            assert_eq!(GenderPreference::from_str(p.as_str()), Some(p));
        }
    }
}
