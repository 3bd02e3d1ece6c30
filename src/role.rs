//! Domain roles and their mapping to session capability tiers.

use std::fmt;

/// Domain role read from the profile store.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    /// Practitioner running the session.
    Therapist,
    /// Platform administrator.
    Admin,
    /// Session attendee.
    Client,
    /// A non-empty role string outside the known set. Never elevated.
    Unrecognized(String),
}

impl Role {
    /// Parses a stored role value.
    ///
    /// Returns `None` when the value is empty after trimming; callers treat
    /// that as a missing role rather than defaulting it.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        match trimmed {
            "" => None,
            "therapist" => Some(Self::Therapist),
            "admin" => Some(Self::Admin),
            "client" => Some(Self::Client),
            other => Some(Self::Unrecognized(other.to_string())),
        }
    }

    /// Returns the stored string form of the role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Therapist => "therapist",
            Self::Admin => "admin",
            Self::Client => "client",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Returns the capability tier granted by this role.
    pub fn capability(&self) -> CapabilityTier {
        match self {
            Self::Therapist | Self::Admin => CapabilityTier::Moderator,
            Self::Client | Self::Unrecognized(_) => CapabilityTier::Participant,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse access level inside a real-time session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CapabilityTier {
    /// May control the session.
    Moderator,
    /// May only take part.
    Participant,
}

impl CapabilityTier {
    /// Returns the string form of the tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Moderator => "moderator",
            Self::Participant => "participant",
        }
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a raw role value to a capability tier.
///
/// Unknown and empty values map to [`CapabilityTier::Participant`].
pub fn map_role_to_capability(role: &str) -> CapabilityTier {
    Role::parse(role)
        .map(|role| role.capability())
        .unwrap_or(CapabilityTier::Participant)
}
