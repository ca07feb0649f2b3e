use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the authenticated party performing an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Doctor,
    Patient,
    Clinic,
    Staff,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Doctor => "doctor",
            ActorRole::Patient => "patient",
            ActorRole::Clinic => "clinic",
            ActorRole::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "doctor" => Some(ActorRole::Doctor),
            "patient" => Some(ActorRole::Patient),
            "clinic" => Some(ActorRole::Clinic),
            "staff" => Some(ActorRole::Staff),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attribution of an action to exactly one actor.
///
/// The role and id travel together so "exactly one of doctor / staff /
/// clinic / patient" is structural rather than four independently-nullable
/// columns that happen to agree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorRef {
    pub role: ActorRole,
    pub id: Uuid,
}

impl ActorRef {
    pub fn new(role: ActorRole, id: Uuid) -> Self {
        Self { role, id }
    }
}

/// The already-resolved identity behind every call into this subsystem.
///
/// Authentication happens elsewhere; this core only consumes the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub role: ActorRole,
    /// Clinic scope, when the session is bound to one.
    pub tenant_id: Option<Uuid>,
}

impl SessionContext {
    pub fn actor(&self) -> ActorRef {
        ActorRef::new(self.role, self.user_id)
    }
}

/// Media types accepted for attachment uploads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Pdf,
}

impl MediaType {
    /// Parse a declared MIME type.  Returns `None` for anything outside the
    /// whitelist; callers turn that into a validation error.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "application/pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Pdf => "application/pdf",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_mime())
    }
}
