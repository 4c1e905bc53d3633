use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalKind {
    App,
    User,
    Group,
}

impl PrincipalKind {
    pub fn from_identity(id: &str) -> Option<Self> {
        let prefix = id.split('=').next()?.trim().to_ascii_lowercase();
        match prefix.as_str() {
            "aadapp" => Some(Self::App),
            "aaduser" => Some(Self::User),
            "aadgroup" => Some(Self::Group),
            _ => None,
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::App => "application",
            Self::User => "user",
            Self::Group => "group",
        };
        f.write_str(s)
    }
}

/// A role member, identified by its fully qualified Kusto principal string
/// (`aadapp=<id>;<tenant>`, `aaduser=<upn>`, `aadgroup=<id>;<tenant>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }

    pub fn kind(&self) -> Option<PrincipalKind> {
        PrincipalKind::from_identity(&self.id)
    }

    /// Identity comparison key; Kusto treats principal strings case-insensitively.
    pub fn identity(&self) -> String {
        self.id.trim().to_ascii_lowercase()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Principal {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admins,
    Users,
    Viewers,
    UnrestrictedViewers,
    Ingestors,
    Monitors,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admins,
        Role::Users,
        Role::Viewers,
        Role::UnrestrictedViewers,
        Role::Ingestors,
        Role::Monitors,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Admins => "admins",
            Self::Users => "users",
            Self::Viewers => "viewers",
            Self::UnrestrictedViewers => "unrestrictedviewers",
            Self::Ingestors => "ingestors",
            Self::Monitors => "monitors",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
