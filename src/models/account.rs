use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Account role as stored by the identity subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular submitter; sees only their own orders
    Guest,
    /// Reviewer; sees orders assigned to them or that they acted on
    Dba,
    /// Unrestricted
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Dba => "dba",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Self::Guest),
            "dba" => Ok(Self::Dba),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub real_name: String,
    pub role: Role,
    pub department: String,
}

impl Account {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        let username = username.into();
        Self {
            real_name: username.clone(),
            username,
            role,
            department: "all".to_string(),
        }
    }

    pub fn with_real_name(mut self, real_name: impl Into<String>) -> Self {
        self.real_name = real_name.into();
        self
    }

    pub fn in_department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Scope labels granted to one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrant {
    pub username: String,
    pub labels: BTreeSet<String>,
}

impl GroupGrant {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            labels: BTreeSet::new(),
        }
    }

    pub fn grants(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}
