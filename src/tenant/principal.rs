use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role carried by a verified credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Manager,
    Admin,
    /// Machine / API-key client without a fixed company
    Service,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Service => "service",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "service" => Ok(Role::Service),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Authenticated caller, injected into request extensions by the auth middleware
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
    /// Company the credential was issued for, as supplied (not canonicalized)
    pub company: Option<String>,
}

impl Principal {
    pub fn new(id: i64, role: Role, company: Option<String>) -> Self {
        Self { id, role, company }
    }

    /// Principal for a request authenticated with the service API key
    pub fn service() -> Self {
        Self {
            id: 0,
            role: Role::Service,
            company: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Destructive or cross-cutting operations inside a company
    pub fn can_manage(&self) -> bool {
        matches!(self.role, Role::Manager | Role::Service | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_and_displays() {
        for role in [Role::Employee, Role::Manager, Role::Admin, Role::Service] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn elevation_rules() {
        let employee = Principal::new(7, Role::Employee, Some("acme".into()));
        assert!(!employee.can_manage());

        let manager = Principal::new(1, Role::Manager, Some("acme".into()));
        assert!(manager.can_manage());

        assert!(Principal::service().can_manage());
        assert!(!Principal::service().is_admin());
    }
}
