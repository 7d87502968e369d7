use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a warehouse user. Roles are distinct: an admin is not a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Picker,
    Supervisor,
    Admin,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Picker => "picker",
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
        }
    }

    /// Returns true if the role may issue and review work for other users.
    pub fn can_assign_work(&self) -> bool {
        matches!(self, Role::Supervisor | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "picker" => Ok(Role::Picker),
            "supervisor" => Ok(Role::Supervisor),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role {other:?} (expected picker, supervisor, or admin)"),
        }
    }
}

/// Profile is the identity record of an authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: uuid::Uuid,
    pub employee_id: String,
    pub full_name: String,
    pub role: Role,
    // Warehouse of the user, which is unset until an administrator assigns one.
    pub warehouse_id: Option<uuid::Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// ProfileMetadata is attached to a new identity at sign-up,
/// and is used server-side to create its Profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub full_name: String,
    pub employee_id: String,
    pub role: Role,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_parsing() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "7c0e2a1e-8a4f-4e55-9d0b-0d3b1c6e8f11",
            "employee_id": "EMP001",
            "full_name": "John Smith",
            "role": "supervisor",
            "warehouse_id": null,
            "created_at": "2024-05-01T10:00:00.123456+00:00",
        }))
        .unwrap();

        assert_eq!(profile.role, Role::Supervisor);
        assert_eq!(profile.warehouse_id, None);
        assert!(profile.created_at.is_some());
        assert!(profile.updated_at.is_none());
    }

    #[test]
    fn test_unknown_roles_are_rejected() {
        let err = serde_json::from_value::<Role>(json!("manager")).unwrap_err();
        assert!(err.to_string().contains("unknown variant"));

        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("boss".parse::<Role>().is_err());
    }

    #[test]
    fn test_assignment_capability() {
        assert!(!Role::Picker.can_assign_work());
        assert!(Role::Supervisor.can_assign_work());
        assert!(Role::Admin.can_assign_work());
    }
}
