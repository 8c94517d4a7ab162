use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::resp::problem::{problems, Problem};

/// Role assigned to a user by an admin. Users without one have no stored role.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allows a request only when the stored role is exactly the required one.
///
/// Roles don't form a hierarchy: an admin can't pass a student check.
pub fn authorize(stored: Option<Role>, required: Role) -> Result<(), Problem> {
    match stored {
        Some(role) if role == required => Ok(()),
        Some(role) => {
            tracing::debug!("role '{}' doesn't satisfy '{}'", role, required);
            Err(problems::forbidden())
        }
        None => {
            tracing::debug!("user without role doesn't satisfy '{}'", required);
            Err(problems::forbidden())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    const ALL: [Role; 3] = [Role::Student, Role::Instructor, Role::Admin];

    #[test]
    fn only_matching_role_is_allowed() {
        for stored in ALL {
            for required in ALL {
                let result = authorize(Some(stored), required);
                if stored == required {
                    assert!(result.is_ok(), "{} should pass {}", stored, required);
                } else {
                    let problem = result.expect_err("mismatched role must fail");
                    assert_eq!(problem.status, Status::Forbidden);
                }
            }
        }
    }

    #[test]
    fn unset_role_fails_every_check() {
        for required in ALL {
            let problem = authorize(None, required).expect_err("unset role must fail");
            assert_eq!(problem.status, Status::Forbidden);
        }
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Instructor).unwrap(),
            "\"instructor\""
        );
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
    }
}
