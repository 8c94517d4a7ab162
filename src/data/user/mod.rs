use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::role::Role;

pub mod db;

pub static USER_COLLECTION_NAME: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Absent until an admin assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl From<db::UserCreateData> for User {
    fn from(data: db::UserCreateData) -> Self {
        User {
            id: crate::data::new_id(),
            email: data.email,
            name: data.name,
            photo: data.photo,
            role: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_role_is_not_stored() {
        let user = User::from(db::UserCreateData {
            email: "a@x.com".to_string(),
            name: None,
            photo: None,
        });

        let doc = bson::to_document(&user).unwrap();
        assert!(!doc.contains_key("role"));
        assert_eq!(doc.get_str("email").unwrap(), "a@x.com");
        assert!(doc.contains_key("_id"));
    }

    #[test]
    fn stored_role_round_trips() {
        let doc = bson::doc! { "_id": "u1", "email": "i@x.com", "role": "instructor" };
        let user: User = bson::from_document(doc).unwrap();

        assert_eq!(user.role, Some(Role::Instructor));
    }
}
