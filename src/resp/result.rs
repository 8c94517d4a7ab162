//! Write acknowledgements returned to clients.

use mongodb::results::{DeleteResult, UpdateResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl InsertResponse {
    pub fn new(id: impl ToString) -> InsertResponse {
        InsertResponse {
            acknowledged: true,
            inserted_id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

impl From<UpdateResult> for UpdateResponse {
    fn from(result: UpdateResult) -> Self {
        UpdateResponse {
            acknowledged: true,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl From<DeleteResult> for DeleteResponse {
    fn from(result: DeleteResult) -> Self {
        DeleteResponse {
            acknowledged: true,
            deleted_count: result.deleted_count,
        }
    }
}

/// Soft conflict: the request was fine, the document just already exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExistsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exist: Option<bool>,
    pub message: String,
}

impl ExistsResponse {
    pub fn flagged(message: impl ToString) -> ExistsResponse {
        ExistsResponse {
            exist: Some(true),
            message: message.to_string(),
        }
    }

    pub fn unflagged(message: impl ToString) -> ExistsResponse {
        ExistsResponse {
            exist: None,
            message: message.to_string(),
        }
    }
}

/// Either a fresh insert or a soft conflict. Both are sent with `200 OK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CreateResponse {
    Inserted(InsertResponse),
    Exists(ExistsResponse),
}

impl CreateResponse {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CreateResponse::Exists(_))
    }
}
