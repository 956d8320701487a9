use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name → value mapping of a single record
pub type Fields = Map<String, Value>;

/// A record as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDict {
    pub id: String,
    #[serde(rename = "createdTime")]
    pub created_time: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(rename = "commentCount", default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<u64>,
}

impl RecordDict {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRecordDict {
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecordDict {
    pub id: String,
    pub fields: Fields,
}

/// Upsert payload: the id is optional, matching happens on key fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDeletedDict {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertResultDict {
    #[serde(rename = "createdRecords", default)]
    pub created_records: Vec<String>,
    #[serde(rename = "updatedRecords", default)]
    pub updated_records: Vec<String>,
    #[serde(default)]
    pub records: Vec<RecordDict>,
}

/// Response of `GET /v0/meta/whoami`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAndScopesDict {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordList {
    #[serde(default)]
    pub records: Vec<RecordDict>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeletedList {
    #[serde(default)]
    pub records: Vec<RecordDeletedDict>,
}
