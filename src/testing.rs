//! Helpers for tests that exercise code built on this crate.
//!
//! [`MockTransport`] replaces the network: responses are queued up front and
//! every request that reaches it is recorded for later inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::transport::{HttpRequest, HttpResponse, Transport};
use crate::api::{Api, RecordDict, RetryStrategy};
use crate::error::Result;
use crate::orm::fields::{Attachment, Collaborator};
use crate::orm::ModelMeta;

static NEXT_FAKE_ID: AtomicU64 = AtomicU64::new(1);

/// Build an id shaped like Airtable's: a prefix plus 14 characters.
///
/// Without a value a process-unique one is generated.
pub fn fake_id(prefix: &str, value: Option<&str>) -> String {
    let value = match value {
        Some(v) => format!("{:0>14}", v),
        None => format!("{:014X}", NEXT_FAKE_ID.fetch_add(1, Ordering::Relaxed)),
    };
    let value: String = value.chars().take(14).collect();
    format!("{}{}", prefix, value)
}

/// A record as the API would return it. `fields` should be a JSON object;
/// anything else yields a record with no fields.
pub fn fake_record(fields: Value, id: Option<&str>) -> RecordDict {
    let id = match id {
        Some(id) if id.starts_with("rec") => id.to_string(),
        Some(id) => fake_id("rec", Some(id)),
        None => fake_id("rec", None),
    };
    RecordDict {
        id,
        created_time: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        fields: fields.as_object().cloned().unwrap_or_default(),
        comment_count: None,
    }
}

pub fn fake_user(name: Option<&str>) -> Collaborator {
    let id = fake_id("usr", None);
    let name = name.map(str::to_string).unwrap_or_else(|| format!("Fake User {}", &id[3..]));
    Collaborator {
        id: Some(id),
        email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        name: Some(name),
    }
}

pub fn fake_attachment() -> Attachment {
    let id = fake_id("att", None);
    Attachment {
        url: format!("https://dl.airtable.com/.attachments/{}/a.png", id),
        id: Some(id),
        filename: Some("a.png".to_string()),
        size: Some(1024),
        mime_type: Some("image/png".to_string()),
        width: None,
        height: None,
        thumbnails: None,
    }
}

/// Model metadata pointing at a fake base; combine with
/// [`ModelMeta::with_api`] to route calls through a [`MockTransport`].
pub fn fake_meta(table_name: &str) -> ModelMeta {
    ModelMeta::new(fake_id("app", None), table_name).api_key("patFakePersonalAccessToken")
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<HttpResponse>,
    fallback: Option<HttpResponse>,
    requests: Vec<HttpRequest>,
}

/// In-memory transport; clones share their queue and request log
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// An `Api` that talks to this transport and retries without sleeping
    pub fn api(&self) -> Result<Api> {
        Api::builder("patFakePersonalAccessToken")
            .retry_strategy(RetryStrategy::default().with_backoff_factor(Duration::ZERO))
            .transport(Arc::new(self.clone()))
            .build()
    }

    pub fn push(&self, response: HttpResponse) {
        self.state.lock().unwrap().responses.push_back(response);
    }

    /// Queue a JSON response
    pub fn push_json<T: Serialize>(&self, status: u16, body: T) {
        let body = serde_json::to_value(body).unwrap_or(Value::Null);
        self.push(HttpResponse::json(status, &body));
    }

    /// Response used once the queue runs dry
    pub fn set_fallback(&self, response: HttpResponse) {
        self.state.lock().unwrap().fallback = Some(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().responses.len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        let response = match state.responses.pop_front() {
            Some(response) => response,
            None => state.fallback.clone().unwrap_or_else(|| {
                HttpResponse::json(
                    500,
                    &json!({"error": {
                        "type": "NO_MOCK_RESPONSE",
                        "message": format!(
                            "no response queued for {} {}",
                            request.method, request.url
                        )
                    }}),
                )
            }),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_id_shape() {
        assert_eq!(fake_id("rec", Some("1")), "rec00000000000001");
        let generated = fake_id("app", None);
        assert!(generated.starts_with("app"));
        assert_eq!(generated.len(), 17);
        assert_ne!(generated, fake_id("app", None));

        let accented = fake_id("rec", Some("aééééééééééééééé"));
        assert!(accented.starts_with("reca"));
        assert_eq!(accented.chars().count(), 17);
        assert_eq!(fake_id("usr", Some("é")).chars().count(), 17);
    }

    #[test]
    fn test_fake_meta_builds_table() {
        let meta = fake_meta("Contacts");
        assert!(meta.base_id.starts_with("app"));
        assert_eq!(meta.base_id.len(), 17);
        assert_eq!(meta.api_key.as_deref(), Some("patFakePersonalAccessToken"));

        let table = meta.table().unwrap();
        assert_eq!(table.name(), "Contacts");
        assert_eq!(table.base().id(), meta.base_id);
    }

    #[test]
    fn test_fake_record() {
        let record = fake_record(json!({"Name": "Alice"}), None);
        assert!(record.id.starts_with("rec"));
        assert_eq!(record.field("Name"), Some(&json!("Alice")));
        assert_eq!(fake_record(json!({}), Some("recFixed")).id, "recFixed");
        assert!(fake_record(json!(null), None).fields.is_empty());
    }

    #[test]
    fn test_fake_user_email() {
        let user = fake_user(Some("Alice Smith"));
        assert_eq!(user.email.as_deref(), Some("alice.smith@example.com"));
        assert!(user.id.unwrap().starts_with("usr"));
    }

    #[test]
    fn test_mock_without_responses() {
        let mock = MockTransport::new();
        let api = mock.api().unwrap();
        let err = api.whoami().unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.pending(), 0);
    }
}
