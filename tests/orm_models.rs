use airtable_rs::orm::fields::{Attachment, Collaborator, Rating};
use airtable_rs::orm::{Model, ModelMeta, ModelRecord};
use airtable_rs::testing::{fake_attachment, fake_meta, fake_record, fake_user, MockTransport};
use airtable_rs::{Error, ListOptions};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

thread_local! {
    static MOCK: MockTransport = MockTransport::new();
}

fn mock() -> MockTransport {
    MOCK.with(|mock| mock.clone())
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Contact {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Registered", default)]
    registered: bool,
    #[serde(rename = "Owner", default, skip_serializing_if = "Option::is_none")]
    owner: Option<Collaborator>,
    #[serde(rename = "Photos", default, skip_serializing_if = "Vec::is_empty")]
    photos: Vec<Attachment>,
    #[serde(rename = "Score", default, skip_serializing_if = "Option::is_none")]
    score: Option<Rating>,
    #[serde(rename = "Record Link", default, skip_serializing)]
    record_link: Option<String>,
}

impl Model for Contact {
    fn meta() -> ModelMeta {
        let api = mock().api().expect("mock api");
        ModelMeta::new("appFakeBase00001", "Contacts").with_api(&api)
    }
}

fn contact(name: &str) -> Contact {
    Contact {
        name: name.to_string(),
        ..Contact::default()
    }
}

#[test]
fn test_save_creates_then_updates() {
    let mock = mock();
    mock.push_json(200, fake_record(json!({"Name": "Alice"}), Some("recAlice")));
    let saved = fake_record(json!({"Name": "Alice", "Registered": true}), Some("recAlice"));
    mock.push_json(200, saved);

    let mut record = ModelRecord::new(contact("Alice"));
    assert!(!record.exists());

    assert!(record.save().unwrap());
    assert_eq!(record.id(), Some("recAlice"));
    assert!(record.created_time().is_some());

    record.registered = true;
    assert!(!record.save().unwrap());

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::POST);
    assert!(requests[0].url.path().ends_with("/appFakeBase00001/Contacts"));
    assert_eq!(
        requests[0].body,
        Some(json!({"fields": {"Name": "Alice", "Registered": false}, "typecast": true}))
    );
    assert_eq!(requests[1].method, Method::PATCH);
    assert!(requests[1].url.path().ends_with("/Contacts/recAlice"));
    assert_eq!(requests[1].body.as_ref().unwrap()["fields"]["Registered"], json!(true));
}

#[test]
fn test_undeclared_and_computed_fields_are_not_sent() {
    let mock = mock();
    let remote = fake_record(
        json!({
            "Name": "Bob",
            "Secret Column": "keep me",
            "Record Link": "https://airtable.com/rec"
        }),
        Some("recBob"),
    );
    mock.push_json(200, remote.clone());

    let mut record = ModelRecord::<Contact>::from_record(&remote).unwrap();
    assert_eq!(record.record_link.as_deref(), Some("https://airtable.com/rec"));

    let fields = record.to_fields().unwrap();
    assert!(!fields.contains_key("Secret Column"));
    assert!(!fields.contains_key("Record Link"));

    record.save().unwrap();
    let sent = &mock.requests()[0];
    assert_eq!(sent.method, Method::PATCH);
    let sent_fields = sent.body.as_ref().unwrap()["fields"].as_object().unwrap().clone();
    assert!(!sent_fields.contains_key("Secret Column"));
    assert!(!sent_fields.contains_key("Record Link"));
}

#[test]
fn test_value_types_round_trip_through_records() {
    let owner = fake_user(Some("Alice Smith"));
    let photo = fake_attachment();
    let remote = fake_record(
        json!({
            "Name": "Carol",
            "Owner": owner,
            "Photos": [photo],
            "Score": 4
        }),
        None,
    );

    let record = ModelRecord::<Contact>::from_record(&remote).unwrap();
    assert_eq!(record.owner.as_ref(), Some(&owner));
    assert_eq!(record.photos, vec![photo]);
    assert_eq!(record.score.map(|s| s.value()), Some(4));

    let as_record = record.to_record().unwrap();
    assert_eq!(as_record["id"], json!(remote.id));
    assert_eq!(as_record["fields"]["Score"], json!(4));
}

#[test]
fn test_invalid_rating_fails_to_load() {
    let remote = fake_record(json!({"Name": "Dan", "Score": 0}), None);
    assert!(ModelRecord::<Contact>::from_record(&remote).is_err());
}

#[test]
fn test_fetch_reloads_fields() {
    let mock = mock();
    mock.push_json(200, fake_record(json!({"Name": "Eve", "Registered": true}), Some("recEve")));

    let mut record = ModelRecord::<Contact>::from_id("recEve", false).unwrap();
    assert_eq!(mock.request_count(), 0);
    assert_eq!(record.name, "");

    record.fetch().unwrap();
    assert_eq!(record.name, "Eve");
    assert!(record.registered);
    assert_eq!(mock.requests()[0].method, Method::GET);
}

#[test]
fn test_from_ids_keeps_requested_order() {
    let mock = mock();
    mock.push_json(
        200,
        json!({"records": [
            fake_record(json!({"Name": "B"}), Some("recB")),
            fake_record(json!({"Name": "A"}), Some("recA")),
        ]}),
    );

    let records = ModelRecord::<Contact>::from_ids(&["recA", "recB"]).unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);

    let formula = mock.requests()[0].query_value("filterByFormula").map(str::to_string);
    assert_eq!(
        formula.as_deref(),
        Some("OR(RECORD_ID()='recA',RECORD_ID()='recB')")
    );
}

#[test]
fn test_all_and_first() {
    let mock = mock();
    mock.push_json(
        200,
        json!({"records": [fake_record(json!({"Name": "A"}), None)], "offset": "itr1"}),
    );
    mock.push_json(200, json!({"records": [fake_record(json!({"Name": "B"}), None)]}));
    mock.push_json(200, json!({"records": []}));

    let everyone = ModelRecord::<Contact>::all(&ListOptions::new()).unwrap();
    assert_eq!(everyone.len(), 2);
    assert!(everyone.iter().all(|r| r.exists()));

    let nobody = ModelRecord::<Contact>::first(&ListOptions::new().formula("{Name}='Z'")).unwrap();
    assert!(nobody.is_none());
}

#[test]
fn test_batch_save_creates_and_updates() {
    let mock = mock();
    mock.push_json(
        200,
        json!({"records": [
            fake_record(json!({"Name": "New 1"}), Some("recNew1")),
            fake_record(json!({"Name": "New 2"}), Some("recNew2")),
        ]}),
    );
    mock.push_json(200, json!({"records": [fake_record(json!({"Name": "Old"}), Some("recOld"))]}));

    let existing = fake_record(json!({"Name": "Old"}), Some("recOld"));
    let mut records = vec![
        ModelRecord::new(contact("New 1")),
        ModelRecord::<Contact>::from_record(&existing).unwrap(),
        ModelRecord::new(contact("New 2")),
    ];

    ModelRecord::batch_save(&mut records).unwrap();

    assert_eq!(records[0].id(), Some("recNew1"));
    assert_eq!(records[1].id(), Some("recOld"));
    assert_eq!(records[2].id(), Some("recNew2"));

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[1].method, Method::PATCH);
    assert_eq!(requests[1].body.as_ref().unwrap()["records"][0]["id"], json!("recOld"));
}

#[test]
fn test_delete_requires_saved_record() {
    let mock = mock();
    let unsaved = ModelRecord::new(contact("Ghost"));

    assert!(matches!(unsaved.delete(), Err(Error::Model(_))));
    assert!(matches!(
        ModelRecord::batch_delete(&[unsaved]),
        Err(Error::Model(_))
    ));
    assert_eq!(mock.request_count(), 0);

    mock.push_json(200, json!({"id": "recGone", "deleted": true}));
    let saved = ModelRecord::<Contact>::from_id("recGone", false).unwrap();
    assert!(saved.delete().unwrap());
    assert_eq!(mock.requests()[0].method, Method::DELETE);
}

#[test]
fn test_meta_without_key_or_api() {
    let meta = ModelMeta::new("appX", "Contacts").api_key("patExplicit");
    assert!(meta.typecast);
    assert_eq!(meta.build_api().unwrap().api_key(), "patExplicit");
}

#[test]
fn test_fake_meta_routes_through_mock() {
    let mock = mock();
    mock.push_json(200, fake_record(json!({"Name": "Frank"}), Some("recFrank")));

    let meta = fake_meta("Contacts").with_api(&mock.api().unwrap());
    let record = meta.table().unwrap().get("recFrank", &ListOptions::new()).unwrap();
    assert_eq!(record.field("Name"), Some(&json!("Frank")));

    let sent = &mock.requests()[0];
    assert!(sent.url.path().contains(&meta.base_id));
    assert!(sent.url.path().ends_with("/Contacts/recFrank"));
}
