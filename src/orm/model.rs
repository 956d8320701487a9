use std::ops::{Deref, DerefMut};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::fields::{format_datetime, parse_datetime};
use crate::api::client::API_KEY_ENV;
use crate::api::{
    Api, Fields, ListOptions, RecordDeletedDict, RecordDict, Table, UpdateRecordDict,
    WriteOptions,
};
use crate::error::{Error, Result};
use crate::formulas;

/// Where a model's records live and how to reach them
#[derive(Debug, Clone, Default)]
pub struct ModelMeta {
    pub base_id: String,
    pub table_name: String,
    /// Falls back to `AIRTABLE_API_KEY` when unset
    pub api_key: Option<String>,
    /// A prebuilt client; takes precedence over `api_key`
    pub api: Option<Api>,
    pub timeout: Option<Duration>,
    pub typecast: bool,
}

impl ModelMeta {
    pub fn new(base_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            table_name: table_name.into(),
            typecast: true,
            ..Self::default()
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api(mut self, api: &Api) -> Self {
        self.api = Some(api.clone());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn typecast(mut self, typecast: bool) -> Self {
        self.typecast = typecast;
        self
    }

    pub fn api_key_from_env() -> Result<String> {
        std::env::var(API_KEY_ENV).map_err(|_| Error::MissingApiKey)
    }

    pub fn build_api(&self) -> Result<Api> {
        if let Some(api) = &self.api {
            return Ok(api.clone());
        }
        let key = match &self.api_key {
            Some(key) => key.clone(),
            None => Self::api_key_from_env()?,
        };
        let mut builder = Api::builder(key);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    pub fn table(&self) -> Result<Table> {
        Ok(self.build_api()?.table(&self.base_id, &self.table_name))
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            typecast: self.typecast,
            ..WriteOptions::default()
        }
    }
}

/// A struct whose serde representation is the `fields` object of a record.
///
/// Field names come from `#[serde(rename = "...")]`; computed fields should
/// be `skip_serializing` so saves never try to write them.
///
/// ```ignore
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Contact {
///     #[serde(rename = "First Name", default)]
///     first_name: String,
///     #[serde(rename = "Registered", default)]
///     registered: bool,
/// }
///
/// impl Model for Contact {
///     fn meta() -> ModelMeta {
///         ModelMeta::new("appXXXXXXXXXXXXXX", "Contacts")
///     }
/// }
///
/// let mut contact = ModelRecord::new(Contact::default());
/// contact.first_name = "Alice".into();
/// contact.save()?;
/// ```
pub trait Model: Serialize + DeserializeOwned {
    fn meta() -> ModelMeta;

    fn table() -> Result<Table> {
        Self::meta().table()
    }
}

/// A model value together with its remote identity
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecord<M> {
    id: Option<String>,
    created_time: Option<DateTime<Utc>>,
    pub fields: M,
}

impl<M> Deref for ModelRecord<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.fields
    }
}

impl<M> DerefMut for ModelRecord<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.fields
    }
}

impl<M: Model> ModelRecord<M> {
    /// A record that does not exist remotely yet
    pub fn new(fields: M) -> Self {
        Self {
            id: None,
            created_time: None,
            fields,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        self.created_time
    }

    /// Whether the record has been saved (or loaded) and has an id
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    pub fn from_record(record: &RecordDict) -> Result<Self> {
        let fields = serde_json::from_value(Value::Object(record.fields.clone()))?;
        Ok(Self {
            id: Some(record.id.clone()),
            created_time: parse_datetime(&record.created_time),
            fields,
        })
    }

    /// The model's fields as they would be sent to the API
    pub fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(&self.fields)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Model(format!(
                "model must serialize to a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn to_record(&self) -> Result<Value> {
        Ok(json!({
            "id": self.id,
            "createdTime": self.created_time.as_ref().map(format_datetime),
            "fields": self.to_fields()?,
        }))
    }

    /// Create or update the remote record. Returns `true` when a record was
    /// created. Updates use PATCH, so columns the model does not declare keep
    /// their remote values.
    pub fn save(&mut self) -> Result<bool> {
        let meta = M::meta();
        let table = meta.table()?;
        let fields = self.to_fields()?;

        if let Some(id) = self.id.as_deref() {
            debug!(target: "airtable::orm", "updating {} in {}", id, meta.table_name);
            table.update(id, fields, &meta.write_options())?;
            return Ok(false);
        }

        let record = table.create(fields, &meta.write_options())?;
        debug!(target: "airtable::orm", "created {} in {}", record.id, meta.table_name);
        self.created_time = parse_datetime(&record.created_time);
        self.id = Some(record.id);
        Ok(true)
    }

    pub fn delete(&self) -> Result<bool> {
        let id = self.require_id("delete")?;
        Ok(M::table()?.delete(id)?.deleted)
    }

    /// Reload fields from the API
    pub fn fetch(&mut self) -> Result<()> {
        let id = self.require_id("fetch")?;
        let record = M::table()?.get(id, &ListOptions::new())?;
        *self = Self::from_record(&record)?;
        Ok(())
    }

    /// Fetch a single record by id
    pub fn get(record_id: &str) -> Result<Self> {
        let record = M::table()?.get(record_id, &ListOptions::new())?;
        Self::from_record(&record)
    }

    /// Handle for a record id; with `fetch = false` no request is made and
    /// the fields stay at their defaults until [`ModelRecord::fetch`].
    pub fn from_id(record_id: &str, fetch: bool) -> Result<Self>
    where
        M: Default,
    {
        if fetch {
            return Self::get(record_id);
        }
        Ok(Self {
            id: Some(record_id.to_string()),
            created_time: None,
            fields: M::default(),
        })
    }

    /// Fetch several records in one listing call
    pub fn from_ids<S: AsRef<str>>(record_ids: &[S]) -> Result<Vec<Self>> {
        if record_ids.is_empty() {
            return Ok(Vec::new());
        }
        let clauses: Vec<String> = record_ids
            .iter()
            .map(|id| formulas::equal(formulas::RECORD_ID, &formulas::str_value(id.as_ref())))
            .collect();
        let options = ListOptions::new().formula(formulas::or(clauses.as_slice()));
        let records = M::table()?.all(&options)?;

        let mut by_id: Vec<Self> = Vec::with_capacity(record_ids.len());
        for id in record_ids {
            let record = records
                .iter()
                .find(|r| r.id == id.as_ref())
                .ok_or_else(|| Error::Model(format!("record {} not found", id.as_ref())))?;
            by_id.push(Self::from_record(record)?);
        }
        Ok(by_id)
    }

    pub fn all(options: &ListOptions) -> Result<Vec<Self>> {
        M::table()?
            .all(options)?
            .iter()
            .map(Self::from_record)
            .collect()
    }

    pub fn first(options: &ListOptions) -> Result<Option<Self>> {
        match M::table()?.first(options)? {
            Some(record) => Ok(Some(Self::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Save many records with as few requests as possible: new ones are
    /// created in batches, existing ones updated in batches.
    pub fn batch_save(records: &mut [Self]) -> Result<()> {
        let meta = M::meta();
        let table = meta.table()?;
        let options = meta.write_options();

        let mut new_indices = Vec::new();
        let mut new_fields = Vec::new();
        let mut updates = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let fields = record.to_fields()?;
            match &record.id {
                Some(id) => updates.push(UpdateRecordDict {
                    id: id.clone(),
                    fields,
                }),
                None => {
                    new_indices.push(i);
                    new_fields.push(fields);
                }
            }
        }

        if !new_fields.is_empty() {
            let created = table.batch_create(new_fields, &options)?;
            if created.len() != new_indices.len() {
                return Err(Error::Model(format!(
                    "expected {} created records, got {}",
                    new_indices.len(),
                    created.len()
                )));
            }
            for (i, record) in new_indices.into_iter().zip(created) {
                records[i].created_time = parse_datetime(&record.created_time);
                records[i].id = Some(record.id);
            }
        }
        if !updates.is_empty() {
            table.batch_update(updates, &options)?;
        }
        Ok(())
    }

    pub fn batch_delete(records: &[Self]) -> Result<Vec<RecordDeletedDict>> {
        let ids = records
            .iter()
            .map(|r| r.require_id("batch_delete").map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        M::table()?.batch_delete(&ids)
    }

    fn require_id(&self, action: &str) -> Result<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| Error::Model(format!("cannot {} a record that was never saved", action)))
    }
}
