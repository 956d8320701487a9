use reqwest::{Method, Url};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::base::{ApiArg, Base};
use super::client::{Api, PageIter, Request};
use super::params::{ListOptions, WriteOptions};
use super::types::{
    DeletedList, Fields, RecordDeletedDict, RecordDict, RecordList, UpdateRecordDict,
    UpsertRecord, UpsertResultDict,
};
use super::warn_deprecated;
use crate::error::{Error, Result};
use crate::formulas::{self, ToFormula};

/// The API accepts at most this many records per write or delete call
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

/// How a caller identifies the base when building a table from loose
/// arguments: a raw base id or an existing [`Base`].
#[derive(Debug, Clone)]
pub enum BaseArg {
    Id(String),
    Base(Base),
}

impl From<&str> for BaseArg {
    fn from(id: &str) -> Self {
        BaseArg::Id(id.to_string())
    }
}

impl From<String> for BaseArg {
    fn from(id: String) -> Self {
        BaseArg::Id(id)
    }
}

impl From<Base> for BaseArg {
    fn from(base: Base) -> Self {
        BaseArg::Base(base)
    }
}

impl From<&Base> for BaseArg {
    fn from(base: &Base) -> Self {
        BaseArg::Base(base.clone())
    }
}

/// A table within a base, addressed by name or table id
#[derive(Debug, Clone)]
pub struct Table {
    base: Base,
    name: String,
}

impl Table {
    pub fn new(base: &Base, name: impl Into<String>) -> Self {
        Self {
            base: base.clone(),
            name: name.into(),
        }
    }

    /// Build a table from loose arguments.
    ///
    /// Accepted forms:
    /// - no api + a `Base`: the base supplies the client
    /// - API key + base id: still works, logs a deprecation warning
    ///
    /// Any other mix is rejected, including an `Api` together with a `Base`,
    /// which could otherwise pair a base with the wrong client.
    pub fn from_args(
        api: impl Into<ApiArg>,
        base: impl Into<BaseArg>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        match (api.into(), base.into()) {
            (ApiArg::None, BaseArg::Base(base)) => Ok(Self::new(&base, name)),
            (ApiArg::Key(key), BaseArg::Id(base_id)) => {
                warn_deprecated(
                    "passing an API key and base id to Table::from_args is deprecated; \
                     use Api::table() or Base::table() instead",
                );
                let api = Api::new(key)?;
                Ok(api.table(base_id, name))
            }
            (ApiArg::Key(_), BaseArg::Base(base)) => Err(Error::InvalidArguments(format!(
                "Table {} got an API key together with Base {}; \
                 pass no api and let the base supply it",
                name,
                base.id()
            ))),
            (ApiArg::Api(_), BaseArg::Id(base_id)) => Err(Error::InvalidArguments(format!(
                "Table {} got an Api together with base id {}; use Api::table() instead",
                name, base_id
            ))),
            (ApiArg::Api(_), BaseArg::Base(base)) => Err(Error::InvalidArguments(format!(
                "Table {} got both an Api and Base {}; pass no api and let the base supply it",
                name,
                base.id()
            ))),
            (ApiArg::None, BaseArg::Id(base_id)) => Err(Error::InvalidArguments(format!(
                "Table {} got base id {} without an Api or API key",
                name, base_id
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn api(&self) -> &Api {
        self.base.api()
    }

    pub fn url(&self) -> Result<Url> {
        self.api().build_url(&[self.base.id(), self.name.as_str()])
    }

    pub fn record_url(&self, record_id: &str) -> Result<Url> {
        self.api()
            .build_url(&[self.base.id(), self.name.as_str(), record_id])
    }

    /// Iterate over pages of records
    pub fn iterate(&self, options: &ListOptions) -> Result<RecordPages> {
        let fallback = self
            .api()
            .build_url(&[self.base.id(), self.name.as_str(), "listRecords"])?;
        let request = Request::new(Method::GET, self.url()?)
            .options(options.clone())
            .fallback(Method::POST, fallback);
        Ok(RecordPages {
            pages: self.api().iterate_requests(request)?,
        })
    }

    /// Fetch every matching record, following pagination
    pub fn all(&self, options: &ListOptions) -> Result<Vec<RecordDict>> {
        let mut records = Vec::new();
        for page in self.iterate(options)? {
            records.extend(page?);
        }
        debug!(target: "airtable::table", "fetched {} records from {}", records.len(), self.name);
        Ok(records)
    }

    pub fn first(&self, options: &ListOptions) -> Result<Option<RecordDict>> {
        let options = options.clone().max_records(1).page_size(1);
        match self.iterate(&options)?.next() {
            Some(page) => Ok(page?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// Fetch one record. Only the cell format options of `options` are sent.
    pub fn get(&self, record_id: &str, options: &ListOptions) -> Result<RecordDict> {
        let request = Request::new(Method::GET, self.record_url(record_id)?)
            .options(options.format_only());
        let value = self.api().request(request)?;
        Ok(serde_json::from_value(value)?)
    }

    /// First record whose `field` equals `value`
    pub fn match_first(
        &self,
        field: &str,
        value: impl ToFormula,
        options: &ListOptions,
    ) -> Result<Option<RecordDict>> {
        let formula = formulas::match_fields(&[(field, &value as &dyn ToFormula)], false);
        self.first(&options.clone().formula(formula))
    }

    /// Every record whose `field` equals `value`
    pub fn search(
        &self,
        field: &str,
        value: impl ToFormula,
        options: &ListOptions,
    ) -> Result<Vec<RecordDict>> {
        let formula = formulas::match_fields(&[(field, &value as &dyn ToFormula)], false);
        self.all(&options.clone().formula(formula))
    }

    pub fn create(&self, fields: Fields, options: &WriteOptions) -> Result<RecordDict> {
        let mut body = Map::new();
        body.insert("fields".into(), Value::Object(fields));
        options.apply(&mut body);
        let value = self
            .api()
            .request(Request::new(Method::POST, self.url()?).body(Value::Object(body)))?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn batch_create(
        &self,
        records: Vec<Fields>,
        options: &WriteOptions,
    ) -> Result<Vec<RecordDict>> {
        let url = self.url()?;
        let mut created = Vec::with_capacity(records.len());
        for chunk in records.chunks(MAX_RECORDS_PER_REQUEST) {
            let payload: Vec<Value> = chunk
                .iter()
                .map(|fields| json!({ "fields": fields }))
                .collect();
            let mut body = Map::new();
            body.insert("records".into(), Value::Array(payload));
            options.apply(&mut body);
            let value = self
                .api()
                .request(Request::new(Method::POST, url.clone()).body(Value::Object(body)))?;
            created.extend(serde_json::from_value::<RecordList>(value)?.records);
        }
        Ok(created)
    }

    /// Update one record; PATCH keeps unspecified fields, `replace` uses PUT
    pub fn update(
        &self,
        record_id: &str,
        fields: Fields,
        options: &WriteOptions,
    ) -> Result<RecordDict> {
        let mut body = Map::new();
        body.insert("fields".into(), Value::Object(fields));
        options.apply(&mut body);
        let request = Request::new(write_method(options), self.record_url(record_id)?)
            .body(Value::Object(body));
        let value = self.api().request(request)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn batch_update(
        &self,
        records: Vec<UpdateRecordDict>,
        options: &WriteOptions,
    ) -> Result<Vec<RecordDict>> {
        let url = self.url()?;
        let mut updated = Vec::with_capacity(records.len());
        for chunk in records.chunks(MAX_RECORDS_PER_REQUEST) {
            let mut body = Map::new();
            body.insert("records".into(), serde_json::to_value(chunk)?);
            options.apply(&mut body);
            let request =
                Request::new(write_method(options), url.clone()).body(Value::Object(body));
            let value = self.api().request(request)?;
            updated.extend(serde_json::from_value::<RecordList>(value)?.records);
        }
        Ok(updated)
    }

    /// Create or update records, matching existing ones on `key_fields`
    pub fn batch_upsert<S: AsRef<str>>(
        &self,
        records: Vec<UpsertRecord>,
        key_fields: &[S],
        options: &WriteOptions,
    ) -> Result<UpsertResultDict> {
        if key_fields.is_empty() {
            return Err(Error::InvalidArguments(
                "batch_upsert needs at least one key field".into(),
            ));
        }
        let key_fields: Vec<&str> = key_fields.iter().map(AsRef::as_ref).collect();
        let url = self.url()?;
        let mut result = UpsertResultDict::default();

        for chunk in records.chunks(MAX_RECORDS_PER_REQUEST) {
            let mut body = Map::new();
            body.insert("records".into(), serde_json::to_value(chunk)?);
            body.insert("performUpsert".into(), json!({ "fieldsToMergeOn": key_fields }));
            options.apply(&mut body);
            let request =
                Request::new(write_method(options), url.clone()).body(Value::Object(body));
            let value = self.api().request(request)?;
            let page: UpsertResultDict = serde_json::from_value(value)?;
            result.created_records.extend(page.created_records);
            result.updated_records.extend(page.updated_records);
            result.records.extend(page.records);
        }
        Ok(result)
    }

    pub fn delete(&self, record_id: &str) -> Result<RecordDeletedDict> {
        let value = self
            .api()
            .request(Request::new(Method::DELETE, self.record_url(record_id)?))?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn batch_delete<S: AsRef<str>>(&self, record_ids: &[S]) -> Result<Vec<RecordDeletedDict>> {
        let url = self.url()?;
        let mut deleted = Vec::with_capacity(record_ids.len());
        for chunk in record_ids.chunks(MAX_RECORDS_PER_REQUEST) {
            let mut request = Request::new(Method::DELETE, url.clone());
            for id in chunk {
                request = request.query("records[]", id.as_ref());
            }
            let value = self.api().request(request)?;
            deleted.extend(serde_json::from_value::<DeletedList>(value)?.records);
        }
        Ok(deleted)
    }

    /// Update the first record whose `field` equals `value`; `None` when
    /// nothing matches
    pub fn update_by_field(
        &self,
        field: &str,
        value: impl ToFormula,
        fields: Fields,
        options: &WriteOptions,
    ) -> Result<Option<RecordDict>> {
        match self.match_first(field, value, &ListOptions::new())? {
            Some(record) => Ok(Some(self.update(&record.id, fields, options)?)),
            None => Ok(None),
        }
    }

    /// Delete the first record whose `field` equals `value`
    pub fn delete_by_field(
        &self,
        field: &str,
        value: impl ToFormula,
    ) -> Result<Option<RecordDeletedDict>> {
        match self.match_first(field, value, &ListOptions::new())? {
            Some(record) => Ok(Some(self.delete(&record.id)?)),
            None => Ok(None),
        }
    }

    /// Replace every record matched by `options` (the whole table when
    /// empty) with `records`. Returns the created and the deleted records.
    pub fn mirror(
        &self,
        records: Vec<Fields>,
        options: &ListOptions,
    ) -> Result<(Vec<RecordDict>, Vec<RecordDeletedDict>)> {
        let existing: Vec<String> = self.all(options)?.into_iter().map(|r| r.id).collect();
        let deleted = self.batch_delete(existing.as_slice())?;
        let created = self.batch_create(records, &WriteOptions::default())?;
        debug!(
            target: "airtable::table",
            "mirrored {}: {} deleted, {} created", self.name, deleted.len(), created.len()
        );
        Ok((created, deleted))
    }
}

fn write_method(options: &WriteOptions) -> Method {
    if options.replace {
        Method::PUT
    } else {
        Method::PATCH
    }
}

/// Pages of records produced by [`Table::iterate`]
pub struct RecordPages {
    pages: PageIter,
}

impl Iterator for RecordPages {
    type Item = Result<Vec<RecordDict>>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.pages.next()?;
        Some(page.and_then(|value| Ok(serde_json::from_value::<RecordList>(value)?.records)))
    }
}
