//! Request options for listing and writing records.
//!
//! The same options travel either as a query string (GET) or as a JSON
//! body (POST `listRecords`), and the two encodings differ in shape.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Largest page the API will return
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFormat {
    Json,
    String,
}

impl CellFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellFormat::Json => "json",
            CellFormat::String => "string",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    /// Parse `"Name"` (ascending) or `"-Name"` (descending)
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                direction: SortDirection::Descending,
            },
            None => Self {
                field: raw.to_string(),
                direction: SortDirection::Ascending,
            },
        }
    }
}

/// Options accepted by the record listing endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub view: Option<String>,
    pub page_size: Option<u32>,
    pub max_records: Option<u32>,
    pub fields: Vec<String>,
    pub sort: Vec<Sort>,
    pub formula: Option<String>,
    pub cell_format: Option<CellFormat>,
    pub time_zone: Option<String>,
    pub user_locale: Option<String>,
    pub return_fields_by_field_id: Option<bool>,
    pub offset: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn max_records(mut self, max: u32) -> Self {
        self.max_records = Some(max);
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Add a sort key; a leading `-` sorts descending
    pub fn sort(mut self, raw: &str) -> Self {
        self.sort.push(Sort::parse(raw));
        self
    }

    pub fn formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn cell_format(mut self, format: CellFormat) -> Self {
        self.cell_format = Some(format);
        self
    }

    pub fn time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }

    pub fn user_locale(mut self, locale: impl Into<String>) -> Self {
        self.user_locale = Some(locale.into());
        self
    }

    pub fn return_fields_by_field_id(mut self, enabled: bool) -> Self {
        self.return_fields_by_field_id = Some(enabled);
        self
    }

    /// Only the options that shape how cells are returned; the single-record
    /// endpoint rejects or ignores everything else
    pub fn format_only(&self) -> Self {
        Self {
            cell_format: self.cell_format,
            time_zone: self.time_zone.clone(),
            user_locale: self.user_locale.clone(),
            return_fields_by_field_id: self.return_fields_by_field_id,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.page_size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(Error::InvalidParam(format!(
                    "page_size must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, size
                )));
            }
        }
        if self.max_records == Some(0) {
            return Err(Error::InvalidParam("max_records must be positive".into()));
        }
        let string_format = self.cell_format == Some(CellFormat::String);
        if !string_format && (self.time_zone.is_some() || self.user_locale.is_some()) {
            return Err(Error::InvalidParam(
                "time_zone and user_locale require cell_format = string".into(),
            ));
        }
        if self.fields.iter().any(|f| f.is_empty()) || self.sort.iter().any(|s| s.field.is_empty())
        {
            return Err(Error::InvalidParam("field names cannot be empty".into()));
        }
        Ok(())
    }

    /// Encode as GET query parameters
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |k: &str, v: String| query.push((k.to_string(), v));

        if let Some(view) = &self.view {
            push("view", view.clone());
        }
        if let Some(size) = self.page_size {
            push("pageSize", size.to_string());
        }
        if let Some(max) = self.max_records {
            push("maxRecords", max.to_string());
        }
        for field in &self.fields {
            push("fields[]", field.clone());
        }
        for (i, sort) in self.sort.iter().enumerate() {
            push(&format!("sort[{}][field]", i), sort.field.clone());
            push(&format!("sort[{}][direction]", i), sort.direction.as_str().to_string());
        }
        if let Some(formula) = &self.formula {
            push("filterByFormula", formula.clone());
        }
        if let Some(format) = self.cell_format {
            push("cellFormat", format.as_str().to_string());
        }
        if let Some(tz) = &self.time_zone {
            push("timeZone", tz.clone());
        }
        if let Some(locale) = &self.user_locale {
            push("userLocale", locale.clone());
        }
        if let Some(by_id) = self.return_fields_by_field_id {
            push("returnFieldsByFieldId", if by_id { "1" } else { "0" }.to_string());
        }
        if let Some(offset) = &self.offset {
            push("offset", offset.clone());
        }
        query
    }

    /// Encode as a POST `listRecords` body
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(view) = &self.view {
            body.insert("view".into(), json!(view));
        }
        if let Some(size) = self.page_size {
            body.insert("pageSize".into(), json!(size));
        }
        if let Some(max) = self.max_records {
            body.insert("maxRecords".into(), json!(max));
        }
        if !self.fields.is_empty() {
            body.insert("fields".into(), json!(self.fields));
        }
        if !self.sort.is_empty() {
            let sort: Vec<Value> = self
                .sort
                .iter()
                .map(|s| json!({"field": s.field, "direction": s.direction.as_str()}))
                .collect();
            body.insert("sort".into(), Value::Array(sort));
        }
        if let Some(formula) = &self.formula {
            body.insert("filterByFormula".into(), json!(formula));
        }
        if let Some(format) = self.cell_format {
            body.insert("cellFormat".into(), json!(format.as_str()));
        }
        if let Some(tz) = &self.time_zone {
            body.insert("timeZone".into(), json!(tz));
        }
        if let Some(locale) = &self.user_locale {
            body.insert("userLocale".into(), json!(locale));
        }
        if let Some(by_id) = self.return_fields_by_field_id {
            body.insert("returnFieldsByFieldId".into(), json!(by_id));
        }
        if let Some(offset) = &self.offset {
            body.insert("offset".into(), json!(offset));
        }
        Value::Object(body)
    }
}

/// Options accepted by create / update / upsert calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Let Airtable coerce string values into the field's type
    pub typecast: bool,
    /// Use PUT (clear unspecified fields) instead of PATCH
    pub replace: bool,
    pub return_fields_by_field_id: bool,
}

impl WriteOptions {
    pub fn typecast() -> Self {
        Self {
            typecast: true,
            ..Self::default()
        }
    }

    pub fn replace() -> Self {
        Self {
            replace: true,
            ..Self::default()
        }
    }

    /// Merge the write flags into a JSON request body
    pub fn apply(&self, body: &mut Map<String, Value>) {
        if self.typecast {
            body.insert("typecast".into(), Value::Bool(true));
        }
        if self.return_fields_by_field_id {
            body.insert("returnFieldsByFieldId".into(), Value::Bool(true));
        }
    }
}
