//! Handles for the Airtable REST API
//!
//! [`Api`] owns the credentials and transport, [`Base`] adds a base id and
//! [`Table`] a table name. Each handle references the previous one, so a
//! table always talks through the client its base was created with.

pub mod base;
pub mod client;
pub mod params;
pub mod retry;
pub mod table;
pub mod transport;
pub mod types;

pub use base::{ApiArg, Base};
pub use client::{Api, ApiBuilder, PageIter, Request};
pub use params::{CellFormat, ListOptions, Sort, SortDirection, WriteOptions};
pub use retry::RetryStrategy;
pub use table::{BaseArg, RecordPages, Table};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{
    CreateRecordDict, Fields, RecordDeletedDict, RecordDict, UpdateRecordDict, UpsertRecord,
    UpsertResultDict, UserAndScopesDict,
};

/// Target used for deprecation warnings, so they can be filtered separately
pub const DEPRECATION_TARGET: &str = "deprecation";

pub(crate) fn warn_deprecated(message: &str) {
    tracing::warn!(target: DEPRECATION_TARGET, "{}", message);
}
