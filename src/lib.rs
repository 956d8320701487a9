//! Blocking client for the Airtable REST API.
//!
//! ```no_run
//! use airtable_rs::{Api, ListOptions};
//!
//! # fn main() -> airtable_rs::Result<()> {
//! let api = Api::from_env()?;
//! let table = api.table("appXXXXXXXXXXXXXX", "Contacts");
//! for record in table.all(&ListOptions::new().view("Grid view"))? {
//!     println!("{} {:?}", record.id, record.fields);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod formulas;
pub mod orm;
pub mod testing;
pub mod utils;

pub use api::{
    Api, ApiArg, Base, BaseArg, Fields, ListOptions, RecordDict, RetryStrategy, Table,
    WriteOptions,
};
pub use error::{Error, Result};
