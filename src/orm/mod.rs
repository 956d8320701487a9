//! Map records onto user-defined structs.
//!
//! A model is any `Serialize + Deserialize` struct implementing [`Model`];
//! [`ModelRecord`] pairs it with the record id and offers save / fetch /
//! delete against the model's table.

pub mod fields;
pub mod model;

pub use model::{Model, ModelMeta, ModelRecord};
