use reqwest::Url;

use super::client::Api;
use super::table::Table;
use super::warn_deprecated;
use crate::error::{Error, Result};

/// How a caller identifies the client when building a handle from loose
/// arguments: nothing, a raw API key, or an existing [`Api`].
#[derive(Debug, Clone)]
pub enum ApiArg {
    None,
    Key(String),
    Api(Api),
}

impl From<&str> for ApiArg {
    fn from(key: &str) -> Self {
        ApiArg::Key(key.to_string())
    }
}

impl From<String> for ApiArg {
    fn from(key: String) -> Self {
        ApiArg::Key(key)
    }
}

impl From<Api> for ApiArg {
    fn from(api: Api) -> Self {
        ApiArg::Api(api)
    }
}

impl From<&Api> for ApiArg {
    fn from(api: &Api) -> Self {
        ApiArg::Api(api.clone())
    }
}

impl<T: Into<ApiArg>> From<Option<T>> for ApiArg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ApiArg::None)
    }
}

/// An Airtable base: a client plus a base id
#[derive(Debug, Clone)]
pub struct Base {
    api: Api,
    id: String,
}

impl Base {
    pub fn new(api: &Api, base_id: impl Into<String>) -> Self {
        Self {
            api: api.clone(),
            id: base_id.into(),
        }
    }

    /// Build a base from loose arguments.
    ///
    /// A raw API key is still accepted for backwards compatibility, but logs a
    /// deprecation warning; prefer [`Api::base`].
    pub fn from_args(api: impl Into<ApiArg>, base_id: impl Into<String>) -> Result<Self> {
        let base_id = base_id.into();
        match api.into() {
            ApiArg::Api(api) => Ok(Self::new(&api, base_id)),
            ApiArg::Key(key) => {
                warn_deprecated(
                    "passing an API key to Base::from_args is deprecated; use Api::base() instead",
                );
                let api = Api::new(key)?;
                Ok(Self::new(&api, base_id))
            }
            ApiArg::None => Err(Error::InvalidArguments(format!(
                "Base {} needs an Api instance or an API key",
                base_id
            ))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn url(&self) -> Result<Url> {
        self.api.build_url(&[self.id.as_str()])
    }

    pub fn table(&self, table_name: impl Into<String>) -> Table {
        Table::new(self, table_name)
    }
}
