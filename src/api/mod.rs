//! Remote configuration API boundary
//!
//! Everything above this module talks to the server through [`ApiClient`]:
//! one `call` taking a method name and keyword parameters and returning the
//! parsed JSON result, or an [`Error::Remote`] carrying the server's numeric
//! code. Two implementations ship with the crate:
//!
//! - **[`JsonRpcClient`]**: blocking JSON-RPC 2.0 over HTTP
//! - **[`MemoryServer`]**: in-process fake server for tests

mod jsonrpc;
mod memory;
mod version;

pub use jsonrpc::JsonRpcClient;
pub use memory::{InjectedFailure, MemoryServer};
pub use version::ServerVersion;

use crate::error::{Error, Result};
use crate::rules::ImportRules;
use serde_json::{json, Value};

/// Trait for remote configuration API implementations
pub trait ApiClient {
    /// Invoke a remote procedure
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the server cannot be reached and
    /// [`Error::Remote`] when the server reports an error.
    fn call(&self, method: &str, params: Value) -> Result<Value>;

    /// API version of the connected server
    fn api_version(&self) -> ServerVersion;

    /// Backend name for logging/debugging
    fn backend_name(&self) -> &'static str;

    /// Fetch a collection (`<collection>.get`)
    ///
    /// # Errors
    ///
    /// Fails if the call fails or the result is not a list.
    fn fetch(&self, collection: &str, params: Value) -> Result<Vec<Value>> {
        let method = format!("{collection}.get");
        match self.call(&method, params)? {
            Value::Array(records) => Ok(records),
            other => Err(Error::UnexpectedResponse {
                method,
                reason: format!("expected a list, got {}", kind_of(&other)),
            }),
        }
    }

    /// Create one object and return the ids the server assigned
    ///
    /// `method` is the full method name because not every collection uses
    /// `.create` (global macros use `usermacro.createglobal`).
    ///
    /// # Errors
    ///
    /// Fails if the call fails.
    fn create(&self, method: &str, record: Value) -> Result<Vec<String>> {
        let result = self.call(method, record)?;
        Ok(returned_ids(&result))
    }

    /// Update one object (`<collection>.update`)
    ///
    /// # Errors
    ///
    /// Fails if the call fails.
    fn update(&self, collection: &str, record: Value) -> Result<Vec<String>> {
        let result = self.call(&format!("{collection}.update"), record)?;
        Ok(returned_ids(&result))
    }

    /// Export objects as a configuration document (`configuration.export`)
    ///
    /// `options` selects the objects, e.g. `{"templates": ["10001"]}`.
    ///
    /// # Errors
    ///
    /// Fails if the call fails or the server does not return a string.
    fn export_configuration(&self, options: Value) -> Result<String> {
        let params = json!({ "format": "json", "options": options });
        match self.call("configuration.export", params)? {
            Value::String(document) => Ok(document),
            other => Err(Error::UnexpectedResponse {
                method: "configuration.export".into(),
                reason: format!("expected a string, got {}", kind_of(&other)),
            }),
        }
    }

    /// Apply a configuration document (`configuration.import`)
    ///
    /// # Errors
    ///
    /// Fails if the call fails.
    fn apply_configuration(&self, rules: &ImportRules, source: &str) -> Result<()> {
        let params = json!({
            "format": "json",
            "rules": rules.to_value(),
            "source": source,
        });
        self.call("configuration.import", params)?;
        Ok(())
    }
}

/// Collect ids from a create/update result such as `{"groupids": ["7"]}`
fn returned_ids(result: &Value) -> Vec<String> {
    result
        .as_object()
        .into_iter()
        .flat_map(|obj| obj.iter())
        .filter(|(key, _)| key.ends_with("ids"))
        .filter_map(|(_, ids)| ids.as_array())
        .flatten()
        .filter_map(scalar_to_string)
        .collect()
}

/// Render a scalar JSON value as the string form the API uses for ids
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
