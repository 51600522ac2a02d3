//! Blocking JSON-RPC 2.0 client over HTTP

use super::{ApiClient, ServerVersion};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const ENDPOINT_FILE: &str = "api_jsonrpc.php";

/// JSON-RPC client for the Zabbix API
///
/// Connecting asks the server for its API version, which decides how the
/// session token is sent and which login parameter is used. The session is
/// closed with `user.logout` when the client is dropped.
pub struct JsonRpcClient {
    endpoint: String,
    agent: ureq::Agent,
    version: ServerVersion,
    token: Option<String>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Connect to a server and read its API version
    ///
    /// `url` may be the frontend root (`https://zabbix.example.com/`) or the
    /// full `.../api_jsonrpc.php` endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the server cannot be reached.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let agent = ureq::AgentBuilder::new()
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();

        let mut client = Self {
            endpoint: endpoint_url(url),
            agent,
            version: ServerVersion::default(),
            token: None,
            next_id: AtomicU64::new(1),
        };

        let reported = client.request("apiinfo.version", json!([]), false)?;
        let reported = reported.as_str().ok_or_else(|| Error::UnexpectedResponse {
            method: "apiinfo.version".into(),
            reason: "expected a version string".into(),
        })?;
        client.version = reported.parse()?;

        info!("Connected to {} (API {})", client.endpoint, client.version);
        Ok(client)
    }

    /// Open an authenticated session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the credentials are rejected.
    pub fn login(&mut self, login: &str, password: &str) -> Result<()> {
        // The "user" parameter was renamed to "username" in 5.4
        let login_key = if self.version.at_least(5, 4) {
            "username"
        } else {
            "user"
        };
        let params = json!({ login_key: login, "password": password });

        let token = match self.request("user.login", params, false) {
            Ok(Value::String(token)) => token,
            Ok(_) => {
                return Err(Error::UnexpectedResponse {
                    method: "user.login".into(),
                    reason: "expected a session token".into(),
                });
            }
            // A rejected login ends the whole action, same as a dead server
            Err(Error::Remote { message, data, .. }) => {
                return Err(Error::Transport(format!("Login failed: {message} {data}")));
            }
            Err(e) => return Err(e),
        };

        debug!("Logged in as {login}");
        self.token = Some(token);
        Ok(())
    }

    /// Close the session
    ///
    /// # Errors
    ///
    /// Fails if the logout call fails.
    pub fn logout(&mut self) -> Result<()> {
        if self.token.is_some() {
            self.request("user.logout", json!([]), true)?;
            self.token = None;
            debug!("Logged out from {}", self.endpoint);
        }
        Ok(())
    }

    /// Endpoint URL requests are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: &str, params: Value, authenticated: bool) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json-rpc");

        if authenticated {
            if let Some(token) = &self.token {
                // 6.4 deprecated the "auth" body field in favour of a bearer header
                if self.version.at_least(6, 4) {
                    request = request.set("Authorization", &format!("Bearer {token}"));
                } else {
                    body["auth"] = Value::String(token.clone());
                }
            }
        }

        debug!("→ {method} (#{id})");

        let response = request.send_json(body).map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                Error::Transport(format!("HTTP {code} from {}", self.endpoint))
            }
            ureq::Error::Transport(t) => Error::Transport(t.to_string()),
        })?;

        let mut reply: Value = response
            .into_json()
            .map_err(|e| Error::Transport(format!("Invalid response to {method}: {e}")))?;

        if let Some(error) = reply.get("error") {
            return Err(remote_error(error));
        }

        match reply.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(Error::UnexpectedResponse {
                method: method.to_string(),
                reason: "response has neither result nor error".into(),
            }),
        }
    }
}

impl ApiClient for JsonRpcClient {
    fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.request(method, params, true)
    }

    fn api_version(&self) -> ServerVersion {
        self.version
    }

    fn backend_name(&self) -> &'static str {
        "json-rpc"
    }
}

impl Drop for JsonRpcClient {
    fn drop(&mut self) {
        if let Err(e) = self.logout() {
            warn!("Failed to close API session: {e}");
        }
    }
}

/// Normalize a frontend URL to the JSON-RPC endpoint
fn endpoint_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with(ENDPOINT_FILE) {
        url.to_string()
    } else {
        format!("{}/{ENDPOINT_FILE}", url.trim_end_matches('/'))
    }
}

/// Convert a JSON-RPC error object into [`Error::Remote`]
fn remote_error(error: &Value) -> Error {
    let text = |key: &str| {
        error
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Error::Remote {
        code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
        message: text("message"),
        data: text("data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("https://zbx.example.com"),
            "https://zbx.example.com/api_jsonrpc.php"
        );
        assert_eq!(
            endpoint_url("https://zbx.example.com/zabbix/"),
            "https://zbx.example.com/zabbix/api_jsonrpc.php"
        );
        assert_eq!(
            endpoint_url(" http://10.0.0.5/api_jsonrpc.php "),
            "http://10.0.0.5/api_jsonrpc.php"
        );
    }

    #[test]
    fn test_remote_error() {
        let err = remote_error(&json!({
            "code": -32602,
            "message": "Invalid params.",
            "data": "Host group \"Servers\" already exists.",
        }));

        match err {
            Error::Remote {
                code,
                message,
                data,
            } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Invalid params.");
                assert_eq!(data, "Host group \"Servers\" already exists.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_connect_refused_is_transport_error() {
        // Port 9 (discard) on localhost is closed on any sane test machine
        let err = JsonRpcClient::connect("http://127.0.0.1:9", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(err.is_transport());
    }
}
