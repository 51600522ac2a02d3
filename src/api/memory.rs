//! In-memory API server for testing
//!
//! Understands the subset of the Zabbix API this crate uses: `get`,
//! `create`, `update` on the configuration collections, plus
//! `configuration.export` / `configuration.import`. Names are unique per
//! collection and a second create with the same name fails the way the real
//! server does (`-32602`, "... already exists.").

use super::{scalar_to_string, ApiClient, ServerVersion};
use crate::error::{Error, Result};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Error code the real server uses for invalid parameters, duplicates included
const INVALID_PARAMS: i64 = -32602;
const APPLICATION_ERROR: i64 = -32500;
const METHOD_NOT_FOUND: i64 = -32601;

/// Per-collection bookkeeping: id field, unique field, label used in messages
struct CollectionMeta {
    id_field: &'static str,
    unique_field: &'static str,
    label: &'static str,
}

fn collection_meta(collection: &str, version: ServerVersion) -> Option<CollectionMeta> {
    let meta = |id_field, unique_field, label| CollectionMeta {
        id_field,
        unique_field,
        label,
    };

    Some(match collection {
        "image" => meta("imageid", "name", "Image"),
        "usermacro" => meta("globalmacroid", "macro", "Macro"),
        "hostgroup" => meta("groupid", "name", "Host group"),
        "templategroup" => meta("groupid", "name", "Template group"),
        "template" => meta("templateid", "host", "Template"),
        "host" => meta("hostid", "host", "Host"),
        "map" => meta("sysmapid", "name", "Map"),
        "script" => meta("scriptid", "name", "Script"),
        "usergroup" => meta("usrgrpid", "name", "User group"),
        "mediatype" => meta("mediatypeid", "name", "Media type"),
        "role" => meta("roleid", "name", "Role"),
        "user" if version.at_least(5, 4) => meta("userid", "username", "User with username"),
        "user" => meta("userid", "alias", "User with alias"),
        _ => return None,
    })
}

/// Failure or canned response returned instead of the normal result
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    /// Simulate a dropped connection
    Transport(String),
    /// Simulate a server-reported error
    Remote {
        code: i64,
        message: String,
        data: String,
    },
    /// Return this value as the call result
    Respond(Value),
}

struct Injection {
    remaining_ok: usize,
    failure: InjectedFailure,
}

#[derive(Default)]
struct ServerState {
    collections: BTreeMap<String, Vec<Value>>,
    next_id: u64,
    injections: HashMap<String, Injection>,
    calls: Vec<String>,
}

/// In-memory stand-in for a Zabbix server
pub struct MemoryServer {
    version: ServerVersion,
    state: RwLock<ServerState>,
}

impl MemoryServer {
    /// Create an empty server reporting API 6.0.0
    #[must_use]
    pub fn new() -> Self {
        Self::with_version(ServerVersion::new(6, 0, 0))
    }

    /// Create an empty server reporting the given API version
    #[must_use]
    pub fn with_version(version: ServerVersion) -> Self {
        Self {
            version,
            state: RwLock::new(ServerState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Start id assignment at `first_id`, so two servers hand out different ids
    #[must_use]
    pub fn starting_at(self, first_id: u64) -> Self {
        self.write_state().next_id = first_id;
        self
    }

    /// Seed a record directly, assigning an id if it has none. Returns the id.
    pub fn insert(&self, collection: &str, mut record: Value) -> String {
        let mut state = self.write_state();
        let id_field = collection_meta(collection, self.version).map_or("id", |m| m.id_field);

        let id = match record.get(id_field).and_then(scalar_to_string) {
            Some(id) => id,
            None => {
                let id = state.next_id.to_string();
                state.next_id += 1;
                record[id_field] = Value::String(id.clone());
                id
            }
        };

        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
        id
    }

    /// All records currently stored in a collection
    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.read_state()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Find a record by its unique field (name, host, macro, login)
    pub fn find(&self, collection: &str, unique: &str) -> Option<Value> {
        let meta = collection_meta(collection, self.version)?;
        self.records(collection)
            .into_iter()
            .find(|r| r.get(meta.unique_field).and_then(Value::as_str) == Some(unique))
    }

    /// Replace a stored record's fields, matched by id
    pub fn modify(&self, collection: &str, id: &str, changes: Value) {
        let mut state = self.write_state();
        let Some(meta) = collection_meta(collection, self.version) else {
            return;
        };
        if let Some(records) = state.collections.get_mut(collection) {
            if let Some(record) = records
                .iter_mut()
                .find(|r| r.get(meta.id_field).and_then(scalar_to_string).as_deref() == Some(id))
            {
                merge(record, changes);
            }
        }
    }

    /// Make `method` succeed `after` more times, then fail from then on
    pub fn inject_failure(&self, method: &str, after: usize, failure: InjectedFailure) {
        self.write_state().injections.insert(
            method.to_string(),
            Injection {
                remaining_ok: after,
                failure,
            },
        );
    }

    /// Methods called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.read_state().calls.clone()
    }

    /// Number of calls made to `method`
    pub fn call_count(&self, method: &str) -> usize {
        self.read_state()
            .calls
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ServerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ServerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn take_injection(&self, method: &str) -> Option<InjectedFailure> {
        let mut state = self.write_state();
        let injection = state.injections.get_mut(method)?;
        if injection.remaining_ok > 0 {
            injection.remaining_ok -= 1;
            return None;
        }
        Some(injection.failure.clone())
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        match method {
            "apiinfo.version" => return Ok(json!(self.version.to_string())),
            "user.login" => return Ok(json!("0424bd59b807674191e7d77572075f33")),
            "user.logout" => return Ok(json!(true)),
            "configuration.export" => return self.export_configuration_document(&params),
            "configuration.import" => return self.import_configuration_document(&params),
            "usermacro.createglobal" => return self.create_record("usermacro", params),
            _ => {}
        }

        let (collection, operation) = method.split_once('.').unwrap_or((method, ""));
        match operation {
            "get" if collection_meta(collection, self.version).is_some() => {
                Ok(Value::Array(self.get(collection, &params)))
            }
            "create" => self.create_record(collection, params),
            "update" => self.update_record(collection, params),
            _ => Err(remote(METHOD_NOT_FOUND, "Method not found.", method)),
        }
    }

    fn get(&self, collection: &str, params: &Value) -> Vec<Value> {
        let state = self.read_state();
        let records = state.collections.get(collection).cloned().unwrap_or_default();
        let Some(meta) = collection_meta(collection, self.version) else {
            return Vec::new();
        };

        records
            .into_iter()
            .filter(|record| matches_filter(record, params.get("filter")))
            .filter(|record| in_groups(record, params.get("groupids")))
            .map(|record| self.present(&state, collection, record))
            .map(|record| project(record, params.get("output"), meta.id_field))
            .collect()
    }

    /// Shape a stored record the way `get` returns it
    fn present(&self, state: &ServerState, collection: &str, mut record: Value) -> Value {
        if collection == "user" {
            if let Some(obj) = record.as_object_mut() {
                obj.remove("passwd");
            }
            let group_names: HashMap<String, String> = state
                .collections
                .get("usergroup")
                .into_iter()
                .flatten()
                .filter_map(|g| {
                    Some((
                        g.get("usrgrpid").and_then(scalar_to_string)?,
                        g.get("name").and_then(scalar_to_string)?,
                    ))
                })
                .collect();
            if let Some(groups) = record.get_mut("usrgrps").and_then(Value::as_array_mut) {
                for group in groups {
                    let id = group.get("usrgrpid").and_then(scalar_to_string);
                    if let Some(name) = id.and_then(|id| group_names.get(&id)) {
                        group["name"] = Value::String(name.clone());
                    }
                }
            }
        }
        record
    }

    fn create_record(&self, collection: &str, mut record: Value) -> Result<Value> {
        let meta = collection_meta(collection, self.version)
            .ok_or_else(|| remote(METHOD_NOT_FOUND, "Method not found.", collection))?;

        if !record.is_object() {
            return Err(remote(INVALID_PARAMS, "Invalid params.", "Expected an object."));
        }
        if let Some(Value::String(s)) = record.get(meta.id_field) {
            return Err(remote(
                INVALID_PARAMS,
                "Invalid params.",
                &format!("Invalid parameter \"/1\": unexpected parameter \"{}\" = \"{s}\".", meta.id_field),
            ));
        }

        let unique = record
            .get(meta.unique_field)
            .and_then(scalar_to_string)
            .ok_or_else(|| {
                remote(
                    INVALID_PARAMS,
                    "Invalid params.",
                    &format!("Invalid parameter \"/1\": the parameter \"{}\" is missing.", meta.unique_field),
                )
            })?;

        if self.find(collection, &unique).is_some() {
            return Err(remote(
                INVALID_PARAMS,
                "Invalid params.",
                &format!("{} \"{unique}\" already exists.", meta.label),
            ));
        }

        if collection == "user" {
            self.normalize_new_user(&mut record);
        }

        let id = self.insert(collection, record);
        Ok(json!({ format!("{}s", meta.id_field): [id] }))
    }

    /// Store user medias under "medias" with their own ids, like the server does
    fn normalize_new_user(&self, record: &mut Value) {
        let Some(obj) = record.as_object_mut() else {
            return;
        };
        let medias = obj
            .remove("user_medias")
            .or_else(|| obj.remove("medias"))
            .unwrap_or_else(|| json!([]));

        let mut state = self.write_state();
        let medias: Vec<Value> = medias
            .as_array()
            .into_iter()
            .flatten()
            .cloned()
            .map(|mut media| {
                media["mediaid"] = Value::String(state.next_id.to_string());
                state.next_id += 1;
                media
            })
            .collect();
        obj.insert("medias".into(), Value::Array(medias));
    }

    fn update_record(&self, collection: &str, record: Value) -> Result<Value> {
        let meta = collection_meta(collection, self.version)
            .ok_or_else(|| remote(METHOD_NOT_FOUND, "Method not found.", collection))?;
        let id = record
            .get(meta.id_field)
            .and_then(scalar_to_string)
            .ok_or_else(|| remote(INVALID_PARAMS, "Invalid params.", "Missing object id."))?;

        let exists = self
            .records(collection)
            .iter()
            .any(|r| r.get(meta.id_field).and_then(scalar_to_string).as_deref() == Some(id.as_str()));
        if !exists {
            return Err(remote(
                APPLICATION_ERROR,
                "Application error.",
                "No permissions to referred object or it does not exist!",
            ));
        }

        self.modify(collection, &id, record);
        Ok(json!({ format!("{}s", meta.id_field): [id] }))
    }

    fn export_configuration_document(&self, params: &Value) -> Result<Value> {
        let options = params
            .get("options")
            .and_then(Value::as_object)
            .ok_or_else(|| remote(INVALID_PARAMS, "Invalid params.", "Missing export options."))?;

        let mut export = Map::new();
        export.insert(
            "version".into(),
            json!(format!("{}.{}", self.version.major, self.version.minor)),
        );

        for (key, collection) in DOCUMENT_SECTIONS {
            let Some(ids) = options.get(*key).and_then(Value::as_array) else {
                continue;
            };
            let Some(meta) = collection_meta(collection, self.version) else {
                continue;
            };
            let wanted: Vec<String> = ids.iter().filter_map(scalar_to_string).collect();
            let section: Vec<Value> = self
                .records(collection)
                .into_iter()
                .filter(|r| {
                    r.get(meta.id_field)
                        .and_then(scalar_to_string)
                        .is_some_and(|id| wanted.contains(&id))
                })
                .map(|mut r| {
                    if let Some(obj) = r.as_object_mut() {
                        obj.remove(meta.id_field);
                    }
                    r
                })
                .collect();
            export.insert((*key).to_string(), Value::Array(section));
        }

        let document = json!({ "zabbix_export": export });
        Ok(Value::String(serde_json::to_string(&document)?))
    }

    fn import_configuration_document(&self, params: &Value) -> Result<Value> {
        let source = params
            .get("source")
            .and_then(Value::as_str)
            .ok_or_else(|| remote(INVALID_PARAMS, "Invalid params.", "Missing import source."))?;
        let document: Value = serde_json::from_str(source).map_err(|e| {
            remote(APPLICATION_ERROR, "Application error.", &format!("Cannot read JSON: {e}."))
        })?;
        let rules = params.get("rules").cloned().unwrap_or_else(|| json!({}));

        for (key, collection) in import_sections(self.version) {
            let Some(records) = document["zabbix_export"].get(*key).and_then(Value::as_array) else {
                continue;
            };
            let Some(meta) = collection_meta(collection, self.version) else {
                continue;
            };
            let rule = |flag: &str| rules[*key][flag].as_bool().unwrap_or(false);

            for record in records {
                let unique = record.get(meta.unique_field).and_then(scalar_to_string);
                let existing = unique.as_deref().and_then(|u| self.find(collection, u));
                match existing {
                    Some(existing) if rule("updateExisting") => {
                        let id = existing.get(meta.id_field).and_then(scalar_to_string);
                        if let Some(id) = id {
                            self.modify(collection, &id, record.clone());
                        }
                    }
                    None if rule("createMissing") => {
                        self.insert(collection, record.clone());
                    }
                    _ => {}
                }
            }
        }

        Ok(json!(true))
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient for MemoryServer {
    fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.write_state().calls.push(method.to_string());

        match self.take_injection(method) {
            Some(InjectedFailure::Transport(reason)) => Err(Error::Transport(reason)),
            Some(InjectedFailure::Remote {
                code,
                message,
                data,
            }) => Err(Error::Remote {
                code,
                message,
                data,
            }),
            Some(InjectedFailure::Respond(value)) => Ok(value),
            None => self.dispatch(method, params),
        }
    }

    fn api_version(&self) -> ServerVersion {
        self.version
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Sections of a configuration document and the collection behind each
const DOCUMENT_SECTIONS: &[(&str, &str)] = &[
    ("templates", "template"),
    ("hosts", "host"),
    ("maps", "map"),
    ("images", "image"),
];

/// Sections applied by `configuration.import`, groups first
fn import_sections(version: ServerVersion) -> impl Iterator<Item = &'static (&'static str, &'static str)> {
    let groups: &[(&str, &str)] = if version.at_least(6, 2) {
        &[("host_groups", "hostgroup"), ("template_groups", "templategroup")]
    } else {
        &[("groups", "hostgroup")]
    };
    groups.iter().chain(DOCUMENT_SECTIONS)
}

fn remote(code: i64, message: &str, data: &str) -> Error {
    Error::Remote {
        code,
        message: message.to_string(),
        data: data.to_string(),
    }
}

fn merge(target: &mut Value, changes: Value) {
    if let (Some(target), Value::Object(changes)) = (target.as_object_mut(), changes) {
        for (key, value) in changes {
            target.insert(key, value);
        }
    }
}

fn matches_filter(record: &Value, filter: Option<&Value>) -> bool {
    let Some(filter) = filter.and_then(Value::as_object) else {
        return true;
    };
    filter.iter().all(|(field, wanted)| {
        let actual = record.get(field).and_then(scalar_to_string);
        match wanted {
            Value::Array(options) => options
                .iter()
                .filter_map(scalar_to_string)
                .any(|o| actual.as_deref() == Some(o.as_str())),
            other => scalar_to_string(other).as_deref() == actual.as_deref(),
        }
    })
}

fn in_groups(record: &Value, groupids: Option<&Value>) -> bool {
    let Some(wanted) = groupids.and_then(Value::as_array) else {
        return true;
    };
    let wanted: Vec<String> = wanted.iter().filter_map(scalar_to_string).collect();
    record
        .get("groups")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|g| g.get("groupid").and_then(scalar_to_string))
        .any(|id| wanted.contains(&id))
}

/// Apply an `output` field list; "extend" or nothing returns the whole record
fn project(record: Value, output: Option<&Value>, id_field: &str) -> Value {
    let Some(fields) = output.and_then(Value::as_array) else {
        return record;
    };
    let Value::Object(obj) = record else {
        return record;
    };
    let keep: Vec<&str> = fields.iter().filter_map(Value::as_str).collect();
    Value::Object(
        obj.into_iter()
            .filter(|(key, _)| key == id_field || keep.contains(&key.as_str()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_duplicate() {
        let server = MemoryServer::new();

        let ids = server.create("hostgroup.create", json!({"name": "Servers"})).unwrap();
        assert_eq!(ids, vec!["1"]);

        let err = server
            .create("hostgroup.create", json!({"name": "Servers"}))
            .unwrap_err();
        match err {
            Error::Remote { code, data, .. } => {
                assert_eq!(code, INVALID_PARAMS);
                assert!(data.contains("already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_get_with_filter_and_output() {
        let server = MemoryServer::new().starting_at(100);
        server.insert("hostgroup", json!({"name": "Servers", "flags": "0"}));
        server.insert("hostgroup", json!({"name": "Network", "flags": "0"}));

        let found = server
            .fetch(
                "hostgroup",
                json!({"output": ["name"], "filter": {"name": ["Network"]}}),
            )
            .unwrap();
        assert_eq!(found, vec![json!({"groupid": "101", "name": "Network"})]);
    }

    #[test]
    fn test_export_and_import_document() {
        let source = MemoryServer::new();
        let id = source.insert("template", json!({"host": "Template OS Linux", "name": "Linux"}));
        let document = source.export_configuration(json!({"templates": [id]})).unwrap();

        let target = MemoryServer::new();
        let rules = crate::rules::ImportRules::from_value(json!({
            "templates": {"createMissing": true}
        }))
        .unwrap();
        target.apply_configuration(&rules, &document).unwrap();

        let imported = target.find("template", "Template OS Linux").unwrap();
        assert_eq!(imported["name"], "Linux");
    }

    #[test]
    fn test_update_existing_and_missing() {
        let server = MemoryServer::new().starting_at(40);
        let id = server.insert("hostgroup", json!({"name": "Linux"}));

        let ids = server
            .update("hostgroup", json!({"groupid": id, "name": "Linux servers"}))
            .unwrap();
        assert_eq!(ids, vec!["40"]);
        assert!(server.find("hostgroup", "Linux servers").is_some());

        let err = server.update("hostgroup", json!({"groupid": "999", "name": "X"})).unwrap_err();
        assert!(matches!(err, Error::Remote { code: APPLICATION_ERROR, .. }));
        assert_eq!(server.call_count("hostgroup.update"), 2);
    }

    #[test]
    fn test_injected_failure_after_successes() {
        let server = MemoryServer::new();
        server.inject_failure(
            "hostgroup.create",
            1,
            InjectedFailure::Transport("connection reset".into()),
        );

        assert!(server.create("hostgroup.create", json!({"name": "A"})).is_ok());
        let err = server.create("hostgroup.create", json!({"name": "B"})).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(server.call_count("hostgroup.create"), 2);
    }

    #[test]
    fn test_user_login_field_follows_version() {
        let old = MemoryServer::with_version(ServerVersion::new(5, 0, 0));
        assert!(old.create("user.create", json!({"alias": "jdoe"})).is_ok());

        let new = MemoryServer::with_version(ServerVersion::new(6, 0, 0));
        assert!(new.create("user.create", json!({"alias": "jdoe"})).is_err());
        assert!(new.create("user.create", json!({"username": "jdoe"})).is_ok());
    }
}
