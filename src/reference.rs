//! Cross-reference rebinding between servers
//!
//! Numeric ids are only meaningful on the server that assigned them, names
//! are assumed stable. Every reference a record carries is described once as
//! a [`ReferenceField`]; exporting rewrites each referenced id to the
//! referent's name ([`rebind_to_names`]) and importing rewrites each name to
//! whatever id the target server currently uses for it ([`resolve_to_ids`]).

use crate::api::{scalar_to_string, ApiClient};
use crate::error::{Error, Result};
use log::debug;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// A collection that other records refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    /// API collection name (`hostgroup`, `mediatype`, ...)
    pub name: &'static str,
    /// Field carrying the server-assigned id
    pub id_field: &'static str,
    /// Field carrying the human-readable name
    pub name_field: &'static str,
}

pub const HOST_GROUPS: Collection = Collection {
    name: "hostgroup",
    id_field: "groupid",
    name_field: "name",
};

pub const TEMPLATE_GROUPS: Collection = Collection {
    name: "templategroup",
    id_field: "groupid",
    name_field: "name",
};

pub const USER_GROUPS: Collection = Collection {
    name: "usergroup",
    id_field: "usrgrpid",
    name_field: "name",
};

pub const MEDIA_TYPES: Collection = Collection {
    name: "mediatype",
    id_field: "mediatypeid",
    name_field: "name",
};

pub const ROLES: Collection = Collection {
    name: "role",
    id_field: "roleid",
    name_field: "name",
};

/// One reference from a record to another collection
///
/// `container` names the field holding the referencing objects: `None` means
/// the record itself, `Some("rights")` means every object in the record's
/// `rights` list. Within each object the reference lives in `id_key`.
///
/// If `name_key` is `None`, the artifact stores the name in place of the id
/// (`{"id": "Linux servers"}`). If it is `Some`, the artifact keeps only the
/// name under that key and the id key is dropped (`{"name": "Admins"}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    pub container: Option<&'static str>,
    pub id_key: &'static str,
    pub name_key: Option<&'static str>,
    pub target: Collection,
    /// Value kept verbatim in both directions (e.g. `"0"` for "all")
    pub sentinel: Option<&'static str>,
}

impl ReferenceField {
    /// Reference stored in place of the id
    pub const fn inline(
        container: Option<&'static str>,
        id_key: &'static str,
        target: Collection,
    ) -> Self {
        Self {
            container,
            id_key,
            name_key: None,
            target,
            sentinel: None,
        }
    }

    /// Reference stored as a name next to (and replacing) the id
    pub const fn named(
        container: &'static str,
        id_key: &'static str,
        name_key: &'static str,
        target: Collection,
    ) -> Self {
        Self {
            container: Some(container),
            id_key,
            name_key: Some(name_key),
            target,
            sentinel: None,
        }
    }

    /// Keep `value` verbatim instead of rebinding it
    pub const fn with_sentinel(mut self, value: &'static str) -> Self {
        self.sentinel = Some(value);
        self
    }

    fn is_sentinel(&self, value: &str) -> bool {
        self.sentinel == Some(value)
    }
}

/// Two-way id/name map for one collection on one server
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    names_by_id: HashMap<String, String>,
    ids_by_name: HashMap<String, String>,
}

impl NameIndex {
    /// Build from `(id, name)` pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut index = Self::default();
        for (id, name) in pairs {
            index.ids_by_name.insert(name.clone(), id.clone());
            index.names_by_id.insert(id, name);
        }
        index
    }

    /// Fetch the whole collection from the server
    ///
    /// # Errors
    ///
    /// Fails if the fetch fails.
    pub fn fetch(client: &dyn ApiClient, collection: Collection) -> Result<Self> {
        let records = client.fetch(
            collection.name,
            json!({ "output": [collection.id_field, collection.name_field] }),
        )?;
        debug!("Indexed {} {} record(s)", records.len(), collection.name);

        Ok(Self::from_pairs(records.iter().filter_map(|r| {
            Some((
                r.get(collection.id_field).and_then(scalar_to_string)?,
                r.get(collection.name_field).and_then(scalar_to_string)?,
            ))
        })))
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names_by_id.get(id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.ids_by_name.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names_by_id.is_empty()
    }
}

/// Lazily fetched name indexes, one per referenced collection
///
/// A resolver lives for one entity kind, so records created by an earlier
/// kind in the same run are visible to the next one.
pub struct Resolver<'a> {
    client: &'a dyn ApiClient,
    indexes: HashMap<&'static str, NameIndex>,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self {
            client,
            indexes: HashMap::new(),
        }
    }

    fn index(&mut self, collection: Collection) -> Result<&NameIndex> {
        if !self.indexes.contains_key(collection.name) {
            let index = NameIndex::fetch(self.client, collection)?;
            self.indexes.insert(collection.name, index);
        }
        Ok(&self.indexes[collection.name])
    }

    /// Name the source server uses for `id`
    ///
    /// # Errors
    ///
    /// Returns [`Error::DanglingReference`] if no such id exists.
    pub fn name_of(&mut self, collection: Collection, id: &str) -> Result<String> {
        self.index(collection)?
            .name_of(id)
            .map(str::to_string)
            .ok_or_else(|| Error::DanglingReference {
                collection: collection.name.to_string(),
                id: id.to_string(),
            })
    }

    /// Id the target server uses for `name`
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceResolution`] if no such name exists.
    pub fn id_of(&mut self, collection: Collection, name: &str) -> Result<String> {
        self.index(collection)?
            .id_of(name)
            .map(str::to_string)
            .ok_or_else(|| Error::ReferenceResolution {
                collection: collection.name.to_string(),
                name: name.to_string(),
            })
    }
}

/// Rewrite every reference in `record` from id to name
///
/// Containers missing from the record (relation not selected or not
/// supported by the server) are left alone.
///
/// # Errors
///
/// Fails on the first id with no counterpart, or if an index fetch fails.
pub fn rebind_to_names(
    record: &mut Value,
    fields: &[ReferenceField],
    resolver: &mut Resolver<'_>,
) -> Result<()> {
    for field in fields {
        for object in referencing_objects(record, field) {
            let Some(id) = object.get(field.id_key).and_then(scalar_to_string) else {
                continue;
            };

            match field.name_key {
                _ if field.is_sentinel(&id) => {}
                None => {
                    let name = resolver.name_of(field.target, &id)?;
                    object.insert(field.id_key.to_string(), Value::String(name));
                }
                Some(name_key) => {
                    if !object.get(name_key).is_some_and(Value::is_string) {
                        let name = resolver.name_of(field.target, &id)?;
                        object.insert(name_key.to_string(), Value::String(name));
                    }
                    object.remove(field.id_key);
                }
            }
        }
    }
    Ok(())
}

/// Rewrite every reference in `record` from name to the target's id
///
/// # Errors
///
/// Returns [`Error::ReferenceResolution`] on the first name the target does
/// not know, or the fetch error if an index cannot be loaded.
pub fn resolve_to_ids(
    record: &mut Value,
    fields: &[ReferenceField],
    resolver: &mut Resolver<'_>,
) -> Result<()> {
    for field in fields {
        for object in referencing_objects(record, field) {
            let key = field.name_key.unwrap_or(field.id_key);
            let Some(name) = object.get(key).and_then(scalar_to_string) else {
                continue;
            };

            if field.is_sentinel(&name) {
                continue;
            }

            let id = resolver.id_of(field.target, &name)?;
            if let Some(name_key) = field.name_key {
                object.remove(name_key);
            }
            object.insert(field.id_key.to_string(), Value::String(id));
        }
    }
    Ok(())
}

/// Objects inside `record` that carry `field`
fn referencing_objects<'v>(
    record: &'v mut Value,
    field: &ReferenceField,
) -> Vec<&'v mut Map<String, Value>> {
    let container = match field.container {
        None => Some(record),
        Some(key) => record.get_mut(key),
    };

    match container {
        Some(Value::Object(obj)) => vec![obj],
        Some(Value::Array(items)) => items.iter_mut().filter_map(Value::as_object_mut).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryServer;

    const RIGHTS: ReferenceField = ReferenceField::inline(Some("rights"), "id", HOST_GROUPS);
    const GROUPS: ReferenceField = ReferenceField::named("usrgrps", "usrgrpid", "name", USER_GROUPS);
    const SCRIPT_GROUP: ReferenceField =
        ReferenceField::inline(None, "groupid", HOST_GROUPS).with_sentinel("0");

    fn server_with_groups() -> MemoryServer {
        let server = MemoryServer::new().starting_at(10);
        server.insert("hostgroup", json!({"name": "Linux servers"}));
        server.insert("hostgroup", json!({"name": "Network"}));
        server.insert("usergroup", json!({"name": "Admins"}));
        server
    }

    #[test]
    fn test_inline_roundtrip() {
        let source = server_with_groups();
        let mut record = json!({
            "name": "Operators",
            "rights": [{"permission": "2", "id": "10"}, {"permission": "3", "id": "11"}],
        });

        rebind_to_names(&mut record, &[RIGHTS], &mut Resolver::new(&source)).unwrap();
        assert_eq!(record["rights"][0]["id"], "Linux servers");
        assert_eq!(record["rights"][1]["id"], "Network");

        let target = MemoryServer::new().starting_at(500);
        target.insert("hostgroup", json!({"name": "Network"}));
        target.insert("hostgroup", json!({"name": "Linux servers"}));

        resolve_to_ids(&mut record, &[RIGHTS], &mut Resolver::new(&target)).unwrap();
        assert_eq!(record["rights"][0]["id"], "501");
        assert_eq!(record["rights"][1]["id"], "500");
    }

    #[test]
    fn test_named_reference_keeps_only_name() {
        let source = server_with_groups();
        let mut record = json!({"usrgrps": [{"usrgrpid": "12", "name": "Admins"}]});

        rebind_to_names(&mut record, &[GROUPS], &mut Resolver::new(&source)).unwrap();
        assert_eq!(record["usrgrps"], json!([{"name": "Admins"}]));

        let target = MemoryServer::new().starting_at(70);
        target.insert("usergroup", json!({"name": "Admins"}));
        resolve_to_ids(&mut record, &[GROUPS], &mut Resolver::new(&target)).unwrap();
        assert_eq!(record["usrgrps"], json!([{"usrgrpid": "70"}]));
    }

    #[test]
    fn test_named_reference_without_name_is_looked_up() {
        let source = server_with_groups();
        let mut record = json!({"usrgrps": [{"usrgrpid": "12"}]});

        rebind_to_names(&mut record, &[GROUPS], &mut Resolver::new(&source)).unwrap();
        assert_eq!(record["usrgrps"], json!([{"name": "Admins"}]));
    }

    #[test]
    fn test_sentinel_is_kept() {
        let source = server_with_groups();
        let mut record = json!({"name": "Ping", "groupid": "0"});

        rebind_to_names(&mut record, &[SCRIPT_GROUP], &mut Resolver::new(&source)).unwrap();
        assert_eq!(record["groupid"], "0");
        resolve_to_ids(&mut record, &[SCRIPT_GROUP], &mut Resolver::new(&source)).unwrap();
        assert_eq!(record["groupid"], "0");
        // No lookup needed for the sentinel
        assert_eq!(source.call_count("hostgroup.get"), 0);
    }

    #[test]
    fn test_missing_container_is_skipped() {
        let source = server_with_groups();
        let mut record = json!({"name": "Guests"});

        rebind_to_names(&mut record, &[RIGHTS], &mut Resolver::new(&source)).unwrap();
        assert_eq!(record, json!({"name": "Guests"}));
    }

    #[test]
    fn test_unknown_name_fails() {
        let target = MemoryServer::new();
        let mut record = json!({"rights": [{"permission": "2", "id": "Datacenter"}]});

        let err = resolve_to_ids(&mut record, &[RIGHTS], &mut Resolver::new(&target)).unwrap_err();
        assert!(matches!(
            err,
            Error::ReferenceResolution { ref collection, ref name }
                if collection == "hostgroup" && name == "Datacenter"
        ));
    }

    #[test]
    fn test_dangling_id_fails() {
        let source = server_with_groups();
        let mut record = json!({"rights": [{"permission": "2", "id": "999"}]});

        let err = rebind_to_names(&mut record, &[RIGHTS], &mut Resolver::new(&source)).unwrap_err();
        assert!(matches!(err, Error::DanglingReference { .. }));
    }

    #[test]
    fn test_index_is_fetched_once() {
        let source = server_with_groups();
        let mut resolver = Resolver::new(&source);
        for _ in 0..3 {
            let mut record = json!({"rights": [{"id": "10"}]});
            rebind_to_names(&mut record, &[RIGHTS], &mut resolver).unwrap();
        }
        assert_eq!(source.call_count("hostgroup.get"), 1);
    }
}
