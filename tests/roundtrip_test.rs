//! Backup → Restore Integration Tests
//!
//! Backs up a populated source server and restores it into an empty target
//! that numbers its objects differently, then checks that every
//! cross-reference points at the target's own objects.

mod common;

use common::{source_server, source_server_with_version, target_server, with_roles, TestFixture};
use serde_json::{json, Value};
use zbx_migrate::{EntityKind, KindOutcome, MemoryServer, RunReport, Selection, ServerVersion};

fn id_of(server: &MemoryServer, collection: &str, unique: &str, id_field: &str) -> String {
    server
        .find(collection, unique)
        .unwrap_or_else(|| panic!("{collection} '{unique}' missing on target"))[id_field]
        .as_str()
        .unwrap()
        .to_string()
}

fn created(report: &RunReport) -> usize {
    report
        .kinds
        .iter()
        .map(|r| match &r.outcome {
            KindOutcome::Imported(summary) => summary.created.len(),
            _ => 0,
        })
        .sum()
}

// =============================================================================
// Reference rebinding
// =============================================================================

#[test]
fn test_full_roundtrip_rebinds_references() {
    let fixture = TestFixture::new();
    let source = source_server();
    let target = with_roles(target_server());

    assert!(fixture.backup(&source, Selection::all().kinds()).is_clean());
    let report = fixture.restore(&target, Selection::all().kinds());
    assert!(report.is_clean(), "{:?}", report.kinds);

    let linux = id_of(&target, "hostgroup", "Linux servers", "groupid");
    let admins = id_of(&target, "usergroup", "Admins", "usrgrpid");
    let email = id_of(&target, "mediatype", "Email", "mediatypeid");
    let role = id_of(&target, "role", "Admin role", "roleid");

    // Nothing on the target may point at a source id
    assert_ne!(linux, id_of(&source, "hostgroup", "Linux servers", "groupid"));

    let group = target.find("usergroup", "Admins").unwrap();
    assert_eq!(group["rights"], json!([{"permission": "3", "id": linux}]));

    let script = target.find("script", "Ping").unwrap();
    assert_eq!(script["usrgrpid"], admins.as_str());
    assert_eq!(script["groupid"], "0");

    let user = target.find("user", "jdoe").unwrap();
    assert_eq!(user["roleid"], role.as_str());
    assert_eq!(user["usrgrps"], json!([{"usrgrpid": admins}]));
    assert_eq!(user["medias"][0]["mediatypeid"], email.as_str());
    assert_eq!(user["medias"][0]["sendto"], json!(["jdoe@example.com"]));

    for (collection, unique) in [
        ("image", "Cloud (64)"),
        ("usermacro", "{$SNMP_COMMUNITY}"),
        ("template", "Template OS Linux"),
        ("host", "web01"),
        ("host", "core-sw"),
        ("map", "Datacenter"),
    ] {
        assert!(target.find(collection, unique).is_some(), "{unique} missing");
    }

    let map = target.find("map", "Datacenter").unwrap();
    assert_eq!(map["links"][0]["linktriggers"], json!([]));
}

#[test]
fn test_passwords_only_for_new_users() {
    let fixture = TestFixture::new();
    let source = source_server();
    let target = with_roles(target_server());
    fixture.backup(&source, Selection::all().kinds());

    let first = fixture.restore(&target, Selection::all().kinds());
    let logins: Vec<&str> = first.passwords().map(|p| p.login.as_str()).collect();
    assert_eq!(logins, vec!["anna", "jdoe"]);

    let second = fixture.restore(&target, Selection::all().kinds());
    assert_eq!(second.passwords().count(), 0);
}

#[test]
fn test_reexport_from_target_keeps_names() {
    let original = TestFixture::new();
    let reexported = TestFixture::new();
    let source = source_server();
    let target = with_roles(target_server());

    let kinds = Selection::all();
    assert!(original.backup(&source, kinds.kinds()).is_clean());
    assert!(original.restore(&target, kinds.kinds()).is_clean());

    let referencing = [EntityKind::UserGroups, EntityKind::Scripts, EntityKind::Users];
    assert!(reexported.backup(&target, &referencing).is_clean());

    for artifact in ["user_groups.json", "global_scripts.json", "users.json"] {
        assert_eq!(original.read(artifact), reexported.read(artifact), "{artifact}");
    }
    assert_eq!(
        reexported.read_json("user_groups.json")[0]["rights"],
        json!([{"id": "Linux servers", "permission": "3"}])
    );
}

// =============================================================================
// Idempotent restore
// =============================================================================

#[test]
fn test_second_restore_changes_nothing() {
    let fixture = TestFixture::new();
    let source = source_server();
    let target = with_roles(target_server());
    fixture.backup(&source, Selection::all().kinds());

    let first = fixture.restore(&target, Selection::all().kinds());
    assert!(created(&first) > 0);
    let snapshot: Vec<Vec<Value>> = ["hostgroup", "usergroup", "script", "user", "image", "host"]
        .iter()
        .map(|c| target.records(c))
        .collect();

    let second = fixture.restore(&target, Selection::all().kinds());
    assert_eq!(created(&second), 0);
    assert!(second.is_clean(), "{:?}", second.kinds);

    for kind in second.kinds.iter().filter_map(|r| match &r.outcome {
        KindOutcome::Imported(summary) if summary.applied.is_empty() => Some(summary),
        _ => None,
    }) {
        assert!(kind.failures.is_empty(), "{}", kind.kind);
        assert!(!kind.has_changes(), "{}", kind.kind);
    }

    let after: Vec<Vec<Value>> = ["hostgroup", "usergroup", "script", "user", "image", "host"]
        .iter()
        .map(|c| target.records(c))
        .collect();
    assert_eq!(snapshot, after);
}

// =============================================================================
// Cross-version
// =============================================================================

#[test]
fn test_old_source_to_new_target() {
    let fixture = TestFixture::new();
    let source = source_server_with_version(ServerVersion::new(5, 0, 0));
    let target = with_roles(target_server());

    let kinds = [
        EntityKind::HostGroups,
        EntityKind::UserGroups,
        EntityKind::MediaTypes,
        EntityKind::Users,
    ];
    fixture.backup(&source, &kinds);
    let users = fixture.read_json("users.json");
    assert_eq!(users[1]["alias"], "jdoe");

    let report = fixture.restore(&target, &kinds);
    assert!(report.is_clean(), "{:?}", report.kinds);
    // 3 host groups, 1 user group, 1 media type, 2 users
    assert_eq!(created(&report), 7);

    let user = target.find("user", "jdoe").unwrap();
    assert_eq!(user["username"], "jdoe");
    assert!(user.get("alias").is_none());
}
