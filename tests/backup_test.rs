//! Backup Integration Tests
//!
//! Tests for exporting every kind from an in-memory server:
//! - Ids stripped and references stored by name
//! - Artifact layout under the backup root
//! - Idempotent re-export
//! - Content-addressed images

mod common;

use common::{source_server, TestFixture};
use serde_json::json;
use zbx_migrate::{EntityKind, InjectedFailure, KindOutcome, Selection};

fn exported(report: &zbx_migrate::RunReport, kind: EntityKind) -> &zbx_migrate::ExportSummary {
    report
        .kinds
        .iter()
        .find_map(|r| match &r.outcome {
            KindOutcome::Exported(summary) if r.kind == kind => Some(summary),
            _ => None,
        })
        .expect("kind was not exported")
}

// =============================================================================
// Layout
// =============================================================================

#[test]
fn test_full_backup_layout() {
    let fixture = TestFixture::new();
    let server = source_server();

    let report = fixture.backup(&server, Selection::all().kinds());
    assert!(report.is_clean());

    for file in [
        "global_macros.json",
        "host_groups.json",
        "templates.json",
        "maps.json",
        "global_scripts.json",
        "user_groups.json",
        "media_types.json",
        "users.json",
        "hosts/linux-servers.json",
        "hosts/network.json",
    ] {
        assert!(fixture.artifact(file).is_file(), "{file} missing");
    }

    // Groups without hosts get no file
    assert!(!fixture.artifact("hosts/empty.json").exists());
    assert_eq!(std::fs::read_dir(fixture.artifact("images")).unwrap().count(), 1);
}

// =============================================================================
// Id stripping and reference rebinding
// =============================================================================

#[test]
fn test_references_stored_by_name() {
    let fixture = TestFixture::new();
    let server = source_server();
    fixture.backup(
        &server,
        &[EntityKind::UserGroups, EntityKind::Scripts, EntityKind::Users],
    );

    let groups = fixture.read_json("user_groups.json");
    assert_eq!(
        groups,
        json!([{"name": "Admins", "rights": [{"permission": "3", "id": "Linux servers"}]}])
    );

    let scripts = fixture.read_json("global_scripts.json");
    assert_eq!(scripts[0]["usrgrpid"], "Admins");
    assert_eq!(scripts[0]["groupid"], "0");
    assert!(scripts[0].get("scriptid").is_none());

    let users = fixture.read_json("users.json");
    assert_eq!(users[0]["username"], "anna");
    assert_eq!(users[1]["username"], "jdoe");
    assert_eq!(users[1]["roleid"], "Admin role");
    assert_eq!(users[1]["usrgrps"], json!([{"name": "Admins"}]));
    assert_eq!(
        users[1]["user_medias"],
        json!([{"mediatypeid": "Email", "sendto": ["jdoe@example.com"]}])
    );
    assert!(users[1].get("medias").is_none());
    assert!(users[1].get("userid").is_none());
}

#[test]
fn test_host_groups_are_names() {
    let fixture = TestFixture::new();
    fixture.backup(&source_server(), &[EntityKind::HostGroups]);

    assert_eq!(fixture.read("host_groups.json"), r#"["Linux servers","Network","Empty"]"#);
}

#[test]
fn test_documents_are_normalized() {
    let fixture = TestFixture::new();
    let server = source_server();
    let report = fixture.backup(&server, &[EntityKind::Hosts, EntityKind::Maps]);

    let hosts = exported(&report, EntityKind::Hosts);
    assert_eq!(
        hosts.groups,
        vec![("Linux servers".to_string(), 1), ("Network".to_string(), 1)]
    );

    let maps = fixture.read_json("maps.json");
    assert_eq!(maps["zabbix_export"]["maps"][0]["links"][0]["linktriggers"], json!([]));
    assert!(maps["zabbix_export"].get("date").is_none());
}

// =============================================================================
// Idempotence
// =============================================================================

#[test]
fn test_reexport_is_byte_identical() {
    let fixture = TestFixture::new();
    let server = source_server();
    let kinds = Selection::all();

    fixture.backup(&server, kinds.kinds());
    let first: Vec<(String, String)> = [
        "global_macros.json",
        "host_groups.json",
        "templates.json",
        "maps.json",
        "global_scripts.json",
        "user_groups.json",
        "media_types.json",
        "users.json",
        "hosts/linux-servers.json",
    ]
    .iter()
    .map(|f| (f.to_string(), fixture.read(f)))
    .collect();

    let report = fixture.backup(&server, kinds.kinds());
    for (file, content) in first {
        assert_eq!(fixture.read(&file), content, "{file} changed");
    }

    let images = exported(&report, EntityKind::Images).images.unwrap();
    assert_eq!((images.added, images.updated, images.unchanged), (0, 0, 1));
    assert_eq!(images.total_files, 1);
}

// =============================================================================
// Content-addressed images
// =============================================================================

#[test]
fn test_changed_image_replaces_old_file() {
    let fixture = TestFixture::new();
    let server = source_server();
    fixture.backup(&server, &[EntityKind::Images]);
    let before: Vec<_> = std::fs::read_dir(fixture.artifact("images"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();

    let image = server.find("image", "Cloud (64)").unwrap();
    server.modify(
        "image",
        image["imageid"].as_str().unwrap(),
        json!({"image": "R0lGODlhAQABAAAAACw="}),
    );
    let report = fixture.backup(&server, &[EntityKind::Images]);

    let counts = exported(&report, EntityKind::Images).images.unwrap();
    assert_eq!((counts.added, counts.updated, counts.total_files), (0, 1, 1));

    let after: Vec<_> = std::fs::read_dir(fixture.artifact("images"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(after.len(), 1);
    assert_ne!(before, after);
    let name = after[0].to_string_lossy().to_string();
    assert!(name.starts_with("cloud-64_md5"), "{name}");
}

#[test]
fn test_images_sharing_a_slug_keep_their_files() {
    let fixture = TestFixture::new();
    let server = source_server();
    server.insert("image", json!({"name": "Cloud 64", "imagetype": "1", "image": "BBBB"}));
    fixture.backup(&server, &[EntityKind::Images]);

    let image = server.find("image", "Cloud (64)").unwrap();
    server.modify(
        "image",
        image["imageid"].as_str().unwrap(),
        json!({"image": "R0lGODlhAQABAAAAACw="}),
    );
    let report = fixture.backup(&server, &[EntityKind::Images]);

    let counts = exported(&report, EntityKind::Images).images.unwrap();
    assert_eq!(
        (counts.added, counts.updated, counts.unchanged, counts.total_files),
        (0, 1, 1, 2)
    );
    assert_eq!(exported(&report, EntityKind::Images).files.len(), 1);
}

#[test]
fn test_new_image_is_added() {
    let fixture = TestFixture::new();
    let server = source_server();
    fixture.backup(&server, &[EntityKind::Images]);

    server.insert("image", json!({"name": "Router", "imagetype": "1", "image": "AAAA"}));
    let report = fixture.backup(&server, &[EntityKind::Images]);

    let counts = exported(&report, EntityKind::Images).images.unwrap();
    assert_eq!((counts.added, counts.unchanged, counts.total_files), (1, 1, 2));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_dangling_reference_reported_and_kind_continues() {
    let fixture = TestFixture::new();
    let server = source_server();
    server.insert(
        "usergroup",
        json!({"name": "Ghosts", "rights": [{"permission": "2", "id": "9999"}]}),
    );

    let report = fixture.backup(&server, &[EntityKind::UserGroups]);
    let summary = exported(&report, EntityKind::UserGroups);
    assert_eq!(summary.exported, 1);
    assert_eq!(summary.failures[0].label, "Ghosts");

    let groups = fixture.read_json("user_groups.json");
    assert_eq!(groups.as_array().unwrap().len(), 1);
}

#[test]
fn test_transport_failure_fails_only_that_kind() {
    let fixture = TestFixture::new();
    let server = source_server();
    server.inject_failure("template.get", 0, InjectedFailure::Transport("connection reset".into()));

    let report = fixture.backup(
        &server,
        &[EntityKind::HostGroups, EntityKind::Templates, EntityKind::Maps],
    );

    assert!(matches!(report.kinds[1].outcome, KindOutcome::Failed(ref e) if e.is_transport()));
    assert!(report.kinds[0].is_clean());
    assert!(report.kinds[2].is_clean());
    assert!(fixture.artifact("maps.json").is_file());
    assert!(!fixture.artifact("templates.json").exists());
}
