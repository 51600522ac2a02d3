//! Common test utilities for zbx-migrate integration tests
//!
//! Provides a scratch artifact directory, two in-memory servers that number
//! their objects differently, and a populated source configuration.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zbx_migrate::{
    Action, ArtifactStore, EntityKind, MemoryServer, MigrationConfig, RestoreOptions, RunReport,
    Runner, Selection, ServerVersion,
};

// =============================================================================
// Test Fixture
// =============================================================================

/// Artifact directory plus configuration pointing at it
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub config: MigrationConfig,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = MigrationConfig::builder()
            .backup_dir(temp_dir.path().join("backup"))
            .build();
        Self { temp_dir, config }
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.config.backup_dir.clone()
    }

    pub fn store(&self) -> ArtifactStore {
        self.config.store()
    }

    pub fn artifact(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.backup_dir().join(relative)
    }

    pub fn read(&self, relative: impl AsRef<Path>) -> String {
        std::fs::read_to_string(self.artifact(relative)).expect("Failed to read artifact")
    }

    pub fn read_json(&self, relative: impl AsRef<Path>) -> Value {
        serde_json::from_str(&self.read(relative)).expect("Artifact is not JSON")
    }

    pub fn write(&self, relative: impl AsRef<Path>, content: &str) {
        let path = self.artifact(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn backup(&self, server: &MemoryServer, kinds: &[EntityKind]) -> RunReport {
        Runner::new(server, &self.config).run(Action::Backup, &Selection::of(kinds))
    }

    pub fn restore(&self, server: &MemoryServer, kinds: &[EntityKind]) -> RunReport {
        self.restore_with(server, kinds, RestoreOptions::default())
    }

    pub fn restore_with(
        &self,
        server: &MemoryServer,
        kinds: &[EntityKind],
        options: RestoreOptions,
    ) -> RunReport {
        Runner::new(server, &self.config)
            .options(options)
            .run(Action::Restore, &Selection::of(kinds))
    }
}

// =============================================================================
// Servers
// =============================================================================

/// Empty target server whose ids never collide with the source's
pub fn target_server() -> MemoryServer {
    MemoryServer::new().starting_at(5000)
}

/// Source server with one object of (almost) every kind and real cross-references
pub fn source_server() -> MemoryServer {
    populate(MemoryServer::new().starting_at(10))
}

/// Like [`source_server`] but reporting an older API
pub fn source_server_with_version(version: ServerVersion) -> MemoryServer {
    populate(MemoryServer::with_version(version).starting_at(10))
}

fn populate(server: MemoryServer) -> MemoryServer {
    let login_field = if server_version(&server).at_least(5, 4) {
        "username"
    } else {
        "alias"
    };

    server.insert(
        "image",
        json!({"name": "Cloud (64)", "imagetype": "1", "image": "iVBORw0KGgo="}),
    );
    server.insert("usermacro", json!({"macro": "{$SNMP_COMMUNITY}", "value": "public"}));

    let linux = server.insert("hostgroup", json!({"name": "Linux servers"}));
    let network = server.insert("hostgroup", json!({"name": "Network"}));
    server.insert("hostgroup", json!({"name": "Empty"}));

    server.insert("template", json!({"host": "Template OS Linux", "name": "Linux by agent"}));
    server.insert(
        "host",
        json!({"host": "web01", "groups": [{"groupid": linux}]}),
    );
    server.insert(
        "host",
        json!({"host": "core-sw", "groups": [{"groupid": network}]}),
    );
    server.insert(
        "map",
        json!({"name": "Datacenter", "links": [{"selementid1": "1", "selementid2": "2", "linktriggers": [{"triggerid": "13491"}]}]}),
    );

    let admins = server.insert(
        "usergroup",
        json!({"name": "Admins", "rights": [{"permission": "3", "id": linux}]}),
    );
    server.insert(
        "script",
        json!({"name": "Ping", "command": "ping -c 3 {HOST.CONN}", "usrgrpid": admins, "groupid": "0"}),
    );
    let email = server.insert("mediatype", json!({"name": "Email", "type": "0"}));
    let role = server.insert("role", json!({"name": "Admin role", "type": "2"}));

    server.insert(
        "user",
        json!({
            login_field: "jdoe",
            "roleid": role,
            "usrgrps": [{"usrgrpid": admins}],
            "medias": [{"mediaid": "900", "userid": "0", "mediatypeid": email, "sendto": ["jdoe@example.com"]}],
        }),
    );
    server.insert(
        "user",
        json!({login_field: "anna", "roleid": role, "usrgrps": [{"usrgrpid": admins}], "medias": []}),
    );
    server
}

fn server_version(server: &MemoryServer) -> ServerVersion {
    zbx_migrate::ApiClient::api_version(server)
}

/// Roles are built in on real servers, so targets start with the same ones
pub fn with_roles(server: MemoryServer) -> MemoryServer {
    server.insert("role", json!({"name": "Admin role", "type": "2"}));
    server
}
