//! Entity kinds and their static descriptors

use crate::backup::{self, ExportFn, ImportFn};
use crate::error::{Error, Result};
use crate::reference::{
    ReferenceField, HOST_GROUPS, MEDIA_TYPES, ROLES, TEMPLATE_GROUPS, USER_GROUPS,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration object kinds that can be backed up and restored
///
/// Declaration order is the menu order, which is also a valid restore
/// order: host groups come before user groups, user groups and media types
/// come before users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Images,
    GlobalMacros,
    HostGroups,
    Templates,
    Hosts,
    Maps,
    UserGroups,
    Scripts,
    MediaTypes,
    Users,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Images,
        EntityKind::GlobalMacros,
        EntityKind::HostGroups,
        EntityKind::Templates,
        EntityKind::Hosts,
        EntityKind::Maps,
        EntityKind::UserGroups,
        EntityKind::Scripts,
        EntityKind::MediaTypes,
        EntityKind::Users,
    ];

    /// Menu number (1-based)
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            EntityKind::Images => 1,
            EntityKind::GlobalMacros => 2,
            EntityKind::HostGroups => 3,
            EntityKind::Templates => 4,
            EntityKind::Hosts => 5,
            EntityKind::Maps => 6,
            EntityKind::UserGroups => 7,
            EntityKind::Scripts => 8,
            EntityKind::MediaTypes => 9,
            EntityKind::Users => 10,
        }
    }

    #[must_use]
    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.number() == number)
    }

    /// Human-readable name
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Images => "Images",
            EntityKind::GlobalMacros => "Global macros",
            EntityKind::HostGroups => "Host groups",
            EntityKind::Templates => "Templates",
            EntityKind::Hosts => "Hosts",
            EntityKind::Maps => "Maps",
            EntityKind::UserGroups => "User groups",
            EntityKind::Scripts => "Global scripts",
            EntityKind::MediaTypes => "Media types",
            EntityKind::Users => "Users",
        }
    }

    /// Kinds whose restore must have run before this one
    #[must_use]
    pub fn depends_on(self) -> &'static [EntityKind] {
        match self {
            EntityKind::UserGroups => &[EntityKind::HostGroups],
            EntityKind::Scripts => &[EntityKind::HostGroups, EntityKind::UserGroups],
            EntityKind::Users => &[EntityKind::UserGroups, EntityKind::MediaTypes],
            EntityKind::Hosts => &[EntityKind::HostGroups, EntityKind::Templates],
            _ => &[],
        }
    }

    /// Static description of how records of this kind are stored
    #[must_use]
    pub fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            EntityKind::Images => &IMAGES,
            EntityKind::GlobalMacros => &GLOBAL_MACROS,
            EntityKind::HostGroups => &HOST_GROUP_NAMES,
            EntityKind::Templates => &TEMPLATES,
            EntityKind::Hosts => &HOSTS,
            EntityKind::Maps => &MAPS,
            EntityKind::UserGroups => &USER_GROUP_RECORDS,
            EntityKind::Scripts => &SCRIPTS,
            EntityKind::MediaTypes => &MEDIA_TYPE_RECORDS,
            EntityKind::Users => &USERS,
        }
    }

    /// Export operation bound to this kind
    #[must_use]
    pub fn exporter(self) -> ExportFn {
        match self {
            EntityKind::Images => backup::images::export_images,
            EntityKind::HostGroups => backup::operations::export_host_groups,
            EntityKind::Templates => backup::documents::export_templates,
            EntityKind::Hosts => backup::documents::export_hosts,
            EntityKind::Maps => backup::documents::export_maps,
            EntityKind::GlobalMacros
            | EntityKind::UserGroups
            | EntityKind::Scripts
            | EntityKind::MediaTypes
            | EntityKind::Users => backup::operations::export_records,
        }
    }

    /// Import operation bound to this kind
    #[must_use]
    pub fn importer(self) -> ImportFn {
        match self {
            EntityKind::Images => backup::images::restore_images,
            EntityKind::HostGroups => backup::restore::restore_host_groups,
            EntityKind::Templates | EntityKind::Maps => backup::documents::restore_document,
            EntityKind::Hosts => backup::documents::restore_hosts,
            EntityKind::Users => backup::restore::restore_users,
            EntityKind::GlobalMacros
            | EntityKind::UserGroups
            | EntityKind::Scripts
            | EntityKind::MediaTypes => backup::restore::restore_records,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where and how a kind's artifact lives under the backup root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactLayout {
    /// One JSON list of records
    RecordList(&'static str),
    /// One JSON list of names
    NameList(&'static str),
    /// One configuration document as produced by `configuration.export`
    Document(&'static str),
    /// A directory with one configuration document per host group
    PerGroup(&'static str),
    /// A directory with one content-addressed file per record
    ContentAddressed(&'static str),
}

impl ArtifactLayout {
    /// File or directory name relative to the backup root
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            ArtifactLayout::RecordList(p)
            | ArtifactLayout::NameList(p)
            | ArtifactLayout::Document(p)
            | ArtifactLayout::PerGroup(p)
            | ArtifactLayout::ContentAddressed(p) => p,
        }
    }
}

/// Static, declarative description of one kind
#[derive(Debug)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    /// API collection name
    pub collection: &'static str,
    /// Server-assigned id field, never persisted
    pub id_field: &'static str,
    /// Field that names a record in reports
    pub name_field: &'static str,
    /// Method used to create one record
    pub create_method: &'static str,
    /// Top-level fields removed before persisting
    pub strip: &'static [&'static str],
    /// Top-level fields renamed before persisting (`from`, `to`)
    pub renames: &'static [(&'static str, &'static str)],
    /// Fields removed from every object in a nested list (`list`, fields)
    pub nested_strip: &'static [(&'static str, &'static [&'static str])],
    /// Cross-references rewritten id -> name on export and back on import
    pub references: &'static [ReferenceField],
    pub layout: ArtifactLayout,
}

static IMAGES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Images,
    collection: "image",
    id_field: "imageid",
    name_field: "name",
    create_method: "image.create",
    strip: &["imageid"],
    renames: &[],
    nested_strip: &[],
    references: &[],
    layout: ArtifactLayout::ContentAddressed("images"),
};

static GLOBAL_MACROS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::GlobalMacros,
    collection: "usermacro",
    id_field: "globalmacroid",
    name_field: "macro",
    create_method: "usermacro.createglobal",
    strip: &["globalmacroid"],
    renames: &[],
    nested_strip: &[],
    references: &[],
    layout: ArtifactLayout::RecordList("global_macros.json"),
};

static HOST_GROUP_NAMES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::HostGroups,
    collection: "hostgroup",
    id_field: "groupid",
    name_field: "name",
    create_method: "hostgroup.create",
    strip: &["groupid"],
    renames: &[],
    nested_strip: &[],
    references: &[],
    layout: ArtifactLayout::NameList("host_groups.json"),
};

static TEMPLATES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Templates,
    collection: "template",
    id_field: "templateid",
    name_field: "host",
    create_method: "configuration.import",
    strip: &[],
    renames: &[],
    nested_strip: &[],
    references: &[],
    layout: ArtifactLayout::Document("templates.json"),
};

static HOSTS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Hosts,
    collection: "host",
    id_field: "hostid",
    name_field: "host",
    create_method: "configuration.import",
    strip: &[],
    renames: &[],
    nested_strip: &[],
    references: &[],
    layout: ArtifactLayout::PerGroup("hosts"),
};

static MAPS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Maps,
    collection: "map",
    id_field: "sysmapid",
    name_field: "name",
    create_method: "configuration.import",
    strip: &[],
    renames: &[],
    nested_strip: &[],
    references: &[],
    layout: ArtifactLayout::Document("maps.json"),
};

static USER_GROUP_RECORDS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::UserGroups,
    collection: "usergroup",
    id_field: "usrgrpid",
    name_field: "name",
    create_method: "usergroup.create",
    strip: &["usrgrpid"],
    renames: &[],
    nested_strip: &[],
    references: &[
        // "rights" until 6.0, split per group type from 6.2
        ReferenceField::inline(Some("rights"), "id", HOST_GROUPS),
        ReferenceField::inline(Some("hostgroup_rights"), "id", HOST_GROUPS),
        ReferenceField::inline(Some("templategroup_rights"), "id", TEMPLATE_GROUPS),
    ],
    layout: ArtifactLayout::RecordList("user_groups.json"),
};

static SCRIPTS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Scripts,
    collection: "script",
    id_field: "scriptid",
    name_field: "name",
    create_method: "script.create",
    strip: &["scriptid"],
    renames: &[],
    nested_strip: &[],
    references: &[
        ReferenceField::inline(None, "usrgrpid", USER_GROUPS).with_sentinel("0"),
        ReferenceField::inline(None, "groupid", HOST_GROUPS).with_sentinel("0"),
    ],
    layout: ArtifactLayout::RecordList("global_scripts.json"),
};

static MEDIA_TYPE_RECORDS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::MediaTypes,
    collection: "mediatype",
    id_field: "mediatypeid",
    name_field: "name",
    create_method: "mediatype.create",
    strip: &["mediatypeid"],
    renames: &[],
    nested_strip: &[],
    references: &[],
    layout: ArtifactLayout::RecordList("media_types.json"),
};

static USERS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Users,
    collection: "user",
    id_field: "userid",
    name_field: "username",
    create_method: "user.create",
    strip: &[
        "userid",
        "attempt_clock",
        "attempt_failed",
        "attempt_ip",
        "ts_provisioned",
        "provisioned",
        "userdirectoryid",
    ],
    renames: &[("medias", "user_medias")],
    nested_strip: &[("user_medias", &["mediaid", "userid"])],
    references: &[
        ReferenceField::inline(Some("user_medias"), "mediatypeid", MEDIA_TYPES),
        ReferenceField::named("usrgrps", "usrgrpid", "name", USER_GROUPS),
        ReferenceField::inline(None, "roleid", ROLES),
    ],
    layout: ArtifactLayout::RecordList("users.json"),
};

/// A set of kinds picked by the operator, kept in menu order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(Vec<EntityKind>);

impl Selection {
    /// Every kind
    #[must_use]
    pub fn all() -> Self {
        Self(EntityKind::ALL.to_vec())
    }

    /// Exactly these kinds
    #[must_use]
    pub fn of(kinds: &[EntityKind]) -> Self {
        let mut kinds = kinds.to_vec();
        kinds.sort();
        kinds.dedup();
        Self(kinds)
    }

    /// Parse menu input such as `"1 2 5"`; `0` means every kind
    ///
    /// Tokens that are not menu numbers are ignored, as long as at least one
    /// is valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] if nothing valid was entered.
    pub fn parse(input: &str) -> Result<Self> {
        let numbers: Vec<u8> = input
            .split_whitespace()
            .filter_map(|token| token.parse::<u8>().ok())
            .filter(|&n| n <= 10)
            .collect();

        if numbers.is_empty() {
            return Err(Error::InvalidSelection(format!(
                "'{}': expected numbers between 0 and 10",
                input.trim()
            )));
        }
        if numbers.contains(&0) {
            return Ok(Self::all());
        }

        let kinds: Vec<EntityKind> = numbers.into_iter().filter_map(EntityKind::from_number).collect();
        Ok(Self::of(&kinds))
    }

    pub fn kinds(&self) -> &[EntityKind] {
        &self.0
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.0.contains(&kind)
    }

    /// Dependencies of selected kinds that are not selected themselves
    #[must_use]
    pub fn unmet_dependencies(&self) -> Vec<(EntityKind, EntityKind)> {
        self.0
            .iter()
            .flat_map(|&kind| kind.depends_on().iter().map(move |&dep| (kind, dep)))
            .filter(|(_, dep)| !self.contains(*dep))
            .collect()
    }
}
