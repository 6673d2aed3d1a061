// Read-access presets for data directories and their wire form.
use serde::{Deserialize, Serialize};

pub const PUBLIC_PERMISSIONS: &str = "user://*";
pub const MY_ALGOS_PERMISSIONS: &str = "algo://.my/*";

/// Who may read a data directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReadAcl {
    /// Only the owner's own calls.
    Private,
    /// Any caller on the platform.
    Public,
    /// Any of the owner's algorithms, whoever invokes them.
    MyAlgorithms,
}

impl ReadAcl {
    pub fn to_wire(self) -> Vec<String> {
        match self {
            ReadAcl::Private => Vec::new(),
            ReadAcl::Public => vec![PUBLIC_PERMISSIONS.to_string()],
            ReadAcl::MyAlgorithms => vec![MY_ALGOS_PERMISSIONS.to_string()],
        }
    }

    /// `None` for an absent list or an unrecognized first entry. Entries past the
    /// first are not inspected.
    pub fn from_wire(entries: Option<&[String]>) -> Option<Self> {
        let entries = entries?;
        match entries.first().map(String::as_str) {
            None => Some(ReadAcl::Private),
            Some(PUBLIC_PERMISSIONS) => Some(ReadAcl::Public),
            Some(MY_ALGOS_PERMISSIONS) => Some(ReadAcl::MyAlgorithms),
            Some(_) => None,
        }
    }
}

/// `{"read": [...]}` as sent and received by the data API.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AclWire {
    #[serde(default)]
    pub read: Option<Vec<String>>,
}

impl AclWire {
    pub fn decode(&self) -> Option<ReadAcl> {
        ReadAcl::from_wire(self.read.as_deref())
    }
}

impl From<ReadAcl> for AclWire {
    fn from(acl: ReadAcl) -> Self {
        Self {
            read: Some(acl.to_wire()),
        }
    }
}
