//! Type/group/instance keys and partial queries over them

use std::fmt;

use serde::{Deserialize, Serialize};

/// The (type, group, instance) triple that identifies every DBPF record.
///
/// The type id is stored as `kind` because `type` is a keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tgi {
    #[serde(rename = "type")]
    pub kind: u32,
    pub group: u32,
    pub instance: u32,
}

impl Tgi {
    #[must_use]
    pub const fn new(kind: u32, group: u32, instance: u32) -> Self {
        Self {
            kind,
            group,
            instance,
        }
    }

    /// Builds a TGI from the first three values of a slice.
    #[must_use]
    pub fn from_slice(values: &[u32]) -> Option<Self> {
        match values {
            [kind, group, instance, ..] => Some(Self::new(*kind, *group, *instance)),
            _ => None,
        }
    }

    /// All three fields are zero. Used as "no parent" in exemplars.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.kind == 0 && self.group == 0 && self.instance == 0
    }
}

impl fmt::Display for Tgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X}-0x{:08X}-0x{:08X}",
            self.kind, self.group, self.instance
        )
    }
}

impl From<[u32; 3]> for Tgi {
    fn from([kind, group, instance]: [u32; 3]) -> Self {
        Self::new(kind, group, instance)
    }
}

/// A TGI filter where omitted fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TgiQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<u32>,
}

impl TgiQuery {
    /// Query that matches every record.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            kind: None,
            group: None,
            instance: None,
        }
    }

    #[must_use]
    pub const fn exact(tgi: Tgi) -> Self {
        Self {
            kind: Some(tgi.kind),
            group: Some(tgi.group),
            instance: Some(tgi.instance),
        }
    }

    #[must_use]
    pub const fn by_instance(instance: u32) -> Self {
        Self {
            kind: None,
            group: None,
            instance: Some(instance),
        }
    }

    #[must_use]
    pub const fn by_kind(kind: u32) -> Self {
        Self {
            kind: Some(kind),
            group: None,
            instance: None,
        }
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: u32) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub const fn with_group(mut self, group: u32) -> Self {
        self.group = Some(group);
        self
    }

    #[must_use]
    pub const fn with_instance(mut self, instance: u32) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Whether `tgi` satisfies every field that is set.
    #[must_use]
    pub fn matches(&self, tgi: &Tgi) -> bool {
        self.kind.is_none_or(|k| k == tgi.kind)
            && self.group.is_none_or(|g| g == tgi.group)
            && self.instance.is_none_or(|i| i == tgi.instance)
    }

    /// The full TGI when all three fields are set.
    #[must_use]
    pub fn as_tgi(&self) -> Option<Tgi> {
        Some(Tgi::new(self.kind?, self.group?, self.instance?))
    }
}

impl From<Tgi> for TgiQuery {
    fn from(tgi: Tgi) -> Self {
        Self::exact(tgi)
    }
}

impl fmt::Display for TgiQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |value: Option<u32>| match value {
            Some(v) => format!("0x{v:08X}"),
            None => "*".to_string(),
        };
        write!(
            f,
            "{}-{}-{}",
            part(self.kind),
            part(self.group),
            part(self.instance)
        )
    }
}
