//! Lot objects declared by lot configuration exemplars

/// What a lot object places on the lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LotObjectKind {
    Building,
    Prop,
    Texture,
    Fence,
    Flora,
    Water,
    Land,
    Network,
    Other(u32),
}

impl LotObjectKind {
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            0x00 => Self::Building,
            0x01 => Self::Prop,
            0x02 => Self::Texture,
            0x03 => Self::Fence,
            0x04 => Self::Flora,
            0x05 => Self::Water,
            0x06 => Self::Land,
            0x07 => Self::Network,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Building => "Building",
            Self::Prop => "Prop",
            Self::Texture => "Texture",
            Self::Fence => "Fence",
            Self::Flora => "Flora",
            Self::Water => "Water",
            Self::Land => "Land",
            Self::Network => "Network",
            Self::Other(_) => "Other",
        }
    }
}

/// One `LotConfigPropertyLotObject` value.
///
/// The raw layout is `[type, lod, orientation, x, y, z, minX, minZ, maxX,
/// maxZ, usage, OID, IID, ...]`. Only the fields used for dependency
/// resolution are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotObject {
    pub kind: LotObjectKind,
    pub object_id: u32,
    /// Instance ids. Props can list several to pick from at random.
    pub iids: Vec<u32>,
}

impl LotObject {
    /// Parse from the raw property values. Returns `None` for values shorter
    /// than the fixed 12 field prefix.
    #[must_use]
    pub fn from_values(values: &[u32]) -> Option<Self> {
        if values.len() < 12 {
            return None;
        }
        Some(Self {
            kind: LotObjectKind::from_code(values[0]),
            object_id: values[11],
            iids: values[12..].to_vec(),
        })
    }

    /// The first instance id. This is the only one networks use.
    #[must_use]
    pub fn iid(&self) -> Option<u32> {
        self.iids.first().copied()
    }
}
