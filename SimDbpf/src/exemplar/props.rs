//! Exemplar property keys and exemplar type codes

pub const EXEMPLAR_TYPE: u32 = 0x00000010;
pub const EXEMPLAR_NAME: u32 = 0x00000020;
pub const BUILDINGPROP_FAMILY: u32 = 0x27812870;
pub const BUILDING_FOUNDATION: u32 = 0x88FCD877;
pub const USER_VISIBLE_NAME_KEY: u32 = 0x8A416A99;
pub const ITEM_ICON: u32 = 0x8A2602B8;
pub const QUERY_EXEMPLAR_GUID: u32 = 0x2A499F85;
pub const SFX_QUERY_SOUND: u32 = 0xAA83558F;
pub const SFX_DEFAULT_PLOP_SOUND: u32 = 0xAA1DD3A1;
pub const SFX_AMBIENCE_GOOD_SOUND: u32 = 0xCA3ED0DB;
pub const SFX_ACTIVATE_SOUND: u32 = 0xEA5F5B44;

/// First lot object property. Further lot objects follow at consecutive ids.
pub const LOT_CONFIG_OBJECT: u32 = 0x88EDC900;

/// Resource key type properties that reference models by TGI.
pub const RESOURCE_KEY_TYPES: [u32; 11] = [
    0x27812820, // RKT0
    0x27812821, // RKT1
    0x27812822, // RKT2
    0x27812823, // RKT3
    0x27812824, // RKT4
    0x27812825, // RKT5
    0x27812921, // RKT1 (night)
    0x27812922,
    0x27812923,
    0x27812924,
    0x27812925,
];

/// Group shared by every lot configuration exemplar.
pub const LOT_CONFIGURATIONS_GROUP: u32 = 0xA8FBD372;

/// Values of the `ExemplarType` property.
pub mod exemplar_type {
    pub const BUILDINGS: u32 = 0x02;
    pub const LOT_CONFIGURATIONS: u32 = 0x10;
    pub const PROP: u32 = 0x1E;
}

/// Display name of an `ExemplarType` value.
#[must_use]
pub fn exemplar_type_label(value: u32) -> &'static str {
    match value {
        0x00 => "Other",
        0x01 => "Tuning",
        0x02 => "Buildings",
        0x03 => "RCI",
        0x04 => "Developer",
        0x05 => "Simulator",
        0x06 => "Road",
        0x07 => "Bridge",
        0x08 => "MiscNetwork",
        0x09 => "NetworkIntersection",
        0x0A => "Rail",
        0x0B => "Highway",
        0x0C => "PowerLine",
        0x0D => "Terrain",
        0x0E => "Ordinances",
        0x0F => "Flora",
        0x10 => "LotConfigurations",
        0x11 => "Foundations",
        0x12 => "Advice",
        0x13 => "Lighting",
        0x14 => "Cursor",
        0x15 => "LotRetainingWalls",
        0x16 => "Vehicles",
        0x17 => "Pedestrians",
        0x18 => "Aircraft",
        0x19 => "Watercraft",
        0x1E => "Prop",
        0x1F => "Construction",
        0x20 => "Automata Tuning",
        0x21 => "Type 21",
        0x22 => "Disaster",
        0x23 => "Data view",
        0x24 => "Crime",
        0x25 => "Audio",
        0x26 => "My Sim Template",
        0x27 => "TerrainBrush",
        0x28 => "Misc Catalog",
        _ => "Unknown",
    }
}
