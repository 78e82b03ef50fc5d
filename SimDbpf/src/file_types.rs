//! Well-known DBPF record type ids

/// Exemplar property bag.
pub const EXEMPLAR: u32 = 0x6534284A;
/// Cohort: parent-only exemplar used for inheritance.
pub const COHORT: u32 = 0x05342861;
/// Directory of compressed records.
pub const DIR: u32 = 0xE86B1EEF;
/// Group and instance of the directory record.
pub const DIR_GROUP: u32 = 0xE86B1EEF;
pub const DIR_INSTANCE: u32 = 0x286B1F03;
/// PNG image.
pub const PNG: u32 = 0x856DDBAC;
/// Localized text.
pub const LTEXT: u32 = 0x2026960B;
/// FSH texture.
pub const FSH: u32 = 0x7AB50E44;
/// S3D model.
pub const S3D: u32 = 0x5AD0E817;
/// ATC/sound effect.
pub const SOUND: u32 = 0x0B8D821A;
/// Sound played when a building is activated.
pub const ACTIVATE_SOUND: u32 = 0x4A4C132E;
/// Lua script.
pub const LUA: u32 = 0xCA63E2A3;

/// Human readable label for a type id.
#[must_use]
pub fn label(kind: u32) -> Option<&'static str> {
    Some(match kind {
        EXEMPLAR => "Exemplar",
        COHORT => "Cohort",
        DIR => "DIR",
        PNG => "PNG",
        LTEXT => "LTEXT",
        FSH => "FSH",
        S3D => "S3D",
        SOUND => "Sound",
        ACTIVATE_SOUND => "Activate sound",
        LUA => "Lua",
        _ => return None,
    })
}

/// Exemplar and cohort records decode to property bags.
#[must_use]
pub const fn is_exemplar_like(kind: u32) -> bool {
    matches!(kind, EXEMPLAR | COHORT)
}
