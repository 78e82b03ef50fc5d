//! Persisted plugin index
//!
//! Little-endian layout:
//!
//! ```text
//! "PTIX" u32:version
//! u32:archives  { path bytes, NUL }
//! u32:entries   { type, group, instance, offset, size, archive }
//! u32:length    { tgi map, ti map, t map, i map }
//! u32:families  { id, u32:members { type, group, instance } }
//! ```
//!
//! Each map is a key count followed by `key words, u32:count, positions`
//! per key. Keys are written sorted so equal indexes give equal files.

use std::collections::HashMap;
use std::hash::Hash;
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use simdbpf::{ArchiveFile, Entry, Tgi};

use crate::error::{Error, Result};
use crate::families::FamilyTable;

use super::tgi_index::{IndexMaps, TgiIndex};

pub const MAGIC: &[u8; 4] = b"PTIX";
pub const VERSION: u32 = 1;

/// Parts of a plugin index that survive a save/load cycle.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub archives: Vec<Arc<ArchiveFile>>,
    pub index: TgiIndex,
    pub families: FamilyTable,
}

/// Write an index.
///
/// # Errors
/// Returns an error if writing fails or an entry belongs to an archive that
/// is not listed.
pub fn write<W: Write>(
    out: &mut W,
    archives: &[Arc<ArchiveFile>],
    index: &TgiIndex,
    families: &FamilyTable,
) -> Result<()> {
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(VERSION)?;

    let mut positions: HashMap<usize, u32> = HashMap::with_capacity(archives.len());
    out.write_u32::<LittleEndian>(archives.len() as u32)?;
    for (i, archive) in archives.iter().enumerate() {
        positions.insert(Arc::as_ptr(archive) as usize, i as u32);
        out.write_all(archive.path().to_string_lossy().as_bytes())?;
        out.write_u8(0)?;
    }

    out.write_u32::<LittleEndian>(index.len() as u32)?;
    for entry in index.entries() {
        let archive = positions
            .get(&(Arc::as_ptr(entry.archive()) as usize))
            .copied()
            .ok_or_else(|| {
                Error::CorruptCache(format!(
                    "entry {} belongs to unlisted archive {}",
                    entry.tgi(),
                    entry.path().display()
                ))
            })?;
        let tgi = entry.tgi();
        for word in [tgi.kind, tgi.group, tgi.instance, entry.offset(), entry.size(), archive] {
            out.write_u32::<LittleEndian>(word)?;
        }
    }

    let raw = write_maps(index.maps())?;
    out.write_u32::<LittleEndian>(raw.len() as u32)?;
    out.write_all(&raw)?;

    let mut ids: Vec<u32> = families.ids().collect();
    ids.sort_unstable();
    out.write_u32::<LittleEndian>(ids.len() as u32)?;
    for id in ids {
        let members = families.get(id);
        out.write_u32::<LittleEndian>(id)?;
        out.write_u32::<LittleEndian>(members.len() as u32)?;
        for tgi in members {
            write_tgi(out, *tgi)?;
        }
    }
    Ok(())
}

fn write_tgi<W: Write>(out: &mut W, tgi: Tgi) -> Result<()> {
    out.write_u32::<LittleEndian>(tgi.kind)?;
    out.write_u32::<LittleEndian>(tgi.group)?;
    out.write_u32::<LittleEndian>(tgi.instance)?;
    Ok(())
}

fn write_maps(maps: &IndexMaps) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_map(&mut out, &maps.tgi, |k| vec![k.0, k.1, k.2])?;
    write_map(&mut out, &maps.ti, |k| vec![k.0, k.1])?;
    write_map(&mut out, &maps.t, |k| vec![*k])?;
    write_map(&mut out, &maps.i, |k| vec![*k])?;
    Ok(out)
}

fn write_map<K: Ord + Hash + Eq>(
    out: &mut Vec<u8>,
    map: &HashMap<K, Vec<u32>>,
    words: impl Fn(&K) -> Vec<u32>,
) -> Result<()> {
    let mut keys: Vec<&K> = map.keys().collect();
    keys.sort_unstable();
    out.write_u32::<LittleEndian>(keys.len() as u32)?;
    for key in keys {
        for word in words(key) {
            out.write_u32::<LittleEndian>(word)?;
        }
        let positions = &map[key];
        out.write_u32::<LittleEndian>(positions.len() as u32)?;
        for pos in positions {
            out.write_u32::<LittleEndian>(*pos)?;
        }
    }
    Ok(())
}

/// Read an index written by [`write`].
///
/// # Errors
/// Returns an error if the data is truncated, has the wrong magic or
/// version, or refers to archives or entries it does not contain.
pub fn read<R: Read>(input: R) -> Result<Snapshot> {
    let mut input = BufReader::new(input);

    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::InvalidCacheMagic(magic));
    }
    let version = input.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::UnsupportedCacheVersion(version));
    }

    let archive_count = input.read_u32::<LittleEndian>()?;
    let mut archives = Vec::with_capacity(archive_count.min(1 << 16) as usize);
    for _ in 0..archive_count {
        let mut bytes = Vec::new();
        input.read_until(0, &mut bytes)?;
        if bytes.pop() != Some(0) {
            return Err(Error::CorruptCache("unterminated archive path".to_string()));
        }
        let path = String::from_utf8_lossy(&bytes).into_owned();
        archives.push(Arc::new(ArchiveFile::new(PathBuf::from(path))));
    }

    let entry_count = input.read_u32::<LittleEndian>()?;
    let mut entries = Vec::with_capacity(entry_count.min(1 << 24) as usize);
    for _ in 0..entry_count {
        let tgi = read_tgi(&mut input)?;
        let offset = input.read_u32::<LittleEndian>()?;
        let size = input.read_u32::<LittleEndian>()?;
        let archive = input.read_u32::<LittleEndian>()?;
        let file = archives.get(archive as usize).ok_or_else(|| {
            Error::CorruptCache(format!("entry {tgi} refers to missing archive {archive}"))
        })?;
        entries.push(Arc::new(Entry::new(tgi, offset, size, Arc::clone(file))));
    }

    let raw_len = input.read_u32::<LittleEndian>()?;
    let mut raw = vec![0u8; raw_len as usize];
    input.read_exact(&mut raw)?;
    let maps = read_maps(&raw)?;
    let index = TgiIndex::from_parts(entries, maps)?;

    let family_count = input.read_u32::<LittleEndian>()?;
    let mut families = FamilyTable::default();
    for _ in 0..family_count {
        let id = input.read_u32::<LittleEndian>()?;
        let count = input.read_u32::<LittleEndian>()?;
        let members = (0..count)
            .map(|_| read_tgi(&mut input))
            .collect::<Result<Vec<_>>>()?;
        families.insert(id, members);
    }

    Ok(Snapshot {
        archives,
        index,
        families,
    })
}

fn read_tgi<R: Read>(input: &mut R) -> Result<Tgi> {
    let kind = input.read_u32::<LittleEndian>()?;
    let group = input.read_u32::<LittleEndian>()?;
    let instance = input.read_u32::<LittleEndian>()?;
    Ok(Tgi::new(kind, group, instance))
}

fn read_maps(raw: &[u8]) -> Result<IndexMaps> {
    let mut cursor = Cursor::new(raw);
    Ok(IndexMaps {
        tgi: read_map(&mut cursor, 3, |w| (w[0], w[1], w[2]))?,
        ti: read_map(&mut cursor, 2, |w| (w[0], w[1]))?,
        t: read_map(&mut cursor, 1, |w| w[0])?,
        i: read_map(&mut cursor, 1, |w| w[0])?,
    })
}

fn read_map<K: Eq + Hash>(
    cursor: &mut Cursor<&[u8]>,
    width: usize,
    key: impl Fn(&[u32]) -> K,
) -> Result<HashMap<K, Vec<u32>>> {
    let count = cursor.read_u32::<LittleEndian>()?;
    let mut map = HashMap::with_capacity(count.min(1 << 20) as usize);
    let mut words = vec![0u32; width];
    for _ in 0..count {
        for word in &mut words {
            *word = cursor.read_u32::<LittleEndian>()?;
        }
        let len = cursor.read_u32::<LittleEndian>()?;
        let positions = (0..len)
            .map(|_| cursor.read_u32::<LittleEndian>())
            .collect::<std::io::Result<Vec<_>>>()?;
        map.insert(key(&words), positions);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simdbpf::TgiQuery;

    fn sample() -> (Vec<Arc<ArchiveFile>>, TgiIndex, FamilyTable) {
        let base = Arc::new(ArchiveFile::new("/sc4/SimCity_1.dat"));
        let user = Arc::new(ArchiveFile::new("/plugins/user.dat"));
        let entries = vec![
            Arc::new(Entry::new(Tgi::new(1, 2, 3), 96, 10, Arc::clone(&base))),
            Arc::new(Entry::new(Tgi::new(1, 2, 4), 106, 20, Arc::clone(&base))),
            Arc::new(Entry::new(Tgi::new(1, 2, 3), 96, 30, Arc::clone(&user))),
        ];
        let mut families = FamilyTable::default();
        families.insert(0x1234, vec![Tgi::new(1, 2, 3), Tgi::new(1, 2, 4)]);
        (vec![base, user], TgiIndex::build(entries), families)
    }

    #[test]
    fn test_round_trip_answers_queries_identically() {
        let (archives, index, families) = sample();
        let mut bytes = Vec::new();
        write(&mut bytes, &archives, &index, &families).unwrap();
        let snapshot = read(bytes.as_slice()).unwrap();

        assert_eq!(snapshot.archives.len(), 2);
        assert_eq!(snapshot.index.maps(), index.maps());
        assert_eq!(snapshot.families.get(0x1234), families.get(0x1234));

        for query in [
            TgiQuery::exact(Tgi::new(1, 2, 3)),
            TgiQuery::by_instance(4),
            TgiQuery::by_kind(1),
            TgiQuery::any().with_group(2),
        ] {
            let before = index.find(&query).map(|e| (e.path().to_path_buf(), e.size()));
            let after = snapshot.index.find(&query).map(|e| (e.path().to_path_buf(), e.size()));
            assert_eq!(before, after);
            assert_eq!(index.find_all(&query).len(), snapshot.index.find_all(&query).len());
        }
    }

    #[test]
    fn test_deterministic_output() {
        let (archives, index, families) = sample();
        let mut a = Vec::new();
        let mut b = Vec::new();
        write(&mut a, &archives, &index, &families).unwrap();
        write(&mut b, &archives, &index, &families).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        assert!(matches!(read(&b"NOPE\x01\0\0\0"[..]), Err(Error::InvalidCacheMagic(_))));
        assert!(matches!(
            read(&b"PTIX\x02\0\0\0"[..]),
            Err(Error::UnsupportedCacheVersion(2))
        ));
    }

    #[test]
    fn test_rejects_dangling_archive() {
        let (archives, index, families) = sample();
        let mut bytes = Vec::new();
        write(&mut bytes, &archives[..1], &index, &families)
            .expect_err("user.dat is not listed");
        bytes.clear();
        write(&mut bytes, &archives, &index, &families).unwrap();
        // Point the first entry at archive 9
        let first_entry = 4 + 4 + 4 + "/sc4/SimCity_1.dat\0/plugins/user.dat\0".len() + 4;
        bytes[first_entry + 20..first_entry + 24].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(read(bytes.as_slice()), Err(Error::CorruptCache(_))));
    }
}
