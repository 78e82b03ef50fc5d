use simdbpf::prelude::*;
use tempfile::tempdir;

fn lot_object(kind: u32, iid: u32) -> Value {
    let mut values = vec![kind, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x1];
    values.push(iid);
    Value::Uint32(values)
}

#[test]
fn test_lot_exemplar_through_archive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lot.SC4Lot");

    let mut lot = Exemplar::new();
    lot.set(props::EXEMPLAR_TYPE, Value::Uint32(vec![0x10]));
    lot.set(props::EXEMPLAR_NAME, Value::String("Corner Shop".into()));
    lot.set(props::LOT_CONFIG_OBJECT, lot_object(0x00, 0x1000));
    lot.set(props::LOT_CONFIG_OBJECT + 1, lot_object(0x07, 0));

    let tgi = Tgi::new(file_types::EXEMPLAR, props::LOT_CONFIGURATIONS_GROUP, 0x1000);
    let mut writer = DbpfWriter::new();
    writer.add_compressed(tgi, lot.to_bytes().unwrap());
    writer.save(&path).unwrap();

    let archive = Archive::open(&path).unwrap();
    assert_eq!(archive.entries().len(), 1);
    let entry = &archive.entries()[0];
    assert_eq!(entry.path(), path.as_path());

    let record = entry.decode().unwrap();
    let exemplar = record.as_exemplar().unwrap();
    assert_eq!(exemplar.get_u32(props::EXEMPLAR_TYPE), Some(0x10));
    let objects = exemplar.lot_objects();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].kind, LotObjectKind::Building);
    assert_eq!(objects[0].iid(), Some(0x1000));
    assert_eq!(objects[1].kind, LotObjectKind::Network);
}

#[test]
fn test_text_exemplar_through_archive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("text.SC4Desc");

    let text = "EQZT1###\n\
        ParentCohort=Key:{0x00000000,0x00000000,0x00000000}\n\
        PropCount=0x00000001\n\
        0x00000010:{\"Exemplar Type\"}=Uint32:0:{0x00000002}\n";
    let tgi = Tgi::new(file_types::EXEMPLAR, 0x1234, 0x5678);
    let mut writer = DbpfWriter::new();
    writer.add(tgi, text.as_bytes().to_vec());
    writer.save(&path).unwrap();

    let archive = Archive::open(&path).unwrap();
    let record = archive.find(tgi).unwrap().decode().unwrap();
    let exemplar = record.as_exemplar().unwrap();
    assert!(exemplar.is_text());
    assert_eq!(exemplar.parent(), None);
    assert_eq!(exemplar.get_u32(props::EXEMPLAR_TYPE), Some(0x02));
}

#[test]
fn test_not_a_dbpf() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.dat");
    std::fs::write(&path, vec![0u8; 200]).unwrap();
    assert!(matches!(Archive::open(&path), Err(Error::InvalidDbpfMagic(_))));

    let short = dir.path().join("short.dat");
    std::fs::write(&short, b"DBPF").unwrap();
    assert!(matches!(Archive::open(&short), Err(Error::ArchiveTooSmall { size: 4 })));
}

#[test]
fn test_raw_records_stay_raw() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tex.dat");
    let tgi = Tgi::new(file_types::FSH, 0x1ABE787D, 0x500);
    let mut writer = DbpfWriter::new();
    writer.add_compressed(tgi, b"SHPI fake texture".to_vec());
    writer.save(&path).unwrap();

    let archive = Archive::open(&path).unwrap();
    match archive.find(tgi).unwrap().decode().unwrap() {
        Record::Raw(bytes) => assert_eq!(bytes.as_ref(), b"SHPI fake texture"),
        Record::Exemplar(_) => panic!("FSH decoded as exemplar"),
    }
}
