use std::fs;
use std::path::{Path, PathBuf};

use plugtrack::prelude::*;
use plugtrack::tracker::{FamilyNode, MissingRef, NamedLink};
use pretty_assertions::assert_eq;
use simdbpf::{DbpfWriter, Exemplar, Tgi, TgiQuery, Value, file_types, props};
use tempfile::TempDir;

const BUILDING_GROUP: u32 = 0x07BDDF1C;

fn write(path: &Path, records: &[(Tgi, Vec<u8>)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut writer = DbpfWriter::new();
    for (tgi, data) in records {
        writer.add_compressed(*tgi, data.clone());
    }
    writer.save(path).unwrap();
}

fn exemplar(parent: Option<Tgi>, values: &[(u32, Value)]) -> Vec<u8> {
    let mut exemplar = Exemplar::new();
    if let Some(parent) = parent {
        exemplar.set_parent(parent);
    }
    for (id, value) in values {
        exemplar.set(*id, value.clone());
    }
    exemplar.to_bytes().unwrap()
}

fn lot_object(kind: u32, iid: u32) -> Value {
    let mut values = vec![kind, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x1];
    values.push(iid);
    Value::Uint32(values)
}

fn lot_tgi(instance: u32) -> Tgi {
    Tgi::new(file_types::EXEMPLAR, props::LOT_CONFIGURATIONS_GROUP, instance)
}

fn building_tgi(instance: u32) -> Tgi {
    Tgi::new(file_types::EXEMPLAR, BUILDING_GROUP, instance)
}

/// A lot whose only object places the given building or family.
fn lot(building: u32) -> Vec<u8> {
    exemplar(
        None,
        &[
            (props::EXEMPLAR_TYPE, Value::Uint32(vec![0x10])),
            (props::EXEMPLAR_NAME, Value::String("Test Lot".into())),
            (props::LOT_CONFIG_OBJECT, lot_object(0x00, building)),
        ],
    )
}

fn building(name: &str) -> Vec<u8> {
    exemplar(
        None,
        &[
            (props::EXEMPLAR_TYPE, Value::Uint32(vec![0x02])),
            (props::EXEMPLAR_NAME, Value::String(name.into())),
        ],
    )
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("plugins")).unwrap();
        fs::create_dir_all(root.join("sc4")).unwrap();
        Self { _dir: dir, root }
    }

    fn plugin(&self, name: &str) -> PathBuf {
        self.root.join("plugins").join(name)
    }

    fn game(&self, name: &str) -> PathBuf {
        self.root.join("sc4").join(name)
    }

    fn config(&self) -> TrackerConfig {
        TrackerConfig {
            plugins: Some(self.root.join("plugins")),
            installation: Some(self.root.join("sc4")),
            cache: None,
            threads: 2,
            ..TrackerConfig::default()
        }
    }

    fn track(&self, patterns: &[&str]) -> TrackingResult {
        DependencyTracker::new(self.config())
            .track(patterns, &TrackOptions::default())
            .unwrap()
    }
}

fn node_id(tgi: Tgi, file: &Path) -> NodeId {
    NodeId {
        tgi,
        file: file.to_path_buf(),
    }
}

fn lot_node<'a>(result: &'a TrackingResult, id: &NodeId) -> &'a plugtrack::tracker::LotNode {
    match result.graph.get(id) {
        Some(Dependency::Lot(lot)) => lot,
        other => panic!("expected a lot, found {other:?}"),
    }
}

fn exemplar_node<'a>(result: &'a TrackingResult, id: &NodeId) -> &'a plugtrack::tracker::ExemplarNode {
    match result.graph.get(id) {
        Some(Dependency::Exemplar(exemplar)) => exemplar,
        other => panic!("expected an exemplar, found {other:?}"),
    }
}

#[test]
fn test_lot_finds_building() {
    let fixture = Fixture::new();
    write(&fixture.plugin("lots/lot.SC4Lot"), &[(lot_tgi(0x1), lot(0x1000))]);
    write(&fixture.plugin("buildings.dat"), &[(building_tgi(0x1000), building("Shop"))]);

    let result = fixture.track(&["lots/"]);

    assert_eq!(result.scanned, vec![fixture.plugin("lots/lot.SC4Lot")]);
    assert_eq!(result.files, vec![fixture.plugin("buildings.dat")]);
    assert!(result.missing.is_empty());
    assert!(result.errors.is_empty());

    let lot_id = node_id(lot_tgi(0x1), &fixture.plugin("lots/lot.SC4Lot"));
    let building_id = node_id(building_tgi(0x1000), &fixture.plugin("buildings.dat"));
    let lot = lot_node(&result, &lot_id);
    assert_eq!(lot.name.as_deref(), Some("Test Lot"));
    assert_eq!(lot.buildings, vec![Link::Resource(building_id.clone())]);
    assert_eq!(exemplar_node(&result, &building_id).name.as_deref(), Some("Shop"));
    assert_eq!(result.tree, vec![lot_id]);
    assert_eq!(result.other_files(), vec![PathBuf::from("buildings.dat")]);
}

#[test]
fn test_missing_building_reported_once() {
    let fixture = Fixture::new();
    let lot_file = fixture.plugin("lot.SC4Lot");
    write(&lot_file, &[(lot_tgi(0x1), lot(0x2000)), (lot_tgi(0x2), lot(0x2000))]);

    let result = fixture.track(&["lot.SC4Lot"]);

    let query = TgiQuery::by_kind(file_types::EXEMPLAR).with_instance(0x2000);
    assert_eq!(
        result.missing,
        vec![
            MissingEntry {
                kind: MissingKind::Building,
                query,
                file: lot_file.clone(),
                parent: lot_tgi(0x1),
            },
            MissingEntry {
                kind: MissingKind::Building,
                query,
                file: lot_file.clone(),
                parent: lot_tgi(0x2),
            },
        ]
    );
    let groups = result.missing_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].files, vec![lot_file.clone()]);
    assert!(result.files.is_empty());

    let lot = lot_node(&result, &node_id(lot_tgi(0x1), &lot_file));
    assert_eq!(lot.buildings, vec![Link::Missing(MissingRef { query })]);
}

#[test]
fn test_exemplar_models_and_named_properties() {
    let fixture = Fixture::new();
    let model = Tgi::new(file_types::S3D, 0x5AD0_0000, 0x4000);
    let source = fixture.plugin("building.SC4Desc");
    write(
        &source,
        &[(
            building_tgi(0x1000),
            exemplar(
                None,
                &[
                    (props::EXEMPLAR_TYPE, Value::Uint32(vec![0x02])),
                    (props::QUERY_EXEMPLAR_GUID, Value::Uint32(vec![0x3000])),
                    (props::SFX_QUERY_SOUND, Value::Uint32(vec![0x5000])),
                    (
                        props::RESOURCE_KEY_TYPES[0],
                        Value::Uint32(vec![model.kind, model.group, model.instance]),
                    ),
                ],
            ),
        )],
    );
    let sound = Tgi::new(file_types::SOUND, 0x2A, 0x5000);
    write(
        &fixture.plugin("models.SC4Model"),
        &[(model, vec![0u8; 16]), (sound, vec![0u8; 8])],
    );

    let result = fixture.track(&["building.SC4Desc"]);

    let node = exemplar_node(&result, &node_id(building_tgi(0x1000), &source));
    let model_id = node_id(model, &fixture.plugin("models.SC4Model"));
    let sound_id = node_id(sound, &fixture.plugin("models.SC4Model"));
    assert_eq!(node.models, vec![Link::Resource(model_id.clone())]);
    assert_eq!(
        node.props,
        vec![
            NamedLink {
                name: "QueryExemplarGUID",
                link: Link::Missing(MissingRef {
                    query: TgiQuery::by_kind(0).with_instance(0x3000),
                }),
            },
            NamedLink {
                name: "SFXQuerySound",
                link: Link::Resource(sound_id.clone()),
            },
        ]
    );
    assert!(matches!(result.graph.get(&model_id), Some(Dependency::Raw { .. })));
    assert!(matches!(result.graph.get(&sound_id), Some(Dependency::Raw { .. })));
    // Named properties are not reported as missing
    assert!(result.missing.is_empty());
    assert_eq!(result.files, vec![fixture.plugin("models.SC4Model")]);
}

#[test]
fn test_missing_model_and_parent() {
    let fixture = Fixture::new();
    let source = fixture.plugin("building.SC4Desc");
    let parent = Tgi::new(file_types::COHORT, 0x1, 0x9);
    let model = Tgi::new(file_types::S3D, 0x1, 0x4000);
    write(
        &source,
        &[(
            building_tgi(0x1000),
            exemplar(
                Some(parent),
                &[(
                    props::RESOURCE_KEY_TYPES[0],
                    Value::Uint32(vec![model.kind, model.group, model.instance]),
                )],
            ),
        )],
    );

    let result = fixture.track(&["building.SC4Desc"]);

    let kinds: Vec<MissingKind> = result.missing.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MissingKind::Model, MissingKind::Parent]);
    let node = exemplar_node(&result, &node_id(building_tgi(0x1000), &source));
    assert_eq!(
        node.parent,
        Some(Link::Missing(MissingRef {
            query: TgiQuery::exact(parent),
        }))
    );
}

#[test]
fn test_family_prefers_game_files() {
    let fixture = Fixture::new();
    let family = Value::Uint32(vec![0xFA]);
    let prop = |instance| Tgi::new(file_types::EXEMPLAR, 0x2, instance);
    write(
        &fixture.game("SimCity_1.dat"),
        &[(prop(0x5000), exemplar(None, &[(props::BUILDINGPROP_FAMILY, family.clone())]))],
    );
    write(
        &fixture.plugin("props.dat"),
        &[(prop(0x5001), exemplar(None, &[(props::BUILDINGPROP_FAMILY, family.clone())]))],
    );
    let lot_file = fixture.plugin("lot.SC4Lot");
    write(
        &lot_file,
        &[(
            lot_tgi(0x1),
            exemplar(
                None,
                &[
                    (props::EXEMPLAR_TYPE, Value::Uint32(vec![0x10])),
                    (props::LOT_CONFIG_OBJECT, lot_object(0x01, 0xFA)),
                ],
            ),
        )],
    );

    let result = fixture.track(&["lot.SC4Lot"]);

    assert_eq!(result.files, vec![fixture.game("SimCity_1.dat")]);
    let lot = lot_node(&result, &node_id(lot_tgi(0x1), &lot_file));
    assert_eq!(
        lot.props,
        vec![Link::Family(FamilyNode {
            id: 0xFA,
            members: vec![Link::Resource(node_id(prop(0x5000), &fixture.game("SimCity_1.dat")))],
        })]
    );
    assert!(result.other_files().is_empty());
}

#[test]
fn test_game_record_wins_over_plugin_override() {
    let fixture = Fixture::new();
    write(&fixture.game("SimCity_1.dat"), &[(building_tgi(0x1000), building("Game"))]);
    write(&fixture.plugin("override.dat"), &[(building_tgi(0x1000), building("Override"))]);
    write(&fixture.plugin("lot.SC4Lot"), &[(lot_tgi(0x1), lot(0x1000))]);

    let result = fixture.track(&["lot.SC4Lot"]);
    assert_eq!(result.files, vec![fixture.game("SimCity_1.dat")]);

    // An explicit dependency takes precedence
    let tracker = DependencyTracker::new(fixture.config());
    let options = TrackOptions {
        dependencies: vec![fixture.plugin("override.dat").to_string_lossy().into_owned()],
    };
    let result = tracker.track(&["lot.SC4Lot"], &options).unwrap();
    assert_eq!(result.files, vec![fixture.plugin("override.dat")]);

    // The index itself resolves to the override
    let index = tracker.index().unwrap();
    let winner = index.find(&TgiQuery::exact(building_tgi(0x1000))).unwrap();
    assert_eq!(winner.path(), fixture.plugin("override.dat"));
}

#[test]
fn test_source_record_wins_over_later_plugin() {
    let fixture = Fixture::new();
    let source = fixture.plugin("lot.SC4Lot");
    write(
        &source,
        &[(lot_tgi(0x1), lot(0x1000)), (building_tgi(0x1000), building("Bundled"))],
    );
    write(&fixture.plugin("zz_override.dat"), &[(building_tgi(0x1000), building("Override"))]);

    let tracker = DependencyTracker::new(fixture.config());
    let index = tracker.ensure_index().unwrap();
    let winner = index.find(&TgiQuery::exact(building_tgi(0x1000))).unwrap();
    assert_eq!(winner.path(), fixture.plugin("zz_override.dat"));

    let result = tracker.track(&["lot.SC4Lot"], &TrackOptions::default()).unwrap();
    let lot = lot_node(&result, &node_id(lot_tgi(0x1), &source));
    assert_eq!(lot.buildings, vec![Link::Resource(node_id(building_tgi(0x1000), &source))]);
    assert!(result.files.is_empty());
}

#[test]
fn test_first_declared_record_wins_within_archive() {
    let fixture = Fixture::new();
    write(
        &fixture.plugin("buildings.dat"),
        &[
            (building_tgi(0x1000), building("First")),
            (building_tgi(0x1000), building("Second")),
        ],
    );

    let tracker = DependencyTracker::new(fixture.config());
    let index = tracker.ensure_index().unwrap();
    let entry = index.find(&TgiQuery::exact(building_tgi(0x1000))).unwrap();
    let record = index.read(&entry).unwrap();
    let name = record.as_exemplar().unwrap().get_str(props::EXEMPLAR_NAME).map(ToString::to_string);
    assert_eq!(name.as_deref(), Some("First"));
}

#[test]
fn test_sc4pac_packages_are_reported() {
    let fixture = Fixture::new();
    write(
        &fixture.plugin("150-mods/memo.lots.1.sc4pac/lots.dat"),
        &[(building_tgi(0x1000), building("Packaged"))],
    );
    write(&fixture.plugin("lot.SC4Lot"), &[(lot_tgi(0x1), lot(0x1000))]);

    let tracker = DependencyTracker::new(fixture.config());
    let result = tracker.track(&["lot.SC4Lot"], &TrackOptions::default()).unwrap();

    assert_eq!(result.packages, vec!["memo:lots".to_string()]);
    assert!(result.other_files().is_empty());
    assert_eq!(
        tracker.ensure_packages().folder("memo:lots"),
        Some(fixture.plugin("150-mods/memo.lots.1.sc4pac").as_path())
    );
}

#[test]
fn test_uninstalled_dependency_packages() {
    let fixture = Fixture::new();
    write(
        &fixture.plugin("150-mods/memo.lots.1.sc4pac/lots.dat"),
        &[(building_tgi(0x1000), building("Packaged"))],
    );

    let tracker = DependencyTracker::new(fixture.config());
    let dependencies = ["memo:lots", "bsc:textures", "override.dat"];
    assert_eq!(tracker.ensure_packages().unknown(&dependencies), vec!["bsc:textures"]);
}

#[test]
fn test_index_cache_round_trip() {
    let fixture = Fixture::new();
    write(&fixture.plugin("lots/lot.SC4Lot"), &[(lot_tgi(0x1), lot(0x1000))]);
    write(&fixture.plugin("buildings.dat"), &[(building_tgi(0x1000), building("Shop"))]);
    let cache = fixture.root.join("cache/index.bin");
    let config = TrackerConfig {
        cache: Some(cache.clone()),
        ..fixture.config()
    };

    let built = DependencyTracker::new(config.clone())
        .track(&["lots/"], &TrackOptions::default())
        .unwrap();
    assert!(cache.is_file());

    let loaded = DependencyTracker::new(config)
        .track(&["lots/"], &TrackOptions::default())
        .unwrap();
    assert_eq!(
        serde_json::to_value(&built).unwrap(),
        serde_json::to_value(&loaded).unwrap()
    );
}

#[test]
fn test_repeat_runs_are_identical() {
    let fixture = Fixture::new();
    write(
        &fixture.plugin("lots.dat"),
        &[
            (lot_tgi(0x1), lot(0x1000)),
            (lot_tgi(0x2), lot(0x1000)),
            (lot_tgi(0x3), lot(0x2000)),
        ],
    );
    write(
        &fixture.plugin("buildings.dat"),
        &[(building_tgi(0x1000), building("Shop")), (building_tgi(0x2000), building("Bank"))],
    );

    let tracker = DependencyTracker::new(fixture.config());
    let first = tracker.track(&["lots.dat"], &TrackOptions::default()).unwrap();
    let second = tracker.track(&["lots.dat"], &TrackOptions::default()).unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
    // Each exemplar is decoded once even when several lots share it
    assert_eq!(first.decoded, 5);
    assert_eq!(first.graph.len(), 5);
    assert_eq!(first.tree.len(), 3);
}

#[test]
fn test_parent_cycle_terminates() {
    let fixture = Fixture::new();
    let a = Tgi::new(file_types::COHORT, 0x1, 0xA);
    let b = Tgi::new(file_types::COHORT, 0x1, 0xB);
    let file = fixture.plugin("cycle.dat");
    write(&file, &[(a, exemplar(Some(b), &[])), (b, exemplar(Some(a), &[]))]);

    let result = fixture.track(&["cycle.dat"]);

    let parent_of = |tgi| exemplar_node(&result, &node_id(tgi, &file)).parent.clone();
    assert_eq!(parent_of(a), Some(Link::Resource(node_id(b, &file))));
    assert_eq!(parent_of(b), Some(Link::Resource(node_id(a, &file))));
    assert!(result.missing.is_empty());
    assert!(result.tree.is_empty());
}

#[test]
fn test_all_sources_failed() {
    let fixture = Fixture::new();
    fs::write(fixture.plugin("broken.dat"), b"not an archive").unwrap();

    let err = DependencyTracker::new(fixture.config())
        .track(&["broken.dat"], &TrackOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::AllSourcesFailed { count: 1 }));
}

#[test]
fn test_one_failed_source_keeps_the_rest() {
    let fixture = Fixture::new();
    fs::write(fixture.plugin("broken.dat"), b"not an archive").unwrap();
    write(&fixture.plugin("lot.SC4Lot"), &[(lot_tgi(0x1), lot(0x2000))]);

    let result = fixture.track(&["*"]);
    assert_eq!(result.scanned.len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].file, fixture.plugin("broken.dat"));
    assert_eq!(result.missing.len(), 1);
}

#[test]
fn test_missing_plugins_folder() {
    let fixture = Fixture::new();
    let config = TrackerConfig {
        plugins: Some(fixture.root.join("nope")),
        ..fixture.config()
    };
    let err = DependencyTracker::new(config)
        .track(&["*"], &TrackOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::DirectoryNotFound { .. }));
}
