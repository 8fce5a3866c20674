use std::fs;

use approx::assert_relative_eq;
use feature_engine::{AttrValue, AttributeStore, EngineConfig, EngineError, Session, UnresolvedReason};
use file_format::*;
use geom_kernel::{MockKernel, ShapeType};
use serde_json::Value;
use shape_types::{Color, Selection};
use tempfile::TempDir;

const PART: &str = "Part_1";

fn add(session: &mut Session, kind: &str, attrs: AttributeStore) {
    session.start_operation(kind);
    session.add_feature(PART, kind, attrs).unwrap();
    session.finish_operation().unwrap();
}

/// Box_1 (10^3) and Cylinder_1 (r 10, h 13), the box coloured red.
fn sample_session() -> Session {
    let mut session = Session::with_mock(EngineConfig::default());
    session.start_operation("part");
    session.add_part().unwrap();
    session.finish_operation().unwrap();
    add(
        &mut session,
        "Box",
        AttributeStore::new()
            .with("dx", AttrValue::scalar(10))
            .with("dy", AttrValue::scalar(10))
            .with("dz", AttrValue::scalar(10)),
    );
    add(
        &mut session,
        "Cylinder",
        AttributeStore::new()
            .with("radius", AttrValue::scalar(10))
            .with("height", AttrValue::scalar(13)),
    );
    session.start_operation("colour");
    session
        .set_result_color(PART, "Box_1_1", Color::new(255, 0, 0))
        .unwrap();
    session.finish_operation().unwrap();
    session
}

fn reload(dir: &TempDir) -> Session {
    let (session, _) = load_session(
        dir.path(),
        EngineConfig::default(),
        Box::new(MockKernel::new()),
    )
    .unwrap();
    session
}

// ── Save ─────────────────────────────────────────────────────────────────

#[test]
fn save_writes_manifest_and_one_file_per_document() {
    let dir = TempDir::new().unwrap();
    let session = sample_session();
    let manifest = save_session(&session, &ProjectMetadata::new("sample"), dir.path()).unwrap();

    assert_eq!(manifest.format, FORMAT_ID);
    assert_eq!(manifest.version, FORMAT_VERSION);
    let names: Vec<&str> = manifest.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["PartSet", PART]);
    for path in manifest.files(dir.path()) {
        assert!(path.is_file(), "{} missing", path.display());
    }

    let raw: Value = serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap()).unwrap();
    assert_eq!(raw["project"]["name"], "sample");
}

#[test]
fn saving_inside_an_operation_is_refused() {
    let dir = TempDir::new().unwrap();
    let mut session = sample_session();
    session.start_operation("pending");
    let err = save_session(&session, &ProjectMetadata::new("x"), dir.path()).unwrap_err();
    assert!(matches!(err, SaveError::OperationOpen));
    assert!(!dir.path().join(MANIFEST_FILE).exists());
}

#[test]
fn save_keeps_creation_time() {
    let dir = TempDir::new().unwrap();
    let meta = ProjectMetadata::new("dated");
    let manifest = save_session(&sample_session(), &meta, dir.path()).unwrap();
    assert_eq!(manifest.project.created, meta.created);
    assert!(manifest.project.modified >= meta.created);
}

// ── Round trip ───────────────────────────────────────────────────────────

#[test]
fn reloaded_parts_start_inactive() {
    let dir = TempDir::new().unwrap();
    save_session(&sample_session(), &ProjectMetadata::new("p"), dir.path()).unwrap();
    let session = reload(&dir);

    assert!(!session.is_active(PART));
    let err = session
        .resolve(PART, &Selection::new(ShapeType::Solid, "Box_1_1"))
        .unwrap_err();
    match err {
        EngineError::Unresolved(u) => assert_eq!(u.reason, UnresolvedReason::PartDeactivated(PART.into())),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn activated_part_measures_the_same() {
    let dir = TempDir::new().unwrap();
    let before = sample_session();
    save_session(&before, &ProjectMetadata::new("p"), dir.path()).unwrap();
    let mut after = reload(&dir);
    after.activate(PART, true).unwrap();

    for result in ["Box_1_1", "Cylinder_1_1"] {
        assert_relative_eq!(
            after.volume(PART, result).unwrap(),
            before.volume(PART, result).unwrap(),
            epsilon = 1e-6
        );
    }
    assert_relative_eq!(after.volume(PART, "Box_1_1").unwrap(), 1000.0);
    assert_relative_eq!(after.volume(PART, "Cylinder_1_1").unwrap(), 4084.07, epsilon = 0.01);

    let top = Selection::new(ShapeType::Face, "Box_1_1/Top");
    assert_eq!(after.resolve(PART, &top).unwrap().name, before.resolve(PART, &top).unwrap().name);
    assert_eq!(after.result_color(PART, "Box_1_1"), Some(Color::new(255, 0, 0)));
}

#[test]
fn appearance_survives_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut before = sample_session();
    let top = Selection::new(ShapeType::Face, "Box_1_1/Top");
    before.start_operation("appearance");
    before
        .set_sub_shape_color(PART, "Box_1_1", top.clone(), Color::new(0, 0, 255))
        .unwrap();
    before.set_transparency(PART, "Cylinder_1_1", 0.5).unwrap();
    before.set_display_name(PART, "Cylinder_1_1", "Post").unwrap();
    before.finish_operation().unwrap();
    save_session(&before, &ProjectMetadata::new("p"), dir.path()).unwrap();

    let mut after = reload(&dir);
    after.activate(PART, true).unwrap();
    assert_eq!(after.sub_shape_color(PART, &top), Some(Color::new(0, 0, 255)));
    assert_eq!(
        after.sub_shape_color(PART, &Selection::new(ShapeType::Face, "Box_1_1/Bottom")),
        None
    );
    let meta = after.result_meta(PART, "Cylinder_1_1").unwrap();
    assert_eq!(meta.transparency, Some(0.5));
    assert_eq!(meta.display_name.as_deref(), Some("Post"));
    assert_eq!(after.result_meta(PART, "Cylinder_1_1"), before.result_meta(PART, "Cylinder_1_1"));
    assert_eq!(after.result_color(PART, "Box_1_1"), Some(Color::new(255, 0, 0)));
}

#[test]
fn reloaded_model_equals_the_saved_one() {
    let dir = TempDir::new().unwrap();
    let session = sample_session();
    save_session(&session, &ProjectMetadata::new("p"), dir.path()).unwrap();
    let (model, meta) = load_model(dir.path()).unwrap();
    assert_eq!(&model, session.model());
    assert_eq!(meta.name, "p");
}

#[test]
fn new_features_after_reload_continue_the_counters() {
    let dir = TempDir::new().unwrap();
    save_session(&sample_session(), &ProjectMetadata::new("p"), dir.path()).unwrap();
    let mut session = reload(&dir);
    session.activate(PART, true).unwrap();
    add(
        &mut session,
        "Box",
        AttributeStore::new()
            .with("dx", AttrValue::scalar(1))
            .with("dy", AttrValue::scalar(1))
            .with("dz", AttrValue::scalar(1)),
    );
    assert!(session.feature_id(PART, "Box_2").is_ok());
}

// ── Rejected files ───────────────────────────────────────────────────────

fn rewrite_manifest(dir: &TempDir, edit: impl FnOnce(&mut Value)) {
    let path = dir.path().join(MANIFEST_FILE);
    let mut raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    edit(&mut raw);
    fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();
}

#[test]
fn future_versions_are_rejected() {
    let dir = TempDir::new().unwrap();
    save_session(&sample_session(), &ProjectMetadata::new("p"), dir.path()).unwrap();
    rewrite_manifest(&dir, |m| m["version"] = Value::from(FORMAT_VERSION + 1));
    assert!(matches!(
        load_model(dir.path()),
        Err(LoadError::FutureVersion { .. })
    ));
}

#[test]
fn foreign_formats_are_rejected() {
    let dir = TempDir::new().unwrap();
    save_session(&sample_session(), &ProjectMetadata::new("p"), dir.path()).unwrap();
    rewrite_manifest(&dir, |m| m["format"] = Value::from("something-else"));
    assert!(matches!(load_model(dir.path()), Err(LoadError::UnknownFormat(_))));
}

#[test]
fn a_part_without_its_document_is_rejected() {
    let dir = TempDir::new().unwrap();
    save_session(&sample_session(), &ProjectMetadata::new("p"), dir.path()).unwrap();
    rewrite_manifest(&dir, |m| {
        if let Some(docs) = m["documents"].as_array_mut() {
            docs.truncate(1);
        }
    });
    match load_model(dir.path()) {
        Err(LoadError::MissingDocument(name)) => assert_eq!(name, PART),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_directory_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_model(&dir.path().join("nothing")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn version_zero_documents_are_migrated() {
    let dir = TempDir::new().unwrap();
    let manifest = save_session(&sample_session(), &ProjectMetadata::new("p"), dir.path()).unwrap();
    let part_file = dir.path().join(&manifest.documents[1].file);
    let mut raw: Value = serde_json::from_str(&fs::read_to_string(&part_file).unwrap()).unwrap();
    raw["version"] = Value::from(0);
    if let Some(features) = raw["document"]["features"].as_array_mut() {
        for f in features {
            if let Some(obj) = f.as_object_mut() {
                obj.remove("id");
            }
        }
    }
    fs::write(&part_file, serde_json::to_string(&raw).unwrap()).unwrap();

    let (model, _) = load_model(dir.path()).unwrap();
    let part = model.document(PART).unwrap();
    assert_eq!(part.features.len(), 2);
    assert_ne!(part.features[0].id, part.features[1].id);
}
