//! Modelling scripts replayed through ModelBuilder against the mock kernel.
//!
//! Each scenario builds a small model step by step and checks names,
//! group membership and error states after every recompute.

use feature_engine::{AttrValue, EngineError};
use geom_kernel::ShapeType;
use shape_types::{Color, FilterDecl, FilterSet, Selection};
use test_harness::helpers::{edge, face, list, solid};
use test_harness::{HarnessError, ModelBuilder};

/// A part holding a 10 mm box.
fn boxed() -> ModelBuilder {
    let mut m = ModelBuilder::mock();
    m.part().unwrap();
    m.box_("10", "10", "10").unwrap();
    m
}

/// Box_1 split at its mid-plane and fused back together.
fn split_and_fused(m: &mut ModelBuilder) {
    m.plane_between(face("Box_1_1/Left"), face("Box_1_1/Right"))
        .unwrap();
    m.partition(list(ShapeType::Solid, &["Box_1_1"]), list(ShapeType::Face, &["Plane_1"]))
        .unwrap();
    m.fuse(list(ShapeType::Solid, &["Partition_1_1_2", "Partition_1_1_1"]))
        .unwrap();
}

// ── Scenario 1: Box faces and edges ─────────────────────────────────────

#[test]
fn test_box_names() {
    let m = boxed();
    m.assert_valid("Box_1").unwrap();
    m.assert_volume("Box_1_1", 1000.0, 1e-9).unwrap();
    assert_eq!(m.count("Box_1_1", ShapeType::Face).unwrap(), 6);

    for label in ["Top", "Bottom", "Front", "Back", "Left", "Right"] {
        m.assert_resolves(&face(&format!("Box_1_1/{label}"))).unwrap();
    }
    m.assert_resolves(&edge("[Box_1_1/Top][Box_1_1/Front]")).unwrap();
    m.assert_unresolved(&face("Box_1_1/Nowhere")).unwrap();
}

// ── Scenario 2: Empty filter argument ───────────────────────────────────

#[test]
fn test_empty_filter_argument() {
    let mut m = boxed();
    let emptied = list(ShapeType::Face, &["Box_1_1/Top"]).with_filters(FilterSet::new(vec![
        FilterDecl::new("OnPlane").arg(Selection::empty()),
        FilterDecl::new("VerticalFaces"),
    ]));
    let g1 = m.group(emptied).unwrap();
    assert!(m.warnings().iter().any(|w| w.contains("removed")));

    let kept = list(ShapeType::Face, &["Box_1_1/Top"]).with_filters(FilterSet::new(vec![
        FilterDecl::new("OnPlane").arg(face("Box_1_1/Top")),
        FilterDecl::new("VerticalFaces"),
    ]));
    let g2 = m.group(kept).unwrap();

    m.assert_valid(&g1).unwrap();
    m.assert_group_size(&g1, 1).unwrap();
    assert!(m.group_filters(&g1).unwrap().is_empty());

    m.assert_valid(&g2).unwrap();
    m.assert_group_size(&g2, 1).unwrap();
    assert_eq!(m.group_filters(&g2).unwrap(), vec!["OnPlane", "VerticalFaces"]);
}

// ── Scenario 3: Moving a group past a fuse ──────────────────────────────

#[test]
fn test_move_group_after_fuse() {
    let mut m = boxed();
    let group = m.group(list(ShapeType::Face, &["Box_1_1/Top"])).unwrap();
    m.assert_group_size(&group, 1).unwrap();

    split_and_fused(&mut m);
    // Still before the partition, the group sees the original box.
    m.assert_group_size(&group, 1).unwrap();

    m.move_after(&group, "Fuse_1").unwrap();
    m.assert_valid(&group).unwrap();
    m.assert_group_size(&group, 2).unwrap();
    assert!(m.group_names(&group).unwrap().iter().all(|n| !n.is_empty()));
}

// ── Scenario 4: Topological filters ─────────────────────────────────────

#[test]
fn test_topo_connected_faces() {
    let mut m = boxed();
    let near = list(ShapeType::Face, &["Box_1_1/Top"]).with_filters(FilterSet::new(vec![
        FilterDecl::new("TopoConnectedFaces").arg(face("Box_1_1/Top")),
    ]));
    let near = m.group(near).unwrap();
    m.assert_group_size(&near, 5).unwrap();

    let all = list(ShapeType::Face, &["Box_1_1/Top"]).with_filters(FilterSet::new(vec![
        FilterDecl::new("TopoConnectedFaces").arg(face("Box_1_1/Top")).arg(true),
    ]));
    let all = m.group(all).unwrap();
    m.assert_group_size(&all, 6).unwrap();
}

// ── Scenario 5: Colours ─────────────────────────────────────────────────

#[test]
fn test_colours_follow_compound_parts() {
    let mut m = boxed();
    m.color("Box_1_1", Color::new(0, 128, 255)).unwrap();
    m.compound(list(ShapeType::Solid, &["Box_1_1"])).unwrap();

    let part = m.current_part().unwrap().to_string();
    assert_eq!(
        m.session().result_color(&part, "Compound_1_1_1"),
        Some(Color::new(0, 128, 255))
    );
    assert_eq!(m.session().result_color(&part, "Compound_1_1"), None);
    // Faces of a re-exposed result keep their names.
    m.assert_resolves(&face("Box_1_1/Top")).unwrap();
}

// ── Scenario 6: Idempotent recompute ────────────────────────────────────

#[test]
fn test_recompute_twice_gives_same_names() {
    let mut m = boxed();
    split_and_fused(&mut m);
    let vertical = list(ShapeType::Face, &["Box_1_1/Top"])
        .with_filters(FilterSet::new(vec![FilterDecl::new("VerticalFaces")]));
    let group = m.group(vertical).unwrap();

    let names = m.names().unwrap();
    let members = m.group_names(&group).unwrap();
    m.recompute();
    assert_eq!(m.names().unwrap(), names);
    assert_eq!(m.group_names(&group).unwrap(), members);
    m.recompute();
    assert_eq!(m.names().unwrap(), names);
    assert_eq!(m.group_names(&group).unwrap(), members);
}

// ── Scenario 7: Fillet failure and repair ───────────────────────────────

#[test]
fn test_fillet_failure_is_local() {
    let mut m = boxed();
    m.box_at([20.0, 0.0, 0.0], [5.0, 5.0, 5.0]).unwrap();
    let fillet = m
        .fillet(list(ShapeType::Edge, &["[Box_1_1/Top][Box_1_1/Front]"]), "20")
        .unwrap();
    m.assert_error_contains(&fillet, "fillet failed").unwrap();
    m.assert_valid("Box_2").unwrap();
    m.assert_resolves(&solid("Box_1_1")).unwrap();

    m.set_scalar(&fillet, "radius", "1").unwrap();
    m.assert_valid(&fillet).unwrap();
    assert!(m.volume("Fillet_1_1").unwrap() < 1000.0);
}

// ── Scenario 8: Rejected edits ──────────────────────────────────────────

#[test]
fn test_forward_reference_is_rejected() {
    let mut m = boxed();
    let plane = m.plane_offset(face("Box_1_1/Top"), "5").unwrap();
    m.box_("1", "1", "1").unwrap();

    let Err(err) = m.set(&plane, "face", AttrValue::Selection(face("Box_2_1/Top"))) else {
        panic!("a later face was accepted by {plane}");
    };
    assert!(matches!(
        err,
        HarnessError::Engine(EngineError::ForwardReference { .. })
    ));
    m.assert_valid(&plane).unwrap();
    assert!(!m.session().is_operation_open());
}

// ── Scenario 9: Undo and redo ───────────────────────────────────────────

#[test]
fn test_undo_redo_parameter_change() {
    let mut m = ModelBuilder::mock();
    m.part().unwrap();
    m.parameter("a", "10").unwrap();
    m.box_("a", "a", "a").unwrap();
    m.assert_volume("Box_1_1", 1000.0, 1e-9).unwrap();

    m.set_scalar("Parameter_1", "expression", "2").unwrap();
    m.assert_volume("Box_1_1", 8.0, 1e-9).unwrap();

    m.undo().unwrap();
    m.assert_volume("Box_1_1", 1000.0, 1e-9).unwrap();
    m.redo().unwrap();
    m.assert_volume("Box_1_1", 8.0, 1e-9).unwrap();

    m.undo().unwrap().undo().unwrap();
    assert!(m.volume("Box_1_1").is_err());
}

// ── Scenario 10: Explicit operation bracket ─────────────────────────────

#[test]
fn test_bracketed_steps_undo_together() {
    let mut m = boxed();
    m.begin("two boxes");
    m.box_("1", "1", "1").unwrap();
    m.flush();
    m.box_("2", "2", "2").unwrap();
    m.commit().unwrap();
    m.assert_volume("Box_3_1", 8.0, 1e-9).unwrap();

    m.undo().unwrap();
    assert!(m.id("Box_2").is_err());
    assert!(m.id("Box_3").is_err());
    m.assert_valid("Box_1").unwrap();
}
