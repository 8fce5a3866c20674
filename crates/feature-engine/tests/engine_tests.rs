use approx::assert_relative_eq;
use feature_engine::*;
use geom_kernel::{Profile, ShapeType};
use shape_types::{Color, FilterDecl, FilterSet, Selection};

const PART: &str = "Part_1";

fn face(name: &str) -> Selection {
    Selection::new(ShapeType::Face, name)
}

fn solid(name: &str) -> Selection {
    Selection::new(ShapeType::Solid, name)
}

fn box_attrs(size: f64) -> AttributeStore {
    AttributeStore::new()
        .with("dx", AttrValue::scalar(size))
        .with("dy", AttrValue::scalar(size))
        .with("dz", AttrValue::scalar(size))
}

fn group_attrs(list: SelectionList) -> AttributeStore {
    AttributeStore::new().with(GROUP_LIST, AttrValue::SelectionList(list))
}

fn faces(items: &[&str]) -> SelectionList {
    SelectionList::new(ShapeType::Face, items.iter().map(|n| face(n)).collect())
}

/// A session with one active part.
fn session_with_part() -> Session {
    let mut session = Session::with_mock(EngineConfig::default());
    session.start_operation("part");
    session.add_part().unwrap();
    session.finish_operation().unwrap();
    session
}

fn add(session: &mut Session, kind: &str, attrs: AttributeStore) -> FeatureId {
    session.start_operation(kind);
    let id = session.add_feature(PART, kind, attrs).unwrap();
    session.finish_operation().unwrap();
    id
}

/// Box_1 split in two by the mid-plane of its Left and Right faces.
fn partitioned_box(session: &mut Session) -> (FeatureId, FeatureId) {
    add(session, "Box", box_attrs(10.0));
    let plane = AttributeStore::new()
        .with("face", AttrValue::Selection(face("Box_1_1/Left")))
        .with("other", AttrValue::Selection(face("Box_1_1/Right")));
    add(session, "Plane", plane);
    let partition = AttributeStore::new()
        .with(
            "base",
            AttrValue::SelectionList(SelectionList::new(ShapeType::Solid, vec![solid("Box_1_1")])),
        )
        .with("tools", AttrValue::SelectionList(faces(&["Plane_1"])));
    let partition = add(session, "Partition", partition);
    let fuse = AttributeStore::new().with(
        "base",
        AttrValue::SelectionList(SelectionList::new(
            ShapeType::Solid,
            vec![solid("Partition_1_1_2"), solid("Partition_1_1_1")],
        )),
    );
    let fuse = add(session, "Fuse", fuse);
    (partition, fuse)
}

// ── Naming and resolution ───────────────────────────────────────────────

#[test]
fn box_faces_resolve_by_label() {
    let mut session = session_with_part();
    let id = add(&mut session, "Box", box_attrs(10.0));
    assert!(session.validate(id), "{}", session.error(id));
    assert_eq!(session.error(id), "");

    let top = session.resolve(PART, &face("Box_1_1/Top")).unwrap();
    assert_eq!(top.shape_type, ShapeType::Face);
    assert_eq!(top.name, "Box_1_1/Top");
    assert_eq!(top.result, "Box_1_1");
    assert_relative_eq!(session.volume(PART, "Box_1_1").unwrap(), 1000.0);
    assert_eq!(session.sub_shape_count(PART, "Box_1_1", ShapeType::Face).unwrap(), 6);
    assert_eq!(session.sub_shape_count(PART, "Box_1_1", ShapeType::Edge).unwrap(), 12);
}

#[test]
fn resolving_twice_gives_the_same_shape() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let edge = Selection::new(ShapeType::Edge, "[Box_1_1/Top][Box_1_1/Front]");
    let first = session.resolve(PART, &edge).unwrap();
    let second = session.resolve(PART, &edge).unwrap();
    assert_eq!(first.shape, second.shape);
    assert_eq!(first.shape_type, ShapeType::Edge);
}

#[test]
fn adjacency_name_lists_one_edge() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let edge = Selection::new(ShapeType::Edge, "[Box_1_1/Top][Box_1_1/Front]");
    let all = session.resolve_all(PART, &edge).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].shape, session.resolve(PART, &edge).unwrap().shape);

    let apart = Selection::new(ShapeType::Edge, "[Box_1_1/Top][Box_1_1/Bottom]");
    assert!(session.resolve_all(PART, &apart).is_err());
}

#[test]
fn wrong_shape_type_is_unresolved() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let err = session
        .resolve(PART, &Selection::new(ShapeType::Edge, "Box_1_1/Top"))
        .unwrap_err();
    match err {
        EngineError::Unresolved(u) => {
            assert!(matches!(u.reason, UnresolvedReason::WrongType { .. }), "{u}");
            assert_eq!(u.name, "Box_1_1/Top");
        }
        other => panic!("expected an unresolved selection, got {other}"),
    }
}

#[test]
fn unknown_result_is_not_found() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let err = session.resolve(PART, &face("Box_7_1/Top")).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Unresolved(Unresolved {
            reason: UnresolvedReason::NotFound(_),
            ..
        })
    ));
}

#[test]
fn part_set_planes_are_visible_from_parts() {
    let session = session_with_part();
    let plane = session.resolve(PART, &face("PartSet/XOY")).unwrap();
    assert_eq!(plane.shape_type, ShapeType::Face);
}

#[test]
fn partition_pieces_are_sub_results() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let plane = AttributeStore::new()
        .with("face", AttrValue::Selection(face("Box_1_1/Left")))
        .with("other", AttrValue::Selection(face("Box_1_1/Right")));
    add(&mut session, "Plane", plane);
    let partition = AttributeStore::new()
        .with(
            "base",
            AttrValue::SelectionList(SelectionList::new(ShapeType::Solid, vec![solid("Box_1_1")])),
        )
        .with("tools", AttrValue::SelectionList(faces(&["Plane_1"])));
    let id = add(&mut session, "Partition", partition);
    assert!(session.validate(id), "{}", session.error(id));

    let results = session.results(id);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Partition_1_1");
    let parts: Vec<&str> = results[0].parts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(parts, vec!["Partition_1_1_1", "Partition_1_1_2"]);
    assert_relative_eq!(session.volume(PART, "Partition_1_1_2").unwrap(), 500.0);

    // Untouched faces keep their name, split faces get a composite one.
    assert!(session.resolve(PART, &face("Box_1_1/Right")).is_ok());
    let split = session
        .resolve(PART, &face("Partition_1_1_2/Modified_Face&Box_1_1/Front"))
        .unwrap();
    assert_eq!(split.result, "Partition_1_1_2");
}

#[test]
fn consumed_results_are_concealed() {
    let mut session = session_with_part();
    let (_, fuse) = partitioned_box(&mut session);
    assert!(session.validate(fuse), "{}", session.error(fuse));
    assert_eq!(session.visible_results(PART).unwrap(), vec!["Fuse_1_1".to_string()]);
    assert_relative_eq!(session.volume(PART, "Fuse_1_1").unwrap(), 1000.0);
    assert_eq!(session.sub_shape_count(PART, "Fuse_1_1", ShapeType::Face).unwrap(), 10);
}

#[test]
fn consumed_face_resolves_to_its_survivors() {
    let mut session = session_with_part();
    partitioned_box(&mut session);
    assert!(matches!(
        session.resolve(PART, &face("Box_1_1/Top")),
        Err(EngineError::Unresolved(Unresolved {
            reason: UnresolvedReason::Ambiguous(2),
            ..
        }))
    ));
    let halves = session.resolve_all(PART, &face("Box_1_1/Top")).unwrap();
    assert_eq!(halves.len(), 2);
    assert!(halves.iter().all(|h| h.result == "Fuse_1_1" && !h.name.is_empty()));
}

// ── Groups ──────────────────────────────────────────────────────────────

#[test]
fn group_lists_selections_in_order() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let group = add(
        &mut session,
        "Group",
        group_attrs(faces(&["Box_1_1/Top", "Box_1_1/Front", "Box_1_1/Top"])),
    );
    let names: Vec<&str> = session
        .group_members(group)
        .unwrap()
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(names, vec!["Box_1_1/Top", "Box_1_1/Front"]);
}

#[test]
fn group_filter_adds_matching_faces() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let list = faces(&["Box_1_1/Top"]).with_filters(FilterSet::new(vec![FilterDecl::new("VerticalFaces")]));
    let group = add(&mut session, "Group", group_attrs(list));
    assert!(session.validate(group), "{}", session.error(group));
    assert_eq!(session.group_size(group).unwrap(), 5);
    assert_eq!(session.group_filters(group).unwrap(), vec!["VerticalFaces".to_string()]);
}

#[test]
fn empty_filter_argument_removes_the_filter_set() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let list = faces(&["Box_1_1/Top"]).with_filters(FilterSet::new(vec![
        FilterDecl::new("OnPlane").arg(Selection::empty()),
        FilterDecl::new("VerticalFaces"),
    ]));
    session.start_operation("group");
    let group = session.add_feature(PART, "Group", group_attrs(list)).unwrap();
    assert!(session.warnings().iter().any(|w| w.contains("removed")));
    session.finish_operation().unwrap();

    assert!(session.validate(group));
    assert_eq!(session.group_size(group).unwrap(), 1);
    assert!(session.group_filters(group).unwrap().is_empty());
}

#[test]
fn unresolvable_filter_argument_drops_only_that_filter() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let list = faces(&["Box_1_1/Top"]).with_filters(FilterSet::new(vec![
        FilterDecl::new("OnPlane").arg(face("Box_1_1/Nowhere")),
        FilterDecl::new("VerticalFaces"),
    ]));
    let group = add(&mut session, "Group", group_attrs(list));
    assert!(session.validate(group), "{}", session.error(group));
    assert_eq!(session.dropped_filters(group).unwrap(), ["OnPlane".to_string()]);
    assert_eq!(session.group_filters(group).unwrap().len(), 2);
    assert_eq!(session.group_size(group).unwrap(), 5);
}

#[test]
fn nested_filter_selects_edges_of_accepted_faces() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let list = SelectionList::new(ShapeType::Edge, Vec::new()).with_filters(FilterSet::new(vec![
        FilterDecl::new("BelongsTo").arg((ShapeType::Face, FilterDecl::new("HorizontalFaces"))),
    ]));
    let group = add(&mut session, "Group", group_attrs(list));
    assert!(session.validate(group), "{}", session.error(group));
    assert_eq!(session.group_size(group).unwrap(), 8);
    assert!(session.dropped_filters(group).unwrap().is_empty());

    let inner = FilterDecl::new("OnPlane").arg(face("Box_1_1/Nowhere"));
    let list = SelectionList::new(ShapeType::Edge, Vec::new()).with_filters(FilterSet::new(vec![
        FilterDecl::new("BelongsTo").arg((ShapeType::Face, inner)),
    ]));
    let group = add(&mut session, "Group", group_attrs(list));
    assert!(session.validate(group), "{}", session.error(group));
    assert_eq!(session.dropped_filters(group).unwrap(), ["BelongsTo".to_string()]);
    assert_eq!(session.group_size(group).unwrap(), 0);
}

#[test]
fn group_queries_reject_other_kinds() {
    let mut session = session_with_part();
    let id = add(&mut session, "Box", box_attrs(10.0));
    assert!(matches!(session.group_size(id), Err(EngineError::WrongKind { .. })));
}

#[test]
fn moved_group_sees_the_fused_shape() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let group = add(&mut session, "Group", group_attrs(faces(&["Box_1_1/Top"])));
    assert_eq!(session.group_size(group).unwrap(), 1);

    let plane = AttributeStore::new()
        .with("face", AttrValue::Selection(face("Box_1_1/Left")))
        .with("other", AttrValue::Selection(face("Box_1_1/Right")));
    add(&mut session, "Plane", plane);
    let partition = AttributeStore::new()
        .with(
            "base",
            AttrValue::SelectionList(SelectionList::new(ShapeType::Solid, vec![solid("Box_1_1")])),
        )
        .with("tools", AttrValue::SelectionList(faces(&["Plane_1"])));
    add(&mut session, "Partition", partition);
    let fuse = AttributeStore::new().with(
        "base",
        AttrValue::SelectionList(SelectionList::new(
            ShapeType::Solid,
            vec![solid("Partition_1_1_2"), solid("Partition_1_1_1")],
        )),
    );
    let fuse = add(&mut session, "Fuse", fuse);

    session.start_operation("move");
    session.move_feature(group, Some(fuse)).unwrap();
    session.finish_operation().unwrap();

    let features: Vec<&str> = session
        .model()
        .document(PART)
        .unwrap()
        .features
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(features.last(), Some(&"Group_1"));
    assert!(session.validate(group), "{}", session.error(group));
    let members = session.group_members(group).unwrap();
    assert_eq!(members.len(), 2);
    assert!(members
        .iter()
        .all(|m| m.shape_type == ShapeType::Face && !m.name.is_empty()));
}

// ── Failures ────────────────────────────────────────────────────────────

#[test]
fn fillet_failure_stays_local() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let other = add(&mut session, "Box", box_attrs(5.0));
    let fillet = AttributeStore::new()
        .with(
            "base",
            AttrValue::SelectionList(SelectionList::new(
                ShapeType::Edge,
                vec![Selection::new(ShapeType::Edge, "[Box_1_1/Top][Box_1_1/Front]")],
            )),
        )
        .with("radius", AttrValue::scalar(20));
    let fillet = add(&mut session, "Fillet", fillet);
    let dependent = AttributeStore::new().with(
        "base",
        AttrValue::SelectionList(SelectionList::new(ShapeType::Solid, vec![solid("Fillet_1_1")])),
    );
    let dependent = add(&mut session, "Compound", dependent);

    assert!(!session.validate(fillet));
    assert!(!session.error(fillet).is_empty());
    assert!(session.error(dependent).contains("Fillet_1"), "{}", session.error(dependent));
    assert!(session.validate(other));
    // The failed fillet consumed nothing.
    assert!(session.visible_results(PART).unwrap().contains(&"Box_1_1".to_string()));
}

#[test]
fn fixing_the_radius_recovers_the_fillet() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let attrs = AttributeStore::new()
        .with(
            "base",
            AttrValue::SelectionList(SelectionList::new(
                ShapeType::Edge,
                vec![Selection::new(ShapeType::Edge, "[Box_1_1/Top][Box_1_1/Front]")],
            )),
        )
        .with("radius", AttrValue::scalar(0));
    let fillet = add(&mut session, "Fillet", attrs);
    assert!(!session.validate(fillet));

    session.start_operation("radius");
    session.set_attribute(fillet, "radius", AttrValue::scalar(1)).unwrap();
    session.finish_operation().unwrap();
    assert!(session.validate(fillet), "{}", session.error(fillet));
    assert!(session.volume(PART, "Fillet_1_1").unwrap() < 1000.0);
}

#[test]
fn forward_references_are_rejected() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    let group = add(&mut session, "Group", group_attrs(faces(&["Box_1_1/Top"])));
    add(&mut session, "Box", box_attrs(5.0));

    session.start_operation("edit");
    let err = session
        .set_attribute(
            group,
            GROUP_LIST,
            AttrValue::SelectionList(faces(&["Box_2_1/Top"])),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ForwardReference { .. }), "{err}");
    session.finish_operation().unwrap();

    let list = session.feature(group).unwrap().attributes.selection_list(GROUP_LIST).unwrap();
    assert_eq!(list.items[0].name, "Box_1_1/Top");
    assert!(!session.can_redo());
}

#[test]
fn attribute_errors_are_synchronous() {
    let mut session = session_with_part();
    session.start_operation("bad");
    let err = session
        .add_feature(PART, "Box", AttributeStore::new().with("colour", AttrValue::scalar(1)))
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownAttribute { .. }));
    let err = session
        .add_feature(PART, "Box", AttributeStore::new().with("dx", AttrValue::Bool(true)))
        .unwrap_err();
    assert!(matches!(err, EngineError::AttributeType { .. }));
    let err = session.add_feature(PART, "Teapot", AttributeStore::new()).unwrap_err();
    assert!(matches!(err, EngineError::UnknownKind { .. }));
    session.finish_operation().unwrap();
    assert!(session.model().document(PART).unwrap().features.is_empty());
}

#[test]
fn removing_a_referenced_feature_fails() {
    let mut session = session_with_part();
    let boxed = add(&mut session, "Box", box_attrs(10.0));
    let group = add(&mut session, "Group", group_attrs(faces(&["Box_1_1/Top"])));

    session.start_operation("remove");
    let err = session.remove_feature(boxed).unwrap_err();
    assert!(matches!(err, EngineError::HasDependents { .. }));
    session.remove_feature(group).unwrap();
    session.remove_feature(boxed).unwrap();
    session.finish_operation().unwrap();
    assert!(session.model().document(PART).unwrap().features.is_empty());
}

// ── Parameters and recompute ────────────────────────────────────────────

#[test]
fn parameter_edit_recomputes_dependents() {
    let mut session = session_with_part();
    let height = add(
        &mut session,
        "Parameter",
        AttributeStore::new()
            .with("variable", AttrValue::Text("h".into()))
            .with("expression", AttrValue::scalar(10)),
    );
    add(
        &mut session,
        "Box",
        AttributeStore::new()
            .with("dx", AttrValue::scalar(10))
            .with("dy", AttrValue::scalar(10))
            .with("dz", AttrValue::scalar("h * 2")),
    );
    assert_relative_eq!(session.volume(PART, "Box_1_1").unwrap(), 2000.0);

    session.start_operation("h");
    session.set_attribute(height, "expression", AttrValue::scalar(5)).unwrap();
    let summary = session.finish_operation().unwrap();
    assert_eq!(summary.executed, 2);
    assert_relative_eq!(session.volume(PART, "Box_1_1").unwrap(), 1000.0);
}

#[test]
fn recompute_is_idempotent() {
    let mut session = session_with_part();
    partitioned_box(&mut session);
    let list = faces(&["Box_1_1/Top"]).with_filters(FilterSet::new(vec![FilterDecl::new("VerticalFaces")]));
    let group = add(&mut session, "Group", group_attrs(list));

    let names = |s: &Session| -> Vec<String> {
        s.group_members(group)
            .unwrap()
            .iter()
            .map(|m| m.name.clone())
            .collect()
    };
    let before = names(&session);
    session.recompute_all();
    let once = names(&session);
    session.recompute_all();
    assert_eq!(before, once);
    assert_eq!(once, names(&session));
    assert_eq!(before.len(), 2 + 6);
}

#[test]
fn nothing_dirty_means_nothing_runs() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    assert_eq!(session.flush(), RebuildSummary::default());
}

// ── History control ─────────────────────────────────────────────────────

#[test]
fn undo_and_redo_restore_the_model() {
    let mut session = session_with_part();
    let id = add(&mut session, "Box", box_attrs(10.0));

    session.undo().unwrap();
    assert!(session.model().document(PART).unwrap().features.is_empty());
    assert!(session.result(PART, "Box_1_1").is_err());
    assert!(session.can_redo());

    session.redo().unwrap();
    assert!(session.validate(id));
    assert_relative_eq!(session.volume(PART, "Box_1_1").unwrap(), 1000.0);
    assert!(!session.can_redo());
}

#[test]
fn new_operation_clears_redo() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    session.undo().unwrap();
    add(&mut session, "Box", box_attrs(5.0));
    assert!(!session.can_redo());
    assert!(matches!(session.redo(), Err(EngineError::NothingToRedo)));
}

#[test]
fn undo_limit_bounds_history() {
    let mut session = Session::with_mock(EngineConfig::default().with_undo_limit(1));
    session.start_operation("part");
    session.add_part().unwrap();
    session.finish_operation().unwrap();
    add(&mut session, "Box", box_attrs(1.0));
    session.undo().unwrap();
    assert!(matches!(session.undo(), Err(EngineError::NothingToUndo)));
}

#[test]
fn rollback_disables_later_features() {
    let mut session = session_with_part();
    let first = add(&mut session, "Box", box_attrs(10.0));
    let second = add(&mut session, "Box", box_attrs(5.0));

    session.start_operation("rollback");
    session.set_current(PART, Some(first)).unwrap();
    session.finish_operation().unwrap();
    assert_eq!(session.status(second), FeatureStatus::Disabled);
    assert!(session.result(PART, "Box_2_1").is_err());

    // New features go right after the current one.
    let third = add(&mut session, "Box", box_attrs(2.0));
    let order: Vec<FeatureId> = session
        .model()
        .document(PART)
        .unwrap()
        .features
        .iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(order, vec![first, third, second]);

    session.start_operation("restore");
    session.set_current(PART, None).unwrap();
    session.finish_operation().unwrap();
    assert!(session.validate(second));
}

#[test]
fn suppressed_feature_is_disabled() {
    let mut session = session_with_part();
    let id = add(&mut session, "Box", box_attrs(10.0));
    session.start_operation("suppress");
    session.set_suppressed(id, true).unwrap();
    session.finish_operation().unwrap();
    assert_eq!(session.status(id), FeatureStatus::Disabled);
    assert!(session.resolve(PART, &face("Box_1_1/Top")).is_err());
}

#[test]
fn rename_rewrites_selections() {
    let mut session = session_with_part();
    let boxed = add(&mut session, "Box", box_attrs(10.0));
    let group = add(&mut session, "Group", group_attrs(faces(&["Box_1_1/Top"])));

    session.start_operation("rename");
    session.rename_feature(boxed, "Block").unwrap();
    session.finish_operation().unwrap();

    let list = session.feature(group).unwrap().attributes.selection_list(GROUP_LIST).unwrap();
    assert_eq!(list.items[0].name, "Block_1/Top");
    assert!(session.validate(group), "{}", session.error(group));
    assert_eq!(session.group_members(group).unwrap()[0].name, "Block_1/Top");
}

#[test]
fn rename_to_an_existing_name_fails() {
    let mut session = session_with_part();
    let first = add(&mut session, "Box", box_attrs(10.0));
    add(&mut session, "Box", box_attrs(5.0));
    session.start_operation("rename");
    assert!(matches!(
        session.rename_feature(first, "Box_2"),
        Err(EngineError::DuplicateName { .. })
    ));
    session.abort_operation().unwrap();
}

#[test]
fn move_up_breaks_selections_of_later_results() {
    let mut session = session_with_part();
    let first = add(&mut session, "Box", box_attrs(10.0));
    add(&mut session, "Box", box_attrs(5.0));
    let group = add(&mut session, "Group", group_attrs(faces(&["Box_2_1/Top"])));

    session.start_operation("move");
    session.move_feature(group, Some(first)).unwrap();
    session.finish_operation().unwrap();
    assert!(!session.validate(group));
    assert!(session.error(group).contains("Box_2_1/Top"), "{}", session.error(group));
}

#[test]
fn move_up_breaks_filtered_groups_too() {
    let mut session = session_with_part();
    let first = add(&mut session, "Box", box_attrs(10.0));
    add(
        &mut session,
        "Box",
        box_attrs(5.0).with("x", AttrValue::scalar(20)),
    );
    let list = faces(&["Box_2_1/Top"]).with_filters(FilterSet::new(vec![FilterDecl::new("VerticalFaces")]));
    let group = add(&mut session, "Group", group_attrs(list));
    assert!(session.validate(group), "{}", session.error(group));
    assert_eq!(session.group_size(group).unwrap(), 9);

    session.start_operation("move");
    session.move_feature(group, Some(first)).unwrap();
    session.finish_operation().unwrap();
    assert!(!session.validate(group));
    assert!(session.error(group).contains("Box_2_1"), "{}", session.error(group));
}

// ── Parts and metadata ──────────────────────────────────────────────────

#[test]
fn deactivated_part_does_not_resolve() {
    let mut session = session_with_part();
    let id = add(&mut session, "Box", box_attrs(10.0));

    session.activate(PART, false).unwrap();
    assert!(!session.is_active(PART));
    assert_eq!(session.status(id), FeatureStatus::NotComputed);
    let err = session.resolve(PART, &face("Box_1_1/Top")).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Unresolved(Unresolved {
            reason: UnresolvedReason::PartDeactivated(_),
            ..
        })
    ));

    session.activate(PART, true).unwrap();
    assert!(session.validate(id));
    assert!(session.resolve(PART, &face("Box_1_1/Top")).is_ok());
}

#[test]
fn colours_are_inherited_by_compound_parts() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    add(
        &mut session,
        "Box",
        AttributeStore::new()
            .with("x", AttrValue::scalar(20))
            .with("dx", AttrValue::scalar(5))
            .with("dy", AttrValue::scalar(5))
            .with("dz", AttrValue::scalar(5)),
    );
    let red = Color::new(255, 0, 0);
    session.start_operation("colour");
    session.set_result_color(PART, "Box_1_1", red).unwrap();
    session
        .set_sub_shape_color(PART, "Box_1_1", face("Box_1_1/Top"), Color::new(0, 0, 255))
        .unwrap();
    session.finish_operation().unwrap();

    let compound = AttributeStore::new().with(
        "base",
        AttrValue::SelectionList(SelectionList::new(
            ShapeType::Solid,
            vec![solid("Box_1_1"), solid("Box_2_1")],
        )),
    );
    add(&mut session, "Compound", compound);
    assert_eq!(session.result_color(PART, "Compound_1_1_1"), Some(red));
    assert_eq!(session.result_color(PART, "Compound_1_1_2"), None);
    assert_eq!(
        session.sub_shape_color(PART, &face("Box_1_1/Top")),
        Some(Color::new(0, 0, 255))
    );
    assert_eq!(session.sub_shape_color(PART, &face("Box_1_1/Bottom")), None);
}

#[test]
fn metadata_edits_need_an_existing_result() {
    let mut session = session_with_part();
    session.start_operation("colour");
    assert!(matches!(
        session.set_result_color(PART, "Box_1_1", Color::new(1, 2, 3)),
        Err(EngineError::ResultNotFound { .. })
    ));
    session.finish_operation().unwrap();
}

#[test]
fn sketch_regions_extrude_into_sub_results() {
    let mut session = session_with_part();
    let regions = vec![
        Region::new(
            "Square",
            Profile::Polygon {
                points: vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]],
            },
        ),
        Region::new(
            "Disk",
            Profile::Circle {
                center: [5.0, 0.0],
                radius: 1.0,
            },
        ),
    ];
    let sketch = AttributeStore::new()
        .with("plane", AttrValue::Selection(face("PartSet/XOY")))
        .with("regions", AttrValue::Regions(regions));
    let sketch = add(&mut session, "Sketch", sketch);
    assert!(session.validate(sketch), "{}", session.error(sketch));
    assert!(session.resolve(PART, &face("Sketch_1/Face-Square")).is_ok());

    let extrusion = AttributeStore::new()
        .with(
            "base",
            AttrValue::SelectionList(SelectionList::new(
                ShapeType::Compound,
                vec![Selection::new(ShapeType::Compound, "Sketch_1")],
            )),
        )
        .with("size", AttrValue::scalar(3));
    let extrusion = add(&mut session, "Extrusion", extrusion);
    assert!(session.validate(extrusion), "{}", session.error(extrusion));
    assert_relative_eq!(session.volume(PART, "Extrusion_1_1_1").unwrap(), 12.0);
    assert_relative_eq!(
        session.volume(PART, "Extrusion_1_1_2").unwrap(),
        3.0 * std::f64::consts::PI,
        epsilon = 1e-9
    );
    let top = session.resolve(PART, &face("Extrusion_1_1_1/To_Face")).unwrap();
    assert_eq!(top.result, "Extrusion_1_1_1");
    assert!(session
        .resolve(PART, &face("Extrusion_1_1_1/Generated_Face&Sketch_1/Square_1"))
        .is_ok());
}

#[test]
fn area_history_flag_and_teardown() {
    let mut session = session_with_part();
    add(&mut session, "Box", box_attrs(10.0));
    assert_relative_eq!(session.area(PART, "Box_1_1").unwrap(), 600.0);

    let root = session.model().root();
    let shown: Vec<&str> = root.history().map(|f| f.name.as_str()).collect();
    assert_eq!(shown, vec!["Part_1"]);
    let part = session.feature_id("PartSet", "Part_1").unwrap();
    session.start_operation("hide");
    session.set_in_history(part, false).unwrap();
    session.finish_operation().unwrap();
    assert_eq!(session.model().root().history().count(), 0);

    session.close_all();
    assert_eq!(session.model().documents.len(), 1);
    assert!(!session.can_undo());
    assert!(session.feature_id("PartSet", "XOY").is_ok());
    assert!(session.volume(PART, "Box_1_1").is_err());
}
