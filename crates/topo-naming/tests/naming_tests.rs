use std::collections::HashMap;

use geom_kernel::{Kernel, KernelIntrospect, MockKernel, ShapeId, ShapeType};
use topo_naming::{adjacency, parse_name, NameExpr, NamingTable};

fn names_of(table: &NamingTable) -> HashMap<ShapeId, String> {
    table
        .entries()
        .iter()
        .map(|e| (e.shape, e.name.to_string()))
        .collect()
}

fn split_box(kernel: &mut MockKernel) -> (NamingTable, NamingTable) {
    let body = kernel.make_box([0.0; 3], [10.0; 3]).unwrap();
    let box_table = NamingTable::derive("Box_1_1", body.shape, &body.history, &HashMap::new(), kernel).unwrap();
    let plane = kernel.make_plane([5.0, 5.0, 5.0], [1.0, 0.0, 0.0]).unwrap();
    let split = kernel.partition(&[body.shape], &[plane.shape]).unwrap();
    let mut sources = names_of(&box_table);
    sources.insert(plane.shape, "Plane_1".into());
    let piece = NamingTable::derive("Partition_1_1_1", split.parts[0], &split.history, &sources, kernel).unwrap();
    (box_table, piece)
}

#[test]
fn names_are_reproducible_across_rebuilds() {
    let (_, first) = split_box(&mut MockKernel::new());
    let (_, second) = split_box(&mut MockKernel::new());
    let a: Vec<String> = first.entries().iter().map(|e| e.name.to_string()).collect();
    let b: Vec<String> = second.entries().iter().map(|e| e.name.to_string()).collect();
    assert_eq!(a, b);
}

#[test]
fn adjacency_names_resolve_back_to_their_shape() {
    let mut kernel = MockKernel::new();
    let (_, piece) = split_box(&mut kernel);
    for entry in piece.entries() {
        if entry.shape_type != ShapeType::Vertex && entry.shape_type != ShapeType::Edge {
            continue;
        }
        let text = entry.name.to_string();
        let parsed = parse_name(&text).unwrap();
        let NameExpr::Adjacency { items, weak } = parsed.expr else {
            continue;
        };
        let sets: Vec<Vec<ShapeId>> = items
            .iter()
            .map(|item| piece.shape_of(item).into_iter().collect())
            .collect();
        let root = piece.shape_of("Partition_1_1_1").unwrap();
        let found = adjacency::intersect(&kernel, &[root], &sets, entry.shape_type).unwrap();
        assert_eq!(adjacency::pick(&found, weak), Some(entry.shape), "{text}");
    }
}

#[test]
fn untouched_face_keeps_its_original_name() {
    let mut kernel = MockKernel::new();
    let (box_table, piece) = split_box(&mut kernel);
    let left = box_table.shape_of("Box_1_1/Left").unwrap();
    assert_eq!(piece.shape_of("Box_1_1/Left"), Some(left));
    assert_eq!(kernel.shape_type(left).unwrap(), ShapeType::Face);
}
