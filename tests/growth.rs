use tilegraph::{EdgeId, Graph, GraphError, VertexId};

#[test]
fn repeated_inserts_double_the_tile() {
    let mut graph = Graph::new();
    let mut ids: Vec<VertexId> = Vec::new();
    // slot high-water after each insert into one tile: growth relocates the
    // range and abandons the old one, so the ladder is 1, 3, 7, 7, 15
    let expected_slots = [1u64, 3, 7, 7, 15];

    for (i, &slots) in expected_slots.iter().enumerate() {
        let id = graph.add_vertex(4.8, 51.26).unwrap();
        ids.push(id);
        assert_eq!(graph.stats().vertex_slots, slots, "after insert {}", i + 1);
        for &prior in &ids {
            let coordinate = graph.try_get_vertex(prior).expect("prior id still resolves");
            assert!((coordinate.longitude - 4.8).abs() < 1e-3);
            assert!((coordinate.latitude - 51.26).abs() < 1e-3);
        }
    }

    let tile = ids[0].tile;
    let locals: Vec<u32> = ids.iter().map(|id| id.local).collect();
    assert_eq!(locals, vec![0, 1, 2, 3, 4]);
    assert!(ids.iter().all(|id| id.tile == tile));
    assert_eq!(graph.vertex_count(), 5);
    assert_eq!(graph.tile_count(), 1);
}

#[test]
fn identical_coordinates_decode_identically() {
    let mut graph = Graph::new();
    let a = graph.add_vertex(4.8, 51.26).unwrap();
    let b = graph.add_vertex(4.8, 51.26).unwrap();
    assert_ne!(a, b);
    assert_eq!(graph.try_get_vertex(a), graph.try_get_vertex(b));
}

#[test]
fn edges_survive_tile_growth() {
    let mut graph = Graph::new();
    let first = graph.add_vertex(4.8, 51.26).unwrap();
    let other = graph.add_vertex(14.8, 41.26).unwrap();
    graph.add_edge(first, other, None, None).unwrap();

    // force several doublings of first's tile
    for _ in 0..6 {
        graph.add_vertex(4.8, 51.26).unwrap();
    }

    let mut cursor = graph.edge_enumerator();
    assert!(cursor.move_to(first));
    assert!(cursor.move_next());
    assert_eq!(cursor.to(), other);
    assert!(!cursor.move_next());

    assert!(cursor.move_to(other));
    assert!(cursor.move_next());
    assert_eq!(cursor.to(), first);
}

#[test]
fn edge_ids_count_prior_successful_adds() {
    let mut graph = Graph::new();
    let a = graph.add_vertex(4.8, 51.26).unwrap();
    let b = graph.add_vertex(4.81, 51.27).unwrap();

    for i in 0..10u32 {
        let edge = graph.add_edge(a, b, None, None).unwrap();
        assert_eq!(edge, EdgeId(i));
    }

    // a failed add does not consume an id
    let missing = VertexId::new(a.tile, 9999);
    assert!(graph.add_edge(a, missing, None, None).is_err());
    assert_eq!(graph.add_edge(b, a, None, None).unwrap(), EdgeId(10));
}

#[test]
fn add_edge_rejects_unresolved_endpoints() {
    let mut graph = Graph::new();
    let a = graph.add_vertex(4.8, 51.26).unwrap();

    let bad_local = VertexId::new(a.tile, 9999);
    assert!(matches!(
        graph.add_edge(a, bad_local, None, None),
        Err(GraphError::VertexNotFound(v)) if v == bad_local
    ));

    let bad_tile = VertexId::new(tilegraph::TileId(7), 0);
    assert!(matches!(
        graph.add_edge(bad_tile, a, None, None),
        Err(GraphError::VertexNotFound(_))
    ));
}

#[test]
fn strict_accessor_reports_missing_vertices() {
    let mut graph = Graph::new();
    let a = graph.add_vertex(4.8, 51.26).unwrap();
    graph.add_vertex(4.8, 51.26).unwrap();

    assert!(graph.vertex(a).is_ok());
    // an offset beyond the tile's capacity cannot resolve
    let beyond = VertexId::new(a.tile, 5000);
    assert!(matches!(
        graph.vertex(beyond),
        Err(GraphError::VertexNotFound(_))
    ));
    assert_eq!(graph.try_get_vertex(beyond), None);
}

#[test]
fn empty_slot_inside_grown_tile_does_not_resolve() {
    let mut graph = Graph::new();
    let a = graph.add_vertex(4.8, 51.26).unwrap();
    for _ in 0..4 {
        graph.add_vertex(4.8, 51.26).unwrap();
    }
    // capacity grew to 8 with 5 slots occupied; slot 7 exists but is empty
    let empty = VertexId::new(a.tile, 7);
    assert_eq!(graph.try_get_vertex(empty), None);
    assert!(graph.vertex(empty).is_err());
}

#[test]
fn vertices_iterates_everything_once() {
    let mut graph = Graph::new();
    let mut expected = Vec::new();
    for i in 0..6 {
        let lon = 4.8 + f64::from(i) * 0.1;
        expected.push(graph.add_vertex(lon, 51.26).unwrap());
    }
    // same tile as the first insert, forcing growth
    expected.push(graph.add_vertex(4.8, 51.26).unwrap());

    let mut seen: Vec<VertexId> = graph.vertices().map(|(id, _)| id).collect();
    let mut expected_sorted = expected.clone();
    seen.sort();
    expected_sorted.sort();
    assert_eq!(seen, expected_sorted);

    for (id, coordinate) in graph.vertices() {
        assert_eq!(graph.try_get_vertex(id), Some(coordinate));
    }
}
