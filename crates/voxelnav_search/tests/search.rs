use std::{sync::Arc, time::Duration};

use glam::Vec3A;
use voxelnav::{
    Aabb3d, GraphUpdate, NavmeshConfig, NavmeshConfigBuilder, NavmeshGraph, NavmeshInput, NodeId,
    TriMesh,
};
use voxelnav_search::{
    PathResult, Search, SearchError, SearchOptions, SearchOutput, SearchPolicy, SearchQueue,
    run_to_completion,
};

fn quad(min_x: f32, min_z: f32, max_x: f32, max_z: f32) -> TriMesh {
    TriMesh::from_arrays(
        &[
            [min_x, 0.0, min_z],
            [min_x, 0.0, max_z],
            [max_x, 0.0, max_z],
            [max_x, 0.0, min_z],
        ],
        &[0, 1, 2, 0, 2, 3],
    )
}

fn config() -> NavmeshConfig {
    NavmeshConfigBuilder {
        character_radius: 0.0,
        max_edge_length: 100.0,
        bounds: Aabb3d::from_center_size([5.0, 0.0, 5.0], [10.0, 2.0, 10.0]),
        ..Default::default()
    }
    .build()
    .unwrap()
}

/// A 10 by 10 floor with a 2 by 2 hole in its center.
fn floor_with_hole() -> NavmeshGraph {
    let input = NavmeshInput {
        meshes: vec![
            quad(0.0, 0.0, 4.0, 10.0),
            quad(6.0, 0.0, 10.0, 10.0),
            quad(4.0, 0.0, 6.0, 4.0),
            quad(4.0, 6.0, 6.0, 10.0),
        ],
        terrain: None,
    };
    let mut graph = NavmeshGraph::new();
    graph.scan(input, config()).unwrap();
    graph
}

/// Two floors with a gap between them.
fn two_islands() -> NavmeshGraph {
    let input = NavmeshInput {
        meshes: vec![quad(0.0, 0.0, 4.0, 10.0), quad(6.0, 0.0, 10.0, 10.0)],
        terrain: None,
    };
    let mut graph = NavmeshGraph::new();
    graph.scan(input, config()).unwrap();
    graph
}

fn path(graph: &NavmeshGraph, policy: SearchPolicy<NodeId>) -> Result<PathResult<NodeId>, SearchError> {
    let mut search = Search::new(policy, SearchOptions::default());
    run_to_completion(&mut search, graph).map(|output| output.into_path().unwrap())
}

fn flood(graph: &NavmeshGraph, start: Vec3A) -> Arc<voxelnav_search::FloodField<NodeId>> {
    let mut search = Search::new(SearchPolicy::Flood { start }, SearchOptions::default());
    match run_to_completion(&mut search, graph).unwrap() {
        SearchOutput::Flood(flood) => flood,
        SearchOutput::Path(_) => panic!("A flood produced a path"),
    }
}

#[test]
fn shortest_path_walks_around_the_hole() {
    let graph = floor_with_hole();
    let start = Vec3A::new(1.0, 0.0, 5.0);
    let end = Vec3A::new(9.0, 0.0, 5.0);
    let path = path(&graph, SearchPolicy::Shortest { start, end }).unwrap();

    assert_eq!(path.positions.first(), Some(&start));
    assert_eq!(path.positions.last(), Some(&end));
    assert!(path.length() > 8.0);
    assert!(path.length() < 12.0);
    let inside_hole = |p: Vec3A| (4.6..5.4).contains(&p.x) && (4.6..5.4).contains(&p.z);
    for segment in path.positions.windows(2) {
        for i in 0..=20 {
            let point = segment[0].lerp(segment[1], i as f32 / 20.0);
            assert!(!inside_hole(point), "Path crosses the hole at {point}");
        }
    }
}

#[test]
fn shortest_path_is_idempotent_on_a_navmesh() {
    let graph = floor_with_hole();
    let policy = SearchPolicy::Shortest {
        start: Vec3A::new(0.5, 0.0, 0.5),
        end: Vec3A::new(9.5, 0.0, 9.5),
    };
    let first = path(&graph, policy.clone()).unwrap();
    let second = path(&graph, policy).unwrap();
    assert_eq!(first, second);
}

#[test]
fn flood_trace_matches_the_parent_chain() {
    let graph = floor_with_hole();
    let origin = Vec3A::new(1.0, 0.0, 1.0);
    let flood = flood(&graph, origin);
    assert_eq!(flood.len(), graph.node_count());

    for target in [Vec3A::new(9.0, 0.0, 9.0), Vec3A::new(5.0, 0.0, 8.0)] {
        let traced = path(
            &graph,
            SearchPolicy::FloodTrace {
                start: target,
                flood: Arc::clone(&flood),
            },
        )
        .unwrap();
        assert_eq!(traced.end(), Some(&flood.origin()));
        assert_eq!(traced.positions.last(), Some(&origin));
        for pair in traced.nodes.windows(2) {
            assert_eq!(flood.parent(pair[0]), Some(pair[1]));
            assert!(flood.cost(pair[0]) > flood.cost(pair[1]));
        }
    }
}

#[test]
fn updating_the_graph_invalidates_floods() {
    let mut graph = floor_with_hole();
    let flood = flood(&graph, Vec3A::new(1.0, 0.0, 1.0));
    graph
        .update_area(&GraphUpdate {
            bounds: Aabb3d::from_center_size([8.0, 0.0, 8.0], [1.0, 2.0, 1.0]),
            add_penalty: 100,
            ..Default::default()
        })
        .unwrap();
    let traced = path(
        &graph,
        SearchPolicy::FloodTrace {
            start: Vec3A::new(9.0, 0.0, 9.0),
            flood,
        },
    );
    assert!(matches!(traced, Err(SearchError::StaleFlood { .. })));
}

#[test]
fn editing_a_node_invalidates_floods() {
    let mut graph = floor_with_hole();
    let flood = flood(&graph, Vec3A::new(1.0, 0.0, 1.0));
    let start = Vec3A::new(9.0, 0.0, 9.0);
    let traced = path(
        &graph,
        SearchPolicy::FloodTrace {
            start,
            flood: Arc::clone(&flood),
        },
    )
    .unwrap();
    let middle = traced.nodes[traced.nodes.len() / 2];

    *graph.node_mut(middle).unwrap().walkable = false;
    assert_eq!(
        path(&graph, SearchPolicy::FloodTrace { start, flood }),
        Err(SearchError::StaleFlood {
            flood: 1,
            graph: 2
        })
    );
}

#[test]
fn separate_islands_have_no_path() {
    let graph = two_islands();
    let start = Vec3A::new(1.0, 0.0, 5.0);
    let end = Vec3A::new(9.0, 0.0, 5.0);
    assert_eq!(
        path(&graph, SearchPolicy::Shortest { start, end }),
        Err(SearchError::NoPath)
    );

    let flood = flood(&graph, start);
    assert_eq!(
        path(&graph, SearchPolicy::FloodTrace { start: end, flood }),
        Err(SearchError::NoPath)
    );
}

#[test]
fn unwalkable_nodes_are_avoided() {
    let mut graph = two_islands();
    let start = Vec3A::new(1.0, 0.0, 5.0);
    graph
        .update_area(&GraphUpdate {
            bounds: Aabb3d::from_center_size([2.0, 0.0, 5.0], [6.0, 2.0, 12.0]),
            set_walkable: Some(false),
            ..Default::default()
        })
        .unwrap();
    let random = path(&graph, SearchPolicy::random(start, 1000));
    assert_eq!(random, Err(SearchError::StartNotWalkable));
}

#[test]
fn queued_searches_share_a_locked_graph() {
    let shared = floor_with_hole().into_shared();
    let mut queue = SearchQueue::new();
    let options = SearchOptions::default().with_max_expansions_per_step(1);
    let ids = [
        queue.submit(Search::new(
            SearchPolicy::Shortest {
                start: Vec3A::new(1.0, 0.0, 1.0),
                end: Vec3A::new(9.0, 0.0, 9.0),
            },
            options.clone(),
        )),
        queue.submit(Search::new(
            SearchPolicy::flee(Vec3A::new(5.0, 0.0, 1.0), Vec3A::new(5.0, 0.0, 0.0), 3000),
            options.clone(),
        )),
        queue.submit(Search::new(
            SearchPolicy::Flood {
                start: Vec3A::new(9.0, 0.0, 1.0),
            },
            options,
        )),
    ];

    let mut finished = Vec::new();
    for _ in 0..10_000 {
        let graph = shared.read();
        finished.extend(queue.tick(&*graph, Duration::from_millis(50)));
        if queue.is_empty() {
            break;
        }
    }
    assert_eq!(finished.len(), 3);
    for done in finished {
        assert!(ids.contains(&done.id));
        assert!(done.result.is_ok(), "{:?}", done.result.err());
    }
}
