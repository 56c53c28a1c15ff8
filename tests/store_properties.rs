//! Store-level properties: deterministic finalize order, coloring validity,
//! archive round trips.

use quiver::{LocalStore, Result};
use tempfile::tempdir;

fn random_order(seed: u64, len: usize) -> Vec<usize> {
    // small LCG so the shuffle is reproducible without pulling rng state
    // into the assertion
    let mut order: Vec<usize> = (0..len).collect();
    let mut state = seed;
    for i in (1..len).rev() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        order.swap(i, j);
    }
    order
}

/// Finalize produces the same adjacency order no matter the insertion order
/// of the edges.
#[test]
fn finalize_order_is_insertion_independent() {
    let n = 40u32;
    let edges: Vec<(u32, u32)> = (0..n)
        .flat_map(|v| {
            [(v, (v + 1) % n), (v, (v + 7) % n), ((v + 3) % n, v)]
        })
        .collect();

    let build = |order: &[usize]| {
        let mut store: LocalStore<(), ()> =
            LocalStore::create_store(n as usize, edges.len(), "v", "e");
        for &index in order {
            let (source, target) = edges[index];
            store.add_edge(index as u32, source, target);
        }
        store.finalize();
        store
    };

    let reference = build(&(0..edges.len()).collect::<Vec<_>>());
    for seed in [3, 17, 99] {
        let shuffled = build(&random_order(seed, edges.len()));
        for v in 0..n {
            let key = |store: &LocalStore<(), ()>, eid: u32| {
                (store.source(eid), store.target(eid))
            };
            let reference_in: Vec<_> =
                reference.in_edge_ids(v).iter().map(|&e| key(&reference, e)).collect();
            let shuffled_in: Vec<_> =
                shuffled.in_edge_ids(v).iter().map(|&e| key(&shuffled, e)).collect();
            assert_eq!(reference_in, shuffled_in, "in-adjacency of {v} must not depend on insertion order");

            let reference_out: Vec<_> =
                reference.out_edge_ids(v).iter().map(|&e| key(&reference, e)).collect();
            let shuffled_out: Vec<_> =
                shuffled.out_edge_ids(v).iter().map(|&e| key(&shuffled, e)).collect();
            assert_eq!(reference_out, shuffled_out);
        }
    }
}

/// Strictly sorted adjacency after finalize: no duplicates, ascending keys.
#[test]
fn finalized_adjacency_is_strictly_sorted() {
    let n = 24u32;
    let mut store: LocalStore<(), ()> = LocalStore::create_store(n as usize, (n * 2) as usize, "v", "e");
    let mut eid = 0u32;
    for v in 0..n {
        store.add_edge(eid, v, (v + 5) % n);
        eid += 1;
        store.add_edge(eid, (v + 11) % n, v);
        eid += 1;
    }
    store.finalize();
    for v in 0..n {
        let keys: Vec<_> = store
            .in_edge_ids(v)
            .iter()
            .map(|&e| (store.source(e), store.target(e)))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(keys, sorted, "in-adjacency of {v} must be strictly sorted");
    }
}

/// Coloring a mutually linked mesh stays valid and round-trips through the
/// archive with versions and flags intact.
#[test]
fn coloring_survives_archive_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("colored.bin");

    let n = 12u32;
    let mut store: LocalStore<u64, u64> = LocalStore::create_store(n as usize, (2 * n) as usize, "v", "e");
    for v in 0..n {
        store.add_edge(2 * v, v, (v + 1) % n);
        store.add_edge(2 * v + 1, (v + 1) % n, v);
    }
    store.finalize();
    let palette = store.compute_coloring();
    assert!(store.valid_coloring());
    assert!(palette >= 2);

    for v in 0..n {
        store.increment_and_update_vertex(v, v as u64 + 100);
        store.set_vertex_modified(v, v % 2 == 0);
    }
    store.save(&path)?;

    let loaded: LocalStore<u64, u64> = LocalStore::load(&path)?;
    assert!(loaded.valid_coloring());
    for v in 0..n {
        assert_eq!(loaded.color(v), store.color(v));
        assert_eq!(loaded.vertex_data(v), v as u64 + 100);
        assert_eq!(loaded.vertex_version(v), 1);
        assert_eq!(loaded.vertex_modified(v), v % 2 == 0);
    }
    assert_eq!(loaded.find(3, 4), store.find(3, 4));
    Ok(())
}
