//! Greedy graph coloring over the local store.

use std::collections::BTreeSet;

use crate::types::Lvid;

use super::LocalStore;

impl<V: Clone + Default, E: Clone + Default> LocalStore<V, E> {
    /// Constructs a heuristic coloring and returns the palette size.
    ///
    /// Vertices are processed in order of decreasing in-degree and assigned
    /// the lowest color not taken by an in-neighbor. On graphs that carry
    /// each undirected edge in both directions this yields a proper
    /// coloring; a one-directional edge is only checked at its target.
    pub fn compute_coloring(&self) -> usize {
        for v in 0..self.num_vertices() {
            self.set_color(v as Lvid, 0);
        }
        let mut order: Vec<(isize, Lvid)> = (0..self.num_vertices())
            .map(|v| (-(self.num_in_neighbors(v as Lvid) as isize), v as Lvid))
            .collect();
        order.sort_unstable();

        let mut max_color = 0u32;
        let mut neighbor_colors = BTreeSet::new();
        for &(_, v) in &order {
            neighbor_colors.clear();
            for &eid in self.in_edge_ids(v) {
                neighbor_colors.insert(self.color(self.source(eid)));
            }
            // lowest free color: the set iterates in ascending order
            let mut color = 0u32;
            for &taken in &neighbor_colors {
                if color != taken {
                    break;
                }
                color += 1;
            }
            self.set_color(v, color);
            max_color = max_color.max(color);
        }
        max_color as usize + 1
    }

    /// Checks that no edge connects two identically colored endpoints.
    pub fn valid_coloring(&self) -> bool {
        for v in 0..self.num_vertices() {
            let color = self.color(v as Lvid);
            for &eid in self.in_edge_ids(v as Lvid) {
                if self.color(self.source(eid)) == color {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Undirected n-cycle: every rim edge stored in both directions.
    fn cycle(n: u32) -> LocalStore<(), ()> {
        let mut store = LocalStore::create_store(n as usize, 2 * n as usize, "v", "e");
        for i in 0..n {
            store.add_edge(2 * i, i, (i + 1) % n);
            store.add_edge(2 * i + 1, (i + 1) % n, i);
        }
        store.finalize();
        store
    }

    #[test]
    fn five_cycle_needs_three_colors() {
        let store = cycle(5);
        let palette = store.compute_coloring();
        assert_eq!(palette, 3);
        assert!(store.valid_coloring());
        for eid in 0..10 {
            assert_ne!(store.color(store.source(eid)), store.color(store.target(eid)));
        }
    }

    #[test]
    fn six_cycle_is_properly_colored() {
        let store = cycle(6);
        let palette = store.compute_coloring();
        assert!(store.valid_coloring());
        assert!(palette <= 3, "greedy palette {palette} too large for a cycle");
    }

    #[test]
    fn star_graph_colors_hub_apart() {
        let mut store: LocalStore<(), ()> = LocalStore::create_store(5, 8, "v", "e");
        for leaf in 1..5u32 {
            store.add_edge(2 * (leaf - 1), leaf, 0);
            store.add_edge(2 * (leaf - 1) + 1, 0, leaf);
        }
        store.finalize();
        assert_eq!(store.compute_coloring(), 2);
        assert!(store.valid_coloring());
    }

    #[test]
    fn invalid_coloring_detected() {
        let store = cycle(3);
        store.compute_coloring();
        store.set_color(0, store.color(2));
        assert!(!store.valid_coloring());
    }

    #[test]
    fn empty_graph_uses_one_color_palette() {
        let store: LocalStore<(), ()> = LocalStore::create_store(0, 0, "v", "e");
        assert_eq!(store.compute_coloring(), 1);
        assert!(store.valid_coloring());
    }
}
