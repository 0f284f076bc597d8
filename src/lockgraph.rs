use crate::intern::ClassId;
use crate::stack::Stack;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Why an edge exists: the interned stack at which the source lock was
/// acquired and the stack at which the destination lock was then
/// acquired, with their common prefix trimmed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Witness {
    pub from: Stack,
    pub to: Stack,
}

/// The acquired-before relation between lock classes. Edges are added
/// monotonically and never removed; the cycle listing is cached until
/// the next insertion.
#[derive(Debug, Default)]
pub struct LockOrder {
    edges: BTreeMap<(ClassId, ClassId), BTreeSet<Witness>>,
    cycle_cache: Option<Arc<Vec<Vec<ClassId>>>>,
}

impl LockOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: ClassId, to: ClassId, witness: Witness) {
        self.edges.entry((from, to)).or_default().insert(witness);
        self.cycle_cache = None;
    }

    pub fn has_edge(&self, from: ClassId, to: ClassId) -> bool {
        self.edges.contains_key(&(from, to))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = (ClassId, ClassId, &BTreeSet<Witness>)> {
        self.edges
            .iter()
            .map(|((from, to), witnesses)| (*from, *to, witnesses))
    }

    pub fn witnesses(&self, from: ClassId, to: ClassId) -> Option<&BTreeSet<Witness>> {
        self.edges.get(&(from, to))
    }

    /// Enumerates every elementary cycle exactly once, self-loops
    /// included. A cycle is emitted only by the DFS rooted at its
    /// minimum-numbered node, which rules out reporting rotations of the
    /// same cycle.
    pub fn cycles(&mut self) -> Arc<Vec<Vec<ClassId>>> {
        if let Some(cycles) = &self.cycle_cache {
            return cycles.clone();
        }

        let mut adjacency: BTreeMap<ClassId, Vec<ClassId>> = BTreeMap::new();
        for (from, to) in self.edges.keys() {
            adjacency.entry(*from).or_default().push(*to);
        }

        let mut cycles = Vec::new();
        for root in adjacency.keys() {
            let mut path = vec![*root];
            let mut on_path: BTreeSet<ClassId> = path.iter().copied().collect();
            search(&adjacency, *root, &mut path, &mut on_path, &mut cycles);
        }

        let cycles = Arc::new(cycles);
        self.cycle_cache = Some(cycles.clone());

        cycles
    }

    /// The set of edges that participate in at least one cycle.
    pub fn cycle_edges(&mut self) -> BTreeSet<(ClassId, ClassId)> {
        let cycles = self.cycles();
        let mut edges = BTreeSet::new();

        for cycle in cycles.iter() {
            for index in 0..cycle.len() {
                edges.insert((cycle[index], cycle[(index + 1) % cycle.len()]));
            }
        }

        edges
    }
}

fn search(
    adjacency: &BTreeMap<ClassId, Vec<ClassId>>,
    root: ClassId,
    path: &mut Vec<ClassId>,
    on_path: &mut BTreeSet<ClassId>,
    cycles: &mut Vec<Vec<ClassId>>,
) {
    let node = *path.last().unwrap_or(&root);

    for next in adjacency.get(&node).into_iter().flatten() {
        if *next == root {
            // report each cycle from its minimum node only
            if path.iter().min() == Some(&root) {
                cycles.push(path.clone());
            }
            continue;
        }

        if on_path.contains(next) {
            continue;
        }

        path.push(*next);
        on_path.insert(*next);
        search(adjacency, root, path, on_path, cycles);
        path.pop();
        on_path.remove(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_of(edges: &[(u32, u32)]) -> LockOrder {
        let mut order = LockOrder::new();
        for (from, to) in edges {
            order.add_edge(
                ClassId(*from),
                ClassId(*to),
                Witness {
                    from: Stack::EMPTY,
                    to: Stack::EMPTY,
                },
            );
        }

        order
    }

    #[test]
    fn succeed_when_enumerating_direct_cycle_once() {
        // arrange
        let mut order = order_of(&[(1, 2), (2, 1)]);

        // act
        let cycles = order.cycles();

        // assert: one cycle, not also its rotation
        assert_eq!(cycles.as_ref(), &vec![vec![ClassId(1), ClassId(2)]]);
    }

    #[test]
    fn succeed_when_enumerating_self_loop() {
        // arrange
        let mut order = order_of(&[(3, 3)]);

        // act
        let cycles = order.cycles();

        // assert
        assert_eq!(cycles.as_ref(), &vec![vec![ClassId(3)]]);
    }

    #[test]
    fn succeed_when_enumerating_overlapping_cycles() {
        // arrange: two triangles sharing the edge 1 -> 2
        let mut order = order_of(&[(1, 2), (2, 3), (3, 1), (2, 4), (4, 1)]);

        // act
        let cycles = order.cycles();

        // assert
        assert_eq!(cycles.len(), 2);
        assert!(cycles.contains(&vec![ClassId(1), ClassId(2), ClassId(3)]));
        assert!(cycles.contains(&vec![ClassId(1), ClassId(2), ClassId(4)]));
    }

    #[test]
    fn succeed_when_cycle_edges_exist_in_graph() {
        // arrange
        let mut order = order_of(&[(0, 1), (1, 2), (2, 1), (2, 3)]);

        // act
        let cycle_edges = order.cycle_edges();

        // assert: every reported cycle edge is a real edge
        for (from, to) in &cycle_edges {
            assert!(order.has_edge(*from, *to));
        }
        assert_eq!(
            cycle_edges,
            [(ClassId(1), ClassId(2)), (ClassId(2), ClassId(1))].into(),
        );
    }

    #[test]
    fn succeed_when_insertion_invalidates_cycle_cache() {
        // arrange
        let mut order = order_of(&[(1, 2)]);
        assert!(order.cycles().is_empty());

        // act
        order.add_edge(
            ClassId(2),
            ClassId(1),
            Witness {
                from: Stack::EMPTY,
                to: Stack::EMPTY,
            },
        );

        // assert
        assert_eq!(order.cycles().len(), 1);
    }
}
