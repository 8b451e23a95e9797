// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::extract::Dependencies;
use crate::types::CellId;

#[derive(Debug, Clone, Default)]
struct CellNode {
    deps: Dependencies,
    /// Cells this one reads from.
    producers: BTreeSet<CellId>,
    /// Cells that read from this one.
    consumers: BTreeSet<CellId>,
}

/// Producer/consumer graph over the cells of one notebook.
///
/// Nodes keep notebook insertion order, which is the tie-break for
/// [`DependencyGraph::topo_order`]. Edges are derived from each cell's
/// read/write sets and are never stored anywhere else.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<CellId, CellNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, cell: &str) -> bool {
        self.nodes.contains_key(cell)
    }

    /// Insertion position of a cell.
    pub fn position(&self, cell: &str) -> Option<usize> {
        self.nodes.get_index_of(cell)
    }

    /// Cell ids in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn dependencies(&self, cell: &str) -> Option<&Dependencies> {
        self.nodes.get(cell).map(|n| &n.deps)
    }

    /// Insert a new cell at the end, or replace the read/write sets of an
    /// existing one, then rebuild its edges.
    pub fn upsert(&mut self, cell: &str, deps: Dependencies) {
        match self.nodes.get_mut(cell) {
            Some(node) => node.deps = deps,
            None => {
                self.nodes.insert(
                    cell.to_string(),
                    CellNode {
                        deps,
                        ..CellNode::default()
                    },
                );
            }
        }
        self.rebuild_edges(cell);
    }

    /// Remove a cell and every edge touching it.
    pub fn remove(&mut self, cell: &str) -> Option<Dependencies> {
        self.detach(cell);
        self.nodes.shift_remove(cell).map(|n| n.deps)
    }

    /// Recompute every edge touching `cell` from the current read/write
    /// sets. Every other writer of a variable the cell reads becomes a
    /// producer, and every other reader of a variable it writes becomes a
    /// consumer. Self-edges are never created.
    pub fn rebuild_edges(&mut self, cell: &str) {
        self.detach(cell);

        let Some(node) = self.nodes.get(cell) else {
            return;
        };
        let reads = node.deps.reads.clone();
        let writes = node.deps.writes.clone();

        let mut producers = BTreeSet::new();
        let mut consumers = BTreeSet::new();
        for (other_id, other) in &self.nodes {
            if other_id == cell {
                continue;
            }
            if !other.deps.writes.is_disjoint(&reads) {
                producers.insert(other_id.clone());
            }
            if !other.deps.reads.is_disjoint(&writes) {
                consumers.insert(other_id.clone());
            }
        }

        for p in &producers {
            if let Some(n) = self.nodes.get_mut(p) {
                n.consumers.insert(cell.to_string());
            }
        }
        for c in &consumers {
            if let Some(n) = self.nodes.get_mut(c) {
                n.producers.insert(cell.to_string());
            }
        }
        if let Some(node) = self.nodes.get_mut(cell) {
            node.producers = producers;
            node.consumers = consumers;
        }
    }

    fn detach(&mut self, cell: &str) {
        let Some(node) = self.nodes.get_mut(cell) else {
            return;
        };
        let producers = std::mem::take(&mut node.producers);
        let consumers = std::mem::take(&mut node.consumers);
        for p in producers {
            if let Some(n) = self.nodes.get_mut(&p) {
                n.consumers.remove(cell);
            }
        }
        for c in consumers {
            if let Some(n) = self.nodes.get_mut(&c) {
                n.producers.remove(cell);
            }
        }
    }

    /// Direct producers of `cell`, in insertion order.
    pub fn producers_of(&self, cell: &str) -> Vec<CellId> {
        self.in_order(self.nodes.get(cell).map(|n| &n.producers))
    }

    /// Direct consumers of `cell`, in insertion order.
    pub fn consumers_of(&self, cell: &str) -> Vec<CellId> {
        self.in_order(self.nodes.get(cell).map(|n| &n.consumers))
    }

    fn in_order(&self, set: Option<&BTreeSet<CellId>>) -> Vec<CellId> {
        let Some(set) = set else {
            return Vec::new();
        };
        let mut ids: Vec<CellId> = set.iter().cloned().collect();
        ids.sort_by_key(|id| self.position(id));
        ids
    }

    /// All `(producer, consumer)` edges, ordered by producer then consumer
    /// position.
    pub fn edges(&self) -> Vec<(CellId, CellId)> {
        self.nodes
            .keys()
            .flat_map(|p| {
                self.consumers_of(p)
                    .into_iter()
                    .map(move |c| (p.clone(), c))
            })
            .collect()
    }

    /// Forward closure of `seeds`: the seeds plus everything reachable
    /// through consumer edges. Unknown ids are ignored.
    pub fn downstream_of<S: AsRef<str>>(&self, seeds: &[S]) -> HashSet<CellId> {
        let mut seen: HashSet<CellId> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        for s in seeds {
            let s = s.as_ref();
            if self.contains(s) && seen.insert(s.to_string()) {
                queue.push_back(s);
            }
        }
        while let Some(cell) = queue.pop_front() {
            let Some(node) = self.nodes.get(cell) else {
                continue;
            };
            for c in &node.consumers {
                if seen.insert(c.clone()) {
                    queue.push_back(c.as_str());
                }
            }
        }
        seen
    }

    /// Strongly-connected components with more than one member, each
    /// sorted by insertion position.
    pub fn cycles(&self) -> Vec<Vec<CellId>> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for idx in 0..self.nodes.len() {
            graph.add_node(idx);
        }
        for (idx, node) in self.nodes.values().enumerate() {
            for c in &node.consumers {
                if let Some(cidx) = self.position(c) {
                    graph.add_edge(idx, cidx, ());
                }
            }
        }

        let mut out: Vec<Vec<CellId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|mut scc| {
                scc.sort_unstable();
                scc.into_iter()
                    .filter_map(|i| self.nodes.get_index(i).map(|(id, _)| id.clone()))
                    .collect()
            })
            .collect();
        out.sort_by_key(|scc: &Vec<CellId>| scc.first().and_then(|id| self.position(id)));
        out
    }

    /// Every cell that sits on a cycle, in insertion order, or `None` when
    /// the graph is acyclic.
    pub fn detect_cycle(&self) -> Option<Vec<CellId>> {
        let mut members: Vec<CellId> = self.cycles().into_iter().flatten().collect();
        if members.is_empty() {
            return None;
        }
        members.sort_by_key(|id| self.position(id));
        Some(members)
    }

    /// Cells to run when `seeds` change: their forward closure ordered by
    /// Kahn's algorithm, ties broken by insertion position. Edges inside a
    /// cycle are ignored so every reachable cell appears exactly once.
    pub fn topo_order<S: AsRef<str>>(&self, seeds: &[S]) -> Vec<CellId> {
        let members = self.downstream_of(seeds);
        if members.is_empty() {
            return Vec::new();
        }

        let component: HashMap<CellId, usize> = self
            .cycles()
            .into_iter()
            .enumerate()
            .flat_map(|(i, scc)| scc.into_iter().map(move |id| (id, i)))
            .collect();
        let same_cycle = |a: &str, b: &str| match (component.get(a), component.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };

        let mut indegree: HashMap<&str, usize> = HashMap::new();
        for id in &members {
            let count = self.nodes[id.as_str()]
                .producers
                .iter()
                .filter(|p| members.contains(*p) && !same_cycle(p, id))
                .count();
            indegree.insert(id.as_str(), count);
        }

        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .filter_map(|(id, _)| self.position(id))
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse(pos)) = ready.pop() {
            let Some((id, node)) = self.nodes.get_index(pos) else {
                continue;
            };
            order.push(id.clone());
            for c in &node.consumers {
                if !members.contains(c) || same_cycle(id, c) {
                    continue;
                }
                if let Some(d) = indegree.get_mut(c.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        if let Some(cpos) = self.position(c) {
                            ready.push(Reverse(cpos));
                        }
                    }
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::types::CellKind;

    fn graph(cells: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (id, src) in cells {
            g.upsert(id, extract(src, CellKind::Code));
        }
        g
    }

    #[test]
    fn chain_orders_downstream() {
        let g = graph(&[("a", "x = 10"), ("b", "y = x + 5"), ("c", "z = y * 2")]);
        assert_eq!(g.topo_order(&["a"]), vec!["a", "b", "c"]);
        assert_eq!(g.topo_order(&["b"]), vec!["b", "c"]);
        assert_eq!(g.producers_of("b"), vec!["a"]);
        assert_eq!(g.consumers_of("b"), vec!["c"]);
    }

    #[test]
    fn edges_are_found_regardless_of_insertion_order() {
        let g = graph(&[("c", "z = y * 2"), ("b", "y = x + 5"), ("a", "x = 1")]);
        assert_eq!(
            g.edges(),
            vec![
                ("b".to_string(), "c".to_string()),
                ("a".to_string(), "b".to_string())
            ]
        );
        assert_eq!(g.topo_order(&["a"]), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_break_by_insertion_position() {
        let g = graph(&[
            ("root", "x = 1"),
            ("left", "l = x"),
            ("right", "r = x"),
            ("join", "j = l + r"),
        ]);
        assert_eq!(g.topo_order(&["root"]), vec!["root", "left", "right", "join"]);
    }

    #[test]
    fn self_reference_is_not_an_edge() {
        let g = graph(&[("a", "x = 1\nx = x + 1")]);
        assert!(g.edges().is_empty());
        assert!(g.detect_cycle().is_none());
    }

    #[test]
    fn three_cycle_is_detected_in_notebook_order() {
        let g = graph(&[("a", "a = c + 1"), ("b", "b = a + 1"), ("c", "c = b + 1")]);
        assert_eq!(
            g.detect_cycle(),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        // Order stays total when cyclic cells are reachable.
        assert_eq!(g.topo_order(&["a"]).len(), 3);
    }

    #[test]
    fn removing_a_read_removes_the_edge() {
        let mut g = graph(&[("a", "x = 1"), ("b", "y = x")]);
        assert_eq!(g.producers_of("b"), vec!["a"]);
        g.upsert("b", extract("y = 2", CellKind::Code));
        assert!(g.producers_of("b").is_empty());
        assert!(g.consumers_of("a").is_empty());
    }

    #[test]
    fn removing_a_cell_drops_its_edges() {
        let mut g = graph(&[("a", "x = 1"), ("b", "y = x"), ("c", "z = y")]);
        g.remove("b");
        assert!(g.edges().is_empty());
        assert_eq!(g.cells().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn every_writer_is_a_producer() {
        let g = graph(&[("a", "x = 1"), ("b", "x = 2"), ("c", "y = x")]);
        assert_eq!(g.producers_of("c"), vec!["a", "b"]);
    }
}
