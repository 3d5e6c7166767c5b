// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A deterministic implementation of Kahn's algorithm for topological sorting.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// An error indicating that a cycle was detected in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError;

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "the dependency graph contains a cycle")
    }
}

impl std::error::Error for CycleError {}

/// Performs a topological sort on a directed graph with deterministic
/// tie-breaking.
///
/// The graph is defined by a collection of nodes and a set of directed edges
/// representing dependencies (from parent to child). Whenever several nodes
/// are simultaneously ready (in-degree zero), the one with the smallest `key`
/// is emitted first, so identical inputs always produce identical orderings.
///
/// # Arguments
///
/// * `nodes`: An iterator over the unique nodes in the graph.
/// * `edges`: An iterator over the directed edges, as `(parent, child)` tuples.
/// * `key`: A total order over nodes used to break ties among ready nodes.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: The nodes in a valid topological order.
/// * `Err(CycleError)`: If the graph contains one or more cycles.
pub fn topological_sort_by_key<T, K>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
    mut key: impl FnMut(&T) -> K,
) -> Result<Vec<T>, CycleError>
where
    T: Copy + Eq + Hash,
    K: Ord + Clone,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let index_of: HashMap<T, usize> = node_list
        .iter()
        .enumerate()
        .map(|(index, node)| (*node, index))
        .collect();
    let keys: Vec<K> = node_list.iter().map(|node| key(node)).collect();

    // 1. Build adjacency list and in-degree counts from edges. Edges whose
    //    endpoints are not in the node set are ignored.
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_list.len()];
    let mut in_degree: Vec<usize> = vec![0; node_list.len()];
    for (parent, child) in edges {
        let (Some(&parent), Some(&child)) = (index_of.get(&parent), index_of.get(&child)) else {
            continue;
        };
        adjacency[parent].push(child);
        in_degree[child] += 1;
    }

    // 2. Seed the ready heap with all root nodes (in-degree of 0). The heap
    //    is a min-heap over (key, insertion index), which pins the ordering.
    let mut ready: BinaryHeap<Reverse<(K, usize)>> = BinaryHeap::new();
    for (index, &degree) in in_degree.iter().enumerate() {
        if degree == 0 {
            ready.push(Reverse((keys[index].clone(), index)));
        }
    }

    // 3. Drain the heap, releasing children as their last parent is emitted.
    let mut sorted = Vec::with_capacity(node_list.len());
    while let Some(Reverse((_, index))) = ready.pop() {
        sorted.push(node_list[index]);
        for &child in &adjacency[index] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse((keys[child].clone(), child)));
            }
        }
    }

    // 4. Check for cycles.
    if sorted.len() != node_list.len() {
        Err(CycleError)
    } else {
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_a_simple_chain() {
        let order = topological_sort_by_key([1, 2, 3], [(1, 2), (2, 3)], |&n| n)
            .expect("chain should sort");
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn breaks_ties_by_key() {
        // 10 and 20 are both ready from the start; the key decides.
        let order = topological_sort_by_key([20, 10, 30], [(10, 30), (20, 30)], |&n| n)
            .expect("diamond should sort");
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn reversed_key_reverses_ties() {
        let order = topological_sort_by_key([20, 10, 30], [(10, 30), (20, 30)], |&n| Reverse(n))
            .expect("diamond should sort");
        assert_eq!(order, vec![20, 10, 30]);
    }

    #[test]
    fn detects_a_cycle() {
        let result = topological_sort_by_key([1, 2], [(1, 2), (2, 1)], |&n| n);
        assert_eq!(result, Err(CycleError));
    }

    #[test]
    fn empty_graph_yields_empty_order() {
        let order = topological_sort_by_key(std::iter::empty::<u32>(), [], |&n| n)
            .expect("empty graph should sort");
        assert!(order.is_empty());
    }

    #[test]
    fn is_deterministic() {
        let nodes = [5, 3, 9, 1, 7];
        let edges = [(3, 9), (1, 7)];
        let first = topological_sort_by_key(nodes, edges, |&n| n).expect("should sort");
        let second = topological_sort_by_key(nodes, edges, |&n| n).expect("should sort");
        assert_eq!(first, second);
    }
}
