//! Definition-before-use ordering of the covering snippet set.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// Topologically order `nodes` so every `(provider, consumer)` edge has the
/// provider first. Ready nodes leave in ascending index order; a cycle is
/// broken by releasing its smallest remaining index.
pub fn dependency_order(nodes: &BTreeSet<usize>, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree: BTreeMap<usize, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    let mut consumers: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for (provider, consumer) in edges {
        if provider == consumer || !nodes.contains(provider) || !nodes.contains(consumer) {
            continue;
        }
        if consumers.entry(*provider).or_default().insert(*consumer) {
            *indegree.entry(*consumer).or_default() += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> =
        indegree.iter().filter(|(_, d)| **d == 0).map(|(n, _)| Reverse(*n)).collect();
    let mut placed: BTreeSet<usize> = BTreeSet::new();
    let mut order = Vec::with_capacity(nodes.len());

    while order.len() < nodes.len() {
        while let Some(Reverse(node)) = ready.pop() {
            if !placed.insert(node) {
                continue;
            }
            order.push(node);
            for consumer in consumers.get(&node).into_iter().flatten() {
                let Some(degree) = indegree.get_mut(consumer) else { continue };
                *degree = degree.saturating_sub(1);
                if *degree == 0 && !placed.contains(consumer) {
                    ready.push(Reverse(*consumer));
                }
            }
        }

        if let Some(stuck) = nodes.iter().find(|n| !placed.contains(*n)) {
            tracing::debug!(snippet = *stuck, "breaking dependency cycle");
            indegree.insert(*stuck, 0);
            ready.push(Reverse(*stuck));
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn independent_nodes_keep_ascending_order() {
        assert_eq!(dependency_order(&set(&[9, 2, 5]), &[]), vec![2, 5, 9]);
    }

    #[test]
    fn providers_precede_consumers_even_when_later_in_file() {
        // 4 uses a name that 15 defines.
        assert_eq!(dependency_order(&set(&[4, 15]), &[(15, 4)]), vec![15, 4]);
        assert_eq!(dependency_order(&set(&[1, 4, 15]), &[(15, 4), (4, 1)]), vec![15, 4, 1]);
    }

    #[test]
    fn cycles_release_smallest_index_first() {
        let order = dependency_order(&set(&[3, 7, 8]), &[(3, 7), (7, 3), (7, 8)]);
        assert_eq!(order, vec![3, 7, 8]);
    }

    #[test]
    fn ignores_edges_outside_the_set() {
        assert_eq!(dependency_order(&set(&[1, 2]), &[(0, 1), (2, 2)]), vec![1, 2]);
    }
}
