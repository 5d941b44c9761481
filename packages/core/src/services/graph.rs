//! Graph Reader - Transitive Descendant Resolution
//!
//! Resolves the full descendant set of a component by walking parent edges
//! downward. The walk is decoupled from any particular connection through
//! the [`ComponentEdges`] seam so it can be unit-tested against an in-memory
//! adjacency list; the promotion transaction plugs in a live-connection edge
//! source so the traversal sees transaction-consistent state.
//!
//! Writers are expected to keep the edge graph acyclic, but the walk carries
//! a visited-set guard anyway: a mis-modeled cycle must terminate the
//! traversal, not hang the transaction.

use crate::db::{AssetStore, DatabaseError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};

/// Edge source for the descendant walk: direct child ids of a component.
#[async_trait]
pub trait ComponentEdges: Send + Sync {
    async fn child_ids(&self, parent_id: &str) -> Result<Vec<String>, DatabaseError>;
}

/// Edge source backed by a live connection, for use inside a transaction.
pub struct ConnectionEdges<'a> {
    conn: &'a libsql::Connection,
}

impl<'a> ConnectionEdges<'a> {
    pub fn new(conn: &'a libsql::Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ComponentEdges for ConnectionEdges<'_> {
    async fn child_ids(&self, parent_id: &str) -> Result<Vec<String>, DatabaseError> {
        AssetStore::tx_child_ids(self.conn, parent_id).await
    }
}

/// Breadth-first descendant resolution over a [`ComponentEdges`] source.
pub struct GraphReader;

impl GraphReader {
    /// Every component transitively reachable below `component_id`,
    /// excluding `component_id` itself, in breadth-first order. Each node is
    /// visited at most once; cycles are skipped rather than followed.
    pub async fn descendants_of(
        edges: &dyn ComponentEdges,
        component_id: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(component_id.to_string());

        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(component_id.to_string());

        let mut descendants = Vec::new();
        while let Some(current) = queue.pop_front() {
            for child in edges.child_ids(&current).await? {
                if visited.insert(child.clone()) {
                    descendants.push(child.clone());
                    queue.push_back(child);
                }
            }
        }

        Ok(descendants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory adjacency list, no database.
    struct MapEdges {
        children: HashMap<String, Vec<String>>,
    }

    impl MapEdges {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            let mut children = HashMap::new();
            for (parent, kids) in edges {
                children.insert(
                    parent.to_string(),
                    kids.iter().map(|k| k.to_string()).collect(),
                );
            }
            Self { children }
        }
    }

    #[async_trait]
    impl ComponentEdges for MapEdges {
        async fn child_ids(&self, parent_id: &str) -> Result<Vec<String>, DatabaseError> {
            Ok(self.children.get(parent_id).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_descendants_excludes_root() {
        let edges = MapEdges::new(&[("n", &["c1", "c2"]), ("c1", &["g1"])]);
        let result = GraphReader::descendants_of(&edges, "n").await.unwrap();
        assert_eq!(result, vec!["c1", "c2", "g1"]);
        assert!(!result.contains(&"n".to_string()));
    }

    #[tokio::test]
    async fn test_leaf_has_no_descendants() {
        let edges = MapEdges::new(&[("n", &["c1"])]);
        let result = GraphReader::descendants_of(&edges, "c1").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_deep_chain() {
        let edges = MapEdges::new(&[("a", &["b"]), ("b", &["c"]), ("c", &["d"]), ("d", &["e"])]);
        let result = GraphReader::descendants_of(&edges, "a").await.unwrap();
        assert_eq!(result, vec!["b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_cycle_terminates_and_visits_once() {
        // b -> c -> b is mis-modeled input; the guard must terminate anyway.
        let edges = MapEdges::new(&[("a", &["b"]), ("b", &["c"]), ("c", &["b", "a"])]);
        let result = GraphReader::descendants_of(&edges, "a").await.unwrap();
        assert_eq!(result, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_diamond_visited_once() {
        // Two parents pointing at the same child must not duplicate it.
        let edges = MapEdges::new(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"])]);
        let result = GraphReader::descendants_of(&edges, "a").await.unwrap();
        assert_eq!(result, vec!["b", "c", "d"]);
    }
}
