// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pre-declared module dependencies

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Dependency map consulted before a module's script is requested
#[derive(Debug, Default)]
pub struct DependencyMap {
    /// Module -> prerequisites, in declaration order
    edges: RwLock<HashMap<String, Vec<String>>>,
}

impl DependencyMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge declarations, replacing the prerequisites of every given key
    pub fn merge<I>(&self, declarations: I)
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        self.edges.write().extend(declarations);
    }

    /// Prerequisites declared for a module
    pub fn get(&self, id: &str) -> Option<Vec<String>> {
        self.edges.read().get(id).cloned()
    }

    /// Number of modules with declared prerequisites
    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    /// Check if nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.edges.read().is_empty()
    }

    /// Find a cycle that passes through `id`.
    ///
    /// Returns the path starting and ending at `id`.
    pub fn find_cycle(&self, id: &str) -> Option<Vec<String>> {
        let edges = self.edges.read();
        let mut path = vec![id.to_string()];
        let mut visited = HashSet::new();
        if walk(&edges, id, id, &mut path, &mut visited) {
            Some(path)
        } else {
            None
        }
    }
}

fn walk(
    edges: &HashMap<String, Vec<String>>,
    target: &str,
    current: &str,
    path: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> bool {
    let Some(next) = edges.get(current) else {
        return false;
    };
    for dep in next {
        path.push(dep.clone());
        if dep == target {
            return true;
        }
        if visited.insert(dep.clone()) && walk(edges, target, dep, path, visited) {
            return true;
        }
        path.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &[&str])]) -> DependencyMap {
        let deps = DependencyMap::new();
        deps.merge(pairs.iter().map(|(k, v)| {
            (k.to_string(), v.iter().map(|s| s.to_string()).collect())
        }));
        deps
    }

    #[test]
    fn test_merge_overwrites_per_key() {
        let deps = map(&[("x", &["y"]), ("a", &["b"])]);
        deps.merge([("x".to_string(), vec!["z".to_string()])]);

        assert_eq!(deps.get("x"), Some(vec!["z".to_string()]));
        assert_eq!(deps.get("a"), Some(vec!["b".to_string()]));
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_find_cycle() {
        let deps = map(&[("x", &["y"]), ("y", &["z", "w"]), ("w", &["x"])]);
        assert_eq!(
            deps.find_cycle("x"),
            Some(vec!["x".into(), "y".into(), "w".into(), "x".into()])
        );
        assert!(deps.find_cycle("z").is_none());
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let deps = map(&[("x", &["x"])]);
        assert_eq!(deps.find_cycle("x"), Some(vec!["x".into(), "x".into()]));
    }

    #[test]
    fn test_cycle_not_through_start_is_ignored() {
        // y <-> z is a cycle, but it is y's to report, not x's
        let deps = map(&[("x", &["y"]), ("y", &["z"]), ("z", &["y"])]);
        assert!(deps.find_cycle("x").is_none());
        assert!(deps.find_cycle("y").is_some());
    }
}
