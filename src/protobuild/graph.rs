//! Package & File Graphs
//!
//! petgraph views over loaded packages: dependency order for linking and a
//! DOT rendering for inspection.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::warn;

use crate::descriptor::FileDescriptorProto;

use super::Package;

/// Dependency graph of a package closure. Edges point from a package to
/// the packages it imports.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl PackageGraph {
    pub fn from_packages<'p>(roots: impl IntoIterator<Item = &'p Arc<Package>>) -> Self {
        let mut graph = Self::default();
        for root in roots {
            graph.add(root);
        }
        graph
    }

    fn add(&mut self, package: &Arc<Package>) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&package.name) {
            return idx;
        }
        let idx = self.graph.add_node(package.name.clone());
        self.nodes.insert(package.name.clone(), idx);
        for dependency in package.direct_dependencies.values() {
            let dep_idx = self.add(dependency);
            self.graph.add_edge(idx, dep_idx, ());
        }
        idx
    }

    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Dependencies before dependents.
    pub fn dependency_order(&self) -> Vec<String> {
        match toposort(&self.graph, None) {
            Ok(order) => order
                .into_iter()
                .rev()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect(),
            // Loads reject cycles, so this only happens for hand-built graphs
            Err(_) => self.graph.node_weights().cloned().collect(),
        }
    }

    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph PackageGraph {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=\"rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        output.push('\n');

        let mut names: Vec<&String> = self.graph.node_weights().collect();
        names.sort();
        for name in names {
            output.push_str(&format!("  \"{}\" [label=\"{}\"];\n", node_id(name), name));
        }
        output.push('\n');

        let mut edges: Vec<(&String, &String)> = self
            .graph
            .edge_references()
            .filter_map(|e| {
                Some((
                    self.graph.node_weight(e.source())?,
                    self.graph.node_weight(e.target())?,
                ))
            })
            .collect();
        edges.sort();
        for (from, to) in edges {
            output.push_str(&format!("  \"{}\" -> \"{}\";\n", node_id(from), node_id(to)));
        }

        output.push_str("}\n");
        output
    }
}

fn node_id(name: &str) -> String {
    name.replace(['.', '/', '-'], "_")
}

/// Order files so every file follows the files it imports. Imports of
/// files outside `files` are ignored.
pub fn order_files(files: Vec<FileDescriptorProto>) -> Vec<FileDescriptorProto> {
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(files.len(), files.len() * 2);
    let indices: HashMap<&str, NodeIndex> = files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name(), graph.add_node(i)))
        .collect();
    for file in &files {
        let from = indices[file.name()];
        for dependency in &file.dependency {
            if let Some(&to) = indices.get(dependency.as_str()) {
                graph.add_edge(to, from, ());
            }
        }
    }

    let order: Vec<usize> = match toposort(&graph, None) {
        Ok(order) => order.into_iter().map(|idx| graph[idx]).collect(),
        Err(cycle) => {
            warn!(
                file = %files[graph[cycle.node_id()]].name(),
                "import cycle between output files, keeping load order"
            );
            (0..files.len()).collect()
        }
    };
    drop(indices);

    let mut slots: Vec<Option<FileDescriptorProto>> = files.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use std::collections::BTreeMap;

    fn package(name: &str, deps: &[&Arc<Package>]) -> Arc<Package> {
        Arc::new(Package {
            name: name.to_string(),
            source_files: Vec::new(),
            files: BTreeMap::new(),
            exports: Default::default(),
            direct_dependencies: deps
                .iter()
                .map(|d| (d.name.clone(), Arc::clone(d)))
                .collect(),
            diagnostics: Diagnostics::new(),
        })
    }

    fn file(name: &str, deps: &[&str]) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.to_string()),
            dependency: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dependency_order_and_dot() {
        let c = package("c.v1", &[]);
        let b = package("b.v1", &[&c]);
        let a = package("a.v1", &[&b, &c]);

        let graph = PackageGraph::from_packages([&a]);
        assert_eq!(graph.package_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.dependency_order(), vec!["c.v1", "b.v1", "a.v1"]);

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph PackageGraph {"));
        assert!(dot.contains("\"a_v1\" -> \"b_v1\";"));
        assert!(dot.contains("\"b_v1\" -> \"c_v1\";"));
    }

    #[test]
    fn test_order_files_puts_imports_first() {
        let files = vec![
            file("a/v1/service/a.p.j5s.proto", &["a/v1/a.p.j5s.proto", "b/v1/b.proto"]),
            file("a/v1/a.p.j5s.proto", &["b/v1/b.proto", "google/protobuf/empty.proto"]),
            file("b/v1/b.proto", &[]),
        ];
        let names: Vec<String> = order_files(files)
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["b/v1/b.proto", "a/v1/a.p.j5s.proto", "a/v1/service/a.p.j5s.proto"]
        );
    }
}
