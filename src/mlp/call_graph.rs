//! The call graph over module instances: an adjacency list keyed by instance
//! ids with a parallel vector of edge labels (the restricted input
//! interpretation of each call). Dumpable in Graphviz DOT format as a
//! debugging aid.

use super::InstanceId;
use crate::registry::Registry;

#[derive(Clone, Debug, Default)]
pub(crate) struct CallGraph {
    edges: Vec<(InstanceId, InstanceId)>,
    labels: Vec<String>,
}

impl CallGraph {
    pub fn new() -> CallGraph {
        CallGraph::default()
    }

    pub fn add_edge(&mut self, from: InstanceId, to: InstanceId, label: String) {
        self.edges.push((from, to));
        self.labels.push(label);
    }

    pub fn to_dot(&self, registry: &Registry, tables: &super::InstanceTables) -> String {
        let mut out = String::from("digraph call_graph {\n");
        for (index, (from, to)) in self.edges.iter().enumerate() {
            let from_name = registry
                .symbols
                .resolve(registry.module(tables.module_of(*from)).name);
            let to_name = registry
                .symbols
                .resolve(registry.module(tables.module_of(*to)).name);
            out.push_str(&format!(
                "  \"m{} ({from_name})\" -> \"m{} ({to_name})\" [label=\"{}\"];\n",
                from.0, to.0, self.labels[index]
            ));
        }
        out.push_str("}\n");
        out
    }
}
