use std::collections::HashSet;
use std::io::{self, Write};

use crossterm::style::Stylize;
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::graphmap::DiGraphMap;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::graph::EntityGraph;

/// Relationships drawn as edges in the preview.
pub const KNOWN_RELATIONSHIPS: &[&str] = &["conformsTo", "hasPart"];

const TABLE_TITLE: &str = "Entities in RO-Crate";

/// Read-only rendering of a crate for an operator to eyeball before
/// anything is sent to the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct CratePreview {
    pub table: String,
    pub edges: Vec<(String, String)>,
    pub tree: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CratePreviewer;

impl CratePreviewer {
    pub fn render(&self, graph: &EntityGraph) -> CratePreview {
        let mut builder = Builder::default();
        builder.push_record(["@id", "@type"]);

        let mut nodes: Vec<String> = Vec::new();
        let mut edges: Vec<(String, String)> = Vec::new();
        for entity in graph.all_entities() {
            builder.push_record([entity.id().to_string(), entity.type_label()]);
            let label = entity.label();
            for relationship in KNOWN_RELATIONSHIPS {
                for target in graph.resolve_relationship(entity, relationship) {
                    edges.push((label.clone(), target.label()));
                }
            }
            nodes.push(label);
        }

        let table = builder.build().with(Style::rounded()).to_string();
        let tree = render_tree(&nodes, &edges);
        CratePreview { table, edges, tree }
    }
}

impl CratePreview {
    pub fn write_to(&self, out: &mut dyn Write, color: bool) -> io::Result<()> {
        if color {
            writeln!(out, "{}", TABLE_TITLE.bold())?;
        } else {
            writeln!(out, "{TABLE_TITLE}")?;
        }
        writeln!(out, "{}", self.table)?;
        for line in &self.tree {
            if color {
                writeln!(out, "{}", line.as_str().cyan())?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        out.flush()
    }
}

/// Text forest of the edge list. Nodes without incoming edges start a
/// tree; anything left unvisited (cycles) starts one afterwards. Nodes
/// already printed appear once more with a `(...)` marker and are not
/// expanded again.
fn render_tree(nodes: &[String], edges: &[(String, String)]) -> Vec<String> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for node in nodes {
        graph.add_node(node.as_str());
    }
    for (from, to) in edges {
        graph.add_edge(from.as_str(), to.as_str(), ());
    }

    let order: Vec<&str> = graph.nodes().collect();
    let starts = order
        .iter()
        .filter(|node| graph.neighbors_directed(**node, Incoming).next().is_none())
        .chain(order.iter());

    let mut lines = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    for &node in starts {
        if !visited.insert(node) {
            continue;
        }
        lines.push(format!("╙── {node}"));
        walk(&graph, node, "    ", &mut visited, &mut lines);
    }
    lines
}

fn walk<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    node: &'a str,
    prefix: &str,
    visited: &mut HashSet<&'a str>,
    lines: &mut Vec<String>,
) {
    let children: Vec<&str> = graph.neighbors_directed(node, Outgoing).collect();
    for (position, &child) in children.iter().enumerate() {
        let last = position + 1 == children.len();
        let branch = if last { "└── " } else { "├── " };
        if !visited.insert(child) {
            lines.push(format!("{prefix}{branch}{child} (...)"));
            continue;
        }
        lines.push(format!("{prefix}{branch}{child}"));
        let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
        walk(graph, child, &nested, visited, lines);
    }
}
