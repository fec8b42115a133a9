use crate::layout::{FishboneLayout, NodeId, NodeKind, Region};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub iterations: usize,
    pub converged: bool,
    pub nodes: Vec<NodeDump>,
    pub links: Vec<LinkDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub index: usize,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub label: String,
    pub key: Option<String>,
    pub rate: Option<f64>,
    pub depth: usize,
    pub region: Option<Region>,
    pub horizontal: bool,
    pub vertical: bool,
    pub root: bool,
    pub tail: bool,
    pub parent: Option<NodeId>,
    pub connector: Option<NodeId>,
    pub child_idx: usize,
    pub max_child_idx: usize,
    pub link_count: usize,
    pub total_links: Vec<usize>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub source: NodeId,
    pub target: NodeId,
    pub depth: usize,
    pub arrow: bool,
    pub points: [[f64; 2]; 2],
}

impl LayoutDump {
    pub fn from_layout(layout: &FishboneLayout) -> Self {
        let nodes = layout.nodes();
        let node_dumps = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| NodeDump {
                index,
                kind: node.kind.clone(),
                label: node.label.clone(),
                key: node.key.clone(),
                rate: node.rate,
                depth: node.depth,
                region: node.region,
                horizontal: node.horizontal,
                vertical: node.vertical,
                root: node.root,
                tail: node.tail,
                parent: node.parent,
                connector: node.connector,
                child_idx: node.child_idx,
                max_child_idx: node.max_child_idx,
                link_count: node.link_count,
                total_links: node.total_links.clone(),
                x: node.x,
                y: node.y,
            })
            .collect();

        let links = layout
            .links()
            .iter()
            .map(|link| {
                let source = &nodes[link.source.index()];
                let target = &nodes[link.target.index()];
                LinkDump {
                    source: link.source,
                    target: link.target,
                    depth: link.depth,
                    arrow: link.arrow,
                    points: [[source.x, source.y], [target.x, target.y]],
                }
            })
            .collect();

        let size = layout.size();
        LayoutDump {
            width: size.width,
            height: size.height,
            margin: layout.margin(),
            iterations: layout.iterations(),
            converged: layout.is_converged(),
            nodes: node_dumps,
            links,
        }
    }
}

/// Writes the dump as pretty JSON to `output`, or stdout when `None`.
pub fn write_layout_dump(output: Option<&Path>, layout: &FishboneLayout) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout);
    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &dump)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::Tree;
    use crate::layout::compute_layout;
    use crate::theme::Theme;

    #[test]
    fn dump_serializes_kinds_and_links() {
        let mut tree = Tree::new();
        let root = tree.add_node(None, "r", "Root");
        tree.add_node(Some(root), "a", "A");
        let config = LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&tree, &Theme::classic(), &config).unwrap();
        let value = serde_json::to_value(LayoutDump::from_layout(&layout)).unwrap();

        let nodes = value["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0]["type"], "real");
        assert_eq!(nodes[0]["ordinal"], 0);
        assert_eq!(nodes[1]["type"], "tail");
        assert_eq!(nodes[2]["type"], "connector");
        assert_eq!(nodes[2]["between"], serde_json::json!([1, 0]));
        assert_eq!(nodes[3]["region"], "top");

        let links = value["links"].as_array().unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0]["arrow"], true);
        assert_eq!(value["converged"], true);
    }
}
