//! Expands a hierarchy into the fishbone node and link sets.
//!
//! A node on the spine attaches its children through synthetic connector
//! nodes spread between the node and its own connector (the tail, for the
//! root):
//!
//! ```text
//!     |       |
//! o---+-------+---> root
//!     |       |
//! ```
//!
//! Children of the root are merged pairwise onto one connector slot so the
//! top and bottom branch of a pair meet the spine at the same point.

use tracing::debug;

use super::error::{LayoutError, Result};
use super::hierarchy::Hierarchy;
use super::types::{FishboneGraph, LayoutNode, Link, NodeId, Region};

/// Annotations a parent computes for a child before visiting it.
struct Placement {
    parent: NodeId,
    depth: usize,
    child_idx: usize,
    region: Region,
    horizontal: bool,
    vertical: bool,
    connector: NodeId,
}

struct GraphBuilder<'a, H: Hierarchy> {
    hierarchy: &'a H,
    nodes: Vec<LayoutNode>,
    links: Vec<Link>,
    real_nodes: usize,
}

pub fn build_graph<H: Hierarchy>(hierarchy: &H) -> Result<FishboneGraph> {
    let root = hierarchy.root().ok_or(LayoutError::EmptyHierarchy)?;
    let _span = tracing::debug_span!("fishbone.build").entered();

    let mut builder = GraphBuilder {
        hierarchy,
        nodes: Vec::new(),
        links: Vec::new(),
        real_nodes: 0,
    };
    builder.visit(&root, None);

    let graph = FishboneGraph {
        nodes: builder.nodes,
        links: builder.links,
    };
    graph.validate()?;
    debug!(
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        real = builder.real_nodes,
        "built fishbone graph"
    );
    Ok(graph)
}

impl<H: Hierarchy> GraphBuilder<'_, H> {
    fn push(&mut self, node: LayoutNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Registers `source`, walks its children and returns the new node id
    /// together with the number of links in its subtree.
    fn visit(&mut self, source: &H::Node, placement: Option<Placement>) -> (NodeId, usize) {
        let mut node = LayoutNode::real(
            self.real_nodes,
            self.hierarchy.label(source),
            self.hierarchy.rate(source),
        );
        node.key = self.hierarchy.key(source);
        self.real_nodes += 1;
        if let Some(p) = &placement {
            node.parent = Some(p.parent);
            node.depth = p.depth;
            node.child_idx = p.child_idx;
            node.region = Some(p.region);
            node.horizontal = p.horizontal;
            node.vertical = p.vertical;
            node.connector = Some(p.connector);
        }
        let id = self.push(node);

        let mut node_links = Vec::new();
        let anchors = match placement {
            Some(p) => {
                let connector = &mut self.nodes[p.connector.0];
                connector.max_child_idx = 0;
                connector.total_links.clear();
                [id, p.connector]
            }
            None => {
                let tail = self.push(LayoutNode::tail());
                node_links.push(Link {
                    source: tail,
                    target: id,
                    depth: 0,
                    arrow: true,
                });
                let root = &mut self.nodes[id.0];
                root.connector = Some(tail);
                root.horizontal = true;
                root.vertical = false;
                root.depth = 0;
                root.root = true;
                root.total_links.clear();
                [tail, id]
            }
        };
        let anchor = anchors[1];

        let (depth, region, horizontal, vertical, is_root) = {
            let node = &self.nodes[id.0];
            (node.depth, node.region, node.horizontal, node.vertical, node.root)
        };

        let mut link_count = 1;
        let mut slots = 0;
        let mut open_slot: Option<usize> = None;

        for (idx, child) in self.hierarchy.children(source).iter().enumerate() {
            // the root pairs each freshly opened slot with the next sibling
            let slot = match open_slot.take() {
                Some(slot) if is_root => slot,
                _ => {
                    let slot = slots;
                    slots += 1;
                    open_slot = Some(slot);
                    slot
                }
            };
            let connector = self.push(LayoutNode::connector(anchors, slot));

            let placement = Placement {
                parent: id,
                depth: depth + 1,
                child_idx: idx,
                region: region.unwrap_or_else(|| Region::from_child_index(idx)),
                horizontal: !horizontal,
                vertical: !vertical,
                connector,
            };
            let (child_id, child_links) = self.visit(child, Some(placement));
            node_links.push(Link {
                source: child_id,
                target: connector,
                depth: depth + 1,
                arrow: false,
            });

            link_count += child_links;
            self.nodes[anchor.0].total_links.push(child_links);
        }

        self.nodes[anchor.0].max_child_idx = slots;
        self.nodes[id.0].link_count = link_count;
        self.links.splice(0..0, node_links);

        (id, link_count)
    }
}
