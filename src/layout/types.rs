use std::fmt;

use serde::Serialize;

use super::error::{LayoutError, Result};

/// Index of a node in [`FishboneGraph::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Side of the spine a branch hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Top,
    Bottom,
}

impl Region {
    /// Even children of the root go on top, odd ones at the bottom.
    pub fn from_child_index(idx: usize) -> Self {
        if idx & 1 == 1 {
            Region::Bottom
        } else {
            Region::Top
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Region::Top => -1.0,
            Region::Bottom => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    /// Wraps a hierarchy node; `ordinal` is its preorder position.
    Real { ordinal: usize },
    /// Left end of the spine.
    Tail,
    /// Synthetic attachment point interpolated between two anchors.
    Connector { between: [NodeId; 2] },
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub kind: NodeKind,
    pub label: String,
    pub key: Option<String>,
    pub rate: Option<f64>,
    pub depth: usize,
    pub parent: Option<NodeId>,
    pub child_idx: usize,
    pub region: Option<Region>,
    pub horizontal: bool,
    pub vertical: bool,
    pub root: bool,
    pub tail: bool,
    pub connector: Option<NodeId>,
    pub max_child_idx: usize,
    pub total_links: Vec<usize>,
    pub link_count: usize,
    pub x: f64,
    pub y: f64,
    pub px: f64,
    pub py: f64,
    /// Number of links touching this node.
    pub weight: usize,
}

impl LayoutNode {
    fn blank(kind: NodeKind) -> Self {
        Self {
            kind,
            label: String::new(),
            key: None,
            rate: None,
            depth: 0,
            parent: None,
            child_idx: 0,
            region: None,
            horizontal: false,
            vertical: false,
            root: false,
            tail: false,
            connector: None,
            max_child_idx: 0,
            total_links: Vec::new(),
            link_count: 0,
            x: 0.0,
            y: 0.0,
            px: 0.0,
            py: 0.0,
            weight: 0,
        }
    }

    pub fn real(ordinal: usize, label: String, rate: Option<f64>) -> Self {
        Self {
            label,
            rate,
            ..Self::blank(NodeKind::Real { ordinal })
        }
    }

    pub fn tail() -> Self {
        Self {
            tail: true,
            ..Self::blank(NodeKind::Tail)
        }
    }

    pub fn connector(between: [NodeId; 2], child_idx: usize) -> Self {
        Self {
            child_idx,
            ..Self::blank(NodeKind::Connector { between })
        }
    }

    pub fn between(&self) -> Option<[NodeId; 2]> {
        match self.kind {
            NodeKind::Connector { between } => Some(between),
            _ => None,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self.kind, NodeKind::Real { .. })
    }

    pub fn is_connector(&self) -> bool {
        matches!(self.kind, NodeKind::Connector { .. })
    }

    /// -1 on top, +1 at the bottom, 0 for nodes off any branch.
    pub fn region_sign(&self) -> f64 {
        self.region.map(Region::sign).unwrap_or(0.0)
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    pub depth: usize,
    pub arrow: bool,
}

/// Node and link sets produced by one build pass.
#[derive(Debug, Clone, Default)]
pub struct FishboneGraph {
    pub nodes: Vec<LayoutNode>,
    pub links: Vec<Link>,
}

impl FishboneGraph {
    pub fn node(&self, id: NodeId) -> &LayoutNode {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.root).map(NodeId)
    }

    pub fn tail(&self) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.tail).map(NodeId)
    }

    pub fn real_node_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_real()).count()
    }

    pub fn connectors(&self) -> impl Iterator<Item = (NodeId, &LayoutNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_connector())
            .map(|(idx, node)| (NodeId(idx), node))
    }

    /// Checks the structural invariants the position rules rely on: a single
    /// tail, and every node/link reference resolving inside the node set.
    pub fn validate(&self) -> Result<()> {
        let count = self.nodes.iter().filter(|node| node.tail).count();
        if count != 1 {
            return Err(LayoutError::TailCount { count });
        }
        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            let refs = node
                .between()
                .into_iter()
                .flatten()
                .chain(node.connector)
                .chain(node.parent);
            for id in refs {
                if id.0 >= len {
                    return Err(LayoutError::MissingAnchor { node: NodeId(idx) });
                }
            }
        }
        for link in &self.links {
            for id in [link.source, link.target] {
                if id.0 >= len {
                    return Err(LayoutError::MissingAnchor { node: id });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_alternates_by_parity() {
        assert_eq!(Region::from_child_index(0), Region::Top);
        assert_eq!(Region::from_child_index(1), Region::Bottom);
        assert_eq!(Region::from_child_index(4), Region::Top);
        assert_eq!(Region::Top.sign(), -1.0);
        assert_eq!(Region::Bottom.sign(), 1.0);
    }

    #[test]
    fn validate_rejects_dangling_anchor() {
        let graph = FishboneGraph {
            nodes: vec![
                LayoutNode::real(0, "root".to_string(), None),
                LayoutNode::tail(),
                LayoutNode::connector([NodeId(1), NodeId(9)], 0),
            ],
            links: Vec::new(),
        };
        assert_eq!(
            graph.validate(),
            Err(LayoutError::MissingAnchor { node: NodeId(2) })
        );
    }

    #[test]
    fn validate_requires_single_tail() {
        let graph = FishboneGraph {
            nodes: vec![LayoutNode::real(0, "root".to_string(), None)],
            links: Vec::new(),
        };
        assert_eq!(graph.validate(), Err(LayoutError::TailCount { count: 0 }));
    }
}
