use super::NodeId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("hierarchy has no root node")]
    EmptyHierarchy,
    #[error("node {node} references an anchor outside the node set")]
    MissingAnchor { node: NodeId },
    #[error("fishbone graph has {count} tail nodes, expected exactly one")]
    TailCount { count: usize },
}

pub type Result<T> = std::result::Result<T, LayoutError>;
