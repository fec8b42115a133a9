use std::collections::HashMap;

/// A rooted hierarchy stored as an arena. Children are kept in insertion
/// order, which is the order the fishbone builder walks them in.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
    pub root: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    /// Sign decides whether the branch is drawn as positive or negative.
    pub rate: Option<f64>,
    pub children: Vec<usize>,
}

impl TreeNode {
    /// Last `/` segment of the id: the row key for path-addressed rows, the
    /// whole id otherwise.
    pub fn key(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent`. The first node added without a parent
    /// becomes the root; later parentless nodes are attached to the root.
    pub fn add_node(&mut self, parent: Option<usize>, id: &str, label: &str) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            id: id.to_string(),
            label: label.to_string(),
            rate: None,
            children: Vec::new(),
        });
        match parent.or(self.root) {
            Some(parent) if parent < idx => self.nodes[parent].children.push(idx),
            _ => self.root = Some(idx),
        }
        idx
    }

    pub fn set_rate(&mut self, idx: usize, rate: Option<f64>) {
        if let Some(node) = self.nodes.get_mut(idx) {
            node.rate = rate;
        }
    }

    pub fn node(&self, idx: usize) -> Option<&TreeNode> {
        self.nodes.get(idx)
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        self.nodes
            .get(idx)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth of the deepest node, with the root at 0.
    pub fn max_depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut max = 0;
        let mut stack = vec![(root, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max = max.max(depth);
            for child in self.children(idx) {
                stack.push((*child, depth + 1));
            }
        }
        max
    }
}

/// A single vote on a node, addressed by the node's key.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRow {
    pub k: String,
    pub rate: f64,
}

/// Positive and negative vote counts per node key.
#[derive(Debug, Clone, Default)]
pub struct FeedbackTally {
    counts: HashMap<String, (usize, usize)>,
}

impl FeedbackTally {
    /// Zero rates count on neither side.
    pub fn from_rows(rows: &[FeedbackRow]) -> Self {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for row in rows {
            let entry = counts.entry(row.k.clone()).or_default();
            if row.rate > 0.0 {
                entry.0 += 1;
            } else if row.rate < 0.0 {
                entry.1 += 1;
            }
        }
        Self { counts }
    }

    /// `(positive, negative)` counts for `key`.
    pub fn get(&self, key: &str) -> (usize, usize) {
        self.counts.get(key).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_parentless_node_becomes_root() {
        let mut tree = Tree::new();
        let root = tree.add_node(None, "effect", "Effect");
        let cause = tree.add_node(Some(root), "people", "People");
        let stray = tree.add_node(None, "method", "Method");
        assert_eq!(tree.root, Some(root));
        assert_eq!(tree.children(root), &[cause, stray]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn max_depth_counts_generations() {
        let mut tree = Tree::new();
        let root = tree.add_node(None, "r", "R");
        let a = tree.add_node(Some(root), "a", "A");
        let b = tree.add_node(Some(a), "b", "B");
        tree.add_node(Some(b), "c", "C");
        assert_eq!(tree.max_depth(), 3);
        assert_eq!(Tree::new().max_depth(), 0);
    }

    #[test]
    fn key_is_last_path_segment() {
        let mut tree = Tree::new();
        let root = tree.add_node(None, "/effect", "Effect");
        let cause = tree.add_node(Some(root), "/effect/2", "Cause");
        let plain = tree.add_node(Some(root), "people", "People");
        assert_eq!(tree.nodes[root].key(), "effect");
        assert_eq!(tree.nodes[cause].key(), "2");
        assert_eq!(tree.nodes[plain].key(), "people");
    }

    #[test]
    fn tally_splits_votes_by_sign() {
        let row = |k: &str, rate: f64| FeedbackRow {
            k: k.to_string(),
            rate,
        };
        let tally = FeedbackTally::from_rows(&[
            row("a", 1.0),
            row("a", 3.0),
            row("a", -1.0),
            row("a", 0.0),
            row("b", -2.0),
        ]);
        assert_eq!(tally.get("a"), (2, 1));
        assert_eq!(tally.get("b"), (0, 1));
        assert_eq!(tally.get("missing"), (0, 0));
        assert!(FeedbackTally::default().is_empty());
    }
}
