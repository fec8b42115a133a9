use crate::ir::Tree;

/// Read-only view of a rooted tree as the fishbone builder walks it.
///
/// Implementations must describe a finite acyclic hierarchy: the builder
/// recurses through `children` without cycle detection.
pub trait Hierarchy {
    type Node: Clone;

    fn root(&self) -> Option<Self::Node>;

    /// Ordered children of `node`; an empty vector makes it a leaf.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn label(&self, node: &Self::Node) -> String;

    /// Optional signed weight used to style the branch as positive or negative.
    fn rate(&self, _node: &Self::Node) -> Option<f64> {
        None
    }

    /// Key that feedback rows refer to this node by.
    fn key(&self, _node: &Self::Node) -> Option<String> {
        None
    }
}

impl Hierarchy for Tree {
    type Node = usize;

    fn root(&self) -> Option<usize> {
        self.root.filter(|idx| *idx < self.nodes.len())
    }

    fn children(&self, node: &usize) -> Vec<usize> {
        Tree::children(self, *node).to_vec()
    }

    fn label(&self, node: &usize) -> String {
        self.node(*node)
            .map(|node| node.label.clone())
            .unwrap_or_default()
    }

    fn rate(&self, node: &usize) -> Option<f64> {
        self.node(*node).and_then(|node| node.rate)
    }

    fn key(&self, node: &usize) -> Option<String> {
        self.node(*node).map(|node| node.key().to_string())
    }
}

pub(crate) type ChildrenFn<'a, N> = Box<dyn Fn(&N) -> Vec<N> + 'a>;
pub(crate) type LabelFn<'a, N> = Box<dyn Fn(&N) -> String + 'a>;

/// A hierarchy described entirely by two accessor functions.
pub struct FnHierarchy<'a, N> {
    root: Option<N>,
    children: ChildrenFn<'a, N>,
    label: LabelFn<'a, N>,
}

impl<'a, N: Clone> FnHierarchy<'a, N> {
    pub fn new(
        root: Option<N>,
        children: impl Fn(&N) -> Vec<N> + 'a,
        label: impl Fn(&N) -> String + 'a,
    ) -> Self {
        Self {
            root,
            children: Box::new(children),
            label: Box::new(label),
        }
    }
}

impl<N: Clone> Hierarchy for FnHierarchy<'_, N> {
    type Node = N;

    fn root(&self) -> Option<N> {
        self.root.clone()
    }

    fn children(&self, node: &N) -> Vec<N> {
        (self.children)(node)
    }

    fn label(&self, node: &N) -> String {
        (self.label)(node)
    }
}

/// Wraps another hierarchy and replaces its child and/or label accessors.
pub struct Overridden<'a, H: Hierarchy> {
    base: &'a H,
    children: Option<ChildrenFn<'a, H::Node>>,
    label: Option<LabelFn<'a, H::Node>>,
}

impl<'a, H: Hierarchy> Overridden<'a, H> {
    pub fn new(base: &'a H) -> Self {
        Self {
            base,
            children: None,
            label: None,
        }
    }

    pub fn with_children(mut self, children: impl Fn(&H::Node) -> Vec<H::Node> + 'a) -> Self {
        self.children = Some(Box::new(children));
        self
    }

    pub fn with_label(mut self, label: impl Fn(&H::Node) -> String + 'a) -> Self {
        self.label = Some(Box::new(label));
        self
    }
}

impl<H: Hierarchy> Hierarchy for Overridden<'_, H> {
    type Node = H::Node;

    fn root(&self) -> Option<H::Node> {
        self.base.root()
    }

    fn children(&self, node: &H::Node) -> Vec<H::Node> {
        match &self.children {
            Some(children) => children(node),
            None => self.base.children(node),
        }
    }

    fn label(&self, node: &H::Node) -> String {
        match &self.label {
            Some(label) => label(node),
            None => self.base.label(node),
        }
    }

    fn rate(&self, node: &H::Node) -> Option<f64> {
        self.base.rate(node)
    }

    fn key(&self, node: &H::Node) -> Option<String> {
        self.base.key(node)
    }
}
