use super::types::{LayoutNode, Region, Size};

/// Caller-supplied rule applied to every node after the built-in ones.
pub type PerNodeTick = Box<dyn FnMut(&mut LayoutNode)>;

/// Per-step rules that bend the force layout into a fishbone: pinned spine
/// ends, first-generation branches pinned to the top and bottom margins,
/// a leftward drift, and connectors placed exactly on their anchor segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionCorrector {
    pub size: Size,
    pub margin: f64,
    pub root_label_width: f64,
}

impl PositionCorrector {
    pub fn new(size: Size, margin: f64, root_label_width: f64) -> Self {
        Self {
            size,
            margin,
            root_label_width,
        }
    }

    /// Applies every rule to `nodes` in order. Connector anchors always
    /// precede the connector in node order, so anchors are read after their
    /// own correction for this step.
    pub fn apply(&self, nodes: &mut [LayoutNode], alpha: f64, mut hook: Option<&mut PerNodeTick>) {
        let k = 6.0 * alpha;
        for idx in 0..nodes.len() {
            let interpolated = nodes[idx]
                .between()
                .map(|[a, b]| interpolate(&nodes[a.0], &nodes[b.0], nodes[idx].child_idx));

            let node = &mut nodes[idx];
            self.correct(node, k);
            if let Some((x, y)) = interpolated {
                node.x = x;
                node.y = y;
            }
            if let Some(hook) = hook.as_deref_mut() {
                hook(node);
            }
        }
    }

    fn correct(&self, node: &mut LayoutNode, k: f64) {
        if node.root {
            node.x = self.size.width - (self.margin + self.root_label_width);
        }
        if node.tail {
            node.x = self.margin;
            node.y = self.size.height / 2.0;
        }
        if node.depth == 1 {
            node.y = if node.region == Some(Region::Top) {
                self.margin
            } else {
                self.size.height - self.margin
            };
            node.x -= 10.0 * k;
        }
        if node.vertical {
            node.y += k * node.region_sign();
        }
        if node.depth > 0 {
            node.x -= k;
        }
    }
}

/// Point at fraction `(1 + child_idx) / (b.max_child_idx + 1)` from `b`
/// toward `a`.
pub fn interpolate(a: &LayoutNode, b: &LayoutNode, child_idx: usize) -> (f64, f64) {
    let steps = b.max_child_idx as f64 + 1.0;
    let t = 1.0 + child_idx as f64;
    (
        b.x - t * (b.x - a.x) / steps,
        b.y - t * (b.y - a.y) / steps,
    )
}
