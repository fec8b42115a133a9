use crate::config::LinkScaleConfig;

use super::types::{LayoutNode, Link};

/// Logarithmic interpolation from a positive domain onto a length range.
/// Inputs outside the domain are clamped to its ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinkScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn from_config(config: &LinkScaleConfig) -> Self {
        Self::new(
            (config.domain_min, config.domain_max),
            (config.range_start, config.range_end),
        )
    }

    pub fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let value = value.clamp(d0.min(d1), d0.max(d1));
        let span = d1.ln() - d0.ln();
        if span == 0.0 || !span.is_finite() {
            return r0;
        }
        let t = (value.ln() - d0.ln()) / span;
        r0 + (r1 - r0) * t
    }
}

impl Default for LinkScale {
    fn default() -> Self {
        Self::from_config(&LinkScaleConfig::default())
    }
}

/// Equilibrium length of `link`: deeper links are shorter, and links into
/// an anchor with more connector slots are longer to leave room for them.
pub fn target_distance(link: &Link, nodes: &[LayoutNode], scale: &LinkScale) -> f64 {
    let target = &nodes[link.target.0];
    (target.max_child_idx as f64 + 1.0) * scale.apply(link.depth as f64 + 1.0)
}

pub fn link_distances(links: &[Link], nodes: &[LayoutNode], scale: &LinkScale) -> Vec<f64> {
    links
        .iter()
        .map(|link| target_distance(link, nodes, scale))
        .collect()
}
