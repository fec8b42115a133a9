//! Position-Verlet force integrator in the style of the classic d3 force
//! layout: links pull their endpoints toward a target distance, nodes repel
//! within a short charge radius, and an optional gravity pulls toward the
//! canvas centre. Each step cools `alpha` geometrically until it falls
//! below `alpha_min`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimulationConfig;

use super::types::{LayoutNode, Link, Size};

#[derive(Debug, Clone)]
pub struct ForceSimulation {
    config: SimulationConfig,
    size: Size,
    distances: Vec<f64>,
    alpha: f64,
}

impl ForceSimulation {
    /// Seeds positions and weights of `nodes` and primes the cooling
    /// schedule. `distances` holds one target length per link.
    pub fn new(
        nodes: &mut [LayoutNode],
        links: &[Link],
        distances: Vec<f64>,
        size: Size,
        config: &SimulationConfig,
    ) -> Self {
        debug_assert_eq!(links.len(), distances.len());
        for node in nodes.iter_mut() {
            node.weight = 0;
        }
        for link in links {
            nodes[link.source.0].weight += 1;
            nodes[link.target.0].weight += 1;
        }
        seed_positions(nodes, links, size, config.random_seed);
        Self {
            config: config.clone(),
            size,
            distances,
            alpha: config.alpha_start,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_cooled(&self) -> bool {
        self.alpha <= 0.0
    }

    /// Stops the simulation; later steps are no-ops.
    pub fn stop(&mut self) {
        self.alpha = 0.0;
    }

    /// Advances one step. Returns the cooled alpha the step ran with, or
    /// `None` once the simulation has converged.
    pub fn step(&mut self, nodes: &mut [LayoutNode], links: &[Link]) -> Option<f64> {
        if self.is_cooled() {
            return None;
        }
        self.alpha *= self.config.alpha_decay;
        if self.alpha < self.config.alpha_min {
            self.alpha = 0.0;
            return None;
        }
        let alpha = self.alpha;

        self.apply_links(nodes, links, alpha);
        self.apply_gravity(nodes, alpha);
        self.apply_charge(nodes, alpha);
        self.integrate(nodes);

        Some(alpha)
    }

    fn apply_links(&self, nodes: &mut [LayoutNode], links: &[Link], alpha: f64) {
        for (link, distance) in links.iter().zip(&self.distances) {
            let (s, t) = (link.source.0, link.target.0);
            let mut dx = nodes[t].x - nodes[s].x;
            let mut dy = nodes[t].y - nodes[s].y;
            let len_sq = dx * dx + dy * dy;
            if len_sq == 0.0 {
                continue;
            }
            let len = len_sq.sqrt();
            let l = alpha * self.config.link_strength * (len - distance) / len;
            dx *= l;
            dy *= l;
            let (sw, tw) = (nodes[s].weight as f64, nodes[t].weight as f64);
            let k = sw / (tw + sw);
            nodes[t].x -= dx * k;
            nodes[t].y -= dy * k;
            nodes[s].x += dx * (1.0 - k);
            nodes[s].y += dy * (1.0 - k);
        }
    }

    fn apply_gravity(&self, nodes: &mut [LayoutNode], alpha: f64) {
        let k = alpha * self.config.gravity;
        if k == 0.0 {
            return;
        }
        let cx = self.size.width / 2.0;
        let cy = self.size.height / 2.0;
        for node in nodes.iter_mut() {
            node.x += (cx - node.x) * k;
            node.y += (cy - node.y) * k;
        }
    }

    /// Pairwise repulsion within `charge_distance`. The range is short
    /// enough that an exact pass is cheaper than building a quadtree.
    fn apply_charge(&self, nodes: &mut [LayoutNode], alpha: f64) {
        let charge = alpha * self.config.charge;
        let max_sq = self.config.charge_distance * self.config.charge_distance;
        if charge == 0.0 || max_sq <= 0.0 {
            return;
        }
        for i in 0..nodes.len() {
            let (x, y) = (nodes[i].x, nodes[i].y);
            let mut shift_x = 0.0;
            let mut shift_y = 0.0;
            for (j, other) in nodes.iter().enumerate() {
                if i == j {
                    continue;
                }
                let dx = other.x - x;
                let dy = other.y - y;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq == 0.0 || dist_sq >= max_sq {
                    continue;
                }
                let k = charge / dist_sq;
                shift_x += dx * k;
                shift_y += dy * k;
            }
            nodes[i].px -= shift_x;
            nodes[i].py -= shift_y;
        }
    }

    fn integrate(&self, nodes: &mut [LayoutNode]) {
        let friction = self.config.friction;
        for node in nodes.iter_mut() {
            let vx = node.px - node.x;
            let vy = node.py - node.y;
            node.px = node.x;
            node.py = node.y;
            node.x -= vx * friction;
            node.y -= vy * friction;
        }
    }
}

/// Nodes start at the position of their first already-placed neighbour, or
/// at a pseudo-random point on the canvas when none is placed yet.
fn seed_positions(nodes: &mut [LayoutNode], links: &[Link], size: Size, seed: u64) {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for link in links {
        neighbors[link.source.0].push(link.target.0);
        neighbors[link.target.0].push(link.source.0);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut placed = vec![false; nodes.len()];
    for idx in 0..nodes.len() {
        let anchor = neighbors[idx].iter().copied().find(|n| placed[*n]);
        let (x, y) = match anchor {
            Some(n) => (nodes[n].x, nodes[n].y),
            None => (
                rng.gen_range(0.0..1.0) * size.width,
                rng.gen_range(0.0..1.0) * size.height,
            ),
        };
        let node = &mut nodes[idx];
        node.x = x;
        node.y = y;
        node.px = x;
        node.py = y;
        placed[idx] = true;
    }
}
