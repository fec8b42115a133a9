mod builder;
mod corrector;
mod distance;
mod error;
mod force;
mod hierarchy;
mod text;
pub(crate) mod types;

pub use builder::build_graph;
pub use corrector::{PerNodeTick, PositionCorrector};
pub use distance::{LinkScale, link_distances, target_distance};
pub use error::{LayoutError, Result};
pub use force::ForceSimulation;
pub use hierarchy::{FnHierarchy, Hierarchy, Overridden};
pub use text::{TextBlock, measure_label, split_lines};
pub use types::*;

use std::fmt;

use tracing::{debug, trace};

use crate::config::{LayoutConfig, SimulationConfig};
use crate::ir::Tree;
use crate::theme::Theme;
use hierarchy::{ChildrenFn, LabelFn};

/// Knobs of a single layout pass.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub margin: f64,
    /// Width reserved right of the root for its label.
    pub root_label_width: f64,
    pub link_scale: LinkScale,
    pub simulation: SimulationConfig,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            margin: 50.0,
            root_label_width: 0.0,
            link_scale: LinkScale::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl LayoutOptions {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            margin: config.margin,
            root_label_width: 0.0,
            link_scale: LinkScale::from_config(&config.link_scale),
            simulation: config.simulation.clone(),
        }
    }
}

/// A fishbone graph together with the solver state positioning it.
///
/// `build` expands the hierarchy and seeds positions; nothing moves until
/// the host calls [`tick`](Self::tick) or [`run`](Self::run).
pub struct FishboneLayout {
    graph: FishboneGraph,
    size: Size,
    simulation: ForceSimulation,
    corrector: PositionCorrector,
    per_node_tick: Option<PerNodeTick>,
    iterations: usize,
    max_iterations: usize,
    converged: bool,
}

impl fmt::Debug for FishboneLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FishboneLayout")
            .field("nodes", &self.graph.nodes.len())
            .field("links", &self.graph.links.len())
            .field("size", &self.size)
            .field("alpha", &self.simulation.alpha())
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl FishboneLayout {
    pub fn build<H: Hierarchy>(hierarchy: &H, size: Size, options: LayoutOptions) -> Result<Self> {
        let mut graph = build_graph(hierarchy)?;
        let distances = link_distances(&graph.links, &graph.nodes, &options.link_scale);
        let simulation = ForceSimulation::new(
            &mut graph.nodes,
            &graph.links,
            distances,
            size,
            &options.simulation,
        );
        let corrector = PositionCorrector::new(size, options.margin, options.root_label_width);
        Ok(Self {
            graph,
            size,
            simulation,
            corrector,
            per_node_tick: None,
            iterations: 0,
            max_iterations: options.simulation.max_iterations,
            converged: false,
        })
    }

    pub fn with_per_node_tick(mut self, hook: impl FnMut(&mut LayoutNode) + 'static) -> Self {
        self.set_per_node_tick(hook);
        self
    }

    pub fn set_per_node_tick(&mut self, hook: impl FnMut(&mut LayoutNode) + 'static) {
        self.per_node_tick = Some(Box::new(hook));
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.graph.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.graph.links
    }

    pub fn graph(&self) -> &FishboneGraph {
        &self.graph
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn margin(&self) -> f64 {
        self.corrector.margin
    }

    pub fn alpha(&self) -> f64 {
        self.simulation.alpha()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Runs one solver step followed by the position rules. Returns `true`
    /// once the layout has converged; further calls do nothing.
    pub fn tick(&mut self) -> bool {
        if self.converged {
            return true;
        }
        if self.iterations >= self.max_iterations {
            self.simulation.stop();
        }
        let Some(alpha) = self.simulation.step(&mut self.graph.nodes, &self.graph.links) else {
            self.converged = true;
            debug!(
                iterations = self.iterations,
                nodes = self.graph.nodes.len(),
                "fishbone layout converged"
            );
            return true;
        };
        self.corrector
            .apply(&mut self.graph.nodes, alpha, self.per_node_tick.as_mut());
        self.iterations += 1;
        trace!(iteration = self.iterations, alpha, "fishbone tick");
        false
    }

    /// Drives the layout to convergence, handing positions to `on_tick`
    /// after every step.
    pub fn run(&mut self, mut on_tick: impl FnMut(&[LayoutNode], &[Link])) {
        while !self.tick() {
            on_tick(&self.graph.nodes, &self.graph.links);
        }
    }

    pub fn run_to_end(&mut self) {
        self.run(|_, _| {});
    }
}

/// Builder over an existing hierarchy that can swap its child and label
/// accessors and attach a per-node hook.
pub struct Fishbone<'a, N> {
    size: Size,
    options: LayoutOptions,
    children: Option<ChildrenFn<'a, N>>,
    label: Option<LabelFn<'a, N>>,
    per_node_tick: Option<PerNodeTick>,
}

impl<N> Default for Fishbone<'_, N> {
    fn default() -> Self {
        let config = LayoutConfig::default();
        Self {
            size: Size::new(config.width, config.height),
            options: LayoutOptions::from_config(&config),
            children: None,
            label: None,
            per_node_tick: None,
        }
    }
}

impl<'a, N: Clone + 'a> Fishbone<'a, N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.size = Size::new(width, height);
        self
    }

    pub fn margin(mut self, margin: f64) -> Self {
        self.options.margin = margin;
        self
    }

    pub fn root_label_width(mut self, width: f64) -> Self {
        self.options.root_label_width = width;
        self
    }

    pub fn simulation(mut self, simulation: SimulationConfig) -> Self {
        self.options.simulation = simulation;
        self
    }

    pub fn children(mut self, children: impl Fn(&N) -> Vec<N> + 'a) -> Self {
        self.children = Some(Box::new(children));
        self
    }

    pub fn label(mut self, label: impl Fn(&N) -> String + 'a) -> Self {
        self.label = Some(Box::new(label));
        self
    }

    pub fn per_node_tick(mut self, hook: impl FnMut(&mut LayoutNode) + 'static) -> Self {
        self.per_node_tick = Some(Box::new(hook));
        self
    }

    /// Lays out `hierarchy`, with any accessor set on the builder taking
    /// precedence over the hierarchy's own.
    pub fn build<H: Hierarchy<Node = N>>(self, hierarchy: &H) -> Result<FishboneLayout> {
        let mut view = Overridden::new(hierarchy);
        if let Some(children) = self.children {
            view = view.with_children(children);
        }
        if let Some(label) = self.label {
            view = view.with_label(label);
        }
        let mut layout = FishboneLayout::build(&view, self.size, self.options)?;
        layout.per_node_tick = self.per_node_tick;
        Ok(layout)
    }

    /// Lays out the tree reachable from `root` through the builder's
    /// accessors. Without a `children` accessor the root is a lone node.
    pub fn build_root(self, root: N) -> Result<FishboneLayout> {
        let Self {
            size,
            options,
            children,
            label,
            per_node_tick,
        } = self;
        let children = children.unwrap_or_else(|| Box::new(|_: &N| Vec::new()));
        let label = label.unwrap_or_else(|| Box::new(|_: &N| String::new()));
        let hierarchy = FnHierarchy::new(Some(root), children, label);
        let mut layout = FishboneLayout::build(&hierarchy, size, options)?;
        layout.per_node_tick = per_node_tick;
        Ok(layout)
    }
}

/// Builds and fully runs the layout of `tree` on the configured canvas.
pub fn compute_layout(tree: &Tree, theme: &Theme, config: &LayoutConfig) -> Result<FishboneLayout> {
    let root_label = tree
        .root
        .and_then(|idx| tree.node(idx))
        .map(|node| node.label.as_str())
        .unwrap_or_default();
    let mut options = LayoutOptions::from_config(config);
    options.root_label_width = measure_label(root_label, 0, theme, config).width as f64;

    let mut layout =
        FishboneLayout::build(tree, Size::new(config.width, config.height), options)?;
    layout.run_to_end();
    Ok(layout)
}
