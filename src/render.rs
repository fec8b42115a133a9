use crate::config::{LayoutConfig, RenderConfig};
use crate::ir::FeedbackTally;
use crate::layout::{FishboneLayout, LayoutNode, Link, Region, split_lines};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const ARROW_ID: &str = "arrow";

pub fn render_svg(
    layout: &FishboneLayout,
    theme: &Theme,
    config: &LayoutConfig,
    render: &RenderConfig,
) -> String {
    let mut svg = String::new();
    let size = layout.size();
    let width = size.width.max(1.0);
    let height = size.height.max(1.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"fishbone\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&render.background)
    ));

    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"{ARROW_ID}\" viewBox=\"0 -5 10 10\" refX=\"10\" refY=\"0\" markerWidth=\"10\" markerHeight=\"10\" orient=\"auto\"><path d=\"M0,-5L10,0L0,5\" fill=\"{}\"/></marker>",
        theme.line_color
    ));
    svg.push_str("</defs>");

    let nodes = layout.nodes();
    for link in layout.links() {
        svg.push_str(&link_svg(link, nodes, theme));
    }
    let tally = FeedbackTally::from_rows(&render.feedback);
    for node in nodes.iter().filter(|node| node.is_real()) {
        let votes = node
            .key
            .as_deref()
            .map(|key| tally.get(key))
            .unwrap_or_default();
        svg.push_str(&node_svg(node, theme, config, votes));
    }

    svg.push_str("</svg>");
    svg
}

/// Links leaving the tail, or leaving a node with a negative rate, are
/// styled negative.
fn is_negative(link: &Link, nodes: &[LayoutNode]) -> bool {
    let source = &nodes[link.source.index()];
    source.tail || source.rate.is_some_and(|rate| rate < 0.0)
}

fn link_svg(link: &Link, nodes: &[LayoutNode], theme: &Theme) -> String {
    let source = &nodes[link.source.index()];
    let target = &nodes[link.target.index()];
    let negative = is_negative(link, nodes);
    let polarity = if negative { "negative" } else { "positive" };
    let stroke = match source.rate {
        _ if source.tail => theme.line_color.as_str(),
        Some(rate) if rate < 0.0 => theme.negative_color.as_str(),
        Some(rate) if rate > 0.0 => theme.positive_color.as_str(),
        _ => theme.line_color.as_str(),
    };
    let stroke_width = (3.0 - link.depth as f64).max(1.0);
    let marker = if link.arrow {
        format!(" marker-end=\"url(#{ARROW_ID})\"")
    } else {
        String::new()
    };
    format!(
        "<line class=\"link link-{} link-{polarity}\" x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{stroke}\" stroke-width=\"{stroke_width}\"{marker}/>",
        link.depth, source.x, source.y, target.x, target.y,
    )
}

fn text_anchor(node: &LayoutNode) -> &'static str {
    if node.depth == 0 {
        "start"
    } else if node.horizontal {
        "end"
    } else {
        "middle"
    }
}

fn text_dy(node: &LayoutNode) -> &'static str {
    if node.horizontal {
        ".35em"
    } else if node.region == Some(Region::Bottom) {
        "1em"
    } else {
        "-.2em"
    }
}

fn node_svg(
    node: &LayoutNode,
    theme: &Theme,
    config: &LayoutConfig,
    (positive, negative): (usize, usize),
) -> String {
    let class = if node.root { "node root" } else { "node" };
    let font_size = theme.label_font_size(node.depth);
    let fill = if node.root {
        theme.root_text_color.as_str()
    } else {
        theme.text_color.as_str()
    };
    let dx = if node.depth == 0 { "0" } else { "-.5em" };
    let weight = if node.root { " font-weight=\"bold\"" } else { "" };

    let mut text = format!(
        "<g class=\"{class}\" transform=\"translate({:.2},{:.2})\"><text class=\"label-{}\" text-anchor=\"{}\" dx=\"{dx}\" font-family=\"{}\" font-size=\"{font_size}\" fill=\"{fill}\"{weight}>",
        node.x,
        node.y,
        node.depth,
        text_anchor(node),
        escape_xml(&theme.font_family),
    );
    // Extra lines grow away from the spine: downward below it, upward above.
    let mut lines = split_lines(&node.label);
    let upward = !node.horizontal && node.region != Some(Region::Bottom) && lines.len() > 1;
    if upward {
        lines.reverse();
    }
    let step = if upward {
        -config.label_line_height
    } else {
        config.label_line_height
    };
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 {
            text_dy(node).to_string()
        } else {
            format!("{step}em")
        };
        text.push_str(&format!(
            "<tspan x=\"0\" dy=\"{dy}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    text.push_str("</text>");
    // One unit of bar width per vote: positive grows right from the anchor,
    // negative grows left.
    if positive > 0 {
        text.push_str(&format!(
            "<rect class=\"positive\" x=\"0\" y=\"-2\" width=\"{positive}\" height=\"2\" fill=\"{}\"/>",
            theme.positive_color
        ));
    }
    if negative > 0 {
        text.push_str(&format!(
            "<rect class=\"negative\" x=\"-{negative}\" y=\"-2\" width=\"{negative}\" height=\"2\" fill=\"{}\"/>",
            theme.negative_color
        ));
    }
    text.push_str("</g>");
    text
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let scale = if render_cfg.scale > 0.0 {
        render_cfg.scale
    } else {
        1.0
    };
    let size = tree.size();
    let width = (size.width() * scale).ceil().max(1.0) as u32;
    let height = (size.height() * scale).ceil().max(1.0) as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate {width}x{height} pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap_mut,
    );
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::Tree;
    use crate::layout::compute_layout;

    fn config() -> LayoutConfig {
        LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        }
    }

    fn render_with(tree: &Tree, render: &RenderConfig) -> String {
        let theme = Theme::classic();
        let layout = compute_layout(tree, &theme, &config()).unwrap();
        render_svg(&layout, &theme, &config(), render)
    }

    fn render(tree: &Tree) -> String {
        render_with(tree, &RenderConfig::default())
    }

    #[test]
    fn render_svg_basic() {
        let mut tree = Tree::new();
        let root = tree.add_node(None, "effect", "Defects");
        tree.add_node(Some(root), "m", "Machine");
        tree.add_node(Some(root), "p", "People & <Process>");
        let svg = render(&tree);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Defects"));
        assert!(svg.contains("People &amp; &lt;Process&gt;"));
        assert_eq!(svg.matches("<line ").count(), 3);
        assert_eq!(svg.matches("<g class=\"node").count(), 3);
        assert_eq!(svg.matches("marker-end").count(), 1);
    }

    #[test]
    fn spine_link_is_negative_and_rates_color_branches() {
        let mut tree = Tree::new();
        let root = tree.add_node(None, "effect", "Effect");
        let bad = tree.add_node(Some(root), "bad", "Bad");
        tree.set_rate(bad, Some(-1.0));
        let good = tree.add_node(Some(root), "good", "Good");
        tree.set_rate(good, Some(2.0));
        let svg = render(&tree);
        assert!(svg.contains("class=\"link link-0 link-negative\""));
        assert_eq!(svg.matches("link-negative").count(), 2);
        assert!(svg.contains(&Theme::classic().positive_color));
    }

    #[test]
    fn label_placement_follows_orientation() {
        let mut root = LayoutNode::real(0, "Root".to_string(), None);
        root.root = true;
        root.horizontal = true;
        assert_eq!(text_anchor(&root), "start");
        assert_eq!(text_dy(&root), ".35em");

        let mut bottom = LayoutNode::real(1, "B".to_string(), None);
        bottom.depth = 1;
        bottom.vertical = true;
        bottom.region = Some(Region::Bottom);
        assert_eq!(text_anchor(&bottom), "middle");
        assert_eq!(text_dy(&bottom), "1em");

        let mut top = bottom.clone();
        top.region = Some(Region::Top);
        assert_eq!(text_dy(&top), "-.2em");

        let mut sub = LayoutNode::real(2, "S".to_string(), None);
        sub.depth = 2;
        sub.horizontal = true;
        assert_eq!(text_anchor(&sub), "end");
    }

    #[test]
    fn multi_line_labels_become_tspans() {
        let mut node = LayoutNode::real(1, "one<br>two".to_string(), None);
        node.depth = 1;
        node.vertical = true;
        node.region = Some(Region::Bottom);
        let svg = node_svg(&node, &Theme::classic(), &config(), (0, 0));
        assert_eq!(svg.matches("<tspan").count(), 2);
        assert!(svg.contains("dy=\"1.5em\">two"));
    }

    #[test]
    fn background_comes_from_render_config() {
        let mut tree = Tree::new();
        tree.add_node(None, "effect", "Effect");
        let render = crate::config::parse_config(r##"{"render": {"background": "#000000"}}"##)
            .unwrap()
            .render;
        let svg = render_with(&tree, &render);
        assert!(svg.contains("<rect width=\"100%\" height=\"100%\" fill=\"#000000\"/>"));
        assert!(!svg.contains("fill=\"#FFFFFF\""));
    }

    #[test]
    fn feedback_votes_draw_bars_by_node_key() {
        use crate::ir::FeedbackRow;

        let mut tree = Tree::new();
        let root = tree.add_node(None, "/effect", "Effect");
        tree.add_node(Some(root), "/effect/machine", "Machine");
        tree.add_node(Some(root), "/effect/method", "Method");
        let vote = |k: &str, rate: f64| FeedbackRow {
            k: k.to_string(),
            rate,
        };
        let render = RenderConfig {
            feedback: vec![
                vote("machine", 1.0),
                vote("machine", 2.0),
                vote("machine", -1.0),
                vote("method", -4.0),
                vote("nobody", 1.0),
            ],
            ..RenderConfig::default()
        };
        let svg = render_with(&tree, &render);
        assert_eq!(svg.matches("<rect class=\"positive\"").count(), 1);
        assert_eq!(svg.matches("<rect class=\"negative\"").count(), 2);
        assert!(svg.contains(
            "<rect class=\"positive\" x=\"0\" y=\"-2\" width=\"2\" height=\"2\""
        ));
        assert!(svg.contains(
            "<rect class=\"negative\" x=\"-1\" y=\"-2\" width=\"1\" height=\"2\""
        ));
        assert!(svg.contains(
            "<rect class=\"negative\" x=\"-4\" y=\"-2\" width=\"4\" height=\"2\""
        ));

        let machine = svg.find(">Machine<").unwrap();
        let bar = svg.find("class=\"positive\"").unwrap();
        let group_end = machine + svg[machine..].find("</g>").unwrap();
        assert!(bar > machine && bar < group_end);
    }
}
