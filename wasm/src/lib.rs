use fishbone_rs::parser::{ParseError, parse_feedback};
use fishbone_rs::{RenderOptions, render_with_options};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FishboneRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    width: Option<f64>,
    height: Option<f64>,
    margin: Option<f64>,
    seed: Option<u64>,
    /// JSON array of `{k, rate}` votes.
    feedback: Option<String>,
}

fn build_render_options(options: FishboneRenderOptions) -> Result<RenderOptions, ParseError> {
    let mut render_options = match options.theme.as_deref() {
        Some("modern") => RenderOptions::modern(),
        _ => RenderOptions::classic(),
    };

    // No system fonts in the browser sandbox.
    render_options.layout.fast_text_metrics = true;

    if let Some(font_family) = options.font_family {
        render_options.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        render_options.theme.font_size = font_size;
    }
    if let Some(width) = options.width {
        render_options.layout.width = width;
    }
    if let Some(height) = options.height {
        render_options.layout.height = height;
    }
    if let Some(margin) = options.margin {
        render_options.layout.margin = margin;
    }
    if let Some(seed) = options.seed {
        render_options.layout.simulation.random_seed = seed;
    }
    if let Some(feedback) = options.feedback.as_deref() {
        render_options.render.feedback = parse_feedback(feedback)?;
    }

    Ok(render_options)
}

#[wasm_bindgen]
pub fn render_fishbone_svg(code: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<FishboneRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        FishboneRenderOptions::default()
    };

    let render_options =
        build_render_options(options).map_err(|error| JsValue::from_str(&error.to_string()))?;
    render_with_options(code, render_options).map_err(|error| JsValue::from_str(&error.to_string()))
}

#[cfg(test)]
mod tests {
    use fishbone_rs::render_with_options;

    use crate::{FishboneRenderOptions, build_render_options};

    #[test]
    fn renders_outline_with_options() {
        let code = "fishbone\nLate delivery\n  People\n    Training\n  Process (-)\n  Tools";
        let options: FishboneRenderOptions =
            serde_json::from_str(r#"{"theme": "modern", "width": 640, "height": 480}"#)
                .expect("options should parse");
        let render_options = build_render_options(options).expect("options should build");
        let svg = render_with_options(code, render_options).expect("outline should render");

        assert!(svg.contains("<svg"));
        assert!(svg.contains("width=\"640\""));
        assert!(svg.contains("Training"));
        assert!(svg.contains("link-negative"));
    }

    #[test]
    fn feedback_option_draws_vote_bars() {
        let code = r#"[{"path": "", "k": "effect", "name": "Effect"},
            {"path": "/effect", "k": "tools", "name": "Tools"}]"#;
        let options: FishboneRenderOptions = serde_json::from_str(
            r#"{"feedback": "[{\"k\": \"tools\", \"rate\": 1}, {\"k\": \"tools\", \"rate\": -1}]"}"#,
        )
        .expect("options should parse");
        let svg = render_with_options(code, build_render_options(options).unwrap())
            .expect("rows should render");

        assert!(svg.contains("class=\"positive\""));
        assert!(svg.contains("class=\"negative\""));
    }

    #[test]
    fn malformed_feedback_is_rejected() {
        let options = FishboneRenderOptions {
            feedback: Some("[{".to_string()),
            ..FishboneRenderOptions::default()
        };
        assert!(build_render_options(options).is_err());
    }
}
