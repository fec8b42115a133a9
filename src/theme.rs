use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub root_font_size: f32,
    pub text_color: String,
    pub root_text_color: String,
    pub line_color: String,
    pub positive_color: String,
    pub negative_color: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            root_font_size: 20.0,
            text_color: "#333333".to_string(),
            root_text_color: "#000000".to_string(),
            line_color: "#333333".to_string(),
            positive_color: "#2E7D32".to_string(),
            negative_color: "#C62828".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            root_font_size: 18.0,
            text_color: "#1C2430".to_string(),
            root_text_color: "#0B1220".to_string(),
            line_color: "#7A8AA6".to_string(),
            positive_color: "#3A7BD5".to_string(),
            negative_color: "#D64545".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    /// Font size used for labels at the given depth.
    pub fn label_font_size(&self, depth: usize) -> f32 {
        if depth == 0 {
            self.root_font_size
        } else {
            self.font_size
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "modern" => Some(Self::modern()),
            "classic" | "default" | "base" => Some(Self::classic()),
            _ => None,
        }
    }
}
