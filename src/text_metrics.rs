use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Advance width of `text` in the first installed font matching the CSS
/// `font_family` list. `None` when no usable font is found.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = normalize_family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = self.load_face(&key);
            self.faces.insert(key.clone(), face);
        }
        let face = self.faces.get_mut(&key)?.as_mut()?;
        face.measure_width(&text.replace('\t', "    "), font_size)
    }

    fn load_face(&mut self, family_key: &str) -> Option<FontFace> {
        if let Some(face) = load_cached_face(family_key) {
            return Some(face);
        }

        let names = family_list(family_key);
        let families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name {
                FamilyName::Generic(family) => *family,
                FamilyName::Named(name) => Family::Name(name.as_str()),
            })
            .collect();

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
            tracing::debug!(faces = self.db.len(), "loaded system fonts");
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let Some(id) = self.db.query(&query) else {
            tracing::debug!(family = family_key, "no font matches family list");
            return None;
        };
        self.db
            .with_face_data(id, |data, index| {
                let face = FontFace::parse(data.to_vec(), index)?;
                store_cached_face(family_key, &face);
                Some(face)
            })
            .flatten()
    }
}

enum FamilyName {
    Generic(Family<'static>),
    Named(String),
}

/// Splits a CSS font-family list, mapping generic keywords onto fontdb's
/// generic families. An empty list means sans-serif.
fn family_list(font_family: &str) -> Vec<FamilyName> {
    let mut out: Vec<FamilyName> = font_family
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\''))
        .filter(|raw| !raw.is_empty())
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "serif" => FamilyName::Generic(Family::Serif),
            "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                FamilyName::Generic(Family::SansSerif)
            }
            "monospace" | "ui-monospace" => FamilyName::Generic(Family::Monospace),
            "cursive" => FamilyName::Generic(Family::Cursive),
            "fantasy" => FamilyName::Generic(Family::Fantasy),
            _ => FamilyName::Named(raw.to_string()),
        })
        .collect();
    if out.is_empty() {
        out.push(FamilyName::Generic(Family::SansSerif));
    }
    out
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
    advances: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
            advances: HashMap::new(),
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;
        let advance_width = |advance: u16| {
            if advance == 0 {
                fallback
            } else {
                advance as f32 * scale
            }
        };

        if text.is_ascii() {
            let width: f32 = text
                .bytes()
                .filter(|byte| *byte != b'\n')
                .map(|byte| advance_width(self.ascii_advances[byte as usize]))
                .sum();
            return Some(width);
        }

        let missing: Vec<char> = text
            .chars()
            .filter(|ch| !ch.is_ascii() && !self.advances.contains_key(ch))
            .collect();
        if !missing.is_empty() {
            let face = Face::parse(&self.data, self.index).ok()?;
            for ch in missing {
                let advance = face
                    .glyph_index(ch)
                    .map(|glyph| face.glyph_hor_advance(glyph).unwrap_or(0));
                self.advances.insert(ch, advance);
            }
        }

        let mut width = 0.0f32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = if ch.is_ascii() {
                Some(self.ascii_advances[ch as usize])
            } else {
                self.advances.get(&ch).copied().flatten()
            };
            width += advance.map(advance_width).unwrap_or(fallback);
        }
        Some(width)
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

fn cache_paths(family_key: &str) -> Option<(PathBuf, PathBuf)> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    family_key.hash(&mut hasher);
    let hash = hasher.finish();
    let dir = base.join("fishbone").join("font-cache");
    Some((dir.join(format!("{hash:x}.font")), dir.join(format!("{hash:x}.meta"))))
}

fn load_cached_face(family_key: &str) -> Option<FontFace> {
    let (font_path, meta_path) = cache_paths(family_key)?;
    let bytes = fs::read(font_path).ok()?;
    let index: u32 = fs::read_to_string(meta_path).ok()?.trim().parse().ok()?;
    FontFace::parse(bytes, index)
}

// Best effort: a cache write failure only costs a font scan next run.
fn store_cached_face(family_key: &str, face: &FontFace) {
    let Some((font_path, meta_path)) = cache_paths(family_key) else {
        return;
    };
    if font_path.exists() {
        return;
    }
    if let Some(parent) = font_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = fs::write(&font_path, &face.data);
    let _ = fs::write(&meta_path, face.index.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_list_maps_generic_keywords() {
        let names = family_list("\"Inter\", system-ui, monospace");
        assert_eq!(names.len(), 3);
        assert!(matches!(&names[0], FamilyName::Named(name) if name == "Inter"));
        assert!(matches!(names[1], FamilyName::Generic(Family::SansSerif)));
        assert!(matches!(names[2], FamilyName::Generic(Family::Monospace)));
    }

    #[test]
    fn empty_family_list_defaults_to_sans() {
        let names = family_list("  ,  ");
        assert!(matches!(names[..], [FamilyName::Generic(Family::SansSerif)]));
        assert_eq!(normalize_family_key("  "), "sans-serif");
    }

    #[test]
    fn empty_text_has_zero_width() {
        assert_eq!(measure_text_width("", 14.0, "sans-serif"), Some(0.0));
        assert_eq!(measure_text_width("abc", 0.0, "sans-serif"), Some(0.0));
    }
}
