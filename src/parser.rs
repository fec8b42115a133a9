use crate::ir::{FeedbackRow, Tree};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^fishbone(?:\s+diagram)?\s*$").unwrap());
static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*+]|\d+[.)])\s+").unwrap());
static RATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\((?P<sign>[+-])(?P<value>\d+(?:\.\d+)?)?\)\s*$").unwrap()
});

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("input contains no fishbone nodes")]
    Empty,
    #[error("invalid JSON input: {0}")]
    Json(String),
    #[error("row list has no root row")]
    MissingRoot,
}

/// Which of the accepted input shapes a document was read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Tree,
    Rows,
    Outline,
}

#[derive(Debug)]
pub struct ParseOutput {
    pub tree: Tree,
    pub format: InputFormat,
    pub init_config: Option<serde_json::Value>,
}

pub fn parse_fishbone(input: &str) -> Result<ParseOutput, ParseError> {
    let (body, init_config) = preprocess_input(input);
    let trimmed = body.trim_start();
    let (tree, format) = if trimmed.starts_with('{') {
        (parse_tree_json(trimmed)?, InputFormat::Tree)
    } else if trimmed.starts_with('[') {
        (parse_rows_json(trimmed)?, InputFormat::Rows)
    } else {
        (parse_outline(&body)?, InputFormat::Outline)
    };
    if tree.is_empty() {
        return Err(ParseError::Empty);
    }
    tracing::debug!(?format, nodes = tree.len(), "parsed fishbone input");
    Ok(ParseOutput {
        tree,
        format,
        init_config,
    })
}

/// Drops `%%` comment lines, keeping the last `%%{init: ...}%%` payload.
fn preprocess_input(input: &str) -> (String, Option<serde_json::Value>) {
    let mut init_config = None;
    let mut lines = Vec::new();
    for raw_line in input.lines() {
        let trimmed_line = raw_line.trim();
        if let Some(caps) = INIT_RE.captures(trimmed_line) {
            if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                match from_json_or_json5::<serde_json::Value>(json_str) {
                    Ok(value) => init_config = Some(value),
                    Err(err) => tracing::warn!(%err, "ignoring malformed init directive"),
                }
            }
            continue;
        }
        if trimmed_line.starts_with("%%") {
            continue;
        }
        lines.push(raw_line);
    }
    (lines.join("\n"), init_config)
}

fn from_json_or_json5<T: serde::de::DeserializeOwned>(input: &str) -> Result<T, ParseError> {
    match serde_json::from_str(input) {
        Ok(value) => Ok(value),
        Err(_) => json5::from_str(input).map_err(|err| ParseError::Json(err.to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Key {
    Number(serde_json::Number),
    String(String),
}

impl Key {
    fn into_string(self) -> String {
        match self {
            Key::Number(value) => value.to_string(),
            Key::String(value) => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TreeInput {
    #[serde(alias = "label")]
    name: Option<String>,
    id: Option<Key>,
    rate: Option<f64>,
    #[serde(default)]
    children: Vec<TreeInput>,
}

fn parse_tree_json(input: &str) -> Result<Tree, ParseError> {
    let root: TreeInput = from_json_or_json5(input)?;
    let mut tree = Tree::new();
    let mut stack = vec![(None, root)];
    // Children are pushed reversed so the arena keeps preorder.
    while let Some((parent, node)) = stack.pop() {
        let label = node.name.unwrap_or_default();
        let id = node
            .id
            .map(Key::into_string)
            .unwrap_or_else(|| format!("n{}", tree.len()));
        let idx = tree.add_node(parent, &id, &label);
        tree.set_rate(idx, node.rate);
        for child in node.children.into_iter().rev() {
            stack.push((Some(idx), child));
        }
    }
    Ok(tree)
}

#[derive(Debug, Deserialize)]
struct RowInput {
    #[serde(default)]
    path: String,
    k: Key,
    name: Option<String>,
    rate: Option<f64>,
}

/// Flat rows address their parent by path: a row's children are the rows
/// whose `path` equals `{path}/{k}`. The root is the shallowest row.
fn parse_rows_json(input: &str) -> Result<Tree, ParseError> {
    let rows: Vec<RowInput> = from_json_or_json5(input)?;
    if rows.is_empty() {
        return Err(ParseError::Empty);
    }
    let rows: Vec<(String, String, RowInput)> = rows
        .into_iter()
        .map(|mut row| {
            let k = std::mem::replace(&mut row.k, Key::String(String::new())).into_string();
            let key = format!("{}/{}", row.path, k);
            (k, key, row)
        })
        .collect();

    let root = rows
        .iter()
        .enumerate()
        .min_by_key(|(idx, (_, _, row))| (path_depth(&row.path), *idx))
        .map(|(idx, _)| idx)
        .ok_or(ParseError::MissingRoot)?;

    let mut by_parent: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, (_, _, row)) in rows.iter().enumerate() {
        by_parent.entry(row.path.as_str()).or_default().push(idx);
    }

    let mut tree = Tree::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(None, root)];
    while let Some((parent, row_idx)) = stack.pop() {
        if !visited.insert(row_idx) {
            continue;
        }
        let (k, key, row) = &rows[row_idx];
        let label = row.name.clone().unwrap_or_else(|| k.clone());
        let idx = tree.add_node(parent, key, &label);
        tree.set_rate(idx, row.rate);
        if let Some(children) = by_parent.get(key.as_str()) {
            for child in children.iter().rev() {
                stack.push((Some(idx), *child));
            }
        }
    }

    let orphans = rows.len() - visited.len();
    if orphans > 0 {
        tracing::warn!(orphans, "rows not reachable from the root were dropped");
    }
    Ok(tree)
}

/// Counts empty segments too, so `""` ranks above `"/"`.
fn path_depth(path: &str) -> usize {
    path.split('/').count()
}

#[derive(Debug, Deserialize)]
struct FeedbackInput {
    k: Key,
    rate: Option<f64>,
}

/// Reads a JSON/JSON5 array of `{ "k": ..., "rate": n }` votes. Rows without
/// a rate count as neutral.
pub fn parse_feedback(input: &str) -> Result<Vec<FeedbackRow>, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<FeedbackInput> = from_json_or_json5(trimmed)?;
    Ok(rows
        .into_iter()
        .map(|row| FeedbackRow {
            k: row.k.into_string(),
            rate: row.rate.unwrap_or(0.0),
        })
        .collect())
}

/// One node per line, nested by indentation. The first line is the root and
/// every later line hangs somewhere below it.
fn parse_outline(input: &str) -> Result<Tree, ParseError> {
    let mut tree = Tree::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut base_indent: Option<usize> = None;
    let mut ids: HashSet<String> = HashSet::new();

    for raw_line in input.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if tree.is_empty() && HEADER_RE.is_match(trimmed) {
            continue;
        }

        let indent = count_indent(raw_line);
        let base = *base_indent.get_or_insert(indent);
        let (label, rate) = parse_outline_item(trimmed);
        let id = unique_id(&label, &mut ids);

        if stack.is_empty() {
            let idx = tree.add_node(None, &id, &label);
            tree.set_rate(idx, rate);
            stack.push(idx);
            continue;
        }

        let level = (indent.saturating_sub(base) / 2).clamp(1, stack.len());
        stack.truncate(level);
        let parent = stack.last().copied();
        let idx = tree.add_node(parent, &id, &label);
        tree.set_rate(idx, rate);
        stack.push(idx);
    }
    Ok(tree)
}

fn parse_outline_item(line: &str) -> (String, Option<f64>) {
    let line = BULLET_RE.replace(line, "");
    let (text, rate) = match RATE_RE.captures(&line) {
        Some(caps) => {
            let magnitude = caps
                .name("value")
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(1.0);
            let sign = if &caps["sign"] == "-" { -1.0 } else { 1.0 };
            let start = caps.get(0).map(|m| m.start()).unwrap_or(line.len());
            (&line[..start], Some(sign * magnitude))
        }
        None => (&line[..], None),
    };
    (strip_quotes(text), rate)
}

fn unique_id(label: &str, seen: &mut HashSet<String>) -> String {
    let mut base: String = label
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    base = base.trim_matches('_').to_string();
    if base.is_empty() {
        base = "node".to_string();
    }
    let mut id = base.clone();
    let mut n = 1;
    while !seen.insert(id.clone()) {
        n += 1;
        id = format!("{base}_{n}");
    }
    id
}

fn strip_quotes(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else if trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn count_indent(line: &str) -> usize {
    let mut count = 0;
    for ch in line.chars() {
        match ch {
            ' ' => count += 1,
            '\t' => count += 2,
            _ => break,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(tree: &Tree, idx: usize) -> Vec<&str> {
        tree.children(idx)
            .iter()
            .filter_map(|child| tree.node(*child))
            .map(|node| node.label.as_str())
            .collect()
    }

    #[test]
    fn parses_nested_json_tree() {
        let input = r#"{"name": "Effect", "children": [
            {"name": "People", "rate": -2, "children": [{"label": "Training"}]},
            {"name": "Process"}
        ]}"#;
        let parsed = parse_fishbone(input).unwrap();
        assert_eq!(parsed.format, InputFormat::Tree);
        let tree = &parsed.tree;
        assert_eq!(tree.len(), 4);
        let root = tree.root.unwrap();
        assert_eq!(labels(tree, root), vec!["People", "Process"]);
        assert_eq!(labels(tree, 1), vec!["Training"]);
        assert_eq!(tree.node(1).unwrap().rate, Some(-2.0));
    }

    #[test]
    fn parses_json5_tree() {
        let input = "{name: 'Effect', children: [{name: 'A', id: 'cause-a'},],}";
        let parsed = parse_fishbone(input).unwrap();
        assert_eq!(parsed.tree.len(), 2);
        assert_eq!(parsed.tree.node(1).unwrap().id, "cause-a");
        assert_eq!(parsed.tree.node(0).unwrap().id, "n0");
    }

    #[test]
    fn parses_flat_rows() {
        let input = r#"[
            {"path": "/1", "k": 2, "name": "Machine"},
            {"path": "", "k": 1, "name": "Defect"},
            {"path": "/1", "k": 3, "name": "Method", "rate": 1},
            {"path": "/1/2", "k": 4, "name": "Wear"}
        ]"#;
        let parsed = parse_fishbone(input).unwrap();
        assert_eq!(parsed.format, InputFormat::Rows);
        let tree = &parsed.tree;
        let root = tree.root.unwrap();
        assert_eq!(tree.node(root).unwrap().label, "Defect");
        assert_eq!(labels(tree, root), vec!["Machine", "Method"]);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn empty_path_outranks_bare_slash_for_root() {
        let input = r#"[
            {"path": "/", "k": "stray", "name": "Stray"},
            {"path": "", "k": "effect", "name": "Effect"},
            {"path": "/effect", "k": "a", "name": "A"}
        ]"#;
        let tree = parse_fishbone(input).unwrap().tree;
        let root = tree.root.unwrap();
        assert_eq!(tree.node(root).unwrap().label, "Effect");
        assert_eq!(labels(&tree, root), vec!["A"]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn parses_feedback_rows() {
        let input = r#"[{"k": "a", "rate": 1}, {"k": 7, "rate": -2}, {"k": "a"}]"#;
        let rows = parse_feedback(input).unwrap();
        assert_eq!(
            rows,
            vec![
                FeedbackRow { k: "a".to_string(), rate: 1.0 },
                FeedbackRow { k: "7".to_string(), rate: -2.0 },
                FeedbackRow { k: "a".to_string(), rate: 0.0 },
            ]
        );
        let relaxed = parse_feedback("[{k: 'b', rate: -1,},]").unwrap();
        assert_eq!(relaxed, vec![FeedbackRow { k: "b".to_string(), rate: -1.0 }]);
        assert!(parse_feedback("  ").unwrap().is_empty());
        assert!(matches!(parse_feedback("{"), Err(ParseError::Json(_))));
    }

    #[test]
    fn empty_row_list_is_rejected() {
        assert!(matches!(parse_fishbone("[]"), Err(ParseError::Empty)));
    }

    #[test]
    fn parses_indented_outline() {
        let input = "fishbone\nLate delivery\n  - People (-)\n    - Training\n  - Tools (+2)\n\tProcess";
        let parsed = parse_fishbone(input).unwrap();
        assert_eq!(parsed.format, InputFormat::Outline);
        let tree = &parsed.tree;
        let root = tree.root.unwrap();
        assert_eq!(tree.node(root).unwrap().label, "Late delivery");
        assert_eq!(labels(tree, root), vec!["People", "Tools", "Process"]);
        assert_eq!(labels(tree, 1), vec!["Training"]);
        assert_eq!(tree.node(1).unwrap().rate, Some(-1.0));
        assert_eq!(tree.node(3).unwrap().rate, Some(2.0));
    }

    #[test]
    fn outline_siblings_of_root_attach_below_it() {
        let parsed = parse_fishbone("Effect\nA\nB").unwrap();
        assert_eq!(labels(&parsed.tree, 0), vec!["A", "B"]);
    }

    #[test]
    fn outline_ids_are_unique() {
        let parsed = parse_fishbone("Root\n  Cause\n  Cause").unwrap();
        let ids: Vec<&str> = parsed.tree.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "cause", "cause_2"]);
    }

    #[test]
    fn init_directive_is_captured() {
        let input = "%%{init: {'layout': {'width': 640}}}%%\n%% note\nRoot\n  A";
        let parsed = parse_fishbone(input).unwrap();
        let init = parsed.init_config.unwrap();
        assert_eq!(init["layout"]["width"].as_f64(), Some(640.0));
        assert_eq!(parsed.tree.len(), 2);
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(matches!(parse_fishbone("fishbone\n\n"), Err(ParseError::Empty)));
        assert!(matches!(parse_fishbone("{oops"), Err(ParseError::Json(_))));
    }

    #[test]
    fn quoted_labels_keep_parentheses() {
        let (label, rate) = parse_outline_item("* \"Budget (Q3)\"");
        assert_eq!(label, "Budget (Q3)");
        assert_eq!(rate, None);
    }
}
