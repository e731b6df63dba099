//! Test identity and identifier derivation

use serde::{Deserialize, Serialize};

/// Turn a fully-qualified test node id into a file-safe identifier.
///
/// Every `/`, `\` and `:` becomes `_`. The result is stable across runs of
/// the same test, but two different node ids that differ only in those
/// characters collapse to the same identifier. Deeply nested test paths are
/// the likely source of such collisions.
pub fn derive_test_id(node_id: &str) -> String {
    node_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

/// Turn a directory or marker name into a display label (`order_history` -> `Order History`)
pub fn display_label(raw: &str) -> String {
    raw.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Everything the harness knows about a test before it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentity {
    /// Fully-qualified node id, e.g. `tests/ui/cart/cart.rs::add_item[case1]`
    pub node_id: String,

    /// File-safe identifier derived from the node id
    pub test_id: String,

    pub title: String,

    pub description: Option<String>,

    /// e.g. `ui`, from the first directory under `tests/`
    pub category: Option<String>,

    /// Display module, from the second directory under `tests/`
    pub module: String,

    pub tags: Vec<String>,
}

impl TestIdentity {
    /// Build an identity, inferring category and module from the node path
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        let (path, name) = match node_id.split_once("::") {
            Some((path, name)) => (path, Some(name)),
            None => (node_id.as_str(), None),
        };

        let segments: Vec<&str> = path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
        let dirs: &[&str] = match segments.iter().position(|s| *s == "tests") {
            Some(idx) if segments.len() > idx + 1 => &segments[idx + 1..segments.len() - 1],
            _ => &[],
        };

        let category = dirs.first().map(|c| c.to_string());
        let module = match dirs {
            [_, module, ..] => display_label(module),
            [only] => display_label(only),
            [] => "Unspecified".to_string(),
        };
        let title = match name {
            Some(name) => name.rsplit("::").next().unwrap_or(name),
            None => file_stem(segments.last().copied().unwrap_or(path)),
        }
        .to_string();
        let tags = dirs.iter().map(|d| d.to_string()).collect();

        Self {
            test_id: derive_test_id(&node_id),
            title,
            description: None,
            category,
            module,
            tags,
            node_id,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// File name without its extension: `login.rs` becomes `login`
fn file_stem(file: &str) -> &str {
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}
