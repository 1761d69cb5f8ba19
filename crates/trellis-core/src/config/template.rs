use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One navigation entry in the site menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuEntry>,
}

/// The `template` namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Template search paths in registration order.
    pub paths: Vec<PathBuf>,

    /// Directory for compiled templates; caching is off when unset.
    pub cache: Option<PathBuf>,

    /// Site name.
    pub site: Option<String>,

    pub menu: Vec<MenuEntry>,

    /// Analytics identifier.
    pub analytics: Option<String>,

    /// Contact address.
    pub contact: Option<String>,
}

impl TemplateConfig {
    /// Search paths in lookup order: the most recently added path first, so
    /// packages composed later can shadow templates of earlier ones.
    pub fn lookup_order(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter().rev()
    }
}
