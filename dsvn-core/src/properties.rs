//! SVN Property Storage
//!
//! Manages versioned properties for files and directories

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Property value
pub type PropertyValue = String;

/// Property store for a single path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySet {
    /// Properties for this path
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl PropertySet {
    /// Create a new empty property set
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
        }
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Set a property value
    pub fn set(&mut self, name: String, value: PropertyValue) {
        self.properties.insert(name, value);
    }

    /// Remove a property
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    /// List all property names
    pub fn list(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    /// Check if property exists
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }
}

impl Default for PropertySet {
    fn default() -> Self {
        Self::new()
    }
}

/// Global property store
pub struct PropertyStore {
    /// Path -> PropertySet mapping
    #[allow(dead_code)]
    properties: Arc<RwLock<HashMap<String, PropertySet>>>,
}

impl PropertyStore {
    /// Create a new property store
    pub fn new() -> Self {
        Self {
            properties: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get properties for a path
    pub async fn get(&self, path: &str) -> PropertySet {
        let props = self.properties.read().await;
        props.get(path).cloned().unwrap_or_default()
    }

    /// Set a property on a path
    pub async fn set(&self, path: String, name: String, value: PropertyValue) -> Result<()> {
        let mut props = self.properties.write().await;
        let prop_set = props.entry(path).or_insert_with(PropertySet::new);
        prop_set.set(name, value);
        Ok(())
    }

    /// Remove a property from a path
    pub async fn remove(&self, path: &str, name: &str) -> Result<Option<PropertyValue>> {
        let mut props = self.properties.write().await;
        if let Some(prop_set) = props.get_mut(path) {
            Ok(prop_set.remove(name))
        } else {
            Ok(None)
        }
    }

    /// List all properties for a path
    pub async fn list(&self, path: &str) -> Vec<String> {
        let props = self.properties.read().await;
        props.get(path)
            .map(|p| p.list())
            .unwrap_or_default()
    }

    /// Check if a path has a specific property
    pub async fn contains(&self, path: &str, name: &str) -> bool {
        let props = self.properties.read().await;
        props.get(path)
            .map(|p| p.contains(name))
            .unwrap_or(false)
    }
}

/// SVN standard properties
pub mod svn_props {
    /// Executable flag
    pub const EXECUTABLE: &str = "svn:executable";

    /// MIME type
    pub const MIME_TYPE: &str = "svn:mime-type";

    /// Ignore patterns
    pub const IGNORE: &str = "svn:ignore";

    /// End-of-line style
    pub const EOL_STYLE: &str = "svn:eol-style";

    /// Keywords
    pub const KEYWORDS: &str = "svn:keywords";

    /// Needs lock
    pub const NEEDS_LOCK: &str = "svn:needs-lock";

    /// Special property (directory)
    pub const SPECIAL: &str = "svn:special";

    /// Externals
    pub const EXTERNALS: &str = "svn:externals";

    /// Merge info
    pub const MERGE_INFO: &str = "svn:mergeinfo";

    /// Value for svn:executable
    pub const EXECUTABLE_VALUE: &str = "*";

    /// Check if a property name is an SVN standard property
    pub fn is_svn_property(name: &str) -> bool {
        name.starts_with("svn:")
    }
}
