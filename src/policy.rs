//! Policy configuration lookup.
//!
//! The cluster client that fetches storage classes is an external
//! collaborator; the engine only sees it through [`PolicySource`].

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyLookupError {
    #[error("storage class {0:?} not found")]
    NotFound(String),

    /// Transport or API failure reported by the cluster client
    #[error("policy lookup failed: {0}")]
    Unavailable(String),
}

/// Source of storage class parameters, keyed by class name
pub trait PolicySource: Send + Sync {
    /// Fetch the raw parameter map for `class`.
    fn parameters(&self, class: &str) -> Result<HashMap<String, String>, PolicyLookupError>;
}

/// Storage classes held in memory.
///
/// Used by the CLI, which takes parameters on the command line, and by tests.
#[derive(Debug, Default)]
pub struct InMemoryPolicySource {
    classes: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryPolicySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_class(self, class: impl Into<String>, parameters: HashMap<String, String>) -> Self {
        self.insert(class, parameters);
        self
    }

    /// Add or replace a storage class
    pub fn insert(&self, class: impl Into<String>, parameters: HashMap<String, String>) {
        let mut classes = self
            .classes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        classes.insert(class.into(), parameters);
    }

    /// Remove a storage class, returning its parameters if it existed
    pub fn remove(&self, class: &str) -> Option<HashMap<String, String>> {
        let mut classes = self
            .classes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        classes.remove(class)
    }
}

impl PolicySource for InMemoryPolicySource {
    fn parameters(&self, class: &str) -> Result<HashMap<String, String>, PolicyLookupError> {
        let classes = self
            .classes
            .read()
            .map_err(|_| PolicyLookupError::Unavailable("policy table lock poisoned".into()))?;
        classes
            .get(class)
            .cloned()
            .ok_or_else(|| PolicyLookupError::NotFound(class.to_string()))
    }
}
