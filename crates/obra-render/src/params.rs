//! Named vector parameters handed to a filter program.

use std::collections::BTreeMap;

use glam::Vec4;

/// Mapping from parameter name to vector value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderParameters {
    vectors: BTreeMap<String, Vec4>,
}

impl ShaderParameters {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a vector parameter.
    pub fn set_vector(&mut self, name: &str, value: Vec4) {
        if let Some(slot) = self.vectors.get_mut(name) {
            *slot = value;
        } else {
            self.vectors.insert(name.to_string(), value);
        }
    }

    /// Look up a vector parameter.
    pub fn vector(&self, name: &str) -> Option<Vec4> {
        self.vectors.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
