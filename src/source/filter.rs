//! Search filters exposed by catalogue sources
//!
//! The bridge never edits filters; it only hands a source its own default
//! filter list back when searching.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Header { name: String },
    Separator,
    Text { name: String, state: String },
    CheckBox { name: String, state: bool },
    /// 0 = ignore, 1 = include, 2 = exclude
    TriState { name: String, state: u8 },
    Select { name: String, values: Vec<String>, state: usize },
    Group { name: String, filters: Vec<Filter> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterList(pub Vec<Filter>);

impl FilterList {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.0.iter()
    }
}
