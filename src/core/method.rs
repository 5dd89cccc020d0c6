//! # Representation Methods
//!
//! The closed set of interactive representations a question can be turned into.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationMethod {
    /// Drag objects onto a single target.
    Addition,
    /// Click objects to remove them.
    Deletion,
    /// Drag objects into equal groups.
    Division,
}

impl RepresentationMethod {
    pub const ALL: [RepresentationMethod; 3] = [
        RepresentationMethod::Addition,
        RepresentationMethod::Deletion,
        RepresentationMethod::Division,
    ];

    /// Wire name, used as the tool name and the `method` tag.
    pub fn as_str(self) -> &'static str {
        match self {
            RepresentationMethod::Addition => "addition",
            RepresentationMethod::Deletion => "deletion",
            RepresentationMethod::Division => "division",
        }
    }
}

impl fmt::Display for RepresentationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepresentationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
