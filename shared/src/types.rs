//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Unit of measure for stock quantities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Kilogram,
    Liter,
    Piece,
}

impl Unit {
    pub fn code(&self) -> &'static str {
        match self {
            Unit::Kilogram => "kg",
            Unit::Liter => "l",
            Unit::Piece => "pcs",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "kg" => Some(Unit::Kilogram),
            "l" => Some(Unit::Liter),
            "pcs" => Some(Unit::Piece),
            _ => None,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
