use std::fmt;

use serde::{Deserialize, Serialize};

/// Board symbols in sampling order.
///
/// The declaration order is part of the fairness contract: weighted picks walk
/// the table in this order, so reordering variants changes every grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    A,
    B,
    C,
    D,
    #[serde(rename = "S")]
    Scatter,
    #[serde(rename = "G")]
    Gold,
    #[serde(rename = "R")]
    Rainbow,
    #[serde(rename = "CLO")]
    Clover,
    #[serde(rename = "P")]
    Pot,
}

impl Symbol {
    pub const COUNT: usize = 9;

    pub const ALL: [Symbol; Symbol::COUNT] = [
        Symbol::A,
        Symbol::B,
        Symbol::C,
        Symbol::D,
        Symbol::Scatter,
        Symbol::Gold,
        Symbol::Rainbow,
        Symbol::Clover,
        Symbol::Pot,
    ];

    /// The four symbols that form clusters and pay.
    pub const PAYING: [Symbol; 4] = [Symbol::A, Symbol::B, Symbol::C, Symbol::D];

    pub fn from_index(i: u8) -> Option<Self> {
        Self::ALL.get(i as usize).copied()
    }

    pub fn to_index(self) -> u8 {
        match self {
            Symbol::A => 0,
            Symbol::B => 1,
            Symbol::C => 2,
            Symbol::D => 3,
            Symbol::Scatter => 4,
            Symbol::Gold => 5,
            Symbol::Rainbow => 6,
            Symbol::Clover => 7,
            Symbol::Pot => 8,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Symbol::A => "A",
            Symbol::B => "B",
            Symbol::C => "C",
            Symbol::D => "D",
            Symbol::Scatter => "S",
            Symbol::Gold => "G",
            Symbol::Rainbow => "R",
            Symbol::Clover => "CLO",
            Symbol::Pot => "P",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    pub fn is_paying(self) -> bool {
        matches!(self, Symbol::A | Symbol::B | Symbol::C | Symbol::D)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
