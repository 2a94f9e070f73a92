//! Formatting classes predicted for the gaps between code tokens.
//!
//! A label of the model is a *composite* class: a short sequence of the
//! basic classes below (for example "newline, then two indentation
//! increments"). Class sequences are stored as `Vec<usize>` of class indices.

use serde::{Deserialize, Serialize};

/// A single formatting class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Class {
    Space,
    Tab,
    Newline,
    SpaceInc,
    SpaceDec,
    TabInc,
    TabDec,
    SingleQuote,
    DoubleQuote,
    /// Nothing should be emitted at this position.
    Noop,
}

/// All classes in index order.
pub const CLASSES: [Class; 10] = [
    Class::Space,
    Class::Tab,
    Class::Newline,
    Class::SpaceInc,
    Class::SpaceDec,
    Class::TabInc,
    Class::TabDec,
    Class::SingleQuote,
    Class::DoubleQuote,
    Class::Noop,
];

/// Index of [`Class::Noop`].
pub const CLASS_NOOP: usize = Class::Noop.index();

impl Class {
    /// Stable index of the class inside class sequences.
    pub const fn index(self) -> usize {
        match self {
            Class::Space => 0,
            Class::Tab => 1,
            Class::Newline => 2,
            Class::SpaceInc => 3,
            Class::SpaceDec => 4,
            Class::TabInc => 5,
            Class::TabDec => 6,
            Class::SingleQuote => 7,
            Class::DoubleQuote => 8,
            Class::Noop => 9,
        }
    }

    /// Look a class up by its index.
    pub fn from_index(index: usize) -> Option<Class> {
        CLASSES.get(index).copied()
    }

    /// Printable representation used in rule descriptions and comments.
    pub fn representation(self) -> &'static str {
        match self {
            Class::Space => "␣",
            Class::Tab => "⇥",
            Class::Newline => "⏎",
            Class::SpaceInc => "+␣",
            Class::SpaceDec => "-␣",
            Class::TabInc => "+⇥",
            Class::TabDec => "-⇥",
            Class::SingleQuote => "'",
            Class::DoubleQuote => "\"",
            Class::Noop => "∅",
        }
    }
}

/// Concatenate the representations of a class sequence.
///
/// Unknown indices render as `?` so a corrupt label table still prints.
pub fn composite_representation(sequence: &[usize]) -> String {
    sequence
        .iter()
        .map(|&index| Class::from_index(index).map_or("?", Class::representation))
        .collect()
}
