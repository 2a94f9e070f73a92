//! Code spans the formatting model classifies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position inside a source file. `line` and `col` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, col: usize) -> Self {
        Self { offset, line, col }
    }
}

/// A token or whitespace span of the source code.
///
/// `y` is the class sequence predicted for the span and `y_old` the one the
/// code actually has. Both are absent for spans that are not classified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtualNode {
    pub value: String,
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_old: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl VirtualNode {
    pub fn new(value: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            value: value.into(),
            start,
            end,
            ..Default::default()
        }
    }

    /// Attach the predicted class sequence.
    pub fn with_y(mut self, y: Vec<usize>) -> Self {
        self.y = Some(y);
        self
    }

    /// Attach the original class sequence.
    pub fn with_y_old(mut self, y_old: Vec<usize>) -> Self {
        self.y_old = Some(y_old);
        self
    }
}

impl fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}:{} -> {}:{}",
            self.value, self.start.line, self.start.col, self.end.line, self.end.col
        )
    }
}
