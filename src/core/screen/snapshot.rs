//! Read-only screen copies handed to callers and renderers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::buffer::{grid_text, row_text, Dimensions};
use super::cell::Cell;

/// Point-in-time copy of a screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenSnapshot {
    /// Screen size
    pub dimensions: Dimensions,
    /// Cursor position (row, col)
    pub cursor: (u16, u16),
    /// Cells in row-major order
    pub cells: Vec<Cell>,
    /// When the copy was taken
    pub captured_at: DateTime<Utc>,
}

impl ScreenSnapshot {
    pub(crate) fn new(dimensions: Dimensions, cursor: (u16, u16), cells: Vec<Cell>) -> Self {
        Self {
            dimensions,
            cursor,
            cells,
            captured_at: Utc::now(),
        }
    }

    /// Whole screen as newline-joined rows
    pub fn as_text(&self) -> String {
        grid_text(&self.cells, self.dimensions)
    }

    /// One row as text
    pub fn row_text(&self, row: u16) -> Option<String> {
        row_text(&self.cells, self.dimensions, row)
    }

    /// Cell at a position
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        if self.dimensions.contains(row, col) {
            self.cells
                .get(usize::from(row) * usize::from(self.dimensions.cols) + usize::from(col))
        } else {
            None
        }
    }

    /// Whether any row contains the text
    pub fn contains(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// First (row, col) where the text starts; matches do not span rows
    pub fn find(&self, text: &str) -> Option<(u16, u16)> {
        if text.is_empty() {
            return Some((0, 0));
        }
        (0..self.dimensions.rows).find_map(|row| {
            let line: Vec<char> = self.row_text(row)?.chars().collect();
            let needle: Vec<char> = text.chars().collect();
            line.windows(needle.len())
                .position(|w| w == needle.as_slice())
                .and_then(|col| u16::try_from(col).ok())
                .map(|col| (row, col))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::screen::ScreenBuffer;

    #[test]
    fn test_snapshot_is_detached() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(2, 10).unwrap());
        let cells: Vec<Cell> = "Sign On".chars().map(Cell::plain).collect();
        buffer.write_run(1, 2, &cells).unwrap();

        let snap = buffer.snapshot();
        buffer.clear();

        assert_eq!(snap.find("On"), Some((1, 7)));
        assert!(snap.contains("Sign"));
        assert!(!snap.contains("Off"));
        assert_eq!(snap.row_text(1).unwrap(), "  Sign On ");
        assert_eq!(snap.cell(1, 2).unwrap().c, 'S');
        assert!(buffer.snapshot().find("Sign").is_none());
    }

    #[test]
    fn test_snapshot_serializes() {
        let buffer = ScreenBuffer::new(Dimensions::new(1, 2).unwrap());
        let json = serde_json::to_string(&buffer.snapshot()).unwrap();
        let back: ScreenSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_text(), "  ");
    }
}
