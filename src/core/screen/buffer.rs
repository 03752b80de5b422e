//! Fixed-size screen buffer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::cell::Cell;
use super::snapshot::ScreenSnapshot;
use crate::core::error::{Error, Result};

/// Screen size in rows and columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl Dimensions {
    /// 24x80 (3179-2 and friends)
    pub const MODEL_2: Self = Self { rows: 24, cols: 80 };
    /// 27x132 (3477-FC wide screen)
    pub const MODEL_5: Self = Self { rows: 27, cols: 132 };

    /// Validated dimensions. 5250 addresses rows and columns with one byte each.
    pub fn new(rows: u16, cols: u16) -> Result<Self> {
        if rows == 0 || cols == 0 || rows > 255 || cols > 255 {
            return Err(Error::Configuration(format!(
                "Screen size {rows}x{cols} is outside 1x1..255x255"
            )));
        }
        Ok(Self { rows, cols })
    }

    /// Total number of cells
    pub fn area(&self) -> usize {
        usize::from(self.rows) * usize::from(self.cols)
    }

    /// Whether a 0-based position is on screen
    pub fn contains(&self, row: u16, col: u16) -> bool {
        row < self.rows && col < self.cols
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::MODEL_2
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl FromStr for Dimensions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::Configuration(format!("Screen size '{s}' is not ROWSxCOLS"));
        let (rows, cols) = s.trim().split_once(['x', 'X']).ok_or_else(bad)?;
        let rows = rows.trim().parse().map_err(|_| bad())?;
        let cols = cols.trim().parse().map_err(|_| bad())?;
        Self::new(rows, cols)
    }
}

/// Rectangular area of the screen, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Top row
    pub row: u16,
    /// Left column
    pub col: u16,
    /// Number of rows
    pub height: u16,
    /// Number of columns
    pub width: u16,
}

impl Region {
    /// Create a region
    pub fn new(row: u16, col: u16, height: u16, width: u16) -> Self {
        Self { row, col, height, width }
    }

    /// Part of a single row
    pub fn span(row: u16, col: u16, width: u16) -> Self {
        Self::new(row, col, 1, width)
    }

    /// Number of cells covered
    pub fn area(&self) -> usize {
        usize::from(self.height) * usize::from(self.width)
    }

    fn fits(&self, dims: Dimensions) -> bool {
        u32::from(self.row) + u32::from(self.height) <= u32::from(dims.rows)
            && u32::from(self.col) + u32::from(self.width) <= u32::from(dims.cols)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@({},{})", self.height, self.width, self.row, self.col)
    }
}

/// Input field from the host's format table. Positions count cells in
/// reading order from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    /// First cell
    pub start: usize,
    /// Number of cells
    pub len: usize,
    /// Digits only
    pub numeric_only: bool,
    /// Changed by the operator since the last submit
    pub modified: bool,
}

impl InputField {
    /// One past the last cell
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Whether a position lies inside the field
    pub fn contains(&self, pos: usize) -> bool {
        (self.start..self.end()).contains(&pos)
    }
}

/// Grid of decoded cells for the current host screen
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    dims: Dimensions,
    cells: Vec<Cell>,
    cursor: (u16, u16),
    fields: Vec<InputField>,
}

impl ScreenBuffer {
    /// Blank buffer of the given size
    pub fn new(dims: Dimensions) -> Self {
        let mut buffer = Self {
            dims,
            cells: Vec::new(),
            cursor: (0, 0),
            fields: Vec::new(),
        };
        buffer.reset(dims);
        buffer
    }

    /// Clear and resize. Only used when a session (re)creates its screen.
    pub fn reset(&mut self, dims: Dimensions) {
        self.dims = dims;
        self.cells = vec![Cell::default(); dims.area()];
        self.cursor = (0, 0);
        self.fields.clear();
    }

    /// Screen size
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Blank every cell, drop the format table and home the cursor
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
        self.cursor = (0, 0);
        self.fields.clear();
    }

    /// Input fields in reading order
    pub fn fields(&self) -> &[InputField] {
        &self.fields
    }

    /// Add an input field starting at a position. A field already starting
    /// there is replaced; the length is cut at the end of the screen.
    pub fn define_field(&mut self, row: u16, col: u16, len: u16, numeric_only: bool) -> Result<()> {
        if !self.dims.contains(row, col) {
            return Err(Error::State(format!(
                "Field at ({row},{col}) is outside screen {}",
                self.dims
            )));
        }
        let start = self.offset(row, col);
        let len = usize::from(len).min(self.dims.area() - start);
        if len == 0 {
            return Ok(());
        }
        self.fields.retain(|f| f.start != start);
        let at = self.fields.partition_point(|f| f.start < start);
        self.fields.insert(
            at,
            InputField {
                start,
                len,
                numeric_only,
                modified: false,
            },
        );
        Ok(())
    }

    /// Drop the format table, keeping the cells
    pub fn clear_fields(&mut self) {
        self.fields.clear();
    }

    /// Index of the field covering a position
    pub fn field_index_at(&self, pos: usize) -> Option<usize> {
        self.fields.iter().position(|f| f.contains(pos))
    }

    /// Flag a field as changed by the operator
    pub fn mark_modified(&mut self, index: usize) {
        if let Some(field) = self.fields.get_mut(index) {
            field.modified = true;
        }
    }

    /// Clear every modified flag
    pub fn reset_modified(&mut self) {
        for field in &mut self.fields {
            field.modified = false;
        }
    }

    /// Characters of a field
    pub fn field_text(&self, index: usize) -> Option<String> {
        let field = self.fields.get(index)?;
        self.cells
            .get(field.start..field.end())
            .map(|cells| cells.iter().map(|c| c.c).collect())
    }

    /// Linear position of a cell
    pub fn offset(&self, row: u16, col: u16) -> usize {
        usize::from(row) * usize::from(self.dims.cols) + usize::from(col)
    }

    /// Row and column of a linear position
    // Positions are below rows * cols, both at most 255
    #[allow(clippy::cast_possible_truncation)]
    pub fn position(&self, pos: usize) -> (u16, u16) {
        let cols = usize::from(self.dims.cols).max(1);
        ((pos / cols) as u16, (pos % cols) as u16)
    }

    /// Character at a linear position
    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.cells.get(pos).map(|c| c.c)
    }

    /// Replace the character at a linear position, keeping its attributes
    pub fn put_char(&mut self, pos: usize, ch: char) {
        if let Some(cell) = self.cells.get_mut(pos) {
            cell.c = ch;
        }
    }

    /// Overwrite a rectangular region, row-major. Nothing changes on error.
    pub fn apply_update(&mut self, region: Region, cells: &[Cell]) -> Result<()> {
        if !region.fits(self.dims) {
            return Err(Error::State(format!(
                "Update region {region} exceeds screen {}",
                self.dims
            )));
        }
        if cells.len() != region.area() {
            return Err(Error::State(format!(
                "Update region {region} needs {} cells, got {}",
                region.area(),
                cells.len()
            )));
        }
        if region.width == 0 {
            return Ok(());
        }

        let cols = usize::from(self.dims.cols);
        for (offset, chunk) in cells.chunks(usize::from(region.width)).enumerate() {
            let start = (usize::from(region.row) + offset) * cols + usize::from(region.col);
            self.cells[start..start + chunk.len()].copy_from_slice(chunk);
        }
        Ok(())
    }

    /// Write cells in reading order starting at a position, wrapping at the
    /// end of each row and from the last cell back to the first
    pub fn write_run(&mut self, row: u16, col: u16, cells: &[Cell]) -> Result<()> {
        if !self.dims.contains(row, col) {
            return Err(Error::State(format!(
                "Write at ({row},{col}) is outside screen {}",
                self.dims
            )));
        }
        if cells.len() > self.dims.area() {
            return Err(Error::State(format!(
                "Write of {} cells exceeds screen {}",
                cells.len(),
                self.dims
            )));
        }

        let cols = usize::from(self.dims.cols);
        let area = self.dims.area();
        let mut pos = usize::from(row) * cols + usize::from(col);
        let mut rest = cells;
        while !rest.is_empty() {
            let take = rest.len().min(cols - pos % cols);
            let (chunk, tail) = rest.split_at(take);
            // Both values fit in u16: pos < area and take <= cols
            #[allow(clippy::cast_possible_truncation)]
            let region = Region::span((pos / cols) as u16, (pos % cols) as u16, take as u16);
            self.apply_update(region, chunk)?;
            pos = (pos + take) % area;
            rest = tail;
        }
        Ok(())
    }

    /// Move rows `top..=bottom` by `lines`, blanking the rows uncovered
    pub fn roll(&mut self, top: u16, bottom: u16, lines: u16, down: bool) -> Result<()> {
        if top > bottom || bottom >= self.dims.rows {
            return Err(Error::State(format!(
                "Roll rows {top}..={bottom} outside screen {}",
                self.dims
            )));
        }
        let cols = usize::from(self.dims.cols);
        let height = bottom - top + 1;
        let shift = usize::from(lines.min(height)) * cols;
        let current = &self.cells[usize::from(top) * cols..(usize::from(bottom) + 1) * cols];
        let len = current.len();

        let mut rolled = vec![Cell::default(); len];
        if down {
            rolled[shift..].copy_from_slice(&current[..len - shift]);
        } else {
            rolled[..len - shift].copy_from_slice(&current[shift..]);
        }
        self.apply_update(Region::new(top, 0, height, self.dims.cols), &rolled)
    }

    /// Cursor position (row, col)
    pub fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    /// Move the cursor
    pub fn set_cursor(&mut self, row: u16, col: u16) -> Result<()> {
        if !self.dims.contains(row, col) {
            return Err(Error::State(format!(
                "Cursor ({row},{col}) is outside screen {}",
                self.dims
            )));
        }
        self.cursor = (row, col);
        Ok(())
    }

    /// Cell at a position
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        if self.dims.contains(row, col) {
            self.cells
                .get(usize::from(row) * usize::from(self.dims.cols) + usize::from(col))
        } else {
            None
        }
    }

    /// One row as text, exactly `cols` characters
    pub fn row_text(&self, row: u16) -> Option<String> {
        row_text(&self.cells, self.dims, row)
    }

    /// Whole screen as newline-joined rows, trailing blanks kept
    pub fn as_text(&self) -> String {
        grid_text(&self.cells, self.dims)
    }

    /// Copy of the current grid
    pub fn snapshot(&self) -> ScreenSnapshot {
        ScreenSnapshot::new(self.dims, self.cursor, self.cells.clone())
    }
}

pub(crate) fn row_text(cells: &[Cell], dims: Dimensions, row: u16) -> Option<String> {
    if row >= dims.rows {
        return None;
    }
    let cols = usize::from(dims.cols);
    let start = usize::from(row) * cols;
    cells
        .get(start..start + cols)
        .map(|r| r.iter().map(Cell::display_char).collect())
}

pub(crate) fn grid_text(cells: &[Cell], dims: Dimensions) -> String {
    let mut text = String::with_capacity(dims.area() + usize::from(dims.rows));
    for (i, row) in cells.chunks(usize::from(dims.cols).max(1)).enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.extend(row.iter().map(Cell::display_char));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::screen::CellAttributes;

    fn cells(text: &str) -> Vec<Cell> {
        text.chars().map(Cell::plain).collect()
    }

    #[test]
    fn test_dimensions_parse() {
        assert_eq!("24x80".parse::<Dimensions>().unwrap(), Dimensions::MODEL_2);
        assert_eq!("27X132".parse::<Dimensions>().unwrap(), Dimensions::MODEL_5);
        assert!("24".parse::<Dimensions>().is_err());
        assert!("0x80".parse::<Dimensions>().is_err());
        assert!("24x300".parse::<Dimensions>().is_err());
        assert_eq!(Dimensions::MODEL_5.to_string(), "27x132");
    }

    #[test]
    fn test_format_table() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(2, 10).unwrap());
        buffer.define_field(1, 2, 4, false).unwrap();
        buffer.define_field(0, 5, 3, true).unwrap();
        // Cut at the last cell
        buffer.define_field(1, 8, 20, false).unwrap();
        let fields = buffer.fields();
        assert_eq!(fields.len(), 3);
        assert_eq!((fields[0].start, fields[0].len), (5, 3));
        assert_eq!((fields[1].start, fields[1].len), (12, 4));
        assert_eq!((fields[2].start, fields[2].len), (18, 2));
        assert_eq!(buffer.field_index_at(7), Some(0));
        assert_eq!(buffer.field_index_at(8), None);
        assert_eq!(buffer.position(15), (1, 5));

        buffer.mark_modified(1);
        assert!(buffer.fields()[1].modified);
        buffer.reset_modified();
        assert!(!buffer.fields()[1].modified);

        assert!(buffer.define_field(2, 0, 1, false).is_err());
        buffer.clear();
        assert!(buffer.fields().is_empty());
    }

    #[test]
    fn test_zero_width_grid_renders_empty() {
        let buffer = ScreenBuffer::new(Dimensions { rows: 24, cols: 0 });
        assert_eq!(buffer.as_text(), "");
    }

    #[test]
    fn test_blank_screen_text_shape() {
        let buffer = ScreenBuffer::new(Dimensions::MODEL_2);
        let text = buffer.as_text();
        let rows: Vec<&str> = text.split('\n').collect();
        assert_eq!(rows.len(), 24);
        assert!(rows.iter().all(|r| r.chars().count() == 80));
    }

    #[test]
    fn test_apply_update_region() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(3, 4).unwrap());
        buffer
            .apply_update(Region::new(1, 1, 2, 2), &cells("abcd"))
            .unwrap();
        assert_eq!(buffer.as_text(), "    \n ab \n cd ");
    }

    #[test]
    fn test_out_of_bounds_is_state_error() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(3, 4).unwrap());
        let err = buffer
            .apply_update(Region::new(2, 3, 1, 2), &cells("xy"))
            .unwrap_err();
        assert_eq!(err.kind(), "state");
        assert_eq!(buffer.as_text(), "    \n    \n    ");

        let err = buffer
            .apply_update(Region::new(0, 0, 1, 2), &cells("xyz"))
            .unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn test_write_run_wraps() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(2, 3).unwrap());
        buffer.write_run(0, 2, &cells("abcd")).unwrap();
        assert_eq!(buffer.as_text(), "  a\nbcd");

        buffer.write_run(1, 2, &cells("XY")).unwrap();
        assert_eq!(buffer.as_text(), "Y a\nbcX");

        assert!(buffer.write_run(2, 0, &cells("a")).is_err());
    }

    #[test]
    fn test_roll_region() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(4, 1).unwrap());
        buffer.write_run(0, 0, &cells("abcd")).unwrap();
        buffer.roll(1, 3, 1, false).unwrap();
        assert_eq!(buffer.as_text(), "a\nc\nd\n ");
        buffer.roll(0, 3, 2, true).unwrap();
        assert_eq!(buffer.as_text(), " \n \na\nc");
        assert!(buffer.roll(2, 4, 1, true).is_err());
    }

    #[test]
    fn test_trailing_blanks_preserved() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(1, 6).unwrap());
        buffer.write_run(0, 0, &cells("ab")).unwrap();
        assert_eq!(buffer.row_text(0).unwrap(), "ab    ");
    }

    #[test]
    fn test_hidden_cells_blank_in_text() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(1, 3).unwrap());
        let secret = Cell::new('p', CellAttributes::new().hidden(true));
        buffer.write_run(0, 0, &[Cell::plain('a'), secret, Cell::plain('c')]).unwrap();
        assert_eq!(buffer.as_text(), "a c");
        assert_eq!(buffer.cell(0, 1).unwrap().c, 'p');
    }

    #[test]
    fn test_clear_and_reset() {
        let mut buffer = ScreenBuffer::new(Dimensions::new(2, 2).unwrap());
        buffer.write_run(0, 0, &cells("abcd")).unwrap();
        buffer.set_cursor(1, 1).unwrap();
        buffer.clear();
        assert_eq!(buffer.as_text(), "  \n  ");
        assert_eq!(buffer.cursor(), (0, 0));

        buffer.reset(Dimensions::new(1, 5).unwrap());
        assert_eq!(buffer.as_text(), "     ");
        assert!(buffer.set_cursor(1, 0).is_err());
    }
}
