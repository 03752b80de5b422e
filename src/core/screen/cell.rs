//! Screen cell representation

use serde::{Deserialize, Serialize};

/// Lowest 5250 display attribute byte
pub const ATTRIBUTE_MIN: u8 = 0x20;
/// Highest 5250 display attribute byte
pub const ATTRIBUTE_MAX: u8 = 0x3F;

/// A single cell in the screen grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Decoded character
    pub c: char,
    /// Display and field attributes
    pub attr: CellAttributes,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            c: ' ',
            attr: CellAttributes::default(),
        }
    }
}

impl Cell {
    /// Create a new cell
    pub fn new(c: char, attr: CellAttributes) -> Self {
        Self { c, attr }
    }

    /// Plain unprotected cell
    pub fn plain(c: char) -> Self {
        Self::new(c, CellAttributes::default())
    }

    /// Character as it should appear in a text rendering
    pub fn display_char(&self) -> char {
        if self.attr.hidden || self.c.is_control() {
            ' '
        } else {
            self.c
        }
    }

    /// Check if cell is empty (space with default attributes)
    pub fn is_empty(&self) -> bool {
        self.c == ' ' && self.attr == CellAttributes::default()
    }
}

/// Cell attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellAttributes {
    /// Operator cannot type here
    pub protected: bool,
    /// Field accepts digits only
    pub numeric_only: bool,
    /// Nondisplay (password fields)
    pub hidden: bool,
    /// Reverse image
    pub reverse: bool,
    /// High intensity
    pub high_intensity: bool,
    /// Underscore
    pub underline: bool,
    /// Blink
    pub blink: bool,
    /// Column separators
    pub column_separator: bool,
}

impl CellAttributes {
    /// Create default attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Set protected
    #[must_use]
    pub fn protected(mut self, v: bool) -> Self {
        self.protected = v;
        self
    }

    /// Set numeric-only
    #[must_use]
    pub fn numeric_only(mut self, v: bool) -> Self {
        self.numeric_only = v;
        self
    }

    /// Set hidden
    #[must_use]
    pub fn hidden(mut self, v: bool) -> Self {
        self.hidden = v;
        self
    }

    /// Whether a byte is a 5250 display attribute
    pub fn is_display_attribute(byte: u8) -> bool {
        (ATTRIBUTE_MIN..=ATTRIBUTE_MAX).contains(&byte)
    }

    /// Replace the display part with what a 5250 attribute byte selects,
    /// keeping the field flags
    #[must_use]
    pub fn with_display_attribute(self, byte: u8) -> Self {
        let bits = byte & 0x1F;
        // Reverse + high intensity + underscore together mean nondisplay
        let hidden = bits & 0x07 == 0x07;
        Self {
            hidden,
            reverse: !hidden && bits & 0x01 != 0,
            high_intensity: !hidden && bits & 0x02 != 0,
            underline: !hidden && bits & 0x04 != 0,
            blink: bits & 0x08 != 0,
            column_separator: bits & 0x10 != 0,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_attribute_decoding() {
        let normal = CellAttributes::new().with_display_attribute(0x20);
        assert_eq!(normal, CellAttributes::default());

        let reverse = CellAttributes::new().with_display_attribute(0x21);
        assert!(reverse.reverse);
        assert!(!reverse.hidden);

        let underline_hi = CellAttributes::new().with_display_attribute(0x26);
        assert!(underline_hi.underline && underline_hi.high_intensity);

        let nondisplay = CellAttributes::new().protected(true).with_display_attribute(0x27);
        assert!(nondisplay.hidden);
        assert!(!nondisplay.underline);
        assert!(nondisplay.protected, "field flags survive");
    }

    #[test]
    fn test_hidden_cells_render_blank() {
        let secret = Cell::new('X', CellAttributes::new().hidden(true));
        assert_eq!(secret.display_char(), ' ');
        assert_eq!(Cell::plain('\0').display_char(), ' ');
        assert_eq!(Cell::plain('A').display_char(), 'A');
    }

    #[test]
    fn test_is_display_attribute() {
        assert!(CellAttributes::is_display_attribute(0x20));
        assert!(CellAttributes::is_display_attribute(0x3F));
        assert!(!CellAttributes::is_display_attribute(0x40));
        assert!(!CellAttributes::is_display_attribute(0x1F));
    }
}
