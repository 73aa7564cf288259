//! The terminal cell and its ANSI serialization.

use bitflags::bitflags;

use crate::color::Rgba;
use crate::scratch::{CompactString, SuperString};

/// ANSI escape tokens used by the serializer.
pub mod ansi {
    /// Control sequence introducer.
    pub const ESC_CODE: &str = "\x1b[";
    /// Parameter separator.
    pub const SEPARATE: &str = ";";
    /// Direct-color telltale.
    pub const USE_RGB: &str = "2";
    /// Foreground color selector.
    pub const TEXT_COLOR: &str = "38";
    /// Background color selector.
    pub const BACKGROUND_COLOR: &str = "48";
    /// SGR terminator.
    pub const END_COMMAND: &str = "m";
    /// Full SGR reset with the terminator baked in.
    pub const RESET_COLOR: &str = "\x1b[0m";
    /// Move the cursor to the top-left corner.
    pub const SET_CURSOR_TO_START: &str = "\x1b[H";
}

bitflags! {
    /// Per-cell flags: payload encoding plus the START/END strip markers
    /// produced by the encoder pass.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        /// Payload is a multi-byte UTF-8 sequence instead of one ASCII byte.
        const UTF8 = 1 << 0;
        /// First cell of an SGR strip; colors are emitted here.
        const START = 1 << 1;
        /// Last cell of an SGR strip; the reset is emitted here.
        const END = 1 << 2;
    }
}

/// A glyph payload of one to four UTF-8 bytes stored inline.
///
/// The original kept multi-byte payloads as borrowed pointers into static
/// symbol tables; an inline buffer of four bytes covers every UTF-8 scalar
/// and removes the aliasing hazard without changing the encoder contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyph {
    buf: [u8; 4],
    len: u8,
}

impl Glyph {
    /// The default glyph, a single space.
    pub const SPACE: Self = Self {
        buf: [b' ', 0, 0, 0],
        len: 1,
    };

    /// Build a glyph from a char.
    pub fn from_char(c: char) -> Self {
        let mut buf = [0u8; 4];
        let len = c.encode_utf8(&mut buf).len() as u8;
        Self { buf, len }
    }

    /// Build a glyph from the first scalar of a string slice.
    ///
    /// Falls back to a space for an empty input.
    pub fn from_str(s: &str) -> Self {
        s.chars().next().map_or(Self::SPACE, Self::from_char)
    }

    /// Byte length of the payload.
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Glyphs are never zero-length; the default payload is a space.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..usize::from(self.len)]
    }

    /// The payload as a string slice.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or(" ")
    }

    /// Whether the payload is a single ASCII byte.
    pub fn is_ascii(&self) -> bool {
        self.len == 1 && self.buf[0].is_ascii()
    }

    fn fragment(&self) -> CompactString {
        CompactString::from_bytes(self.as_bytes()).unwrap_or(CompactString::Empty)
    }
}

impl Default for Glyph {
    fn default() -> Self {
        Self::SPACE
    }
}

/// Number of fragments needed to serialize one encoded cell in the worst
/// case: two color overheads (5 fragments each), two color triplets
/// (5 fragments each), two SGR terminators, the payload and a reset.
pub const CELL_ENCODED_PARTS: usize = (5 + 5 + 1) * 2 + 1 + 1;

/// One cell of the rendered grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Encoding flags.
    pub flags: CellFlags,
    /// Glyph payload.
    pub glyph: Glyph,
    /// Foreground color.
    pub fg: Rgba,
    /// Background color.
    pub bg: Rgba,
}

impl Default for Cell {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Cell {
    /// The empty cell: a space with default colors.
    pub const EMPTY: Self = Self {
        flags: CellFlags::empty(),
        glyph: Glyph::SPACE,
        fg: Rgba::new(0, 0, 0, 255),
        bg: Rgba::new(0, 0, 0, 255),
    };

    /// Create a cell from a char and a color pair.
    pub fn new(c: char, fg: Rgba, bg: Rgba) -> Self {
        let glyph = Glyph::from_char(c);
        let mut flags = CellFlags::empty();
        if !glyph.is_ascii() {
            flags |= CellFlags::UTF8;
        }
        Self {
            flags,
            glyph,
            fg,
            bg,
        }
    }

    /// Whether the cell still shows the default text (a space).
    pub fn has_default_text(&self) -> bool {
        self.glyph == Glyph::SPACE
    }

    /// Replace the glyph payload, updating the encoding flag but keeping
    /// the strip markers and colors.
    pub fn set_text(&mut self, glyph: Glyph) {
        self.glyph = glyph;
        self.flags.set(CellFlags::UTF8, !glyph.is_ascii());
    }

    /// Copy the text payload (and only the payload) from another cell.
    pub fn copy_text_from(&mut self, other: &Cell) {
        self.glyph = other.glyph;
        self.flags.set(CellFlags::UTF8, other.flags.contains(CellFlags::UTF8));
    }

    /// Whether fg and bg equal those of another cell. The encoder uses this
    /// to find strip boundaries.
    pub fn same_colors(&self, other: &Cell) -> bool {
        self.fg == other.fg && self.bg == other.bg
    }

    /// Emit the cell in plain mode: both color blocks, the payload and a
    /// reset, regardless of strip markers.
    pub fn write_plain<const N: usize>(&self, out: &mut SuperString<N>) {
        write_color(out, ansi::TEXT_COLOR, self.fg);
        out.push(CompactString::from_static(ansi::END_COMMAND));
        write_color(out, ansi::BACKGROUND_COLOR, self.bg);
        out.push(CompactString::from_static(ansi::END_COMMAND));
        out.push(self.glyph.fragment());
        out.push(CompactString::from_static(ansi::RESET_COLOR));
    }

    /// Emit the cell in encoded mode: the color block only on START, the
    /// payload always, the reset only on END.
    pub fn write_encoded<const N: usize>(&self, out: &mut SuperString<N>) {
        if self.flags.contains(CellFlags::START) {
            write_color(out, ansi::TEXT_COLOR, self.fg);
            out.push(CompactString::from_static(ansi::END_COMMAND));
            write_color(out, ansi::BACKGROUND_COLOR, self.bg);
            out.push(CompactString::from_static(ansi::END_COMMAND));
        }
        out.push(self.glyph.fragment());
        if self.flags.contains(CellFlags::END) {
            out.push(CompactString::from_static(ansi::RESET_COLOR));
        }
    }
}

/// Append one color block: the five-token overhead followed by the decimal
/// triplet. Each byte-to-decimal conversion is a table lookup.
fn write_color<const N: usize>(out: &mut SuperString<N>, selector: &'static str, color: Rgba) {
    out.push(CompactString::from_static(ansi::ESC_CODE));
    out.push(CompactString::from_static(selector));
    out.push(CompactString::from_static(ansi::SEPARATE));
    out.push(CompactString::from_static(ansi::USE_RGB));
    out.push(CompactString::from_static(ansi::SEPARATE));
    out.push(DECIMAL[usize::from(color.r)]);
    out.push(CompactString::from_static(ansi::SEPARATE));
    out.push(DECIMAL[usize::from(color.g)]);
    out.push(CompactString::from_static(ansi::SEPARATE));
    out.push(DECIMAL[usize::from(color.b)]);
}

const fn decimal_entry(value: u8) -> CompactString {
    let mut buf = [0u8; 4];
    let mut len = 0u8;
    let hundreds = value / 100;
    let tens = (value / 10) % 10;
    let ones = value % 10;
    if hundreds > 0 {
        buf[len as usize] = b'0' + hundreds;
        len += 1;
    }
    if hundreds > 0 || tens > 0 {
        buf[len as usize] = b'0' + tens;
        len += 1;
    }
    buf[len as usize] = b'0' + ones;
    len += 1;
    CompactString::Inline { buf, len }
}

/// Precomputed decimal representation of every byte value.
const DECIMAL: [CompactString; 256] = {
    let mut table = [CompactString::Empty; 256];
    let mut i = 0usize;
    while i < 256 {
        table[i] = decimal_entry(i as u8);
        i += 1;
    }
    table
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    fn bytes_of<const N: usize>(s: &SuperString<N>) -> String {
        String::from_utf8(s.to_bytes()).unwrap_or_default()
    }

    #[test]
    fn decimal_table_entries() {
        assert_eq!(DECIMAL[0].as_bytes(), b"0");
        assert_eq!(DECIMAL[7].as_bytes(), b"7");
        assert_eq!(DECIMAL[42].as_bytes(), b"42");
        assert_eq!(DECIMAL[255].as_bytes(), b"255");
    }

    #[test]
    fn empty_cell_has_default_text() {
        assert!(Cell::EMPTY.has_default_text());
        assert!(Cell::EMPTY.glyph.is_ascii());
    }

    #[test]
    fn utf8_flag_follows_payload() {
        let mut c = Cell::EMPTY;
        c.set_text(Glyph::from_char('宇'));
        assert!(c.flags.contains(CellFlags::UTF8));
        c.set_text(Glyph::from_char('a'));
        assert!(!c.flags.contains(CellFlags::UTF8));
    }

    #[test]
    fn plain_mode_emits_both_colors_and_reset() {
        let cell = Cell::new('a', Rgba::new(1, 2, 3, 255), Rgba::new(4, 5, 6, 255));
        let mut out: SuperString<CELL_ENCODED_PARTS> = SuperString::new();
        cell.write_plain(&mut out);
        assert_eq!(
            bytes_of(&out),
            "\x1b[38;2;1;2;3m\x1b[48;2;4;5;6ma\x1b[0m"
        );
    }

    #[test]
    fn encoded_mode_interior_cell_is_payload_only() {
        let cell = Cell::new('x', Rgba::default(), Rgba::default());
        let mut out: SuperString<CELL_ENCODED_PARTS> = SuperString::new();
        cell.write_encoded(&mut out);
        assert_eq!(bytes_of(&out), "x");
    }

    #[test]
    fn encoded_mode_start_cell_carries_colors() {
        let mut cell = Cell::new('x', Rgba::new(9, 9, 9, 255), Rgba::new(1, 1, 1, 255));
        cell.flags |= CellFlags::START;
        let mut out: SuperString<CELL_ENCODED_PARTS> = SuperString::new();
        cell.write_encoded(&mut out);
        assert_eq!(bytes_of(&out), "\x1b[38;2;9;9;9m\x1b[48;2;1;1;1mx");
    }

    #[test]
    fn encoded_mode_end_cell_carries_reset() {
        let mut cell = Cell::new('x', Rgba::default(), Rgba::default());
        cell.flags |= CellFlags::END;
        let mut out: SuperString<CELL_ENCODED_PARTS> = SuperString::new();
        cell.write_encoded(&mut out);
        assert_eq!(bytes_of(&out), "x\x1b[0m");
    }

    #[test]
    fn worst_case_fits_the_window() {
        let mut cell = Cell::new('宇', Rgba::new(255, 255, 255, 255), Rgba::new(255, 255, 255, 255));
        cell.flags |= CellFlags::START | CellFlags::END;
        let mut out: SuperString<CELL_ENCODED_PARTS> = SuperString::new();
        cell.write_encoded(&mut out);
        assert!(out.len() <= CELL_ENCODED_PARTS);
        // 2 color blocks of 19 bytes each (11 digits at maximum), the
        // 3-byte payload and a 4-byte reset.
        assert_eq!(bytes_of(&out), "\x1b[38;2;255;255;255m\x1b[48;2;255;255;255m宇\x1b[0m");
    }

    #[test]
    fn same_colors_compares_both_channels() {
        let a = Cell::new('a', Rgba::new(1, 2, 3, 255), Rgba::new(4, 5, 6, 255));
        let mut b = a;
        assert!(a.same_colors(&b));
        b.bg = Rgba::new(0, 0, 0, 255);
        assert!(!a.same_colors(&b));
    }
}
