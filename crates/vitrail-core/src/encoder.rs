//! Encoding and liquefaction of a composited cell grid.
//!
//! The encoder marks START and END flags where the SGR state changes so
//! that color sequences are emitted once per same-colored strip instead of
//! once per cell. The liquefier then serializes the grid through a reused
//! scratch vector into one contiguous byte buffer for a single write.

use crate::cell::{CELL_ENCODED_PARTS, Cell, CellFlags};
use crate::scratch::{CompactString, ScratchVec};

/// Mark START and END flags on every cell of the grid.
///
/// A cell carries START iff it is the first cell or its colors differ from
/// the previous cell's, and END iff it is the last cell or its colors
/// differ from the next cell's.
pub fn encode_buffer(cells: &mut [Cell]) {
    let count = cells.len();
    if count == 0 {
        return;
    }
    for cell in cells.iter_mut() {
        cell.flags.remove(CellFlags::START | CellFlags::END);
    }

    cells[0].flags.insert(CellFlags::START);
    if count == 1 {
        cells[0].flags.insert(CellFlags::END);
        return;
    }

    for i in 1..count - 1 {
        let same_as_prev = cells[i].same_colors(&cells[i - 1]);
        let same_as_next = cells[i].same_colors(&cells[i + 1]);
        if !same_as_prev {
            cells[i].flags.insert(CellFlags::START);
        }
        if !same_as_next {
            cells[i].flags.insert(CellFlags::END);
        }
    }

    // First cell: END when the second differs.
    if !cells[0].same_colors(&cells[1]) {
        cells[0].flags.insert(CellFlags::END);
    }
    // Last cell: always END, START when the second-to-last differs.
    cells[count - 1].flags.insert(CellFlags::END);
    if !cells[count - 1].same_colors(&cells[count - 2]) {
        cells[count - 1].flags.insert(CellFlags::START);
    }
}

/// Serialize an encoded grid into the scratch vector.
///
/// Each cell reserves a fixed-size window, emits itself in encoded mode and
/// commits the fragments actually used. When word wrapping is disabled a
/// newline fragment terminates every row. Returns the liquefied byte size.
pub fn liquify(
    cells: &[Cell],
    width: u32,
    height: u32,
    word_wrapping: bool,
    scratch: &mut ScratchVec,
) -> usize {
    scratch.clear();
    let worst_case = (width as usize * height as usize) * CELL_ENCODED_PARTS
        + usize::from(!word_wrapping) * (height as usize).saturating_sub(1);
    scratch.reserve_total(worst_case);

    for y in 0..height {
        for x in 0..width {
            let Some(cell) = cells.get((y * width + x) as usize) else {
                continue;
            };
            let mut window = scratch.window::<CELL_ENCODED_PARTS>();
            cell.write_encoded(&mut window);
            scratch.release(&window);
        }
        if !word_wrapping {
            scratch.push(CompactString::from_byte(b'\n'));
        }
    }

    scratch.liquefied_len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    fn cell(c: char, shade: u8) -> Cell {
        Cell::new(
            c,
            Rgba::new(shade, shade, shade, 255),
            Rgba::new(shade, shade, shade, 255),
        )
    }

    fn start_positions(cells: &[Cell]) -> Vec<usize> {
        cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.flags.contains(CellFlags::START))
            .map(|(i, _)| i)
            .collect()
    }

    fn end_positions(cells: &[Cell]) -> Vec<usize> {
        cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.flags.contains(CellFlags::END))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn uniform_grid_is_one_strip() {
        let mut cells = vec![cell('a', 5); 6];
        encode_buffer(&mut cells);
        assert_eq!(start_positions(&cells), vec![0]);
        assert_eq!(end_positions(&cells), vec![5]);
    }

    #[test]
    fn single_cell_is_start_and_end() {
        let mut cells = vec![cell('a', 1)];
        encode_buffer(&mut cells);
        assert!(cells[0].flags.contains(CellFlags::START));
        assert!(cells[0].flags.contains(CellFlags::END));
    }

    #[test]
    fn alternating_colors_mark_every_cell() {
        let mut cells = vec![cell('a', 1), cell('b', 2), cell('c', 1)];
        encode_buffer(&mut cells);
        assert_eq!(start_positions(&cells), vec![0, 1, 2]);
        assert_eq!(end_positions(&cells), vec![0, 1, 2]);
    }

    #[test]
    fn strip_boundaries_marked() {
        let mut cells = vec![
            cell('a', 1),
            cell('b', 1),
            cell('c', 2),
            cell('d', 2),
            cell('e', 2),
        ];
        encode_buffer(&mut cells);
        assert_eq!(start_positions(&cells), vec![0, 2]);
        assert_eq!(end_positions(&cells), vec![1, 4]);
    }

    #[test]
    fn re_encoding_clears_stale_flags() {
        let mut cells = vec![cell('a', 1), cell('b', 2)];
        encode_buffer(&mut cells);
        // Make the grid uniform and encode again; old boundaries must go.
        cells[1] = cell('b', 1);
        encode_buffer(&mut cells);
        assert_eq!(start_positions(&cells), vec![0]);
        assert_eq!(end_positions(&cells), vec![1]);
    }

    #[test]
    fn empty_buffer_is_tolerated() {
        let mut cells: Vec<Cell> = Vec::new();
        encode_buffer(&mut cells);
        assert!(cells.is_empty());
    }

    #[test]
    fn liquify_uniform_row() {
        let mut cells = vec![cell('a', 1), cell('b', 1), cell('c', 1)];
        encode_buffer(&mut cells);
        let mut scratch = ScratchVec::with_capacity(64);
        let size = liquify(&cells, 3, 1, true, &mut scratch);

        let mut out = Vec::new();
        scratch.liquefy_into(&mut out);
        assert_eq!(out.len(), size);
        assert_eq!(
            String::from_utf8(out).unwrap_or_default(),
            "\x1b[38;2;1;1;1m\x1b[48;2;1;1;1mabc\x1b[0m"
        );
    }

    #[test]
    fn liquify_appends_newlines_without_word_wrapping() {
        let mut cells = vec![cell('a', 1), cell('b', 1), cell('c', 1), cell('d', 1)];
        encode_buffer(&mut cells);
        let mut scratch = ScratchVec::with_capacity(64);
        liquify(&cells, 2, 2, false, &mut scratch);

        let mut out = Vec::new();
        scratch.liquefy_into(&mut out);
        let text = String::from_utf8(out).unwrap_or_default();
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn liquify_reuses_scratch() {
        let mut cells = vec![cell('x', 1); 4];
        encode_buffer(&mut cells);
        let mut scratch = ScratchVec::with_capacity(8);
        let first = liquify(&cells, 4, 1, true, &mut scratch);
        let second = liquify(&cells, 4, 1, true, &mut scratch);
        assert_eq!(first, second);
        assert_eq!(scratch.liquefied_len(), second);
    }
}
