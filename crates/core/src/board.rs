//! Board module - owns the play field grid
//!
//! The board is an `x_size` x `y_size` grid. The first index `x` selects a row
//! and the second index `y` selects a column within that row. Cells are stored
//! in a flat vector in row-major order (`x * y_size + y`) for cache locality.
//!
//! Every slot always holds a [`Block`] whose coordinate matches the slot. All
//! mutation goes through `Board` methods that write whole blocks.

use std::hash::Hasher;

use crate::types::{Block, BlockColor};

/// Stable 64-bit FNV-1a hasher for [`Board::fingerprint`].
///
/// `DefaultHasher` output is not guaranteed stable across Rust versions, and
/// fingerprints are compared between two processes.
#[derive(Debug, Clone)]
struct Fnv1aHasher {
    state: u64,
}

impl Fnv1aHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Hasher for Fnv1aHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= b as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// The play field grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    x_size: usize,
    y_size: usize,
    /// Flat array of blocks, row-major order (x * y_size + y)
    cells: Vec<Block>,
}

impl Board {
    /// Create a board filled with empty blocks
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(x_size: usize, y_size: usize) -> Self {
        assert!(
            x_size > 0 && y_size > 0,
            "board dimensions must be non-zero, got {}x{}",
            x_size,
            y_size
        );
        Self {
            x_size,
            y_size,
            cells: Self::empty_cells(x_size, y_size),
        }
    }

    fn empty_cells(x_size: usize, y_size: usize) -> Vec<Block> {
        let mut cells = Vec::with_capacity(x_size * y_size);
        for x in 0..x_size {
            for y in 0..y_size {
                cells.push(Block::empty(x, y));
            }
        }
        cells
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            self.contains(x, y),
            "coordinate ({}, {}) outside {}x{} board",
            x,
            y,
            self.x_size,
            self.y_size
        );
        x * self.y_size + y
    }

    /// Number of rows (range of the first index)
    pub fn x_size(&self) -> usize {
        self.x_size
    }

    /// Number of columns (range of the second index)
    pub fn y_size(&self) -> usize {
        self.y_size
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.x_size && y < self.y_size
    }

    /// Get the block at `(x, y)`, or None if out of bounds
    pub fn get(&self, x: usize, y: usize) -> Option<&Block> {
        if !self.contains(x, y) {
            return None;
        }
        Some(&self.cells[x * self.y_size + y])
    }

    /// All blocks in row-major order
    pub fn cells(&self) -> &[Block] {
        &self.cells
    }

    /// One row (fixed `x`)
    pub fn row(&self, x: usize) -> &[Block] {
        let start = self.index(x, 0);
        &self.cells[start..start + self.y_size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Block]> {
        self.cells.chunks(self.y_size)
    }

    /// Overwrite the slot at the block's own coordinate
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the board.
    pub fn set_cell(&mut self, block: Block) {
        let idx = self.index(block.x(), block.y());
        self.cells[idx] = block;
    }

    /// Move every block flagged as part of the moving object by `(dx, dy)`
    ///
    /// Moving blocks are lifted off the board in a first pass (their origin
    /// slots become empty) and written back at the offset position in a second
    /// pass, in the order they were collected. A block written in the second
    /// pass can therefore never be picked up again in the same call, whatever
    /// the sign of the offset.
    ///
    /// Returns the number of blocks moved.
    ///
    /// # Panics
    ///
    /// Panics if a moved block would land outside the board.
    pub fn translate_moving(&mut self, dx: isize, dy: isize) -> usize {
        let mut lifted = Vec::new();
        for cell in self.cells.iter_mut() {
            if cell.is_moving() {
                lifted.push(*cell);
                *cell = Block::empty(cell.x(), cell.y());
            }
        }

        let moved = lifted.len();
        for block in lifted {
            self.set_cell(block.translated(dx, dy));
        }
        moved
    }

    /// Check if a row has no empty (value 0) block
    pub fn is_row_full(&self, x: usize) -> bool {
        if x >= self.x_size {
            return false;
        }
        !self.row(x).iter().any(Block::is_empty)
    }

    /// Clear all full rows and drop the remaining rows to the bottom
    ///
    /// Rows that still contain an empty block are kept and restacked from the
    /// highest index downward, preserving their relative order. Freed rows at
    /// the top are filled with empty blocks. Returns the indices of the cleared
    /// rows in ascending order.
    pub fn clear_full_rows(&mut self) -> Vec<usize> {
        let mut kept = Vec::with_capacity(self.x_size);
        let mut cleared = Vec::new();

        for x in 0..self.x_size {
            if self.is_row_full(x) {
                cleared.push(x);
                self.reset_row(x);
            } else {
                kept.push(x);
            }
        }

        if cleared.is_empty() {
            return cleared;
        }

        kept.reverse();
        let mut next = Self::empty_cells(self.x_size, self.y_size);
        for (k, &src) in kept.iter().enumerate() {
            let dst = (self.x_size - 1) - k;
            for y in 0..self.y_size {
                next[dst * self.y_size + y] = self.cells[src * self.y_size + y].at(dst, y);
            }
        }
        self.cells = next;

        cleared
    }

    fn reset_row(&mut self, x: usize) {
        let start = self.index(x, 0);
        for (y, cell) in self.cells[start..start + self.y_size].iter_mut().enumerate() {
            *cell = Block::empty(x, y);
        }
    }

    /// Reset every slot to an empty block
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Block::empty(cell.x(), cell.y());
        }
    }

    /// Replace the whole grid with a snapshot of the same dimensions
    ///
    /// # Panics
    ///
    /// Panics if the snapshot dimensions differ from this board's.
    pub fn replace(&mut self, snapshot: Board) {
        assert!(
            snapshot.x_size == self.x_size && snapshot.y_size == self.y_size,
            "snapshot is {}x{}, board is {}x{}",
            snapshot.x_size,
            snapshot.y_size,
            self.x_size,
            self.y_size
        );
        self.cells = snapshot.cells;
    }

    /// Number of blocks with a non-neutral color
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.color() != BlockColor::Neutral).count()
    }

    /// Stable hash of dimensions, colors and flags
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1aHasher::new();
        h.write_u64(self.x_size as u64);
        h.write_u64(self.y_size as u64);
        for cell in &self.cells {
            h.write_u8(cell.value());
            h.write_u8(cell.flags().bits());
        }
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockFlag, BlockFlags};

    fn moving(color: BlockColor, x: usize, y: usize) -> Block {
        Block::new(color, x, y).with_flags(BlockFlags::from_flags(&[BlockFlag::PartOfMovingObject]))
    }

    #[test]
    fn test_board_index_calculation() {
        let board = Board::new(4, 10);
        assert_eq!(board.index(0, 0), 0);
        assert_eq!(board.index(0, 9), 9);
        assert_eq!(board.index(1, 0), 10);
        assert_eq!(board.index(3, 9), 39);
    }

    #[test]
    #[should_panic(expected = "outside 4x10 board")]
    fn test_set_cell_out_of_range_panics() {
        let mut board = Board::new(4, 10);
        board.set_cell(Block::new(BlockColor::Red, 4, 0));
    }

    #[test]
    fn test_new_board_slots_match_coordinates() {
        let board = Board::new(3, 5);
        for x in 0..3 {
            for y in 0..5 {
                let block = board.get(x, y).unwrap();
                assert_eq!((block.x(), block.y()), (x, y));
                assert!(block.is_empty());
                assert!(block.flags().is_empty());
            }
        }
    }

    #[test]
    fn test_translate_moves_against_scan_direction() {
        // A vertical bar moving toward lower indices overlaps its own origin.
        let mut board = Board::new(5, 3);
        for x in 1..4 {
            board.set_cell(moving(BlockColor::LightBlue, x, 1));
        }

        assert_eq!(board.translate_moving(-1, 0), 3);

        for x in 0..3 {
            assert!(board.get(x, 1).unwrap().is_moving(), "row {}", x);
        }
        assert!(board.get(3, 1).unwrap().is_empty());
        assert_eq!(board.occupied_count(), 3);
    }

    #[test]
    fn test_clear_full_rows_without_full_rows_is_noop() {
        let mut board = Board::new(3, 2);
        board.set_cell(Block::new(BlockColor::Green, 1, 0));
        let before = board.clone();

        assert!(board.clear_full_rows().is_empty());
        assert_eq!(board, before);
    }

    #[test]
    fn test_clear_full_rows_all_full() {
        let mut board = Board::new(2, 2);
        for x in 0..2 {
            for y in 0..2 {
                board.set_cell(Block::new(BlockColor::Orange, x, y));
            }
        }

        assert_eq!(board.clear_full_rows(), vec![0, 1]);
        assert_eq!(board, Board::new(2, 2));
    }

    #[test]
    fn test_fingerprint_tracks_flags() {
        let mut a = Board::new(2, 2);
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());

        a.set_cell(Block::empty(0, 0).with_flags(BlockFlags::from_flags(&[BlockFlag::RotationPoint])));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    #[should_panic(expected = "snapshot is 2x2")]
    fn test_replace_rejects_other_dimensions() {
        let mut board = Board::new(3, 3);
        board.replace(Board::new(2, 2));
    }
}
