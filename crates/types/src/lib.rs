//! Core types module - shared data structures and constants
//!
//! This module defines the cell model shared by the grid engine, the frame
//! codecs and the transport. All types are plain data with no external
//! dependencies.
//!
//! # Color Codes
//!
//! The numeric color codes are part of the wire format and must never change:
//!
//! | Code | Color |
//! |------|-------|
//! | 0 | Neutral (empty) |
//! | 1 | Yellow |
//! | 2 | Purple |
//! | 3 | Blue |
//! | 4 | Orange |
//! | 5 | Green |
//! | 6 | Red |
//! | 7 | LightBlue |
//!
//! # Examples
//!
//! ```
//! use tetris_sync_types::{Block, BlockColor, BlockFlag, BlockFlags};
//!
//! let block = Block::new(BlockColor::Yellow, 0, 3)
//!     .with_flags(BlockFlags::from_flags(&[BlockFlag::PartOfMovingObject]));
//!
//! assert_eq!(block.value(), 1);
//! assert!(block.is_moving());
//!
//! let moved = block.translated(1, -1);
//! assert_eq!((moved.x(), moved.y()), (1, 2));
//! assert_eq!(moved.color(), BlockColor::Yellow);
//! ```

/// Default board rows (first index)
pub const DEFAULT_ROWS: usize = 20;

/// Default board columns (second index)
pub const DEFAULT_COLS: usize = 10;

/// Default tick interval in milliseconds
pub const DEFAULT_TICK_MS: u64 = 500;

/// Default transport bind/connect host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default transport port
pub const DEFAULT_PORT: u16 = 7777;

/// Number of distinct color codes on the wire (0..=7)
pub const COLOR_COUNT: u8 = 8;


/// Cell color with its fixed wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BlockColor {
    #[default]
    Neutral = 0,
    Yellow = 1,
    Purple = 2,
    Blue = 3,
    Orange = 4,
    Green = 5,
    Red = 6,
    LightBlue = 7,
}

impl BlockColor {
    /// Every color in code order
    pub const ALL: [BlockColor; COLOR_COUNT as usize] = [
        BlockColor::Neutral,
        BlockColor::Yellow,
        BlockColor::Purple,
        BlockColor::Blue,
        BlockColor::Orange,
        BlockColor::Green,
        BlockColor::Red,
        BlockColor::LightBlue,
    ];

    /// Numeric wire code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code
    ///
    /// # Examples
    ///
    /// ```
    /// use tetris_sync_types::BlockColor;
    ///
    /// assert_eq!(BlockColor::from_code(7), Some(BlockColor::LightBlue));
    /// assert_eq!(BlockColor::from_code(8), None);
    /// ```
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockColor::Neutral => "neutral",
            BlockColor::Yellow => "yellow",
            BlockColor::Purple => "purple",
            BlockColor::Blue => "blue",
            BlockColor::Orange => "orange",
            BlockColor::Green => "green",
            BlockColor::Red => "red",
            BlockColor::LightBlue => "lightBlue",
        }
    }
}

/// Behavioral flag attached to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFlag {
    /// Cell belongs to the piece currently being translated
    PartOfMovingObject,
    /// Pivot cell of the moving piece
    RotationPoint,
}

impl BlockFlag {
    const ALL: [BlockFlag; 2] = [BlockFlag::PartOfMovingObject, BlockFlag::RotationPoint];

    fn bit(self) -> u8 {
        match self {
            BlockFlag::PartOfMovingObject => 0b01,
            BlockFlag::RotationPoint => 0b10,
        }
    }
}

/// Ordered set of [`BlockFlag`]s
///
/// Backed by a bitmask, so equality does not depend on insertion order and a
/// flag can appear at most once. Iteration yields flags in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockFlags {
    bits: u8,
}

impl BlockFlags {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub fn from_flags(flags: &[BlockFlag]) -> Self {
        let mut set = Self::empty();
        for &flag in flags {
            set.insert(flag);
        }
        set
    }

    pub fn contains(&self, flag: BlockFlag) -> bool {
        self.bits & flag.bit() != 0
    }

    pub fn insert(&mut self, flag: BlockFlag) {
        self.bits |= flag.bit();
    }

    pub fn remove(&mut self, flag: BlockFlag) {
        self.bits &= !flag.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockFlag> + '_ {
        BlockFlag::ALL.into_iter().filter(|f| self.contains(*f))
    }

    /// Raw bitmask (bit 0: moving, bit 1: rotation point)
    pub fn bits(&self) -> u8 {
        self.bits
    }
}

/// One board cell: color, flags and grid coordinate
///
/// `value()` is always the numeric code of `color()`; there is no way to set
/// it independently. Blocks are `Copy`, so placing one into a board slot never
/// shares it with another slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    color: BlockColor,
    flags: BlockFlags,
    x: usize,
    y: usize,
}

impl Block {
    /// Neutral cell with no flags
    pub fn empty(x: usize, y: usize) -> Self {
        Self::new(BlockColor::Neutral, x, y)
    }

    pub fn new(color: BlockColor, x: usize, y: usize) -> Self {
        Self {
            color,
            flags: BlockFlags::empty(),
            x,
            y,
        }
    }

    pub fn with_flags(mut self, flags: BlockFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn color(&self) -> BlockColor {
        self.color
    }

    pub fn flags(&self) -> BlockFlags {
        self.flags
    }

    /// Numeric code of the color
    pub fn value(&self) -> u8 {
        self.color.code()
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn y(&self) -> usize {
        self.y
    }

    pub fn is_empty(&self) -> bool {
        self.value() == 0
    }

    pub fn is_moving(&self) -> bool {
        self.flags.contains(BlockFlag::PartOfMovingObject)
    }

    pub fn is_rotation_point(&self) -> bool {
        self.flags.contains(BlockFlag::RotationPoint)
    }

    pub fn set_color(&mut self, color: BlockColor) {
        self.color = color;
    }

    pub fn set_flags(&mut self, flags: BlockFlags) {
        self.flags = flags;
    }

    /// Same block at a new coordinate
    pub fn at(mut self, x: usize, y: usize) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Same block offset by `(dx, dy)`
    ///
    /// # Panics
    ///
    /// Panics if the offset moves a coordinate below zero. Callers own the
    /// bounds of the grid.
    pub fn translated(self, dx: isize, dy: isize) -> Self {
        match (self.x.checked_add_signed(dx), self.y.checked_add_signed(dy)) {
            (Some(x), Some(y)) => self.at(x, y),
            _ => panic!(
                "block ({}, {}) offset by ({}, {}) lands outside the grid",
                self.x, self.y, dx, dy
            ),
        }
    }
}
