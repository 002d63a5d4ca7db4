//! Frame codec tests - both wire formats through the public API

use tetris_sync::codec::{BinaryCodec, DecodeError, FrameCodec, FrameFormat, TextCodec, Visibility};
use tetris_sync::core::Board;
use tetris_sync::types::{Block, BlockColor, BlockFlag, BlockFlags};

fn flags(list: &[BlockFlag]) -> BlockFlags {
    BlockFlags::from_flags(list)
}

/// Every color and both flags at least once
fn rich_board() -> Board {
    let mut board = Board::new(3, 4);
    for (i, color) in BlockColor::ALL.iter().enumerate() {
        board.set_cell(Block::new(*color, i / 4, i % 4));
    }
    board.set_cell(Block::new(BlockColor::Red, 2, 0).with_flags(flags(&[BlockFlag::PartOfMovingObject])));
    board.set_cell(Block::new(BlockColor::Red, 2, 1).with_flags(flags(&[BlockFlag::RotationPoint])));
    board.set_cell(
        Block::new(BlockColor::Red, 2, 2)
            .with_flags(flags(&[BlockFlag::PartOfMovingObject, BlockFlag::RotationPoint])),
    );
    board
}

#[test]
fn test_text_two_by_two_scenario() {
    let mut board = Board::new(2, 2);
    board.set_cell(Block::new(BlockColor::Yellow, 0, 0).with_flags(flags(&[BlockFlag::PartOfMovingObject])));

    let payload = TextCodec.encode(&board);
    assert_eq!(
        String::from_utf8(payload.clone()).unwrap(),
        "2;2\n0;0;1;0;1\n0;1;0;0;0\n1;0;0;0;0\n1;1;0;0;0\n"
    );

    let decoded = TextCodec.decode(&payload).unwrap();
    let origin = decoded.get(0, 0).unwrap();
    assert_eq!(origin.color(), BlockColor::Yellow);
    assert!(origin.is_moving());
    assert!(!origin.is_rotation_point());

    for (x, y) in [(0, 1), (1, 0), (1, 1)] {
        let block = decoded.get(x, y).unwrap();
        assert_eq!(block.color(), BlockColor::Neutral);
        assert!(block.flags().is_empty());
    }
}

#[test]
fn test_text_roundtrip_empty_and_rich_boards() {
    for board in [Board::new(20, 10), rich_board()] {
        let decoded = TextCodec.decode(&TextCodec.encode(&board)).unwrap();
        assert_eq!(decoded, board);
    }
}

#[test]
fn test_text_decode_error_applies_nothing() {
    let mut board = rich_board();
    let before = board.clone();

    // Valid header and first cell, then a broken line.
    let result = TextCodec.decode(b"3;4\n0;0;0;0;1\n0;1;0;zero;2\n");
    assert!(matches!(result, Err(DecodeError::NotNumeric { line: 3, field: 3, .. })));
    if let Ok(snapshot) = result {
        board.replace(snapshot);
    }
    assert_eq!(board, before);
}

#[test]
fn test_binary_preserves_visible_colors() {
    let board = rich_board();

    let occupied = BinaryCodec::new(3, 4, Visibility::Occupied);
    let decoded = occupied.decode(&occupied.encode(&board)).unwrap();
    for (orig, got) in board.cells().iter().zip(decoded.cells()) {
        assert_eq!(orig.value(), got.value());
        assert!(got.flags().is_empty());
    }

    let marked = BinaryCodec::new(3, 4, Visibility::Marked);
    let decoded = marked.decode(&marked.encode(&board)).unwrap();
    for (orig, got) in board.cells().iter().zip(decoded.cells()) {
        if orig.flags().is_empty() {
            assert!(got.is_empty(), "unmarked cell ({}, {}) leaked", orig.x(), orig.y());
        } else {
            assert_eq!(orig.value(), got.value());
        }
    }
}

#[test]
fn test_binary_payload_is_row_major() {
    let mut board = Board::new(2, 3);
    board.set_cell(Block::new(BlockColor::Blue, 1, 0));
    board.set_cell(Block::new(BlockColor::Red, 0, 2));

    let codec = BinaryCodec::new(2, 3, Visibility::Occupied);
    assert_eq!(codec.frame_len(), 6);
    assert_eq!(codec.encode(&board), vec![0, 0, 6, 3, 0, 0]);
}

#[test]
fn test_format_from_env_defaults_to_text() {
    // Only meaningful when the variable is unset in the test environment.
    if std::env::var("TETRIS_SYNC_FORMAT").is_err() {
        assert_eq!(FrameFormat::from_env(4, 4), FrameFormat::text());
    }
}
