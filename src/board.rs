//! Board space allocator (§4.4.1, §6.2).
//!
//! Not present in the upstream C++ sources available to this core (the file was stripped from
//! the source dump as a dependency-heavy outlier); implemented directly from the spec's
//! documented contract: a deterministic row-packing allocator. A zero row/column means
//! "auto-place after the last allocation"; a zero width/height means "apply the per-kind
//! default".

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A card's position and extent on the dashboard grid (§3.4, §4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardPosition {
    pub row: u32,
    pub column: u32,
    pub width: u32,
    pub height: u32,
}

/// What a statement asked for; zero coordinates mean "let the allocator decide" (§4.4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardPositionRequest {
    pub row: u32,
    pub column: u32,
    pub width: u32,
    pub height: u32,
}

/// Default extent for an INPUT card (§4.4.1).
pub const INPUT_DEFAULT_SIZE: (u32, u32) = (3, 1);
/// Default extent for a VIZ card (§4.4.1).
pub const VIZ_DEFAULT_SIZE: (u32, u32) = (12, 4);

/// Number of columns in the dashboard grid that auto-placement packs rows against.
const BOARD_WIDTH: u32 = 12;

/// Deterministic allocator: auto-placed cards are packed left-to-right, top-to-bottom, wrapping
/// to a new row once a card would overflow [`BOARD_WIDTH`]. Explicitly positioned cards (nonzero
/// row/column) do not move the cursor backwards, only forwards past their own footprint, so a
/// later auto-placed card never overlaps one explicitly placed earlier in allocation order.
#[derive(Debug, Default)]
pub struct BoardAllocator {
    cursor_row: u32,
    cursor_column: u32,
}

impl BoardAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `allocate({width, height, row, column})` (§6.2): populates a [`CardPosition`],
    /// expanding zero width/height into `default_size` and zero row/column into the next
    /// auto-placement slot.
    pub fn allocate(&mut self, request: CardPositionRequest, default_size: (u32, u32)) -> CardPosition {
        let width = if request.width == 0 { default_size.0 } else { request.width };
        let height = if request.height == 0 { default_size.1 } else { request.height };

        let (row, column) = if request.row == 0 && request.column == 0 {
            self.next_auto_slot(width)
        } else {
            (request.row, request.column)
        };

        self.advance_past(row, column, width, height);

        CardPosition {
            row,
            column,
            width,
            height,
        }
    }

    fn next_auto_slot(&mut self, width: u32) -> (u32, u32) {
        if self.cursor_column + width > BOARD_WIDTH && self.cursor_column != 0 {
            self.cursor_row += 1;
            self.cursor_column = 0;
        }
        (self.cursor_row, self.cursor_column)
    }

    fn advance_past(&mut self, row: u32, column: u32, width: u32, height: u32) {
        let next_column = column + width;
        if next_column >= BOARD_WIDTH {
            self.cursor_row = self.cursor_row.max(row + height);
            self.cursor_column = 0;
        } else {
            self.cursor_row = self.cursor_row.max(row);
            self.cursor_column = next_column;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_place_defaults_size() {
        let mut board = BoardAllocator::new();
        let pos = board.allocate(CardPositionRequest::default(), INPUT_DEFAULT_SIZE);
        assert_eq!(pos, CardPosition { row: 0, column: 0, width: 3, height: 1 });
    }

    #[test]
    fn test_auto_place_packs_next_card_to_the_right() {
        let mut board = BoardAllocator::new();
        let first = board.allocate(CardPositionRequest::default(), INPUT_DEFAULT_SIZE);
        let second = board.allocate(CardPositionRequest::default(), INPUT_DEFAULT_SIZE);
        assert_eq!(first.column, 0);
        assert_eq!(second.column, first.width);
        assert_eq!(second.row, first.row);
    }

    #[test]
    fn test_auto_place_wraps_when_row_is_full() {
        let mut board = BoardAllocator::new();
        for _ in 0..4 {
            board.allocate(CardPositionRequest::default(), INPUT_DEFAULT_SIZE);
        }
        let fifth = board.allocate(CardPositionRequest::default(), INPUT_DEFAULT_SIZE);
        assert_eq!(fifth.row, 1);
        assert_eq!(fifth.column, 0);
    }

    #[test]
    fn test_explicit_position_is_respected() {
        let mut board = BoardAllocator::new();
        let pos = board.allocate(
            CardPositionRequest { row: 5, column: 2, width: 0, height: 0 },
            VIZ_DEFAULT_SIZE,
        );
        assert_eq!(pos, CardPosition { row: 5, column: 2, width: 12, height: 4 });
    }
}
