use crate::transport::{Transport, VendorRequest};
use crate::{Result, UsbError};

/// Boards that can host the emulated controller.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Board {
    /// GreatFET One.
    GreatFetOne,
    /// Azalea, the GreatFET One's predecessor.
    Azalea,
}

/// A registry entry: the board and the board IDs it handles.
pub struct BoardEntry {
    /// Board selected when the ID matches.
    pub board: Board,
    /// Board IDs reported by the firmware of this board.
    pub handled_ids: &'static [u8],
}

/// Boards in detection order. The first entry handling a board ID wins.
pub static BOARD_REGISTRY: &[BoardEntry] = &[
    BoardEntry {
        board: Board::GreatFetOne,
        handled_ids: &[0],
    },
    BoardEntry {
        board: Board::Azalea,
        handled_ids: &[1],
    },
];

impl Board {
    /// Human-readable board name.
    pub fn name(&self) -> &'static str {
        match self {
            Board::GreatFetOne => "GreatFET One",
            Board::Azalea => "Azalea",
        }
    }

    /// Selects the board handling `board_id` from [`BOARD_REGISTRY`].
    ///
    /// # Errors
    ///
    /// * [`InvalidBoard`](crate::UsbError::InvalidBoard) - No registered board handles the ID.
    pub fn autodetect(board_id: u8) -> Result<Board> {
        Self::autodetect_in(BOARD_REGISTRY, board_id)
    }

    /// Selects the first board of `registry` handling `board_id`.
    pub fn autodetect_in(registry: &[BoardEntry], board_id: u8) -> Result<Board> {
        registry
            .iter()
            .find(|entry| entry.handled_ids.contains(&board_id))
            .map(|entry| entry.board)
            .ok_or(UsbError::InvalidBoard(board_id))
    }

    /// Reads the board ID through `transport` and selects the matching board.
    pub fn detect(transport: &mut dyn Transport) -> Result<Board> {
        let response = transport.vendor_request_in(VendorRequest::ReadBoardId, 0, 0, 1)?;

        let board_id = *response.first().ok_or(UsbError::MissingBoardId)?;

        let board = Self::autodetect(board_id)?;
        usb_debug!("detected {} (board id {})", board.name(), board_id);

        Ok(board)
    }
}
