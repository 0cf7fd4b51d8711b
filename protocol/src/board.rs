//! Board notation transcoding
//!
//! Style-12 updates carry the position as eight space-separated ranks of eight
//! characters each, rank 8 first, with `-` for an empty square:
//!
//! ```text
//! --Q----- -p---pkp p-----p- ----q--- P-p----- -----r-P ---R--PK --------
//! ```
//!
//! The compact rank notation used everywhere else collapses runs of empty
//! squares into a count and joins ranks with `/`:
//!
//! ```text
//! 2Q5/1p3pkp/p5p1/4q3/P1p5/5r1P/3R2PK/8
//! ```

pub const BOARD_SIZE: usize = 8;
pub const EMPTY_SQUARE: char = '-';

const PIECES: &str = "pnbrqkPNBRQK";

/// Square-by-square contents, rank 8 first, file a first
pub type Occupancy = [[Option<char>; BOARD_SIZE]; BOARD_SIZE];

fn is_piece(c: char) -> bool {
    PIECES.contains(c)
}

/// Converts a packed style-12 board into compact rank notation
///
/// Returns `None` unless the input holds exactly eight ranks of eight valid
/// squares.
pub fn ranks_to_fen(packed: &str) -> Option<String> {
    let ranks: Vec<&str> = packed.split_whitespace().collect();
    if ranks.len() != BOARD_SIZE {
        return None;
    }

    let mut encoded = Vec::with_capacity(BOARD_SIZE);
    for rank in ranks {
        encoded.push(encode_rank(rank)?);
    }

    Some(encoded.join("/"))
}

fn encode_rank(rank: &str) -> Option<String> {
    if rank.chars().count() != BOARD_SIZE {
        return None;
    }

    let mut out = String::with_capacity(BOARD_SIZE);
    let mut empty_run = 0;

    for square in rank.chars() {
        if square == EMPTY_SQUARE {
            empty_run += 1;
            continue;
        }
        if !is_piece(square) {
            return None;
        }
        if empty_run > 0 {
            out.push_str(&empty_run.to_string());
            empty_run = 0;
        }
        out.push(square);
    }

    if empty_run > 0 {
        out.push_str(&empty_run.to_string());
    }

    Some(out)
}

/// Expands compact rank notation back into per-square occupancy
///
/// Accepts any grouping of empty runs (`44` reads the same as `8`) as long as
/// every rank covers exactly eight squares.
pub fn expand_fen(fen: &str) -> Option<Occupancy> {
    let ranks: Vec<&str> = fen.split('/').collect();
    if ranks.len() != BOARD_SIZE {
        return None;
    }

    let mut board: Occupancy = [[None; BOARD_SIZE]; BOARD_SIZE];

    for (row, rank) in ranks.iter().enumerate() {
        let mut file = 0;

        for c in rank.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as usize;
            } else if is_piece(c) {
                if file >= BOARD_SIZE {
                    return None;
                }
                board[row][file] = Some(c);
                file += 1;
            } else {
                return None;
            }

            if file > BOARD_SIZE {
                return None;
            }
        }

        if file != BOARD_SIZE {
            return None;
        }
    }

    Some(board)
}

/// Reads a packed style-12 board directly into occupancy
pub fn packed_occupancy(packed: &str) -> Option<Occupancy> {
    let ranks: Vec<&str> = packed.split_whitespace().collect();
    if ranks.len() != BOARD_SIZE {
        return None;
    }

    let mut board: Occupancy = [[None; BOARD_SIZE]; BOARD_SIZE];
    for (row, rank) in ranks.iter().enumerate() {
        if rank.chars().count() != BOARD_SIZE {
            return None;
        }
        for (file, square) in rank.chars().enumerate() {
            if square != EMPTY_SQUARE {
                board[row][file] = Some(square);
            }
        }
    }

    Some(board)
}
