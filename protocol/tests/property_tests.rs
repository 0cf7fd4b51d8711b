use proptest::prelude::*;
use protocol::board::{expand_fen, packed_occupancy, ranks_to_fen};

fn square() -> impl Strategy<Value = char> {
    prop_oneof![
        4 => Just('-'),
        1 => prop::sample::select(vec!['p', 'n', 'b', 'r', 'q', 'k', 'P', 'N', 'B', 'R', 'Q', 'K']),
    ]
}

fn packed_board() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(square(), 8), 8).prop_map(|ranks| {
        ranks
            .into_iter()
            .map(|rank| rank.into_iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    })
}

proptest! {
    #[test]
    fn test_transcoding_round_trips_over_occupancy(packed in packed_board()) {
        let fen = ranks_to_fen(&packed).unwrap();
        prop_assert_eq!(expand_fen(&fen), packed_occupancy(&packed));
    }

    #[test]
    fn test_compact_ranks_have_no_adjacent_counts(packed in packed_board()) {
        let fen = ranks_to_fen(&packed).unwrap();
        let chars: Vec<char> = fen.chars().collect();

        prop_assert_eq!(fen.split('/').count(), 8);
        for pair in chars.windows(2) {
            prop_assert!(!(pair[0].is_ascii_digit() && pair[1].is_ascii_digit()));
        }
    }
}
