use bitvec::{order::Msb0, vec::BitVec};

/// Which pieces a peer claims to possess, one bit per piece.
///
/// The wire layout is most-significant-bit first within each byte: piece
/// `i` lives at byte `i / 8`, bit position `7 - (i % 8)`. `Msb0` ordering
/// gives exactly that, so raw bitfield payload bytes wrap without any
/// reshuffling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitfield(BitVec<u8, Msb0>);

impl Bitfield {
    /// wrap the payload bytes of a `bitfield` message.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(BitVec::from_vec(bytes))
    }

    /// an all-zero bitfield wide enough for `num_pieces` pieces.
    pub fn with_piece_count(num_pieces: usize) -> Self {
        Self(BitVec::repeat(false, num_pieces.div_ceil(8) * 8))
    }

    pub fn has_piece(&self, index: usize) -> bool {
        self.0.get(index).map(|bit| *bit).unwrap_or(false)
    }

    /// bits are only ever set, never cleared; peers announce new pieces
    /// with `have` but cannot take one back.
    pub fn set_piece(&mut self, index: usize) {
        if index < self.0.len() {
            self.0.set(index, true);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_raw_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0b1000_0000)]
    #[case(3, 0b0001_0000)]
    #[case(7, 0b0000_0001)]
    fn set_piece_uses_msb_first_layout(#[case] index: usize, #[case] expected: u8) {
        let mut bitfield = Bitfield::with_piece_count(8);
        bitfield.set_piece(index);
        assert_eq!(bitfield.as_bytes(), &[expected]);
    }

    #[rstest]
    fn set_then_has_leaves_other_bits_untouched() {
        let mut bitfield = Bitfield::with_piece_count(20);
        bitfield.set_piece(9);
        bitfield.set_piece(17);

        for index in 0..20 {
            assert_eq!(bitfield.has_piece(index), index == 9 || index == 17);
        }
    }

    #[rstest]
    fn wire_bytes_round_trip() {
        let bitfield = Bitfield::from_bytes(vec![0b0101_0100, 0b0101_0101]);

        assert!(!bitfield.has_piece(0));
        assert!(bitfield.has_piece(1));
        assert!(bitfield.has_piece(3));
        assert!(bitfield.has_piece(5));
        assert!(bitfield.has_piece(15));
        assert_eq!(bitfield.as_bytes(), &[0b0101_0100, 0b0101_0101]);
    }

    #[rstest]
    fn out_of_range_reads_are_false_and_writes_are_ignored() {
        let mut bitfield = Bitfield::from_bytes(vec![0xFF]);
        assert!(!bitfield.has_piece(8));
        bitfield.set_piece(12);
        assert_eq!(bitfield.as_bytes(), &[0xFF]);
    }
}
