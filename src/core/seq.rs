//! Wrapping 16-bit tick sequence numbers

use std::fmt;

use crate::wire::{Decode, Encode, Reader, WireError, Writer};

/// Simulation tick counter, modular in 16 bits.
///
/// Comparisons use shortest-path distance on the 65536 ring, so ordering
/// keeps working across the wrap: sequence 65535 is behind sequence 1.
/// There is deliberately no `Ord` impl; modular order is not total.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Seq(pub u16);

impl Seq {
    pub const ZERO: Seq = Seq(0);

    pub fn next(self) -> Seq {
        Seq(self.0.wrapping_add(1))
    }

    pub fn advance(&mut self) {
        *self = self.next();
    }

    pub fn add(self, n: u16) -> Seq {
        Seq(self.0.wrapping_add(n))
    }

    /// Signed shortest distance from `other` to `self`. Positive when
    /// `self` is ahead. The antipode (distance 32768) maps to -32768.
    pub fn closest_diff(self, other: Seq) -> i16 {
        self.0.wrapping_sub(other.0) as i16
    }

    pub fn is_ahead_of(self, other: Seq) -> bool {
        self.closest_diff(other) > 0
    }

    pub fn is_behind(self, other: Seq) -> bool {
        self.closest_diff(other) < 0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for Seq {
    fn encode(&self, w: &mut Writer) {
        w.put_u16(self.0);
    }
}

impl Decode for Seq {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Seq(r.get_u16()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn behind_across_the_wrap() {
        assert!(Seq(65_535).is_behind(Seq(1)));
        assert!(Seq(1).is_ahead_of(Seq(65_535)));
        assert_eq!(Seq(1).closest_diff(Seq(65_535)), 2);
        assert_eq!(Seq(65_535).closest_diff(Seq(1)), -2);
    }

    #[test]
    fn equal_is_neither_ahead_nor_behind() {
        let s = Seq(1234);
        assert!(!s.is_ahead_of(s));
        assert!(!s.is_behind(s));
        assert_eq!(s.closest_diff(s), 0);
    }

    #[test]
    fn next_wraps_to_zero() {
        assert_eq!(Seq(65_535).next(), Seq(0));
        let mut s = Seq(65_535);
        s.advance();
        assert_eq!(s, Seq::ZERO);
    }

    #[test]
    fn antipode_is_negative() {
        // exactly opposite points read as behind, one consistent answer
        assert_eq!(Seq(0).closest_diff(Seq(32_768)), -32_768);
        assert!(Seq(0).is_behind(Seq(32_768)));
    }

    proptest! {
        #[test]
        fn forward_steps_always_read_ahead(base: u16, step in 1u16..32_768) {
            let a = Seq(base);
            let b = a.add(step);
            prop_assert!(b.is_ahead_of(a));
            prop_assert!(a.is_behind(b));
            prop_assert_eq!(b.closest_diff(a) as i32, step as i32);
        }

        #[test]
        fn diff_is_antisymmetric(a: u16, b: u16) {
            prop_assume!(Seq(a).closest_diff(Seq(b)) != i16::MIN);
            prop_assert_eq!(
                Seq(a).closest_diff(Seq(b)),
                -(Seq(b).closest_diff(Seq(a)))
            );
        }
    }
}
