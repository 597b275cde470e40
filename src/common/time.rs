// SPDX-License-Identifier: GPL-2.0-or-later

pub const MILLISECONDS_PER_SECOND: u32 = 1000;

// Converts milliseconds to timescale units. The timescale is reduced
// to whole units per millisecond before multiplying, so timescales
// that are not a multiple of 1000 lose their remainder.
// Returns None on overflow.
#[must_use]
pub fn rescale_millis(millis: u64, timescale: u32) -> Option<u64> {
    millis.checked_mul(u64::from(timescale / MILLISECONDS_PER_SECOND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(10_000, 90_000, Some(900_000); "video")]
    #[test_case(10_000, 1000, Some(10_000); "milliseconds")]
    #[test_case(10_000, 44_100, Some(440_000); "truncated timescale")]
    #[test_case(10_000, 999, Some(0); "sub millisecond timescale")]
    #[test_case(u64::MAX, 90_000, None; "overflow")]
    fn test_rescale_millis(millis: u64, timescale: u32, want: Option<u64>) {
        assert_eq!(want, rescale_millis(millis, timescale));
    }
}
