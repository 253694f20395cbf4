// SPDX-License-Identifier: MIT

/// Word type a wrapping byte sum can accumulate into.
pub trait SumWord: Copy + Default {
    fn add_byte(self, b: u8) -> Self;
}

impl SumWord for u16 {
    #[inline(always)]
    fn add_byte(self, b: u8) -> Self {
        self.wrapping_add(b as u16)
    }
}

/// Core accumulator with an escape predicate on the byte index within `data`.
/// The predicate returning true means "skip this byte".
#[inline(always)]
pub fn accumulate_sum_with_escape<T, F>(sum: &mut T, data: &[u8], mut escape: F)
where
    T: SumWord,
    F: FnMut(usize, u8) -> bool,
{
    for (i, &b) in data.iter().enumerate() {
        if escape(i, b) {
            continue;
        }
        *sum = sum.add_byte(b);
    }
}

#[inline(always)]
pub fn accumulate_sum<T: SumWord>(sum: &mut T, data: &[u8]) {
    for &b in data {
        *sum = sum.add_byte(b);
    }
}

#[inline(always)]
pub fn sum16(data: &[u8]) -> u16 {
    let mut s = 0u16;
    accumulate_sum(&mut s, data);
    s
}

/// Sum of `data` with the bytes in `skip` left out.
#[inline(always)]
pub fn sum16_skipping(data: &[u8], skip: core::ops::Range<usize>) -> u16 {
    let mut s = 0u16;
    accumulate_sum_with_escape(&mut s, data, |i, _| skip.contains(&i));
    s
}

/// XOR of every byte, used as page parity.
#[inline(always)]
pub fn xor_parity(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum16_wraps() {
        let data = [0xFFu8; 300];
        assert_eq!(sum16(&data), (300u32 * 0xFF % 65536) as u16);
    }

    #[test]
    fn test_skip_range() {
        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(sum16_skipping(&data, 1..3), 1 + 4 + 5);
        assert_eq!(sum16_skipping(&data, 0..0), 15);
    }

    #[test]
    fn test_parity() {
        assert_eq!(xor_parity(&[0x0F, 0xF0, 0x01]), 0xFE);
        assert_eq!(xor_parity(&[]), 0);
    }
}
