/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Conversion between IEEE doubles and the Atari's 6-byte BCD floating
//! point format: one exponent byte (sign in bit 7, biased base-100
//! exponent in the low 7 bits) followed by five digit bytes, each
//! packing two decimal digits per nibble.

use crate::sbuf::StringBuf;

/// A 6-byte Atari BCD float: an exponent/sign byte plus five digit bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtariBcd {
    pub exp: u8,
    pub digits: [u8; 5],
}

fn to_bcd_byte(n: u64) -> u8 {
    ((n / 10) * 16 + (n % 10)) as u8
}

/// Converts `x` to its Atari BCD encoding, per the underflow/saturation
/// rules in the format's spec.
pub fn to_bcd(x: f64) -> AtariBcd {
    if x == 0.0 {
        return AtariBcd::default();
    }

    let mut exp_sign: u8 = 0;
    let mut x = x;
    if x < 0.0 {
        exp_sign = 0x80;
        x = -x;
    }

    if x < 1e-99 {
        return AtariBcd { exp: exp_sign, digits: [0; 5] };
    }
    if x >= 1e+98 {
        return AtariBcd { exp: exp_sign | 0x71, digits: [0x99; 5] };
    }

    for i in 0..99u32 {
        let bound = decade(i as i32 - 49);
        if x < bound {
            let n = (0.5 + x * 10_000_000_000.0 / bound) as u64;
            let mut digits = [0u8; 5];
            let mut n = n;
            digits[4] = to_bcd_byte(n % 100);
            n /= 100;
            digits[3] = to_bcd_byte(n % 100);
            n /= 100;
            digits[2] = to_bcd_byte(n % 100);
            n /= 100;
            digits[1] = to_bcd_byte(n % 100);
            n /= 100;
            digits[0] = to_bcd_byte(n);
            return AtariBcd { exp: exp_sign | (0x0E + i as u8), digits };
        }
    }
    unreachable!("x bounded below 1e+98 must land in the decade table")
}

/// `10^(2*i)` for `i` in `-49..=49`, matching the encode-side decade
/// table's `1e-98 .. 1e+98` sweep in steps of `1e2`.
fn decade(i: i32) -> f64 {
    10f64.powi(2 * i)
}

/// `10^(2*i)` for `i` in `0..128`, offset so index 0 is `1e-136` — the
/// decode-side table, which is shifted and twice as wide as the
/// encode-side one because the stored exponent biases differently.
fn decode_decade(i: u8) -> f64 {
    10f64.powi(2 * i as i32 - 136)
}

/// Decodes a BCD value back to a double. The two all-zero-exponent
/// encodings (`0x00`, `0x80`) are the canonical representations of
/// `+0.0`/`-0.0` and are handled without touching the digit bytes.
pub fn from_bcd(n: AtariBcd) -> f64 {
    if n.exp == 0 {
        return 0.0;
    }
    if n.exp == 0x80 {
        return -0.0;
    }

    let mut x = 0.0f64;
    for &d in &n.digits {
        x = x * 100.0 + (d >> 4) as f64 * 10.0 + (d & 0x0F) as f64;
    }
    x *= decode_decade(n.exp & 0x7F);

    if n.exp & 0x80 != 0 { -x } else { x }
}

/// Formats `n` the way the source representation would read: an
/// integer or decimal mantissa when the magnitude is near 1, otherwise
/// `mantissa E [-]dd`.
pub fn format_bcd(n: AtariBcd, out: &mut StringBuf) {
    if n.exp & 0x7F == 0 {
        out.put(b'0');
        return;
    }

    let mut dig = [0u8; 10];
    for i in 0..5 {
        dig[2 * i] = b'0' + (n.digits[i] >> 4);
        dig[2 * i + 1] = b'0' + (n.digits[i] & 0x0F);
    }

    let mut exp = (n.exp & 0x7F) as i32 * 2 - 136;
    let sign = n.exp & 0x80 != 0;

    let mut end = 10usize; // exclusive length of the significant digit run
    while end > 1 && dig[end - 1] == b'0' {
        end -= 1;
        exp += 1;
    }

    if sign {
        out.put(b'-');
    }

    let mut start = 0usize;
    if dig[0] == b'0' {
        start = 1;
    }
    let ndig = (end - start) as i32;

    if exp < 0 && exp >= -ndig {
        let mut e = exp;
        let mut p = start;
        while e > -ndig {
            out.put(dig[p]);
            p += 1;
            e -= 1;
        }
        out.put(b'.');
        out.append(&dig[p..end]);
    } else if exp + 1 == -ndig {
        out.put(b'.');
        out.put(b'0');
        out.append(&dig[start..end]);
    } else if exp == 0 {
        out.append(&dig[start..end]);
    } else if exp == 1 {
        out.append(&dig[start..end]);
        out.put(b'0');
    } else if exp == 2 {
        out.append(&dig[start..end]);
        out.put(b'0');
        out.put(b'0');
    } else {
        out.append(&dig[start..end]);
        out.put(b'E');
        let mut e = exp;
        if e < 0 {
            out.put(b'-');
            e = -e;
        }
        if e > 9 {
            out.put(b'0' + (e / 10) as u8);
        }
        out.put(b'0' + (e % 10) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(x: f64) {
        let bcd = to_bcd(x);
        let back = from_bcd(bcd);
        assert!((back - x).abs() <= x.abs() * 1e-9, "{x} -> {bcd:?} -> {back}");
    }

    #[test]
    fn zero_is_the_all_zero_encoding() {
        assert_eq!(to_bcd(0.0), AtariBcd::default());
        assert_eq!(from_bcd(AtariBcd::default()), 0.0);
    }

    #[test]
    fn roundtrips_common_values() {
        for x in [1.0, -1.0, 0.5, 100.0, 12345.0, -12345.0, 3.14159, 1e50, -1e-50, 65536.0] {
            roundtrip(x);
        }
    }

    #[test]
    fn underflow_saturates_to_zero() {
        assert_eq!(to_bcd(1e-99), AtariBcd::default());
    }

    #[test]
    fn overflow_saturates_to_max() {
        let bcd = to_bcd(1e98);
        assert_eq!(bcd.exp & 0x7F, 0x71);
        assert_eq!(bcd.digits, [0x99; 5]);
        let neg = to_bcd(-1e99);
        assert_eq!(neg.exp & 0x80, 0x80);
    }

    fn fmt(x: f64) -> String {
        let mut sb = StringBuf::new();
        format_bcd(to_bcd(x), &mut sb);
        String::from_utf8(sb.into_vec()).unwrap()
    }

    #[test]
    fn prints_small_integers_plainly() {
        assert_eq!(fmt(6.0), "6");
        assert_eq!(fmt(10.0), "10");
        assert_eq!(fmt(100.0), "100");
    }

    #[test]
    fn prints_fractions_with_leading_dot() {
        assert_eq!(fmt(0.5), ".5");
        assert_eq!(fmt(0.04), ".04");
    }

    #[test]
    fn prints_large_values_in_scientific_notation() {
        assert_eq!(fmt(1e10), "1E10");
        assert_eq!(fmt(1.5e-20), "1.5E-20");
    }
}
