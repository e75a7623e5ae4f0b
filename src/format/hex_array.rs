use tracing::warn;

use crate::error::FormatError;

/// Hex digit lookup, -1 for everything that is not a hex digit.
static HEX_LUT: [i8; 256] = build_hex_lut();

const fn build_hex_lut() -> [i8; 256] {
    let mut lut = [-1i8; 256];
    let mut i = 0;
    while i < 10 {
        lut[b'0' as usize + i] = i as i8;
        i += 1;
    }
    let mut j = 0;
    while j < 6 {
        lut[b'a' as usize + j] = 10 + j as i8;
        lut[b'A' as usize + j] = 10 + j as i8;
        j += 1;
    }
    lut
}

fn find_sub(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Parses the integer immediately following a declaration bracket, the way
/// atoi would: optional whitespace, then digits, stopping at anything else.
fn parse_leading_int(bytes: &[u8]) -> i64 {
    let mut value: i64 = 0;
    let mut seen = false;
    for &b in bytes.iter().skip_while(|b| b.is_ascii_whitespace()) {
        if b.is_ascii_digit() {
            value = value * 10 + i64::from(b - b'0');
            seen = true;
        } else {
            break;
        }
    }
    if seen {
        value
    } else {
        0
    }
}

/// Decodes a legacy C source file holding an image as an unsigned-char hex
/// array.
///
/// The byte-pair swap on odd indices reproduces the historical decoder
/// exactly; the sprites on devices in the field were generated against it,
/// so changing it would corrupt every legacy image.
pub fn decode_hex_array(text: &[u8]) -> Result<Vec<u8>, FormatError> {
    let decl = find_sub(text, b"const unsigned char", 0)
        .ok_or_else(|| FormatError::MalformedHexArray("no array declaration".into()))?;

    let open = find_sub(text, b"[", decl)
        .ok_or_else(|| FormatError::MalformedHexArray("no size bracket".into()))?;
    let close = find_sub(text, b"]", open)
        .ok_or_else(|| FormatError::MalformedHexArray("unterminated size bracket".into()))?;

    let declared = parse_leading_int(&text[open + 1..close]);
    if declared <= 0 || declared > 200_000 {
        return Err(FormatError::MalformedHexArray(format!(
            "declared size {declared} out of range"
        )));
    }
    let declared = declared as usize;

    let brace = find_sub(text, b"{", close)
        .ok_or_else(|| FormatError::MalformedHexArray("no array body".into()))?;

    let mut buf = vec![0u8; declared];
    let mut index = 0usize;
    let mut p = brace + 1;
    let end = text.len();

    while p + 5 < end && index < declared {
        let Some(zero) = text[p..].iter().position(|&b| b == b'0').map(|o| o + p) else {
            break;
        };
        if zero + 3 >= end {
            break;
        }
        p = zero;

        if text[p + 1] == b'x' || text[p + 1] == b'X' {
            p += 2;
            let high = HEX_LUT[text[p] as usize];
            let low = HEX_LUT[text[p + 1] as usize];
            if high >= 0 && low >= 0 {
                let value = ((high as u8) << 4) | low as u8;
                if index & 1 == 1 {
                    buf[index] = buf[index - 1];
                    buf[index - 1] = value;
                } else {
                    buf[index] = value;
                }
                index += 1;
                p += 2;
            } else {
                p += 1;
            }
        } else {
            p += 1;
        }
    }

    if index < declared {
        warn!("hex array incomplete: {index}/{declared} bytes");
        buf.truncate(index);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pairs_with_swap() {
        let text = b"const unsigned char img[4] = { 0x11, 0x22, 0x33, 0x44 };";
        let out = decode_hex_array(text).unwrap();
        // adjacent bytes land swapped, the historical layout
        assert_eq!(out, vec![0x22, 0x11, 0x44, 0x33]);
    }

    #[test]
    fn uppercase_prefix_and_digits() {
        let text = b"const unsigned char img[2] = { 0XAB, 0xcd };";
        let out = decode_hex_array(text).unwrap();
        assert_eq!(out, vec![0xCD, 0xAB]);
    }

    #[test]
    fn short_body_truncates_with_warning() {
        let text = b"const unsigned char img[6] = { 0x01, 0x02 };";
        let out = decode_hex_array(text).unwrap();
        assert_eq!(out, vec![0x02, 0x01]);
    }

    #[test]
    fn rejects_missing_declaration() {
        assert!(matches!(
            decode_hex_array(b"static int x[3] = {1, 2, 3};"),
            Err(FormatError::MalformedHexArray(_))
        ));
    }

    #[test]
    fn rejects_oversized_declaration() {
        let text = b"const unsigned char img[999999] = { 0x00 };";
        assert!(decode_hex_array(text).is_err());
    }

    #[test]
    fn skips_stray_zeroes_in_noise() {
        let text = b"const unsigned char img[2] = {\n  0x0A, /* 2024-01-01 */ 0x0B\n};";
        let out = decode_hex_array(text).unwrap();
        assert_eq!(out, vec![0x0B, 0x0A]);
    }
}
