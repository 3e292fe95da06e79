//! Unsigned varint used by multicodec prefixes
//!
//! Multicodec values used here fit in an `u16`, so at most three bytes are produced
use super::types::KeyError;

const LSB_7: u8 = 0x7f;
const MSB: u8 = 0x80;

pub(crate) fn encode(value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    let mut rest = value;

    loop {
        let chunk = (rest as u8) & LSB_7;
        rest >>= 7;

        if rest == 0 {
            out.push(chunk);
            break;
        }

        out.push(chunk | MSB);
    }

    out
}

/// Decodes a varint from the head of `encoded`, returning the value and the number
/// of bytes it took
pub(crate) fn decode(encoded: &[u8]) -> Result<(u16, usize), KeyError> {
    let mut value: u32 = 0;

    for (idx, byte) in encoded.iter().enumerate().take(3) {
        value |= ((byte & LSB_7) as u32) << (7 * idx);

        if byte & MSB == 0 {
            let decoded = u16::try_from(value)
                .map_err(|_| KeyError::InvalidVarint("value overflows u16".to_string()))?;
            return Ok((decoded, idx + 1));
        }
    }

    if encoded.len() >= 3 {
        return Err(KeyError::InvalidVarint("value overflows u16".to_string()));
    }

    Err(KeyError::InvalidVarint("missing bytes".to_string()))
}
