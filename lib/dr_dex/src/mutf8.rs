use crate::errors::{DexError, DexResult};

// Decodes a non-null-terminated MUTF-8 buffer into an UTF-16 code unit
// vector. Surrogate pairs are kept as-is since they are not valid Rust
// chars on their own; the caller converts with String::from_utf16.
#[allow(clippy::cast_lossless)]
pub(crate) fn decode(inp: &[u8]) -> DexResult<Vec<u16>> {
    let mut i = 0;
    let mut buf: Vec<u16> = Vec::new();

    while i < inp.len() {
        let a = inp[i];
        i += 1;

        if a == 0 {
            return Err(DexError::InvalidMutf8(
                "embedded null-byte in string data".to_string(),
            ));
        }

        if a < 0x80 {
            buf.push(a as u16);
        } else if (a & 0xe0) == 0xc0 {
            if i >= inp.len() {
                return Err(DexError::InvalidMutf8(
                    "not enough data to read 2-points char".to_string(),
                ));
            }
            let b = inp[i];
            i += 1;
            if (b & 0xc0) != 0x80 {
                return Err(DexError::InvalidMutf8("bad second byte".to_string()));
            }
            let mut ch: u16 = ((a as u16) & 0x1f) << 6;
            ch |= (b as u16) & 0x3f;
            buf.push(ch);
        } else if (a & 0xf0) == 0xe0 {
            if i + 1 >= inp.len() {
                return Err(DexError::InvalidMutf8(
                    "not enough data to read 3-points char".to_string(),
                ));
            }
            let b = inp[i];
            let c = inp[i + 1];
            i += 2;
            if ((b & 0xc0) != 0x80) || ((c & 0xc0) != 0x80) {
                return Err(DexError::InvalidMutf8(
                    "bad second or third byte".to_string(),
                ));
            }
            let mut ch: u16 = ((a as u16) & 0x0f) << 12;
            ch |= ((b as u16) & 0x3f) << 6;
            ch |= (c as u16) & 0x3f;
            buf.push(ch);
        } else {
            return Err(DexError::InvalidMutf8("bad byte".to_string()));
        }
    }

    Ok(buf)
}

pub(crate) fn to_string(inp: &[u8]) -> DexResult<String> {
    let utf16 = decode(inp)?;
    String::from_utf16(&utf16)
        .map_err(|_| DexError::InvalidMutf8("unpaired surrogate".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_roundtrip() {
        assert_eq!(to_string(b"Landroid/app/Activity;").unwrap(), "Landroid/app/Activity;");
    }

    #[test]
    fn two_byte_null_encoding() {
        // MUTF-8 encodes U+0000 as 0xc0 0x80.
        assert_eq!(to_string(&[0xc0, 0x80]).unwrap(), "\u{0}");
    }

    #[test]
    fn three_byte_char() {
        assert_eq!(to_string(&[0xe4, 0xbd, 0xa0]).unwrap(), "你");
    }

    #[test]
    fn rejects_raw_null() {
        assert!(to_string(&[0x41, 0x00, 0x42]).is_err());
    }
}
