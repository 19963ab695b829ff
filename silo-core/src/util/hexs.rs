use crate::error::{Result, SiloError};

pub fn parse_hex_array<const N: usize>(hex_str: &str) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| SiloError::Format(format!("invalid hex: {e}")))?;
    if bytes.len() != N {
        return Err(SiloError::Format(format!(
            "expected {N} bytes ({} hex chars), got {}",
            N * 2,
            bytes.len()
        )));
    }
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_width() {
        let arr: [u8; 4] = parse_hex_array("deadbeef").unwrap();
        assert_eq!(arr, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn rejects_wrong_width_and_junk() {
        assert!(parse_hex_array::<4>("dead").is_err());
        assert!(parse_hex_array::<4>("zzzzzzzz").is_err());
    }
}
