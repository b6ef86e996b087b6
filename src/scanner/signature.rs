// Tue Jan 13 2026 - Alex

/// Magic bytes at the start of every ELF image.
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

pub const SIGNATURE_LEN: usize = ELF_MAGIC.len();

/// True when `header` begins with the ELF magic.
pub fn matches_signature(header: &[u8]) -> bool {
    header.get(..SIGNATURE_LEN) == Some(&ELF_MAGIC[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_magic_matches() {
        assert!(matches_signature(&[0x7F, 0x45, 0x4C, 0x46]));
        assert!(matches_signature(b"\x7fELF\x02\x01\x01"));
    }

    #[test]
    fn test_any_single_byte_deviation_is_rejected() {
        for index in 0..SIGNATURE_LEN {
            for delta in 1..=255u8 {
                let mut header = ELF_MAGIC;
                header[index] = header[index].wrapping_add(delta);
                assert!(!matches_signature(&header), "{:02x?}", header);
            }
        }
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        assert!(!matches_signature(b"\x7fEL"));
        assert!(!matches_signature(&[]));
    }
}
