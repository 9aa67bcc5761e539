/// Printable form of bytes that may be text: NULs stripped, invalid UTF-8
/// replaced.
pub fn sanitize(bytes: &[u8]) -> String {
    let cleaned: Vec<u8> = bytes.iter().copied().filter(|&b| b != 0).collect();
    String::from_utf8_lossy(&cleaned).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_nul_and_replaces_invalid_utf8() {
        assert_eq!(sanitize(b"boot\x00 ok"), "boot ok");
        assert_eq!(sanitize(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
        assert_eq!(sanitize(b""), "");
    }
}
