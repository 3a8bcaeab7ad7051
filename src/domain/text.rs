/// Decodes UTF-8, dropping invalid sequences instead of replacing them.
pub fn decode_utf8_ignoring(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bytes_are_dropped() {
        assert_eq!(decode_utf8_ignoring(b"ab\xffcd"), "abcd");
        assert_eq!(decode_utf8_ignoring(b"\xc3"), "");
        assert_eq!(decode_utf8_ignoring("olá".as_bytes()), "olá");
    }
}
