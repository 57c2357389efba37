//! One-byte message crypt, wire-compatible with the classic servers.
//!
//! PRIVMSG/NOTICE bodies between password-carrying clients are XORed with a
//! key derived from each client's PASS argument. Control bytes and the
//! escape character are escaped so the result stays inside a message body.
//! This is obfuscation, not cryptography; the point is byte-exact interop.

const CRYPT_BYTE: u8 = 42;
const CRYPT_PREFIX: u8 = b'#';

/// Derive the one-byte key from a password.
///
/// `key = Σ ((pass[i] + i) XOR 42) mod 256`
pub fn gen_key(pass: &str) -> u8 {
    let mut key: u8 = 0;
    for (n, b) in pass.bytes().enumerate() {
        key = key.wrapping_add((b.wrapping_add(n as u8)) ^ CRYPT_BYTE);
    }
    key
}

/// Encrypt a message body with the given key.
///
/// Any output byte below 0x20, and the escape byte `#` itself, is emitted
/// as the two-byte sequence `'#', code + '#'`.
pub fn encrypt(text: &[u8], key: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for &b in text {
        let code = b ^ key;
        if code < 0x20 || code == CRYPT_PREFIX {
            out.push(CRYPT_PREFIX);
            out.push(code.wrapping_add(CRYPT_PREFIX));
        } else {
            out.push(code);
        }
    }
    out
}

/// Decrypt a message body with the given key.
pub fn decrypt(text: &[u8], key: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut iter = text.iter();
    while let Some(&b) = iter.next() {
        if b == CRYPT_PREFIX {
            match iter.next() {
                Some(&escaped) => out.push(escaped.wrapping_sub(CRYPT_PREFIX) ^ key),
                None => break,
            }
        } else {
            out.push(b ^ key);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation_is_stable() {
        // First byte: ('s' + 0) ^ 42 = 0x73 ^ 0x2a = 0x59.
        assert_eq!(gen_key("s"), 0x59);
        assert_eq!(gen_key(""), 0);
        // Order matters through the index term.
        assert_ne!(gen_key("ab"), gen_key("ba"));
    }

    #[test]
    fn round_trip_plain_text() {
        for pass in ["secret", "x", "hunter2", "p4ss[]|"] {
            let key = gen_key(pass);
            for msg in ["hello world", "", "mixed CASE and 123", "# leading hash"] {
                let enc = encrypt(msg.as_bytes(), key);
                assert_eq!(decrypt(&enc, key), msg.as_bytes());
            }
        }
    }

    #[test]
    fn round_trip_all_bytes() {
        let every: Vec<u8> = (0u8..=255).collect();
        for key in [0u8, 1, 42, 0xff, gen_key("secret")] {
            let enc = encrypt(&every, key);
            assert_eq!(decrypt(&enc, key), every);
        }
    }

    #[test]
    fn control_bytes_are_escaped() {
        // With key 0, byte 0x01 encrypts to 0x01 < 0x20, so it must be
        // escaped as '#', 0x01 + '#'.
        let enc = encrypt(&[0x01], 0);
        assert_eq!(enc, vec![b'#', 0x01 + b'#']);
        // '#' itself is escaped too.
        let enc = encrypt(b"#", 0);
        assert_eq!(enc, vec![b'#', b'#' + b'#']);
    }

    #[test]
    fn ciphertext_has_no_raw_control_bytes() {
        let key = gen_key("secret");
        let enc = encrypt(b"\x01\x02\x03 text \x1f", key);
        // Raw control bytes never appear; escape pairs may encode them.
        let mut iter = enc.iter();
        while let Some(&b) = iter.next() {
            if b == b'#' {
                iter.next();
                continue;
            }
            assert!(b >= 0x20);
        }
    }

    #[test]
    fn truncated_escape_is_dropped() {
        // A dangling escape byte at end of input decodes to nothing.
        assert_eq!(decrypt(&[b'#'], 7), Vec::<u8>::new());
    }
}
