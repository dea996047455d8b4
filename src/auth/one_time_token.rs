use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

/// 32 bytes gives 256 bits of entropy.
const DEFAULT_TOKEN_BYTES: usize = 32;

/// Produces an unguessable URL-safe string used as a single-use lookup key
/// for email verification and password reset. Carries no metadata; unlike a
/// JWT it proves nothing by itself.
pub fn generate() -> String {
    generate_with_len(DEFAULT_TOKEN_BYTES)
}

pub fn generate_with_len(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    Base64UrlUnpadded::encode_string(&buf)
}
