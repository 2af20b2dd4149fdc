use rand::Rng;

const TOKEN_BYTES: usize = 16;
const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// Source of opaque access-token values.
///
/// Values only need to be unpredictable; uniqueness is enforced by the store,
/// and a collision is reported so the whole issuance can be retried.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Generates 128-bit random tokens rendered as lowercase hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill(&mut bytes);
        hex::encode(bytes)
    }
}

/// Cheap syntactic check run before a token ever reaches the store.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn parse_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
