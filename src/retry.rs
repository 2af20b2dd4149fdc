use crate::error::{Error, Result};

/// Runs `op` until it succeeds, fails with an error `is_retryable` rejects,
/// or `max_attempts` runs have been made. The attempt number (from 1) is
/// passed to `op`; the last outcome is returned as is.
pub fn retry_when<T, E, F, P>(max_attempts: u32, is_retryable: P, mut op: F) -> std::result::Result<T, E>
where
    F: FnMut(u32) -> std::result::Result<T, E>,
    P: Fn(&E) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Err(e) if attempt < max_attempts && is_retryable(&e) => attempt += 1,
            outcome => return outcome,
        }
    }
}

/// [`retry_when`] for crate errors, retrying only retryable kinds.
pub fn retry<T, F>(max_attempts: u32, op: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    retry_when(max_attempts, |e: &Error| e.kind().is_retryable(), op)
}
