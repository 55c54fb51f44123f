/// One-way hash of a user secret.
pub fn hash_password(plain: &str, cost: u32) -> anyhow::Result<String> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// A hash that bcrypt cannot parse counts as a mismatch.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::error!("bcrypt verify error: {}", e);
            false
        }
    }
}
