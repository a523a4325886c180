use crate::error::{ApiError, ApiResult};

// ---

/// Hash `password` with bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> ApiResult<String> {
    // ---
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Check `password` against a stored hash. Accounts without a password
/// never match.
pub async fn verify_password(password: String, hash: Option<String>) -> ApiResult<bool> {
    // ---
    let Some(hash) = hash else {
        return Ok(false);
    };
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))
}
