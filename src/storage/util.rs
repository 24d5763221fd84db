pub fn now_unix_ms() -> u64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}

/// True when the error is a sqlite UNIQUE constraint violation. The stores
/// insert first and treat this as "row already exists" instead of probing
/// with a select beforehand, which would race under concurrent deliveries.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_error)
            if matches!(db_error.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}
