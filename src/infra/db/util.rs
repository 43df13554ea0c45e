use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::Io(io) => RepoError::Unavailable(io.to_string()),
        sqlx::Error::PoolClosed => RepoError::Unavailable("connection pool closed".to_string()),
        other => RepoError::from_persistence(other),
    }
}
