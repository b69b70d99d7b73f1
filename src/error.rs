//! Crate-wide error taxonomy.
//!
//! Three families, matching how failures should reach the user:
//! - Storage: transient I/O against SQLite — surfaced as a rejected
//!   operation, always safe to retry because every merge is idempotent or
//!   additive.
//! - Extraction: the scan collaborator failed — fatal to the current scan
//!   attempt only; no directory state exists yet.
//! - Auth: typed split between bad credentials and a pending approval.
//!
//! Input-quality problems (empty name, unmatched inviter) are deliberately
//! NOT errors: they surface as per-row issues in the reconcile report.

use thiserror::Error;

use crate::db::DbError;
use crate::extract::ExtractError;
use crate::services::accounts::AuthError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl AppError {
    /// True when retrying the same operation in full is safe and sensible.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Db(_) => true,
            AppError::Extraction(e) => e.is_retryable(),
            AppError::Auth(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_by_family() {
        assert!(AppError::from(DbError::LockPoisoned).is_retryable());
        assert!(!AppError::from(ExtractError::MissingApiKey).is_retryable());
        assert!(!AppError::from(AuthError::PendingApproval).is_retryable());
    }
}
