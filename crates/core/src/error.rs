/// Domain-level error taxonomy.
///
/// Component code returns these as typed results; the API layer translates
/// them into HTTP responses without inspecting internal causes. Credential
/// failures are deliberately low-information: an unknown email and a wrong
/// password both surface as [`CoreError::InvalidCredentials`].
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountInactive,

    /// Absent or expired. An OTP challenge that expired and one that was
    /// never issued answer the same way.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid code. {remaining} attempts remaining")]
    InvalidCode { remaining: u32 },

    #[error("Too many failed attempts. Please request a new code")]
    TooManyAttempts,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Operation not valid for the entity's current lifecycle state
    /// (e.g. ending an already-completed presence session).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
