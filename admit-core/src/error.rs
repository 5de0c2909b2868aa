/// Errors produced by the `admit-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The presented admission token does not match the current secret.
    #[error("wrong pow")]
    WrongToken,

    /// A secret policy was constructed with unusable parameters.
    #[error("invalid secret policy: {reason}")]
    InvalidPolicy { reason: String },
}
