use thiserror::Error;

/// Record-level validation failures, caught before any network or database
/// call is made.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message content is empty")]
    EmptyContent,

    #[error("A group conversation requires a name")]
    GroupNameMissing,

    #[error("A direct conversation has exactly two participants")]
    DirectParticipantCount,

    #[error("A group conversation requires at least two participants")]
    GroupParticipantCount,
}
