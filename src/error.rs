use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Category {0} already has the maximum of {1} roles selected")]
    CategoryFull(String, usize),

    #[error("A maximum of {0} roles may be selected")]
    TooManyRoles(usize),

    #[error("No social account at position {0}")]
    UnknownSocialAccount(usize),

    #[error("Unknown country code: {0}")]
    UnknownCountry(String),

    #[error("Invalid participant ID: {0}")]
    InvalidId(String),

    #[error("Participant {0} not found")]
    ParticipantNotFound(String),

    #[error("A registration cannot be edited after it has been submitted")]
    RegistrationClosed,
}
