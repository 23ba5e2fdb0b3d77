use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatementError {
    #[error("syntax error near '{input}'")]
    SyntaxError { input: String },

    #[error("id must be non-negative")]
    NegativeId,

    #[error("invalid id: '{input}'")]
    InvalidId { input: String },

    #[error("string is too long for column '{field}' (max: {max} bytes)")]
    StringTooLong { field: &'static str, max: usize },

    #[error("unrecognized statement: '{input}'")]
    Unrecognized { input: String },
}
