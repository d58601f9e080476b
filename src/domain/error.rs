#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("isbn must not be empty")]
    EmptyIsbn,

    #[error("book already exists: {0}")]
    DuplicateIsbn(String),

    #[error("book not found: {0}")]
    BookNotFound(String),
}
