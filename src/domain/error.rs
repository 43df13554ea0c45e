use thiserror::Error;

/// Reasons an incoming index is refused before any store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("index required")]
    MissingIndex,
    #[error("index must be an integer")]
    NotAnInteger,
    #[error("index too high")]
    TooLarge { ceiling: i32 },
    #[error("index must not be negative")]
    Negative,
}

impl DomainError {
    /// Policy rejections are well-formed input refused by a business rule.
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::TooLarge { .. } | Self::Negative)
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingIndex => "missing",
            Self::NotAnInteger => "not_an_integer",
            Self::TooLarge { .. } => "too_large",
            Self::Negative => "negative",
        }
    }
}
