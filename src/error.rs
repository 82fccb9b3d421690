use std::fmt;

/// Errors raised synchronously by the crate. Everything that goes wrong after
/// construction surfaces as a rejection [`Value`](crate::Value) instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("resolver is not callable (got {kind})")]
    InvalidResolver { kind: &'static str },
    #[error("scheduler worker has exited")]
    SchedulerClosed,
    #[error("scheduler worker panicked")]
    WorkerPanicked,
    #[error("failed to spawn scheduler worker: {0}")]
    Spawn(String),
}

/// Where a rejection came from. Only used to label log records; the reason
/// handed to consumers is never wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Reading or invoking a thenable's `then` member failed.
    Adoption,
    /// A continuation callback returned an error.
    Callback,
    /// A slot of `all`/`hash` rejected.
    Aggregate,
    /// The constructor's resolver returned an error.
    Resolver,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Adoption => "adoption",
            FailureKind::Callback => "callback",
            FailureKind::Aggregate => "aggregate",
            FailureKind::Resolver => "resolver",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_resolver_message() {
        let err = Error::InvalidResolver { kind: "string" };
        assert_eq!(err.to_string(), "resolver is not callable (got string)");
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::Adoption.to_string(), "adoption");
        assert_eq!(FailureKind::Aggregate.to_string(), "aggregate");
    }
}
