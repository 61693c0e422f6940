use crate::AnyResult;
use anyhow::Context;
use std::fmt::Display;

/// Attaches a human readable context message while converting into an [`anyhow::Error`].
///
/// `None` turns into an error carrying just the message.
pub trait AnyhowResultExt<T>: Sized {
    fn otherwise(self, message: impl Display + Send + Sync + 'static) -> AnyResult<T>;

    /// Like [`Self::otherwise`], but the message is only built on failure.
    fn otherwise_with<M, F>(self, f: F) -> AnyResult<T>
    where
        M: Display + Send + Sync + 'static,
        F: FnOnce() -> M;
}

impl<T, E> AnyhowResultExt<T> for Result<T, E>
where
    Result<T, E>: Context<T, E>,
{
    fn otherwise(self, message: impl Display + Send + Sync + 'static) -> AnyResult<T> {
        self.context(message)
    }

    fn otherwise_with<M, F>(self, f: F) -> AnyResult<T>
    where
        M: Display + Send + Sync + 'static,
        F: FnOnce() -> M,
    {
        self.with_context(f)
    }
}

impl<T> AnyhowResultExt<T> for Option<T> {
    fn otherwise(self, message: impl Display + Send + Sync + 'static) -> AnyResult<T> {
        self.context(message)
    }

    fn otherwise_with<M, F>(self, f: F) -> AnyResult<T>
    where
        M: Display + Send + Sync + 'static,
        F: FnOnce() -> M,
    {
        self.with_context(f)
    }
}
