use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiloError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("operation terminated by stop signal")]
    Terminated,

    #[error("container format error: {0}")]
    Format(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("digest requested before the hashing stage was closed")]
    DigestPending,

    #[error("meta record codec error: {0}")]
    Meta(String),

    #[error("cipher error: {0}")]
    Cipher(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, SiloError>;

/// Payload the responsive stages tunnel through `std::io::Error` so the
/// terminated condition survives the `Read`/`Write` signatures and can be
/// told apart from plain I/O failures on the far side.
#[derive(Error, Debug)]
#[error("stop signal raised")]
pub struct TerminatedMarker;

impl SiloError {
    /// The `io::Error` a responsive stage raises when its signal is set.
    pub(crate) fn terminated_io() -> std::io::Error {
        std::io::Error::other(TerminatedMarker)
    }
}

impl From<std::io::Error> for SiloError {
    fn from(e: std::io::Error) -> Self {
        let tunneled = e
            .get_ref()
            .is_some_and(|inner| inner.is::<TerminatedMarker>());
        if tunneled {
            SiloError::Terminated
        } else {
            SiloError::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_survives_io_tunnel() {
        let e: SiloError = SiloError::terminated_io().into();
        assert!(matches!(e, SiloError::Terminated));
    }

    #[test]
    fn plain_io_error_stays_io() {
        let e: SiloError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(e, SiloError::Io(_)));
    }
}
