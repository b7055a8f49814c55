//! Error kinds surfaced by the registry and the emulators.
//!
//! Every failure ends up as one of four kinds. Native failures are carried as
//! the already-translated [`Errno`], so nothing above the native seam ever
//! sees a vendor code.
use nix::errno::Errno;
use thiserror::Error;

use crate::registry::Handle;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("bad descriptor handle {0}")]
    BadHandle(Handle),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("descriptor table exhausted ({0} slots)")]
    ResourceExhausted(usize),
    #[error("native call failed: {0}")]
    Kernel(Errno),
}

impl Error {
    /// The standard error code a C caller would observe.
    pub fn errno(&self) -> Errno {
        match self {
            Self::BadHandle(_) => Errno::EBADF,
            Self::InvalidArgument(_) => Errno::EINVAL,
            Self::ResourceExhausted(_) => Errno::EMFILE,
            Self::Kernel(e) => *e,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
