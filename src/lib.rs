//! POSIX `poll` and `epoll` for a kernel that only offers a socket-event
//! triad (create / control / wait over numeric identifiers).
//!
//! Callers see small integer descriptors. The [`registry`] maps them to the
//! native objects behind them, [`event_set`] wraps the native triad, and the
//! [`poll`] and [`epoll`] modules build the POSIX surfaces on top. [`sys`]
//! exposes all of it as libc-shaped functions over one process-wide
//! namespace.
pub mod conf;
pub mod epoll;
pub mod error;
pub mod event_set;
pub mod events;
pub mod logging;
pub mod native;
pub mod poll;
pub mod registry;
pub mod shim;

#[cfg(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd"
))]
pub mod sys;

pub use error::{Error, Result};
pub use events::{CtlOp, EpollEvent, EventFlags, PollFd, PollFlags, Timeout};
pub use registry::{Descriptor, DescriptorKind, Handle, Registry};
pub use shim::Shim;
