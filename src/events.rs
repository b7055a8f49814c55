//! The event vocabulary callers see.
//!
//! Bit values follow Linux so that code written against `<sys/epoll.h>` and
//! `<poll.h>` keeps its constants. The native vocabulary lives in
//! [`crate::native::NativeFlags`] and is translated 1:1 at the seam.
use bitflags::bitflags;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::native::{NativeFlags, NativeOp};
use crate::registry::Handle;

bitflags! {
    /// Readiness bits for epoll interests and results.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u32 {
        const EPOLLIN = 0x001;
        const EPOLLOUT = 0x004;
        const EPOLLERR = 0x008;
        const EPOLLHUP = 0x010;
    }
}

bitflags! {
    /// Readiness bits for `poll`. Only POLLIN and POLLOUT are ever requested;
    /// POLLERR shows up in `revents` only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollFlags: i16 {
        const POLLIN = 0x001;
        const POLLOUT = 0x004;
        const POLLERR = 0x008;
        const POLLHUP = 0x010;
    }
}

impl From<EventFlags> for NativeFlags {
    fn from(flags: EventFlags) -> Self {
        let mut native = NativeFlags::empty();
        native.set(NativeFlags::IN, flags.contains(EventFlags::EPOLLIN));
        native.set(NativeFlags::OUT, flags.contains(EventFlags::EPOLLOUT));
        native.set(NativeFlags::ERR, flags.contains(EventFlags::EPOLLERR));
        native.set(NativeFlags::HUP, flags.contains(EventFlags::EPOLLHUP));
        native
    }
}

impl From<NativeFlags> for EventFlags {
    fn from(native: NativeFlags) -> Self {
        let mut flags = EventFlags::empty();
        flags.set(EventFlags::EPOLLIN, native.contains(NativeFlags::IN));
        flags.set(EventFlags::EPOLLOUT, native.contains(NativeFlags::OUT));
        flags.set(EventFlags::EPOLLERR, native.contains(NativeFlags::ERR));
        flags.set(EventFlags::EPOLLHUP, native.contains(NativeFlags::HUP));
        flags
    }
}

impl PollFlags {
    /// Readiness revealed by a native probe, in poll terms. Hang-up is not
    /// part of what a probe reports.
    pub(crate) fn from_probe(events: EventFlags) -> Self {
        let mut revents = PollFlags::empty();
        revents.set(PollFlags::POLLIN, events.contains(EventFlags::EPOLLIN));
        revents.set(PollFlags::POLLOUT, events.contains(EventFlags::EPOLLOUT));
        revents.set(PollFlags::POLLERR, events.contains(EventFlags::EPOLLERR));
        revents
    }
}

/// An interest on the way in, a readiness report on the way out.
/// `data` is handed back untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpollEvent {
    pub events: EventFlags,
    pub data: u64,
}

impl EpollEvent {
    pub fn new(events: EventFlags, data: u64) -> Self {
        Self { events, data }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// One `poll` request. A negative `fd` is ignored and gets empty `revents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollFd {
    pub fd: Handle,
    pub events: PollFlags,
    pub revents: PollFlags,
}

impl PollFd {
    pub fn new(fd: Handle, events: PollFlags) -> Self {
        Self {
            fd,
            events,
            revents: PollFlags::empty(),
        }
    }
}

pub const EPOLL_CTL_ADD: i32 = 1;
pub const EPOLL_CTL_DEL: i32 = 2;
pub const EPOLL_CTL_MOD: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtlOp {
    Add,
    Modify,
    Delete,
}

impl CtlOp {
    pub fn from_raw(op: i32) -> Result<Self> {
        match op {
            EPOLL_CTL_ADD => Ok(Self::Add),
            EPOLL_CTL_MOD => Ok(Self::Modify),
            EPOLL_CTL_DEL => Ok(Self::Delete),
            _ => Err(Error::InvalidArgument("unknown epoll_ctl op")),
        }
    }
}

impl From<CtlOp> for NativeOp {
    fn from(op: CtlOp) -> Self {
        match op {
            CtlOp::Add => NativeOp::Add,
            CtlOp::Modify => NativeOp::Modify,
            CtlOp::Delete => NativeOp::Delete,
        }
    }
}

/// A wait bound in milliseconds. `-1` blocks forever and cannot be
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Infinite,
    Millis(u32),
}

impl Timeout {
    pub const ZERO: Timeout = Timeout::Millis(0);

    pub fn from_millis(ms: i32) -> Result<Self> {
        match ms {
            -1 => Ok(Self::Infinite),
            ms if ms >= 0 => Ok(Self::Millis(ms as u32)),
            _ => Err(Error::InvalidArgument("timeout below -1")),
        }
    }

    /// The value handed to the native wait call.
    pub fn as_native(&self) -> i32 {
        match self {
            Self::Infinite => -1,
            Self::Millis(ms) => (*ms).min(i32::MAX as u32) as i32,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::Millis(ms) => Some(Duration::from_millis(u64::from(*ms))),
        }
    }
}
