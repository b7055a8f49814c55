//! The process-wide descriptor namespace and its C-shaped entry points.
//!
//! These follow the libc convention: a negative return means failure and
//! the reason is left in a per-thread errno, read back with [`errno`]. The
//! shim behind them is built on first use from [`Config::from_env`].
use std::cell::Cell;

use nix::errno::Errno;
use nix::libc::c_int;
use once_cell::sync::Lazy;

use crate::conf::Config;
use crate::error::{Error, Result};
use crate::events::{CtlOp, EpollEvent, PollFd};
use crate::native::NativeId;
use crate::shim::Shim;

static SHIM: Lazy<Shim> = Lazy::new(|| Shim::new(&Config::from_env()));

thread_local! {
    static ERRNO: Cell<i32> = const { Cell::new(0) };
}

pub fn shim() -> &'static Shim {
    &SHIM
}

/// The error left behind by the last failed call on this thread.
pub fn errno() -> Errno {
    Errno::from_raw(ERRNO.with(Cell::get))
}

fn ret(result: Result<c_int>) -> c_int {
    result.unwrap_or_else(fail)
}

fn fail(e: Error) -> c_int {
    ERRNO.with(|errno| errno.set(e.errno() as i32));
    -1
}

pub fn epoll_create(size: c_int) -> c_int {
    ret(shim().epoll_create(size))
}

pub fn epoll_create1(flags: c_int) -> c_int {
    ret(shim().epoll_create1(flags))
}

pub fn epoll_ctl(epfd: c_int, op: c_int, fd: c_int, event: Option<&EpollEvent>) -> c_int {
    ret(CtlOp::from_raw(op)
        .and_then(|op| shim().epoll_ctl(epfd, op, fd, event))
        .map(|()| 0))
}

pub fn epoll_wait(epfd: c_int, events: &mut [EpollEvent], maxevents: c_int, timeout: c_int) -> c_int {
    // A non-positive count still resolves the handle first, so a bad handle
    // wins over the bad count.
    let len = usize::try_from(maxevents).unwrap_or(0);
    let Some(events) = events.get_mut(..len) else {
        return fail(Error::InvalidArgument("maxevents exceeds the buffer"));
    };
    ret(shim()
        .epoll_wait(epfd, events, timeout)
        .map(|n| n as c_int))
}

pub fn poll(fds: &mut [PollFd], timeout: c_int) -> c_int {
    ret(shim().poll(fds, timeout).map(|n| n as c_int))
}

pub fn close(fd: c_int) -> c_int {
    ret(shim().close(fd).map(|()| 0))
}

/// Give a native socket a descriptor number.
pub fn install_socket(native: NativeId) -> c_int {
    ret(shim().install_socket(native))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::events::{EventFlags, PollFlags, EPOLL_CTL_ADD};

    #[test]
    fn failures_set_errno() {
        assert_eq!(epoll_create(-1), -1);
        assert_eq!(errno(), Errno::EINVAL);

        assert_eq!(close(-4), -1);
        assert_eq!(errno(), Errno::EBADF);

        let ep = epoll_create(1);
        assert!(ep >= 3);
        let mut events = [EpollEvent::empty(); 2];
        assert_eq!(epoll_wait(ep, &mut events, 0, 0), -1);
        assert_eq!(errno(), Errno::EINVAL);
        assert_eq!(epoll_wait(ep, &mut events, -3, 0), -1);
        assert_eq!(errno(), Errno::EINVAL);
        assert_eq!(epoll_wait(200, &mut events, 0, 0), -1);
        assert_eq!(errno(), Errno::EBADF);
        assert_eq!(epoll_wait(ep, &mut events, 3, 0), -1);
        assert_eq!(errno(), Errno::EINVAL);
        assert_eq!(epoll_wait(ep, &mut events, 2, 0), 0);

        let ev = EpollEvent::new(EventFlags::EPOLLIN, 1);
        assert_eq!(epoll_ctl(ep, 9, ep, Some(&ev)), -1);
        assert_eq!(errno(), Errno::EINVAL);
        assert_eq!(epoll_ctl(ep, EPOLL_CTL_ADD, ep, Some(&ev)), -1);
        assert_eq!(errno(), Errno::EINVAL);

        let mut fds = [PollFd::new(ep, PollFlags::POLLIN), PollFd::new(-1, PollFlags::POLLIN)];
        assert_eq!(poll(&mut fds, 0), 0);

        assert_eq!(close(ep), 0);
        assert_eq!(close(ep), -1);
        assert_eq!(errno(), Errno::EBADF);
    }
}
