use log::trace;
use nix::{errno::Errno, libc};

use super::{AsKernel, KernelCode, NativeEvent, NativeFlags, NativeId, NativeOp};

/// The host's own epoll standing in for the socket-event triad. Native
/// identifiers are raw file descriptors and codes are plain errno values.
#[derive(Debug, Default)]
pub struct EpollKernel;

impl EpollKernel {
    pub fn new() -> Self {
        Self
    }
}

fn to_epoll_bits(flags: NativeFlags) -> u32 {
    let mut bits = 0;
    if flags.contains(NativeFlags::IN) {
        bits |= libc::EPOLLIN as u32;
    }
    if flags.contains(NativeFlags::OUT) {
        bits |= libc::EPOLLOUT as u32;
    }
    if flags.contains(NativeFlags::ERR) {
        bits |= libc::EPOLLERR as u32;
    }
    if flags.contains(NativeFlags::HUP) {
        bits |= libc::EPOLLHUP as u32;
    }
    bits
}

fn from_epoll_bits(bits: u32) -> NativeFlags {
    let mut flags = NativeFlags::empty();
    flags.set(NativeFlags::IN, bits & libc::EPOLLIN as u32 != 0);
    flags.set(NativeFlags::OUT, bits & libc::EPOLLOUT as u32 != 0);
    flags.set(NativeFlags::ERR, bits & libc::EPOLLERR as u32 != 0);
    flags.set(NativeFlags::HUP, bits & libc::EPOLLHUP as u32 != 0);
    flags
}

fn code(e: Errno) -> KernelCode {
    KernelCode(e as i32)
}

impl AsKernel for EpollKernel {
    fn create(&self, label: &str, flags: i32) -> Result<NativeId, KernelCode> {
        let id = Errno::result(unsafe { libc::epoll_create1(flags) }).map_err(code)?;
        trace!("epoll_create1({:#x}) -> {} [{}]", flags, id, label);
        Ok(id)
    }

    fn control(
        &self,
        set: NativeId,
        op: NativeOp,
        target: NativeId,
        event: &NativeEvent,
    ) -> Result<(), KernelCode> {
        let op = match op {
            NativeOp::Add => libc::EPOLL_CTL_ADD,
            NativeOp::Modify => libc::EPOLL_CTL_MOD,
            NativeOp::Delete => libc::EPOLL_CTL_DEL,
        };
        let mut raw = libc::epoll_event {
            events: to_epoll_bits(event.events),
            u64: event.data,
        };
        Errno::result(unsafe { libc::epoll_ctl(set, op, target, &mut raw) }).map_err(code)?;
        trace!(
            "epoll_ctl({}, {}, {}, {:?}) ok",
            set,
            op,
            target,
            event.events
        );
        Ok(())
    }

    fn wait(
        &self,
        set: NativeId,
        events: &mut [NativeEvent],
        timeout_ms: i32,
    ) -> Result<usize, KernelCode> {
        let mut buffer = vec![libc::epoll_event { events: 0, u64: 0 }; events.len()];
        let max = buffer.len().min(libc::c_int::MAX as usize) as libc::c_int;
        let n = Errno::result(unsafe {
            libc::epoll_wait(set, buffer.as_mut_ptr(), max, timeout_ms)
        })
        .map_err(code)? as usize;

        for (out, raw) in events.iter_mut().zip(&buffer[..n]) {
            let raw = *raw;
            *out = NativeEvent {
                events: from_epoll_bits(raw.events),
                data: raw.u64,
            };
        }
        trace!("epoll_wait({}, {}, {}) -> {}", set, max, timeout_ms, n);
        Ok(n)
    }

    fn destroy(&self, set: NativeId) -> Result<(), KernelCode> {
        Errno::result(unsafe { libc::close(set) }).map_err(code)?;
        trace!("closed epoll fd {}", set);
        Ok(())
    }

    fn translate(&self, code: KernelCode) -> Errno {
        Errno::from_raw(code.0)
    }
}
