//! `poll` on top of a primitive that can only wait on event sets.
//!
//! There is no native call that checks many descriptors with a different
//! interest each, so every scan probes each requested interest bit with its
//! own one-shot event set: create, register, wait with zero timeout, destroy.
//! That costs O(requests x interest bits) native round trips per scan, and
//! an unready scan is followed by a coarse sleep before the next one. This is
//! the price of emulating poll here, not something to optimise away by
//! reusing sets, which would change what a probe observes.
//!
//! Every handle is resolved before the first probe, so a bad handle fails
//! the call before anything can block and no partial `revents` survive.
//! The resolved references are held for the whole call and released on
//! every way out.
use std::thread;
use std::time::Instant;

use log::trace;

use crate::error::{Error, Result};
use crate::event_set::EventSet;
use crate::events::{CtlOp, EpollEvent, EventFlags, PollFd, PollFlags, Timeout};
use crate::native::NativeId;
use crate::registry::{Descriptor, DescriptorGuard};
use crate::shim::Shim;

impl Shim {
    /// Wait until at least one entry of `fds` is ready or `timeout`
    /// milliseconds pass (-1: forever), and return how many entries have
    /// non-empty `revents`.
    pub fn poll(&self, fds: &mut [PollFd], timeout: i32) -> Result<usize> {
        // Nothing to watch, nothing to wait for, whatever the timeout.
        if fds.iter().all(|pfd| pfd.fd < 0) {
            for pfd in fds.iter_mut() {
                pfd.revents = PollFlags::empty();
            }
            return Ok(0);
        }
        let timeout = Timeout::from_millis(timeout)?;
        if fds.len() > self.registry.capacity() {
            return Err(Error::InvalidArgument("more poll entries than descriptors"));
        }
        let result = self.poll_resolved(fds, timeout);
        if result.is_err() {
            for pfd in fds.iter_mut() {
                pfd.revents = PollFlags::empty();
            }
        }
        result
    }

    fn poll_resolved(&self, fds: &mut [PollFd], timeout: Timeout) -> Result<usize> {
        for pfd in fds.iter_mut() {
            pfd.revents = PollFlags::empty();
        }

        let held = fds
            .iter()
            .map(|pfd| {
                if pfd.fd < 0 {
                    Ok(None)
                } else {
                    self.registry.acquire(pfd.fd).map(Some)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let limit = timeout.as_duration();
        let start = Instant::now();
        loop {
            let selected = self.scan(fds, &held)?;
            if selected > 0 {
                return Ok(selected);
            }
            let pause = match limit {
                None => self.poll_interval,
                Some(limit) => {
                    let elapsed = start.elapsed();
                    if elapsed >= limit {
                        return Ok(0);
                    }
                    self.poll_interval.min(limit - elapsed)
                }
            };
            trace!("poll: nothing ready, sleeping {:?}", pause);
            thread::sleep(pause);
        }
    }

    fn scan(&self, fds: &mut [PollFd], held: &[Option<DescriptorGuard<'_>>]) -> Result<usize> {
        let mut selected = 0;
        for (pfd, guard) in fds.iter_mut().zip(held) {
            pfd.revents = PollFlags::empty();
            let Some(descriptor) = guard else {
                continue;
            };
            if pfd.events.contains(PollFlags::POLLIN) {
                pfd.revents |= self.readiness(descriptor, EventFlags::EPOLLIN)?;
            }
            if pfd.events.contains(PollFlags::POLLOUT) {
                pfd.revents |= self.readiness(descriptor, EventFlags::EPOLLOUT)?;
            }
            if !pfd.revents.is_empty() {
                selected += 1;
            }
        }
        Ok(selected)
    }

    fn readiness(&self, descriptor: &Descriptor, interest: EventFlags) -> Result<PollFlags> {
        match descriptor {
            Descriptor::Socket(native) => self.probe(*native, interest),
            // Nothing can probe these, so they never report ready. Files and
            // terminals thus look permanently unready through poll.
            Descriptor::File(_) | Descriptor::Tty(_) | Descriptor::Pipe(_) => {
                Ok(PollFlags::empty())
            }
            Descriptor::Epoll(_) => Ok(PollFlags::empty()),
        }
    }

    /// One-shot readiness check of a single interest bit on a socket.
    fn probe(&self, socket: NativeId, interest: EventFlags) -> Result<PollFlags> {
        let set = EventSet::create(&self.kernel, &self.probe_label, 0)?;
        let mut out = [EpollEvent::empty()];
        let outcome = set
            .control(
                CtlOp::Add,
                &Descriptor::Socket(socket),
                &EpollEvent::new(interest, 0),
            )
            .and_then(|()| set.wait(&mut out, Timeout::ZERO));
        let destroyed = set.destroy();
        let n = outcome?;
        destroyed?;

        if n == 0 {
            return Ok(PollFlags::empty());
        }
        Ok(PollFlags::from_probe(out[0].events))
    }
}
