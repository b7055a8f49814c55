//! `epoll_create` / `epoll_ctl` / `epoll_wait` over a long-lived event set
//! parked in the registry.
//!
//! An epoll handle moves from created, through any number of `ctl` calls,
//! to closed. Once closed it resolves to `BadHandle`, and its native set is
//! destroyed as soon as the last in-flight `ctl` or `wait` lets go of it.
//! `ctl` may run while another thread is blocked in `wait` on the same
//! handle; both only hold registry references and the native primitive
//! serialises them.
use log::debug;

use crate::error::{Error, Result};
use crate::event_set::EventSet;
use crate::events::{CtlOp, EpollEvent, Timeout};
use crate::registry::{Descriptor, DescriptorKind, Handle};
use crate::shim::Shim;

impl Shim {
    pub fn epoll_create(&self, size: i32) -> Result<Handle> {
        if size < 0 {
            return Err(Error::InvalidArgument("negative epoll size"));
        }
        self.epoll_create1(0)
    }

    pub fn epoll_create1(&self, flags: i32) -> Result<Handle> {
        let set = EventSet::create(&self.kernel, &self.epoll_label, flags)?;
        // On a full table the set is dropped, and with it the native object.
        let handle = self.registry.allocate(Descriptor::Epoll(set))?;
        debug!("epoll handle {} created", handle);
        Ok(handle)
    }

    /// Register, change or remove interest in socket `fd` on `epfd`. `event`
    /// may be omitted for [`CtlOp::Delete`] only.
    pub fn epoll_ctl(
        &self,
        epfd: Handle,
        op: CtlOp,
        fd: Handle,
        event: Option<&EpollEvent>,
    ) -> Result<()> {
        let epoll = self.registry.acquire(epfd)?;
        let target = self.registry.acquire(fd)?;
        if epfd == fd {
            return Err(Error::InvalidArgument("epoll cannot watch itself"));
        }
        let Descriptor::Epoll(set) = &*epoll else {
            return Err(Error::InvalidArgument("not an epoll handle"));
        };
        if target.kind() != DescriptorKind::Socket {
            return Err(Error::InvalidArgument("only sockets can be watched"));
        }
        let interest = match (op, event) {
            (_, Some(event)) => *event,
            (CtlOp::Delete, None) => EpollEvent::empty(),
            (_, None) => return Err(Error::InvalidArgument("missing event")),
        };
        set.control(op, &target, &interest)
    }

    /// Fill `events` with up to `events.len()` ready interests.
    pub fn epoll_wait(&self, epfd: Handle, events: &mut [EpollEvent], timeout: i32) -> Result<usize> {
        let epoll = self.registry.acquire(epfd)?;
        let Descriptor::Epoll(set) = &*epoll else {
            return Err(Error::InvalidArgument("not an epoll handle"));
        };
        if events.is_empty() {
            return Err(Error::InvalidArgument("maxevents must be positive"));
        }
        let timeout = Timeout::from_millis(timeout)?;
        set.wait(events, timeout)
    }
}
