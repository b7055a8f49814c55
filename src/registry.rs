//! Map small integer handles to the native objects behind them.
//!
//! The table is a fixed arena of slots. Callers never hold a slot directly:
//! [`Registry::acquire`] hands out a [`DescriptorGuard`] and the reference it
//! took is given back when the guard goes out of scope, on every exit path.
//! Closing a handle only marks its slot; the descriptor (and for epoll, its
//! native set) is torn down by whoever drops the last reference, and only
//! after that does the slot become allocatable again. A lookup racing a
//! close therefore either gets a fully live descriptor or `BadHandle`.
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::event_set::EventSet;
use crate::native::NativeId;

/// A caller-visible descriptor number.
pub type Handle = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Socket,
    Epoll,
    File,
    Tty,
    Pipe,
}

/// What a handle refers to. Only sockets and epoll sets are understood by
/// the native event primitive; the rest are carried for the subsystems that
/// own them.
#[derive(Debug)]
pub enum Descriptor {
    Socket(NativeId),
    Epoll(EventSet),
    File(NativeId),
    Tty(NativeId),
    Pipe(NativeId),
}

impl Descriptor {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Socket(_) => DescriptorKind::Socket,
            Self::Epoll(_) => DescriptorKind::Epoll,
            Self::File(_) => DescriptorKind::File,
            Self::Tty(_) => DescriptorKind::Tty,
            Self::Pipe(_) => DescriptorKind::Pipe,
        }
    }

    pub fn native(&self) -> NativeId {
        match self {
            Self::Socket(id) | Self::File(id) | Self::Tty(id) | Self::Pipe(id) => *id,
            Self::Epoll(set) => set.id(),
        }
    }
}

struct Occupant {
    descriptor: Arc<Descriptor>,
    refs: usize,
    closing: bool,
}

type Slot = Mutex<Option<Occupant>>;

pub struct Registry {
    slots: Box<[Slot]>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("capacity", &self.slots.len())
            .finish()
    }
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Mutex::new(None)).collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, handle: Handle) -> Option<MutexGuard<'_, Option<Occupant>>> {
        let idx = usize::try_from(handle).ok()?;
        let slot = self.slots.get(idx)?;
        Some(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Place `descriptor` in the lowest free slot. When the table is full the
    /// descriptor is dropped, which destroys any native set it owns.
    pub fn allocate(&self, descriptor: Descriptor) -> Result<Handle> {
        for (idx, slot) in self.slots.iter().enumerate() {
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                let kind = descriptor.kind();
                *slot = Some(Occupant {
                    descriptor: Arc::new(descriptor),
                    refs: 0,
                    closing: false,
                });
                debug!("allocated handle {} ({:?})", idx, kind);
                return Ok(idx as Handle);
            }
        }
        debug!("descriptor table full, dropping {:?}", descriptor.kind());
        Err(Error::ResourceExhausted(self.slots.len()))
    }

    pub fn acquire(&self, handle: Handle) -> Result<DescriptorGuard<'_>> {
        let mut slot = self.slot(handle).ok_or(Error::BadHandle(handle))?;
        match slot.as_mut() {
            Some(occupant) if !occupant.closing => {
                occupant.refs += 1;
                trace!("acquire {} -> refs {}", handle, occupant.refs);
                Ok(DescriptorGuard {
                    registry: self,
                    handle,
                    descriptor: Some(Arc::clone(&occupant.descriptor)),
                })
            }
            _ => Err(Error::BadHandle(handle)),
        }
    }

    /// Give back one reference. The caller's clone is dropped under the slot
    /// lock so that the last release always holds the final `Arc`.
    fn release(&self, handle: Handle, descriptor: Arc<Descriptor>) {
        let Some(mut slot) = self.slot(handle) else {
            return;
        };
        drop(descriptor);
        let reclaim = match slot.as_mut() {
            Some(occupant) => {
                occupant.refs = occupant.refs.saturating_sub(1);
                trace!("release {} -> refs {}", handle, occupant.refs);
                occupant.refs == 0 && occupant.closing
            }
            None => false,
        };
        if reclaim {
            reclaim_slot(handle, &mut slot);
        }
    }

    /// Stop handing out new references to `handle`. The slot is reclaimed
    /// immediately if nobody holds it, otherwise by the last release.
    pub fn mark_closing(&self, handle: Handle) -> Result<()> {
        let mut slot = self.slot(handle).ok_or(Error::BadHandle(handle))?;
        let reclaim = match slot.as_mut() {
            Some(occupant) if !occupant.closing => {
                occupant.closing = true;
                debug!("closing handle {} ({} outstanding)", handle, occupant.refs);
                occupant.refs == 0
            }
            _ => return Err(Error::BadHandle(handle)),
        };
        if reclaim {
            reclaim_slot(handle, &mut slot);
        }
        Ok(())
    }

    /// Outstanding acquisitions on a live or closing handle.
    pub fn refcount(&self, handle: Handle) -> Option<usize> {
        self.slot(handle)?.as_ref().map(|occupant| occupant.refs)
    }

    pub fn kind(&self, handle: Handle) -> Option<DescriptorKind> {
        let slot = self.slot(handle)?;
        match slot.as_ref() {
            Some(occupant) if !occupant.closing => Some(occupant.descriptor.kind()),
            _ => None,
        }
    }

    pub fn is_open(&self, handle: Handle) -> bool {
        self.kind(handle).is_some()
    }
}

/// Empty the slot and drop the descriptor while the slot is still locked,
/// so no allocation can reuse the handle before native teardown finishes.
fn reclaim_slot(handle: Handle, slot: &mut MutexGuard<'_, Option<Occupant>>) {
    if let Some(occupant) = slot.take() {
        let kind = occupant.descriptor.kind();
        drop(occupant);
        debug!("reclaimed handle {} ({:?})", handle, kind);
    }
}

/// A counted reference to a live descriptor.
pub struct DescriptorGuard<'a> {
    registry: &'a Registry,
    handle: Handle,
    /// Only `None` once the guard is being dropped.
    descriptor: Option<Arc<Descriptor>>,
}

impl DescriptorGuard<'_> {
    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl Deref for DescriptorGuard<'_> {
    type Target = Descriptor;

    fn deref(&self) -> &Descriptor {
        match &self.descriptor {
            Some(descriptor) => descriptor,
            None => unreachable!("descriptor guard used after release"),
        }
    }
}

impl fmt::Debug for DescriptorGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorGuard")
            .field("handle", &self.handle)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl Drop for DescriptorGuard<'_> {
    fn drop(&mut self) {
        if let Some(descriptor) = self.descriptor.take() {
            self.registry.release(self.handle, descriptor);
        }
    }
}
