//! Owned native event sets.
//!
//! An [`EventSet`] is either long-lived, parked in the registry behind an
//! epoll handle, or a one-shot probe that `poll` creates, queries once and
//! destroys. Either way the native object is destroyed exactly once: by
//! [`EventSet::destroy`] when the caller wants to see the result, otherwise
//! on drop.
use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::events::{CtlOp, EpollEvent, EventFlags, Timeout};
use crate::native::{AsKernel, KernelCode, NativeEvent, NativeId, NativeOp};
use crate::registry::Descriptor;

pub struct EventSet {
    kernel: Arc<dyn AsKernel>,
    id: NativeId,
    label: String,
    destroyed: bool,
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSet")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl EventSet {
    pub fn create(kernel: &Arc<dyn AsKernel>, label: &str, flags: i32) -> Result<Self> {
        let id = kernel
            .create(label, flags)
            .map_err(|code| translate(kernel.as_ref(), code))?;
        debug!("created event set {} ({})", id, label);
        Ok(Self {
            kernel: Arc::clone(kernel),
            id,
            label: label.to_owned(),
            destroyed: false,
        })
    }

    pub fn id(&self) -> NativeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Add, replace or drop the interest for `target`. Only sockets can be
    /// targets, and a set can never watch itself.
    pub fn control(&self, op: CtlOp, target: &Descriptor, interest: &EpollEvent) -> Result<()> {
        let native = match target {
            Descriptor::Socket(id) if *id == self.id => {
                return Err(Error::InvalidArgument("event set cannot watch itself"))
            }
            Descriptor::Socket(id) => *id,
            Descriptor::Epoll(set) if set.id == self.id => {
                return Err(Error::InvalidArgument("event set cannot watch itself"))
            }
            Descriptor::Epoll(_) => {
                return Err(Error::InvalidArgument("nested event sets are unsupported"))
            }
            Descriptor::File(_) | Descriptor::Tty(_) | Descriptor::Pipe(_) => {
                return Err(Error::InvalidArgument("only sockets can be watched"))
            }
        };
        let event = NativeEvent {
            events: interest.events.into(),
            data: interest.data,
        };
        self.kernel
            .control(self.id, NativeOp::from(op), native, &event)
            .map_err(|code| translate(self.kernel.as_ref(), code))?;
        trace!("set {}: {:?} socket {} {:?}", self.id, op, native, interest);
        Ok(())
    }

    /// Wait for readiness and fill `out` from the front. An empty `out` is
    /// rejected before anything blocks.
    pub fn wait(&self, out: &mut [EpollEvent], timeout: Timeout) -> Result<usize> {
        if out.is_empty() {
            return Err(Error::InvalidArgument("wait capacity must be positive"));
        }
        let mut native = vec![NativeEvent::default(); out.len()];
        let n = self
            .kernel
            .wait(self.id, &mut native, timeout.as_native())
            .map_err(|code| translate(self.kernel.as_ref(), code))?
            .min(out.len());
        for (dst, src) in out.iter_mut().zip(&native[..n]) {
            *dst = EpollEvent {
                events: EventFlags::from(src.events),
                data: src.data,
            };
        }
        Ok(n)
    }

    pub fn destroy(mut self) -> Result<()> {
        self.destroyed = true;
        self.kernel
            .destroy(self.id)
            .map_err(|code| translate(self.kernel.as_ref(), code))?;
        debug!("destroyed event set {} ({})", self.id, self.label);
        Ok(())
    }
}

impl Drop for EventSet {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        match self.kernel.destroy(self.id) {
            Ok(()) => debug!("destroyed event set {} ({})", self.id, self.label),
            Err(code) => warn!(
                "failed to destroy event set {}: {}",
                self.id,
                self.kernel.translate(code)
            ),
        }
    }
}

fn translate(kernel: &dyn AsKernel, code: KernelCode) -> Error {
    Error::Kernel(kernel.translate(code))
}
