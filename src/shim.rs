//! The descriptor namespace and the kernel behind it, bundled.
//!
//! A `Shim` owns the registry, the native kernel and the tunables the
//! emulators read. The poll and epoll surfaces are implemented as methods on
//! it in their own modules. The process normally has exactly one, see
//! [`crate::sys`], but tests build as many as they like.
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::conf::Config;
use crate::error::Result;
use crate::native::{AsKernel, NativeId};
use crate::registry::{Descriptor, Handle, Registry};

const STDIO_HANDLES: NativeId = 3;

pub struct Shim {
    pub(crate) kernel: Arc<dyn AsKernel>,
    pub(crate) registry: Registry,
    pub(crate) poll_interval: Duration,
    pub(crate) probe_label: String,
    pub(crate) epoll_label: String,
}

impl Shim {
    /// A shim over the host's event primitive.
    #[cfg(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd"
    ))]
    pub fn new(config: &Config) -> Self {
        Self::with_kernel(Arc::new(crate::native::Kernel::new()), config)
    }

    pub fn with_kernel(kernel: Arc<dyn AsKernel>, config: &Config) -> Self {
        let registry = Registry::new(config.registry.max_descriptors);
        if config.registry.reserve_stdio {
            for fd in 0..STDIO_HANDLES {
                if let Err(e) = registry.allocate(Descriptor::Tty(fd)) {
                    warn!("could not reserve stdio handle {}: {}", fd, e);
                    break;
                }
            }
        }
        Self {
            kernel,
            registry,
            poll_interval: Duration::from_millis(config.poll.interval_ms),
            probe_label: config.poll.probe_label.clone(),
            epoll_label: config.epoll.label.clone(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn kernel(&self) -> &Arc<dyn AsKernel> {
        &self.kernel
    }

    /// Hand a descriptor to the namespace. Used by the subsystems that
    /// create sockets, files and pipes.
    pub fn install(&self, descriptor: Descriptor) -> Result<Handle> {
        self.registry.allocate(descriptor)
    }

    pub fn install_socket(&self, native: NativeId) -> Result<Handle> {
        self.install(Descriptor::Socket(native))
    }

    /// Close `handle`. Holders that already resolved it keep a valid
    /// descriptor until they let go; an epoll set is destroyed then.
    pub fn close(&self, handle: Handle) -> Result<()> {
        self.registry.mark_closing(handle)
    }
}
