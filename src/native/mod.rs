mod interface;
pub use interface::{AsKernel, KernelCode, NativeEvent, NativeFlags, NativeId, NativeOp};

#[cfg(test)]
pub(crate) mod mock;

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(target_os = "linux")]
pub use epoll::EpollKernel as Kernel;

#[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd"))]
mod kqueue;

#[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd"))]
pub use kqueue::KqueueKernel as Kernel;
