//! The native socket-event primitive, consumed as a black box.
//!
//! The target kernel only knows a create/control/wait/destroy triad over
//! opaque numeric identifiers. It does not understand generic descriptors,
//! it only accepts socket-like objects as targets, and it reports failures
//! as its own codes. Everything in this crate talks to the kernel through
//! [`AsKernel`] so the emulators never depend on which backend is compiled
//! in. Backends must be level-triggered: a condition that still holds is
//! reported again by the next `wait`.
use bitflags::bitflags;
use nix::errno::Errno;

/// Kernel-assigned identifier of a native object.
pub type NativeId = i32;

/// A raw failure code as the kernel reported it, before translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelCode(pub i32);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NativeFlags: u32 {
        const IN = 0x0001;
        const OUT = 0x0004;
        const ERR = 0x0008;
        const HUP = 0x0010;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeEvent {
    pub events: NativeFlags,
    pub data: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOp {
    Add,
    Modify,
    Delete,
}

pub trait AsKernel: Send + Sync {
    /// Allocate an event set. `label` is informational only.
    fn create(&self, label: &str, flags: i32) -> Result<NativeId, KernelCode>;

    fn control(
        &self,
        set: NativeId,
        op: NativeOp,
        target: NativeId,
        event: &NativeEvent,
    ) -> Result<(), KernelCode>;

    /// Block for up to `timeout_ms` (-1 forever, 0 not at all) and fill at
    /// most `events.len()` entries.
    fn wait(
        &self,
        set: NativeId,
        events: &mut [NativeEvent],
        timeout_ms: i32,
    ) -> Result<usize, KernelCode>;

    fn destroy(&self, set: NativeId) -> Result<(), KernelCode>;

    fn translate(&self, code: KernelCode) -> Errno;
}
