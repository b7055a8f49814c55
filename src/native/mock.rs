//! An in-memory socket-event kernel for tests.
//!
//! Sockets are plain numbers whose readiness the test sets by hand. Failures
//! come back as vendor-style codes (`0x8041_0100 | errno`) so translation is
//! exercised the way it is on the real target.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use nix::errno::Errno;

use super::{AsKernel, KernelCode, NativeEvent, NativeFlags, NativeId, NativeOp};

const NET_ERROR_BASE: u32 = 0x8041_0100;

fn vendor(e: Errno) -> KernelCode {
    KernelCode((NET_ERROR_BASE | e as u32) as i32)
}

#[derive(Default)]
struct State {
    next_id: NativeId,
    sets: HashMap<NativeId, BTreeMap<NativeId, NativeEvent>>,
    destroyed: HashSet<NativeId>,
    ready: HashMap<NativeId, NativeFlags>,
    created: usize,
    probes: usize,
    fail_create: Option<Errno>,
    fail_control: Option<Errno>,
}

#[derive(Default)]
pub struct MockKernel {
    state: Mutex<State>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 0x4000,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current readiness of a simulated socket.
    pub fn set_ready(&self, socket: NativeId, flags: NativeFlags) {
        self.state().ready.insert(socket, flags);
    }

    pub fn fail_next_create(&self, e: Errno) {
        self.state().fail_create = Some(e);
    }

    pub fn fail_next_control(&self, e: Errno) {
        self.state().fail_control = Some(e);
    }

    /// Sets created and not yet destroyed.
    pub fn live_sets(&self) -> usize {
        self.state().sets.len()
    }

    pub fn created(&self) -> usize {
        self.state().created
    }

    pub fn is_destroyed(&self, set: NativeId) -> bool {
        self.state().destroyed.contains(&set)
    }

    /// Number of sets created under the poll probe label.
    pub fn probes(&self) -> usize {
        self.state().probes
    }

    pub fn interest(&self, set: NativeId, target: NativeId) -> Option<NativeEvent> {
        self.state().sets.get(&set)?.get(&target).copied()
    }
}

impl AsKernel for MockKernel {
    fn create(&self, label: &str, _flags: i32) -> Result<NativeId, KernelCode> {
        let mut state = self.state();
        if let Some(e) = state.fail_create.take() {
            return Err(vendor(e));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.created += 1;
        if label == "poll" {
            state.probes += 1;
        }
        state.sets.insert(id, BTreeMap::new());
        Ok(id)
    }

    fn control(
        &self,
        set: NativeId,
        op: NativeOp,
        target: NativeId,
        event: &NativeEvent,
    ) -> Result<(), KernelCode> {
        let mut state = self.state();
        if let Some(e) = state.fail_control.take() {
            return Err(vendor(e));
        }
        if state.sets.contains_key(&target) {
            return Err(vendor(Errno::EINVAL));
        }
        let interests = state.sets.get_mut(&set).ok_or(vendor(Errno::EBADF))?;
        match op {
            NativeOp::Add => {
                if interests.contains_key(&target) {
                    return Err(vendor(Errno::EEXIST));
                }
                interests.insert(target, *event);
            }
            NativeOp::Modify => {
                let slot = interests.get_mut(&target).ok_or(vendor(Errno::ENOENT))?;
                *slot = *event;
            }
            NativeOp::Delete => {
                interests.remove(&target).ok_or(vendor(Errno::ENOENT))?;
            }
        }
        Ok(())
    }

    fn wait(
        &self,
        set: NativeId,
        events: &mut [NativeEvent],
        _timeout_ms: i32,
    ) -> Result<usize, KernelCode> {
        let state = self.state();
        let interests = state.sets.get(&set).ok_or(vendor(Errno::EBADF))?;
        let mut n = 0;
        for (target, interest) in interests {
            if n == events.len() {
                break;
            }
            let ready = state.ready.get(target).copied().unwrap_or_default();
            let revealed =
                ready & (interest.events | NativeFlags::ERR | NativeFlags::HUP);
            if !revealed.is_empty() {
                events[n] = NativeEvent {
                    events: revealed,
                    data: interest.data,
                };
                n += 1;
            }
        }
        Ok(n)
    }

    fn destroy(&self, set: NativeId) -> Result<(), KernelCode> {
        let mut state = self.state();
        state.sets.remove(&set).ok_or(vendor(Errno::EBADF))?;
        state.destroyed.insert(set);
        Ok(())
    }

    fn translate(&self, code: KernelCode) -> Errno {
        Errno::from_raw((code.0 as u32 & 0xff) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_codes_translate_back() {
        let kernel = MockKernel::new();
        for e in [Errno::EBADF, Errno::EINVAL, Errno::ENOENT, Errno::EEXIST] {
            assert_eq!(kernel.translate(vendor(e)), e);
        }
    }

    #[test]
    fn wait_is_level_triggered() {
        let kernel = MockKernel::new();
        let set = kernel.create("test", 0).unwrap();
        let interest = NativeEvent {
            events: NativeFlags::IN,
            data: 9,
        };
        kernel.control(set, NativeOp::Add, 3, &interest).unwrap();
        kernel.set_ready(3, NativeFlags::IN | NativeFlags::OUT);

        let mut events = [NativeEvent::default(); 2];
        for _ in 0..2 {
            assert_eq!(kernel.wait(set, &mut events, 0).unwrap(), 1);
            assert_eq!(events[0].events, NativeFlags::IN);
            assert_eq!(events[0].data, 9);
        }
    }
}
