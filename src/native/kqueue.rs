use std::collections::HashMap;

use log::trace;
use nix::{errno::Errno, libc};

use super::{AsKernel, KernelCode, NativeEvent, NativeFlags, NativeId, NativeOp};

/// kqueue standing in for the socket-event triad. Read and write interest
/// become separate EVFILT_READ / EVFILT_WRITE filters, both level-triggered,
/// and are folded back into one event per identifier on the way out.
#[derive(Debug, Default)]
pub struct KqueueKernel;

impl KqueueKernel {
    pub fn new() -> Self {
        Self
    }
}

fn code(e: Errno) -> KernelCode {
    KernelCode(e as i32)
}

fn change(target: NativeId, filter: i16, flags: u16, data: u64) -> libc::kevent {
    let mut kev: libc::kevent = unsafe { std::mem::zeroed() };
    kev.ident = target as _;
    kev.filter = filter as _;
    kev.flags = flags as _;
    kev.udata = data as usize as _;
    kev
}

fn apply(kq: NativeId, changes: &[libc::kevent]) -> Result<(), Errno> {
    if changes.is_empty() {
        return Ok(());
    }
    let ret = unsafe {
        libc::kevent(
            kq,
            changes.as_ptr(),
            changes.len() as _,
            std::ptr::null_mut(),
            0,
            std::ptr::null(),
        )
    };
    Errno::result(ret).map(drop)
}

fn remove_filters(kq: NativeId, target: NativeId) -> Result<(), Errno> {
    // A filter that was never added reports ENOENT; only the pair matters.
    let mut removed = 0;
    for filter in [libc::EVFILT_READ, libc::EVFILT_WRITE] {
        match apply(kq, &[change(target, filter as _, libc::EV_DELETE as _, 0)]) {
            Ok(()) => removed += 1,
            Err(Errno::ENOENT) => {}
            Err(e) => return Err(e),
        }
    }
    if removed == 0 {
        return Err(Errno::ENOENT);
    }
    Ok(())
}

/// Which of the two filters are currently registered for `target`.
/// EV_ENABLE without EV_ADD only touches an existing filter.
fn registered_filters(kq: NativeId, target: NativeId) -> Result<NativeFlags, Errno> {
    let mut present = NativeFlags::empty();
    for (filter, bit) in [
        (libc::EVFILT_READ, NativeFlags::IN),
        (libc::EVFILT_WRITE, NativeFlags::OUT),
    ] {
        match apply(kq, &[change(target, filter as _, libc::EV_ENABLE as _, 0)]) {
            Ok(()) => present |= bit,
            Err(Errno::ENOENT) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(present)
}

/// Replace the interest on `target` without ever dropping it first: the new
/// filters are added (EV_ADD updates one already present), and only then are
/// the filters the new mask no longer wants removed. A failed add leaves the
/// old interest in place.
fn modify_filters(kq: NativeId, target: NativeId, event: &NativeEvent) -> Result<(), Errno> {
    let present = registered_filters(kq, target)?;
    if present.is_empty() {
        return Err(Errno::ENOENT);
    }
    add_filters(kq, target, event)?;
    for (filter, bit) in [
        (libc::EVFILT_READ, NativeFlags::IN),
        (libc::EVFILT_WRITE, NativeFlags::OUT),
    ] {
        if present.contains(bit) && !event.events.contains(bit) {
            match apply(kq, &[change(target, filter as _, libc::EV_DELETE as _, 0)]) {
                Ok(()) | Err(Errno::ENOENT) => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

fn add_filters(kq: NativeId, target: NativeId, event: &NativeEvent) -> Result<(), Errno> {
    let mut changes = Vec::with_capacity(2);
    let flags = (libc::EV_ADD | libc::EV_ENABLE) as u16;
    if event.events.contains(NativeFlags::IN) {
        changes.push(change(target, libc::EVFILT_READ as _, flags, event.data));
    }
    if event.events.contains(NativeFlags::OUT) {
        changes.push(change(target, libc::EVFILT_WRITE as _, flags, event.data));
    }
    // One change per call so the failing filter is the one reported.
    for kev in &changes {
        apply(kq, std::slice::from_ref(kev))?;
    }
    Ok(())
}

impl AsKernel for KqueueKernel {
    fn create(&self, label: &str, _flags: i32) -> Result<NativeId, KernelCode> {
        let id = Errno::result(unsafe { libc::kqueue() }).map_err(code)?;
        trace!("kqueue() -> {} [{}]", id, label);
        Ok(id)
    }

    fn control(
        &self,
        set: NativeId,
        op: NativeOp,
        target: NativeId,
        event: &NativeEvent,
    ) -> Result<(), KernelCode> {
        match op {
            NativeOp::Add => add_filters(set, target, event),
            NativeOp::Modify => modify_filters(set, target, event),
            NativeOp::Delete => remove_filters(set, target),
        }
        .map_err(code)?;
        trace!("kevent({}, {:?}, {}, {:?}) ok", set, op, target, event.events);
        Ok(())
    }

    fn wait(
        &self,
        set: NativeId,
        events: &mut [NativeEvent],
        timeout_ms: i32,
    ) -> Result<usize, KernelCode> {
        // Up to two filters per identifier.
        let mut raw: Vec<libc::kevent> = vec![unsafe { std::mem::zeroed() }; events.len() * 2];
        let ts;
        let timeout = if timeout_ms < 0 {
            std::ptr::null()
        } else {
            ts = libc::timespec {
                tv_sec: (timeout_ms / 1000) as libc::time_t,
                tv_nsec: ((timeout_ms % 1000) * 1_000_000) as libc::c_long,
            };
            &ts as *const libc::timespec
        };
        let nev = Errno::result(unsafe {
            libc::kevent(
                set,
                std::ptr::null(),
                0,
                raw.as_mut_ptr(),
                raw.len() as _,
                timeout,
            )
        })
        .map_err(code)? as usize;

        let mut slots: HashMap<usize, usize> = HashMap::new();
        let mut filled = 0;
        for kev in &raw[..nev] {
            let ident = kev.ident as usize;
            let idx = match slots.get(&ident) {
                Some(idx) => *idx,
                None if filled < events.len() => {
                    slots.insert(ident, filled);
                    events[filled] = NativeEvent {
                        events: NativeFlags::empty(),
                        data: kev.udata as usize as u64,
                    };
                    filled += 1;
                    filled - 1
                }
                None => continue,
            };
            let out = &mut events[idx];
            if kev.filter == libc::EVFILT_READ as _ {
                out.events |= NativeFlags::IN;
            }
            if kev.filter == libc::EVFILT_WRITE as _ {
                out.events |= NativeFlags::OUT;
            }
            if kev.flags & (libc::EV_EOF as u16) as _ != 0 {
                out.events |= NativeFlags::HUP;
            }
            if kev.flags & (libc::EV_ERROR as u16) as _ != 0 {
                out.events |= NativeFlags::ERR;
            }
        }
        trace!("kevent({}, {}) -> {} ({} raw)", set, timeout_ms, filled, nev);
        Ok(filled)
    }

    fn destroy(&self, set: NativeId) -> Result<(), KernelCode> {
        Errno::result(unsafe { libc::close(set) }).map_err(code)?;
        trace!("closed kqueue {}", set);
        Ok(())
    }

    fn translate(&self, code: KernelCode) -> Errno {
        Errno::from_raw(code.0)
    }
}
