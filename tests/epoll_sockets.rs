#![cfg(target_os = "linux")]

use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use pollshim::conf::Config;
use pollshim::{CtlOp, DescriptorKind, EpollEvent, Error, EventFlags, Shim};

fn shim() -> Shim {
    let mut config = Config::default();
    config.registry.max_descriptors = 16;
    Shim::new(&config)
}

#[test_log::test]
fn data_arrival_makes_the_socket_readable() {
    let shim = shim();
    let (mut tx, mut rx) = UnixStream::pair().unwrap();
    let ep = shim.epoll_create(0).unwrap();
    assert_eq!(shim.registry().kind(ep), Some(DescriptorKind::Epoll));
    let sock = shim.install_socket(rx.as_raw_fd()).unwrap();

    let interest = EpollEvent::new(EventFlags::EPOLLIN, 0xabcd);
    shim.epoll_ctl(ep, CtlOp::Add, sock, Some(&interest)).unwrap();

    let mut events = [EpollEvent::empty(); 1];
    assert_eq!(shim.epoll_wait(ep, &mut events, 0).unwrap(), 0);

    tx.write_all(b"ping").unwrap();
    // Level-triggered: reported again until drained.
    for _ in 0..2 {
        assert_eq!(shim.epoll_wait(ep, &mut events, 0).unwrap(), 1);
        assert_eq!(events[0].data, 0xabcd);
        assert!(events[0].events.contains(EventFlags::EPOLLIN));
    }

    let mut buf = [0u8; 4];
    rx.read_exact(&mut buf).unwrap();
    assert_eq!(shim.epoll_wait(ep, &mut events, 0).unwrap(), 0);

    shim.close(ep).unwrap();
    shim.close(sock).unwrap();
}

#[test]
fn peer_close_reports_hangup() {
    let shim = shim();
    let (tx, rx) = UnixStream::pair().unwrap();
    let ep = shim.epoll_create1(0).unwrap();
    let sock = shim.install_socket(rx.as_raw_fd()).unwrap();
    let interest = EpollEvent::new(EventFlags::EPOLLIN, 1);
    shim.epoll_ctl(ep, CtlOp::Add, sock, Some(&interest)).unwrap();

    drop(tx);
    let mut events = [EpollEvent::empty(); 1];
    assert_eq!(shim.epoll_wait(ep, &mut events, 100).unwrap(), 1);
    assert!(events[0].events.contains(EventFlags::EPOLLHUP));
}

#[test]
fn wait_times_out_and_ctl_runs_concurrently() {
    let shim = shim();
    let (mut tx, rx) = UnixStream::pair().unwrap();
    let ep = shim.epoll_create1(0).unwrap();
    let sock = shim.install_socket(rx.as_raw_fd()).unwrap();

    let start = Instant::now();
    let mut events = [EpollEvent::empty(); 2];
    assert_eq!(shim.epoll_wait(ep, &mut events, 30).unwrap(), 0);
    assert!(start.elapsed() >= Duration::from_millis(25));

    tx.write_all(b"x").unwrap();
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            let interest = EpollEvent::new(EventFlags::EPOLLIN, 7);
            shim.epoll_ctl(ep, CtlOp::Add, sock, Some(&interest)).unwrap();
        });
        let n = shim.epoll_wait(ep, &mut events, 5000).unwrap();
        assert_eq!(n, 1);
        assert_eq!(events[0].data, 7);
    });
}

#[test]
fn epoll_handles_cannot_be_watched() {
    let shim = shim();
    let ep = shim.epoll_create1(0).unwrap();
    let inner = shim.epoll_create1(0).unwrap();
    let ev = EpollEvent::new(EventFlags::EPOLLIN, 0);
    assert!(matches!(
        shim.epoll_ctl(ep, CtlOp::Add, inner, Some(&ev)),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        shim.epoll_ctl(ep, CtlOp::Add, ep, Some(&ev)),
        Err(Error::InvalidArgument(_))
    ));
    let mut events = [EpollEvent::empty(); 1];
    assert!(matches!(
        shim.epoll_wait(ep, &mut events, -2),
        Err(Error::InvalidArgument(_))
    ));
}
