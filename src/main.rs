//! Exercise the shim end to end over a connected Unix socket pair: poll the
//! writer for writability, watch the reader through epoll, send a byte and
//! report what became ready.
mod cli;

use std::error::Error;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;

use clap::Parser;
use log::info;
use pollshim::conf::Config;
use pollshim::{logging, CtlOp, EpollEvent, EventFlags, PollFd, PollFlags, Shim};

use crate::cli::Cli;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    logging::init(&config.log)?;
    println!("{:#?}", config);

    let shim = Shim::new(&config);
    let (mut writer, reader) = UnixStream::pair()?;
    let wfd = shim.install_socket(writer.as_raw_fd())?;
    let rfd = shim.install_socket(reader.as_raw_fd())?;
    info!("writer is handle {}, reader is handle {}", wfd, rfd);

    let mut fds = [PollFd::new(wfd, PollFlags::POLLOUT)];
    let n = shim.poll(&mut fds, cli.timeout)?;
    println!("poll: {} ready, writer revents {:?}", n, fds[0].revents);

    let epfd = shim.epoll_create1(0)?;
    let interest = EpollEvent::new(EventFlags::EPOLLIN, rfd as u64);
    shim.epoll_ctl(epfd, CtlOp::Add, rfd, Some(&interest))?;

    writer.write_all(b"!")?;

    let mut events = [EpollEvent::empty(); 4];
    let n = shim.epoll_wait(epfd, &mut events, cli.timeout)?;
    for event in &events[..n] {
        println!("epoll: handle {} ready with {:?}", event.data, event.events);
    }

    shim.close(epfd)?;
    shim.close(rfd)?;
    shim.close(wfd)?;
    Ok(())
}
