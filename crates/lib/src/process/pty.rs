//! Pseudo-terminal plumbing for interactive runs.

use std::fs::File;
use std::io;
use std::os::fd::OwnedFd;
use std::process::{Command, Stdio};

use rustix::fs::{Mode, OFlags};
use rustix::io::{Errno, FdFlags};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};

/// A master/slave terminal pair. The child writes to the slave, we read the master.
pub struct Pty {
  master: OwnedFd,
  slave: OwnedFd,
}

impl Pty {
  pub fn open() -> io::Result<Self> {
    let master = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)?;
    rustix::io::fcntl_setfd(&master, FdFlags::CLOEXEC)?;
    grantpt(&master)?;
    unlockpt(&master)?;

    let name = ptsname(&master, Vec::new())?;
    let slave = rustix::fs::open(name.as_c_str(), OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC, Mode::empty())?;

    Ok(Self { master, slave })
  }

  /// Points the command's stdout and stderr at the slave side.
  pub fn attach(&self, command: &mut Command) -> io::Result<()> {
    command.stdout(Stdio::from(self.slave.try_clone()?));
    command.stderr(Stdio::from(self.slave.try_clone()?));
    Ok(())
  }

  /// Closes our copy of the slave and returns the master for reading.
  ///
  /// Once every slave descriptor is closed, reads from the master fail with
  /// `EIO` on Linux; use [`is_end_of_stream`] to treat that as EOF.
  pub fn into_reader(self) -> File {
    drop(self.slave);
    File::from(self.master)
  }
}

pub fn is_end_of_stream(err: &io::Error) -> bool {
  err.raw_os_error() == Some(Errno::IO.raw_os_error())
}
