//! Subprocess spawning through a pseudo-terminal.
//!
//! The child gets a dumb terminal: canonical input with signals but no
//! echo, carriage returns ignored on input, output post-processing left
//! on, eight data bits, 115200 baud both ways. `TERM`, `PS1` and `PAGER`
//! are pinned so shells and pagers behave in a typescript.

use std::io;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::pty::openpty;
use nix::sys::termios::{
    cfsetispeed, cfsetospeed, tcgetattr, tcsetattr, BaudRate, ControlFlags, InputFlags, LocalFlags,
    OutputFlags, SetArg, SpecialCharacterIndices,
};
use nix::unistd::{close, dup, setsid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("opening pseudo-terminal: {0}")]
    Openpty(#[source] nix::Error),
    #[error("configuring pseudo-terminal: {0}")]
    Termios(#[source] nix::Error),
    #[error("spawning {shell}: {source}")]
    Spawn {
        shell: String,
        #[source]
        source: io::Error,
    },
}

/// A running child attached to a pty master descriptor.
pub struct PtyChild {
    pub child: Child,
    pub master: RawFd,
}

/// Spawn `shell -c command` on a fresh pseudo-terminal and return the
/// child plus the master descriptor to poll.
pub fn spawn_shell(shell: &str, command: &str) -> Result<PtyChild, SpawnError> {
    let pty = openpty(None, None).map_err(SpawnError::Openpty)?;
    let (master, slave) = (pty.master, pty.slave);

    if let Err(e) = configure_slave(slave) {
        let _ = close(master);
        let _ = close(slave);
        return Err(e);
    }

    // The master must not leak into the child or EOF never arrives.
    let _ = fcntl(master, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC));

    let child = match build_command(shell, command, slave) {
        Ok(mut cmd) => cmd.spawn().map_err(|source| SpawnError::Spawn {
            shell: shell.to_string(),
            source,
        }),
        Err(e) => Err(SpawnError::Spawn {
            shell: shell.to_string(),
            source: e,
        }),
    };

    // The Stdio handles own their duplicated descriptors; the original
    // slave stays with the parent and is dropped here.
    let _ = close(slave);

    match child {
        Ok(child) => Ok(PtyChild { child, master }),
        Err(e) => {
            let _ = close(master);
            Err(e)
        }
    }
}

fn configure_slave(slave: RawFd) -> Result<(), SpawnError> {
    let mut ts = tcgetattr(slave).map_err(SpawnError::Termios)?;

    ts.local_flags =
        LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::IEXTEN | LocalFlags::ECHOE;
    ts.input_flags = InputFlags::IXON
        | InputFlags::IXANY
        | InputFlags::IMAXBEL
        | InputFlags::BRKINT
        | InputFlags::IGNCR;
    ts.output_flags = OutputFlags::OPOST;
    ts.control_flags = ControlFlags::CREAD | ControlFlags::CS8 | ControlFlags::HUPCL;

    ts.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    ts.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    ts.control_chars[SpecialCharacterIndices::VEOF as usize] = 0x04;
    ts.control_chars[SpecialCharacterIndices::VINTR as usize] = 0x03;

    cfsetispeed(&mut ts, BaudRate::B115200).map_err(SpawnError::Termios)?;
    cfsetospeed(&mut ts, BaudRate::B115200).map_err(SpawnError::Termios)?;

    tcsetattr(slave, SetArg::TCSANOW, &ts).map_err(SpawnError::Termios)
}

fn build_command(shell: &str, command: &str, slave: RawFd) -> io::Result<Command> {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .env("TERM", "dumb")
        .env("PS1", "\\$ ")
        .env("PAGER", "cat");

    let stdin = dup(slave)?;
    let stdout = dup(slave)?;
    let stderr = dup(slave)?;
    unsafe {
        cmd.stdin(Stdio::from_raw_fd(stdin));
        cmd.stdout(Stdio::from_raw_fd(stdout));
        cmd.stderr(Stdio::from_raw_fd(stderr));

        cmd.pre_exec(|| {
            // New session with the pty slave as controlling terminal.
            setsid().map_err(io::Error::from)?;
            if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
    Ok(cmd)
}
