//! Single-threaded cooperative event loop.
//!
//! Exactly one loop owns the process. Each turn runs the idle handlers
//! (repaint flush), drains toolkit events the display library may have
//! buffered synchronously, then blocks in a level-triggered `poll` over
//! the registered descriptors and dispatches the ready ones.
//!
//! Handlers are boxed closures that typically capture `Rc<RefCell<..>>`
//! application state. They may add and remove sources, idle handlers, or
//! request shutdown from inside a dispatch; the loop takes a handler out
//! of its slot while calling it, so re-registration during dispatch is
//! safe and takes effect on the next turn.

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use anyhow::Result;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use tracing::warn;

/// Handle for removing an idle handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleId(u64);

struct Source {
    id: u64,
    fd: RawFd,
    handler: Option<Box<dyn FnMut(RawFd)>>,
    dead: bool,
}

struct Idle {
    id: IdleId,
    handler: Option<Box<dyn FnMut()>>,
    dead: bool,
}

#[derive(Default)]
struct Inner {
    sources: Vec<Source>,
    idles: Vec<Idle>,
    pre_wait: Option<Box<dyn FnMut()>>,
    next_id: u64,
    quit: bool,
}

/// Cheaply clonable handle to the loop; all clones drive the same state.
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<RefCell<Inner>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source<F>(&self, fd: RawFd, handler: F)
    where
        F: FnMut(RawFd) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.sources.push(Source {
            id,
            fd,
            handler: Some(Box::new(handler)),
            dead: false,
        });
    }

    /// Unregister a descriptor. Unknown descriptors are ignored with a
    /// warning.
    pub fn remove_source(&self, fd: RawFd) {
        let mut inner = self.inner.borrow_mut();
        match inner.sources.iter_mut().find(|s| s.fd == fd && !s.dead) {
            Some(s) => s.dead = true,
            None => warn!(fd, "did not find event source to remove"),
        }
    }

    pub fn add_idle<F>(&self, handler: F) -> IdleId
    where
        F: FnMut() + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = IdleId(inner.next_id);
        inner.next_id += 1;
        inner.idles.push(Idle {
            id,
            handler: Some(Box::new(handler)),
            dead: false,
        });
        id
    }

    pub fn remove_idle(&self, id: IdleId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(i) = inner.idles.iter_mut().find(|i| i.id == id && !i.dead) {
            i.dead = true;
        }
    }

    /// Hook run before every descriptor wait, for event queues the
    /// toolkit fills as a side effect of its own calls.
    pub fn set_pre_wait<F>(&self, hook: F)
    where
        F: FnMut() + 'static,
    {
        self.inner.borrow_mut().pre_wait = Some(Box::new(hook));
    }

    pub fn quit(&self) {
        self.inner.borrow_mut().quit = true;
    }

    pub fn is_quitting(&self) -> bool {
        self.inner.borrow().quit
    }

    /// Run turns until [`EventLoop::quit`] is called (or no descriptors
    /// remain, which would wait forever).
    pub fn run(&self) -> Result<()> {
        loop {
            if self.inner.borrow().quit {
                return Ok(());
            }
            if !self.turn()? {
                return Ok(());
            }
        }
    }

    /// One loop turn: idles, pre-wait drain, block, dispatch. Returns
    /// false when the loop has nothing left to wait on.
    pub fn turn(&self) -> Result<bool> {
        self.run_idles();
        self.run_pre_wait();

        if self.inner.borrow().quit {
            return Ok(true);
        }

        let live: Vec<(u64, RawFd)> = {
            let inner = self.inner.borrow();
            inner
                .sources
                .iter()
                .filter(|s| !s.dead)
                .map(|s| (s.id, s.fd))
                .collect()
        };
        if live.is_empty() {
            warn!("event loop has no sources left");
            return Ok(false);
        }

        let mut fds: Vec<PollFd> = live
            .iter()
            .map(|&(_, fd)| PollFd::new(fd, PollFlags::POLLIN))
            .collect();

        match poll(&mut fds, -1) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(true),
            Err(e) => return Err(e.into()),
        }

        let ready = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        let ready_ids: Vec<(u64, RawFd)> = live
            .iter()
            .zip(&fds)
            .filter(|(_, pfd)| pfd.revents().is_some_and(|r| r.intersects(ready)))
            .map(|(&(id, fd), _)| (id, fd))
            .collect();

        for (id, fd) in ready_ids {
            self.dispatch_source(id, fd);
        }

        self.sweep();
        Ok(true)
    }

    fn run_idles(&self) {
        let n = self.inner.borrow().idles.len();
        for i in 0..n {
            let taken = {
                let mut inner = self.inner.borrow_mut();
                match inner.idles.get_mut(i) {
                    Some(idle) if !idle.dead => idle.handler.take(),
                    _ => None,
                }
            };
            if let Some(mut handler) = taken {
                handler();
                let mut inner = self.inner.borrow_mut();
                if let Some(idle) = inner.idles.get_mut(i) {
                    if idle.handler.is_none() {
                        idle.handler = Some(handler);
                    }
                }
            }
        }
        self.inner.borrow_mut().idles.retain(|i| !i.dead);
    }

    fn run_pre_wait(&self) {
        let taken = self.inner.borrow_mut().pre_wait.take();
        if let Some(mut hook) = taken {
            hook();
            let mut inner = self.inner.borrow_mut();
            if inner.pre_wait.is_none() {
                inner.pre_wait = Some(hook);
            }
        }
    }

    fn dispatch_source(&self, id: u64, fd: RawFd) {
        let taken = {
            let mut inner = self.inner.borrow_mut();
            inner
                .sources
                .iter_mut()
                .find(|s| s.id == id && !s.dead)
                .and_then(|s| s.handler.take())
        };
        if let Some(mut handler) = taken {
            handler(fd);
            let mut inner = self.inner.borrow_mut();
            if let Some(s) = inner.sources.iter_mut().find(|s| s.id == id) {
                if s.handler.is_none() {
                    s.handler = Some(handler);
                }
            }
        }
    }

    fn sweep(&self) {
        self.inner.borrow_mut().sources.retain(|s| !s.dead);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{close, pipe, write};

    #[test]
    fn dispatches_ready_descriptor() {
        let (r, w) = pipe().unwrap();
        let hits = Rc::new(RefCell::new(Vec::new()));

        let ev = EventLoop::new();
        let sink = hits.clone();
        let ev2 = ev.clone();
        ev.add_source(r, move |fd| {
            sink.borrow_mut().push(fd);
            ev2.quit();
        });

        write(w, b"x").unwrap();
        ev.run().unwrap();
        assert_eq!(hits.borrow().as_slice(), &[r]);
        close(r).unwrap();
        close(w).unwrap();
    }

    #[test]
    fn idle_runs_once_per_turn() {
        let (r, w) = pipe().unwrap();
        let idle_count = Rc::new(RefCell::new(0));

        let ev = EventLoop::new();
        let n = idle_count.clone();
        ev.add_idle(move || *n.borrow_mut() += 1);
        let ev2 = ev.clone();
        ev.add_source(r, move |_| ev2.quit());

        write(w, b"x").unwrap();
        ev.run().unwrap();
        // One idle pass before the wait; quit is polled before a second.
        assert_eq!(*idle_count.borrow(), 1);
        close(r).unwrap();
        close(w).unwrap();
    }

    #[test]
    fn source_can_remove_and_replace_itself() {
        let (r, w) = pipe().unwrap();
        let ev = EventLoop::new();
        let ev2 = ev.clone();
        ev.add_source(r, move |fd| {
            let ev3 = ev2.clone();
            ev2.remove_source(fd);
            ev2.add_source(fd, move |_| ev3.quit());
        });

        write(w, b"xx").unwrap();
        ev.run().unwrap();
        close(r).unwrap();
        close(w).unwrap();
    }

    #[test]
    fn pre_wait_runs_before_poll() {
        let (r, w) = pipe().unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        let ev = EventLoop::new();
        let o1 = order.clone();
        ev.set_pre_wait(move || o1.borrow_mut().push("drain"));
        let o2 = order.clone();
        let ev2 = ev.clone();
        ev.add_source(r, move |_| {
            o2.borrow_mut().push("fd");
            ev2.quit();
        });

        write(w, b"x").unwrap();
        ev.run().unwrap();
        assert_eq!(order.borrow().as_slice(), &["drain", "fd"]);
        close(r).unwrap();
        close(w).unwrap();
    }
}
