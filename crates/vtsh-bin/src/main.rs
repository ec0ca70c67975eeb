//! vtsh entrypoint: wire the display adapter, the event loop, and the
//! window set together, then hand the process to the loop.

use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use core_events::EventLoop;
use core_panels::WindowSet;
use core_screen::TermScreen;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "vtsh", version, about = "A mashup of virtual terminal and shell")]
struct Args {
    /// Command words; when present they are joined with spaces and
    /// submitted as the first panel's command at startup.
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}

/// Environment contract. There is no configuration file.
struct Config {
    shell: String,
}

impl Config {
    fn from_env() -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string());
        Self { shell }
    }
}

/// Log to a file; the terminal itself is the UI. `VTSH_LOG` filters in
/// the usual `EnvFilter` syntax.
fn init_logging() -> WorkerGuard {
    let appender = tracing_appender::rolling::never(std::env::temp_dir(), "vtsh.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env("VTSH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging();
    let config = Config::from_env();

    let screen = TermScreen::new().context("initializing the display")?;
    let ev_loop = EventLoop::new();
    let ws = WindowSet::shared(Box::new(screen), ev_loop.clone(), config.shell);

    // Display input is one descriptor among the pty masters.
    if let Some(fd) = ws.borrow().screen_poll_fd() {
        let wsr = Rc::downgrade(&ws);
        ev_loop.add_source(fd, move |_| {
            if let Some(ws) = wsr.upgrade() {
                ws.borrow_mut().read_screen_events();
            }
        });
    }

    // Events the display library buffered synchronously are drained
    // before every wait.
    {
        let wsr = Rc::downgrade(&ws);
        ev_loop.set_pre_wait(move || {
            if let Some(ws) = wsr.upgrade() {
                ws.borrow_mut().drain_screen_events();
            }
        });
    }

    // All repaints coalesce into one idle flush per loop turn.
    {
        let wsr = Rc::downgrade(&ws);
        ev_loop.add_idle(move || {
            if let Some(ws) = wsr.upgrade() {
                ws.borrow_mut().flush();
            }
        });
    }

    if !args.command.is_empty() {
        let cmd = args.command.join(" ");
        info!(command = %cmd, "initial command");
        ws.borrow_mut().initial_command(&cmd);
    }

    let result = ev_loop.run();

    // Teardown order: panels and their children go first, then dropping
    // the screen restores the terminal.
    drop(ws);
    info!("shut down");
    result
}
