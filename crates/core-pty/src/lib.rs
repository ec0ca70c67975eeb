//! Pty panels: subprocess spawning over pseudo-terminals, command
//! submission dispatch, file and directory typescript sources, and the
//! panel state machine.

mod panel;
mod spawn;
mod submit;

pub use panel::{Panel, PanelId, PanelState};
pub use spawn::{spawn_shell, PtyChild, SpawnError};
pub use submit::{parse_submission, Submission, TERM_DOT, TERM_NEWLINE};
