//! Command-line dispatch.
//!
//! A submitted command line means one of four things: run it through a
//! shell, open a file (`:path`), list a directory (`:path/`), or pipe the
//! typescript into the command (`cmd<`, with `cmd<.` choosing a `.`
//! terminator line for programs that read until a lone dot).

/// Typescript terminator written after a piped typescript.
pub const TERM_NEWLINE: &[u8] = b"\n";
pub const TERM_DOT: &[u8] = b".\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Run through the shell.
    Run { cmd: String },
    /// Run through the shell, then feed the typescript to its stdin
    /// followed by the terminator.
    Pipe { cmd: String, term: &'static [u8] },
    /// `:path`: load the file into the typescript.
    OpenFile { path: String },
    /// `:path/`: list the directory and chdir into it.
    OpenDir { path: String },
}

pub fn parse_submission(s: &str) -> Submission {
    if let Some(cmd) = s.strip_suffix("<.") {
        return Submission::Pipe {
            cmd: cmd.to_string(),
            term: TERM_DOT,
        };
    }
    if let Some(cmd) = s.strip_suffix('<') {
        return Submission::Pipe {
            cmd: cmd.to_string(),
            term: TERM_NEWLINE,
        };
    }
    if let Some(path) = s.strip_prefix(':') {
        if path.ends_with('/') {
            return Submission::OpenDir {
                path: path.to_string(),
            };
        }
        return Submission::OpenFile {
            path: path.to_string(),
        };
    }
    Submission::Run { cmd: s.to_string() }
}
