/// Category of an error raised anywhere in the change-feed pipeline.
/// Lets the owning task decide whether to skip a record or abort
/// (and cancel its siblings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, read or write failure. Fatal to the current task.
    Transport,
    /// Bad record: log it and skip.
    Decode,
    /// Bad settings or failed migration. Fatal at startup.
    Config,
}

impl ErrorKind {
    /// `true` for kinds that must abort the owning task.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::Decode)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Config => f.write_str("config"),
        }
    }
}

/// Implemented by every crate-level error so callers can classify
/// failures without matching on foreign enums.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
