use std::fmt;

/// Direction of a single changed line in a rendered diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Add => write!(f, "add"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// One changed line pulled out of a rendered diff document.
///
/// `position` is the line's ordinal within the document, counting elided
/// stretches as one line each, so the difference between two positions
/// reflects how far apart the lines sit in the document rather than in
/// the extracted list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLine {
    pub text: String,
    pub position: usize,
    pub kind: ChangeKind,
}

impl ChangeLine {
    pub fn new(text: impl Into<String>, position: usize, kind: ChangeKind) -> Self {
        Self {
            text: text.into(),
            position,
            kind,
        }
    }
}
