//! Issues found while validating a descriptor

use std::error::Error;
use std::fmt;

use failure::Fail;

/// Broad class of an [`Issue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueKind {
    /// The descriptor doesn't have the expected shape
    Structural,

    /// Something refers to an application, endpoint, parameter or key that doesn't exist
    Reference,

    /// Two declarations can't both hold
    Conflict,

    /// A value doesn't match its declared type
    Type,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            IssueKind::Structural => "structural",
            IssueKind::Reference => "reference",
            IssueKind::Conflict => "conflict",
            IssueKind::Type => "type",
        })
    }
}

/// A single problem found in a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum Issue {
    #[fail(display = "structural error: {}", _0)]
    Structural(String),

    #[fail(display = "reference error: {}", _0)]
    Reference(String),

    #[fail(display = "conflict error: {}", _0)]
    Conflict(String),

    #[fail(display = "type error: {}", _0)]
    Type(String),
}

impl Issue {
    pub fn kind(&self) -> IssueKind {
        match self {
            Issue::Structural(_) => IssueKind::Structural,
            Issue::Reference(_) => IssueKind::Reference,
            Issue::Conflict(_) => IssueKind::Conflict,
            Issue::Type(_) => IssueKind::Type,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Issue::Structural(m) | Issue::Reference(m) | Issue::Conflict(m) | Issue::Type(m) => m,
        }
    }

    /// Prefix the message with the thing it was found in, e.g. an application name
    pub fn within(self, context: &str) -> Self {
        let wrap = |m: String| format!("{}: {}", context, m);
        match self {
            Issue::Structural(m) => Issue::Structural(wrap(m)),
            Issue::Reference(m) => Issue::Reference(wrap(m)),
            Issue::Conflict(m) => Issue::Conflict(wrap(m)),
            Issue::Type(m) => Issue::Type(wrap(m)),
        }
    }
}

/// Every issue found in one descriptor, in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// A report for a descriptor that couldn't be parsed at all
    pub fn structural<S: Into<String>>(message: S) -> Self {
        Self {
            issues: vec![Issue::Structural(message.into())],
        }
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind() == kind)
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Turn this report into a result, yielding `value` if nothing was found
    pub fn into_result<T>(self, value: T) -> Result<T, Report> {
        if self.is_ok() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl Extend<Issue> for Report {
    fn extend<I: IntoIterator<Item = Issue>>(&mut self, iter: I) {
        self.issues.extend(iter)
    }
}

impl IntoIterator for Report {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "no issues found");
        }
        writeln!(f, "{} issue(s) found:", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  - {}", issue)?;
        }
        Ok(())
    }
}

impl Error for Report {}
