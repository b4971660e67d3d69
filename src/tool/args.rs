//! Argument lists for external tool invocations.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

/// Ordered command-line arguments for one tool invocation.
///
/// Arguments are kept as a vector and handed to the OS unsplit, so paths
/// with spaces or quotes need no escaping. [`ToolArgs::command_line`]
/// renders the flattened, shell-quoted form for logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolArgs {
    args: Vec<String>,
}

impl ToolArgs {
    /// Create an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a flag followed by its value.
    #[must_use]
    pub fn flag(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Append a path argument.
    #[must_use]
    pub fn path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Borrow the arguments.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Render the arguments as a single shell-quoted string.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.args
            .iter()
            .map(|a| shell_escape::escape(Cow::Borrowed(a.as_str())))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

impl<S: Into<String>> FromIterator<S> for ToolArgs {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().map(Into::into).collect(),
        }
    }
}
