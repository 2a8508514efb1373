//! Relative target references, resolved at compile time.
//!
//! Targets in a state body are written relative to the declaring state and
//! resolved to absolute dotted paths by `build()`. The three forms mirror
//! how charts are read: stay here, move to a sibling, or move to a sibling
//! of the parent.

use crate::core::state::parent_path;

/// A target reference inside a state body.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetRef {
    /// The declaring state itself (a self transition).
    This,
    /// A sibling of the declaring state: the last path segment is replaced.
    Sibling(String),
    /// A sibling of the declaring state's parent: two segments are dropped
    /// before appending the name.
    Up(String),
}

impl TargetRef {
    /// The declaring state itself.
    pub fn this() -> Self {
        Self::This
    }

    /// A sibling of the declaring state.
    pub fn sibling(name: impl Into<String>) -> Self {
        Self::Sibling(name.into())
    }

    /// A sibling of the declaring state's parent.
    pub fn up(name: impl Into<String>) -> Self {
        Self::Up(name.into())
    }

    /// Resolve against the absolute path of the declaring state.
    ///
    /// Returns `None` when the reference climbs past the root.
    pub(crate) fn resolve(&self, current: &str) -> Option<String> {
        match self {
            Self::This => Some(current.to_string()),
            Self::Sibling(name) => Some(match parent_path(current) {
                Some(parent) => format!("{parent}.{name}"),
                None => name.clone(),
            }),
            Self::Up(name) => {
                let parent = parent_path(current)?;
                Some(match parent_path(parent) {
                    Some(grandparent) => format!("{grandparent}.{name}"),
                    None => name.clone(),
                })
            }
        }
    }

    /// Display form for error reporting.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::This => "(self)".to_string(),
            Self::Sibling(name) => name.clone(),
            Self::Up(name) => format!("^{name}"),
        }
    }
}

impl From<&str> for TargetRef {
    fn from(name: &str) -> Self {
        Self::Sibling(name.to_string())
    }
}

impl From<String> for TargetRef {
    fn from(name: String) -> Self {
        Self::Sibling(name)
    }
}

/// An ordered target list accepted by the `on*` builder methods.
///
/// A single element is an ordinary transition; several form a guard
/// fallthrough tried in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Targets(pub(crate) Vec<TargetRef>);

impl From<&str> for Targets {
    fn from(name: &str) -> Self {
        Self(vec![TargetRef::from(name)])
    }
}

impl From<String> for Targets {
    fn from(name: String) -> Self {
        Self(vec![TargetRef::from(name)])
    }
}

impl From<TargetRef> for Targets {
    fn from(target: TargetRef) -> Self {
        Self(vec![target])
    }
}

impl From<Vec<TargetRef>> for Targets {
    fn from(targets: Vec<TargetRef>) -> Self {
        Self(targets)
    }
}

impl<const N: usize> From<[TargetRef; N]> for Targets {
    fn from(targets: [TargetRef; N]) -> Self {
        Self(targets.into_iter().collect())
    }
}

impl From<Vec<&str>> for Targets {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(TargetRef::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(names: [&str; N]) -> Self {
        Self(names.into_iter().map(TargetRef::from).collect())
    }
}
