//! The host capability interface.
//!
//! A chart names guards, step filters and actions by tag; the host supplies
//! their behavior through one [`Callbacks`] object handed to the execution
//! at construction time. Every method has a neutral default, so a host only
//! implements what its chart uses. An action tag the host does not resolve
//! is a defined error ([`UnknownAction`](crate::execution::ExecutionError::UnknownAction)),
//! never a silent skip.

use serde_json::Value;

/// Free-form host-managed mapping carried by every execution.
///
/// Guards and actions read it; actions may replace it or set single keys
/// through their [`ActionOutcome`]. The chart's subject travels under the
/// key named by its [`SubjectBinding`](crate::core::SubjectBinding).
pub type Context = serde_json::Map<String, Value>;

/// Result of invoking one action through the host.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutcome {
    /// The action ran; nothing to record.
    Ok,
    /// The action ran and produced a value, recorded per tag in the drain
    /// results.
    Value(Value),
    /// Replace the execution's context wholesale.
    UpdateContext(Context),
    /// Set a single context key.
    Put(String, Value),
    /// The action failed; the drain aborts and the remaining queue is kept.
    Fail(String),
    /// The host does not implement this tag; surfaces as `UnknownAction`.
    Unhandled,
}

/// Capabilities a host exposes to its executions.
///
/// All methods are optional; defaults keep every step, pass every guard,
/// resolve no participant and handle no action.
pub trait Callbacks: Send + Sync {
    /// Run the action registered under `tag`.
    fn action(&self, tag: &str, ctx: &Context) -> ActionOutcome {
        let _ = (tag, ctx);
        ActionOutcome::Unhandled
    }

    /// Veto or allow a transition from `from` to `to`.
    fn guard(&self, from: &str, to: &str, ctx: &Context) -> Result<(), String> {
        let _ = (from, to, ctx);
        Ok(())
    }

    /// Whether a step applies to this execution; filtered-out steps move to
    /// the state's ignored list on entry.
    fn use_step(&self, step: &str, ctx: &Context) -> bool {
        let _ = (step, ctx);
        true
    }

    /// Resolve a participant role tag to a host identifier; consulted only
    /// while building a dump.
    fn participant_id(&self, ctx: &Context, role: &str) -> Option<Value> {
        let _ = (ctx, role);
        None
    }
}

/// Callbacks for charts with no host behavior: every default applies.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {}
