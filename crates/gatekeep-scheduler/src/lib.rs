//! Trigger evaluation, parameter resolution and build dispatch for Gatekeep.
//!
//! Evaluation flows event → [`triggers::TriggerMatcher`] →
//! [`resolver::ParameterResolver`] → [`policy::DispatchPolicy`], with the
//! [`dispatcher::Dispatcher`] tying the stages to the execution engine and
//! status publisher.

pub mod dispatcher;
pub mod policy;
pub mod queue;
pub mod resolver;
pub mod triggers;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use policy::DispatchPolicy;
pub use queue::{BuildRequest, Priority, QueueManager};
pub use resolver::ParameterResolver;
pub use triggers::{MatchedTrigger, SkipReason, TriggerMatcher, TriggerVerdict, match_branch};
