//! Build dispatch orchestration.

use crate::policy::DispatchPolicy;
use crate::queue::{BuildRequest, Priority, QueueManager, QueuedBuild};
use crate::resolver::ParameterResolver;
use crate::triggers::TriggerMatcher;

use chrono::Utc;
use gatekeep_config::CompiledDefinition;
use gatekeep_core::decision::DispatchDecision;
use gatekeep_core::event::VcsEvent;
use gatekeep_core::events::StatusEvent;
use gatekeep_core::ids::{BuildId, TriggerName};
use gatekeep_core::params::ResolvedParameterSet;
use gatekeep_core::ports::{ExecutionEngine, ExecutionRequest, StatusPublisher};
use gatekeep_core::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Queued reason prefix for builds the execution engine refused.
pub const ENGINE_UNAVAILABLE_REASON: &str = "execution engine unavailable";

/// Result of dispatching one matched trigger.
///
/// Serializes with credential references masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub build_id: BuildId,
    pub trigger: TriggerName,
    pub branch: String,
    pub attempt: u32,
    pub decision: DispatchDecision,
}

/// Dispatch bookkeeping. Guarded by a single lock so that the capacity check
/// and the running-count increment cannot interleave.
#[derive(Debug, Default)]
struct DispatchState {
    queue: QueueManager,
    running: HashMap<BuildId, BuildRequest>,
}

/// A decided build waiting for its engine handoff.
struct Admitted {
    request: BuildRequest,
    priority: Priority,
    /// The queue entry an admitted build came from, reinstated if the
    /// engine refuses it.
    waiting: Option<QueuedBuild>,
    decision: DispatchDecision,
}

/// The dispatch service: evaluates events, resolves parameters, applies the
/// policy and hands approved builds to the execution engine.
pub struct Dispatcher {
    definition: Arc<CompiledDefinition>,
    engine: Arc<dyn ExecutionEngine>,
    publisher: Arc<dyn StatusPublisher>,
    trigger_matcher: TriggerMatcher,
    resolver: ParameterResolver,
    policy: DispatchPolicy,
    state: Arc<Mutex<DispatchState>>,
}

impl Dispatcher {
    pub fn new(
        definition: Arc<CompiledDefinition>,
        engine: Arc<dyn ExecutionEngine>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        let policy = DispatchPolicy::from_definition(&definition);
        Self {
            definition,
            engine,
            publisher,
            trigger_matcher: TriggerMatcher::new(),
            resolver: ParameterResolver::new(),
            policy,
            state: Arc::new(Mutex::new(DispatchState::default())),
        }
    }

    pub fn definition(&self) -> &CompiledDefinition {
        &self.definition
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Handle a VCS event, producing one outcome per matched trigger.
    ///
    /// Parameters for every matched trigger are resolved before anything is
    /// dispatched; a resolution error fails the event without side effects.
    /// All matched builds are decided under one lock, so an event's builds
    /// are admitted or queued together.
    pub async fn handle_event(
        &self,
        event: VcsEvent,
        user_overrides: &BTreeMap<String, String>,
    ) -> Result<Vec<DispatchOutcome>> {
        let matched = self.trigger_matcher.evaluate(&event, &self.definition);
        if matched.is_empty() {
            info!(
                pipeline = %self.definition.name(),
                branch = %event.logical_branch(),
                "No trigger matched event"
            );
            return Ok(vec![]);
        }

        let requests = matched
            .into_iter()
            .map(|m| {
                let resolved =
                    self.resolver
                        .resolve(&m, self.definition.parameters(), user_overrides)?;
                Ok((BuildRequest::new(event.clone(), m, user_overrides.clone()), resolved))
            })
            .collect::<Result<Vec<_>>>()?;

        let admitted = {
            let mut state = self.state.lock().await;
            requests
                .into_iter()
                .map(|(request, resolved)| {
                    self.admit(&mut state, request, resolved, Priority::Normal, None)
                })
                .collect::<Vec<_>>()
        };

        Ok(self.hand_off_all(admitted).await)
    }

    /// Record that a running build finished, freeing its slot.
    ///
    /// A failed build is retried while the retry policy allows. Waiting
    /// builds that now fit under the ceiling are admitted in the same
    /// critical section that freed the slot; their outcomes are returned.
    pub async fn build_finished(
        &self,
        build_id: &BuildId,
        success: bool,
    ) -> Result<Vec<DispatchOutcome>> {
        let admitted = {
            let mut state = self.state.lock().await;
            let request = state
                .running
                .remove(build_id)
                .ok_or_else(|| Error::BuildNotFound(build_id.to_string()))?;
            state.queue.finish(request.branch());

            if !success
                && let Some(retry) = self.policy.retry()
                && request.attempt <= retry.attempts
            {
                let priority = if retry.move_to_the_queue_top {
                    Priority::High
                } else {
                    Priority::Normal
                };
                info!(
                    build_id = %build_id,
                    trigger = %request.matched.name,
                    attempt = request.attempt + 1,
                    "Retrying failed build"
                );
                state.queue.enqueue(request.retry(), priority);
            } else {
                debug!(build_id = %build_id, success, "Build finished");
            }

            self.admit_waiting(&mut state)
        };

        Ok(self.hand_off_all(admitted).await)
    }

    /// Dispatch waiting builds while their branches have capacity.
    ///
    /// Builds the engine refused stay queued; calling this again retries them.
    pub async fn drain(&self) -> Vec<DispatchOutcome> {
        let admitted = {
            let mut state = self.state.lock().await;
            self.admit_waiting(&mut state)
        };
        self.hand_off_all(admitted).await
    }

    pub async fn queue_length(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn running_on(&self, branch: &str) -> usize {
        self.state.lock().await.queue.running_on(branch)
    }

    /// Pop every waiting build whose branch has room and decide it. Slots
    /// are taken before the lock is released, so a concurrent event cannot
    /// overtake a build that has waited longer.
    fn admit_waiting(&self, state: &mut DispatchState) -> Vec<Admitted> {
        let mut admitted = Vec::new();
        while let Some(waiting) = state
            .queue
            .dequeue_ready(|branch, running| self.policy.has_capacity(branch, running))
        {
            let request = waiting.request.clone();
            let priority = waiting.priority;
            // Re-resolve so every attempt goes through the full pipeline.
            match self.resolver.resolve(
                &request.matched,
                self.definition.parameters(),
                &request.user_overrides,
            ) {
                Ok(resolved) => {
                    admitted.push(self.admit(state, request, resolved, priority, Some(waiting)))
                }
                Err(e) => {
                    error!(
                        build_id = %request.build_id,
                        trigger = %request.matched.name,
                        error = %e,
                        "Parameter resolution failed for waiting build"
                    );
                    admitted.push(Admitted {
                        request,
                        priority,
                        waiting: None,
                        decision: DispatchDecision::rejected(format!(
                            "parameter resolution failed: {e}"
                        )),
                    });
                }
            }
        }
        admitted
    }

    /// Apply the policy and update bookkeeping. Must run under the state lock.
    fn admit(
        &self,
        state: &mut DispatchState,
        request: BuildRequest,
        resolved: ResolvedParameterSet,
        priority: Priority,
        waiting: Option<QueuedBuild>,
    ) -> Admitted {
        let running = state.queue.running_on(request.branch());
        let decision = self.policy.decide(&request.matched, resolved, running);
        let waiting = match &decision {
            DispatchDecision::Proceed { .. } => {
                state.queue.start(request.branch());
                state.running.insert(request.build_id, request.clone());
                waiting
            }
            DispatchDecision::Queued { .. } => {
                match waiting {
                    Some(build) => state.queue.requeue(build),
                    None => state.queue.enqueue(request.clone(), priority),
                }
                None
            }
            DispatchDecision::Rejected { .. } => None,
        };
        Admitted {
            request,
            priority,
            waiting,
            decision,
        }
    }

    async fn hand_off_all(&self, admitted: Vec<Admitted>) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(admitted.len());
        for build in admitted {
            outcomes.push(self.hand_off(build).await);
        }
        outcomes
    }

    /// Pass an admitted build to the engine and report the outcome.
    ///
    /// A build the engine refuses gives its slot back and waits in the
    /// queue, keeping its place if it was already waiting.
    async fn hand_off(&self, admitted: Admitted) -> DispatchOutcome {
        let Admitted {
            request,
            priority,
            waiting,
            mut decision,
        } = admitted;

        let refused = match &decision {
            DispatchDecision::Proceed { parameters } => {
                let execution = self.execution_request(&request, parameters.clone());
                match self.engine.dispatch(&execution).await {
                    Ok(()) => {
                        info!(
                            build_id = %request.build_id,
                            trigger = %request.matched.name,
                            branch = %request.branch(),
                            attempt = request.attempt,
                            "Build dispatched"
                        );
                        None
                    }
                    Err(e) => Some(e),
                }
            }
            DispatchDecision::Queued { reason } => {
                info!(
                    build_id = %request.build_id,
                    trigger = %request.matched.name,
                    branch = %request.branch(),
                    reason = %reason,
                    "Build queued"
                );
                None
            }
            DispatchDecision::Rejected { reason } => {
                info!(
                    build_id = %request.build_id,
                    trigger = %request.matched.name,
                    branch = %request.branch(),
                    reason = %reason,
                    "Build rejected"
                );
                None
            }
        };

        if let Some(e) = refused {
            error!(
                build_id = %request.build_id,
                trigger = %request.matched.name,
                error = %e,
                "Execution engine did not accept build"
            );
            let mut state = self.state.lock().await;
            state.running.remove(&request.build_id);
            state.queue.finish(request.branch());
            match waiting {
                Some(build) => state.queue.requeue(build),
                None => state.queue.enqueue(request.clone(), priority),
            }
            decision = DispatchDecision::queued(format!("{ENGINE_UNAVAILABLE_REASON}: {e}"));
        }

        let outcome = DispatchOutcome {
            build_id: request.build_id,
            trigger: request.matched.name.clone(),
            branch: request.branch().to_string(),
            attempt: request.attempt,
            decision,
        };
        self.report(&request, &outcome).await;
        outcome
    }

    fn execution_request(
        &self,
        request: &BuildRequest,
        parameters: ResolvedParameterSet,
    ) -> ExecutionRequest {
        ExecutionRequest {
            build_id: request.build_id,
            pipeline: self.definition.name().to_string(),
            trigger: request.matched.name.clone(),
            branch: request.branch().to_string(),
            attempt: request.attempt,
            resolved_parameters: parameters,
            timeout_minutes: self.policy.timeout_minutes(),
            artifact_rules: self.definition.artifact_rules().to_vec(),
        }
    }

    /// Status reporting is best effort and never undoes a dispatch.
    async fn report(&self, request: &BuildRequest, outcome: &DispatchOutcome) {
        let event = StatusEvent {
            build_id: outcome.build_id,
            pipeline: self.definition.name().to_string(),
            trigger: outcome.trigger.clone(),
            branch: outcome.branch.clone(),
            commit_sha: request.event.commit_sha.clone(),
            decision: outcome.decision.kind(),
            reason: outcome.decision.reason().to_string(),
            attempt: outcome.attempt,
            reported_at: Utc::now(),
        };
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(subject = %event.subject(), error = %e, "Failed to publish status");
        }
    }
}
