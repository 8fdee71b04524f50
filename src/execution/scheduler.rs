//! Schedule-driven triggering of pipeline runs

use crate::{
    core::{CompiledSchedule, OverlapPolicy, PipelineGraph, RunReport, ScheduleError, ScheduleSpec},
    execution::engine::Supervisor,
    runner::{CancelSignal, CommandRunner},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of asking the scheduler to start a run
#[derive(Debug)]
pub enum Dispatch {
    /// A run was started (or queued); the handle resolves to its report
    Started(JoinHandle<RunReport>),
    /// A run of the same pipeline was active and the policy is `Skip`
    Skipped,
}

impl Dispatch {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Dispatch::Skipped)
    }

    /// Wait for the dispatched run, if one was started
    pub async fn report(self) -> Option<RunReport> {
        match self {
            Dispatch::Started(handle) => match handle.await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!(error = %e, "Pipeline run task did not complete");
                    None
                }
            },
            Dispatch::Skipped => None,
        }
    }
}

struct Registration {
    graph: Arc<PipelineGraph>,
    schedule: CompiledSchedule,
    gate: Arc<tokio::sync::Mutex<()>>,
    task: JoinHandle<()>,
}

/// Everything a dispatch needs, cheap to clone into the timer task
struct Dispatcher<R> {
    supervisor: Arc<Supervisor<R>>,
    graph: Arc<PipelineGraph>,
    gate: Arc<tokio::sync::Mutex<()>>,
    policy: OverlapPolicy,
    cancel: CancelSignal,
}

impl<R> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            supervisor: self.supervisor.clone(),
            graph: self.graph.clone(),
            gate: self.gate.clone(),
            policy: self.policy,
            cancel: self.cancel.clone(),
        }
    }
}

impl<R: CommandRunner + 'static> Dispatcher<R> {
    fn dispatch(&self) -> Dispatch {
        let supervisor = self.supervisor.clone();
        let graph = self.graph.clone();
        let cancel = self.cancel.clone();

        match self.policy {
            OverlapPolicy::Skip => match self.gate.clone().try_lock_owned() {
                Ok(guard) => Dispatch::Started(tokio::spawn(async move {
                    let _guard = guard;
                    supervisor.run_with_cancel(&graph, cancel).await
                })),
                Err(_) => {
                    warn!(pipeline = %graph.name(), "Previous run still active, skipping trigger");
                    Dispatch::Skipped
                }
            },
            OverlapPolicy::Queue => {
                let gate = self.gate.clone();
                Dispatch::Started(tokio::spawn(async move {
                    let _guard = gate.lock_owned().await;
                    supervisor.run_with_cancel(&graph, cancel).await
                }))
            }
        }
    }
}

/// Fires registered pipelines on their schedules
pub struct Scheduler<R> {
    supervisor: Arc<Supervisor<R>>,
    policy: OverlapPolicy,
    registrations: Mutex<HashMap<String, Registration>>,
    cancel_tx: watch::Sender<bool>,
}

impl<R: CommandRunner + 'static> Scheduler<R> {
    pub fn new(supervisor: Arc<Supervisor<R>>, policy: OverlapPolicy) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            supervisor,
            policy,
            registrations: Mutex::new(HashMap::new()),
            cancel_tx,
        }
    }

    fn ensure_running(&self) -> Result<(), ScheduleError> {
        let shut_down = *self.cancel_tx.borrow();
        if shut_down {
            return Err(ScheduleError::ShutDown);
        }
        Ok(())
    }

    fn registrations(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatcher(&self, graph: Arc<PipelineGraph>, gate: Arc<tokio::sync::Mutex<()>>) -> Dispatcher<R> {
        Dispatcher {
            supervisor: self.supervisor.clone(),
            graph,
            gate,
            policy: self.policy,
            cancel: self.cancel_tx.subscribe(),
        }
    }

    /// Register a graph with its schedule and start the timer task.
    ///
    /// The schedule is compiled first; on any error nothing is spawned.
    pub fn register(&self, graph: PipelineGraph, spec: &ScheduleSpec) -> Result<(), ScheduleError> {
        self.ensure_running()?;
        let schedule = spec.compile()?;

        if spec.pipeline != graph.name() {
            return Err(ScheduleError::PipelineMismatch {
                expected: spec.pipeline.clone(),
                actual: graph.name().to_string(),
            });
        }

        let mut registrations = self.registrations();
        if registrations.contains_key(graph.name()) {
            return Err(ScheduleError::AlreadyRegistered(graph.name().to_string()));
        }

        let name = graph.name().to_string();
        let graph = Arc::new(graph);
        let gate = Arc::new(tokio::sync::Mutex::new(()));
        let dispatcher = self.dispatcher(graph.clone(), gate.clone());
        let task = tokio::spawn(timer_loop(dispatcher, schedule.clone()));

        info!(
            pipeline = %name,
            expression = %spec.expression,
            timezone = %spec.timezone,
            "Registered schedule"
        );
        registrations.insert(
            name,
            Registration {
                graph,
                schedule,
                gate,
                task,
            },
        );
        Ok(())
    }

    /// Start a run of a registered pipeline now, under the overlap policy
    pub fn trigger(&self, name: &str) -> Result<Dispatch, ScheduleError> {
        self.ensure_running()?;
        let dispatcher = {
            let registrations = self.registrations();
            let registration = registrations
                .get(name)
                .ok_or_else(|| ScheduleError::UnknownPipeline(name.to_string()))?;
            self.dispatcher(registration.graph.clone(), registration.gate.clone())
        };
        info!(pipeline = %name, "Manual trigger");
        Ok(dispatcher.dispatch())
    }

    /// Stop firing a pipeline; a run already in progress is left alone
    pub fn unregister(&self, name: &str) -> Result<(), ScheduleError> {
        let registration = self
            .registrations()
            .remove(name)
            .ok_or_else(|| ScheduleError::UnknownPipeline(name.to_string()))?;
        registration.task.abort();
        info!(pipeline = %name, "Unregistered schedule");
        Ok(())
    }

    /// Next fire time of a registered pipeline
    pub fn next_fire(&self, name: &str) -> Option<DateTime<Utc>> {
        self.registrations()
            .get(name)
            .and_then(|r| r.schedule.next_after(Utc::now()))
    }

    /// Names of registered pipelines, sorted
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registrations().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop all timers and cancel every active run.
    ///
    /// A scheduler is single-use: afterwards `register` and `trigger`
    /// return [`ScheduleError::ShutDown`].
    pub fn shutdown(&self) {
        self.cancel_tx.send_replace(true);
        for (name, registration) in self.registrations().drain() {
            debug!(pipeline = %name, "Stopping schedule");
            registration.task.abort();
        }
    }
}

impl<R> Drop for Scheduler<R> {
    fn drop(&mut self) {
        let registrations = self
            .registrations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for registration in registrations.values() {
            registration.task.abort();
        }
    }
}

async fn timer_loop<R: CommandRunner + 'static>(dispatcher: Dispatcher<R>, schedule: CompiledSchedule) {
    let name = dispatcher.graph.name().to_string();
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        // Never fire the same instant twice if the timer woke a little early
        let from = match last_fire {
            Some(last) if last > now => last,
            _ => now,
        };
        let Some(next) = schedule.next_after(from) else {
            warn!(pipeline = %name, "Schedule has no future fire times, stopping timer");
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        debug!(pipeline = %name, next = %next, "Waiting for next fire time");
        tokio::time::sleep(wait).await;
        last_fire = Some(next);

        info!(pipeline = %name, fire_time = %next, "Schedule fired");
        if let Dispatch::Started(handle) = dispatcher.dispatch() {
            let name = name.clone();
            tokio::spawn(async move {
                match handle.await {
                    Ok(report) => {
                        debug!(pipeline = %name, state = ?report.state, "Scheduled run finished")
                    }
                    Err(e) => error!(pipeline = %name, error = %e, "Scheduled run task did not complete"),
                }
            });
        }
    }
}
