//! Single owner of the control core.
//!
//! Clock ticks, operator commands and recommendation timers are all
//! serialised through one task, so no junction field is ever written from
//! two places at once. Callers talk to it through an [`EngineHandle`].

use chrono::Local;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::communication::messages::{Command, CommandOutcome, ControlEvent};
use crate::config::EngineConfig;
use crate::control_system::recommendation_engine::ScheduledReplacement;
use crate::control_system::traffic_control_system::TrafficControlSystem;
use crate::engine::clock::{Clock, Tick};
use crate::error::ControlError;
use crate::models::incident::{Incident, IncidentId};
use crate::models::junction::JunctionId;
use crate::shared_data::ControlSnapshot;

const COMMAND_QUEUE: usize = 64;
const EVENT_BUFFER: usize = 256;

enum Request {
    Execute {
        command: Command,
        reply: oneshot::Sender<Result<CommandOutcome, ControlError>>,
    },
    Shutdown,
}

/// Cheap to clone; every clone talks to the same owner task.
#[derive(Clone)]
pub struct EngineHandle {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<ControlSnapshot>,
    events: broadcast::Sender<ControlEvent>,
}

impl EngineHandle {
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, ControlError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Execute { command, reply })
            .await
            .map_err(|_| ControlError::EngineUnavailable)?;
        response.await.map_err(|_| ControlError::EngineUnavailable)?
    }

    /// For callers on plain threads (the message bus bridge). Must not be
    /// called from inside the async runtime.
    pub fn execute_blocking(&self, command: Command) -> Result<CommandOutcome, ControlError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .blocking_send(Request::Execute { command, reply })
            .map_err(|_| ControlError::EngineUnavailable)?;
        response
            .blocking_recv()
            .map_err(|_| ControlError::EngineUnavailable)?
    }

    pub async fn select_junction(&self, junction: JunctionId) -> Result<(), ControlError> {
        self.execute(Command::SelectJunction { junction }).await.map(drop)
    }

    pub async fn set_manual_override(&self, enabled: bool) -> Result<(), ControlError> {
        self.execute(Command::SetManualOverride { enabled }).await.map(drop)
    }

    pub async fn set_emergency_mode(&self, enabled: bool) -> Result<(), ControlError> {
        self.execute(Command::SetEmergencyMode { enabled }).await.map(drop)
    }

    pub async fn issue_phase_command(&self, junction: JunctionId, phase: &str) -> Result<(), ControlError> {
        self.execute(Command::IssuePhaseCommand {
            junction,
            phase: phase.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn trigger_emergency_preemption(&self, junction: JunctionId) -> Result<(), ControlError> {
        self.execute(Command::TriggerEmergencyPreemption { junction })
            .await
            .map(drop)
    }

    pub async fn accept_recommendation(&self) -> Result<CommandOutcome, ControlError> {
        self.execute(Command::AcceptRecommendation).await
    }

    pub async fn decline_recommendation(&self) -> Result<CommandOutcome, ControlError> {
        self.execute(Command::DeclineRecommendation).await
    }

    pub async fn resolve_incident(&self, incident: IncidentId, action: &str) -> Result<CommandOutcome, ControlError> {
        self.execute(Command::ResolveIncident {
            incident,
            action: action.to_string(),
        })
        .await
    }

    pub async fn report_incident(&self, incident: Incident) -> Result<(), ControlError> {
        self.execute(Command::ReportIncident {
            incident: Box::new(incident),
        })
        .await
        .map(drop)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ControlSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<ControlSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Stops the owner task. Pending recommendation timers are dropped
    /// without firing.
    pub async fn shutdown(&self) {
        let _ = self.requests.send(Request::Shutdown).await;
    }
}

pub struct ControlEngine {
    system: TrafficControlSystem,
    clock: Clock,
    requests: mpsc::Receiver<Request>,
    snapshots: watch::Sender<ControlSnapshot>,
    events: broadcast::Sender<ControlEvent>,
    timer_tx: mpsc::UnboundedSender<u64>,
    timer_rx: mpsc::UnboundedReceiver<u64>,
    pending_timer: Option<(u64, JoinHandle<()>)>,
}

impl ControlEngine {
    /// Spawns the owner task on the current runtime.
    pub fn spawn(system: TrafficControlSystem, config: &EngineConfig) -> (EngineHandle, JoinHandle<()>) {
        let (requests_tx, requests) = mpsc::channel(COMMAND_QUEUE);
        let (snapshots, snapshots_rx) = watch::channel(system.snapshot());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let engine = ControlEngine {
            system,
            clock: Clock::from_millis(config.phase_tick_ms, config.metric_tick_ms),
            requests,
            snapshots,
            events: events.clone(),
            timer_tx,
            timer_rx,
            pending_timer: None,
        };
        let handle = EngineHandle {
            requests: requests_tx,
            snapshots: snapshots_rx,
            events,
        };
        (handle, tokio::spawn(engine.run()))
    }

    async fn run(mut self) {
        log::info!(
            "Control engine started with {} junctions",
            self.system.registry().len()
        );
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request::Execute { command, reply }) => self.handle_command(command, reply),
                    Some(Request::Shutdown) | None => break,
                },
                tick = self.clock.next() => self.handle_tick(tick),
                Some(generation) = self.timer_rx.recv() => self.handle_timer(generation),
            }
        }

        if let Some((_, timer)) = self.pending_timer.take() {
            timer.abort();
        }
        self.system.cancel_pending_recommendation();
        log::info!("Control engine stopped after {} phase ticks", self.system.ticks());
    }

    fn handle_command(
        &mut self,
        command: Command,
        reply: oneshot::Sender<Result<CommandOutcome, ControlError>>,
    ) {
        let result = match self.system.apply(command, Local::now()) {
            Ok(applied) => {
                if let Some(scheduled) = applied.schedule {
                    self.arm_timer(scheduled);
                }
                self.publish(applied.events);
                Ok(applied.outcome)
            }
            Err(e) => {
                log::warn!("Command rejected: {}", e);
                Err(e)
            }
        };
        // The caller may have stopped waiting; the command still took effect.
        let _ = reply.send(result);
    }

    fn handle_tick(&mut self, tick: Tick) {
        match tick {
            Tick::Phase => {
                let transitions = self.system.on_phase_tick();
                self.publish(transitions.into_iter().map(ControlEvent::PhaseChanged).collect());
            }
            Tick::Metric => {
                self.system.on_metric_tick();
                self.publish(Vec::new());
            }
        }
    }

    fn handle_timer(&mut self, generation: u64) {
        if matches!(self.pending_timer, Some((armed, _)) if armed == generation) {
            self.pending_timer = None;
        }
        let events = self.system.install_recommendation(generation).into_iter().collect();
        self.publish(events);
    }

    // At most one timer is outstanding; a newer schedule cancels the older one.
    fn arm_timer(&mut self, scheduled: ScheduledReplacement) {
        if let Some((stale, timer)) = self.pending_timer.take() {
            log::debug!("Cancelling recommendation timer {}", stale);
            timer.abort();
        }
        let timer_tx = self.timer_tx.clone();
        let timer = tokio::spawn(async move {
            sleep(scheduled.delay).await;
            let _ = timer_tx.send(scheduled.generation);
        });
        self.pending_timer = Some((scheduled.generation, timer));
    }

    fn publish(&self, events: Vec<ControlEvent>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        self.snapshots.send_replace(self.system.snapshot());
    }
}
