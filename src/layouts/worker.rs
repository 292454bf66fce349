use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use instant::Instant;
use log::{debug, trace};

use super::{
    ForceSimulation, Hierarchical, LayoutAlgorithm, LayoutOptions, LayoutResult, LayoutSnapshot,
    NodePosition, RequestId,
};
use crate::errors::LayoutError;

const EVENT_CAPACITY: usize = 64;

/// Message from the layout worker, tagged with the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutMessage {
    /// Intermediate state. Only the force layout reports positions along the way.
    Progress {
        request: RequestId,
        fraction: f32,
        positions: Vec<NodePosition>,
    },
    Finished {
        request: RequestId,
        result: LayoutResult,
    },
    Failed {
        request: RequestId,
        error: LayoutError,
    },
}

impl LayoutMessage {
    pub fn request(&self) -> RequestId {
        match self {
            Self::Progress { request, .. }
            | Self::Finished { request, .. }
            | Self::Failed { request, .. } => *request,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

struct Job {
    request: RequestId,
    algorithm: Result<LayoutAlgorithm, LayoutError>,
    snapshot: LayoutSnapshot,
    options: LayoutOptions,
    cancel: Arc<AtomicBool>,
}

enum Command {
    Run(Box<Job>),
    Shutdown,
}

/// Runs layouts on a dedicated thread.
///
/// Snapshots are copied in and results copied out; nothing is shared with the
/// interactive thread except the cancel flag of the running job.
pub struct LayoutEngine {
    commands: Sender<Command>,
    events: Receiver<LayoutMessage>,
    handle: Option<JoinHandle<()>>,

    next_id: u64,
    latest: Option<RequestId>,
    cancel: Option<Arc<AtomicBool>>,
    /// Messages produced on this side, e.g. when the worker is gone.
    local: Vec<LayoutMessage>,
}

impl LayoutEngine {
    pub fn spawn() -> Result<Self, LayoutError> {
        let (commands, command_rx) = channel::unbounded();
        let (event_tx, events) = channel::bounded(EVENT_CAPACITY);

        let handle = thread::Builder::new()
            .name("layout-worker".to_string())
            .spawn(move || run_worker(&command_rx, &event_tx))
            .map_err(|err| {
                debug!("failed to spawn layout worker: {err}");
                LayoutError::WorkerUnavailable
            })?;

        Ok(Self {
            commands,
            events,
            handle: Some(handle),
            next_id: 0,
            latest: None,
            cancel: None,
            local: Vec::new(),
        })
    }

    /// Starts a layout. Any request still running is cancelled and its messages dropped.
    pub fn request(
        &mut self,
        algorithm: LayoutAlgorithm,
        snapshot: LayoutSnapshot,
        options: LayoutOptions,
    ) -> RequestId {
        self.submit(Ok(algorithm), snapshot, options)
    }

    /// Like [`Self::request`], with the algorithm given by name (`"force"`, `"dag"`,
    /// `"hierarchical"`). Unknown names produce a [`LayoutMessage::Failed`].
    pub fn request_named(
        &mut self,
        name: &str,
        snapshot: LayoutSnapshot,
        options: LayoutOptions,
    ) -> RequestId {
        self.submit(name.parse(), snapshot, options)
    }

    fn submit(
        &mut self,
        algorithm: Result<LayoutAlgorithm, LayoutError>,
        snapshot: LayoutSnapshot,
        options: LayoutOptions,
    ) -> RequestId {
        self.cancel();

        self.next_id += 1;
        let request = RequestId(self.next_id);
        let cancel = Arc::new(AtomicBool::new(false));
        self.latest = Some(request);
        self.cancel = Some(Arc::clone(&cancel));

        let job = Job {
            request,
            algorithm,
            snapshot,
            options,
            cancel,
        };
        if self.commands.send(Command::Run(Box::new(job))).is_err() {
            self.local.push(LayoutMessage::Failed {
                request,
                error: LayoutError::WorkerUnavailable,
            });
        }
        request
    }

    /// Cancels the running request, if any. Its remaining messages are discarded.
    pub fn cancel(&mut self) {
        if let Some(flag) = self.cancel.take() {
            flag.store(true, Ordering::Relaxed);
        }
        self.latest = None;
    }

    /// The request whose messages [`Self::poll`] still yields.
    pub fn latest(&self) -> Option<RequestId> {
        self.latest
    }

    pub fn is_running(&self) -> bool {
        self.latest.is_some()
    }

    /// Drains pending messages without blocking. Messages of superseded requests are
    /// dropped; the rest come in the order the worker sent them.
    pub fn poll(&mut self) -> Vec<LayoutMessage> {
        let mut res = std::mem::take(&mut self.local);
        while let Ok(msg) = self.events.try_recv() {
            res.push(msg);
        }
        self.accept(res)
    }

    /// Blocks until the latest request completes or `timeout` elapses, returning every
    /// message of that request received meanwhile.
    pub fn wait(&mut self, timeout: Duration) -> Vec<LayoutMessage> {
        let deadline = Instant::now() + timeout;
        let mut res = self.poll();
        while self.is_running() {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(left) {
                Ok(msg) => res.extend(self.accept(vec![msg])),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        res
    }

    fn accept(&mut self, msgs: Vec<LayoutMessage>) -> Vec<LayoutMessage> {
        let mut res = Vec::with_capacity(msgs.len());
        for msg in msgs {
            if Some(msg.request()) != self.latest {
                trace!("dropping message of superseded request {:?}", msg.request());
                continue;
            }
            if msg.is_terminal() {
                self.latest = None;
                self.cancel = None;
            }
            res.push(msg);
        }
        res
    }
}

impl Drop for LayoutEngine {
    fn drop(&mut self) {
        self.cancel();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            // keep draining so a worker blocked on a full channel can exit
            while !handle.is_finished() {
                let _ = self.events.recv_timeout(Duration::from_millis(5));
            }
            let _ = handle.join();
        }
    }
}

fn run_worker(commands: &Receiver<Command>, events: &Sender<LayoutMessage>) {
    while let Ok(cmd) = commands.recv() {
        match cmd {
            Command::Run(job) => {
                if job.cancel.load(Ordering::Relaxed) {
                    trace!("skipping cancelled request {:?}", job.request);
                    continue;
                }
                let request = job.request;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_job(&job, events)))
                    .unwrap_or_else(|payload| Err(LayoutError::Panicked(panic_reason(&*payload))));
                let msg = match outcome {
                    Ok(Some(result)) => LayoutMessage::Finished { request, result },
                    Ok(None) => continue,
                    Err(error) => {
                        debug!("layout request {request:?} failed: {error}");
                        LayoutMessage::Failed { request, error }
                    }
                };
                if events.send(msg).is_err() {
                    return;
                }
            }
            Command::Shutdown => return,
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs one job. `Ok(None)` means it was cancelled.
fn run_job(job: &Job, events: &Sender<LayoutMessage>) -> Result<Option<LayoutResult>, LayoutError> {
    let algorithm = job.algorithm.clone()?;
    job.options.validate()?;
    let started = Instant::now();
    debug!(
        "layout request {:?}: {algorithm} on {} nodes, {} edges",
        job.request,
        job.snapshot.nodes.len(),
        job.snapshot.edges.len()
    );

    let positions = match algorithm {
        LayoutAlgorithm::Force => {
            let mut sim =
                ForceSimulation::new(&job.snapshot, &job.options.settings, job.options.viewport)?;
            let request = job.request;
            sim.run(&job.cancel, &mut |fraction, positions| {
                // progress is advisory, drop it rather than stall the simulation
                let _ = events.try_send(LayoutMessage::Progress {
                    request,
                    fraction,
                    positions,
                });
            })
        }
        LayoutAlgorithm::Hierarchical => {
            let layout = Hierarchical::new(&job.options.settings, job.options.orientation);
            let positions = layout.layout(&job.snapshot, job.options.viewport.center())?;
            (!job.cancel.load(Ordering::Relaxed)).then_some(positions)
        }
    };

    match positions {
        Some(positions) => {
            debug!(
                "layout request {:?} finished in {:?}",
                job.request,
                started.elapsed()
            );
            Ok(Some(LayoutResult {
                algorithm,
                positions,
            }))
        }
        None => {
            debug!("layout request {:?} cancelled", job.request);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use egui::{Pos2, Vec2};

    use super::*;
    use crate::{
        layouts::{LayoutEdge, LayoutNode},
        EdgeId, NodeId, SettingsSimulation,
    };

    const TIMEOUT: Duration = Duration::from_secs(20);

    fn snapshot(n: usize) -> LayoutSnapshot {
        LayoutSnapshot {
            nodes: (0..n)
                .map(|i| LayoutNode {
                    id: NodeId::from(format!("n{i}")),
                    location: None,
                    pinned: None,
                    size: Vec2::splat(10.0),
                })
                .collect(),
            edges: (1..n)
                .map(|i| LayoutEdge {
                    id: EdgeId::from(format!("e{i}")),
                    source: NodeId::from(format!("n{}", i - 1)),
                    target: NodeId::from(format!("n{i}")),
                })
                .collect(),
        }
    }

    #[test]
    fn force_reports_progress_then_finishes() {
        let mut engine = LayoutEngine::spawn().unwrap();
        let id = engine.request(LayoutAlgorithm::Force, snapshot(30), LayoutOptions::default());
        let msgs = engine.wait(TIMEOUT);

        let last = msgs.last().unwrap();
        let LayoutMessage::Finished { request, result } = last else {
            panic!("expected Finished, got {last:?}");
        };
        assert_eq!(*request, id);
        assert_eq!(result.positions.len(), 30);
        assert!(result.positions.iter().all(|p| p.pinned == Some(p.location)));
        assert!(msgs[..msgs.len() - 1]
            .iter()
            .all(|m| matches!(m, LayoutMessage::Progress { .. })));
        assert!(!engine.is_running());
    }

    #[test]
    fn new_request_supersedes_running_one() {
        let mut engine = LayoutEngine::spawn().unwrap();
        let slow = LayoutOptions {
            settings: SettingsSimulation {
                alpha_decay: 0.0,
                cooldown_ticks: 1_000_000,
                ..Default::default()
            },
            ..Default::default()
        };
        let first = engine.request(LayoutAlgorithm::Force, snapshot(200), slow);
        let second = engine.request(
            LayoutAlgorithm::Hierarchical,
            snapshot(5),
            LayoutOptions::default(),
        );
        assert_ne!(first, second);

        let msgs = engine.wait(TIMEOUT);
        assert!(msgs.iter().all(|m| m.request() == second));
        assert!(matches!(
            msgs.last(),
            Some(LayoutMessage::Finished { result, .. }) if result.algorithm == LayoutAlgorithm::Hierarchical
        ));
    }

    #[test]
    fn unknown_algorithm_fails_as_message() {
        let mut engine = LayoutEngine::spawn().unwrap();
        let id = engine.request_named("radial", snapshot(3), LayoutOptions::default());
        let msgs = engine.wait(TIMEOUT);
        assert_eq!(
            msgs,
            vec![LayoutMessage::Failed {
                request: id,
                error: LayoutError::UnknownAlgorithm("radial".to_string()),
            }]
        );
    }

    #[test]
    fn malformed_snapshot_fails() {
        let mut engine = LayoutEngine::spawn().unwrap();
        let mut snap = snapshot(3);
        snap.nodes[0].location = Some(Pos2::new(f32::INFINITY, 0.0));
        engine.request_named("dag", snap, LayoutOptions::default());
        let msgs = engine.wait(TIMEOUT);
        assert!(matches!(
            msgs.as_slice(),
            [LayoutMessage::Failed {
                error: LayoutError::NonFinitePosition(_),
                ..
            }]
        ));
    }

    #[test]
    fn cancel_drops_everything() {
        let mut engine = LayoutEngine::spawn().unwrap();
        engine.request(LayoutAlgorithm::Force, snapshot(50), LayoutOptions::default());
        engine.cancel();
        assert!(!engine.is_running());
        thread::sleep(Duration::from_millis(50));
        assert!(engine.poll().is_empty());
    }

    #[test]
    fn inverted_viewport_fails_and_worker_keeps_serving() {
        let mut engine = LayoutEngine::spawn().unwrap();
        let inverted = LayoutOptions {
            viewport: egui::Rect::from_min_max(Pos2::new(10.0, 10.0), Pos2::new(0.0, 0.0)),
            ..Default::default()
        };
        let bad = engine.request(LayoutAlgorithm::Force, snapshot(4), inverted);
        let msgs = engine.wait(TIMEOUT);
        assert!(matches!(
            msgs.as_slice(),
            [LayoutMessage::Failed {
                request,
                error: LayoutError::InvalidViewport(_),
            }] if *request == bad
        ));
        assert!(!engine.is_running());

        let good = engine.request(LayoutAlgorithm::Force, snapshot(4), LayoutOptions::default());
        let msgs = engine.wait(TIMEOUT);
        assert!(matches!(
            msgs.last(),
            Some(LayoutMessage::Finished { request, .. }) if *request == good
        ));
    }

    #[test]
    fn panic_reason_reads_str_and_string_payloads() {
        let from_str = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_reason(&*from_str), "boom");
        let code = 7;
        let from_string = panic::catch_unwind(|| panic!("code {code}")).unwrap_err();
        assert_eq!(panic_reason(&*from_string), "code 7");
        let other = panic::catch_unwind(|| std::panic::panic_any(3_u8)).unwrap_err();
        assert_eq!(panic_reason(&*other), "unknown panic");
    }
}
