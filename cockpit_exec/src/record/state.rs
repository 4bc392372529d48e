//! Recording session state machine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use comms_if::{
    net::{Transport, TransportExt},
    trident::{
        Topic, VideoSession, VideoSessionCommand, VideoSessionResponse, VideoSessionState
    }
};

use super::{RecordingError, RecordingState, RejectReason, ToggleOutcome};
use crate::event::{CockpitEvent, EventSink};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Recording session manager.
///
/// At most one session is tracked at a time. Start requests are only sent from idle and stop
/// requests only while recording, a request in flight must be acknowledged (or superseded by the
/// vehicle's current session report) before another can be sent.
pub struct RecordingMgr {
    inner: Mutex<Inner>,

    transport: Arc<dyn Transport>,

    events: EventSink,
}

struct Inner {
    phase: Phase,

    /// Last session duration reported by the vehicle while recording.
    elapsed_s: Option<u32>,
}

/// Snapshot of the manager's state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSnapshot {
    pub state: RecordingState,
    pub session_id: Option<Uuid>,
    pub elapsed_s: Option<u32>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    PendingStart(Uuid),
    Recording(Uuid),
    PendingStop(Uuid),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RecordingMgr {
    pub fn new(transport: Arc<dyn Transport>, events: EventSink) -> Self {
        Self {
            inner: Mutex::new(Inner { phase: Phase::Idle, elapsed_s: None }),
            transport,
            events
        }
    }

    /// Subscribe to the vehicle's acknowledgements and current session reports.
    pub fn attach(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::VidSessionRep, move |cmd: VideoSessionCommand| {
            if let Some(mgr) = weak.upgrade() {
                mgr.handle_ack(&cmd);
            }
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::VidSessionCurrent, move |session: VideoSession| {
            if let Some(mgr) = weak.upgrade() {
                mgr.handle_current(&session);
            }
        });
    }

    pub fn detach(&self) {
        self.transport.unsubscribe(Topic::VidSessionRep);
        self.transport.unsubscribe(Topic::VidSessionCurrent);
    }

    /// Start recording if idle, stop recording if recording.
    ///
    /// If the request cannot be sent the state is left as it was before the call.
    pub fn toggle(&self) -> Result<ToggleOutcome, RecordingError> {
        let (cmd, outcome, previous) = {
            let mut inner = self.lock();
            let previous = inner.phase;

            match previous {
                Phase::Idle => {
                    let id = Uuid::new_v4();
                    let metadata = serde_json::json!({
                        "start_ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
                    });

                    self.transition(&mut inner, Phase::PendingStart(id));

                    (
                        request(id.to_string(), metadata.to_string(), VideoSessionState::Recording),
                        ToggleOutcome::StartRequested(id),
                        previous
                    )
                },
                Phase::Recording(id) => {
                    self.transition(&mut inner, Phase::PendingStop(id));

                    (
                        request(id.to_string(), String::new(), VideoSessionState::Stopped),
                        ToggleOutcome::StopRequested(id),
                        previous
                    )
                },
                Phase::PendingStart(_) | Phase::PendingStop(_) => {
                    debug!("Recording toggle ignored, request already pending");
                    return Ok(ToggleOutcome::NotReady(previous.state()))
                }
            }
        };

        if let Err(e) = self.transport.publish_msg(Topic::VidSessionReq, &cmd) {
            let mut inner = self.lock();

            // Only roll back if nothing has moved the state on in the meantime
            if inner.phase == expected_after(&outcome) {
                self.transition(&mut inner, previous);
            }

            return Err(RecordingError::PublishError(e))
        }

        Ok(outcome)
    }

    /// Handle an acknowledgement of a recording request.
    pub fn handle_ack(&self, cmd: &VideoSessionCommand) {
        if cmd.response == VideoSessionResponse::Unknown {
            debug!("Ignoring recording ack with unknown response");
            return
        }

        let mut inner = self.lock();

        let tracked = match inner.phase {
            Phase::PendingStart(id) | Phase::PendingStop(id) => id,
            _ => {
                debug!(
                    "Dropping recording ack for {:?}, no request pending",
                    cmd.session_id
                );
                return
            }
        };

        // An empty or mismatched ID belongs to some other request
        if parse_id(&cmd.session_id) != Some(tracked) {
            debug!(
                "Dropping stale recording ack for {:?}, tracking {}",
                cmd.session_id, tracked
            );
            return
        }

        let reject = RejectReason::from_response(cmd.response);

        match (inner.phase, reject) {
            (Phase::PendingStart(id), None) => {
                self.transition(&mut inner, Phase::Recording(id));
            },
            (Phase::PendingStart(_), Some(reason)) => {
                warn!("Recording start rejected ({:?}): {}", reason, cmd.reason);
                self.transition(&mut inner, Phase::Idle);

                if reason.is_user_facing() {
                    self.events.emit(CockpitEvent::RecordingRejected {
                        reason,
                        message: reason.message().into()
                    });
                }
            },
            (Phase::PendingStop(_), reason) => {
                if let Some(r) = reason {
                    warn!("Recording stop rejected ({:?}): {}", r, cmd.reason);
                }
                self.transition(&mut inner, Phase::Idle);
            },
            _ => ()
        }
    }

    /// Handle the vehicle's report of its current recording session.
    pub fn handle_current(&self, session: &VideoSession) {
        let mut inner = self.lock();

        match session.state {
            VideoSessionState::Recording => match inner.phase {
                Phase::Idle => {
                    let id = match parse_id(&session.session_id) {
                        Some(id) => id,
                        None => {
                            warn!(
                                "Vehicle reports recording with invalid session ID {:?}",
                                session.session_id
                            );
                            return
                        }
                    };

                    info!("Adopting recording session {} reported by the vehicle", id);
                    inner.elapsed_s = Some(session.total_duration_s);
                    self.transition(&mut inner, Phase::Recording(id));
                },
                Phase::Recording(_) => {
                    if inner.elapsed_s != Some(session.total_duration_s) {
                        inner.elapsed_s = Some(session.total_duration_s);
                        self.events.emit(CockpitEvent::RecordingStateChanged {
                            state: RecordingState::Recording,
                            elapsed_s: inner.elapsed_s
                        });
                    }
                },
                // Left to the acknowledgement
                Phase::PendingStart(_) | Phase::PendingStop(_) => ()
            },
            VideoSessionState::Stopped => {
                if inner.phase != Phase::Idle {
                    info!("Vehicle reports recording stopped");
                    self.transition(&mut inner, Phase::Idle);
                }
            },
            VideoSessionState::Unknown => ()
        }
    }

    pub fn state(&self) -> RecordingState {
        self.lock().phase.state()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.lock().phase.session_id()
    }

    pub fn snapshot(&self) -> RecordingSnapshot {
        let inner = self.lock();

        RecordingSnapshot {
            state: inner.phase.state(),
            session_id: inner.phase.session_id(),
            elapsed_s: inner.elapsed_s
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to a new phase and notify the change.
    ///
    /// Must be called with the lock held so that events are emitted in transition order.
    fn transition(&self, inner: &mut Inner, next: Phase) {
        if inner.phase == next {
            return
        }

        info!("Recording {:?} -> {:?}", inner.phase, next);
        inner.phase = next;

        if !matches!(next, Phase::Recording(_)) {
            inner.elapsed_s = None;
        }

        self.events.emit(CockpitEvent::RecordingStateChanged {
            state: next.state(),
            elapsed_s: inner.elapsed_s
        });
    }
}

impl Phase {
    fn state(&self) -> RecordingState {
        match self {
            Phase::Idle => RecordingState::Idle,
            Phase::PendingStart(_) => RecordingState::PendingStart,
            Phase::Recording(_) => RecordingState::Recording,
            Phase::PendingStop(_) => RecordingState::PendingStop,
        }
    }

    fn session_id(&self) -> Option<Uuid> {
        match self {
            Phase::Idle => None,
            Phase::PendingStart(id) | Phase::Recording(id) | Phase::PendingStop(id) => Some(*id)
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn request(session_id: String, metadata: String, state: VideoSessionState) -> VideoSessionCommand {
    VideoSessionCommand {
        session_id,
        metadata,
        request: state,
        response: VideoSessionResponse::Unknown,
        reason: String::new()
    }
}

fn expected_after(outcome: &ToggleOutcome) -> Phase {
    match outcome {
        ToggleOutcome::StartRequested(id) => Phase::PendingStart(*id),
        ToggleOutcome::StopRequested(id) => Phase::PendingStop(*id),
        ToggleOutcome::NotReady(_) => Phase::Idle
    }
}

fn parse_id(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s).ok()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::Receiver;
    use comms_if::net::{LocalBus, TransportError};

    struct Harness {
        bus: Arc<LocalBus>,
        mgr: Arc<RecordingMgr>,
        requests: Arc<Mutex<Vec<VideoSessionCommand>>>,
        events: Receiver<CockpitEvent>,
    }

    fn setup() -> Harness {
        let bus = Arc::new(LocalBus::new());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let r = requests.clone();
        bus.subscribe_msg(Topic::VidSessionReq, move |cmd: VideoSessionCommand| {
            r.lock().unwrap().push(cmd);
        });

        let (sink, events) = EventSink::channel();
        let mgr = Arc::new(RecordingMgr::new(bus.clone(), sink));
        mgr.attach();

        Harness { bus, mgr, requests, events }
    }

    fn ack(h: &Harness, session_id: &str, response: VideoSessionResponse) {
        let cmd = VideoSessionCommand {
            session_id: session_id.into(),
            metadata: String::new(),
            request: VideoSessionState::Unknown,
            response,
            reason: String::new()
        };
        h.bus.publish_msg(Topic::VidSessionRep, &cmd).unwrap();
    }

    fn current(h: &Harness, session_id: &str, state: VideoSessionState, total_duration_s: u32) {
        let session = VideoSession { session_id: session_id.into(), state, total_duration_s };
        h.bus.publish_msg(Topic::VidSessionCurrent, &session).unwrap();
    }

    fn start(h: &Harness) -> Uuid {
        match h.mgr.toggle().unwrap() {
            ToggleOutcome::StartRequested(id) => id,
            o => panic!("Expected a start request, got {:?}", o)
        }
    }

    #[test]
    fn test_start_accepted() {
        let h = setup();
        let id = start(&h);

        {
            let reqs = h.requests.lock().unwrap();
            assert_eq!(reqs.len(), 1);
            assert_eq!(reqs[0].session_id, id.to_string());
            assert_eq!(reqs[0].request, VideoSessionState::Recording);

            let meta: serde_json::Value = serde_json::from_str(&reqs[0].metadata).unwrap();
            let ts = meta["start_ts"].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        }
        assert_eq!(h.mgr.state(), RecordingState::PendingStart);

        // Toggling while pending sends nothing
        assert_eq!(
            h.mgr.toggle().unwrap(),
            ToggleOutcome::NotReady(RecordingState::PendingStart)
        );
        assert_eq!(h.requests.lock().unwrap().len(), 1);

        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        assert_eq!(h.mgr.state(), RecordingState::Recording);
        assert_eq!(h.mgr.session_id(), Some(id));

        let states: Vec<_> = h.events.try_iter().collect();
        assert_eq!(states, vec![
            CockpitEvent::RecordingStateChanged {
                state: RecordingState::PendingStart, elapsed_s: None
            },
            CockpitEvent::RecordingStateChanged {
                state: RecordingState::Recording, elapsed_s: None
            },
        ]);
    }

    #[test]
    fn test_start_rejected_in_progress() {
        let h = setup();
        let id = start(&h);

        ack(&h, &id.to_string(), VideoSessionResponse::RejectedSessionInProgress);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
        assert_eq!(h.mgr.session_id(), None);

        // A repeat of the rejection is stale
        ack(&h, &id.to_string(), VideoSessionResponse::RejectedSessionInProgress);

        let rejections: Vec<_> = h.events.try_iter()
            .filter_map(|e| match e {
                CockpitEvent::RecordingRejected { reason, message } => Some((reason, message)),
                _ => None
            })
            .collect();
        assert_eq!(rejections, vec![(RejectReason::InProgress, "Already in progress".into())]);
    }

    #[test]
    fn test_generic_rejection_not_surfaced() {
        let h = setup();
        let id = start(&h);

        ack(&h, &id.to_string(), VideoSessionResponse::RejectedGeneric);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
        assert!(h.events.try_iter()
            .all(|e| !matches!(e, CockpitEvent::RecordingRejected { .. })));
    }

    #[test]
    fn test_stop() {
        let h = setup();
        let id = start(&h);
        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);

        assert_eq!(h.mgr.toggle().unwrap(), ToggleOutcome::StopRequested(id));
        assert_eq!(h.mgr.state(), RecordingState::PendingStop);
        {
            let reqs = h.requests.lock().unwrap();
            assert_eq!(reqs[1].session_id, id.to_string());
            assert_eq!(reqs[1].request, VideoSessionState::Stopped);
            assert!(reqs[1].metadata.is_empty());
        }

        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
        assert_eq!(h.mgr.session_id(), None);
    }

    #[test]
    fn test_stale_acks_dropped() {
        let h = setup();

        // Nothing pending
        ack(&h, &Uuid::new_v4().to_string(), VideoSessionResponse::Accepted);
        assert_eq!(h.mgr.state(), RecordingState::Idle);

        let id = start(&h);

        ack(&h, &Uuid::new_v4().to_string(), VideoSessionResponse::Accepted);
        ack(&h, "not-a-uuid", VideoSessionResponse::Accepted);
        ack(&h, "", VideoSessionResponse::Accepted);
        ack(&h, &id.to_string(), VideoSessionResponse::Unknown);
        assert_eq!(h.mgr.state(), RecordingState::PendingStart);

        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        assert_eq!(h.mgr.state(), RecordingState::Recording);

        // Duplicate accept while recording
        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        assert_eq!(h.mgr.state(), RecordingState::Recording);
        assert_eq!(h.mgr.session_id(), Some(id));
    }

    #[test]
    fn test_empty_id_ack_ignored_while_starting() {
        let h = setup();

        // Stop request sent when the vehicle is provisioned, carrying no session ID
        let mut stop = request(String::new(), String::new(), VideoSessionState::Stopped);
        h.bus.publish_msg(Topic::VidSessionReq, &stop).unwrap();

        let id = start(&h);

        stop.response = VideoSessionResponse::Accepted;
        h.bus.publish_msg(Topic::VidSessionRep, &stop).unwrap();
        assert_eq!(h.mgr.state(), RecordingState::PendingStart);
        assert_eq!(h.mgr.session_id(), Some(id));

        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        assert_eq!(h.mgr.state(), RecordingState::Recording);
    }

    #[test]
    fn test_stop_rejected() {
        let h = setup();
        let id = start(&h);
        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        h.mgr.toggle().unwrap();

        ack(&h, &id.to_string(), VideoSessionResponse::RejectedInvalidSession);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
        assert_eq!(h.mgr.session_id(), None);
        assert!(h.events.try_iter()
            .all(|e| !matches!(e, CockpitEvent::RecordingRejected { .. })));
    }

    #[test]
    fn test_reports_while_pending() {
        let h = setup();
        let id = start(&h);

        // A recording report while starting is left to the acknowledgement
        current(&h, &Uuid::new_v4().to_string(), VideoSessionState::Recording, 3);
        assert_eq!(h.mgr.snapshot(), RecordingSnapshot {
            state: RecordingState::PendingStart,
            session_id: Some(id),
            elapsed_s: None
        });

        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        h.mgr.toggle().unwrap();
        assert_eq!(h.mgr.state(), RecordingState::PendingStop);
        let _ = h.events.try_iter().count();

        // A stopped report while stopping completes the stop
        current(&h, &id.to_string(), VideoSessionState::Stopped, 0);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
        assert_eq!(h.events.try_iter().collect::<Vec<_>>(), vec![
            CockpitEvent::RecordingStateChanged { state: RecordingState::Idle, elapsed_s: None }
        ]);

        // The late acknowledgement is stale
        ack(&h, &id.to_string(), VideoSessionResponse::Accepted);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
        assert_eq!(h.events.try_iter().count(), 0);
    }

    #[test]
    fn test_adopt_reported_session() {
        let h = setup();
        let id = Uuid::new_v4();

        current(&h, &id.to_string(), VideoSessionState::Recording, 12);
        assert_eq!(h.mgr.snapshot(), RecordingSnapshot {
            state: RecordingState::Recording,
            session_id: Some(id),
            elapsed_s: Some(12)
        });

        current(&h, &id.to_string(), VideoSessionState::Recording, 13);
        current(&h, &id.to_string(), VideoSessionState::Recording, 13);

        let events: Vec<_> = h.events.try_iter().collect();
        assert_eq!(events, vec![
            CockpitEvent::RecordingStateChanged {
                state: RecordingState::Recording, elapsed_s: Some(12)
            },
            CockpitEvent::RecordingStateChanged {
                state: RecordingState::Recording, elapsed_s: Some(13)
            },
        ]);

        // Invalid IDs are not adopted
        let h = setup();
        current(&h, "garbage", VideoSessionState::Recording, 1);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
    }

    #[test]
    fn test_reported_stop_supersedes() {
        let h = setup();
        start(&h);

        current(&h, "", VideoSessionState::Stopped, 0);
        assert_eq!(h.mgr.state(), RecordingState::Idle);
        assert_eq!(h.mgr.session_id(), None);
        assert_eq!(h.events.try_iter().count(), 2);

        // Repeated stop reports while idle are silent
        current(&h, "", VideoSessionState::Stopped, 0);
        current(&h, "", VideoSessionState::Stopped, 0);
        assert_eq!(h.events.try_iter().count(), 0);
    }

    #[test]
    fn test_detach() {
        let h = setup();
        h.mgr.detach();
        assert!(!h.bus.is_subscribed(Topic::VidSessionRep));
        assert!(!h.bus.is_subscribed(Topic::VidSessionCurrent));
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn publish(&self, _: Topic, _: &str) -> Result<(), TransportError> {
            Err(TransportError::LockPoisoned)
        }
        fn subscribe(&self, _: Topic, _: comms_if::net::Handler) {}
        fn unsubscribe(&self, _: Topic) {}
    }

    #[test]
    fn test_failed_publish_rolls_back() {
        let mgr = RecordingMgr::new(Arc::new(FailingTransport), EventSink::discard());

        assert!(matches!(mgr.toggle(), Err(RecordingError::PublishError(_))));
        assert_eq!(mgr.state(), RecordingState::Idle);
        assert_eq!(mgr.session_id(), None);
    }
}
