//! # Vehicle link
//!
//! Provisions the vehicle when its beacon is first seen and handles the auxiliary controls (the
//! forward light, attitude stabilisation and the video telemetry overlay).
//!
//! The operator's preferences for stabilisation and overlay are given to the link explicitly and
//! kept up to date from the vehicle's current state reports.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use comms_if::{
    net::{Transport, TransportError, TransportExt},
    trident::{
        Beacon, ControllerId, ControllerState, ControllerStatus, LightPower, Topic,
        VideoSessionCommand, VideoSessionResponse, VideoSessionState
    }
};
use util::time;

use crate::event::{CockpitEvent, EventSink};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Identifier of the vehicle's forward light.
pub const FWD_LIGHT_ID: &str = "fwd";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Operator preferences applied to the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Whether the vehicle's attitude stabilisation should be enabled.
    #[serde(default)]
    pub stabilise: bool,

    /// Whether telemetry should be overlaid on the vehicle's video.
    #[serde(default)]
    pub video_overlay: bool,
}

/// Identity of the connected vehicle, established by its beacon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleContext {
    pub vehicle_id: String,
    pub address: String,
}

pub struct VehicleLink {
    state: Mutex<LinkState>,

    transport: Arc<dyn Transport>,

    events: EventSink,
}

struct LinkState {
    context: Option<VehicleContext>,

    prefs: Preferences,

    light_on: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VehicleLinkError {
    #[error("Could not send {0}: {1}")]
    PublishError(Topic, TransportError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleLink {
    pub fn new(prefs: Preferences, transport: Arc<dyn Transport>, events: EventSink) -> Self {
        Self {
            state: Mutex::new(LinkState { context: None, prefs, light_on: false }),
            transport,
            events
        }
    }

    /// Subscribe to the beacon and to the vehicle's current state reports.
    pub fn attach(self: &Arc<Self>) {
        self.subscribe_beacon();

        let weak = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::LightPowerCurrent, move |m: LightPower| {
            if let Some(link) = weak.upgrade() {
                link.handle_light_current(&m);
            }
        });

        let weak = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::ControllerStateCurrent, move |m: ControllerStatus| {
            if let Some(link) = weak.upgrade() {
                link.handle_controller_current(&m);
            }
        });

        let weak = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::VideoOverlayModeCurrent, move |m: String| {
            if let Some(link) = weak.upgrade() {
                link.handle_overlay_current(&m);
            }
        });
    }

    pub fn detach(&self) {
        for topic in [
            Topic::Beacon, Topic::LightPowerCurrent, Topic::ControllerStateCurrent,
            Topic::VideoOverlayModeCurrent
        ].iter() {
            self.transport.unsubscribe(*topic);
        }
    }

    /// Forget the current vehicle and wait for a new beacon.
    pub fn reset(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            state.context = None;
            state.light_on = false;
        }

        info!("Vehicle link reset, waiting for beacon");
        self.subscribe_beacon();
    }

    /// Handle a vehicle beacon, returning true if the vehicle was provisioned by it.
    ///
    /// Only the first beacon of a connection cycle provisions the vehicle. If provisioning fails
    /// the next beacon tries again.
    pub fn handle_beacon(&self, beacon: &Beacon) -> Result<bool, VehicleLinkError> {
        let context = VehicleContext {
            vehicle_id: beacon.uuid.clone(),
            address: beacon.address.clone()
        };

        let prefs = {
            let mut state = self.lock();
            if state.context.is_some() {
                return Ok(false)
            }
            state.context = Some(context.clone());
            state.prefs
        };

        info!("Provisioning vehicle {} ({})", context.vehicle_id, context.address);

        if let Err(e) = self.provision(&context, prefs) {
            self.lock().context = None;
            return Err(e)
        }

        self.transport.unsubscribe(Topic::Beacon);
        self.events.emit(CockpitEvent::VehicleProvisioned(context));

        Ok(true)
    }

    /// Switch the forward light on if it's off, off if it's on.
    pub fn toggle_light(&self) -> Result<(), VehicleLinkError> {
        let power = match self.lock().light_on {
            true => 0.0,
            false => 1.0
        };

        self.publish(Topic::LightPowerRequested, &LightPower { id: FWD_LIGHT_ID.into(), power })
    }

    /// Request the opposite of the current stabilisation preference.
    pub fn toggle_stabilise(&self) -> Result<(), VehicleLinkError> {
        let (vehicle_id, stabilise) = {
            let state = self.lock();
            (
                state.context.as_ref().map(|c| c.vehicle_id.clone()).unwrap_or_default(),
                state.prefs.stabilise
            )
        };

        self.publish(Topic::ControllerStateRequested, &controller_request(vehicle_id, !stabilise))
    }

    /// Request the opposite of the current overlay preference.
    pub fn toggle_overlay(&self) -> Result<(), VehicleLinkError> {
        let overlay = self.lock().prefs.video_overlay;
        self.publish(Topic::VideoOverlayModeCommand, &overlay_mode(!overlay))
    }

    pub fn handle_light_current(&self, light: &LightPower) {
        let on = light.power > 0.0;
        let mut state = self.lock();

        if state.light_on != on {
            state.light_on = on;
            debug!("Light {}", if on { "on" } else { "off" });
            self.events.emit(CockpitEvent::LightChanged(on));
        }
    }

    pub fn handle_controller_current(&self, status: &ControllerStatus) {
        if status.controller_id != ControllerId::Trident {
            return
        }

        let enabled = status.state == ControllerState::Enabled;
        let mut state = self.lock();

        if state.prefs.stabilise != enabled {
            state.prefs.stabilise = enabled;
            debug!("Stabilisation {}", if enabled { "enabled" } else { "disabled" });
            self.events.emit(CockpitEvent::StabiliseChanged(enabled));
        }
    }

    pub fn handle_overlay_current(&self, mode: &str) {
        let on = match mode {
            "on" => true,
            "off" => false,
            m => {
                warn!("Ignoring unknown video overlay mode {:?}", m);
                return
            }
        };

        let mut state = self.lock();

        if state.prefs.video_overlay != on {
            state.prefs.video_overlay = on;
            self.events.emit(CockpitEvent::OverlayChanged(on));
        }
    }

    pub fn context(&self) -> Option<VehicleContext> {
        self.lock().context.clone()
    }

    pub fn preferences(&self) -> Preferences {
        self.lock().prefs
    }

    pub fn light_on(&self) -> bool {
        self.lock().light_on
    }

    fn subscribe_beacon(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::Beacon, move |beacon: Beacon| {
            if let Some(link) = weak.upgrade() {
                if let Err(e) = link.handle_beacon(&beacon) {
                    warn!("Vehicle provisioning failed: {}", e);
                }
            }
        });
    }

    /// Bring a newly found vehicle into a known state.
    fn provision(&self, context: &VehicleContext, prefs: Preferences) -> Result<(), VehicleLinkError> {
        self.publish(Topic::Datetime, &time::unix_millis(Utc::now()).to_string())?;
        self.publish(Topic::VideoOverlayModeCommand, &overlay_mode(prefs.video_overlay))?;

        // Clear any session the vehicle may still be recording from a previous connection
        self.publish(Topic::VidSessionReq, &VideoSessionCommand {
            session_id: String::new(),
            metadata: String::new(),
            request: VideoSessionState::Stopped,
            response: VideoSessionResponse::Unknown,
            reason: String::new()
        })?;

        self.publish(Topic::LightPowerRequested, &LightPower { id: FWD_LIGHT_ID.into(), power: 0.0 })?;
        self.publish(
            Topic::ControllerStateRequested,
            &controller_request(context.vehicle_id.clone(), prefs.stabilise)
        )
    }

    fn publish<T: Serialize>(&self, topic: Topic, msg: &T) -> Result<(), VehicleLinkError> {
        self.transport.publish_msg(topic, msg)
            .map_err(|e| VehicleLinkError::PublishError(topic, e))
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn overlay_mode(on: bool) -> &'static str {
    match on {
        true => "on",
        false => "off"
    }
}

fn controller_request(vehicle_id: String, enable: bool) -> ControllerStatus {
    ControllerStatus {
        vehicle_id,
        controller_id: ControllerId::Trident,
        state: match enable {
            true => ControllerState::Enabled,
            false => ControllerState::Disabled
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::Receiver;
    use comms_if::net::LocalBus;

    /// Records every message published on the given topics, in order.
    fn record(bus: &LocalBus, topics: &[Topic]) -> Arc<Mutex<Vec<(Topic, String)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));

        for &topic in topics {
            let l = log.clone();
            bus.subscribe(topic, Arc::new(move |payload: &str| {
                l.lock().unwrap().push((topic, payload.to_string()));
            }));
        }

        log
    }

    fn setup(prefs: Preferences) -> (Arc<LocalBus>, Arc<VehicleLink>, Receiver<CockpitEvent>) {
        let bus = Arc::new(LocalBus::new());
        let (sink, rx) = EventSink::channel();
        let link = Arc::new(VehicleLink::new(prefs, bus.clone(), sink));
        link.attach();

        (bus, link, rx)
    }

    fn beacon(bus: &LocalBus, uuid: &str) {
        bus.publish_msg(Topic::Beacon, &Beacon { uuid: uuid.into(), address: "10.1.1.2".into() })
            .unwrap();
    }

    #[test]
    fn test_provisioning() {
        let (bus, link, rx) = setup(Preferences { stabilise: true, video_overlay: false });
        let sent = record(&bus, &[
            Topic::Datetime, Topic::VideoOverlayModeCommand, Topic::VidSessionReq,
            Topic::LightPowerRequested, Topic::ControllerStateRequested
        ]);

        beacon(&bus, "trident-1");

        let sent = sent.lock().unwrap().clone();
        let topics: Vec<_> = sent.iter().map(|(t, _)| *t).collect();
        assert_eq!(topics, vec![
            Topic::Datetime, Topic::VideoOverlayModeCommand, Topic::VidSessionReq,
            Topic::LightPowerRequested, Topic::ControllerStateRequested
        ]);

        let ms: String = serde_json::from_str(&sent[0].1).unwrap();
        assert!(ms.parse::<i64>().unwrap() > 0);
        assert_eq!(sent[1].1, "\"off\"");

        let stop: VideoSessionCommand = serde_json::from_str(&sent[2].1).unwrap();
        assert!(stop.session_id.is_empty());
        assert_eq!(stop.request, VideoSessionState::Stopped);

        let light: LightPower = serde_json::from_str(&sent[3].1).unwrap();
        assert_eq!((light.id.as_str(), light.power), ("fwd", 0.0));

        let ctrl: ControllerStatus = serde_json::from_str(&sent[4].1).unwrap();
        assert_eq!(ctrl.vehicle_id, "trident-1");
        assert_eq!(ctrl.state, ControllerState::Enabled);

        let ctx = link.context().unwrap();
        assert_eq!(ctx.vehicle_id, "trident-1");
        assert_eq!(ctx.address, "10.1.1.2");
        assert!(!bus.is_subscribed(Topic::Beacon));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![CockpitEvent::VehicleProvisioned(ctx)]);

        // Ignored until reset
        assert_eq!(link.handle_beacon(&Beacon { uuid: "other".into(), address: "".into() }).unwrap(), false);

        link.reset();
        assert!(link.context().is_none());
        beacon(&bus, "trident-2");
        assert_eq!(link.context().unwrap().vehicle_id, "trident-2");
    }

    #[test]
    fn test_toggles() {
        let (bus, link, rx) = setup(Preferences::default());
        let sent = record(&bus, &[
            Topic::LightPowerRequested, Topic::ControllerStateRequested,
            Topic::VideoOverlayModeCommand
        ]);

        link.toggle_light().unwrap();
        link.toggle_stabilise().unwrap();
        link.toggle_overlay().unwrap();

        {
            let sent = sent.lock().unwrap();
            let light: LightPower = serde_json::from_str(&sent[0].1).unwrap();
            assert_eq!(light.power, 1.0);

            let ctrl: ControllerStatus = serde_json::from_str(&sent[1].1).unwrap();
            assert_eq!(ctrl.state, ControllerState::Enabled);
            assert!(ctrl.vehicle_id.is_empty());

            assert_eq!(sent[2].1, "\"on\"");
        }

        // Nothing changes locally until the vehicle reports it
        assert!(!link.light_on());
        assert_eq!(link.preferences(), Preferences::default());

        bus.publish_msg(Topic::LightPowerCurrent, &LightPower { id: "fwd".into(), power: 1.0 })
            .unwrap();
        bus.publish_msg(Topic::LightPowerCurrent, &LightPower { id: "fwd".into(), power: 0.7 })
            .unwrap();
        bus.publish_msg(Topic::ControllerStateCurrent, &controller_request("t".into(), true))
            .unwrap();
        bus.publish_msg(Topic::ControllerStateCurrent, &ControllerStatus {
            vehicle_id: "t".into(),
            controller_id: ControllerId::Other,
            state: ControllerState::Disabled
        }).unwrap();
        bus.publish_msg(Topic::VideoOverlayModeCurrent, &"on").unwrap();
        bus.publish_msg(Topic::VideoOverlayModeCurrent, &"sideways").unwrap();

        assert!(link.light_on());
        assert_eq!(link.preferences(), Preferences { stabilise: true, video_overlay: true });
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![
            CockpitEvent::LightChanged(true),
            CockpitEvent::StabiliseChanged(true),
            CockpitEvent::OverlayChanged(true),
        ]);

        link.toggle_light().unwrap();
        let sent = sent.lock().unwrap();
        let light: LightPower = serde_json::from_str(&sent[3].1).unwrap();
        assert_eq!(light.power, 0.0);
    }
}
