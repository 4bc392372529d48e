//! # Telemetry mirror
//!
//! Keeps the latest value of the vehicle's housekeeping telemetry and formats it for display.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, PoisonError, Weak};
use log::trace;
use serde::Serialize;

use comms_if::{
    net::{Transport, TransportExt},
    trident::{
        BATTERY_CHARGING_SENTINEL_MINS, Depth, FuelgaugeHealth, RecordingStats, Topic,
        WaterTemperature
    }
};

use crate::event::{CockpitEvent, EventSink};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Latest telemetry received from the vehicle, `None` until the first report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Telemetry {
    /// Units: meters
    pub depth_m: Option<f32>,

    /// Units: degrees celsius
    pub water_temp_c: Option<f64>,

    /// Units: minutes
    pub battery_time_mins: Option<i32>,

    /// Units: seconds
    pub remaining_rec_time_s: Option<u32>,
}

pub struct TelemetryMirror {
    latest: Mutex<Telemetry>,

    transport: Arc<dyn Transport>,

    events: EventSink,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A single telemetry report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TelemetryUpdate {
    Depth(f32),
    WaterTemperature(f64),
    BatteryTime(i32),
    RemainingRecordingTime(u32),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TelemetryMirror {
    pub fn new(transport: Arc<dyn Transport>, events: EventSink) -> Self {
        Self {
            latest: Mutex::new(Telemetry::default()),
            transport,
            events
        }
    }

    /// Subscribe to the telemetry topics.
    pub fn attach(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::Depth, move |m: Depth| {
            update(&weak, TelemetryUpdate::Depth(m.depth))
        });

        let weak = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::TempWater, move |m: WaterTemperature| {
            update(&weak, TelemetryUpdate::WaterTemperature(m.temperature))
        });

        let weak = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::FuelgaugeHealth, move |m: FuelgaugeHealth| {
            update(&weak, TelemetryUpdate::BatteryTime(m.average_time_to_empty_mins))
        });

        let weak = Arc::downgrade(self);
        self.transport.subscribe_msg(Topic::RecordingStats, move |m: RecordingStats| {
            update(&weak, TelemetryUpdate::RemainingRecordingTime(m.est_remaining_rec_time_s))
        });
    }

    pub fn detach(&self) {
        for topic in [Topic::Depth, Topic::TempWater, Topic::FuelgaugeHealth, Topic::RecordingStats]
            .iter()
        {
            self.transport.unsubscribe(*topic);
        }
    }

    /// Record a telemetry report and notify it.
    pub fn apply(&self, update: TelemetryUpdate) {
        {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            match update {
                TelemetryUpdate::Depth(v) => latest.depth_m = Some(v),
                TelemetryUpdate::WaterTemperature(v) => latest.water_temp_c = Some(v),
                TelemetryUpdate::BatteryTime(v) => latest.battery_time_mins = Some(v),
                TelemetryUpdate::RemainingRecordingTime(v) => latest.remaining_rec_time_s = Some(v),
            }
        }

        trace!("Telemetry: {}", update);
        self.events.emit(CockpitEvent::Telemetry(update));
    }

    pub fn latest(&self) -> Telemetry {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Display for TelemetryUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryUpdate::Depth(v) => write!(f, "depth {} m", format_depth(*v)),
            TelemetryUpdate::WaterTemperature(v) => write!(f, "water {} C", format_temperature(*v)),
            TelemetryUpdate::BatteryTime(v) => write!(f, "battery {}", format_battery_time(*v)),
            TelemetryUpdate::RemainingRecordingTime(v) =>
                write!(f, "remaining {}", format_remaining_time(*v)),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

pub fn format_depth(depth_m: f32) -> String {
    format!("{:.1}", depth_m)
}

pub fn format_temperature(temp_c: f64) -> String {
    format!("{:.1}", temp_c)
}

/// Format the battery time to empty as `"<h>h<m>m"`, omitting zero parts.
pub fn format_battery_time(mins: i32) -> String {
    if mins == BATTERY_CHARGING_SENTINEL_MINS {
        return "charging".into()
    }

    hours_minutes(mins.max(0) as u32, "")
}

/// Format the remaining recording time, given in seconds, as `"<h>h <m>m"`.
pub fn format_remaining_time(secs: u32) -> String {
    hours_minutes(secs / 60, " ")
}

/// Format a recording duration as `"HH:MM:SS"`.
pub fn format_duration(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn update(mirror: &Weak<TelemetryMirror>, update: TelemetryUpdate) {
    if let Some(m) = mirror.upgrade() {
        m.apply(update);
    }
}

fn hours_minutes(mins: u32, sep: &str) -> String {
    let (h, m) = (mins / 60, mins % 60);

    match (h, m) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}{}m", h, sep, m)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
