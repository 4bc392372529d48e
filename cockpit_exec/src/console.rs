//! # Operator console
//!
//! Line based stand-in for the cockpit's keyboard and buttons. Each line is parsed as a
//! [`ConsoleCmd`] and executed against the cockpit's components.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{path::Path, sync::{Arc, Mutex, PoisonError}};
use log::{info, warn};
use rustyline::{DefaultEditor, error::ReadlineError};
use structopt::StructOpt;

use cockpit_lib::{
    control::{CtrlGen, Key, KeyEvent, KeyTransition, Modifiers},
    link::{LinkChange, LinkWatch},
    record::{RecordingMgr, ToggleOutcome},
    telemetry::{self, TelemetryMirror},
    vehicle::VehicleLink
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "Trident $ ";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The cockpit's components, as driven by the console.
pub struct Cockpit {
    pub ctrl: CtrlGen,
    pub recording: Arc<RecordingMgr>,
    pub vehicle: Arc<VehicleLink>,
    pub telemetry: Arc<TelemetryMirror>,
    pub link: Mutex<LinkWatch>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command entered by the operator.
#[derive(Debug, StructOpt)]
#[structopt(name = "cockpit")]
pub enum ConsoleCmd {
    /// Press or release a control key.
    #[structopt(name = "key")]
    Key {
        /// Either "down" or "up"
        #[structopt(parse(try_from_str = parse_transition))]
        transition: KeyTransition,

        /// One of "up", "down", "left", "right" (the arrow keys) or a single character
        #[structopt(parse(try_from_str = parse_key))]
        key: Key,

        /// Hold shift (full lever)
        #[structopt(long)]
        shift: bool,

        /// Hold control (half lever)
        #[structopt(long)]
        ctrl: bool,

        /// Hold option (quarter lever)
        #[structopt(long)]
        opt: bool,
    },

    /// Start or stop recording.
    #[structopt(name = "record")]
    Record,

    /// Step the motor speed.
    #[structopt(name = "speed")]
    Speed,

    /// Toggle the forward light.
    #[structopt(name = "light")]
    Light,

    /// Toggle attitude stabilisation.
    #[structopt(name = "stabilise")]
    Stabilise,

    /// Toggle the video telemetry overlay.
    #[structopt(name = "overlay")]
    Overlay,

    /// Enable the control generator.
    #[structopt(name = "enable")]
    Enable,

    /// Disable the control generator.
    #[structopt(name = "disable")]
    Disable,

    /// Forget the vehicle and wait for its next beacon.
    #[structopt(name = "reset")]
    Reset,

    /// Show the state of the cockpit.
    #[structopt(name = "status")]
    Status,

    /// Exit the cockpit.
    #[structopt(name = "quit")]
    Quit,
}

/// What the console should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Cockpit {
    /// Apply a reading of the transport's connection state.
    ///
    /// Losing the link ends the connection cycle: control is disabled and the vehicle has to
    /// announce itself again. Control is enabled again once the link is back.
    pub fn poll_link(&self, connected: bool) {
        let change = self.link.lock().unwrap_or_else(PoisonError::into_inner).update(connected);

        match change {
            Some(LinkChange::Disconnected) => self.reset_vehicle(),
            Some(LinkChange::Connected) => {
                if let Err(e) = self.ctrl.enable() {
                    warn!("{}", e);
                }
            },
            None => ()
        }
    }

    /// Disable control and wait for a new vehicle beacon.
    pub fn reset_vehicle(&self) {
        self.ctrl.disable();
        self.vehicle.reset();
    }

    pub fn link_connected(&self) -> bool {
        self.link.lock().unwrap_or_else(PoisonError::into_inner).is_connected()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run the console until the operator quits or closes the input.
pub fn run(cockpit: &Cockpit, history_path: &Path) -> Result<(), ReadlineError> {
    let mut rl = DefaultEditor::new()?;
    if rl.load_history(history_path).is_err() {
        info!("No console history found");
    }

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e)
        };

        rl.add_history_entry(line.as_str())?;

        let cmd = match parse(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg);
                continue
            }
        };

        if execute(cockpit, cmd) == Flow::Quit {
            break
        }
    }

    if let Err(e) = rl.save_history(history_path) {
        warn!("Could not save the console history: {}", e);
    }

    Ok(())
}

/// Parse a console line, returning `None` for a blank line.
///
/// On error the returned message is the one to show the operator, which includes help output.
pub fn parse(line: &str) -> Result<Option<ConsoleCmd>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None)
    }

    ConsoleCmd::from_iter_safe(std::iter::once("cockpit").chain(words))
        .map(Some)
        .map_err(|e| e.message)
}

/// Execute a single command.
pub fn execute(cockpit: &Cockpit, cmd: ConsoleCmd) -> Flow {
    match cmd {
        ConsoleCmd::Key { transition, key, shift, ctrl, opt } => {
            let event = KeyEvent {
                key,
                modifiers: Modifiers { shift, control: ctrl, option: opt },
                transition
            };

            if !cockpit.ctrl.process_key(&event) {
                println!("Key {:?} not handled", key);
            }
        },
        ConsoleCmd::Record => match cockpit.recording.toggle() {
            Ok(ToggleOutcome::StartRequested(id)) => println!("Starting recording {}", id),
            Ok(ToggleOutcome::StopRequested(id)) => println!("Stopping recording {}", id),
            Ok(ToggleOutcome::NotReady(s)) => println!("Recording is {}, try again later", s),
            Err(e) => warn!("{}", e)
        },
        ConsoleCmd::Speed => {
            match cockpit.ctrl.step_motor_speed() {
                Some(s) => println!("Motor speed {}", s),
                None => println!("Motors disengaged")
            }
        },
        ConsoleCmd::Light => report(cockpit.vehicle.toggle_light()),
        ConsoleCmd::Stabilise => report(cockpit.vehicle.toggle_stabilise()),
        ConsoleCmd::Overlay => report(cockpit.vehicle.toggle_overlay()),
        ConsoleCmd::Enable => {
            if let Err(e) = cockpit.ctrl.enable() {
                warn!("{}", e);
            }
        },
        ConsoleCmd::Disable => cockpit.ctrl.disable(),
        ConsoleCmd::Reset => cockpit.reset_vehicle(),
        ConsoleCmd::Status => println!("{}", status(cockpit)),
        ConsoleCmd::Quit => return Flow::Quit
    }

    Flow::Continue
}

/// Multi-line summary of the cockpit's state.
pub fn status(cockpit: &Cockpit) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "Link:        {}",
        if cockpit.link_connected() { "connected" } else { "disconnected" }
    ));

    match cockpit.vehicle.context() {
        Some(ctx) => lines.push(format!("Vehicle:     {} ({})", ctx.vehicle_id, ctx.address)),
        None => lines.push("Vehicle:     waiting for beacon".to_string())
    }

    let sp = cockpit.ctrl.levers().setpoint();
    lines.push(format!(
        "Control:     {} | pitch {:+.2} yaw {:+.2} thrust {:+.2}",
        if cockpit.ctrl.is_enabled() { "enabled" } else { "disabled" },
        sp.pitch, sp.yaw, sp.thrust
    ));
    lines.push(format!(
        "Motor speed: {}",
        cockpit.ctrl.motor_speed().map(|s| s.to_string()).unwrap_or_else(|| "-".into())
    ));

    let rec = cockpit.recording.snapshot();
    lines.push(format!(
        "Recording:   {}{}",
        rec.state,
        rec.elapsed_s.map(|s| format!(" {}", telemetry::format_duration(s))).unwrap_or_default()
    ));

    let prefs = cockpit.vehicle.preferences();
    lines.push(format!(
        "Light: {}, stabilise: {}, overlay: {}",
        on_off(cockpit.vehicle.light_on()), on_off(prefs.stabilise), on_off(prefs.video_overlay)
    ));

    let tm = cockpit.telemetry.latest();
    lines.push(format!(
        "Depth: {} m, water: {} C, battery: {}, remaining: {}",
        or_dash(tm.depth_m.map(telemetry::format_depth)),
        or_dash(tm.water_temp_c.map(telemetry::format_temperature)),
        or_dash(tm.battery_time_mins.map(telemetry::format_battery_time)),
        or_dash(tm.remaining_rec_time_s.map(telemetry::format_remaining_time))
    ));

    lines.join("\n")
}

fn report(result: Result<(), cockpit_lib::vehicle::VehicleLinkError>) {
    if let Err(e) = result {
        warn!("{}", e);
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn or_dash(s: Option<String>) -> String {
    s.unwrap_or_else(|| "-".into())
}

fn parse_transition(s: &str) -> Result<KeyTransition, String> {
    match s {
        "down" => Ok(KeyTransition::Down),
        "up" => Ok(KeyTransition::Up),
        _ => Err(format!("Expected \"down\" or \"up\", found {:?}", s))
    }
}

fn parse_key(s: &str) -> Result<Key, String> {
    match s {
        "up" => Ok(Key::UpArrow),
        "down" => Ok(Key::DownArrow),
        "left" => Ok(Key::LeftArrow),
        "right" => Ok(Key::RightArrow),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Key::Char(c)),
                _ => Err(format!("Unknown key {:?}", s))
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::net::{LocalBus, Transport};
    use cockpit_lib::{
        control::{MotorSpeed, Params},
        event::EventSink,
        record::RecordingState,
        vehicle::Preferences
    };

    fn cockpit() -> Cockpit {
        let bus: Arc<dyn Transport> = Arc::new(LocalBus::new());
        let events = EventSink::discard();

        let recording = Arc::new(RecordingMgr::new(bus.clone(), events.clone()));
        recording.attach();
        let vehicle = Arc::new(VehicleLink::new(Preferences::default(), bus.clone(), events.clone()));
        vehicle.attach();
        let telemetry = Arc::new(TelemetryMirror::new(bus.clone(), events.clone()));
        telemetry.attach();

        Cockpit {
            ctrl: CtrlGen::new(Params::default(), bus, events).unwrap(),
            recording,
            vehicle,
            telemetry,
            link: Mutex::new(LinkWatch::default())
        }
    }

    #[test]
    fn test_parse() {
        match parse("key down up --shift").unwrap().unwrap() {
            ConsoleCmd::Key { transition, key, shift, ctrl, opt } => {
                assert_eq!(transition, KeyTransition::Down);
                assert_eq!(key, Key::UpArrow);
                assert!(shift && !ctrl && !opt);
            },
            c => panic!("Unexpected command {:?}", c)
        }

        match parse("key up W").unwrap().unwrap() {
            ConsoleCmd::Key { key, .. } => assert_eq!(key, Key::Char('W')),
            c => panic!("Unexpected command {:?}", c)
        }

        assert!(parse("   ").unwrap().is_none());
        assert!(matches!(parse("record").unwrap(), Some(ConsoleCmd::Record)));
        assert!(parse("key sideways up").is_err());
        assert!(parse("key down upper").is_err());
        assert!(parse("launch").is_err());
    }

    #[test]
    fn test_execute() {
        let c = cockpit();

        assert_eq!(execute(&c, parse("key down left --ctrl").unwrap().unwrap()), Flow::Continue);
        assert_eq!(c.ctrl.levers().left, 0.5);

        // Not a control key, nothing changes
        execute(&c, parse("key down x").unwrap().unwrap());
        assert_eq!(c.ctrl.levers().left, 0.5);

        execute(&c, ConsoleCmd::Speed);
        assert_eq!(c.ctrl.motor_speed(), Some(MotorSpeed::First));

        execute(&c, ConsoleCmd::Record);
        assert_eq!(c.recording.state(), RecordingState::PendingStart);

        execute(&c, ConsoleCmd::Disable);
        assert_eq!(c.ctrl.motor_speed(), None);

        assert!(status(&c).contains("starting"));
        assert!(status(&c).contains("disconnected"));
        assert_eq!(execute(&c, ConsoleCmd::Quit), Flow::Quit);
    }

    #[test]
    fn test_link_cycle() {
        use comms_if::{net::TransportExt, trident::{Beacon, Topic}};

        let bus = Arc::new(LocalBus::new());
        let transport: Arc<dyn Transport> = bus.clone();
        let events = EventSink::discard();

        let vehicle = Arc::new(VehicleLink::new(Preferences::default(), transport.clone(), events.clone()));
        vehicle.attach();

        let c = Cockpit {
            ctrl: CtrlGen::new(Params::default(), transport.clone(), events.clone()).unwrap(),
            recording: Arc::new(RecordingMgr::new(transport.clone(), events.clone())),
            vehicle,
            telemetry: Arc::new(TelemetryMirror::new(transport, events)),
            link: Mutex::new(LinkWatch::default())
        };

        let beacon = |id: &str| Beacon { uuid: id.into(), address: "192.168.2.2".into() };

        c.poll_link(true);
        assert!(c.ctrl.is_enabled());
        bus.publish_msg(Topic::Beacon, &beacon("trident-1")).unwrap();
        assert_eq!(c.vehicle.context().unwrap().vehicle_id, "trident-1");
        c.ctrl.step_motor_speed();

        // Link lost, the cycle ends
        c.poll_link(false);
        assert!(!c.ctrl.is_enabled());
        assert_eq!(c.ctrl.motor_speed(), None);
        assert!(c.vehicle.context().is_none());

        // Next cycle provisions again
        c.poll_link(true);
        assert!(c.ctrl.is_enabled());
        bus.publish_msg(Topic::Beacon, &beacon("trident-2")).unwrap();
        assert_eq!(c.vehicle.context().unwrap().vehicle_id, "trident-2");

        c.ctrl.disable();
    }
}
