//! Main cockpit executable entry point.
//!
//! # Architecture
//!
//! The cockpit is made of independent components sharing a single transport to the vehicle:
//!
//!     - Control command generator: publishes the operator's control targets at a fixed rate
//!     - Recording manager: starts and stops the vehicle's video recording
//!     - Vehicle link: provisions the vehicle and drives its light, stabilisation and overlay
//!     - Telemetry mirror: keeps the vehicle's housekeeping telemetry
//!
//! The components report their changes as `CockpitEvent`s, which are logged on a dedicated
//! thread. The operator drives the components from the console.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod console;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use std::{sync::{Arc, Mutex}, thread, time::Duration};
use color_eyre::{Report, eyre::{WrapErr, eyre}};

// Internal
use cockpit_lib::{
    control::CtrlGen,
    event::EventSink,
    link::{LinkWatch, LINK_POLL_PERIOD_MS},
    params::CockpitExecParams,
    record::RecordingMgr,
    telemetry::TelemetryMirror,
    vehicle::VehicleLink
};
use comms_if::net::{Transport, ZmqBus};
use console::Cockpit;
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    timer::PeriodicTimer
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "cockpit_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Trident Cockpit Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: CockpitExecParams = util::params::load(
        "cockpit_exec.toml"
    ).wrap_err("Could not load cockpit exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let zmq_bus = Arc::new(
        ZmqBus::new(&zmq_ctx, &params.net)
            .wrap_err("Failed to initialise the transport")?
    );
    let bus: Arc<dyn Transport> = zmq_bus.clone();

    info!(
        "Publishing to {}, subscribed to {}",
        params.net.pub_endpoint, params.net.sub_endpoint
    );

    // ---- INITIALISE COMPONENTS ----

    info!("Initialising components...");

    let (events, event_rx) = EventSink::channel();

    let ctrl = CtrlGen::new(params.ctrl.clone(), bus.clone(), events.clone())
        .wrap_err("Failed to initialise the control generator")?;

    let recording = Arc::new(RecordingMgr::new(bus.clone(), events.clone()));
    recording.attach();

    let vehicle = Arc::new(VehicleLink::new(params.prefs, bus.clone(), events.clone()));
    vehicle.attach();

    let telemetry = Arc::new(TelemetryMirror::new(bus.clone(), events));
    telemetry.attach();

    // The event thread ends once every component, and so every sender, has been dropped
    let event_thread = thread::Builder::new()
        .name("event_log".into())
        .spawn(move || {
            for event in event_rx {
                info!("{}", event);
            }
        })
        .wrap_err("Failed to start the event thread")?;

    ctrl.enable().wrap_err("Failed to enable the control generator")?;

    info!("Component initialisation complete, waiting for the vehicle's beacon\n");

    // ---- CONSOLE ----

    let cockpit = Arc::new(Cockpit {
        ctrl,
        recording,
        vehicle,
        telemetry,
        link: Mutex::new(LinkWatch::default())
    });

    // Each loss of the link ends a connection cycle
    let mut link_timer = {
        let cockpit = cockpit.clone();
        PeriodicTimer::start(
            "link_watch",
            Duration::from_millis(LINK_POLL_PERIOD_MS),
            move || cockpit.poll_link(zmq_bus.is_connected())
        ).wrap_err("Failed to start the link watch")?
    };

    let console_result = console::run(&cockpit, &session.file_path("console_history.txt"));

    // ---- SHUTDOWN ----

    info!("Shutting down");

    link_timer.stop();
    cockpit.ctrl.disable();
    cockpit.recording.detach();
    cockpit.vehicle.detach();
    cockpit.telemetry.detach();
    drop(cockpit);

    event_thread.join()
        .map_err(|_| eyre!("The event thread panicked"))?;

    console_result.wrap_err("Console error")?;

    info!("End of execution");

    Ok(())
}
