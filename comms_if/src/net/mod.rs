//! # Network Module
//!
//! This module provides the publish/subscribe transport used to talk to the vehicle, along with
//! the networking abstractions over ZMQ it is built on.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod bus;
mod zmq_bus;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, AtomicUsize}, atomic::Ordering}, thread};
use log::{debug, warn};
use serde::{Serialize, Deserialize};
use zmq::{Socket, Context, SocketType, SocketEvent};

// Export zmq
pub use zmq;

pub use bus::{Handler, LocalBus, Transport, TransportError, TransportExt};
pub use zmq_bus::ZmqBus;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| MonitoredSocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Count of monitors created, gives each monitor a unique inproc endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

/// Receive timeout of the monitor socket, bounds how long dropping a socket takes.
const MONITOR_RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters of the cockpit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Endpoint the outbound (PUB) socket connects to, e.g. `"tcp://192.168.2.2:5550"`
    pub pub_endpoint: String,

    /// Endpoint the inbound (SUB) socket connects to
    pub sub_endpoint: String,

    /// Time the receive thread waits for a message before checking for shutdown.
    ///
    /// Units: milliseconds
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: i32,
}

/// A connecting zmq socket whose connection state is tracked.
///
/// A monitor socket is attached to the socket and serviced by a background thread which keeps
/// [`MonitoredSocket::connected`] up to date. The thread stops when the socket is dropped.
pub struct MonitoredSocket {
    socket: Socket,

    monitor_thread: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    connected: Arc<AtomicBool>
}

/// Options set on a monitored socket before it connects.
///
/// Each field is the zmq socket option of the same name, see
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt). Times are in milliseconds.
pub struct SocketOptions {
    /// `ZMQ_LINGER`
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`
    pub reconnect_ivl: i32,

    /// `ZMQ_CONNECT_TIMEOUT`
    pub connect_timeout: i32,

    /// `ZMQ_RCVTIMEO`, -1 blocks forever
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`, 0 fails immediately if the message can't be queued
    pub send_timeout: i32,

    /// `ZMQ_HEARTBEAT_IVL`
    pub heartbeat_ivl: i32,

    /// `ZMQ_HEARTBEAT_TIMEOUT`
    pub heartbeat_timeout: i32,

    /// `ZMQ_HEARTBEAT_TTL`
    pub heartbeat_ttl: i32
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),

    #[error("Could not spawn the socket's background thread: {0}")]
    ThreadSpawnError(std::io::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a socket of the given type and connect it to `endpoint`.
    ///
    /// Connection happens in the background, this function does not wait for the peer.
    pub fn connect(
        ctx: &Context,
        socket_type: SocketType,
        options: &SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // Each monitor needs its own inproc endpoint
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );

        socket.monitor(
            &monitor_endpoint,
            (SocketEvent::CONNECTED as u16 | SocketEvent::DISCONNECTED as u16) as i32
        ).map_err(MonitoredSocketError::MonitoringEnableError)?;

        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        set_sockopts!(monitor, (set_rcvtimeo, MONITOR_RECV_TIMEOUT_MS));
        monitor.connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        options.apply(&socket)?;

        socket.connect(endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));

        let monitor_thread = {
            let shutdown = shutdown.clone();
            let connected = connected.clone();
            let name = endpoint.to_string();

            thread::Builder::new()
                .name(format!("monitor_{}", name))
                .spawn(move || monitor_socket(monitor, name, shutdown, connected))
                .map_err(MonitoredSocketError::ThreadSpawnError)?
        };

        Ok(Self {
            socket,
            monitor_thread: Some(monitor_thread),
            shutdown,
            connected
        })
    }

    /// Return true if the socket currently has a connected peer.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // Bounded by the monitor's receive timeout
        if let Some(jh) = self.monitor_thread.take() {
            jh.join().ok();
        }
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_connect_timeout, self.connect_timeout),
            (set_heartbeat_ivl, self.heartbeat_ivl),
            (set_heartbeat_timeout, self.heartbeat_timeout),
            (set_heartbeat_ttl, self.heartbeat_ttl),
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout)
        );

        Ok(())
    }
}

impl Default for SocketOptions {
    /// The zmq defaults, see http://api.zeromq.org/4-2:zmq-setsockopt
    fn default() -> Self {
        Self {
            connect_timeout: 0,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
            heartbeat_ttl: 0,
            linger: 30_000,
            reconnect_ivl: 100,
            recv_timeout: -1,
            send_timeout: 0
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_recv_timeout_ms() -> i32 {
    100
}

/// Read the next event from a monitor socket.
///
/// Events are two frames, the event number and value followed by the peer address. Only the
/// event number is kept.
fn read_event(monitor: &Socket) -> Result<Option<SocketEvent>, zmq::Error> {
    let msg = monitor.recv_msg(0)?;

    if monitor.get_rcvmore()? {
        monitor.recv_msg(0)?;
    }

    match (msg.get(0), msg.get(1)) {
        (Some(&lo), Some(&hi)) => Ok(Some(SocketEvent::from_raw(u16::from_ne_bytes([lo, hi])))),
        _ => Ok(None)
    }
}

fn monitor_socket(
    monitor: Socket,
    endpoint: String,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>
) {
    while !shutdown.load(Ordering::Relaxed) {
        match read_event(&monitor) {
            Ok(Some(SocketEvent::CONNECTED)) => {
                debug!("Connected to {}", endpoint);
                connected.store(true, Ordering::Relaxed);
            },
            Ok(Some(SocketEvent::DISCONNECTED)) => {
                debug!("Disconnected from {}", endpoint);
                connected.store(false, Ordering::Relaxed);
            },
            Ok(_) | Err(zmq::Error::EAGAIN) => (),
            Err(e) => {
                warn!("Stopped monitoring {}: {}", endpoint, e);
                break
            }
        }
    }
}
