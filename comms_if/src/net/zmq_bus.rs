//! # ZMQ transport
//!
//! Publishes on a PUB socket and receives on a SUB socket, each message being a single frame of
//! the form `"<topic> <json>"`. Subscribers filter by the topic prefix, as in the ZMQ PUB/SUB
//! pattern.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    thread
};
use log::{debug, trace, warn};

use super::{
    Handler, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, Transport,
    TransportError, zmq
};
use crate::trident::Topic;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Transport over a pair of ZMQ PUB/SUB sockets.
pub struct ZmqBus {
    pub_socket: Mutex<MonitoredSocket>,

    handlers: Arc<Mutex<HashMap<Topic, Handler>>>,

    shutdown: Arc<AtomicBool>,

    recv_thread: Option<thread::JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqBus {
    /// Create the bus and start the receive thread.
    ///
    /// This function will not block until the sockets connect.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, MonitoredSocketError> {
        let pub_options = SocketOptions {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };
        let sub_options = SocketOptions {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.recv_timeout_ms,
            ..Default::default()
        };

        let pub_socket = MonitoredSocket::connect(
            ctx,
            zmq::PUB,
            &pub_options,
            &params.pub_endpoint
        )?;
        let sub_socket = MonitoredSocket::connect(
            ctx,
            zmq::SUB,
            &sub_options,
            &params.sub_endpoint
        )?;

        // Receive everything, dispatch filters on the handler table
        sub_socket.set_subscribe(b"")
            .map_err(|e| MonitoredSocketError::SocketOptionError("set_subscribe".into(), e))?;

        let handlers = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handlers_clone = handlers.clone();
        let shutdown_clone = shutdown.clone();
        let recv_thread = thread::Builder::new()
            .name("zmq_bus_recv".into())
            .spawn(move || recv_loop(sub_socket, handlers_clone, shutdown_clone))
            .map_err(MonitoredSocketError::ThreadSpawnError)?;

        debug!(
            "ZmqBus publishing to {} and subscribed to {}",
            params.pub_endpoint, params.sub_endpoint
        );

        Ok(Self {
            pub_socket: Mutex::new(pub_socket),
            handlers,
            shutdown,
            recv_thread: Some(recv_thread)
        })
    }

    /// Return true if the outbound socket is connected.
    pub fn is_connected(&self) -> bool {
        self.pub_socket.lock()
            .map(|s| s.connected())
            .unwrap_or(false)
    }
}

impl Transport for ZmqBus {
    fn publish(&self, topic: Topic, payload: &str) -> Result<(), TransportError> {
        let frame = format!("{} {}", topic.name(), payload);

        self.pub_socket.lock()
            .map_err(|_| TransportError::LockPoisoned)?
            .send(frame.as_bytes(), 0)
            .map_err(TransportError::SendError)
    }

    fn subscribe(&self, topic: Topic, handler: Handler) {
        match self.handlers.lock() {
            Ok(mut h) => { h.insert(topic, handler); },
            Err(_) => warn!("Could not subscribe to {}, handler table poisoned", topic)
        }
    }

    fn unsubscribe(&self, topic: Topic) {
        if let Ok(mut h) = self.handlers.lock() {
            h.remove(&topic);
        }
    }
}

impl Drop for ZmqBus {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.recv_thread.take() {
            jh.join().ok();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Split a received frame into its topic and payload.
fn split_frame(frame: &str) -> Option<(Topic, &str)> {
    let (name, payload) = match frame.find(' ') {
        Some(i) => (&frame[..i], &frame[i + 1..]),
        None => (frame, "")
    };

    Topic::from_name(name).map(|t| (t, payload))
}

fn recv_loop(
    socket: MonitoredSocket,
    handlers: Arc<Mutex<HashMap<Topic, Handler>>>,
    shutdown: Arc<AtomicBool>
) {
    while !shutdown.load(Ordering::Relaxed) {
        let frame = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Received a message which was not valid UTF-8");
                continue
            },
            // No message in timeout
            Err(zmq::Error::EAGAIN) => continue,
            // Context is being terminated
            Err(zmq::Error::ETERM) => break,
            Err(e) => {
                warn!("Could not receive a message: {}", e);
                continue
            }
        };

        let (topic, payload) = match split_frame(&frame) {
            Some(tp) => tp,
            None => {
                trace!("Ignoring message on unknown topic: {:.40}", frame);
                continue
            }
        };

        // Release the table before calling so handlers may (un)subscribe
        let handler = match handlers.lock() {
            Ok(h) => h.get(&topic).cloned(),
            Err(_) => {
                warn!("Handler table poisoned, receive thread exiting");
                break
            }
        };

        if let Some(h) = handler {
            h(payload);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
