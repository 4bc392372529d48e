//! # Publish/subscribe transport
//!
//! The [`Transport`] trait is the only view of the network the cockpit's components have. Two
//! implementations are provided, [`super::ZmqBus`] for talking to a real vehicle and [`LocalBus`]
//! for in-process loopback.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::HashMap, sync::{Arc, Mutex}};
use log::{trace, warn};
use serde::{Serialize, de::DeserializeOwned};

use crate::trident::Topic;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Callback invoked with the JSON payload of every message received on a topic.
pub type Handler = Arc<dyn Fn(&str) + Send + Sync>;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A publish/subscribe bus over named topics.
///
/// Publishing is fire-and-forget, the only guarantee is best effort in-order delivery per topic.
pub trait Transport: Send + Sync {
    /// Publish a JSON payload on the given topic.
    fn publish(&self, topic: Topic, payload: &str) -> Result<(), TransportError>;

    /// Register the handler for a topic, replacing any previous handler on that topic.
    fn subscribe(&self, topic: Topic, handler: Handler);

    /// Remove the handler for a topic. Does nothing if the topic has no handler.
    fn unsubscribe(&self, topic: Topic);
}

/// Typed helpers available on every [`Transport`].
pub trait TransportExt: Transport {
    /// Serialise and publish a message.
    fn publish_msg<T: Serialize>(&self, topic: Topic, msg: &T) -> Result<(), TransportError> {
        let payload = serde_json::to_string(msg)
            .map_err(TransportError::SerializationError)?;

        self.publish(topic, &payload)
    }

    /// Subscribe to a topic, deserialising each message before passing it to the handler.
    ///
    /// Messages which cannot be deserialised are logged and dropped.
    fn subscribe_msg<T, F>(&self, topic: Topic, handler: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static
    {
        self.subscribe(topic, Arc::new(move |payload: &str| {
            match serde_json::from_str::<T>(payload) {
                Ok(msg) => handler(msg),
                Err(e) => warn!("Dropping malformed message on {}: {}", topic, e)
            }
        }));
    }
}

impl<B: Transport + ?Sized> TransportExt for B {}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// In-process transport.
///
/// Published messages are delivered synchronously, in the publisher's thread, to the handler
/// subscribed to the topic. Messages on topics without a handler are discarded.
#[derive(Default)]
pub struct LocalBus {
    handlers: Mutex<HashMap<Topic, Handler>>
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("The transport's internal lock is poisoned")]
    LockPoisoned,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return true if a handler is registered for the topic.
    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.handlers.lock()
            .map(|h| h.contains_key(&topic))
            .unwrap_or(false)
    }
}

impl Transport for LocalBus {
    fn publish(&self, topic: Topic, payload: &str) -> Result<(), TransportError> {
        // Take a copy of the handler so that it's free to use the bus itself
        let handler = self.handlers.lock()
            .map_err(|_| TransportError::LockPoisoned)?
            .get(&topic)
            .cloned();

        match handler {
            Some(h) => h(payload),
            None => trace!("No subscriber on {}, message discarded", topic)
        }

        Ok(())
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

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
