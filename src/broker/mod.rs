//! Report Broker
//!
//! Generic publish/subscribe hub used to fan pipeline reports out to live
//! streaming clients.
//!
//! ## Delivery
//!
//! - One producer calls [`Broker::publish`], which never waits
//! - A dispatch task copies each value into every subscriber's queue
//! - Each queue is bounded; a subscriber that stops reading loses its
//!   oldest values, never anyone else's
//! - Subscribers see values in publish order, starting from the first value
//!   dispatched after they joined

mod hub;
mod queue;

pub use hub::{Broker, BrokerConfig, BrokerError};
pub use queue::{SubscriberId, Subscription, TryRecvError};
