//! Transport proxy between fetchers (publishers) and watchers (subscribers).
//!
//! Producers connect to the back-end endpoint and write one frame per line.
//! Consumers connect to the front-end endpoint, announce a subscription
//! prefix, and receive every frame starting with that prefix. The proxy never
//! looks past the prefix; what a frame means is up to [`wire`].

pub mod client;
pub mod endpoint;
pub mod proxy;
pub mod wire;

pub use client::{BrokerPublisher, BrokerSubscriber, LogSink, NotificationSink};
pub use endpoint::Endpoint;
pub use proxy::{ProxyHandle, TransportProxy};
pub use wire::Notification;
