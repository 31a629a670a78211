//! # Bridge Mux
//!
//! Correlation and fan-out multiplexer over a single duplex message channel.
//!
//! A host talks to a remote dispatcher (worker, proxy, socket) through one
//! channel. This crate turns that channel into three independent services:
//! one-shot request/response calls, recurring lifecycle listeners and
//! topic-based publish/subscribe.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                         Multiplexer (service)                      │
//! │                                                                    │
//! │  call / subscribe      on_connect / on_error      unsubscribe      │
//! │        │                       │                       │           │
//! │  ┌─────┴──────────┐   ┌────────┴─────────┐   ┌─────────┴────────┐  │
//! │  │ PendingRequest │   │ ListenerRegistry │   │ Subscription     │  │
//! │  │ Store (oneshot)│   │ (event → list)   │   │ Registry (topic) │  │
//! │  └─────▲──────────┘   └────────▲─────────┘   └─────────▲────────┘  │
//! │        │ result                │ direct                │ publish   │
//! │        └───────────────────────┼───────────────────────┘           │
//! │                             deliver()                              │
//! └──────────────┬──────────────────▲──────────────────────────────────┘
//!                │ Envelope         │ InboundMessage
//!           Transport (port)   InboundSource (port) ◄── InboundPump
//!                │                  │
//!                ▼                  │
//!                 remote dispatcher
//! ```
//!
//! - **Domain** (`domain/`): identifiers, topic derivation, the three
//!   registries and configuration. No I/O.
//! - **IPC** (`ipc/`): outbound [`Envelope`] and inbound [`InboundMessage`].
//! - **Ports** (`ports/`): [`Transport`] and [`InboundSource`].
//! - **Adapters** (`adapters/`): in-memory channel and the inbound pump.
//! - **Client** (`client`): [`NodeRpc`], named node operations.
//!
//! ## Guarantees
//!
//! - A pending request is settled at most once; later results for its ID
//!   are dropped.
//! - Registration always happens before the outbound send.
//! - Publishing to a topic invokes its subscribers in subscription order.
//! - A panicking callback does not stop the remaining callbacks.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_mux::{adapters::channel, InboundPump, Multiplexer, MuxConfig};
//!
//! let (transport, inbound, remote) = channel::pair(1024);
//! let mux = Arc::new(Multiplexer::new(MuxConfig::default(), Arc::new(transport)));
//! tokio::spawn(InboundPump::new(mux.clone(), Arc::new(inbound)).run());
//!
//! let block = mux.call("getBlockRequest", json!({"hash": hash})).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod client;
pub mod domain;
pub mod error;
pub mod ipc;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{InboundPump, RemoteEnd};
pub use client::NodeRpc;
pub use domain::{
    derive_topic, Callback, IdGenerator, IdStrategy, LifecycleEvent, MuxConfig, RequestId,
    SequentialGenerator, SubscriptionId, Topic, UuidV7Generator,
};
pub use error::{ConfigError, DecodeError, MuxError, RemoteError, TransportError};
pub use ipc::{Envelope, InboundMessage};
pub use metrics::{MetricsSnapshot, MuxMetrics};
pub use ports::{InboundSource, Transport};
pub use service::{Delivery, Multiplexer, PendingCall, SubscriptionCall};
