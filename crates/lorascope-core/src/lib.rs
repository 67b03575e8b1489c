//! # Lorascope Core
//!
//! Decoding and live-dispatch core for LoRaWAN gateway event streams.
//! A network server publishes raw gateway events; this crate decodes
//! the two nested binary protocols involved, reconstructs per-device
//! transmission sessions, computes time-on-air, labels packets by
//! network operator, and fans the results out to live observers.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Wire Frame   │──►│ LoRaWAN    │──►│  Enrichment  │──►│  Session  │
//! │ Decoder      │   │ PHY Parser │   │  (operator,  │   │  Tracker  │
//! │ (binary/JSON)│   │            │   │   airtime)   │   │           │
//! └──────────────┘   └────────────┘   └──────────────┘   └─────┬─────┘
//!                                                              │
//!                                     ┌──────────────┐   ┌─────▼─────┐
//!                                     │ PacketStore  │◄──│ Finished  │
//!                                     │ (external)   │   │ packet    │
//!                                     └──────────────┘   └─────┬─────┘
//!                                                              ▼
//!                                                   ┌────────────────────┐
//!                                                   │ Live Dispatch      │
//!                                                   │ (per-client filter)│
//!                                                   └────────────────────┘
//! ```
//!
//! The whole pipeline is owned by one task ([`Pipeline::run`]); frames
//! are processed to completion in arrival order, and subscriber
//! changes and sweeps are serialized onto the same loop. Malformed
//! radio input is never an error: decoders return partial frames or
//! `None` and the packet is dropped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lorascope_core::{
//!     LiveFilter, NullStore, OperatorTable, Pipeline, PipelineCommand, SessionConfig,
//! };
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let mut pipeline = Pipeline::new(
//!     OperatorTable::builtin(),
//!     SessionConfig::default(),
//!     NullStore,
//! );
//! let (_, mut live) = pipeline.dispatcher_mut().subscribe(LiveFilter::default());
//!
//! let (tx, rx) = mpsc::channel::<PipelineCommand>(1024);
//! tokio::spawn(pipeline.run(rx));
//! // tx.send(PipelineCommand::Frame(..)) from the transport demux;
//! // live.recv() yields serialized packets matching the filter.
//! # }
//! ```

pub mod airtime;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod operator;
pub mod packet;
pub mod phy;
pub mod pipeline;
pub mod session;
pub mod wire;

// Re-export main types
pub use airtime::time_on_air_us;
pub use config::{build_operator_table, PrefixEntry};
pub use dispatch::{Dispatcher, LiveFilter, OwnershipMode, OwnershipPrefix};
pub use error::{CoreError, Result};
pub use operator::{OperatorPrefix, OperatorTable, PrefixScope, UNKNOWN_OPERATOR};
pub use packet::{FrameKind, PacketKind, ParsedPacket, RawFrameEvent, WireFormat};
pub use phy::{MacMessageType, PhyPayload};
pub use pipeline::{NullStore, PacketStore, Pipeline, PipelineCommand};
pub use session::{ActiveSession, PendingJoin, SessionConfig, SessionStamp, SessionTracker};
pub use wire::{decode_frame, Frame, TxAckStatus};
