// crates/zipgw-nms/src/lib.rs
#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for reply frames, queued commands and node lists
extern crate alloc;

// --- Foundation Modules ---
pub mod config;
pub mod hal;
pub mod types;

// --- Wire Codec ---
pub mod frame;

// --- State Machine ---
pub mod handler;
pub mod nms;
pub mod queue;

// --- Top-level Exports ---
pub use config::{NmsConfig, NmsTimeouts};
pub use frame::{FrameError, NmCommand};
pub use hal::{
    GatewayHost, NmsEnv, NmsError, ProvisioningList, RadioTransport, ReplyTransport,
    ResourceDirectory, SecurityEngine,
};
pub use handler::HandlerOutcome;
pub use nms::events::{LearnInfo, NmEvent};
pub use nms::flags::{KeyClasses, SecurityFlags, SubFlags};
pub use nms::states::NmState;
pub use nms::{NetworkManagement, SessionView};
pub use queue::NmQueue;
pub use types::{Dsk, HomeId, NodeId, NodeMask, Peer};
