pub mod channel;
pub mod controller;
pub mod mapping;
mod request;
mod stats;


pub use channel::{DramChannel, QueueKind};
pub use controller::{MemoryController, WarmupStatus};
pub use mapping::ChannelMapper;
pub use request::{
    same_block, DramReject, DramRejectReason, MemRequest, PacketKind, ReadAdmit, ReadResult,
    RequestPacket, ReturnRef, ReturnTarget, WriteAdmit, WriteResult,
};
pub use stats::DramStats;
