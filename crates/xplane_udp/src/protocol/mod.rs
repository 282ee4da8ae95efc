//! # Wire Protocol
//!
//! Binary packet definitions of the X-Plane UDP interface.
//!
//! ## Packet Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (5 bytes): 4-letter command + terminator              │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (fixed layout per command, native byte order)        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod codec;
mod packets;

pub use codec::{pack, unpack, unpack_bytes, PacketReader, PacketWriter, WireField};
pub use packets::{
    basic_info_packet, decode_updates, set_packet, subscribe_packet, BeaconInfo, Command,
    PlaneInfo, HEADER_LEN,
};
