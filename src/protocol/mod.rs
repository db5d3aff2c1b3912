pub mod packet;
pub mod primitive;

pub use packet::{Operation, Packet, PacketHeader, Status, MAX_PACKET_LEN};
