#![warn(missing_docs)]
//! Wire protocol for container sync and item transactions.

mod codec;
mod descriptor;
mod protocol;

pub use codec::{
    compute_schema_hash, decode_client_packet, decode_server_packet, encode_client_packet,
    encode_server_packet,
};
pub use descriptor::NetworkItemStackDescriptor;
pub use protocol::{
    ClientPacket, InventoryAction, InventorySource, InventorySourceType, InventoryTransaction,
    ItemStackAction, ItemStackRequest, ItemStackResponse, ProtocolError, ResponseContainerInfo,
    ResponseSlotInfo, ResponseStatus, ServerPacket, StackSlot, MAX_CONTENT_ITEMS,
    MAX_DESCRIPTOR_AMOUNT, MAX_REQUEST_ACTIONS, MAX_STACK_REQUESTS, MAX_TRANSACTION_ACTIONS,
    PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
