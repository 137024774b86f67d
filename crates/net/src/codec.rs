//! Message encoding and decoding with framing.
//!
//! Provides length-prefixed encoding so packets can be stored, replayed and
//! carried over any byte stream.

use crate::protocol::{ClientPacket, ServerPacket, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use anyhow::{Context, Result};
use blake3::Hash;

/// Compute schema hash from protocol definitions.
///
/// This hash is used to ensure client and server have compatible protocol versions.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();

    hasher.update(&PROTOCOL_VERSION.to_le_bytes());
    hasher.update(PROTOCOL_MAGIC);

    // Message type names (deterministic)
    hasher.update(b"ClientPacket");
    hasher.update(b"ServerPacket");
    hasher.update(b"ItemStackRequest");
    hasher.update(b"InventoryTransaction");
    hasher.update(b"NetworkItemStackDescriptor");

    let hash: Hash = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(prefix)
}

fn frame(tag: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + 1 + payload.len());

    // Length (excluding length field itself)
    let length = (1 + payload.len()) as u32;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(tag);
    frame.extend_from_slice(&payload);

    frame
}

fn unframe(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 5 {
        return Err(anyhow::anyhow!(
            "Frame too short: {} bytes (minimum 5)",
            data.len()
        ));
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if length == 0 || data.len() < 4 + length {
        return Err(anyhow::anyhow!(
            "Incomplete frame: expected {} bytes, got {}",
            4 + length,
            data.len()
        ));
    }

    // Skip message type tag (data[4])
    Ok(&data[5..4 + length])
}

/// Encode a client packet with length prefix.
///
/// Frame format: [length: u32][message_type: u8][payload: bytes]
pub fn encode_client_packet(msg: &ClientPacket) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(msg).context("Failed to serialize client packet")?;
    Ok(frame(client_packet_tag(msg), payload))
}

/// Encode a server packet with length prefix.
///
/// Frame format: [length: u32][message_type: u8][payload: bytes]
pub fn encode_server_packet(msg: &ServerPacket) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(msg).context("Failed to serialize server packet")?;
    Ok(frame(server_packet_tag(msg), payload))
}

/// Decode a client packet from frame data.
///
/// Expects data to start with length prefix.
pub fn decode_client_packet(data: &[u8]) -> Result<ClientPacket> {
    let payload = unframe(data)?;
    postcard::from_bytes(payload).context("Failed to deserialize client packet")
}

/// Decode a server packet from frame data.
///
/// Expects data to start with length prefix.
pub fn decode_server_packet(data: &[u8]) -> Result<ServerPacket> {
    let payload = unframe(data)?;
    postcard::from_bytes(payload).context("Failed to deserialize server packet")
}

fn client_packet_tag(msg: &ClientPacket) -> u8 {
    match msg {
        ClientPacket::ItemStackRequest { .. } => 0,
        ClientPacket::InventoryTransaction { .. } => 1,
        ClientPacket::ContainerClose { .. } => 2,
    }
}

fn server_packet_tag(msg: &ServerPacket) -> u8 {
    match msg {
        ServerPacket::InventorySlot { .. } => 0,
        ServerPacket::InventoryContent { .. } => 1,
        ServerPacket::ContainerOpen { .. } => 2,
        ServerPacket::ContainerClose { .. } => 3,
        ServerPacket::ItemStackResponse { .. } => 4,
        ServerPacket::AddItemActor { .. } => 5,
        ServerPacket::RemoveActor { .. } => 6,
        ServerPacket::BlockEvent { .. } => 7,
    }
}
