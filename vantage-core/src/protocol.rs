//! Fixed-layout datagram formats.
//!
//! All integers and floats are little-endian; fields are packed with no
//! padding.
//!
//! ## FramePacket (client → consumer)
//!
//! ```text
//! hp, mp, exp:          f32 × 3                 (12)
//! width, height:        u16 × 2                  (4)
//! player_x, player_y:   u16 × 2                  (4)
//! portals:              (u16, u16) × K          (32)
//! frame_number:         u64                      (8)
//! pressed_keys:         (u8, u8, u8) × N        (48)
//! length:               u64                      (8)
//! data:                 [u8; length]   (≤ MAX_PAYLOAD_SIZE)
//! ```
//!
//! Unset coordinates are `0xFFFF`; empty key slots are three zero bytes.
//! Only `HEADER_SIZE + length` bytes go on the wire.
//!
//! ## ActionPacket (consumer → client)
//!
//! ```text
//! pressed_keys:         (u8, u8, u8) × N        (48)
//! ```
//!
//! The complete desired key state. Slots with key code `0` are empty.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::VantageError;
use crate::metrics::Metrics;
use crate::minimap::MinimapState;
use crate::types::Point;

// ── Constants ────────────────────────────────────────────────────

/// Portal slots per packet (K).
pub const PORTAL_CAPACITY: usize = 8;

/// Pressed-key slots per packet (N).
pub const KEY_CAPACITY: usize = 16;

/// Largest compressed payload a FramePacket may carry.
pub const MAX_PAYLOAD_SIZE: usize = 65_000;

/// Coordinate value meaning "not present".
pub const COORD_SENTINEL: u16 = 0xFFFF;

/// Bytes of one serialized [`KeyIdentity`].
pub const KEY_SLOT_SIZE: usize = 3;

/// FramePacket bytes preceding the payload.
pub const HEADER_SIZE: usize =
    12 + 4 + 4 + 4 * PORTAL_CAPACITY + 8 + KEY_SLOT_SIZE * KEY_CAPACITY + 8;

/// Largest FramePacket datagram.
pub const MAX_FRAME_PACKET_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Exact ActionPacket datagram size.
pub const ACTION_PACKET_SIZE: usize = KEY_SLOT_SIZE * KEY_CAPACITY;

// ── KeyIdentity ──────────────────────────────────────────────────

/// Identity of one physical or virtual key.
///
/// Ordering follows field order and only serves to keep sets canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyIdentity {
    /// `true` for a virtual-key code, `false` for a hardware scan code.
    pub is_virtual: bool,
    /// Extended-key flag (right-hand modifiers, arrow cluster, ...).
    pub is_extended: bool,
    pub code: u8,
}

impl KeyIdentity {
    pub const fn virtual_key(code: u8) -> Self {
        Self {
            is_virtual: true,
            is_extended: false,
            code,
        }
    }

    pub const fn scan_code(code: u8, is_extended: bool) -> Self {
        Self {
            is_virtual: false,
            is_extended,
            code,
        }
    }

    fn put(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.is_virtual as u8);
        buf.put_u8(self.is_extended as u8);
        buf.put_u8(self.code);
    }

    /// Read one slot; `None` for an empty slot.
    fn get(buf: &mut impl Buf) -> Option<Self> {
        let is_virtual = buf.get_u8() != 0;
        let is_extended = buf.get_u8() != 0;
        let code = buf.get_u8();
        (code != 0).then_some(Self {
            is_virtual,
            is_extended,
            code,
        })
    }
}

// ── KeySnapshot ──────────────────────────────────────────────────

/// At most [`KEY_CAPACITY`] distinct keys in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeySnapshot {
    keys: Vec<KeyIdentity>,
}

impl KeySnapshot {
    /// Build a snapshot from arbitrary keys, sorted and deduplicated.
    ///
    /// Returns the snapshot and how many keys did not fit.
    pub fn truncating<I>(keys: I) -> (Self, usize)
    where
        I: IntoIterator<Item = KeyIdentity>,
    {
        let mut keys: Vec<KeyIdentity> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        let dropped = keys.len().saturating_sub(KEY_CAPACITY);
        keys.truncate(KEY_CAPACITY);
        (Self { keys }, dropped)
    }

    pub fn keys(&self) -> &[KeyIdentity] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyIdentity> {
        self.keys.iter()
    }

    fn put_slots(&self, buf: &mut impl BufMut) {
        for key in &self.keys {
            key.put(buf);
        }
        buf.put_bytes(0, (KEY_CAPACITY - self.keys.len()) * KEY_SLOT_SIZE);
    }

    fn get_slots(buf: &mut impl Buf) -> Self {
        let keys = (0..KEY_CAPACITY).filter_map(|_| KeyIdentity::get(&mut *buf));
        Self::truncating(keys).0
    }
}

impl FromIterator<KeyIdentity> for KeySnapshot {
    fn from_iter<I: IntoIterator<Item = KeyIdentity>>(iter: I) -> Self {
        Self::truncating(iter).0
    }
}

// ── Coordinates ──────────────────────────────────────────────────

fn put_point(buf: &mut impl BufMut, point: Option<Point>) {
    let (x, y) = match point {
        Some(p) => (clamp_coord(p.x), clamp_coord(p.y)),
        None => (COORD_SENTINEL, COORD_SENTINEL),
    };
    buf.put_u16_le(x);
    buf.put_u16_le(y);
}

fn get_point(buf: &mut impl Buf) -> Option<Point> {
    let x = buf.get_u16_le();
    let y = buf.get_u16_le();
    if x == COORD_SENTINEL && y == COORD_SENTINEL {
        None
    } else {
        Some(Point::new(x as i32, y as i32))
    }
}

/// Keep real coordinates clear of the sentinel.
fn clamp_coord(v: i32) -> u16 {
    v.clamp(0, (COORD_SENTINEL - 1) as i32) as u16
}

// ── FramePacket ──────────────────────────────────────────────────

/// One outbound frame: extracted state plus compressed pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacket {
    pub metrics: Metrics,
    pub minimap: MinimapState,
    pub frame_number: u64,
    pub keys: KeySnapshot,
    pub payload: Vec<u8>,
}

impl FramePacket {
    /// Bytes this packet occupies on the wire.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize into `dst`, appending exactly [`wire_size`](Self::wire_size) bytes.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), VantageError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(VantageError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        dst.reserve(self.wire_size());

        dst.put_f32_le(self.metrics.hp);
        dst.put_f32_le(self.metrics.mp);
        dst.put_f32_le(self.metrics.exp);

        dst.put_u16_le(self.minimap.width);
        dst.put_u16_le(self.minimap.height);
        put_point(dst, self.minimap.player);
        for slot in 0..PORTAL_CAPACITY {
            put_point(dst, self.minimap.portals.get(slot).copied());
        }

        dst.put_u64_le(self.frame_number);
        self.keys.put_slots(dst);
        dst.put_u64_le(self.payload.len() as u64);
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// Parse a received datagram.
    ///
    /// The datagram must be exactly the header plus `length` bytes.
    pub fn decode(data: &[u8]) -> Result<Self, VantageError> {
        if data.len() < HEADER_SIZE {
            return Err(VantageError::InvalidPacketLength {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let mut buf = data;

        let metrics = Metrics {
            hp: buf.get_f32_le(),
            mp: buf.get_f32_le(),
            exp: buf.get_f32_le(),
        };

        let width = buf.get_u16_le();
        let height = buf.get_u16_le();
        let player = get_point(&mut buf);
        let portals = (0..PORTAL_CAPACITY)
            .filter_map(|_| get_point(&mut buf))
            .collect();

        let frame_number = buf.get_u64_le();
        let keys = KeySnapshot::get_slots(&mut buf);

        let length = buf.get_u64_le() as usize;
        if length > MAX_PAYLOAD_SIZE {
            return Err(VantageError::PayloadTooLarge {
                size: length,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if buf.remaining() != length {
            return Err(VantageError::InvalidPacketLength {
                expected: HEADER_SIZE + length,
                actual: data.len(),
            });
        }

        Ok(Self {
            metrics,
            minimap: MinimapState {
                width,
                height,
                player,
                portals,
            },
            frame_number,
            keys,
            payload: buf.to_vec(),
        })
    }
}

// ── ActionPacket ─────────────────────────────────────────────────

/// Desired pressed-key state sent by the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionPacket {
    pub keys: KeySnapshot,
}

impl ActionPacket {
    pub fn new(keys: KeySnapshot) -> Self {
        Self { keys }
    }

    pub fn encode(&self) -> [u8; ACTION_PACKET_SIZE] {
        let mut out = [0u8; ACTION_PACKET_SIZE];
        let mut buf = &mut out[..];
        self.keys.put_slots(&mut buf);
        out
    }

    /// Parse a datagram. Anything but exactly [`ACTION_PACKET_SIZE`]
    /// bytes is rejected.
    pub fn decode(data: &[u8]) -> Result<Self, VantageError> {
        if data.len() != ACTION_PACKET_SIZE {
            return Err(VantageError::InvalidPacketLength {
                expected: ACTION_PACKET_SIZE,
                actual: data.len(),
            });
        }
        let mut buf = data;
        Ok(Self {
            keys: KeySnapshot::get_slots(&mut buf),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
