//! Scripted camera for session tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use memolink_frame::{
    checksum, encode_packet, BAUD_1200_COMMAND, BAUD_9600_ACK, BAUD_9600_COMMAND, ETX,
    IDENTITY_QUERY, READ_COMMAND_SIZE, ROLL_DATA_INFO_QUERY,
};
use memolink_transport::MockLink;

use crate::config::MemoryMap;

const MEMORY_SIZE: usize = 0x1_0000;

/// Answers wire commands from two in-memory address spaces.
pub(crate) struct CameraEmulator {
    primary: Vec<u8>,
    roll_data: Vec<u8>,
    identity_reply: Vec<u8>,
    baud_ack: Vec<u8>,
    roll_info: Vec<u8>,
    read_delay: Duration,
    read_reply: Option<Vec<u8>>,
    silent: Arc<AtomicBool>,
}

impl CameraEmulator {
    pub(crate) fn new() -> Self {
        let mut identity_reply = b"1020F90X".to_vec();
        identity_reply.extend_from_slice(&[0x00, 0x00, 0x06]);
        Self {
            primary: vec![0; MEMORY_SIZE],
            roll_data: vec![0; MEMORY_SIZE],
            identity_reply,
            baud_ack: BAUD_9600_ACK.to_vec(),
            roll_info: vec![0x01, 0x00, 0x00, 0x00],
            read_delay: Duration::ZERO,
            read_reply: None,
            silent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Camera at the default memory map holding one 8-frame roll (#42) in
    /// intermediate mode, with total shots 0x1234 and current roll 125/17.
    pub(crate) fn loaded() -> Self {
        let map = MemoryMap::default();
        Self::new()
            .primary(map.total_shots_addr, &[0x34, 0x12])
            .primary(map.roll_number_addr, &[0x25, 0x01])
            .primary(map.frame_number_addr, &[0x11])
            .primary(map.ring_bounds_addr, &[0x10, 0x01, 0x20, 0x02])
            .primary(
                map.memo_settings_addr,
                &[0x4E, 0x00, 0x48, 0x01, 0x24, 0x01, 0x48, 0x01],
            )
            .roll_info(&[0x42, 0x00, 0x28, 0x00])
            .roll_data(0x0120, &sample_roll())
    }

    pub(crate) fn primary(mut self, addr: u16, bytes: &[u8]) -> Self {
        let start = usize::from(addr);
        self.primary[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub(crate) fn roll_data(mut self, addr: u16, bytes: &[u8]) -> Self {
        let start = usize::from(addr);
        self.roll_data[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub(crate) fn identity_reply(mut self, reply: &[u8]) -> Self {
        self.identity_reply = reply.to_vec();
        self
    }

    pub(crate) fn baud_ack(mut self, ack: &[u8]) -> Self {
        self.baud_ack = ack.to_vec();
        self
    }

    pub(crate) fn roll_info(mut self, info: &[u8]) -> Self {
        self.roll_info = info.to_vec();
        self
    }

    /// Delay before each memory read reply.
    pub(crate) fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Answer every memory read with these exact wire bytes.
    pub(crate) fn read_reply(mut self, wire: &[u8]) -> Self {
        self.read_reply = Some(wire.to_vec());
        self
    }

    /// Switch that makes the camera stop answering.
    pub(crate) fn silence_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.silent)
    }

    pub(crate) fn into_link(self, timeout: Duration) -> MockLink {
        let mut camera = self;
        MockLink::with_timeout(timeout).with_responder(move |cmd| camera.respond(cmd))
    }

    fn respond(&mut self, cmd: &[u8]) -> Vec<u8> {
        if self.silent.load(Ordering::SeqCst) {
            return Vec::new();
        }
        if cmd == IDENTITY_QUERY {
            return self.identity_reply.clone();
        }
        if cmd == BAUD_9600_COMMAND {
            return self.baud_ack.clone();
        }
        if cmd == BAUD_1200_COMMAND {
            return BAUD_1200_COMMAND.to_vec();
        }
        if cmd == ROLL_DATA_INFO_QUERY {
            return packet(&self.roll_info);
        }
        if cmd.len() == READ_COMMAND_SIZE && cmd[..3] == [0x01, 0x20, 0x80] {
            std::thread::sleep(self.read_delay);
            if let Some(wire) = &self.read_reply {
                return wire.clone();
            }
            let space = match cmd[3] {
                0x00 => &self.primary,
                _ => &self.roll_data,
            };
            let addr = usize::from(u16::from_be_bytes([cmd[4], cmd[5]]));
            let len = usize::from(cmd[7]);
            return packet(&space[addr..addr + len]);
        }
        Vec::new()
    }
}

/// 40-byte roll blob: roll 42, ISO code 12, eight 4-byte records.
pub(crate) fn sample_roll() -> Vec<u8> {
    let mut blob = vec![0x58, 0x5A, 0x10, 0x00, 0x42, 0x00];
    for i in 0..8u8 {
        blob.extend_from_slice(&[0x50 + i, 0x30, 0x11, 35 + i]);
    }
    blob.extend_from_slice(&[0xFF, 12]);
    blob
}

fn packet(payload: &[u8]) -> Vec<u8> {
    assert!(
        !payload.contains(&ETX) && checksum(payload) != ETX,
        "fixture payload {payload:02X?} collides with the end marker"
    );
    let mut dst = BytesMut::new();
    encode_packet(payload, &mut dst);
    dst.to_vec()
}
