//! SimpleBGC 2.6 serial framing.
//!
//! A frame is `'>' | command id | payload size | header checksum | payload |
//! payload checksum` where the header checksum is `(id + size) % 256` and the
//! payload checksum is the byte sum of the payload modulo 256.

use std::io::{ErrorKind, Read, Write};

use tracing::debug;

use crate::units::{from_degree, from_degree_per_sec};
use crate::{ControlCommand, GimbalError};

pub const START_CHARACTER: u8 = b'>';

pub const CMD_CONTROL: u8 = 67;
pub const CMD_CONFIRM: u8 = 67;
pub const CMD_GET_ANGLES: u8 = 73;
pub const CMD_ERROR: u8 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command_id: u8,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(command_id: u8, payload: Vec<u8>) -> Self {
        Self { command_id, payload }
    }

    pub fn empty(command_id: u8) -> Self {
        Self::new(command_id, Vec::new())
    }

    pub fn encode(&self) -> Result<Vec<u8>, GimbalError> {
        let size = u8::try_from(self.payload.len())
            .map_err(|_| GimbalError::Frame(format!("payload too large: {} bytes", self.payload.len())))?;
        let mut out = Vec::with_capacity(5 + self.payload.len());
        out.push(START_CHARACTER);
        out.push(self.command_id);
        out.push(size);
        out.push(header_checksum(self.command_id, size));
        out.extend_from_slice(&self.payload);
        out.push(payload_checksum(&self.payload));
        Ok(out)
    }
}

pub fn header_checksum(command_id: u8, payload_size: u8) -> u8 {
    command_id.wrapping_add(payload_size)
}

pub fn payload_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

fn map_io(e: std::io::Error) -> GimbalError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => GimbalError::Timeout,
        _ => GimbalError::Io(e),
    }
}

pub fn write_message<W: Write + ?Sized>(w: &mut W, message: &Message) -> Result<(), GimbalError> {
    debug!("bgc send: cmd={} size={}", message.command_id, message.payload.len());
    w.write_all(&message.encode()?).map_err(map_io)?;
    w.flush().map_err(map_io)
}

/// Reads one frame and validates start byte and both checksums.
pub fn read_message<R: Read + ?Sized>(r: &mut R) -> Result<Message, GimbalError> {
    let mut header = [0u8; 4];
    r.read_exact(&mut header).map_err(map_io)?;
    let [start, command_id, size, checksum] = header;
    if start != START_CHARACTER {
        return Err(GimbalError::Frame(format!("unexpected start character {}", start)));
    }
    if header_checksum(command_id, size) != checksum {
        return Err(GimbalError::Frame(format!("header checksum mismatch for cmd {}", command_id)));
    }

    let mut body = vec![0u8; size as usize + 1];
    r.read_exact(&mut body).map_err(map_io)?;
    let expected = body.pop().unwrap_or_default();
    if payload_checksum(&body) != expected {
        return Err(GimbalError::Frame(format!("payload checksum mismatch for cmd {}", command_id)));
    }
    debug!("bgc recv: cmd={} size={}", command_id, size);
    Ok(Message::new(command_id, body))
}

/// Payload of CMD_CONTROL, laid out as `<BBBhhhhhh`.
pub fn control_payload(cmd: &ControlCommand) -> Vec<u8> {
    let mut out = Vec::with_capacity(15);
    out.push(cmd.roll.mode as u8);
    out.push(cmd.pitch.mode as u8);
    out.push(cmd.yaw.mode as u8);
    for axis in [&cmd.roll, &cmd.pitch, &cmd.yaw] {
        out.extend_from_slice(&from_degree_per_sec(axis.speed).to_le_bytes());
        out.extend_from_slice(&from_degree(axis.angle).to_le_bytes());
    }
    out
}

/// Raw reply of CMD_GET_ANGLES in protocol units, one triple per axis
/// (1 = roll, 2 = pitch, 3 = yaw).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawAngles {
    pub imu_angle: [i16; 3],
    pub target_angle: [i16; 3],
    pub target_speed: [i16; 3],
}

impl RawAngles {
    pub fn parse(payload: &[u8]) -> Result<Self, GimbalError> {
        if payload.len() != 18 {
            return Err(GimbalError::Frame(format!("get-angles payload has {} bytes, expected 18", payload.len())));
        }
        let mut out = Self::default();
        for (axis, chunk) in payload.chunks_exact(6).enumerate() {
            out.imu_angle[axis] = i16::from_le_bytes([chunk[0], chunk[1]]);
            out.target_angle[axis] = i16::from_le_bytes([chunk[2], chunk[3]]);
            out.target_speed[axis] = i16::from_le_bytes([chunk[4], chunk[5]]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AxisControl, ControlMode};

    #[test]
    fn empty_message_frame() {
        let bytes = Message::empty(CMD_GET_ANGLES).encode().unwrap();
        assert_eq!(bytes, vec![62, 73, 0, 73, 0]);
    }

    #[test]
    fn checksums_wrap_at_256() {
        assert_eq!(header_checksum(255, 3), 2);
        assert_eq!(payload_checksum(&[200, 100]), 44);
    }

    #[test]
    fn read_back_written_frame() {
        let msg = Message::new(CMD_CONFIRM, vec![CMD_CONTROL]);
        let mut buf = Vec::new();
        write_message(&mut buf, &msg).unwrap();
        let got = read_message(&mut buf.as_slice()).unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let mut bytes = Message::new(CMD_CONFIRM, vec![1, 2, 3]).encode().unwrap();
        bytes[5] ^= 0xff;
        assert!(matches!(read_message(&mut bytes.as_slice()), Err(GimbalError::Frame(_))));
    }

    #[test]
    fn truncated_frame_is_io_error() {
        let bytes = [62u8, 67, 1];
        assert!(matches!(read_message(&mut &bytes[..]), Err(GimbalError::Io(_))));
    }

    #[test]
    fn control_payload_layout() {
        let cmd = ControlCommand {
            yaw: AxisControl { mode: ControlMode::Angle, speed: 60.0, angle: 90.0 },
            pitch: AxisControl { mode: ControlMode::Speed, speed: -12.0, angle: 0.0 },
            roll: AxisControl::no_control(),
        };
        let p = control_payload(&cmd);
        assert_eq!(p.len(), 15);
        assert_eq!(&p[..3], &[0, 1, 2]);
        assert_eq!(i16::from_le_bytes([p[7], p[8]]), -98);
        assert_eq!(i16::from_le_bytes([p[11], p[12]]), 491);
        assert_eq!(i16::from_le_bytes([p[13], p[14]]), 4096);
    }

    #[test]
    fn parse_angles_reply() {
        let mut payload = Vec::new();
        for v in [1i16, 2, 3, 4, -4096, 6, 7, 4096, -491] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let a = RawAngles::parse(&payload).unwrap();
        assert_eq!(a.target_angle, [2, -4096, 4096]);
        assert_eq!(a.target_speed, [3, 6, -491]);
        assert!(RawAngles::parse(&payload[..10]).is_err());
    }
}
