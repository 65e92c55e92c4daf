use std::io::{Read, Write};
use std::time::Duration;

use tracing::{debug, info};

use crate::protocol::{self, control_payload, Message, RawAngles, CMD_CONFIRM, CMD_CONTROL, CMD_GET_ANGLES};
use crate::units::{to_360_degree, to_degree_per_sec};
use crate::{Angles, ControlCommand, Gimbal, GimbalError, TiltInvertedGimbal};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const PAN_AXIS: usize = 2;
const TILT_AXIS: usize = 1;

/// SimpleBGC board on a blocking serial connection.
pub struct SimpleBgcGimbal<P> {
    port: P,
}

pub type SerialBgcGimbal = SimpleBgcGimbal<Box<dyn tokio_serial::SerialPort>>;

impl SerialBgcGimbal {
    pub fn open(dev: &str, baud: u32, timeout: Duration) -> Result<Self, GimbalError> {
        let port = tokio_serial::new(dev, baud).timeout(timeout).open()?;
        info!("gimbal: opened {} @ {}", dev, baud);
        Ok(Self::new(port))
    }
}

impl<P: Read + Write + Send> SimpleBgcGimbal<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn raw_angles(&mut self) -> Result<RawAngles, GimbalError> {
        protocol::write_message(&mut self.port, &Message::empty(CMD_GET_ANGLES))?;
        let reply = protocol::read_message(&mut self.port)?;
        if reply.command_id != CMD_GET_ANGLES {
            return Err(GimbalError::UnexpectedReply { expected: CMD_GET_ANGLES, got: reply.command_id });
        }
        RawAngles::parse(&reply.payload)
    }
}

impl<P: Read + Write + Send> Gimbal for SimpleBgcGimbal<P> {
    fn control(&mut self, cmd: &ControlCommand) -> Result<(), GimbalError> {
        debug!("gimbal control: {:?}", cmd);
        protocol::write_message(&mut self.port, &Message::new(CMD_CONTROL, control_payload(cmd)))?;
        let confirmation = protocol::read_message(&mut self.port)?;
        if confirmation.command_id != CMD_CONFIRM {
            return Err(GimbalError::UnexpectedReply { expected: CMD_CONFIRM, got: confirmation.command_id });
        }
        Ok(())
    }

    fn get_angles(&mut self) -> Result<Angles, GimbalError> {
        Ok(convert_angles(&self.raw_angles()?))
    }
}

pub fn convert_angles(raw: &RawAngles) -> Angles {
    Angles {
        pan_angle: to_360_degree(raw.target_angle[PAN_AXIS]),
        pan_speed: to_degree_per_sec(raw.target_speed[PAN_AXIS]),
        tilt_angle: to_360_degree(raw.target_angle[TILT_AXIS]),
        tilt_speed: to_degree_per_sec(raw.target_speed[TILT_AXIS]),
    }
}

/// The board tilts in the opposite direction than the rest of the pipeline
/// expects, so it is always used through a [`TiltInvertedGimbal`].
pub fn open_simple_bgc_gimbal(dev: &str, baud: u32, timeout: Duration) -> Result<TiltInvertedGimbal<SerialBgcGimbal>, GimbalError> {
    Ok(TiltInvertedGimbal::new(SerialBgcGimbal::open(dev, baud, timeout)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Serial double: replies are read from a prepared buffer, writes are kept.
    struct FakePort {
        replies: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl FakePort {
        fn with_replies(messages: &[Message]) -> Self {
            let mut buf = Vec::new();
            for m in messages {
                buf.extend(m.encode().unwrap());
            }
            Self { replies: Cursor::new(buf), written: Vec::new() }
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn angles_payload(values: [i16; 9]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn control_waits_for_confirmation() {
        let port = FakePort::with_replies(&[Message::new(CMD_CONFIRM, vec![CMD_CONTROL])]);
        let mut g = SimpleBgcGimbal::new(port);
        g.control(&ControlCommand::speeds(10.0, 0.0)).unwrap();
        assert_eq!(g.port.written[..4], [62, CMD_CONTROL, 15, CMD_CONTROL + 15]);
    }

    #[test]
    fn missing_confirmation_is_an_error() {
        let mut g = SimpleBgcGimbal::new(FakePort::with_replies(&[]));
        assert!(g.control(&ControlCommand::speeds(10.0, 0.0)).is_err());
    }

    #[test]
    fn wrong_reply_is_reported() {
        let port = FakePort::with_replies(&[Message::empty(protocol::CMD_ERROR)]);
        let mut g = SimpleBgcGimbal::new(port);
        let err = g.control(&ControlCommand::no_control()).unwrap_err();
        assert!(matches!(err, GimbalError::UnexpectedReply { expected: CMD_CONFIRM, got: 255 }));
    }

    #[test]
    fn angles_use_yaw_for_pan_and_pitch_for_tilt() {
        let reply = Message::new(CMD_GET_ANGLES, angles_payload([0, 0, 0, 0, -4096, 0, 0, 4096, 491]));
        let mut g = SimpleBgcGimbal::new(FakePort::with_replies(&[reply]));
        let a = g.get_angles().unwrap();
        assert!((a.pan_angle - 90.0).abs() < 1e-9);
        assert!((a.tilt_angle - 270.0).abs() < 1e-9);
        assert!((a.pan_speed - 59.9).abs() < 0.1);
        assert_eq!(a.tilt_speed, 0.0);
    }
}
