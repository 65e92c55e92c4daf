pub mod autodetect;
pub mod bgc;
pub mod protocol;
pub mod units;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GimbalError {
    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("timed out waiting for gimbal reply")]
    Timeout,

    #[error("invalid frame: {0}")]
    Frame(String),

    #[error("expected reply {expected}, got command {got}")]
    UnexpectedReply { expected: u8, got: u8 },
}

/// Modes of the outgoing control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ControlMode {
    NoControl = 0,
    #[default]
    Speed = 1,
    Angle = 2,
    SpeedAngle = 3,
    Rc = 4,
    AngleRelFrame = 5,
    RcHighRes = 6,
}

/// Speed in degree per second, angle in degree.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisControl {
    pub mode: ControlMode,
    pub speed: f64,
    pub angle: f64,
}

impl AxisControl {
    pub fn speed(speed: f64) -> Self {
        Self { mode: ControlMode::Speed, speed, angle: 0.0 }
    }

    pub fn angle(speed: f64, angle: f64) -> Self {
        Self { mode: ControlMode::Angle, speed, angle }
    }

    pub fn no_control() -> Self {
        Self { mode: ControlMode::NoControl, speed: 0.0, angle: 0.0 }
    }
}

/// One control request for all three axes.
///
/// Positive yaw speed rotates clockwise, positive pitch speed tilts upwards,
/// both from the camera's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlCommand {
    pub yaw: AxisControl,
    pub pitch: AxisControl,
    pub roll: AxisControl,
}

impl ControlCommand {
    pub fn speeds(yaw_speed: f64, pitch_speed: f64) -> Self {
        Self {
            yaw: AxisControl::speed(yaw_speed),
            pitch: AxisControl::speed(pitch_speed),
            roll: AxisControl::speed(0.0),
        }
    }

    pub fn angles(yaw_speed: f64, yaw_angle: f64, pitch_speed: f64, pitch_angle: f64) -> Self {
        Self {
            yaw: AxisControl::angle(yaw_speed, yaw_angle),
            pitch: AxisControl::angle(pitch_speed, pitch_angle),
            roll: AxisControl::speed(0.0),
        }
    }

    pub fn no_control() -> Self {
        Self {
            yaw: AxisControl::no_control(),
            pitch: AxisControl::no_control(),
            roll: AxisControl::no_control(),
        }
    }
}

/// Sensor snapshot; angles in `[0, 360)`, speeds in degree per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Angles {
    pub pan_angle: f64,
    pub pan_speed: f64,
    pub tilt_angle: f64,
    pub tilt_speed: f64,
}

/// Calls block until the hardware replied or the transport timed out.
pub trait Gimbal: Send {
    fn control(&mut self, cmd: &ControlCommand) -> Result<(), GimbalError>;

    fn stop(&mut self) -> Result<(), GimbalError> {
        self.control(&ControlCommand::no_control())
    }

    fn get_angles(&mut self) -> Result<Angles, GimbalError>;
}

impl<G: Gimbal + ?Sized> Gimbal for Box<G> {
    fn control(&mut self, cmd: &ControlCommand) -> Result<(), GimbalError> {
        (**self).control(cmd)
    }

    fn stop(&mut self) -> Result<(), GimbalError> {
        (**self).stop()
    }

    fn get_angles(&mut self) -> Result<Angles, GimbalError> {
        (**self).get_angles()
    }
}

/// Wraps a gimbal whose camera is mounted upside down: tilt speed and angle
/// are inverted in both directions.
pub struct TiltInvertedGimbal<G> {
    inner: G,
}

impl<G: Gimbal> TiltInvertedGimbal<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> G {
        self.inner
    }
}

impl<G: Gimbal> Gimbal for TiltInvertedGimbal<G> {
    fn control(&mut self, cmd: &ControlCommand) -> Result<(), GimbalError> {
        let mut inverted = *cmd;
        inverted.pitch.speed = -cmd.pitch.speed;
        inverted.pitch.angle = -cmd.pitch.angle;
        self.inner.control(&inverted)
    }

    fn stop(&mut self) -> Result<(), GimbalError> {
        self.inner.stop()
    }

    fn get_angles(&mut self) -> Result<Angles, GimbalError> {
        let a = self.inner.get_angles()?;
        Ok(Angles {
            tilt_angle: (-a.tilt_angle).rem_euclid(360.0),
            tilt_speed: -a.tilt_speed,
            ..a
        })
    }
}

/// Accepts every command and always reports zero angles.
#[derive(Debug, Default)]
pub struct DummyGimbal;

impl Gimbal for DummyGimbal {
    fn control(&mut self, _cmd: &ControlCommand) -> Result<(), GimbalError> {
        Ok(())
    }

    fn get_angles(&mut self) -> Result<Angles, GimbalError> {
        Ok(Angles::default())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GimbalConfig {
    /// "simplebgc" | "dummy"
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Camera mounted upside down relative to the board's tilt direction.
    #[serde(default)]
    pub tilt_inverted: bool,

    /// If true, probe candidate serial ports/bauds and pick the first that
    /// answers a get-angles request.
    #[serde(default)]
    pub autodetect: bool,

    /// When autodetect=false: fixed port config
    pub serial_dev: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Reply timeout per request
    pub timeout_ms: Option<u64>,

    pub candidate_devs: Option<Vec<String>>,
    pub candidate_bauds: Option<Vec<u32>>,
}

fn default_kind() -> String {
    "simplebgc".into()
}

fn default_baud() -> u32 {
    115200
}

impl Default for GimbalConfig {
    fn default() -> Self {
        Self {
            kind: "dummy".into(),
            tilt_inverted: false,
            autodetect: false,
            serial_dev: None,
            baud: default_baud(),
            timeout_ms: None,
            candidate_devs: None,
            candidate_bauds: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every command and replays a scripted sequence of angles.
    #[derive(Default)]
    pub struct RecordingGimbal {
        pub commands: Vec<ControlCommand>,
        pub angles: Angles,
    }

    impl Gimbal for RecordingGimbal {
        fn control(&mut self, cmd: &ControlCommand) -> Result<(), GimbalError> {
            self.commands.push(*cmd);
            Ok(())
        }

        fn get_angles(&mut self) -> Result<Angles, GimbalError> {
            Ok(self.angles)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingGimbal;
    use super::*;

    #[test]
    fn inverted_tilt_is_negated_both_ways() {
        let mut g = TiltInvertedGimbal::new(RecordingGimbal {
            angles: Angles { pan_angle: 10.0, pan_speed: 2.0, tilt_angle: 30.0, tilt_speed: 4.0 },
            ..Default::default()
        });
        g.control(&ControlCommand::angles(60.0, 90.0, 12.0, 15.0)).unwrap();
        let a = g.get_angles().unwrap();
        let inner = g.into_inner();
        let sent = inner.commands[0];
        assert_eq!(sent.pitch.speed, -12.0);
        assert_eq!(sent.pitch.angle, -15.0);
        assert_eq!(sent.yaw.angle, 90.0);
        assert_eq!(a.tilt_angle, 330.0);
        assert_eq!(a.tilt_speed, -4.0);
        assert_eq!(a.pan_angle, 10.0);
    }

    #[test]
    fn default_stop_releases_all_axes() {
        let mut g = RecordingGimbal::default();
        g.stop().unwrap();
        assert_eq!(g.commands, vec![ControlCommand::no_control()]);
    }

    #[test]
    fn boxed_gimbal_delegates() {
        let mut g: Box<dyn Gimbal> = Box::new(DummyGimbal);
        g.control(&ControlCommand::speeds(1.0, 2.0)).unwrap();
        assert_eq!(g.get_angles().unwrap(), Angles::default());
    }
}
