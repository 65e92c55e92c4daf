use cameraman_control::limits::LimitsUpdate;
use cameraman_vision::Point;
use tracing::warn;

/// Control command typed on stdin while the cameraman runs.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Quit,
    Tracking,
    Manual,
    RotateLeft,
    RotateRight,
    TiltUp,
    TiltDown,
    ZoomIn,
    ZoomOut,
    Stop,
    Angle { pan: f64, tilt: f64 },
    SelectAt(Point),
    ZoomRatio(f64),
    ZoomIndex(u32),
    ShowLimits,
    UpdateLimits(LimitsUpdate),
    Status,
}

impl UserCommand {
    /// `None` for empty and unknown lines; unknown lines are logged.
    pub fn parse(line: &str) -> Option<Self> {
        let args: Vec<&str> = line.split_whitespace().collect();
        let command = match args.as_slice() {
            [] => return None,
            ["q"] => Self::Quit,
            ["t"] => Self::Tracking,
            ["m"] => Self::Manual,
            ["j"] => Self::RotateLeft,
            ["l"] => Self::RotateRight,
            ["i"] => Self::TiltUp,
            ["k"] => Self::TiltDown,
            ["+"] => Self::ZoomIn,
            ["-"] => Self::ZoomOut,
            ["o"] => Self::Stop,
            ["s"] => Self::Status,
            ["a", pan, tilt] => Self::Angle { pan: pan.parse().ok()?, tilt: tilt.parse().ok()? },
            ["c", x, y] => Self::SelectAt(Point::new(x.parse().ok()?, y.parse().ok()?)),
            ["z", ratio] => Self::ZoomRatio(ratio.parse().ok()?),
            ["zi", index] => Self::ZoomIndex(index.parse().ok()?),
            ["limits"] => Self::ShowLimits,
            ["limit", rest @ ..] => Self::UpdateLimits(LimitsUpdate::parse(rest)?),
            _ => {
                warn!("unknown command {:?}", line.trim());
                return None;
            }
        };
        Some(command)
    }
}
