use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::bgc::SerialBgcGimbal;

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub dev: String,
    pub baud: u32,
    pub replied: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub probes: Vec<ProbeResult>,
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/ttyACM0".into(),
        "/dev/ttyACM1".into(),
        "/dev/serial0".into(),
        "/dev/ttyAMA0".into(),
    ]
}

pub fn default_candidate_bauds() -> Vec<u32> {
    vec![115200, 57600, 230400]
}

/// Probes every device/baud pair with a get-angles request and picks the
/// first that answers with a valid frame.
pub fn autodetect_gimbal(candidate_devs: Vec<String>, candidate_bauds: Vec<u32>, reply_timeout: Duration) -> AutodetectResult {
    let mut probes = Vec::new();

    for dev in candidate_devs {
        for baud in &candidate_bauds {
            let start = Instant::now();
            let (replied, note) = match SerialBgcGimbal::open(&dev, *baud, reply_timeout) {
                Ok(mut gimbal) => match gimbal.raw_angles() {
                    Ok(raw) => (true, format!("angles {:?}", raw.target_angle)),
                    Err(e) => (false, format!("no reply: {}", e)),
                },
                Err(e) => {
                    warn!("gimbal autodetect probe failed dev={} baud={} err={}", dev, baud, e);
                    (false, format!("open failed: {}", e))
                }
            };

            probes.push(ProbeResult {
                dev: dev.clone(),
                baud: *baud,
                replied,
                elapsed_ms: start.elapsed().as_millis() as u64,
                note,
            });

            if replied {
                info!("gimbal autodetect: OK {} @ {}", dev, baud);
                return AutodetectResult { chosen: Some((dev, *baud)), probes };
            }
        }
    }

    AutodetectResult { chosen: None, probes }
}
