mod cameraman;
mod commands;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use cameraman_camera::CameraConfig;
use cameraman_control::path::{PathOfMotionController, TargetSpeedCalculator};
use cameraman_control::speed::SpeedManager;
use cameraman_control::speeds::CameraSpeeds;
use cameraman_control::zoom::ZoomRatioIndexRangesBuilder;
use cameraman_control::{LimitsConfig, PathConfig, SearchConfig, SpeedConfig, TrackingConfig, ZoomConfig};
use cameraman_gimbal::autodetect::{autodetect_gimbal, default_candidate_bauds, default_candidate_devs, AutodetectResult};
use cameraman_gimbal::bgc::{open_simple_bgc_gimbal, DEFAULT_TIMEOUT};
use cameraman_gimbal::{ControlCommand, DummyGimbal, Gimbal, GimbalConfig, TiltInvertedGimbal};
use cameraman_vision::live_view::LiveViewConfig;
use cameraman_vision::DetectionConfig;

const AUTODETECT_TIMEOUT_MS: u64 = 1500;

#[derive(Debug, Parser)]
#[command(name = "cameraman", version, about = "Robot cameraman - keeps a detected person in frame with a gimbal")]
struct Cli {
    #[arg(long)]
    config: String,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    /// Track the target of the live view until `q` or ctrl-c.
    Run,
    Gimbal { #[command(subcommand)] cmd: GimbalCmd },
    /// Drive the configured path of motion to its end.
    Path,
    /// Print zoom ratio limits, or build ranges from `<index> <ratio>` samples.
    ZoomRanges {
        #[arg(long)]
        samples: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum GimbalCmd {
    /// Probe serial ports/bauds for a SimpleBGC board.
    Autodetect,
    Angles,
    Stop,
    Angle { pan: f64, tilt: f64 },
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct Config {
    live_view: Option<LiveViewConfig>,
    detection: Option<DetectionConfig>,
    tracking: Option<TrackingConfig>,
    search: Option<SearchConfig>,
    speed: Option<SpeedConfig>,
    limits: Option<LimitsConfig>,
    zoom: Option<ZoomConfig>,
    gimbal: Option<GimbalConfig>,
    camera: Option<CameraConfig>,
    path: Option<PathConfig>,
}

impl Config {
    pub(crate) fn live_view(&self) -> LiveViewConfig {
        self.live_view.clone().unwrap_or_default()
    }

    pub(crate) fn detection(&self) -> DetectionConfig {
        self.detection.clone().unwrap_or_default()
    }

    pub(crate) fn tracking(&self) -> TrackingConfig {
        self.tracking.clone().unwrap_or_default()
    }

    pub(crate) fn search(&self) -> SearchConfig {
        self.search.clone().unwrap_or_default()
    }

    pub(crate) fn speed(&self) -> SpeedConfig {
        self.speed.clone().unwrap_or_default()
    }

    pub(crate) fn limits(&self) -> LimitsConfig {
        self.limits.clone().unwrap_or_default()
    }

    pub(crate) fn zoom(&self) -> ZoomConfig {
        self.zoom.clone().unwrap_or_default()
    }

    pub(crate) fn gimbal(&self) -> GimbalConfig {
        self.gimbal.clone().unwrap_or_default()
    }

    pub(crate) fn camera(&self) -> Option<&CameraConfig> {
        self.camera.as_ref().filter(|c| c.enable)
    }

    fn path(&self) -> PathConfig {
        self.path.clone().unwrap_or_default()
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug && std::env::var_os("RUST_LOG").is_none() {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => cameraman::run(&cfg).await?,
        Command::Gimbal { cmd } => gimbal_cmd(&cfg, cmd).await?,
        Command::Path => path_of_motion(&cfg).await?,
        Command::ZoomRanges { samples } => zoom_ranges(&cfg, samples.as_deref())?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    let live_view = cfg.live_view();
    anyhow::ensure!(live_view.width > 0 && live_view.height > 0, "live_view size must not be empty");
    anyhow::ensure!(live_view.fps > 0, "live_view.fps must be positive");
    cameraman_vision::live_view::LiveView::new(live_view)?;

    let detection = cfg.detection();
    anyhow::ensure!(
        matches!(detection.select.as_str(), "first" | "coordinate"),
        "unknown detection.select: {}",
        detection.select
    );

    let tracking = cfg.tracking();
    anyhow::ensure!(tracking.variance >= 0.0, "tracking.variance must not be negative");
    anyhow::ensure!(tracking.max_allowed_speed > 0.0, "tracking.max_allowed_speed must be positive");
    anyhow::ensure!(tracking.align_max_allowed_speed > 0.0, "tracking.align_max_allowed_speed must be positive");
    if tracking.slow_down_time <= 0.0 {
        warn!("tracking.slow_down_time <= 0: the camera stops as soon as the target is lost");
    }

    let search = cfg.search();
    anyhow::ensure!(
        matches!(search.strategy.as_str(), "rotate" | "static"),
        "unknown search.strategy: {}",
        search.strategy
    );
    if search.strategy == "static" {
        anyhow::ensure!(search.target.is_some(), "search.target missing for static search");
    }

    let speed = cfg.speed();
    anyhow::ensure!(speed.rotational_acceleration > 0.0, "speed.rotational_acceleration must be positive");
    anyhow::ensure!(speed.tilting_acceleration > 0.0, "speed.tilting_acceleration must be positive");

    let limits = cfg.limits();
    for (axis, limit) in [("pan", limits.pan), ("tilt", limits.tilt)] {
        if let Some([min, max]) = limit {
            anyhow::ensure!(
                (0.0..360.0).contains(&min) && (0.0..360.0).contains(&max),
                "limits.{} must be angles in [0, 360)",
                axis
            );
        }
    }

    let zoom = cfg.zoom();
    anyhow::ensure!(matches!(zoom.limit.as_str(), "ratio" | "index"), "unknown zoom.limit: {}", zoom.limit);
    if let (Some(min), Some(max)) = (zoom.min_ratio, zoom.max_ratio) {
        anyhow::ensure!(min <= max, "zoom.min_ratio > zoom.max_ratio");
    }
    if let (Some(min), Some(max)) = (zoom.min_index, zoom.max_index) {
        anyhow::ensure!(min <= max, "zoom.min_index > zoom.max_index");
    }
    let (min_ratio, max_ratio) = zoom.ratio_limits();
    info!("doctor: zoom ratio {:.1} - {:.1}", min_ratio, max_ratio);

    let gimbal = cfg.gimbal();
    match gimbal.kind.as_str() {
        "dummy" => warn!("doctor: dummy gimbal, the camera will not move"),
        "simplebgc" => {
            if gimbal.autodetect {
                info!("doctor: gimbal autodetect enabled (OK)");
            } else {
                anyhow::ensure!(
                    gimbal.serial_dev.as_ref().map(|s| !s.is_empty()).unwrap_or(false),
                    "gimbal.serial_dev missing"
                );
                anyhow::ensure!(gimbal.baud > 0, "gimbal.baud invalid");
            }
        }
        other => anyhow::bail!("unknown gimbal.kind: {}", other),
    }

    if let Some(camera) = cfg.camera() {
        anyhow::ensure!(camera.kind == "dummy", "unknown camera.kind: {}", camera.kind);
        anyhow::ensure!(camera.poll_interval_s > 0, "camera.poll_interval_s must be positive");
    }

    let path = cfg.path();
    anyhow::ensure!(path.update_hz > 0, "path.update_hz must be positive");
    anyhow::ensure!(path.max_pan_speed > 0.0 && path.max_tilt_speed > 0.0, "path max speeds must be positive");

    info!("doctor: OK");
    Ok(())
}

pub(crate) fn open_gimbal(cfg: &GimbalConfig) -> Result<Box<dyn Gimbal>> {
    let gimbal: Box<dyn Gimbal> = match cfg.kind.as_str() {
        "dummy" => Box::new(DummyGimbal),
        "simplebgc" => {
            let (dev, baud) = resolve_gimbal_port(cfg)?;
            info!("gimbal: SimpleBGC on {} @ {}", dev, baud);
            Box::new(open_simple_bgc_gimbal(&dev, baud, gimbal_timeout(cfg)).context("gimbal open")?)
        }
        other => anyhow::bail!("unknown gimbal.kind: {}", other),
    };
    if cfg.tilt_inverted {
        return Ok(Box::new(TiltInvertedGimbal::new(gimbal)));
    }
    Ok(gimbal)
}

fn gimbal_timeout(cfg: &GimbalConfig) -> Duration {
    cfg.timeout_ms.map(Duration::from_millis).unwrap_or(DEFAULT_TIMEOUT)
}

fn run_gimbal_autodetect(cfg: &GimbalConfig) -> AutodetectResult {
    let devs = cfg.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
    let bauds = cfg.candidate_bauds.clone().unwrap_or_else(default_candidate_bauds);
    let timeout = Duration::from_millis(cfg.timeout_ms.unwrap_or(AUTODETECT_TIMEOUT_MS));
    autodetect_gimbal(devs, bauds, timeout)
}

fn resolve_gimbal_port(cfg: &GimbalConfig) -> Result<(String, u32)> {
    if cfg.autodetect {
        let res = run_gimbal_autodetect(cfg);
        if let Some((dev, baud)) = res.chosen {
            return Ok((dev, baud));
        }
        anyhow::bail!("gimbal autodetect failed: no board replied");
    }
    let dev = cfg.serial_dev.clone().context("gimbal.serial_dev missing (autodetect=false)")?;
    Ok((dev, cfg.baud))
}

async fn gimbal_cmd(cfg: &Config, cmd: GimbalCmd) -> Result<()> {
    let gimbal_cfg = cfg.gimbal();
    if let GimbalCmd::Autodetect = cmd {
        let res = tokio::task::spawn_blocking(move || run_gimbal_autodetect(&gimbal_cfg))
            .await
            .context("gimbal autodetect task")?;
        if let Some((dev, baud)) = res.chosen {
            println!("CHOSEN: {} @ {}", dev, baud);
        } else {
            println!("CHOSEN: none");
        }
        for p in res.probes {
            println!("probe dev={} baud={} reply={} {}ms note={}", p.dev, p.baud, p.replied, p.elapsed_ms, p.note);
        }
        return Ok(());
    }

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut gimbal = open_gimbal(&gimbal_cfg)?;
        match cmd {
            GimbalCmd::Angles => {
                let a = gimbal.get_angles().context("read gimbal angles")?;
                println!("pan_angle={:.2} pan_speed={:.2}", a.pan_angle, a.pan_speed);
                println!("tilt_angle={:.2} tilt_speed={:.2}", a.tilt_angle, a.tilt_speed);
            }
            GimbalCmd::Stop => gimbal.stop().context("stop gimbal")?,
            GimbalCmd::Angle { pan, tilt } => {
                anyhow::ensure!((0.0..360.0).contains(&pan), "pan angle must be in [0, 360)");
                anyhow::ensure!((0.0..360.0).contains(&tilt), "tilt angle must be in [0, 360)");
                gimbal
                    .control(&ControlCommand::angles(100.0, pan, 100.0, tilt))
                    .context("move gimbal")?;
            }
            GimbalCmd::Autodetect => {}
        }
        Ok(())
    })
    .await
    .context("gimbal task")?
}

async fn path_of_motion(cfg: &Config) -> Result<()> {
    let path_cfg = cfg.path();
    anyhow::ensure!(!path_cfg.points.is_empty(), "path.points is empty");
    anyhow::ensure!(path_cfg.update_hz > 0, "path.update_hz must be positive");
    let gimbal = open_gimbal(&cfg.gimbal())?;

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut controller = PathOfMotionController::new(
            gimbal,
            SpeedManager::new(path_cfg.pan_acceleration),
            SpeedManager::new(path_cfg.tilt_acceleration),
            TargetSpeedCalculator::new(path_cfg.max_pan_speed, path_cfg.max_tilt_speed),
        );
        for point in &path_cfg.points {
            controller.add_point(*point);
        }
        let interval = Duration::from_secs_f64(1.0 / f64::from(path_cfg.update_hz));
        let mut speeds = CameraSpeeds::default();
        controller.start();
        while !controller.is_end_of_path_reached() {
            match controller.update(&mut speeds) {
                Ok(()) => {}
                Err(e) if e.is_transient() => warn!("path update skipped: {}", e),
                Err(e) => return Err(e).context("path of motion"),
            }
            std::thread::sleep(interval);
        }
        info!("path: done");
        Ok(())
    })
    .await
    .context("path task")?
}

fn zoom_ranges(cfg: &Config, samples: Option<&str>) -> Result<()> {
    let Some(samples) = samples else {
        let (min, max) = cfg.zoom().ratio_limits();
        println!("min_ratio={:.1} max_ratio={:.1}", min, max);
        return Ok(());
    };
    let s = std::fs::read_to_string(samples).with_context(|| format!("read zoom samples {}", samples))?;
    let mut builder = ZoomRatioIndexRangesBuilder::default();
    for (i, line) in s.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (index, ratio) = parse_zoom_sample(line).with_context(|| format!("{}:{}", samples, i + 1))?;
        builder.add(index, ratio);
    }

    #[derive(serde::Serialize)]
    struct Out {
        ratio_index_ranges: Vec<cameraman_control::zoom::ZoomRatioIndexRange>,
    }
    let out = toml::to_string(&Out { ratio_index_ranges: builder.build() }).context("serialize zoom ranges")?;
    print!("{}", out);
    Ok(())
}

fn parse_zoom_sample(line: &str) -> Result<(u32, f64)> {
    let mut parts = line.split_whitespace();
    let index = parts.next().context("zoom index missing")?.parse().context("parse zoom index")?;
    let ratio = parts.next().context("zoom ratio missing")?.parse().context("parse zoom ratio")?;
    anyhow::ensure!(parts.next().is_none(), "expected `<index> <ratio>`");
    Ok((index, ratio))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[live_view]
mode = "dummy"
width = 640
height = 360

[detection]
target_label_id = 0
select = "coordinate"

[tracking]
rotation_mode = "linear"
zoom_in_mode = "fast_when_aligned"
max_allowed_speed = 20

[search]
strategy = "static"
speed = 10
target = { pan_angle = 90.0, tilt_angle = 20.0, zoom_ratio = 2.0 }

[limits]
pan = [350.0, 10.0]
applied_in_manual_mode = true

[zoom]
limit = "ratio"
max_ratio = 5.0

[gimbal]
kind = "dummy"

[camera]
enable = true

[path]
points = [
  { pan_angle = 0.0, tilt_angle = 0.0 },
  { pan_angle = 20.0, tilt_angle = 0.0, pan_clockwise = true, time = 2.0 },
]
"#;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.live_view().width, 640);
        assert_eq!(cfg.tracking().max_allowed_speed, 24.0);
        assert_eq!(cfg.search().strategy, "rotate");
        assert_eq!(cfg.gimbal().kind, "dummy");
        assert!(cfg.camera().is_none());
        assert_eq!(cfg.path().update_hz, 15);
        doctor(&cfg).unwrap();
    }

    #[test]
    fn full_config_passes_doctor() {
        let cfg = parse_config(FULL).unwrap();
        assert_eq!(cfg.live_view().height, 360);
        assert_eq!(cfg.tracking().max_allowed_speed, 20.0);
        assert_eq!(cfg.search().target.and_then(|t| t.pan_angle), Some(90.0));
        assert_eq!(cfg.limits().pan, Some([350.0, 10.0]));
        assert!(cfg.camera().is_some());
        assert_eq!(cfg.path().points.len(), 2);
        doctor(&cfg).unwrap();
    }

    #[test]
    fn doctor_rejects_invalid_sections() {
        let cases = [
            "[search]\nstrategy = \"spiral\"",
            "[search]\nstrategy = \"static\"",
            "[detection]\nselect = \"largest\"",
            "[limits]\npan = [0.0, 400.0]",
            "[zoom]\nmin_ratio = 4.0\nmax_ratio = 2.0",
            "[gimbal]\nkind = \"simplebgc\"",
            "[gimbal]\nkind = \"storm32\"",
            "[path]\nupdate_hz = 0",
        ];
        for case in cases {
            let cfg = parse_config(case).unwrap();
            assert!(doctor(&cfg).is_err(), "accepted {:?}", case);
        }
    }

    #[test]
    fn disabled_camera_is_ignored() {
        let cfg = parse_config("[camera]\nenable = false\nkind = \"lumix\"").unwrap();
        assert!(cfg.camera().is_none());
        doctor(&cfg).unwrap();
    }

    #[test]
    fn dummy_gimbal_can_be_inverted() {
        let cfg = parse_config("[gimbal]\nkind = \"dummy\"\ntilt_inverted = true").unwrap();
        let mut gimbal = open_gimbal(&cfg.gimbal()).unwrap();
        gimbal.control(&ControlCommand::speeds(1.0, 1.0)).unwrap();
        assert_eq!(gimbal.get_angles().unwrap().tilt_angle, 0.0);
    }

    #[test]
    fn zoom_samples() {
        assert_eq!(parse_zoom_sample("12 2.5").unwrap(), (12, 2.5));
        assert!(parse_zoom_sample("12").is_err());
        assert!(parse_zoom_sample("12 2.5 1").is_err());
        assert!(parse_zoom_sample("x 2.5").is_err());
    }
}
