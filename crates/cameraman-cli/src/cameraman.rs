//! The per-frame loop of `cameraman run`.

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use cameraman_camera::manager::{CameraManager, CameraSession};
use cameraman_camera::{CameraConfig, CameraConnector, CameraHandle, DummyConnector};
use cameraman_control::controller::SmoothCameraController;
use cameraman_control::destination::Destination;
use cameraman_control::limits::{AngleLimitController, ZoomLimits};
use cameraman_control::mode::CameramanModeManager;
use cameraman_control::search::{RotateSearchTargetStrategy, SearchTargetStrategy, StaticSearchTargetStrategy};
use cameraman_control::speed::SpeedManager;
use cameraman_control::speeds::{SharedSpeed, ZoomSpeed};
use cameraman_control::tracking::{ConfigurableTrackingStrategy, StopIfLostTrackingStrategy};
use cameraman_control::updater::MaxSpeedAndAccelerationUpdater;
use cameraman_control::zoom::{zoom_ratio_of_index, ZoomRatioIndexRange};
use cameraman_gimbal::Gimbal;
use cameraman_vision::filter::filter_intersections;
use cameraman_vision::live_view::LiveView;
use cameraman_vision::selection::{SelectAtCoordinate, SelectFirst, SelectTargetStrategy};
use cameraman_vision::tracker::{ObjectId, ObjectTracker};
use cameraman_vision::{keep_label, BoundingBox, DetectionCandidate, Detector, DummyDetector};

use crate::commands::UserCommand;
use crate::{open_gimbal, Config};

const MANUAL_ZOOM_SPEED: ZoomSpeed = ZoomSpeed::InFast;

/// Mode manager plus the speeds that follow the zoom ratio.
pub(crate) struct Controls {
    pub mode_manager: CameramanModeManager,
    updater: MaxSpeedAndAccelerationUpdater,
    manual_pan_speed: SharedSpeed,
    manual_tilt_speed: SharedSpeed,
    zoom_ranges: Vec<ZoomRatioIndexRange>,
}

impl Controls {
    pub(crate) fn new(
        cfg: &Config,
        (width, height): (u32, u32),
        camera: CameraHandle,
        gimbal: Box<dyn Gimbal>,
    ) -> Result<Self> {
        let tracking = cfg.tracking();
        let search = cfg.search();
        let speed = cfg.speed();
        let limits = cfg.limits();
        let zoom = cfg.zoom();
        let mut updater = MaxSpeedAndAccelerationUpdater::default();

        let destination = Destination::new(width, height, tracking.variance);
        let align = ConfigurableTrackingStrategy::new(destination.clone(), (width, height), tracking.align_max_allowed_speed)
            .with_modes(tracking.rotation_mode, tracking.zoom_in_mode);
        updater.add(align.max_allowed_speed());
        let follow = ConfigurableTrackingStrategy::new(destination, (width, height), tracking.max_allowed_speed)
            .with_modes(tracking.rotation_mode, tracking.zoom_in_mode);
        updater.add(follow.max_allowed_speed());
        let follow = StopIfLostTrackingStrategy::new(follow, tracking.slow_down_time);

        let mut angle_limit = AngleLimitController::default();
        angle_limit.set_pan_limit(limits.pan);
        angle_limit.set_tilt_limit(limits.tilt);

        let search_strategy: Box<dyn SearchTargetStrategy> = match search.strategy.as_str() {
            "rotate" => {
                let rotate = RotateSearchTargetStrategy::new(search.speed);
                updater.add(rotate.speed());
                Box::new(rotate)
            }
            "static" => {
                let mut fixed =
                    StaticSearchTargetStrategy::new(search.speed, search.speed, zoom.limit_controller(), angle_limit.clone());
                if let Some(target) = search.target {
                    fixed.update_target(target);
                }
                Box::new(fixed)
            }
            other => anyhow::bail!("unknown search.strategy: {}", other),
        };

        let rotate_speed_manager = SpeedManager::new(speed.rotational_acceleration);
        let tilt_speed_manager = SpeedManager::new(speed.tilting_acceleration);
        updater.add(rotate_speed_manager.acceleration_handle());
        updater.add(tilt_speed_manager.acceleration_handle());
        let manual_pan_speed = updater.add(SharedSpeed::new(speed.manual_pan_speed));
        let manual_tilt_speed = updater.add(SharedSpeed::new(speed.manual_tilt_speed));
        let controller = SmoothCameraController::new(camera, rotate_speed_manager, tilt_speed_manager);

        let mut mode_manager = CameramanModeManager::new(
            Box::new(controller),
            ZoomLimits::new(zoom.limit_controller(), zoom.ratio_limits()),
            angle_limit,
            Box::new(align),
            Box::new(follow),
            search_strategy,
            gimbal,
        );
        mode_manager.is_zoom_enabled = tracking.zoom_enabled;
        mode_manager.are_limits_applied_in_manual_mode = limits.applied_in_manual_mode;

        Ok(Self {
            mode_manager,
            updater,
            manual_pan_speed,
            manual_tilt_speed,
            zoom_ranges: zoom.ratio_index_ranges.unwrap_or_default(),
        })
    }

    fn update_zoom_ratio(&mut self, zoom_ratio: f64) {
        if !(zoom_ratio > 0.0) {
            warn!("ignore invalid zoom ratio {}", zoom_ratio);
            return;
        }
        self.mode_manager.update_current_zoom_ratio(zoom_ratio);
        self.updater.on_zoom_ratio(zoom_ratio);
    }

    fn update_zoom_index(&mut self, zoom_index: u32) {
        self.mode_manager.update_current_zoom_index(zoom_index);
        match zoom_ratio_of_index(&self.zoom_ranges, zoom_index) {
            Some(zoom_ratio) => self.update_zoom_ratio(zoom_ratio),
            None => debug!("zoom index {} is not in a configured range", zoom_index),
        }
    }
}

/// Detection, target identity and mode manager of the running cameraman.
pub(crate) struct Cameraman {
    detector: Box<dyn Detector>,
    tracker: ObjectTracker,
    select: Box<dyn SelectTargetStrategy>,
    target_label_id: u32,
    image_size: (u32, u32),
    target_id: Option<ObjectId>,
    target_box: Option<BoundingBox>,
    pub controls: Controls,
}

impl Cameraman {
    pub(crate) fn new(cfg: &Config, detector: Box<dyn Detector>, image_size: (u32, u32), controls: Controls) -> Result<Self> {
        let detection = cfg.detection();
        let select: Box<dyn SelectTargetStrategy> = match detection.select.as_str() {
            "first" => Box::new(SelectFirst),
            "coordinate" => Box::new(SelectAtCoordinate::default()),
            other => anyhow::bail!("unknown detection.select: {}", other),
        };
        Ok(Self {
            detector,
            tracker: ObjectTracker::new(detection.max_disappeared),
            select,
            target_label_id: detection.target_label_id,
            image_size,
            target_id: None,
            target_box: None,
            controls,
        })
    }

    /// Processes one live view frame; `None` if no image was received.
    ///
    /// Gimbal failures skip the frame, everything else ends the loop.
    pub(crate) fn on_frame(&mut self, image: Option<&RgbImage>) -> Result<()> {
        let is_target_lost = match image {
            None => true,
            Some(image) => {
                anyhow::ensure!(
                    image.dimensions() == self.image_size,
                    "expected live view image size {:?} but got {:?}",
                    self.image_size,
                    image.dimensions()
                );
                self.find_target(image)
            }
        };
        match self.controls.mode_manager.update(self.target_box.as_ref(), is_target_lost) {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => {
                warn!("frame skipped: {}", e);
                Ok(())
            }
            Err(e) => Err(e).context("update cameraman mode"),
        }
    }

    /// Returns whether the target is lost in `image`.
    fn find_target(&mut self, image: &RgbImage) -> bool {
        let candidates = match self.detector.detect(image) {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("detection failed: {:#}", e);
                return true;
            }
        };
        let candidates = keep_label(candidates, self.target_label_id);
        log_candidates("candidates", &candidates);
        let filtered = filter_intersections(&candidates);
        log_candidates("filtered candidates", &filtered);
        let tracked = self.tracker.update(&filtered);

        if let Some(id) = self.target_id.filter(|id| self.tracker.is_registered(*id)) {
            if let Some(candidate) = tracked.get(&id) {
                self.target_box = Some(candidate.bounding_box);
            }
            return false;
        }
        match self.select.select(image, &tracked) {
            Some(target) => {
                debug!("track target {}", target.id);
                self.target_id = Some(target.id);
                self.target_box = Some(target.candidate.bounding_box);
                false
            }
            None => {
                self.target_box = None;
                true
            }
        }
    }

    /// Returns false if the cameraman should quit.
    pub(crate) fn handle(&mut self, command: UserCommand) -> bool {
        debug!("command {:?}", command);
        let pan_speed = self.controls.manual_pan_speed.get();
        let tilt_speed = self.controls.manual_tilt_speed.get();
        let mode_manager = &mut self.controls.mode_manager;
        match command {
            UserCommand::Quit => return false,
            UserCommand::Tracking => mode_manager.tracking_mode(),
            UserCommand::Manual => mode_manager.manual_mode(),
            UserCommand::RotateLeft => {
                mode_manager.manual_mode();
                mode_manager.manual_rotate(-pan_speed);
            }
            UserCommand::RotateRight => {
                mode_manager.manual_mode();
                mode_manager.manual_rotate(pan_speed);
            }
            UserCommand::TiltUp => {
                mode_manager.manual_mode();
                mode_manager.manual_tilt(tilt_speed);
            }
            UserCommand::TiltDown => {
                mode_manager.manual_mode();
                mode_manager.manual_tilt(-tilt_speed);
            }
            UserCommand::ZoomIn => {
                mode_manager.manual_mode();
                mode_manager.manual_zoom(MANUAL_ZOOM_SPEED);
            }
            UserCommand::ZoomOut => {
                mode_manager.manual_mode();
                mode_manager.manual_zoom(MANUAL_ZOOM_SPEED.reversed());
            }
            UserCommand::Stop => {
                if mode_manager.is_manual_mode() {
                    mode_manager.stop_camera();
                }
            }
            UserCommand::Angle { pan, tilt } => {
                if let Err(e) = mode_manager.angle(pan, tilt) {
                    error!("failed to move to angle: {}", e);
                }
            }
            UserCommand::SelectAt(coordinate) => {
                if self.select.request_coordinate(coordinate) {
                    self.target_id = None;
                } else {
                    warn!("target selection ignores coordinates");
                }
            }
            UserCommand::ZoomRatio(zoom_ratio) => self.controls.update_zoom_ratio(zoom_ratio),
            UserCommand::ZoomIndex(zoom_index) => self.controls.update_zoom_index(zoom_index),
            UserCommand::ShowLimits => match toml::to_string(&mode_manager.limits()) {
                Ok(limits) => print!("{}", limits),
                Err(e) => warn!("failed to serialize limits: {}", e),
            },
            UserCommand::UpdateLimits(update) => mode_manager.update_limits(update),
            UserCommand::Status => {
                let speeds = mode_manager.speeds();
                info!(
                    "mode={} target={:?} pan_speed={:.1} tilt_speed={:.1} zoom={} angles={:?}",
                    mode_manager.mode(),
                    self.target_id,
                    speeds.pan_speed,
                    speeds.tilt_speed,
                    speeds.zoom_speed,
                    mode_manager.angles()
                );
            }
        }
        true
    }
}

fn log_candidates(name: &str, candidates: &[DetectionCandidate]) {
    debug!("  {}:", name);
    for c in candidates {
        let b = &c.bounding_box;
        debug!("    ({:3.0}, {:3.0}, {:3.0}, {:3.0})", b.x, b.y, b.width, b.height);
    }
}

fn start_camera_manager(cfg: &CameraConfig) -> Result<CameraManager> {
    let connector: Box<dyn CameraConnector> = match cfg.kind.as_str() {
        "dummy" => Box::new(DummyConnector),
        other => anyhow::bail!("unknown camera.kind: {}", other),
    };
    let session = CameraSession::new(connector, cfg.identify_as.clone());
    Ok(CameraManager::start(session, Duration::from_secs(cfg.poll_interval_s)))
}

/// Reads commands on a plain thread, a blocked stdin read must not hold up
/// runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<UserCommand>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("read stdin: {}", e);
                    return;
                }
            };
            if let Some(command) = UserCommand::parse(&line) {
                if tx.blocking_send(command).is_err() {
                    return;
                }
            }
        }
        debug!("stdin closed");
    });
}

fn spawn_signal_handler(tx: mpsc::Sender<UserCommand>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("ctrl-c received");
        let _ = tx.send(UserCommand::Quit).await;
    });
}

pub(crate) async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    let started = OffsetDateTime::now_utc();

    let live_view_cfg = cfg.live_view();
    let interval = Duration::from_secs_f64(1.0 / f64::from(live_view_cfg.fps.max(1)));
    let live_view = LiveView::new(live_view_cfg)?;
    let image_size = live_view.size();

    let mut camera_manager = cfg.camera().map(start_camera_manager).transpose()?;
    let camera = camera_manager.as_ref().map(CameraManager::handle).unwrap_or_default();

    let gimbal_cfg = cfg.gimbal();
    let gimbal = tokio::task::block_in_place(|| open_gimbal(&gimbal_cfg))?;
    let controls = Controls::new(cfg, image_size, camera, gimbal)?;
    info!("run: no inference backend, detecting nothing");
    let mut cameraman = Cameraman::new(cfg, Box::new(DummyDetector), image_size, controls)?;

    let (tx, mut rx) = mpsc::channel::<UserCommand>(16);
    spawn_stdin_reader(tx.clone());
    spawn_signal_handler(tx);

    cameraman.controls.mode_manager.start();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames: u64 = 0;

    let result = loop {
        tokio::select! {
            Some(command) = rx.recv() => {
                if !tokio::task::block_in_place(|| cameraman.handle(command)) {
                    info!("run: quit");
                    break Ok(());
                }
            }
            _ = ticker.tick() => {
                let image = live_view.image().await;
                if image.is_some() {
                    frames += 1;
                    debug!("frame {}", frames);
                }
                if let Err(e) = tokio::task::block_in_place(|| cameraman.on_frame(image.as_ref())) {
                    break Err(e);
                }
            }
        }
    };

    tokio::task::block_in_place(|| cameraman.controls.mode_manager.stop());
    if let Some(manager) = camera_manager.as_mut() {
        let status = manager.status();
        info!(
            "camera: connected={} model={:?} since={:?} last_error={:?}",
            status.connected, status.model_name, status.connected_at, status.last_error
        );
        manager.cancel().await;
    }
    let elapsed = (OffsetDateTime::now_utc() - started).as_seconds_f64();
    info!("run: {} frames in {:.1}s ({:.1} fps)", frames, elapsed, frames as f64 / elapsed.max(f64::EPSILON));
    result
}
