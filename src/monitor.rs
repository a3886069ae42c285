use crate::classifier::ClassifierProvider;
use crate::config::CribwatchConfig;
use crate::detector::{CryingDetector, MovementDetector, PositionDetector};
use crate::error::{CameraError, Result};
use crate::events::{EventBus, MonitorEvent};
use crate::source::{AudioSink, AudioSource, CameraSession, PoseEstimator};
use crate::status::{
    AlertEvent, AlertKind, DetectionCapabilities, DetectionMethod, MonitorState, MovementStatus,
    PausedReason, PositionStatus,
};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters describing a monitoring session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorMetrics {
    pub ticks: u64,
    pub frames_analyzed: u64,
    pub alerts_raised: u64,
    pub status_changes: u64,
}

/// A recently raised alert with its wall-clock time for display
#[derive(Debug, Clone)]
pub struct AlertLogEntry {
    pub alert: AlertEvent,
    pub local_time: DateTime<Local>,
}

impl AlertLogEntry {
    fn new(alert: AlertEvent) -> Self {
        Self {
            local_time: DateTime::<Local>::from(alert.raised_at),
            alert,
        }
    }

    /// Short wall-clock label, e.g. for a history list
    pub fn time(&self) -> String {
        self.local_time.format("%H:%M").to_string()
    }
}

/// The single surfaced alert: at most one undismissed alert exists at a
/// time, and a same-kind alert is not re-raised within its cooldown.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveAlert {
    kind: AlertKind,
    raised_at: SystemTime,
}

/// Orchestrates the three detectors on a fixed cadence, applies the alert
/// debounce/cooldown policy, and emits alert and status events.
///
/// Detectors run synchronously and sequentially within each tick; the
/// crying detector is fed off-tick by the audio collaborator and only its
/// latest published estimate is read here. The tick loop is owned by this
/// coordinator and cancelled deterministically on `stop()`.
pub struct MonitoringCoordinator {
    core: Arc<CoordinatorCore>,
    tick_task: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl MonitoringCoordinator {
    pub fn new(
        config: CribwatchConfig,
        camera: Arc<dyn CameraSession>,
        audio: Arc<dyn AudioSource>,
        provider: Arc<dyn ClassifierProvider>,
        pose_estimator: Arc<dyn PoseEstimator>,
        event_bus: EventBus,
    ) -> Self {
        let position = PositionDetector::new(config.position.clone(), pose_estimator);
        let movement = MovementDetector::new(config.movement.clone());
        let crying = Arc::new(CryingDetector::new(config.crying.clone()));

        let core = Arc::new(CoordinatorCore {
            config,
            camera,
            audio,
            provider,
            position,
            movement,
            crying,
            event_bus,
            state: Mutex::new(MonitorState::Idle),
            active_alert: Mutex::new(None),
            last_status: Mutex::new(None),
            alert_log: Mutex::new(VecDeque::new()),
            mic_enabled: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            frames_analyzed: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            status_changes: AtomicU64::new(0),
        });

        Self {
            core,
            tick_task: None,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Start monitoring. Camera permission is required; microphone
    /// permission is optional and only gates crying detection.
    pub async fn start(&mut self) -> Result<()> {
        if self.tick_task.is_some() {
            warn!("Monitoring is already running");
            return Ok(());
        }

        if !self.core.camera.request_camera_permission().await {
            self.core.set_state(MonitorState::PermissionDenied).await;
            return Err(CameraError::PermissionDenied.into());
        }

        let mic_granted = self.core.camera.request_microphone_permission().await;

        if let Err(e) = self.core.camera.start_capture().await {
            warn!("Camera capture failed to start: {}", e);
            self.core.set_state(MonitorState::CameraUnavailable).await;
            return Err(e.into());
        }

        self.core.position.start(&*self.core.provider);
        self.core.movement.start();

        self.core.mic_enabled.store(mic_granted, Ordering::SeqCst);
        if mic_granted {
            self.core.crying.start(&*self.core.provider);
            self.core
                .audio
                .attach(Arc::clone(&self.core.crying) as Arc<dyn AudioSink>);
        } else {
            info!("Microphone permission denied - crying detection disabled");
        }

        self.core.reset_session_state();
        self.core.set_state(MonitorState::Active).await;

        let capabilities = self.core.capabilities();
        if capabilities.using_custom_models() {
            info!("Monitoring started with custom detection models");
        } else {
            info!("Monitoring started with built-in detection heuristics");
        }

        let core = Arc::clone(&self.core);
        let token = CancellationToken::new();
        self.cancel_token = token.clone();
        let period = Duration::from_millis(self.core.config.monitor.tick_interval_ms);

        self.tick_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Monitoring tick loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        core.tick(SystemTime::now()).await;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Stop monitoring and tear down all detector state. Safe to call
    /// while a tick is in flight; a later `start()` begins a fresh session
    /// with empty rolling windows and timers.
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.tick_task.take() {
            if let Err(e) = task.await {
                warn!("Tick task ended abnormally: {}", e);
            }
        }

        self.core.audio.detach();
        self.core.crying.stop();
        self.core.movement.stop();
        self.core.position.stop();
        self.core.camera.stop_capture();

        self.core.reset_session_state();
        self.core.set_state(MonitorState::Idle).await;
    }

    /// Pause analysis without tearing down the session
    pub async fn pause(&self, reason: PausedReason) {
        if self.core.state().is_active() {
            self.core.set_state(MonitorState::Paused(reason)).await;
        } else {
            warn!("Pause requested while not actively monitoring");
        }
    }

    /// Resume from a paused state
    pub async fn resume(&self) {
        if matches!(self.core.state(), MonitorState::Paused(_)) {
            self.core.set_state(MonitorState::Active).await;
        } else {
            warn!("Resume requested while not paused");
        }
    }

    /// Dismiss the surfaced alert of the given kind, clearing its active
    /// marker immediately so a different kind can raise without waiting
    /// for expiry.
    pub fn dismiss(&self, kind: AlertKind) {
        self.core.clear_active(kind);
    }

    /// Acknowledge the surfaced alert. Same lifecycle effect as dismissal.
    pub fn acknowledge(&self, kind: AlertKind) {
        debug!("Alert acknowledged: {:?}", kind);
        self.core.clear_active(kind);
    }

    pub fn state(&self) -> MonitorState {
        self.core.state()
    }

    /// The currently surfaced alert, if any
    pub fn active_alert(&self) -> Option<(AlertKind, SystemTime)> {
        (*self.core.active_alert.lock()).map(|a| (a.kind, a.raised_at))
    }

    pub fn metrics(&self) -> MonitorMetrics {
        self.core.metrics()
    }

    /// Recent alerts, oldest first
    pub fn recent_alerts(&self) -> Vec<AlertLogEntry> {
        self.core.alert_log.lock().iter().cloned().collect()
    }

    /// Which detection backends this session resolved
    pub fn capabilities(&self) -> DetectionCapabilities {
        self.core.capabilities()
    }
}

struct CoordinatorCore {
    config: CribwatchConfig,
    camera: Arc<dyn CameraSession>,
    audio: Arc<dyn AudioSource>,
    provider: Arc<dyn ClassifierProvider>,
    position: PositionDetector,
    movement: MovementDetector,
    crying: Arc<CryingDetector>,
    event_bus: EventBus,
    state: Mutex<MonitorState>,
    active_alert: Mutex<Option<ActiveAlert>>,
    last_status: Mutex<Option<(PositionStatus, MovementStatus)>>,
    alert_log: Mutex<VecDeque<AlertLogEntry>>,
    mic_enabled: AtomicBool,
    ticks: AtomicU64,
    frames_analyzed: AtomicU64,
    alerts_raised: AtomicU64,
    status_changes: AtomicU64,
}

impl CoordinatorCore {
    /// One analysis pass. Detector failures degrade to neutral estimates
    /// inside the detectors; nothing here can take down the tick loop.
    async fn tick(&self, now: SystemTime) {
        if !self.state().is_active() {
            return;
        }

        self.ticks.fetch_add(1, Ordering::Relaxed);

        let frame = match self.camera.current_frame() {
            Some(frame) => frame,
            None => {
                debug!("No frame available yet");
                return;
            }
        };
        self.frames_analyzed.fetch_add(1, Ordering::Relaxed);

        let position = self.position.detect(&frame);
        let movement = self.movement.detect(&frame);
        let crying = self.crying.latest_estimate();

        self.publish_status_if_changed(position.position, movement.status, now)
            .await;

        if position.position == PositionStatus::OnStomach
            && position.confidence > self.config.monitor.stomach_alert_confidence
        {
            self.maybe_raise(AlertKind::RolledOntoStomach, now).await;
        }

        if position.face_may_be_covered {
            self.maybe_raise(AlertKind::FaceMayBeCovered, now).await;
        }

        // The detector flags Unusual on its own 120 s threshold; the
        // coordinator re-checks the duration before alerting.
        if movement.status == MovementStatus::Unusual
            && movement.stillness_duration
                > Duration::from_secs(self.config.monitor.stillness_recheck_seconds)
        {
            self.maybe_raise(AlertKind::UnusualStillness, now).await;
        }

        if crying.map(|c| c.is_crying).unwrap_or(false) {
            self.maybe_raise(AlertKind::CryingDetected, now).await;
        }
    }

    /// Debounced alert raising: a same-kind alert inside the cooldown is
    /// suppressed; the active marker expires after the cooldown, so the
    /// kind may raise again without explicit dismissal. A different kind
    /// always replaces the marker (latest raised wins).
    async fn maybe_raise(&self, kind: AlertKind, now: SystemTime) {
        let cooldown = Duration::from_secs(self.config.monitor.alert_cooldown_seconds);

        {
            let active = self.active_alert.lock();
            if let Some(active) = *active {
                let age = now.duration_since(active.raised_at).unwrap_or_default();
                if active.kind == kind && age < cooldown {
                    debug!(
                        "Suppressing duplicate {:?} alert ({:.0}s into cooldown)",
                        kind,
                        age.as_secs_f64()
                    );
                    return;
                }
            }
        }

        *self.active_alert.lock() = Some(ActiveAlert {
            kind,
            raised_at: now,
        });

        let alert = AlertEvent::new(kind, now);

        {
            let mut log = self.alert_log.lock();
            log.push_back(AlertLogEntry::new(alert.clone()));
            while log.len() > self.config.monitor.alert_log_capacity {
                log.pop_front();
            }
        }

        self.alerts_raised.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self
            .event_bus
            .publish(MonitorEvent::AlertRaised { alert })
            .await
        {
            debug!("Alert event not delivered: {}", e);
        }
    }

    fn clear_active(&self, kind: AlertKind) {
        let mut active = self.active_alert.lock();
        if (*active).map(|a| a.kind) == Some(kind) {
            debug!("Active alert cleared: {:?}", kind);
            *active = None;
        }
    }

    async fn publish_status_if_changed(
        &self,
        position: PositionStatus,
        movement: MovementStatus,
        now: SystemTime,
    ) {
        {
            let mut last = self.last_status.lock();
            if *last == Some((position, movement)) {
                return;
            }
            *last = Some((position, movement));
        }

        self.status_changes.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self
            .event_bus
            .publish(MonitorEvent::StatusChanged {
                position,
                movement,
                timestamp: now,
            })
            .await
        {
            debug!("Status event not delivered: {}", e);
        }
    }

    fn state(&self) -> MonitorState {
        *self.state.lock()
    }

    async fn set_state(&self, state: MonitorState) {
        {
            let mut current = self.state.lock();
            if *current == state {
                return;
            }
            *current = state;
        }

        if let Err(e) = self
            .event_bus
            .publish(MonitorEvent::StateChanged {
                state,
                timestamp: SystemTime::now(),
            })
            .await
        {
            debug!("State event not delivered: {}", e);
        }
    }

    fn reset_session_state(&self) {
        *self.active_alert.lock() = None;
        *self.last_status.lock() = None;
    }

    fn capabilities(&self) -> DetectionCapabilities {
        let crying = if self.mic_enabled.load(Ordering::SeqCst) {
            self.crying.capability()
        } else {
            DetectionMethod::Disabled
        };

        DetectionCapabilities {
            position_detection: self.position.capability(),
            crying_detection: crying,
            face_coverage_detection: self.position.coverage_capability(),
        }
    }

    fn metrics(&self) -> MonitorMetrics {
        MonitorMetrics {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            status_changes: self.status_changes.load(Ordering::Relaxed),
        }
    }
}
