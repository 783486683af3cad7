//! Playback scheduler: walks the frame index in time.
//!
//! # State machine
//!
//! ```text
//!            run()                 toggle()
//!   Idle ───────────► Running ◄──────────────► Paused
//!    ▲                  │      seek() forces       │
//!    └──── last frame ──┘      Paused              │
//!    └──────────────────── last frame ─────────────┘
//! ```
//!
//! The loop is one cooperative task that suspends in exactly two places: the
//! pause wait and the inter-frame delay. Both wake early on [`Player::toggle`]
//! and [`Player::seek`]; the pause wait additionally re-checks every
//! [`PAUSE_POLL`], which bounds how long a request can go unnoticed.
//!
//! [`Player`] is a cheap handle; clones share the same viewer, scenario and
//! control state. Locks are never held across a suspension point.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use tafview_env::ReplayContext;

use crate::canvas::Canvas;
use crate::error::{ReplayError, Result};
use crate::frames::{Frame, FrameIndex};
use crate::render::Polyline;
use crate::viewer::Viewer;

/// Pause re-check interval.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Delay used when the next frame has no timestamp. Not scaled by speed.
pub const FALLBACK_DELAY: Duration = Duration::from_millis(100);

/// Timing knobs of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub pause_poll: Duration,
    pub fallback_delay: Duration,
    pub initial_speed: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pause_poll: PAUSE_POLL,
            fallback_delay: FALLBACK_DELAY,
            initial_speed: 1.0,
        }
    }
}

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Running,
    Paused,
}

/// How a call to [`Player::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every frame was visited
    Completed,
    /// Another loop was already active; nothing happened
    AlreadyActive,
    /// No scenario (or an empty one) is loaded
    NothingLoaded,
}

/// Snapshot published on every state change and rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub frame_id: Option<i64>,
    pub index: usize,
    pub total: usize,
    pub speed: f64,
}

impl PlaybackStatus {
    fn idle(total: usize, speed: f64) -> Self {
        Self {
            state: PlaybackState::Idle,
            frame_id: None,
            index: 0,
            total,
            speed,
        }
    }

    /// Position in the frame sequence, rounded to whole percent.
    pub fn progress_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.index as f64 / self.total as f64 * 100.0).round() as u32
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame_id {
            Some(id) => write!(f, "t={} ({} %)", id, self.progress_percent()),
            None => write!(f, "t=- ({} %)", self.progress_percent()),
        }
    }
}

/// Delay before advancing from the frame at `index` to the next one.
///
/// `(ts(next) - ts(current)) / speed`, clamped at zero. Without a next frame,
/// or when the next frame is empty, the fallback is returned unscaled.
pub fn frame_delay(frames: &FrameIndex, index: usize, speed: f64, fallback: Duration) -> Duration {
    match (frames.timestamp_at(index), frames.timestamp_at(index + 1)) {
        (Some(t0), Some(t1)) => {
            let Some(gap) = t1.checked_sub(t0) else {
                return fallback;
            };
            let ms = gap as f64 / speed;
            if ms.is_finite() && ms > 0.0 {
                Duration::from_micros((ms * 1000.0).round() as u64)
            } else {
                Duration::ZERO
            }
        }
        _ => fallback,
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

/// Scheduler state. Loop start and exit flip `active` under this lock only.
#[derive(Debug)]
struct Control {
    active: bool,
    state: PlaybackState,
    speed: f64,
    pending_seek: Option<usize>,
    staged_start: Option<usize>,
}

#[derive(Clone)]
struct Scenario {
    frames: Arc<FrameIndex>,
    map: Option<Arc<Vec<Polyline>>>,
}

struct Shared<C: Canvas> {
    viewer: Mutex<Viewer<C>>,
    control: Mutex<Control>,
    scenario: Mutex<Option<Scenario>>,
    wake: Notify,
    status: watch::Sender<PlaybackStatus>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Marks the loop inactive and idle when `run` returns or is dropped.
struct ActiveGuard<'a, C: Canvas> {
    shared: &'a Shared<C>,
    total: usize,
}

impl<C: Canvas> Drop for ActiveGuard<'_, C> {
    fn drop(&mut self) {
        let mut control = lock(&self.shared.control);
        control.active = false;
        control.state = PlaybackState::Idle;
        control.pending_seek = None;
        let speed = control.speed;
        self.shared.status.send_modify(|s| {
            s.state = PlaybackState::Idle;
            s.total = self.total;
            s.speed = speed;
        });
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Playback control surface over one viewer.
pub struct Player<Ctx, C: Canvas> {
    ctx: Arc<Ctx>,
    shared: Arc<Shared<C>>,
    config: PlaybackConfig,
}

impl<Ctx, C: Canvas> Clone for Player<Ctx, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            shared: Arc::clone(&self.shared),
            config: self.config,
        }
    }
}

impl<Ctx, C> Player<Ctx, C>
where
    Ctx: ReplayContext,
    C: Canvas + Send + 'static,
{
    pub fn new(ctx: Arc<Ctx>, viewer: Viewer<C>, config: PlaybackConfig) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::idle(0, config.initial_speed));
        let shared = Shared {
            viewer: Mutex::new(viewer),
            control: Mutex::new(Control {
                active: false,
                state: PlaybackState::Idle,
                speed: config.initial_speed,
                pending_seek: None,
                staged_start: None,
            }),
            scenario: Mutex::new(None),
            wake: Notify::new(),
            status,
        };
        Self {
            ctx,
            shared: Arc::new(shared),
            config,
        }
    }

    /// Replaces the scenario. Rejected while a loop is active.
    pub fn load(&self, frames: FrameIndex, map: Option<Vec<Polyline>>) -> Result<()> {
        // Lock order: control, then scenario, then viewer.
        let mut control = lock(&self.shared.control);
        if control.active {
            warn!("scenario load rejected during playback");
            return Err(ReplayError::PlaybackActive);
        }
        let total = frames.len();
        info!(frames = total, agents = frames.agent_count(), map = map.is_some(), "scenario loaded");

        *lock(&self.shared.scenario) = Some(Scenario {
            frames: Arc::new(frames),
            map: map.map(Arc::new),
        });
        lock(&self.shared.viewer).reset();

        control.state = PlaybackState::Idle;
        control.pending_seek = None;
        control.staged_start = None;
        self.shared
            .status
            .send_replace(PlaybackStatus::idle(total, control.speed));
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        lock(&self.shared.control).state
    }

    pub fn speed(&self) -> f64 {
        lock(&self.shared.control).speed
    }

    /// Status updates; the receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.shared.status.subscribe()
    }

    /// Sets the speed factor used by the next delay computation.
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            warn!(speed, "rejected playback speed");
            return Err(ReplayError::InvalidSpeed(speed));
        }
        lock(&self.shared.control).speed = speed;
        self.shared.status.send_modify(|s| s.speed = speed);
        debug!(speed, "speed changed");
        Ok(())
    }

    /// Flips running and paused. Does nothing while idle.
    pub fn toggle(&self) -> PlaybackState {
        let state = {
            let mut control = lock(&self.shared.control);
            control.state = match control.state {
                PlaybackState::Running => PlaybackState::Paused,
                PlaybackState::Paused => PlaybackState::Running,
                PlaybackState::Idle => PlaybackState::Idle,
            };
            control.state
        };
        if state != PlaybackState::Idle {
            debug!(?state, "playback toggled");
            self.shared.status.send_modify(|s| s.state = state);
            self.shared.wake.notify_one();
        }
        state
    }

    /// Requests a jump to a frame position (clamped to the last frame).
    ///
    /// During playback this pauses and the loop jumps on its next tick. While
    /// idle with a scenario loaded, the position becomes the start of the next
    /// `run`.
    pub fn seek(&self, index: usize) {
        let mut control = lock(&self.shared.control);
        let total = lock(&self.shared.scenario)
            .as_ref()
            .map_or(0, |s| s.frames.len());
        if total == 0 {
            return;
        }
        let target = index.min(total - 1);

        let active = control.active;
        if active {
            control.pending_seek = Some(target);
            control.state = PlaybackState::Paused;
            self.shared.status.send_modify(|s| s.state = PlaybackState::Paused);
        } else {
            control.staged_start = Some(target);
        }
        drop(control);

        debug!(target, active, "seek requested");
        if active {
            self.shared.wake.notify_one();
        }
    }

    pub fn adjust_zoom(&self, wheel_delta: f64) -> bool {
        lock(&self.shared.viewer).adjust_zoom(wheel_delta)
    }

    pub fn adjust_offset(&self, delta: Vector2<f64>) -> bool {
        lock(&self.shared.viewer).adjust_offset(delta)
    }

    pub fn set_show_orientation(&self, show: bool) {
        lock(&self.shared.viewer).set_show_orientation(show);
    }

    pub fn set_show_labels(&self, show: bool) {
        lock(&self.shared.viewer).set_show_labels(show);
    }

    /// Runs `f` with the viewer locked.
    pub fn with_viewer<R>(&self, f: impl FnOnce(&mut Viewer<C>) -> R) -> R {
        f(&mut lock(&self.shared.viewer))
    }

    /// Plays the loaded scenario to the end.
    ///
    /// A second call while a loop is active returns
    /// [`RunOutcome::AlreadyActive`] without side effects.
    pub async fn run(&self) -> RunOutcome {
        let (frames, map, mut i) = {
            let mut control = lock(&self.shared.control);
            if control.active {
                warn!("playback already active, ignoring run request");
                return RunOutcome::AlreadyActive;
            }
            let Some(scenario) = lock(&self.shared.scenario).clone() else {
                return RunOutcome::NothingLoaded;
            };
            if scenario.frames.is_empty() {
                return RunOutcome::NothingLoaded;
            }

            control.active = true;
            control.state = PlaybackState::Running;
            control.pending_seek = None;
            let start = control.staged_start.take().unwrap_or(0);
            let total = scenario.frames.len();
            self.shared.status.send_modify(|s| {
                s.state = PlaybackState::Running;
                s.total = total;
            });
            (scenario.frames, scenario.map, start)
        };
        let total = frames.len();
        let _guard = ActiveGuard {
            shared: &*self.shared,
            total,
        };
        info!(frames = total, start = i, "playback started");

        while i < total {
            let (paused, seek) = {
                let mut control = lock(&self.shared.control);
                (control.state == PlaybackState::Paused, control.pending_seek.take())
            };

            if let Some(target) = seek {
                debug!(from = i, to = target, "seek consumed");
                i = target;
                if paused {
                    match frames.frame_at(i) {
                        Some(frame) if !frame.is_empty() => {
                            self.render(frame, map.as_deref(), i, total)
                        }
                        _ => debug!(index = i, "seek target is empty, keeping current image"),
                    }
                }
            }

            if paused {
                self.wait_paused().await;
                continue;
            }

            let Some(frame) = frames.frame_at(i) else {
                break;
            };
            if frame.is_empty() {
                debug!(frame_id = frame.id, "skipping empty frame");
                i += 1;
                continue;
            }

            self.render(frame, map.as_deref(), i, total);

            if i + 1 < total {
                let delay = frame_delay(&frames, i, self.speed(), self.config.fallback_delay);
                self.wait_delay(delay).await;
            }
            i += 1;
        }

        info!(frames = total, "playback finished");
        RunOutcome::Completed
    }

    fn render(&self, frame: &Frame, map: Option<&Vec<Polyline>>, index: usize, total: usize) {
        {
            let mut viewer = lock(&self.shared.viewer);
            viewer.render_frame(&frame.agents);
            if let Some(map) = map {
                viewer.draw_map(map);
            }
        }
        debug!(frame_id = frame.id, index, agents = frame.agents.len(), "frame rendered");
        self.shared.status.send_modify(|s| {
            s.frame_id = Some(frame.id);
            s.index = index;
            s.total = total;
        });
    }

    fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    /// One pause tick: returns on wake-up or after the poll interval.
    async fn wait_paused(&self) {
        tokio::select! {
            _ = self.shared.wake.notified() => {}
            _ = self.ctx.sleep(self.config.pause_poll) => {}
        }
    }

    /// Sleeps for `delay`, returning early if playback gets paused.
    async fn wait_delay(&self, delay: Duration) {
        let deadline = self.ctx.now() + delay;
        loop {
            let now = self.ctx.now();
            if now >= deadline {
                return;
            }
            tokio::select! {
                _ = self.ctx.sleep(deadline - now) => return,
                _ = self.shared.wake.notified() => {
                    if self.is_paused() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::frames::{AgentPose, Category};
    use crate::projection::ViewConfig;
    use nalgebra::Point2;
    use tafview_env::{SimContext, TokioContext};

    fn agent(frame: i64, track: &str, ts: i64) -> AgentPose {
        AgentPose::new(frame, track, 5.0, 5.0)
            .with_dimensions(2.0, 1.0)
            .with_category(Category::Car)
            .with_timestamp(ts)
    }

    fn frames(entries: &[(i64, i64)]) -> FrameIndex {
        FrameIndex::build(entries.iter().map(|&(id, ts)| agent(id, "a", ts)))
    }

    fn player<Ctx: ReplayContext>(ctx: Arc<Ctx>) -> Player<Ctx, RecordingCanvas> {
        let mut viewer = Viewer::new(
            RecordingCanvas::new(100.0, 100.0).with_history(),
            ViewConfig::default(),
        );
        viewer.set_data_bounds(0.0, 0.0, 10.0, 10.0).unwrap();
        Player::new(ctx, viewer, PlaybackConfig::default())
    }

    fn drawn_labels<Ctx: ReplayContext>(p: &Player<Ctx, RecordingCanvas>) -> Vec<String> {
        p.with_viewer(|v| {
            v.canvas()
                .history()
                .unwrap_or_default()
                .iter()
                .filter_map(|c| match c {
                    DrawCommand::Text { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    #[test]
    fn test_delay_scaled_by_speed() {
        let index = frames(&[(1, 1000), (2, 1500)]);
        assert_eq!(
            frame_delay(&index, 0, 2.0, FALLBACK_DELAY),
            Duration::from_millis(250)
        );
        assert_eq!(
            frame_delay(&index, 0, 0.5, FALLBACK_DELAY),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_delay_fallbacks() {
        let index = FrameIndex::from_frames([
            (1, vec![agent(1, "a", 1000)]),
            (2, vec![]),
            (3, vec![agent(3, "a", 900)]),
        ]);

        // Next frame empty
        assert_eq!(frame_delay(&index, 0, 3.0, FALLBACK_DELAY), FALLBACK_DELAY);
        // Last frame, regardless of speed
        assert_eq!(frame_delay(&index, 2, 0.25, FALLBACK_DELAY), FALLBACK_DELAY);
        assert_eq!(frame_delay(&index, 2, 8.0, FALLBACK_DELAY), FALLBACK_DELAY);

        // Timestamps running backwards clamp to zero
        let backwards = frames(&[(1, 500), (2, 100)]);
        assert_eq!(frame_delay(&backwards, 0, 1.0, FALLBACK_DELAY), Duration::ZERO);
    }

    #[test]
    fn test_status_display() {
        let status = PlaybackStatus {
            state: PlaybackState::Running,
            frame_id: Some(42),
            index: 1,
            total: 3,
            speed: 1.0,
        };
        assert_eq!(status.progress_percent(), 33);
        assert_eq!(status.to_string(), "t=42 (33 %)");
        assert_eq!(PlaybackStatus::idle(0, 1.0).progress_percent(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_skips_empty_frame() {
        let ctx = SimContext::shared();
        let p = player(Arc::clone(&ctx));
        let index = FrameIndex::from_frames([
            (1, vec![agent(1, "A", 1000)]),
            (2, vec![]),
            (3, vec![agent(3, "B", 1200)]),
        ]);
        p.load(index, None).unwrap();
        p.set_show_labels(true);

        assert_eq!(p.run().await, RunOutcome::Completed);

        assert_eq!(drawn_labels(&p), vec!["A", "t=1", "B", "t=3"]);
        // Only the fallback after frame 1; nothing after the last frame
        assert_eq!(ctx.recorded_sleeps(), vec![FALLBACK_DELAY]);
        assert_eq!(p.state(), PlaybackState::Idle);

        let status = p.subscribe().borrow().clone();
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.frame_id, Some(3));
    }

    #[tokio::test]
    async fn test_delays_follow_timestamps_and_speed() {
        let ctx = SimContext::shared();
        let p = player(Arc::clone(&ctx));
        p.load(frames(&[(1, 0), (2, 1000), (3, 3000)]), None).unwrap();
        p.set_speed(4.0).unwrap();

        assert_eq!(p.run().await, RunOutcome::Completed);
        assert_eq!(
            ctx.recorded_sleeps(),
            vec![Duration::from_millis(250), Duration::from_millis(500)]
        );
        assert_eq!(ctx.now(), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_map_drawn_each_frame() {
        let ctx = SimContext::shared();
        let p = player(ctx);
        let map = vec![vec![Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)]];
        p.load(frames(&[(1, 0), (2, 100)]), Some(map)).unwrap();

        p.run().await;

        let map_strokes = p.with_viewer(|v| {
            v.canvas()
                .history()
                .unwrap_or_default()
                .iter()
                .filter(|c| matches!(c, DrawCommand::Stroke { color, .. } if color == "#FFFFFF66"))
                .count()
        });
        assert_eq!(map_strokes, 2);
    }

    #[tokio::test]
    async fn test_run_without_scenario() {
        let p = player(SimContext::shared());
        assert_eq!(p.run().await, RunOutcome::NothingLoaded);

        p.load(FrameIndex::default(), None).unwrap();
        assert_eq!(p.run().await, RunOutcome::NothingLoaded);
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let p = player(SimContext::shared());
        assert_eq!(p.set_speed(0.0), Err(ReplayError::InvalidSpeed(0.0)));
        assert!(p.set_speed(-1.0).is_err());
        assert!(p.set_speed(f64::NAN).is_err());
        assert_eq!(p.speed(), 1.0);

        p.set_speed(2.5).unwrap();
        assert_eq!(p.speed(), 2.5);
    }

    #[test]
    fn test_toggle_is_noop_when_idle() {
        let p = player(SimContext::shared());
        assert_eq!(p.toggle(), PlaybackState::Idle);

        p.load(frames(&[(1, 0)]), None).unwrap();
        assert_eq!(p.toggle(), PlaybackState::Idle);
        assert_eq!(p.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_seek_while_idle_stages_start() {
        let ctx = SimContext::shared();
        let p = player(Arc::clone(&ctx));
        p.load(frames(&[(1, 0), (2, 100), (3, 200)]), None).unwrap();

        p.seek(1);
        assert_eq!(p.state(), PlaybackState::Idle);
        assert_eq!(p.run().await, RunOutcome::Completed);

        assert_eq!(drawn_labels(&p), vec!["t=2", "t=3"]);
        assert_eq!(ctx.recorded_sleeps(), vec![Duration::from_millis(100)]);
    }

    #[tokio::test]
    async fn test_seek_after_completion_stays_idle() {
        let ctx = SimContext::shared();
        let p = player(Arc::clone(&ctx));
        p.load(frames(&[(1, 0), (2, 100), (3, 200)]), None).unwrap();
        assert_eq!(p.run().await, RunOutcome::Completed);

        p.seek(1);
        assert_eq!(p.state(), PlaybackState::Idle);
        assert_eq!(p.subscribe().borrow().state, PlaybackState::Idle);
        assert_eq!(p.toggle(), PlaybackState::Idle);

        // The staged position starts the next run
        assert_eq!(p.run().await, RunOutcome::Completed);
        assert_eq!(
            drawn_labels(&p),
            vec!["t=1", "t=2", "t=3", "t=2", "t=3"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_seek_to_empty_frame_keeps_image() {
        let p = player(TokioContext::shared());
        let index = FrameIndex::from_frames([
            (1, vec![agent(1, "A", 1000)]),
            (2, vec![]),
            (3, vec![agent(3, "B", 1200)]),
        ]);
        let map = vec![vec![Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)]];
        p.load(index, Some(map)).unwrap();

        let task = tokio::spawn({
            let p = p.clone();
            async move { p.run().await }
        });
        let mut status = p.subscribe();
        status.wait_for(|s| s.frame_id == Some(1)).await.unwrap();

        p.seek(1);
        tokio::time::sleep(PAUSE_POLL * 3).await;

        assert_eq!(p.state(), PlaybackState::Paused);
        assert_eq!(p.subscribe().borrow().frame_id, Some(1));
        p.with_viewer(|v| {
            assert_eq!(v.canvas().texts(), vec!["t=1"]);
            assert!(v.renderer().cache().frame.as_ref().is_some_and(|f| !f.is_empty()));
        });

        // Resuming skips the empty frame
        assert_eq!(p.toggle(), PlaybackState::Running);
        assert_eq!(task.await.unwrap(), RunOutcome::Completed);
        assert_eq!(drawn_labels(&p), vec!["t=1", "t=3"]);
    }

    #[test]
    fn test_delay_falls_back_on_timestamp_overflow() {
        let index = frames(&[(1, i64::MIN), (2, i64::MAX)]);
        assert_eq!(frame_delay(&index, 0, 1.0, FALLBACK_DELAY), FALLBACK_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_during_playback_keeps_loop_controllable() {
        let p = player(TokioContext::shared());
        p.load(frames(&[(1, 0), (2, 1000), (3, 2000)]), None).unwrap();

        let task = tokio::spawn({
            let p = p.clone();
            async move { p.run().await }
        });
        let mut status = p.subscribe();
        status.wait_for(|s| s.frame_id == Some(1)).await.unwrap();

        let rejected = p.load(frames(&[(9, 0)]), None);
        assert!(matches!(rejected, Err(ReplayError::PlaybackActive)));
        assert_eq!(p.state(), PlaybackState::Running);

        assert_eq!(p.toggle(), PlaybackState::Paused);
        assert_eq!(p.toggle(), PlaybackState::Running);
        assert_eq!(task.await.unwrap(), RunOutcome::Completed);
        assert_eq!(drawn_labels(&p), vec!["t=1", "t=2", "t=3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_ignored() {
        let p = player(TokioContext::shared());
        p.load(frames(&[(1, 0), (2, 1000), (3, 2000)]), None).unwrap();

        let first = tokio::spawn({
            let p = p.clone();
            async move { p.run().await }
        });
        let mut status = p.subscribe();
        status
            .wait_for(|s| s.state == PlaybackState::Running)
            .await
            .unwrap();

        assert_eq!(p.run().await, RunOutcome::AlreadyActive);
        assert!(p.load(frames(&[(9, 0)]), None).is_err());

        assert_eq!(first.await.unwrap(), RunOutcome::Completed);
        assert_eq!(p.state(), PlaybackState::Idle);
        assert!(p.load(frames(&[(9, 0)]), None).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_response_within_poll_interval() {
        let p = player(TokioContext::shared());
        // Ten seconds between frames
        p.load(frames(&[(1, 0), (2, 10_000), (3, 20_000)]), None).unwrap();

        let task = tokio::spawn({
            let p = p.clone();
            async move { p.run().await }
        });
        let mut status = p.subscribe();
        status.wait_for(|s| s.frame_id == Some(1)).await.unwrap();

        let requested = tokio::time::Instant::now();
        p.seek(2);
        assert_eq!(p.state(), PlaybackState::Paused);

        status.wait_for(|s| s.frame_id == Some(3)).await.unwrap();
        assert!(requested.elapsed() <= PAUSE_POLL + Duration::from_millis(5));
        assert_eq!(p.state(), PlaybackState::Paused);

        // Resume from the sought frame, which is the last one
        assert_eq!(p.toggle(), PlaybackState::Running);
        assert_eq!(task.await.unwrap(), RunOutcome::Completed);
        assert_eq!(drawn_labels(&p), vec!["t=1", "t=3", "t=3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_holds_playback() {
        let p = player(TokioContext::shared());
        p.load(frames(&[(1, 0), (2, 100), (3, 200)]), None).unwrap();

        let task = tokio::spawn({
            let p = p.clone();
            async move { p.run().await }
        });
        let mut status = p.subscribe();
        status.wait_for(|s| s.frame_id == Some(1)).await.unwrap();
        assert_eq!(p.toggle(), PlaybackState::Paused);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(p.subscribe().borrow().frame_id, Some(1));
        assert!(!task.is_finished());

        assert_eq!(p.toggle(), PlaybackState::Running);
        assert_eq!(task.await.unwrap(), RunOutcome::Completed);
        assert_eq!(drawn_labels(&p), vec!["t=1", "t=2", "t=3"]);
    }

    #[tokio::test]
    async fn test_offset_after_playback_redraws_last_frame() {
        let p = player(SimContext::shared());
        p.load(frames(&[(1, 0), (2, 100)]), None).unwrap();
        p.run().await;

        let boxes = |p: &Player<SimContext, RecordingCanvas>| {
            p.with_viewer(|v| {
                v.canvas()
                    .commands()
                    .iter()
                    .filter_map(|c| match c {
                        DrawCommand::Stroke { points, closed: true, .. } => Some(points[0]),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
        };
        let before = boxes(&p);
        assert!(p.adjust_offset(Vector2::new(10.0, 4.0)));
        let after = boxes(&p);

        assert_eq!(before.len(), 1);
        assert!((after[0] - before[0] - Vector2::new(10.0, 4.0)).norm() < 1e-9);
        assert_eq!(p.with_viewer(|v| v.canvas().texts().join(",")), "t=2");
    }
}
