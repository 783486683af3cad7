//! Playback without a terminal: frames are rendered into a
//! [`RecordingCanvas`] and progress goes to the log.

use std::time::Duration;

use tafview_core::{Player, RecordingCanvas, RunOutcome};
use tafview_env::ReplayContext;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Result of a headless run.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSummary {
    pub outcome: RunOutcome,
    /// Id of the last frame shown
    pub last_frame: Option<i64>,
    /// Ids of the shown frames, in the order they were logged
    pub frames_shown: Vec<i64>,
    /// Elapsed time on the player's clock
    pub elapsed: Duration,
}

/// Plays the loaded scenario to the end, logging one line per shown frame.
pub async fn run_headless<Ctx: ReplayContext>(
    ctx: &Ctx,
    player: &Player<Ctx, RecordingCanvas>,
) -> HeadlessSummary {
    let mut status = player.subscribe();
    let (done_tx, mut done_rx) = oneshot::channel::<()>();
    let progress = tokio::spawn(async move {
        let mut shown: Vec<i64> = Vec::new();
        loop {
            let finished = tokio::select! {
                changed = status.changed() => changed.is_err(),
                _ = &mut done_rx => true,
            };
            let current = status.borrow_and_update().clone();
            if let Some(id) = current.frame_id {
                if shown.last() != Some(&id) {
                    shown.push(id);
                    info!("{current}");
                }
            }
            if finished {
                return shown;
            }
        }
    });

    let started = ctx.now();
    let outcome = player.run().await;
    let elapsed = ctx.now().saturating_sub(started);

    // Fails only if the logger already saw the channel close.
    let _ = done_tx.send(());
    let frames_shown = match progress.await {
        Ok(shown) => shown,
        Err(e) => {
            warn!(error = %e, "progress logger failed");
            Vec::new()
        }
    };

    let last_frame = player.subscribe().borrow().frame_id;
    info!(?outcome, ?last_frame, elapsed_ms = elapsed.as_millis() as u64, "headless run finished");
    HeadlessSummary {
        outcome,
        last_frame,
        frames_shown,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tafview_core::{AgentPose, FrameIndex, PlaybackConfig, ViewConfig, Viewer};
    use tafview_env::SimContext;

    fn player(ctx: Arc<SimContext>) -> Player<SimContext, RecordingCanvas> {
        let mut viewer = Viewer::new(RecordingCanvas::new(100.0, 100.0), ViewConfig::default());
        viewer.set_data_bounds(0.0, 0.0, 10.0, 10.0).unwrap();
        Player::new(ctx, viewer, PlaybackConfig::default())
    }

    #[tokio::test]
    async fn test_headless_run_uses_virtual_time() {
        let ctx = SimContext::shared();
        let player = player(ctx.clone());
        let frames = FrameIndex::build(vec![
            AgentPose::new(1, "a", 1.0, 1.0).with_timestamp(1000),
            AgentPose::new(2, "a", 2.0, 1.0).with_timestamp(1400),
            AgentPose::new(3, "a", 3.0, 1.0).with_timestamp(2000),
        ]);
        player.load(frames, None).unwrap();

        let summary = run_headless(&*ctx, &player).await;
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.last_frame, Some(3));
        assert_eq!(summary.frames_shown, vec![1, 2, 3]);
        assert_eq!(summary.elapsed, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_headless_run_without_scenario() {
        let ctx = SimContext::shared();
        let player = player(ctx.clone());
        let summary = run_headless(&*ctx, &player).await;
        assert_eq!(summary.outcome, RunOutcome::NothingLoaded);
        assert_eq!(summary.last_frame, None);
        assert!(summary.frames_shown.is_empty());
        assert_eq!(summary.elapsed, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_headless_run_logs_single_frame() {
        let ctx = SimContext::shared();
        let player = player(ctx.clone());
        let frames = FrameIndex::build(vec![AgentPose::new(7, "a", 1.0, 1.0).with_timestamp(1000)]);
        player.load(frames, None).unwrap();

        let summary = run_headless(&*ctx, &player).await;
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.frames_shown, vec![7]);
        assert_eq!(summary.elapsed, Duration::ZERO);
    }
}
