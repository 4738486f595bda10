//! Unsolicited hint prompt.
//!
//! One timer per run: after a uniformly random delay the hint fires if
//! the panel is still closed, then self-dismisses unless the user opens
//! the panel first.

use rand::Rng;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use assistchat_types::{HINT_DISMISS_AFTER, HINT_MAX_DELAY, HINT_MIN_DELAY};

/// Fixed set of hint strings shown near the trigger control.
pub const HINTS: [&str; 5] = [
    "Hi, need any help?",
    "Want a recommendation?",
    "Looking for something?",
    "I can help you pick a gift!",
    "Curious what's new?",
];

#[derive(Debug, Clone, Copy)]
pub struct HintConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub dismiss_after: Duration,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            min_delay: HINT_MIN_DELAY,
            max_delay: HINT_MAX_DELAY,
            dismiss_after: HINT_DISMISS_AFTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintEvent {
    Show(&'static str),
    Dismiss,
}

/// Pick one hint uniformly from the fixed set.
pub fn pick_hint<R: Rng>(rng: &mut R) -> &'static str {
    HINTS[rng.gen_range(0..HINTS.len())]
}

/// Uniformly distributed delay in `[min_delay, max_delay)`.
pub fn hint_delay<R: Rng>(rng: &mut R, config: &HintConfig) -> Duration {
    let span = config
        .max_delay
        .saturating_sub(config.min_delay)
        .as_millis() as u64;
    if span == 0 {
        return config.min_delay;
    }
    config.min_delay + Duration::from_millis(rng.gen_range(0..span))
}

/// One-shot hint timer. Emits `Show` only while the panel is closed and
/// `Dismiss` after the timeout if the panel was not opened in between.
pub async fn run_hint_timer(
    config: HintConfig,
    mut visible: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<HintEvent>,
    cancel: CancellationToken,
) {
    let delay = {
        let mut rng = rand::thread_rng();
        hint_delay(&mut rng, &config)
    };

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }

    if *visible.borrow() {
        return;
    }

    let text = {
        let mut rng = rand::thread_rng();
        pick_hint(&mut rng)
    };
    if events.send(HintEvent::Show(text)).is_err() {
        return;
    }

    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(config.dismiss_after) => {
            let _ = events.send(HintEvent::Dismiss);
        }
        changed = visible.changed() => {
            // Opening the panel consumes the hint; anything else dismisses it.
            if changed.is_err() || !*visible.borrow() {
                let _ = events.send(HintEvent::Dismiss);
            }
        }
    }
}
