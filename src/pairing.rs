//! Keystroke event pairing
//!
//! Reconstructs key-hold durations (keydown → matching keyup) and inter-key
//! intervals (keyup → next keydown) from one group's time-ordered events.
//!
//! Matching is greedy nearest-match scoped per key identity: each keydown takes
//! the first keyup of the same key that follows it, and gives up if the same key
//! goes down again first (auto-repeat or a lost keyup). This suits alternating
//! single-finger typing. Genuinely chorded input, where several keys of the same
//! identity overlap, is not disambiguated; changing the policy would shift every
//! downstream statistic, so it stays as is.

use crate::config::MetricsConfig;
use crate::schema::KeyEvent;
use crate::types::{InterKeyInterval, KeyHoldDuration};
use std::borrow::Borrow;

/// Pair each keydown with its next keyup of the same key.
///
/// `events` must be sorted by ascending `pressed_at`. A duration is kept when
/// `0 < duration < config.khd_max_ms`; presses that never see a matching keyup
/// produce nothing.
pub fn pair_hold_durations<E: Borrow<KeyEvent>>(
    events: &[E],
    config: &MetricsConfig,
) -> Vec<KeyHoldDuration> {
    let mut holds = Vec::new();

    for (i, down) in events.iter().enumerate() {
        let down: &KeyEvent = down.borrow();
        if !down.is_keydown() {
            continue;
        }
        // The first later event of the same key decides: a keyup closes the hold,
        // another keydown means this press was never released.
        let next_same_key = events[i + 1..]
            .iter()
            .map(<E as Borrow<KeyEvent>>::borrow)
            .find(|next| next.key == down.key);

        if let Some(up) = next_same_key.filter(|next| next.is_keyup()) {
            let duration_ms = up.pressed_at_ms() - down.pressed_at_ms();
            if duration_ms > 0 && duration_ms < config.khd_max_ms {
                holds.push(KeyHoldDuration {
                    key: down.key.clone(),
                    duration_ms,
                });
            }
        }
    }

    holds
}

/// Pair each keyup with the following keydown.
///
/// Only the most recent unconsumed keyup counts; a keydown consumes it whether
/// or not the resulting gap is kept. Gaps are kept when
/// `0 < gap < config.iki_max_ms`.
pub fn pair_inter_key_intervals<E: Borrow<KeyEvent>>(
    events: &[E],
    config: &MetricsConfig,
) -> Vec<InterKeyInterval> {
    let mut intervals = Vec::new();
    let mut pending_keyup: Option<i64> = None;

    for event in events {
        let event: &KeyEvent = event.borrow();
        if event.is_keyup() {
            pending_keyup = Some(event.pressed_at_ms());
        } else if let Some(t_up) = pending_keyup.take() {
            let gap_ms = event.pressed_at_ms() - t_up;
            if gap_ms > 0 && gap_ms < config.iki_max_ms {
                intervals.push(InterKeyInterval { gap_ms });
            }
        }
    }

    intervals
}
