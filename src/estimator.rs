//! Estimator context: one value that owns every filter, state machine and
//! smoother, advanced by [`Estimator::tick`] once per accepted sample.
//!
//! # Tick Order
//!
//! 1. SOC is rounded up to a whole percent.
//! 2. Current goes through the 5-tap median; small positive values are clamped
//!    to 0 A so back-EMF trickle never reads as charging.
//! 3. Charging and discharging machines update on the clamped median. Their
//!    edges are reported on the same tick the dwell elapses.
//! 4. The step EMA and the discharge history learn from the raw current.
//! 5. The narrative selector picks one message by priority, feeding the
//!    display smoothers only from the branch that is shown.
//! 6. Change detection and the audio policy run on the final values.

use embedded_graphics::pixelcolor::Rgb565;

use crate::colors::soc_color;
use crate::config::{ConfigError, EstimatorConfig};
use crate::estimate::{MIN_CHARGE_CURRENT_A, MIN_DISCHARGE_CURRENT_A, compute_tte, compute_ttf, hours_to_minutes};
use crate::filters::{Ema, Median5, StepEma};
use crate::history::{DischargeHistory, HistoryGate};
use crate::sample::Sample;
use crate::smoothing::DisplaySmoother;
use crate::state_machine::{HysteresisMachine, Transition};
use crate::status::{AudioCue, AudioPolicy, DisplayLine, LineText, Narrative, Status};

// =============================================================================
// Display State
// =============================================================================

/// Everything the display, speaker and LED need after one tick.
#[derive(Clone, PartialEq, Debug)]
pub struct DisplayState {
    /// Whole-percent SOC.
    pub soc: u8,
    /// Stable charging state.
    pub charging: bool,
    /// Stable discharging state.
    pub discharging: bool,
    pub status: Status,
    /// Text for the status area.
    pub status_line: &'static str,
    pub narrative: Narrative,
    /// Rendered narrative.
    pub time_estimate_line: LineText,
    /// The narrative differs from what was last rendered.
    pub line_changed: bool,
    /// The status differs from the previous tick.
    pub status_changed: bool,
    pub audio: AudioCue,
    pub soc_color: Rgb565,
    /// Median-filtered current after the positive clamp (A).
    pub filtered_current_a: f32,
}

impl DisplayState {
    /// State shown before the first sample.
    pub fn empty() -> Self {
        Self {
            soc: 0,
            charging: false,
            discharging: false,
            status: Status::None,
            status_line: Status::None.message(),
            narrative: Narrative::Blank,
            time_estimate_line: LineText::new(),
            line_changed: false,
            status_changed: false,
            audio: AudioCue::None,
            soc_color: soc_color(0),
            filtered_current_a: 0.0,
        }
    }
}

// =============================================================================
// Estimator
// =============================================================================

/// The whole estimation pipeline for one device.
pub struct Estimator {
    config: EstimatorConfig,
    median: Median5,
    current_ema: Ema,
    step_ema: StepEma,
    charge: HysteresisMachine,
    discharge: HysteresisMachine,
    history: DischargeHistory,
    history_gate: HistoryGate,
    tte: DisplaySmoother,
    ttf: DisplaySmoother,
    line: DisplayLine,
    audio: AudioPolicy,
    prev_status: Option<Status>,
    last: DisplayState,
}

impl Estimator {
    /// Build an estimator after validating `config`.
    pub fn new(config: EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let first_dt_s = config.poll_period_s();
        Ok(Self {
            config,
            median: Median5::new(),
            current_ema: Ema::new(),
            step_ema: StepEma::new(config.step_ema, MIN_DISCHARGE_CURRENT_A, first_dt_s),
            charge: HysteresisMachine::new(config.charge),
            discharge: HysteresisMachine::new(config.discharge),
            history: DischargeHistory::new(config.history),
            history_gate: HistoryGate::new(config.history.gate_dwell_ms),
            tte: DisplaySmoother::new(config.tte, first_dt_s),
            ttf: DisplaySmoother::new(config.ttf, first_dt_s),
            line: DisplayLine::new(),
            audio: AudioPolicy::new(config.low_soc_pct),
            prev_status: None,
            last: DisplayState::empty(),
        })
    }

    /// Advance the pipeline by one sample.
    ///
    /// An invalid sample changes nothing: the previous state is returned with
    /// its change flags cleared and no audio cue.
    pub fn tick(
        &mut self,
        sample: &Sample,
        now_ms: u64,
    ) -> DisplayState {
        if !sample.valid {
            let mut held = self.last.clone();
            held.line_changed = false;
            held.status_changed = false;
            held.audio = AudioCue::None;
            return held;
        }

        let soc = sample.soc_int();
        let current_a = sample.current_a;

        // Robust current for the state machines
        let mut filtered_a = self.median.push(current_a);
        if filtered_a > 0.0 && filtered_a < self.config.positive_clamp_a {
            filtered_a = 0.0;
        }

        let charge_edge = self.charge.update(filtered_a, now_ms);
        let discharge_edge = self.discharge.update(filtered_a, now_ms);
        let charging = self.charge.is_stable();
        let discharging = self.discharge.is_stable();
        let status = Status::classify(soc, charging, self.config.low_soc_pct);

        // Long-window learners use the raw current
        let typical_ema_a = self.step_ema.update(current_a, now_ms);
        self.history.record(current_a, now_ms);

        let above_low = soc > self.config.low_soc_pct;
        let history_base = !charging
            && above_low
            && !discharging
            && typical_ema_a.is_some_and(|a| a >= MIN_DISCHARGE_CURRENT_A);
        let history_ready = self.history_gate.update(history_base, now_ms);

        let narrative = if status == Status::Low {
            Narrative::LowBattery
        } else if charging && soc < 100 && current_a > MIN_CHARGE_CURRENT_A {
            let ttf_current_a = self.current_ema.update(current_a, now_ms, self.config.current_tau_s);
            let raw = compute_ttf(sample.remaining_mah, f32::from(soc), ttf_current_a);
            self.ttf
                .update(raw, charge_edge == Transition::Entered, now_ms)
                .map_or(Narrative::Blank, |h| Narrative::ChargingTtf(hours_to_minutes(h)))
        } else if !charging && above_low {
            if discharging {
                let live_a = (filtered_a <= -MIN_DISCHARGE_CURRENT_A).then_some(filtered_a);
                let raw = live_a.and_then(|a| compute_tte(sample.remaining_mah, a));
                self.tte
                    .update(raw, discharge_edge == Transition::Entered, now_ms)
                    .map_or(Narrative::Blank, |h| Narrative::TimeLeft(hours_to_minutes(h)))
            } else if history_ready {
                self.historical_narrative(sample.remaining_mah, typical_ema_a, now_ms)
            } else {
                Narrative::Blank
            }
        } else {
            Narrative::from_status(status)
        };

        let line_changed = self.line.set(narrative);
        let status_changed = self.prev_status != Some(status);
        self.prev_status = Some(status);
        let audio = self.audio.evaluate(soc, charging, status);

        let state = DisplayState {
            soc,
            charging,
            discharging,
            status,
            status_line: status.message(),
            narrative,
            time_estimate_line: narrative.render(),
            line_changed,
            status_changed,
            audio,
            soc_color: soc_color(soc),
            filtered_current_a: filtered_a,
        };
        self.last = state.clone();
        state
    }

    fn historical_narrative(
        &mut self,
        remaining_mah: f32,
        typical_ema_a: Option<f32>,
        now_ms: u64,
    ) -> Narrative {
        let Some(draw_a) = self.history.typical_draw_a().or(typical_ema_a) else {
            return Narrative::Blank;
        };
        if !(draw_a >= MIN_DISCHARGE_CURRENT_A) {
            return Narrative::Blank;
        }
        let raw = compute_tte(remaining_mah, -draw_a);
        self.tte
            .update(raw, false, now_ms)
            .map_or(Narrative::Blank, |h| Narrative::TimeLeftHistorical(hours_to_minutes(h)))
    }

    /// Force the next tick to report every line and status as changed,
    /// e.g. after the screen was taken over by a link message. Audio edges
    /// are kept, so a redraw never replays a cue.
    pub fn invalidate_display(&mut self) {
        self.line.invalidate();
        self.prev_status = None;
    }

    /// State returned by the most recent tick.
    #[inline]
    pub fn last_state(&self) -> &DisplayState { &self.last }

    /// Robust typical draw from the discharge history, for diagnostics.
    #[inline]
    pub fn typical_draw_a(&self) -> Option<f32> { self.history.typical_draw_a() }

    /// Fast-attack discharge EMA, for diagnostics.
    #[inline]
    pub fn step_ema_a(&self) -> Option<f32> { self.step_ema.value() }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors;

    const TICK_MS: u64 = 250;

    fn estimator() -> Estimator { Estimator::new(EstimatorConfig::DISPLAY_UNIT).unwrap() }

    /// Feed `count` ticks of the same sample starting at `start_ms`.
    fn run(
        est: &mut Estimator,
        sample: Sample,
        start_ms: u64,
        count: u64,
    ) -> Vec<(u64, DisplayState)> {
        (0..count)
            .map(|k| {
                let now = start_ms + k * TICK_MS;
                (now, est.tick(&sample, now))
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EstimatorConfig::DISPLAY_UNIT;
        config.discharge.exit_a = config.discharge.enter_a;
        assert!(Estimator::new(config).is_err());
    }

    #[test]
    fn test_scenario_steady_discharge_shows_time_left() {
        let mut est = estimator();
        // SOC 22 %, -5 A, 5500 mAh -> 1.1 h = 66 min -> 70 min on the grid
        let states = run(&mut est, Sample::new(-5.0, 22.0, 5_500.0), 0, 16);

        for (now, state) in &states {
            if *now < 2_000 {
                assert!(!state.discharging, "at {now}");
                assert_eq!(state.narrative, Narrative::Blank, "at {now}");
            } else {
                assert!(state.discharging, "at {now}");
                assert_eq!(state.narrative, Narrative::TimeLeft(70), "at {now}");
            }
        }
        let (_, entered) = &states[8];
        assert!(entered.line_changed);
        assert_eq!(entered.time_estimate_line.as_str(), "Travel time left: 1h 10m");
        let (_, after) = &states[9];
        assert!(!after.line_changed);
    }

    #[test]
    fn test_scenario_low_soc_overrides_time_left() {
        let mut est = estimator();
        run(&mut est, Sample::new(-5.0, 22.0, 5_500.0), 0, 16);
        assert_eq!(est.last_state().narrative, Narrative::TimeLeft(70));

        let state = est.tick(&Sample::new(-5.0, 20.0, 5_000.0), 4_000);
        assert_eq!(state.status, Status::Low);
        assert_eq!(state.narrative, Narrative::LowBattery);
        assert_eq!(state.time_estimate_line.as_str(), "BATTERY LOW PLEASE CHARGE");
        assert_eq!(state.status_line, "BATTERY LOW PLEASE CHARGE");
        assert!(state.line_changed);
        assert!(state.status_changed);
        assert_eq!(state.audio, AudioCue::Low);
        assert_eq!(state.soc_color, colors::RED);
    }

    #[test]
    fn test_scenario_charge_commits_when_dwell_elapses() {
        let mut est = estimator();
        run(&mut est, Sample::new(0.0, 50.0, 5_000.0), 0, 4);
        // +10 A from 1000 ms; the median crosses at 1500 ms
        let states = run(&mut est, Sample::new(10.0, 50.0, 5_000.0), 1_000, 12);

        for (now, state) in &states {
            assert_eq!(state.charging, *now >= 3_500, "at {now}");
        }
        let (_, entered) = &states[10];
        assert_eq!(entered.status, Status::Charging);
        assert!(entered.status_changed);
        assert_eq!(entered.audio, AudioCue::Charging);
        // 5000 mAh still to go at 10 A -> 30 min, seeded on the entry tick
        assert_eq!(entered.narrative, Narrative::ChargingTtf(30));
        assert_eq!(entered.time_estimate_line.as_str(), "BATTERY CHARGING - 0h 30m until full");
    }

    #[test]
    fn test_spike_does_not_toggle_charging() {
        let mut est = estimator();
        let mut now = 0;
        for k in 0..40u64 {
            // Two-sample regen spike every 2.5 s
            let current = if k % 10 < 2 { 15.0 } else { -4.0 };
            let state = est.tick(&Sample::new(current, 60.0, 6_000.0), now);
            assert!(!state.charging);
            now += TICK_MS;
        }
    }

    #[test]
    fn test_positive_trickle_clamped() {
        let mut est = estimator();
        let state = est.tick(&Sample::new(0.45, 60.0, 6_000.0), 0);
        assert_eq!(state.filtered_current_a, 0.0);
        let state = est.tick(&Sample::new(0.6, 60.0, 6_000.0), 250);
        assert_eq!(state.filtered_current_a, 0.6);
    }

    #[test]
    fn test_historical_fallback_after_gate_dwell() {
        let mut est = estimator();
        // Short burst: not long enough for stable discharge
        run(&mut est, Sample::new(-5.0, 50.0, 5_000.0), 0, 4);
        let states = run(&mut est, Sample::new(0.0, 50.0, 5_000.0), 1_000, 12);

        for (now, state) in &states {
            assert!(!state.discharging);
            if *now < 3_000 {
                assert_eq!(state.narrative, Narrative::Blank, "at {now}");
            } else {
                // Step EMA holds 5 A: 5000 mAh / 5 A = 1 h
                assert_eq!(state.narrative, Narrative::TimeLeftHistorical(60), "at {now}");
            }
        }
        assert_eq!(est.step_ema_a(), Some(5.0));
        assert_eq!(est.typical_draw_a(), None);
        assert_eq!(
            est.last_state().time_estimate_line.as_str(),
            "Travel time left (historical): 1h 00m"
        );
    }

    #[test]
    fn test_no_history_no_estimate() {
        let mut est = estimator();
        let states = run(&mut est, Sample::new(0.0, 50.0, 5_000.0), 0, 20);
        assert!(states.iter().all(|(_, s)| s.narrative == Narrative::Blank));
        // Blank to blank is never a change
        assert!(states.iter().all(|(_, s)| !s.line_changed));
    }

    #[test]
    fn test_invalid_sample_holds_state() {
        let mut est = estimator();
        let before = est.tick(&Sample::new(-5.0, 20.0, 5_000.0), 0);
        assert!(before.line_changed);

        let held = est.tick(&Sample::invalid(), 250);
        assert_eq!(held.narrative, before.narrative);
        assert_eq!(held.soc, 20);
        assert!(!held.line_changed);
        assert!(!held.status_changed);
        assert_eq!(held.audio, AudioCue::None);
    }

    #[test]
    fn test_full_status_and_cue() {
        let mut est = estimator();
        let states = run(&mut est, Sample::new(5.0, 100.0, 11_000.0), 0, 10);
        let (_, last) = states.last().unwrap();
        assert!(last.charging);
        assert_eq!(last.status, Status::Full);
        assert_eq!(last.narrative, Narrative::Status(Status::Full));
        assert!(states.iter().any(|(_, s)| s.audio == AudioCue::Full));
        assert_eq!(last.soc_color, colors::DARK_GREEN);
    }

    #[test]
    fn test_invalidate_forces_redraw() {
        let mut est = estimator();
        run(&mut est, Sample::new(-5.0, 22.0, 5_500.0), 0, 10);
        let state = est.tick(&Sample::new(-5.0, 22.0, 5_500.0), 2_500);
        assert!(!state.line_changed);
        assert!(!state.status_changed);

        est.invalidate_display();
        let state = est.tick(&Sample::new(-5.0, 22.0, 5_500.0), 2_750);
        assert!(state.line_changed);
        assert!(state.status_changed);
    }

    #[test]
    fn test_invalidate_does_not_replay_cue() {
        let mut est = estimator();
        let full = Sample::new(5.0, 100.0, 11_000.0);
        let states = run(&mut est, full, 0, 10);
        assert!(states.iter().any(|(_, s)| s.audio == AudioCue::Full));

        // Link recovery redraws the screen with unchanged SOC and charge state
        est.invalidate_display();
        let state = est.tick(&full, 2_500);
        assert!(state.line_changed);
        assert!(state.status_changed);
        assert_eq!(state.status, Status::Full);
        assert_eq!(state.audio, AudioCue::None);
    }

    #[test]
    fn test_discharge_entry_seeds_over_historical_estimate() {
        let mut est = estimator();
        // Historical 1 h estimate from an earlier 5 A burst
        run(&mut est, Sample::new(-5.0, 50.0, 5_000.0), 0, 4);
        run(&mut est, Sample::new(0.0, 50.0, 5_000.0), 1_000, 12);
        assert_eq!(est.last_state().narrative, Narrative::TimeLeftHistorical(60));

        // Sustained 30 A: 5000 mAh / 30 A = 10 min
        let states = run(&mut est, Sample::new(-30.0, 50.0, 5_000.0), 4_000, 16);
        let entry = states.iter().position(|(_, s)| s.discharging).unwrap();
        assert!(entry > 0);

        // Gliding down through the attack constant until the entry tick
        let (_, before) = &states[entry - 1];
        assert!(
            matches!(before.narrative, Narrative::TimeLeftHistorical(m) if m >= 30),
            "{:?}",
            before.narrative
        );
        let (_, entered) = &states[entry];
        assert_eq!(entered.narrative, Narrative::TimeLeft(10));
        assert!(entered.line_changed);
    }

    #[test]
    fn test_charge_reentry_seeds_at_new_current() {
        let mut est = estimator();
        let states = run(&mut est, Sample::new(10.0, 50.0, 5_000.0), 0, 12);
        let (_, first) = states.iter().find(|(_, s)| s.charging).unwrap();
        assert_eq!(first.narrative, Narrative::ChargingTtf(30));

        // Unplugged for a minute
        let states = run(&mut est, Sample::new(0.0, 50.0, 5_000.0), 3_000, 240);
        assert!(!states.last().unwrap().1.charging);

        // Plugged back in at 2.5 A: 5000 mAh to go -> 2 h
        let states = run(&mut est, Sample::new(2.5, 50.0, 5_000.0), 63_000, 16);
        let (_, entered) = states.iter().find(|(_, s)| s.charging).unwrap();
        assert_eq!(entered.narrative, Narrative::ChargingTtf(120));
        assert_eq!(entered.time_estimate_line.as_str(), "BATTERY CHARGING - 2h 00m until full");
    }
}
