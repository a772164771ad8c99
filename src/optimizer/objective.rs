//! Annealing objective
//!
//! `J = w_p·priority_satisfaction − w_c·conflict_penalty −
//!  w_t·time_preference_gap + w_e·efficiency_bonus`
//!
//! Each term is normalized to [0, 1]. Candidate pairs are precomputed
//! once (footprint radii do not move with start slots); every evaluation
//! re-scores only those pairs at the proposed assignment.

use crate::config::OptimizerConfig;
use crate::conflict::{self, ScheduledBurn};
use crate::types::SlotTime;

use super::Candidate;

/// Reusable objective evaluator over a fixed candidate set.
pub struct Objective {
    candidates: Vec<Candidate>,
    pairs: Vec<(usize, usize)>,
    scratch: Vec<ScheduledBurn>,
    slack_m: f64,
    w_priority: f64,
    w_conflict: f64,
    w_time: f64,
    w_efficiency: f64,
}

impl Objective {
    pub fn new(candidates: Vec<Candidate>, params: &OptimizerConfig, slack_m: f64) -> Self {
        let burns: Vec<ScheduledBurn> = candidates.iter().map(|c| c.burn.clone()).collect();
        let pairs = conflict::candidate_pairs(&burns, slack_m);
        Self {
            scratch: burns,
            candidates,
            pairs,
            slack_m,
            w_priority: params.w_priority,
            w_conflict: params.w_conflict,
            w_time: params.w_time,
            w_efficiency: params.w_efficiency,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Evaluate the objective at an assignment. Higher is better.
    pub fn evaluate(&mut self, slots: &[SlotTime]) -> f64 {
        let n = self.candidates.len();
        if n == 0 {
            return 0.0;
        }
        for (burn, &slot) in self.scratch.iter_mut().zip(slots) {
            burn.start = slot;
        }

        // Conflict penalty and per-burn worst severity
        let mut worst = vec![0.0_f64; n];
        let mut severity_sum = 0.0;
        for &(i, j) in &self.pairs {
            if let Some(record) =
                conflict::pair_conflict(&self.scratch[i], &self.scratch[j], self.slack_m)
            {
                let w = record.severity.weight();
                severity_sum += w;
                worst[i] = worst[i].max(w);
                worst[j] = worst[j].max(w);
            }
        }
        let conflict_penalty = (severity_sum / n as f64).clamp(0.0, 1.0);

        // Priority satisfaction: high-priority burns kept conflict-free
        let priority_total: f64 = self.candidates.iter().map(|c| c.burn.priority).sum();
        let priority_satisfaction = if priority_total > 0.0 {
            self.candidates
                .iter()
                .zip(&worst)
                .map(|(c, w)| c.burn.priority * (1.0 - w))
                .sum::<f64>()
                / priority_total
        } else {
            1.0
        };

        // Time preference gap: distance from each operator's preferred
        // (earliest) start, normalized per window
        let time_preference_gap = self
            .candidates
            .iter()
            .zip(slots)
            .map(|(c, slot)| {
                let span = f64::from(c.max_slot() - c.min_slot());
                if span > 0.0 {
                    f64::from(slot.0.saturating_sub(c.min_slot())) / span
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            / n as f64;

        let efficiency_bonus = self.efficiency_bonus(slots);

        self.w_priority * priority_satisfaction - self.w_conflict * conflict_penalty
            - self.w_time * time_preference_gap
            + self.w_efficiency * efficiency_bonus
    }

    /// Reward spreading burns over the day: 1 when no two burns run
    /// simultaneously, falling toward 0 as everything stacks up.
    fn efficiency_bonus(&self, slots: &[SlotTime]) -> f64 {
        let n = self.candidates.len();
        if n < 2 {
            return 1.0;
        }
        // Sweep over start/end events in quarter-hour units
        let mut events: Vec<(u32, i32)> = Vec::with_capacity(n * 2);
        for (c, &slot) in self.candidates.iter().zip(slots) {
            let start = u32::from(slot.0);
            let end = start + (c.burn.duration_h * 4.0).ceil() as u32;
            events.push((start, 1));
            events.push((end, -1));
        }
        events.sort_unstable();
        let mut active = 0_i32;
        let mut max_active = 0_i32;
        for (_, delta) in events {
            active += delta;
            max_active = max_active.max(active);
        }
        1.0 - f64::from(max_active.max(1) - 1) / (n as f64 - 1.0)
    }

    /// Conflict records at an assignment (for the final schedule).
    pub fn conflicts_at(&mut self, slots: &[SlotTime]) -> Vec<crate::types::ConflictRecord> {
        for (burn, &slot) in self.scratch.iter_mut().zip(slots) {
            burn.start = slot;
        }
        self.pairs
            .iter()
            .filter_map(|&(i, j)| {
                conflict::pair_conflict(&self.scratch[i], &self.scratch[j], self.slack_m)
            })
            .collect()
    }
}
