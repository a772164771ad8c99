//! Simulated annealing search loop
//!
//! Control per the schedule contract: geometric cooling with a floor,
//! shift/swap neighborhood, Metropolis acceptance, reheat on stagnation
//! (which also resets the convergence window), and termination on
//! convergence, the iteration cap, or cancellation.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::OptimizerConfig;
use crate::types::{
    AnnealSample, ConflictRecord, Schedule, SlotTime, TerminationReason,
};

use super::objective::Objective;
use super::Candidate;

/// Trajectory sampling stride.
const HISTORY_SAMPLE_EVERY: u64 = 100;

/// Result of one annealing run.
#[derive(Debug, Clone)]
pub struct AnnealOutcome {
    pub schedule: Schedule,
    /// Conflicts remaining at the best assignment found.
    pub residual_conflicts: Vec<ConflictRecord>,
}

/// Run the annealer over a candidate set for one target date.
///
/// Deterministic for a given seed: same seed, inputs, and parameters
/// yield a byte-identical schedule and history. Cancellation is checked
/// every iteration; an aborted run still reports its best-so-far
/// assignment (the caller decides whether to persist it).
pub fn anneal(
    date: NaiveDate,
    candidates: Vec<Candidate>,
    params: &OptimizerConfig,
    slack_m: f64,
    cancel: &CancellationToken,
) -> AnnealOutcome {
    if candidates.is_empty() {
        return AnnealOutcome {
            schedule: Schedule::empty(date),
            residual_conflicts: Vec::new(),
        };
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut objective = Objective::new(candidates, params, slack_m);
    let n = objective.candidates().len();

    // Initial assignment: every burn at its preferred (earliest) slot
    let mut slots: Vec<SlotTime> = objective
        .candidates()
        .iter()
        .map(|c| SlotTime(c.min_slot()))
        .collect();
    let mut score = objective.evaluate(&slots);

    let mut best_slots = slots.clone();
    let mut best_score = score;

    let mut temperature = params.t_initial;
    let mut stagnation: u64 = 0;
    let mut reheats: u32 = 0;
    let mut window_anchor_score = best_score;
    let mut window_start_iter: u64 = 0;

    let mut history = vec![AnnealSample { iteration: 0, temperature, score }];
    let mut termination = TerminationReason::MaxIterationsReached;

    let mut iteration: u64 = 0;
    while iteration < params.max_iterations {
        if cancel.is_cancelled() {
            termination = TerminationReason::Aborted;
            break;
        }
        iteration += 1;

        // Propose a neighbor: shift one burn by a slot, or swap two
        // burns whose windows overlap
        let Some(new_slots) = propose(&mut rng, &slots, &objective) else {
            stagnation += 1;
            continue;
        };

        let new_score = objective.evaluate(&new_slots);
        let delta = new_score - score;
        let accept = delta >= 0.0 || {
            let p: f64 = rng.gen();
            p < (delta / temperature.max(1e-12)).exp()
        };

        if accept {
            slots = new_slots;
            score = new_score;
            if score > best_score {
                best_score = score;
                best_slots = slots.clone();
                stagnation = 0;
            } else {
                stagnation += 1;
            }
        } else {
            stagnation += 1;
        }

        // Geometric cooling with a floor
        temperature = (temperature * params.cooling).max(params.t_final);

        // Reheat on stagnation; this resets the convergence window so a
        // reheated search is not immediately declared converged
        if stagnation >= params.reheat_threshold {
            temperature = (temperature * params.reheat_factor).min(params.t_initial);
            reheats += 1;
            stagnation = 0;
            window_anchor_score = best_score;
            window_start_iter = iteration;
            debug!(iteration, temperature, "Annealer reheated");
        }

        if iteration % HISTORY_SAMPLE_EVERY == 0 {
            history.push(AnnealSample { iteration, temperature, score });
        }

        // Convergence: relative improvement over the trailing window
        if iteration - window_start_iter >= params.convergence_window {
            let rel = (best_score - window_anchor_score) / window_anchor_score.abs().max(1e-9);
            if rel < params.convergence_threshold {
                termination = TerminationReason::Converged;
                break;
            }
            window_anchor_score = best_score;
            window_start_iter = iteration;
        }
    }

    history.push(AnnealSample { iteration, temperature, score: best_score });

    let residual_conflicts = objective.conflicts_at(&best_slots);

    let assignments = objective
        .candidates()
        .iter()
        .zip(&best_slots)
        .map(|(c, &slot)| (c.burn.id, slot))
        .collect();

    info!(
        burns = n,
        iterations = iteration,
        score = best_score,
        reheats,
        termination = %termination,
        residual = residual_conflicts.len(),
        "Annealing run complete"
    );

    AnnealOutcome {
        schedule: Schedule {
            date,
            assignments,
            score: best_score,
            iterations: iteration,
            reheats,
            termination,
            history,
            created_at: 0,
        },
        residual_conflicts,
    }
}

/// Propose a neighboring assignment, or `None` when the drawn move was
/// a no-op (out-of-window shift, illegal swap).
fn propose(
    rng: &mut StdRng,
    slots: &[SlotTime],
    objective: &Objective,
) -> Option<Vec<SlotTime>> {
    let n = slots.len();
    let candidates = objective.candidates();

    if n == 1 || rng.gen_bool(0.5) {
        // Shift one burn by one slot within its window
        let i = rng.gen_range(0..n);
        let dir: i32 = if rng.gen_bool(0.5) { 1 } else { -1 };
        let c = &candidates[i];
        let proposed = slots[i].0 as i32 + dir;
        if proposed < i32::from(c.min_slot()) || proposed > i32::from(c.max_slot()) {
            return None;
        }
        let mut next = slots.to_vec();
        next[i] = SlotTime(proposed as u16);
        Some(next)
    } else {
        // Swap the start slots of two burns with overlapping windows
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        if i == j {
            return None;
        }
        let (a, b) = (&candidates[i], &candidates[j]);
        if !a.window.overlaps(&b.window) || !a.admits(slots[j]) || !b.admits(slots[i]) {
            return None;
        }
        let mut next = slots.to_vec();
        next.swap(i, j);
        Some(next)
    }
}
