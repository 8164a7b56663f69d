//! Shuffle Engine: timed random rotations of same-named tokens.
//!
//! DESIGN
//! ======
//! Slot positions are captured once when a shuffle starts. Each tick picks a
//! random subset of slots and a derangement over them, moves every affected
//! token concurrently, and waits until every move has settled before the
//! next tick. The engine keeps a [`SlotAssignment`] bijection between slots
//! and tokens so the next tick knows which token sits where.
//!
//! Every client runs its own engine with its own random sequence; only the
//! token name and the token set are shared. Final placements therefore
//! differ per client until the host's authoritative updates converge them.
//!
//! TIMING
//! ======
//! The runtime budget is checked between ticks only, so the last tick may
//! overshoot by up to one hop.

#[cfg(test)]
#[path = "shuffle_test.rs"]
mod shuffle_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use frames::Token;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::camera::Point;
use crate::consts::{LIFT_OFFSET, MAX_DERANGEMENT_ATTEMPTS, MIN_SHUFFLE_TOKENS, SETTLE_MS};
use crate::error::ShellError;
use crate::host::Scene;
use crate::matching::{NameMatch, matching_tokens};
use crate::settings::{HopRange, ShellSettings};
use crate::wait::Waiter;

// =============================================================================
// SLOT ASSIGNMENT
// =============================================================================

/// One token hop from slot `from` to slot `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMove {
    pub from: usize,
    pub to: usize,
}

/// Bijection between slot indices and token indices, kept as two views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    token_at_slot: Vec<usize>,
    slot_of_token: Vec<usize>,
}

impl SlotAssignment {
    /// Token `i` starts in slot `i`.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self { token_at_slot: (0..n).collect(), slot_of_token: (0..n).collect() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.token_at_slot.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token_at_slot.is_empty()
    }

    #[must_use]
    pub fn token_at(&self, slot: usize) -> usize {
        self.token_at_slot[slot]
    }

    #[must_use]
    pub fn slot_of(&self, token: usize) -> usize {
        self.slot_of_token[token]
    }

    /// Apply one tick's moves. `moves` must permute a subset of slots: every
    /// source slot is also a destination.
    pub fn apply(&mut self, moves: &[SlotMove]) {
        let mut next = self.token_at_slot.clone();
        for m in moves {
            next[m.to] = self.token_at_slot[m.from];
        }
        for (slot, &token) in next.iter().enumerate() {
            self.slot_of_token[token] = slot;
        }
        self.token_at_slot = next;
        debug_assert!(self.is_consistent());
    }

    /// Both views agree and describe a permutation.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let n = self.token_at_slot.len();
        if self.slot_of_token.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for (slot, &token) in self.token_at_slot.iter().enumerate() {
            if token >= n || seen[token] || self.slot_of_token[token] != slot {
                return false;
            }
            seen[token] = true;
        }
        true
    }
}

// =============================================================================
// STEP PLANNING
// =============================================================================

/// One animation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationStep {
    pub moves: Vec<SlotMove>,
    pub duration_ms: u64,
    /// Shuffles tried before a derangement was found.
    pub attempts: u32,
    /// No derangement within the attempt limit; a rotation was used instead.
    pub fell_back: bool,
}

/// Plan one tick over `slot_count` slots.
pub fn plan_step<R: Rng + ?Sized>(rng: &mut R, slot_count: usize, hops: HopRange) -> RotationStep {
    let duration_ms = rng.random_range(hops.min_ms()..=hops.max_ms());
    if slot_count < MIN_SHUFFLE_TOKENS {
        return RotationStep { moves: Vec::new(), duration_ms, attempts: 0, fell_back: false };
    }
    let k = rng.random_range(MIN_SHUFFLE_TOKENS..=slot_count);
    let chosen = choose_slots(rng, slot_count, k);
    let (targets, attempts, fell_back) = derange(rng, &chosen);
    let moves = chosen
        .iter()
        .zip(&targets)
        .map(|(&from, &to)| SlotMove { from, to })
        .collect();
    RotationStep { moves, duration_ms, attempts, fell_back }
}

/// `k` distinct slots out of `0..n`, in random order.
pub fn choose_slots<R: Rng + ?Sized>(rng: &mut R, n: usize, k: usize) -> Vec<usize> {
    let mut slots: Vec<usize> = (0..n).collect();
    slots.shuffle(rng);
    slots.truncate(k);
    slots
}

/// Reorder `chosen` so no element stays at its index. Returns the new order,
/// the number of attempts used and whether the rotation fallback kicked in.
pub fn derange<R: Rng + ?Sized>(rng: &mut R, chosen: &[usize]) -> (Vec<usize>, u32, bool) {
    for attempt in 1..=MAX_DERANGEMENT_ATTEMPTS {
        let mut order = chosen.to_vec();
        order.shuffle(rng);
        if chosen.iter().zip(&order).all(|(a, b)| a != b) {
            return (order, attempt, false);
        }
    }
    let mut order = chosen.to_vec();
    order.rotate_left(1);
    (order, MAX_DERANGEMENT_ATTEMPTS, true)
}

// =============================================================================
// SESSION
// =============================================================================

/// Tokens and slots for one shuffle, captured from live scene state.
#[derive(Debug, Clone)]
pub struct ShuffleSession {
    pub base_name: String,
    pub tokens: Vec<Token>,
    /// Top-left position of each slot, fixed for the whole session.
    pub slots: Vec<Point>,
    pub assignment: SlotAssignment,
}

impl ShuffleSession {
    /// # Errors
    ///
    /// `NotEnoughTokens` if fewer than two tokens match.
    pub fn capture(scene_tokens: &[Token], base_name: &str, mode: NameMatch) -> Result<Self, ShellError> {
        let tokens = matching_tokens(scene_tokens, base_name, mode);
        if tokens.len() < MIN_SHUFFLE_TOKENS {
            return Err(ShellError::NotEnoughTokens { name: base_name.to_owned(), found: tokens.len() });
        }
        let slots = tokens.iter().map(|t| Point::new(t.x, t.y)).collect();
        let assignment = SlotAssignment::identity(tokens.len());
        Ok(Self { base_name: base_name.to_owned(), tokens, slots, assignment })
    }
}

/// What a finished shuffle did.
#[derive(Debug, Clone)]
pub struct ShuffleReport {
    pub ticks: u32,
    pub moves: usize,
    pub fallbacks: u32,
    pub elapsed: Duration,
    pub assignment: SlotAssignment,
    pub last_step: Option<RotationStep>,
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct ShuffleEngine {
    scene: Arc<dyn Scene>,
    waiter: Waiter,
    running: AtomicBool,
    seed: Option<u64>,
}

impl ShuffleEngine {
    #[must_use]
    pub fn new(scene: Arc<dyn Scene>, waiter: Waiter) -> Self {
        Self { scene, waiter, running: AtomicBool::new(false), seed: None }
    }

    /// Use a fixed random seed instead of OS entropy.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shuffle every token matching `base_name` until the runtime budget is
    /// spent.
    ///
    /// # Errors
    ///
    /// `ShuffleInProgress` if this engine is already running,
    /// `NotEnoughTokens` if fewer than two tokens match, or the first host
    /// error raised by a move.
    pub async fn run(&self, base_name: &str, settings: &ShellSettings) -> Result<ShuffleReport, ShellError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let mut session = ShuffleSession::capture(&self.scene.tokens(), base_name, settings.name_match)?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let budget = settings.runtime();
        let hops = settings.hop_range();
        info!(
            base_name,
            tokens = session.tokens.len(),
            budget_ms = settings.runtime_ms,
            min_hop_ms = hops.min_ms(),
            max_hop_ms = hops.max_ms(),
            "shuffle: started"
        );

        let started = Instant::now();
        let mut ticks = 0u32;
        let mut moves = 0usize;
        let mut fallbacks = 0u32;
        let mut last_step = None;
        while started.elapsed() < budget {
            let step = plan_step(&mut rng, session.slots.len(), hops);
            if step.fell_back {
                fallbacks += 1;
            }
            debug!(tick = ticks, k = step.moves.len(), duration_ms = step.duration_ms, attempts = step.attempts, "shuffle: tick");
            self.run_tick(&session, &step, settings.lift_tokens).await?;
            session.assignment.apply(&step.moves);
            ticks += 1;
            moves += step.moves.len();
            last_step = Some(step);
        }

        let elapsed = started.elapsed();
        info!(base_name, ticks, moves, fallbacks, ?elapsed, "shuffle: finished");
        Ok(ShuffleReport { ticks, moves, fallbacks, elapsed, assignment: session.assignment, last_step })
    }

    async fn run_tick(&self, session: &ShuffleSession, step: &RotationStep, lift: bool) -> Result<(), ShellError> {
        let movers: Vec<(&Token, Point)> = step
            .moves
            .iter()
            .map(|m| (&session.tokens[session.assignment.token_at(m.from)], session.slots[m.to]))
            .collect();

        if lift {
            all_ok(join_all(movers.iter().map(|(t, _)| self.scene.set_elevation(&t.id, t.elevation + LIFT_OFFSET))).await)?;
        }
        let moved = all_ok(
            join_all(
                movers
                    .iter()
                    .map(|(t, dest)| self.move_and_settle(&t.id, *dest, step.duration_ms)),
            )
            .await,
        );
        if lift {
            all_ok(join_all(movers.iter().map(|(t, _)| self.scene.set_elevation(&t.id, t.elevation))).await)?;
        }
        moved
    }

    async fn move_and_settle(&self, id: &str, dest: Point, duration_ms: u64) -> Result<(), ShellError> {
        self.scene.move_token(id, dest, duration_ms).await?;
        self.waiter.wait(duration_ms + SETTLE_MS).await;
        Ok(())
    }
}

fn all_ok(results: Vec<Result<(), ShellError>>) -> Result<(), ShellError> {
    results.into_iter().collect()
}

/// Holds the engine's running flag for the duration of one shuffle.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ShellError> {
        if flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            warn!("shuffle: rejected overlapping run");
            return Err(ShellError::ShuffleInProgress);
        }
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
