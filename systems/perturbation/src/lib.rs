#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Seeded stochastic perturbation of the unobserved parts of a blocks world.
//!
//! Once per cycle the engine triggers with probability `dynamicity` and then
//! draws one weighted edit: stash a top block away, return a stashed block,
//! drop a top block as a new stack, or teleport a top block onto another
//! stack. Stacks observed by any agent are never touched.

use std::{collections::BTreeSet, fmt};

use blocks_world_core::{Block, Event, PerturbationEdit, StackId};
use blocks_world_system_environment::Perturbation;
use blocks_world_world::{
    query::{self, StackFilter},
    World, WorldError,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info};

const WEIGHT_TOLERANCE: f32 = 1e-4;

const SOURCE: StackFilter = StackFilter {
    allow_single: true,
    allow_locked_top: false,
};
const TARGET: StackFilter = StackFilter {
    allow_single: true,
    allow_locked_top: true,
};
const SPLITTABLE: StackFilter = StackFilter {
    allow_single: false,
    allow_locked_top: false,
};

/// World edits the engine can draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PerturbationKind {
    /// Moves a top block into the hidden stash.
    Stash,
    /// Stacks a stashed block onto a stack.
    Unstash,
    /// Splits a top block off into a new single-block stack.
    Drop,
    /// Moves a top block onto another stack.
    Teleport,
}

impl PerturbationKind {
    /// Every kind, in cumulative selection order.
    pub const ALL: [PerturbationKind; 4] = [Self::Stash, Self::Unstash, Self::Drop, Self::Teleport];
}

impl fmt::Display for PerturbationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stash => "stash",
            Self::Unstash => "unstash",
            Self::Drop => "drop",
            Self::Teleport => "teleport",
        };
        f.write_str(name)
    }
}

/// Invalid perturbation settings.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum TuningError {
    /// A weight is negative or not a number.
    #[error("weight {weight} for {kind} must be a non-negative number")]
    InvalidWeight {
        /// Offending kind.
        kind: PerturbationKind,
        /// Offending weight.
        weight: f32,
    },
    /// The weights do not add up to one.
    #[error("perturbation weights sum to {sum} instead of 1")]
    WeightSum {
        /// Actual sum of the weights.
        sum: f32,
    },
    /// The trigger probability lies outside `[0, 1]`.
    #[error("dynamicity {dynamicity} must lie between 0 and 1")]
    Dynamicity {
        /// Offending probability.
        dynamicity: f32,
    },
}

/// Selection weights of the four edits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerturbationTuning {
    /// Weight of [`PerturbationKind::Stash`].
    pub stash: f32,
    /// Weight of [`PerturbationKind::Unstash`].
    pub unstash: f32,
    /// Weight of [`PerturbationKind::Drop`].
    pub drop: f32,
    /// Weight of [`PerturbationKind::Teleport`].
    pub teleport: f32,
}

impl Default for PerturbationTuning {
    fn default() -> Self {
        Self {
            stash: 0.15,
            unstash: 0.25,
            drop: 0.3,
            teleport: 0.3,
        }
    }
}

impl PerturbationTuning {
    /// Weight assigned to the kind.
    #[must_use]
    pub const fn weight(&self, kind: PerturbationKind) -> f32 {
        match kind {
            PerturbationKind::Stash => self.stash,
            PerturbationKind::Unstash => self.unstash,
            PerturbationKind::Drop => self.drop,
            PerturbationKind::Teleport => self.teleport,
        }
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f32 {
        PerturbationKind::ALL
            .iter()
            .map(|kind| self.weight(*kind))
            .sum()
    }

    /// Checks that every weight is non-negative and that they sum to one.
    pub fn validate(&self) -> Result<(), TuningError> {
        for kind in PerturbationKind::ALL {
            let weight = self.weight(kind);
            if weight.is_nan() || weight < 0.0 {
                return Err(TuningError::InvalidWeight { kind, weight });
            }
        }
        let sum = self.total();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(TuningError::WeightSum { sum });
        }
        Ok(())
    }

    /// Kind selected by a uniform draw `roll` in `[0, 1)` using cumulative weights.
    #[must_use]
    pub fn pick(&self, roll: f32) -> PerturbationKind {
        let mut cumulative = 0.0;
        for kind in PerturbationKind::ALL {
            cumulative += self.weight(kind);
            if cumulative >= roll {
                return kind;
            }
        }
        PerturbationKind::Teleport
    }
}

/// Configuration parameters required to construct the perturbation engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    dynamicity: f32,
    rng_seed: u64,
    tuning: PerturbationTuning,
}

impl Config {
    /// Creates a configuration with the trigger probability, seed and default weights.
    #[must_use]
    pub fn new(dynamicity: f32, rng_seed: u64) -> Self {
        Self {
            dynamicity,
            rng_seed,
            tuning: PerturbationTuning::default(),
        }
    }

    /// Replaces the selection weights.
    #[must_use]
    pub const fn with_tuning(mut self, tuning: PerturbationTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Probability that a cycle is perturbed.
    #[must_use]
    pub const fn dynamicity(&self) -> f32 {
        self.dynamicity
    }

    /// Seed of the random generator.
    #[must_use]
    pub const fn rng_seed(&self) -> u64 {
        self.rng_seed
    }
}

/// Perturbation engine driven by a seeded ChaCha generator.
#[derive(Debug)]
pub struct DynamicPerturbation {
    dynamicity: f32,
    tuning: PerturbationTuning,
    rng: ChaCha8Rng,
    stash: BTreeSet<Block>,
}

impl DynamicPerturbation {
    /// Creates the engine after validating the configuration.
    pub fn new(config: Config) -> Result<Self, TuningError> {
        if !(0.0..=1.0).contains(&config.dynamicity) {
            return Err(TuningError::Dynamicity {
                dynamicity: config.dynamicity,
            });
        }
        config.tuning.validate()?;
        Ok(Self {
            dynamicity: config.dynamicity,
            tuning: config.tuning,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            stash: BTreeSet::new(),
        })
    }

    /// Blocks currently hidden in the stash.
    #[must_use]
    pub fn stash(&self) -> &BTreeSet<Block> {
        &self.stash
    }

    fn choose(
        &mut self,
        world: &World,
        observed: &BTreeSet<StackId>,
        filter: StackFilter,
    ) -> Option<StackId> {
        query::unobserved_stacks(world, observed, filter)
            .choose(&mut self.rng)
            .copied()
    }

    fn stash_top(
        &mut self,
        world: &mut World,
        observed: &BTreeSet<StackId>,
    ) -> Result<Option<PerturbationEdit>, WorldError> {
        let Some(source) = self.choose(world, observed, SOURCE) else {
            return Ok(None);
        };
        let Some(block) = detach_top(world, source)? else {
            return Ok(None);
        };
        let _ = self.stash.insert(block);
        Ok(Some(PerturbationEdit::Stashed { block }))
    }

    fn unstash(
        &mut self,
        world: &mut World,
        observed: &BTreeSet<StackId>,
    ) -> Result<Option<PerturbationEdit>, WorldError> {
        if self.stash.is_empty() {
            return Ok(None);
        }
        let Some(target) = self.choose(world, observed, TARGET) else {
            return Ok(None);
        };
        let Some(onto) = query::top_block(world, target) else {
            return Ok(None);
        };
        let stashed: Vec<Block> = self.stash.iter().copied().collect();
        let Some(block) = stashed.choose(&mut self.rng).copied() else {
            return Ok(None);
        };
        world.stack(block, onto)?;
        let _ = self.stash.remove(&block);
        Ok(Some(PerturbationEdit::Unstashed { block, onto }))
    }

    fn drop_top(
        &mut self,
        world: &mut World,
        observed: &BTreeSet<StackId>,
    ) -> Result<Option<PerturbationEdit>, WorldError> {
        let Some(source) = self.choose(world, observed, SPLITTABLE) else {
            return Ok(None);
        };
        let Some(block) = detach_top(world, source)? else {
            return Ok(None);
        };
        let _ = world.put_down(block, Some(source))?;
        Ok(Some(PerturbationEdit::Dropped { block }))
    }

    fn teleport(
        &mut self,
        world: &mut World,
        observed: &BTreeSet<StackId>,
    ) -> Result<Option<PerturbationEdit>, WorldError> {
        let Some(source) = self.choose(world, observed, SOURCE) else {
            return Ok(None);
        };
        let Some(target) = self.choose(world, observed, TARGET) else {
            return Ok(None);
        };
        if source == target {
            return Ok(None);
        }
        let Some(onto) = query::top_block(world, target) else {
            return Ok(None);
        };
        let Some(block) = detach_top(world, source)? else {
            return Ok(None);
        };
        world.stack(block, onto)?;
        Ok(Some(PerturbationEdit::Teleported { block, onto }))
    }
}

impl Perturbation for DynamicPerturbation {
    fn perturb(
        &mut self,
        world: &mut World,
        observed: &BTreeSet<StackId>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        if self.dynamicity <= 0.0 || self.rng.gen::<f32>() >= self.dynamicity {
            return Ok(());
        }

        let kind = self.tuning.pick(self.rng.gen::<f32>());
        let edit = match kind {
            PerturbationKind::Stash => self.stash_top(world, observed)?,
            PerturbationKind::Unstash => self.unstash(world, observed)?,
            PerturbationKind::Drop => self.drop_top(world, observed)?,
            PerturbationKind::Teleport => self.teleport(world, observed)?,
        };

        match edit {
            Some(edit) => {
                info!(?edit, "perturbed world");
                out_events.push(Event::Perturbed { edit });
            }
            None => debug!(%kind, "no eligible stack, perturbation skipped"),
        }
        Ok(())
    }

    fn describe(&self) -> Option<String> {
        let blocks: Vec<String> = self.stash.iter().map(ToString::to_string).collect();
        Some(format!("Stash: [{}]", blocks.join(", ")))
    }
}

/// Lifts the top block off the stack, removing the stack when it was the only block.
fn detach_top(world: &mut World, stack: StackId) -> Result<Option<Block>, WorldError> {
    let Some(source) = world.stack_by_id(stack) else {
        return Ok(None);
    };
    let Some(block) = source.top() else {
        return Ok(None);
    };
    if source.is_single() {
        return world.pick_up(block).map(Some);
    }
    match source.below(block)? {
        Some(below) => world.unstack(block, below).map(Some),
        None => Ok(None),
    }
}
