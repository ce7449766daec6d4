//! Stage sequencer.
//!
//! Holds the ordered stage list and the "next stage" cursor. It knows nothing
//! about listeners; the engine tells it when a stage has fired.
//!
//! # State Transitions
//! ```text
//! cursor = stages[0] → stages[1] → ... → stages[n-1] → none (final)
//! ```
//!
//! # Design Decisions
//! - The cursor is an index into the stage list, stored atomically
//! - `on_stage` advances from the reported stage's own position, not from
//!   the cursor, so re-reporting a historical stage moves the cursor back to
//!   that stage's successor
//! - Once past the last stage the cursor stays at none

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::stage::Stage;

/// Ordered stage sequence with a forward-only cursor.
#[derive(Debug)]
pub struct StageDriver {
    stages: Vec<Stage>,
    positions: HashMap<Stage, usize>,
    /// Index of the next stage to fire; `stages.len()` once exhausted.
    cursor: AtomicUsize,
}

impl StageDriver {
    /// Build a driver from an ordered list of distinct stages.
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> LifecycleResult<Self> {
        let stages: Vec<Stage> = stages.into_iter().collect();
        let mut positions = HashMap::with_capacity(stages.len());

        for (index, stage) in stages.iter().enumerate() {
            if positions.insert(stage.clone(), index).is_some() {
                return Err(LifecycleError::DuplicateStage(stage.clone()));
            }
        }

        Ok(Self {
            stages,
            positions,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Build a driver from stages the caller knows to be distinct.
    /// A repeated stage keeps its last position.
    pub(crate) fn from_distinct(stages: Vec<Stage>) -> Self {
        let positions = stages
            .iter()
            .enumerate()
            .map(|(index, stage)| (stage.clone(), index))
            .collect();
        Self {
            stages,
            positions,
            cursor: AtomicUsize::new(0),
        }
    }

    /// All stages in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Whether `stage` belongs to this sequence.
    pub fn contains(&self, stage: &Stage) -> bool {
        self.positions.contains_key(stage)
    }

    /// The stage that fires next, or `None` once the sequence is exhausted.
    pub fn next_stage(&self) -> Option<Stage> {
        self.stages.get(self.cursor.load(Ordering::Acquire)).cloned()
    }

    /// True once the last stage has been reported.
    pub fn is_exhausted(&self) -> bool {
        self.cursor.load(Ordering::Acquire) >= self.stages.len()
    }

    /// The designated successor of `stage`; `None` for the last stage.
    pub fn successor(&self, stage: &Stage) -> LifecycleResult<Option<&Stage>> {
        let index = self.position(stage)?;
        Ok(self.stages.get(index + 1))
    }

    /// Whether `target` is still ahead of (or at) the cursor.
    pub fn is_pending(&self, target: &Stage) -> bool {
        match self.positions.get(target) {
            Some(&index) => index >= self.cursor.load(Ordering::Acquire),
            None => false,
        }
    }

    /// Record that `stage` fired, moving the cursor to its successor.
    pub fn on_stage(&self, stage: &Stage) -> LifecycleResult<()> {
        let index = self.position(stage)?;
        self.cursor.store(index + 1, Ordering::Release);
        tracing::trace!(stage = %stage, next = ?self.next_stage().map(|s| s.to_string()), "Cursor advanced");
        Ok(())
    }

    fn position(&self, stage: &Stage) -> LifecycleResult<usize> {
        self.positions
            .get(stage)
            .copied()
            .ok_or_else(|| self.unknown_stage(stage))
    }

    /// Build the error reported for a stage outside this sequence.
    pub(crate) fn unknown_stage(&self, stage: &Stage) -> LifecycleError {
        LifecycleError::UnknownStage {
            stage: stage.clone(),
            supported: self
                .stages
                .iter()
                .map(Stage::name)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl fmt::Display for StageDriver {
    /// Renders `[configure, *start*, stop]`, starring the next stage.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cursor = self.cursor.load(Ordering::Acquire);
        f.write_str("[")?;
        for (index, stage) in self.stages.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            if index == cursor {
                write!(f, "*{}*", stage)?;
            } else {
                write!(f, "{}", stage)?;
            }
        }
        f.write_str("]")
    }
}
