use crate::dynamics::{JointConstraint, SolverBody};
use std::ops::Range;

const MAX_COLORS: usize = 128;

/// Partitions the constraints of an island into conflict-free batches.
///
/// Two constraints conflict when they share a dynamic body: the force
/// iteration accumulates into per-body slots, so conflicting constraints must
/// not be solved concurrently. A greedy graph coloring assigns each
/// constraint the lowest color unused by its neighbors; a counting sort by
/// color then yields batches whose members can be solved in parallel without
/// any locking. Static bodies transmit no force and induce no conflicts.
///
/// The coloring is greedy, not optimal: the number of batches is close to,
/// but not necessarily equal to, the maximum number of constraints sharing
/// one body.
pub struct ConstraintBatches {
    body_colors: Vec<u128>,        // Workspace.
    constraint_colors: Vec<usize>, // Workspace.
    sorted_constraints: Vec<usize>,
    batches: Vec<usize>,
}

impl ConstraintBatches {
    /// Creates an empty partitioner.
    pub fn new() -> Self {
        Self {
            body_colors: Vec::new(),
            constraint_colors: Vec::new(),
            sorted_constraints: Vec::new(),
            batches: Vec::new(),
        }
    }

    /// The number of batches produced by the last call to [`Self::partition`].
    pub fn num_batches(&self) -> usize {
        self.batches.len().saturating_sub(1)
    }

    /// The constraint indices of the `i`-th batch.
    pub fn batch(&self, i: usize) -> &[usize] {
        &self.sorted_constraints[self.batch_range(i)]
    }

    /// The range of the `i`-th batch inside [`Self::sorted_constraints`].
    pub fn batch_range(&self, i: usize) -> Range<usize> {
        self.batches[i]..self.batches[i + 1]
    }

    /// The constraint indices, sorted by batch.
    pub fn sorted_constraints(&self) -> &[usize] {
        &self.sorted_constraints
    }

    /// Colors and sorts `constraints`.
    ///
    /// An island with zero constraints yields zero batches. A constraint
    /// referencing the same body twice panics: such a joint is a
    /// configuration error upstream and would silently break the
    /// race-freedom guarantee of the batches.
    pub fn partition(&mut self, bodies: &[SolverBody], constraints: &[JointConstraint]) {
        self.body_colors.clear();
        self.body_colors.resize(bodies.len(), 0u128);
        self.constraint_colors.clear();
        self.constraint_colors.resize(constraints.len(), 0);
        self.sorted_constraints.clear();
        self.batches.clear();

        let mut color_len = [0; MAX_COLORS];
        let bcolors = &mut self.body_colors;

        for (constraint, color) in constraints.iter().zip(self.constraint_colors.iter_mut()) {
            assert_ne!(
                constraint.body1, constraint.body2,
                "a joint cannot constrain a body to itself"
            );
            let is_static1 = bodies[constraint.body1].is_static();
            let is_static2 = bodies[constraint.body2].is_static();

            let color_mask = match (is_static1, is_static2) {
                (false, false) => bcolors[constraint.body1] | bcolors[constraint.body2],
                (true, false) => bcolors[constraint.body2],
                (false, true) => bcolors[constraint.body1],
                // A joint between two static bodies conflicts with nothing.
                (true, true) => 0,
            };

            *color = (!color_mask).trailing_zeros() as usize;
            assert!(
                *color < MAX_COLORS,
                "too many constraints in conflict on a single body"
            );
            color_len[*color] += 1;

            if !is_static1 {
                bcolors[constraint.body1] |= 1 << *color;
            }
            if !is_static2 {
                bcolors[constraint.body2] |= 1 << *color;
            }
        }

        let mut sort_offsets = [0; MAX_COLORS];
        let mut last_offset = 0;

        for i in 0..MAX_COLORS {
            if color_len[i] == 0 {
                break;
            }

            self.batches.push(last_offset);
            sort_offsets[i] = last_offset;
            last_offset += color_len[i];
        }

        self.sorted_constraints.resize(constraints.len(), 0);

        for (constraint_id, color) in self.constraint_colors.iter().enumerate() {
            self.sorted_constraints[sort_offsets[*color]] = constraint_id;
            sort_offsets[*color] += 1;
        }

        if !constraints.is_empty() {
            self.batches.push(self.sorted_constraints.len());
        }
    }
}

impl Default for ConstraintBatches {
    fn default() -> Self {
        Self::new()
    }
}
