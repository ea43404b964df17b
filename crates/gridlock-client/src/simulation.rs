//! The local replica grid.
//!
//! Every client keeps one of these: a bounded grid of player positions,
//! mutated only by executing relayed inputs. Out-of-bounds moves are
//! dropped silently: the grid edge is a wall, not an error.

use std::collections::HashMap;

use gridlock_protocol::{GridPos, PlayerId, PlayerInputBody};

use crate::ClientError;

/// Replicated player positions on a `width × height` grid, corner origin.
pub struct GridWorld {
    width: i32,
    height: i32,
    replicas: HashMap<PlayerId, GridPos>,
}

impl GridWorld {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            replicas: HashMap::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Creates a replica at its starting position.
    ///
    /// # Errors
    /// A second spawn for the same id is a [`ClientError::Violation`];
    /// the roster broadcast must not repeat players.
    pub fn spawn(&mut self, id: PlayerId, position: GridPos) -> Result<(), ClientError> {
        if self.replicas.contains_key(&id) {
            return Err(ClientError::Violation(format!(
                "duplicate player {id} in roster"
            )));
        }
        self.replicas.insert(id, position);
        Ok(())
    }

    /// Executes one relayed input against the replica grid.
    ///
    /// Movement commands apply in order; any step that would leave the
    /// grid is dropped silently. An input from an unknown sender is
    /// logged and skipped. Returns the replica's new position if it
    /// actually moved.
    pub fn apply(&mut self, input: &PlayerInputBody) -> Option<GridPos> {
        let Some(&start) = self.replicas.get(&input.player_id) else {
            tracing::warn!(player_id = %input.player_id, "input from unknown replica, skipping");
            return None;
        };

        let mut position = start;
        for command in &input.commands {
            let (dx, dy) = command.kind.delta();
            let next = position.offset(dx, dy);
            if self.in_bounds(next) {
                position = next;
            }
        }

        if position == start {
            return None;
        }
        self.replicas.insert(input.player_id, position);
        Some(position)
    }

    pub fn position(&self, id: PlayerId) -> Option<GridPos> {
        self.replicas.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    fn in_bounds(&self, pos: GridPos) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }
}

// =========================================================================
// Tests
// =========================================================================
