//! Undo and redo for network edits
//!
//! Every edit is a command that remembers what it replaced, so undoing it
//! restores that state instead of trying to compute an inverse.

use anyhow::{bail, Context, Result};
use log::debug;

use super::network::{Adjacency, Network};
use super::serialization::{insert_record, segment_to_record, SegmentRecord};
use super::types::{Endpoint, Point, SegmentId};

#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    AddSegment {
        record: SegmentRecord,
    },
    RemoveSegment {
        id: SegmentId,
        /// Filled in when the command runs
        removed: Option<SegmentRecord>,
    },
    MoveEndpoint {
        id: SegmentId,
        endpoint: Endpoint,
        to: Point,
        from: Option<Point>,
    },
    Connect {
        first: SegmentId,
        second: SegmentId,
        ignore_angles: bool,
        before: Option<(Adjacency, Adjacency)>,
    },
    Disconnect {
        first: SegmentId,
        second: SegmentId,
        before: Option<(Adjacency, Adjacency)>,
    },
}

impl EditCommand {
    pub fn add_linear(start: Point, end: Point) -> Self {
        Self::add(start, end, None, None)
    }

    pub fn add_circular(start: Point, end: Point, center: Point, counter_clockwise: bool) -> Self {
        Self::add(start, end, Some(center), Some(counter_clockwise))
    }

    fn add(start: Point, end: Point, center: Option<Point>, counter_clockwise: Option<bool>) -> Self {
        EditCommand::AddSegment {
            record: SegmentRecord {
                id: SegmentId::new_random().to_string(),
                start,
                end,
                center,
                counter_clockwise,
                at_start: Vec::new(),
                at_end: Vec::new(),
                stations: Vec::new(),
                train_start_positions: Vec::new(),
            },
        }
    }

    pub fn remove_segment(id: SegmentId) -> Self {
        EditCommand::RemoveSegment { id, removed: None }
    }

    pub fn move_endpoint(id: SegmentId, endpoint: Endpoint, to: Point) -> Self {
        EditCommand::MoveEndpoint {
            id,
            endpoint,
            to,
            from: None,
        }
    }

    pub fn connect(first: SegmentId, second: SegmentId, ignore_angles: bool) -> Self {
        EditCommand::Connect {
            first,
            second,
            ignore_angles,
            before: None,
        }
    }

    pub fn disconnect(first: SegmentId, second: SegmentId) -> Self {
        EditCommand::Disconnect {
            first,
            second,
            before: None,
        }
    }

    /// Id of the segment this command creates, for `AddSegment`
    pub fn created_segment(&self) -> Option<SegmentId> {
        match self {
            EditCommand::AddSegment { record } => SegmentId::parse(&record.id).ok(),
            _ => None,
        }
    }

    /// Runs the command, recording the state it replaces.
    /// Returns `Ok(false)` when the network refused the edit.
    fn apply(&mut self, network: &mut Network) -> Result<bool> {
        match self {
            EditCommand::AddSegment { record } => {
                insert_record(network, record)?;
                Ok(true)
            }
            EditCommand::RemoveSegment { id, removed } => {
                let segment = network
                    .segment(*id)
                    .with_context(|| format!("Segment {} not found", id))?;
                let record = segment_to_record(network, segment);
                network.remove_segment(*id)?;
                *removed = Some(record);
                Ok(true)
            }
            EditCommand::MoveEndpoint {
                id,
                endpoint,
                to,
                from,
            } => {
                let current = network
                    .segment(*id)
                    .with_context(|| format!("Segment {} not found", id))?
                    .endpoint(*endpoint);
                if !network.move_endpoint(*id, *endpoint, *to)? {
                    return Ok(false);
                }
                *from = Some(current);
                Ok(true)
            }
            EditCommand::Connect {
                first,
                second,
                ignore_angles,
                before,
            } => {
                let snapshot = adjacency_pair(network, *first, *second)?;
                if !network.connect(*first, *second, *ignore_angles, true)? {
                    return Ok(false);
                }
                *before = Some(snapshot);
                Ok(true)
            }
            EditCommand::Disconnect {
                first,
                second,
                before,
            } => {
                let snapshot = adjacency_pair(network, *first, *second)?;
                if !network.disconnect(*first, *second) {
                    return Ok(false);
                }
                *before = Some(snapshot);
                Ok(true)
            }
        }
    }

    fn revert(&self, network: &mut Network) -> Result<()> {
        match self {
            EditCommand::AddSegment { record } => {
                let id = SegmentId::parse(&record.id)?;
                network.remove_segment(id)?;
            }
            EditCommand::RemoveSegment { removed, .. } => {
                let record = removed
                    .as_ref()
                    .context("Removed segment was never recorded")?;
                insert_record(network, record)?;
            }
            EditCommand::MoveEndpoint {
                id, endpoint, from, ..
            } => {
                let from = (*from).context("Previous endpoint was never recorded")?;
                // The segment may have been connected since, which would refuse the move
                let adjacency = network
                    .adjacency(*id)
                    .with_context(|| format!("Segment {} not found", id))?;
                network.set_adjacency(*id, Adjacency::default())?;
                let moved = network.move_endpoint(*id, *endpoint, from);
                network.set_adjacency(*id, adjacency)?;
                if !moved? {
                    bail!("Segment {} could not be moved back", id);
                }
            }
            EditCommand::Connect {
                first,
                second,
                before,
                ..
            }
            | EditCommand::Disconnect {
                first,
                second,
                before,
            } => {
                let (first_adjacency, second_adjacency) = before
                    .clone()
                    .context("Previous connections were never recorded")?;
                network.set_adjacency(*first, first_adjacency)?;
                network.set_adjacency(*second, second_adjacency)?;
            }
        }
        Ok(())
    }
}

fn adjacency_pair(network: &Network, first: SegmentId, second: SegmentId) -> Result<(Adjacency, Adjacency)> {
    Ok((
        network
            .adjacency(first)
            .with_context(|| format!("Segment {} not found", first))?,
        network
            .adjacency(second)
            .with_context(|| format!("Segment {} not found", second))?,
    ))
}

/// Bounded undo stack with a cursor. Entries past the cursor can be redone
/// until a new command is executed.
#[derive(Debug, Clone)]
pub struct EditHistory {
    commands: Vec<EditCommand>,
    cursor: usize,
    capacity: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl EditHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: Vec::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Runs a command and records it. A refused edit is not recorded.
    pub fn execute(&mut self, network: &mut Network, mut command: EditCommand) -> Result<bool> {
        if !command.apply(network)? {
            debug!("Edit refused: {:?}", command);
            return Ok(false);
        }

        self.commands.truncate(self.cursor);
        self.commands.push(command);
        if self.commands.len() > self.capacity {
            self.commands.remove(0);
        }
        self.cursor = self.commands.len();
        Ok(true)
    }

    pub fn undo(&mut self, network: &mut Network) -> Result<bool> {
        if self.cursor == 0 {
            return Ok(false);
        }
        self.commands[self.cursor - 1].revert(network)?;
        self.cursor -= 1;
        Ok(true)
    }

    pub fn redo(&mut self, network: &mut Network) -> Result<bool> {
        if self.cursor == self.commands.len() {
            return Ok(false);
        }
        if !self.commands[self.cursor].apply(network)? {
            return Ok(false);
        }
        self.cursor += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
