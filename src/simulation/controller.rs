//! Input abstraction for steering the simulation
//!
//! The simulation only knows four discrete commands. Binding them to keys,
//! buttons or scripts happens outside.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// The commands a player can give
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlEvent {
    /// Select the next train
    NextTrain,
    /// Select the previous train
    PreviousTrain,
    /// Make the selected train take the leftmost branch at junctions
    TurnLeft,
    /// Make the selected train take the rightmost branch at junctions
    TurnRight,
}

/// A source of control events, drained once per simulation tick
pub trait Controller {
    fn drain(&mut self) -> Vec<ControlEvent>;
}

/// Queue of pending events. Clones share the same queue, so one handle can be
/// given to the simulation while another keeps feeding it.
#[derive(Debug, Clone, Default)]
pub struct ControlQueue {
    queue: Rc<RefCell<VecDeque<ControlEvent>>>,
}

impl ControlQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: ControlEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    pub fn next_train(&self) {
        self.push(ControlEvent::NextTrain);
    }

    pub fn previous_train(&self) {
        self.push(ControlEvent::PreviousTrain);
    }

    pub fn turn_left(&self) {
        self.push(ControlEvent::TurnLeft);
    }

    pub fn turn_right(&self) {
        self.push(ControlEvent::TurnRight);
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Controller for ControlQueue {
    fn drain(&mut self) -> Vec<ControlEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }
}
