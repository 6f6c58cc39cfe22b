//! Flow relation notifications
//!
//! Assistive tools read paragraphs in flow order. Whenever a whole table
//! frame enters or leaves the layout, the text frames around it get new
//! flow neighbours and a listener is told about it.

use crate::FrameId;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// The text frames on both sides of a changed spot in the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRelationEvent {
    pub prev: Option<FrameId>,
    pub next: Option<FrameId>,
}

pub trait FlowRelationListener {
    fn flow_relation_changed(&mut self, event: &FlowRelationEvent);
}

/// Listener keeping every event; clones share the log
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Rc<RefCell<Vec<FlowRelationEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FlowRelationEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl FlowRelationListener for RecordingListener {
    fn flow_relation_changed(&mut self, event: &FlowRelationEvent) {
        self.events.borrow_mut().push(*event);
    }
}
