//! Scoped guards over the editing engine
//!
//! Each guard switches something off (undo recording, change notices of a
//! table, redline tracking) for as long as it lives and switches it back on
//! when dropped, on every exit path. Guards deref to the engine so the
//! guarded work goes through them.

use crate::{EditingEngine, Result};
use doc_model::NodeId;
use std::ops::{Deref, DerefMut};

// =============================================================================
// Undo suppression
// =============================================================================

/// Suppresses undo recording; nests
pub struct UndoDisabled<'a> {
    engine: &'a mut EditingEngine,
}

impl<'a> UndoDisabled<'a> {
    pub fn new(engine: &'a mut EditingEngine) -> Self {
        engine.undo.disable();
        Self { engine }
    }
}

impl Drop for UndoDisabled<'_> {
    fn drop(&mut self) {
        self.engine.undo.enable();
    }
}

impl Deref for UndoDisabled<'_> {
    type Target = EditingEngine;

    fn deref(&self) -> &EditingEngine {
        self.engine
    }
}

impl DerefMut for UndoDisabled<'_> {
    fn deref_mut(&mut self) -> &mut EditingEngine {
        self.engine
    }
}

// =============================================================================
// Table modify lock
// =============================================================================

/// Keeps format changes of one table from raising change notices
pub struct LockModify<'a> {
    engine: &'a mut EditingEngine,
    table: NodeId,
}

impl<'a> LockModify<'a> {
    pub fn new(engine: &'a mut EditingEngine, table: NodeId) -> Result<Self> {
        engine.doc.table_mut(table)?.lock_modify();
        Ok(Self { engine, table })
    }
}

impl Drop for LockModify<'_> {
    fn drop(&mut self) {
        // The table may have been merged away meanwhile
        if let Ok(table) = self.engine.doc.table_mut(self.table) {
            table.unlock_modify();
        }
    }
}

impl Deref for LockModify<'_> {
    type Target = EditingEngine;

    fn deref(&self) -> &EditingEngine {
        self.engine
    }
}

impl DerefMut for LockModify<'_> {
    fn deref_mut(&mut self) -> &mut EditingEngine {
        self.engine
    }
}

// =============================================================================
// Redline suspension
// =============================================================================

/// Switches redline tracking off, restoring the previous state on drop
pub struct TrackingSuspended<'a> {
    engine: &'a mut EditingEngine,
    was_tracking: bool,
}

impl<'a> TrackingSuspended<'a> {
    pub fn new(engine: &'a mut EditingEngine) -> Self {
        let was_tracking = engine.redlines.tracking_enabled;
        // Bypasses the tracking lock, the switch is restored on drop
        engine.redlines.tracking_enabled = false;
        Self { engine, was_tracking }
    }
}

impl Drop for TrackingSuspended<'_> {
    fn drop(&mut self) {
        self.engine.redlines.tracking_enabled = self.was_tracking;
    }
}

impl Deref for TrackingSuspended<'_> {
    type Target = EditingEngine;

    fn deref(&self) -> &EditingEngine {
        self.engine
    }
}

impl DerefMut for TrackingSuspended<'_> {
    fn deref_mut(&mut self) -> &mut EditingEngine {
        self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_disabled_restores_on_drop() {
        let mut engine = EditingEngine::new();
        {
            let mut outer = UndoDisabled::new(&mut engine);
            assert!(!outer.undo_manager().does_undo());
            {
                let inner = UndoDisabled::new(&mut outer);
                assert!(!inner.undo_manager().does_undo());
            }
            assert!(!outer.undo_manager().does_undo());
        }
        assert!(engine.undo_manager().does_undo());
    }

    #[test]
    fn test_tracking_suspended_restores() {
        let mut engine = EditingEngine::new();
        engine.redlines_mut().enable_tracking().unwrap();
        engine.redlines_mut().lock_tracking();
        {
            let guard = TrackingSuspended::new(&mut engine);
            assert!(!guard.redlines().is_tracking());
        }
        assert!(engine.redlines().is_tracking());
    }

    #[test]
    fn test_lock_modify_requires_table() {
        let mut engine = EditingEngine::new();
        assert!(LockModify::new(&mut engine, NodeId::new()).is_err());
    }
}
