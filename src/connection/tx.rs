use crate::error::OpenEdgeDbError;

/// Deepest nesting of managed blocks accepted on one connection.
pub const MAX_MANAGED_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// Every statement commits on success.
    Unmanaged,
    /// Inside a managed block with nothing pending.
    ManagedClean,
    /// Inside a managed block with uncommitted work.
    ManagedDirty,
}

/// Managed-block bookkeeping for one connection.
///
/// A stack of "managed" flags, one per open block, plus a dirty flag that is `None` until a
/// block has been entered.
#[derive(Debug, Clone, Default)]
pub struct TransactionState {
    managed: Vec<bool>,
    dirty: Option<bool>,
}

/// Result of leaving a managed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum LeaveOutcome {
    Clean,
    /// Uncommitted work was left behind; the caller must roll it back.
    Pending,
}

impl TransactionState {
    #[must_use]
    pub fn phase(&self) -> TransactionPhase {
        if !self.is_managed() {
            TransactionPhase::Unmanaged
        } else if self.is_dirty() {
            TransactionPhase::ManagedDirty
        } else {
            TransactionPhase::ManagedClean
        }
    }

    /// Whether the innermost block defers commits.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.managed.last().copied().unwrap_or(false)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.unwrap_or(false)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.managed.len()
    }

    /// # Errors
    /// Returns `OpenEdgeDbError::TransactionStateError` past [`MAX_MANAGED_DEPTH`].
    pub fn enter(&mut self) -> Result<(), OpenEdgeDbError> {
        if self.managed.len() >= MAX_MANAGED_DEPTH {
            return Err(OpenEdgeDbError::TransactionStateError(format!(
                "managed blocks nested deeper than {MAX_MANAGED_DEPTH}"
            )));
        }
        self.managed.push(true);
        if self.dirty.is_none() {
            self.dirty = Some(false);
        }
        Ok(())
    }

    /// # Errors
    /// Returns `OpenEdgeDbError::TransactionStateError` outside a managed block.
    pub fn mark_dirty(&mut self) -> Result<(), OpenEdgeDbError> {
        if self.managed.is_empty() {
            return Err(not_managed());
        }
        self.dirty = Some(true);
        Ok(())
    }

    /// Pop the innermost block. The dirty flag is cleared either way.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::TransactionStateError` outside a managed block.
    pub fn leave(&mut self) -> Result<LeaveOutcome, OpenEdgeDbError> {
        if self.managed.pop().is_none() {
            return Err(not_managed());
        }
        let outcome = if self.is_dirty() {
            LeaveOutcome::Pending
        } else {
            LeaveOutcome::Clean
        };
        self.clear_dirty();
        Ok(outcome)
    }

    /// Change whether the innermost block defers commits.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::TransactionStateError` outside a managed block.
    pub fn set_managed(&mut self, flag: bool) -> Result<(), OpenEdgeDbError> {
        match self.managed.last_mut() {
            Some(top) => {
                *top = flag;
                Ok(())
            }
            None => Err(not_managed()),
        }
    }

    /// Called after a commit or rollback.
    pub fn clear_dirty(&mut self) {
        if self.dirty.is_some() {
            self.dirty = Some(false);
        }
    }
}

fn not_managed() -> OpenEdgeDbError {
    OpenEdgeDbError::TransactionStateError("this code isn't under transaction management".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unmanaged() {
        let state = TransactionState::default();
        assert_eq!(state.phase(), TransactionPhase::Unmanaged);
        assert!(!state.is_dirty());
    }

    #[test]
    fn dirty_outside_block_fails() {
        let mut state = TransactionState::default();
        assert!(matches!(
            state.mark_dirty(),
            Err(OpenEdgeDbError::TransactionStateError(_))
        ));
        assert!(matches!(
            state.leave(),
            Err(OpenEdgeDbError::TransactionStateError(_))
        ));
        assert!(state.set_managed(false).is_err());
    }

    #[test]
    fn clean_and_dirty_phases() {
        let mut state = TransactionState::default();
        state.enter().unwrap();
        assert_eq!(state.phase(), TransactionPhase::ManagedClean);
        state.mark_dirty().unwrap();
        assert_eq!(state.phase(), TransactionPhase::ManagedDirty);
        state.clear_dirty();
        assert_eq!(state.phase(), TransactionPhase::ManagedClean);
        assert_eq!(state.leave().unwrap(), LeaveOutcome::Clean);
        assert_eq!(state.phase(), TransactionPhase::Unmanaged);
    }

    #[test]
    fn leaving_dirty_reports_pending() {
        let mut state = TransactionState::default();
        state.enter().unwrap();
        state.mark_dirty().unwrap();
        assert_eq!(state.leave().unwrap(), LeaveOutcome::Pending);
        assert!(!state.is_dirty());
    }

    #[test]
    fn nested_blocks_return_to_parent() {
        let mut state = TransactionState::default();
        state.enter().unwrap();
        state.enter().unwrap();
        state.set_managed(false).unwrap();
        assert_eq!(state.phase(), TransactionPhase::Unmanaged);
        assert_eq!(state.leave().unwrap(), LeaveOutcome::Clean);
        assert_eq!(state.phase(), TransactionPhase::ManagedClean);
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn depth_is_bounded() {
        let mut state = TransactionState::default();
        for _ in 0..MAX_MANAGED_DEPTH {
            state.enter().unwrap();
        }
        assert!(matches!(
            state.enter(),
            Err(OpenEdgeDbError::TransactionStateError(_))
        ));
    }
}
