use super::value_objects::ViewState;

/// Where the history is in its record/apply cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryPhase {
    Idle,
    /// A snapshot is due at `due_ms` unless rescheduled or cancelled.
    DebouncePending { due_ms: f64 },
    /// An undo is being applied; recording is suppressed.
    Applying,
}

/// Bounded undo stack of view snapshots with a debounced recorder.
#[derive(Debug, Clone)]
pub struct ViewHistory {
    entries: Vec<ViewState>,
    pointer: Option<usize>,
    phase: HistoryPhase,
    capacity: usize,
    debounce_ms: f64,
    epsilon: f64,
}

impl ViewHistory {
    pub fn new(capacity: usize, debounce_ms: f64, epsilon: f64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            pointer: None,
            phase: HistoryPhase::Idle,
            capacity: capacity.max(1),
            debounce_ms,
            epsilon,
        }
    }

    pub fn phase(&self) -> HistoryPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pointer(&self) -> Option<usize> {
        self.pointer
    }

    pub fn can_undo(&self) -> bool {
        self.pointer.is_some_and(|p| p > 0)
    }

    /// Record `view` unless it matches the current entry. `force` records anyway.
    /// Entries after the pointer are discarded and the oldest are evicted
    /// beyond capacity. Returns true when an entry was pushed.
    pub fn record(&mut self, view: ViewState, force: bool) -> bool {
        if self.phase == HistoryPhase::Applying {
            return false;
        }
        if !force
            && let Some(current) = self.pointer.and_then(|p| self.entries.get(p))
            && current.is_similar(&view, self.epsilon)
        {
            return false;
        }

        if let Some(p) = self.pointer {
            self.entries.truncate(p + 1);
        }
        self.entries.push(view);
        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
        }
        self.pointer = Some(self.entries.len() - 1);
        true
    }

    /// Arm (or re-arm) the debounce timer.
    pub fn schedule(&mut self, now_ms: f64) {
        if self.phase == HistoryPhase::Applying {
            return;
        }
        self.phase = HistoryPhase::DebouncePending { due_ms: now_ms + self.debounce_ms };
    }

    /// Record `view` if the debounce has elapsed. Returns true when recorded.
    pub fn poll(&mut self, now_ms: f64, view: ViewState) -> bool {
        match self.phase {
            HistoryPhase::DebouncePending { due_ms } if now_ms >= due_ms => {
                self.phase = HistoryPhase::Idle;
                self.record(view, false)
            }
            _ => false,
        }
    }

    /// Drop a pending snapshot without recording it.
    pub fn cancel_pending(&mut self) {
        if matches!(self.phase, HistoryPhase::DebouncePending { .. }) {
            self.phase = HistoryPhase::Idle;
        }
    }

    /// Step back one entry and enter `Applying`. The caller applies the
    /// returned state and then calls [`ViewHistory::end_apply`].
    pub fn begin_undo(&mut self) -> Option<ViewState> {
        let pointer = self.pointer.filter(|p| *p > 0)?;
        self.cancel_pending();
        self.phase = HistoryPhase::Applying;
        self.pointer = Some(pointer - 1);
        self.entries.get(pointer - 1).copied()
    }

    pub fn end_apply(&mut self) {
        if self.phase == HistoryPhase::Applying {
            self.phase = HistoryPhase::Idle;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pointer = None;
        self.phase = HistoryPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(t: f64) -> ViewState {
        ViewState { scale_x: 2.0, translate_x: t, ..Default::default() }
    }

    #[test]
    fn similar_snapshot_is_skipped() {
        let mut history = ViewHistory::new(50, 120.0, 0.0005);
        assert!(history.record(view(0.0), true));
        assert!(!history.record(view(0.0001), false));
        assert!(history.record(view(0.0001), true));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn debounce_fires_once_after_delay() {
        let mut history = ViewHistory::new(50, 120.0, 0.0005);
        history.record(ViewState::default(), true);
        history.schedule(1000.0);
        history.schedule(1050.0);
        assert!(!history.poll(1160.0, view(0.5)));
        assert!(history.poll(1170.0, view(0.5)));
        assert_eq!(history.phase(), HistoryPhase::Idle);
        assert!(history.can_undo());
    }

    #[test]
    fn undo_truncates_redo_tail_on_next_record() {
        let mut history = ViewHistory::new(50, 120.0, 0.0005);
        history.record(view(0.0), true);
        history.record(view(0.2), true);
        history.record(view(0.4), true);
        assert_eq!(history.begin_undo(), Some(view(0.2)));
        assert!(!history.record(view(0.9), true));
        history.end_apply();
        history.record(view(0.9), false);
        assert_eq!(history.len(), 3);
        assert_eq!(history.pointer(), Some(2));
    }
}
