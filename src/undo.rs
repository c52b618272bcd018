/// Single-level undo memory: the gap of the last removed shot, handed to the
/// next recorded shot so a corrected mis-tap keeps its original cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndoCache {
    time_taken_ms: Option<u64>,
}

impl UndoCache {
    pub fn remember(&mut self, time_taken_ms: u64) {
        self.time_taken_ms = Some(time_taken_ms);
    }

    /// Consumed by the first shot after an undo, whatever its zone.
    pub fn take(&mut self) -> Option<u64> {
        self.time_taken_ms.take()
    }

    pub fn peek(&self) -> Option<u64> {
        self.time_taken_ms
    }

    pub fn clear(&mut self) {
        self.time_taken_ms = None;
    }
}
