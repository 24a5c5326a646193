use std::fmt;

/// Granularity of an iteration counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeScale {
    Run,
    Epoch,
    Trial,
}

impl TimeScale {
    pub const ALL: [TimeScale; 3] = [TimeScale::Run, TimeScale::Epoch, TimeScale::Trial];
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeScale::Run => f.write_str("run"),
            TimeScale::Epoch => f.write_str("epoch"),
            TimeScale::Trial => f.write_str("trial"),
        }
    }
}

/// Current and previous value of a counter, plus whether the last step
/// changed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    cur: usize,
    prv: Option<usize>,
    chg: bool,
}

impl Counter {
    pub fn cur(&self) -> usize {
        self.cur
    }

    pub fn prv(&self) -> Option<usize> {
        self.prv
    }

    pub fn changed(&self) -> bool {
        self.chg
    }

    /// `(cur, prv, changed)`.
    pub fn query(&self) -> (usize, Option<usize>, bool) {
        (self.cur, self.prv, self.chg)
    }

    pub fn reset(&mut self) {
        *self = Counter::default();
    }

    /// Clear the change flag.
    pub fn same(&mut self) {
        self.chg = false;
    }

    pub fn incr(&mut self) {
        self.set(self.cur + 1);
    }

    pub fn set(&mut self, cur: usize) {
        self.prv = Some(self.cur);
        self.cur = cur;
        self.chg = true;
    }

    pub(crate) fn start_at(&mut self, cur: usize) {
        self.cur = cur;
        self.prv = None;
        self.chg = true;
    }
}
