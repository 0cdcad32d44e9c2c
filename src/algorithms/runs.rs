//! Run-length state machine shared by the line detection operators.

use crate::core::histogram::LineLengthHistogram;

/// State of a line scan at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    NoRun,
    InRun(usize),
}

impl RunState {
    /// Step over one cell. Returns the length of a run closed by this cell.
    #[inline(always)]
    pub fn advance(&mut self, cell: bool) -> Option<usize> {
        match (*self, cell) {
            (RunState::NoRun, true) => {
                *self = RunState::InRun(1);
                None
            }
            (RunState::InRun(n), true) => {
                *self = RunState::InRun(n + 1);
                None
            }
            (RunState::InRun(n), false) => {
                *self = RunState::NoRun;
                Some(n)
            }
            (RunState::NoRun, false) => None,
        }
    }

    /// Close the scan, returning an open run.
    #[inline]
    pub fn close(&mut self) -> Option<usize> {
        match std::mem::take(self) {
            RunState::InRun(n) => Some(n),
            RunState::NoRun => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, RunState::InRun(_))
    }
}

/// Recurrent and non-recurrent runs along one vertical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineState {
    pub recurrent: RunState,
    pub white: RunState,
}

impl LineState {
    #[inline(always)]
    pub fn advance(&mut self, cell: bool, out: &mut VerticalHistograms) {
        if let Some(n) = self.recurrent.advance(cell) {
            out.vertical.add(n);
        }
        if let Some(n) = self.white.advance(!cell) {
            out.white_vertical.add(n);
        }
    }

    /// Close both runs, counting them into `out`.
    pub fn close_into(&mut self, out: &mut VerticalHistograms) {
        if let Some(n) = self.recurrent.close() {
            out.vertical.add(n);
        }
        if let Some(n) = self.white.close() {
            out.white_vertical.add(n);
        }
    }

    /// Close both runs without counting them.
    pub fn discard(&mut self) {
        *self = LineState::default();
    }
}

/// Vertical and white vertical line histograms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerticalHistograms {
    pub vertical: LineLengthHistogram,
    pub white_vertical: LineLengthHistogram,
}

impl VerticalHistograms {
    pub fn merge(&mut self, other: &VerticalHistograms) {
        self.vertical.merge(&other.vertical);
        self.white_vertical.merge(&other.white_vertical);
    }
}
