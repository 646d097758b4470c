//! GPIO line traits
//!
//! A backend hands out exclusively owned lines. Dropping a line releases it
//! back to the kernel (or simulator). Lines are `Send + Sync` because the
//! protocol core may touch them from the dispatch thread while the caller's
//! thread is transmitting.

use crate::error::Result;
use crate::pin::{Level, Offset};
use std::time::Duration;

/// A claimed input line
pub trait InputLine: Send + Sync {
    /// Sample the current level
    fn read(&self) -> Result<Level>;
}

/// A claimed output line
pub trait OutputLine: Send + Sync {
    /// Drive the line to `level`
    fn write(&self, level: Level) -> Result<()>;
}

/// Which edges an interrupt line reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDetection {
    /// Low to high transitions only
    Rising,
    /// High to low transitions only
    Falling,
    /// Both transitions
    Both,
}

/// Direction of an observed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Low to high
    Rising,
    /// High to low
    Falling,
}

/// One edge reported by an [`EdgeSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Line the edge occurred on
    pub offset: Offset,
    /// Edge direction
    pub kind: EdgeKind,
    /// Kernel timestamp in nanoseconds, if the backend provides one
    pub timestamp_ns: u64,
}

/// A set of interrupt lines that can be waited on
///
/// Events are delivered in the order the backend queued them, which keeps
/// per-line FIFO order. Ordering across lines is whatever the backend's
/// queue gives.
pub trait EdgeSource: Send + 'static {
    /// Wait up to `timeout` for the next edge
    ///
    /// Returns `Ok(None)` on timeout.
    fn wait_edge(&mut self, timeout: Duration) -> Result<Option<EdgeEvent>>;
}

/// A GPIO chip that can hand out lines
pub trait GpioBackend {
    /// Input line type
    type Input: InputLine + 'static;
    /// Output line type
    type Output: OutputLine + 'static;
    /// Edge source type
    type Edges: EdgeSource;

    /// Claim `offset` as an input
    fn request_input(&self, offset: Offset, label: &str) -> Result<Self::Input>;

    /// Claim `offset` as an output driven to `initial`
    fn request_output(&self, offset: Offset, initial: Level, label: &str)
        -> Result<Self::Output>;

    /// Claim all `lines` as inputs reporting edges per `detection`
    fn request_edges(
        &self,
        lines: &[(Offset, &str)],
        detection: EdgeDetection,
    ) -> Result<Self::Edges>;
}

/// A line that may not exist on a given board
///
/// Boards without an RF switch have no TXEN/RXEN; every HAL step touching
/// such a line checks presence explicitly and does nothing when absent.
#[derive(Debug)]
pub enum OptionalLine<L> {
    /// Line is wired up
    Present(L),
    /// Feature does not exist on this hardware
    Absent,
}

impl<L> OptionalLine<L> {
    /// True if the line is wired up
    pub fn is_present(&self) -> bool {
        matches!(self, OptionalLine::Present(_))
    }

    /// Borrow the line if present
    pub fn as_ref(&self) -> Option<&L> {
        match self {
            OptionalLine::Present(line) => Some(line),
            OptionalLine::Absent => None,
        }
    }
}

impl<L> From<Option<L>> for OptionalLine<L> {
    fn from(line: Option<L>) -> Self {
        match line {
            Some(line) => OptionalLine::Present(line),
            None => OptionalLine::Absent,
        }
    }
}

impl<L: OutputLine> OptionalLine<L> {
    /// Drive the line if present, otherwise do nothing
    pub fn drive(&self, level: Level) -> Result<()> {
        match self {
            OptionalLine::Present(line) => line.write(level),
            OptionalLine::Absent => Ok(()),
        }
    }
}
