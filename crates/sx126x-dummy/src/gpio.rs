//! Simulated GPIO chip
//!
//! Lines are claimed exclusively the way the kernel does it: a second claim
//! on a held line fails, dropping the handle releases it. Tests play the
//! outside world through [`SimChip::set_input`], which queues edge events for
//! whoever is watching the line.

use crate::error::{Result, SimError};
use crate::trace::{Trace, TraceEvent};

use sx126x_core::{
    EdgeDetection, EdgeEvent, EdgeKind, EdgeSource, GpioBackend, InputLine, Level, Offset,
    OutputLine,
};

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct LineState {
    level: Level,
    holder: Option<String>,
    output: bool,
}

struct Watcher {
    id: u64,
    offsets: Vec<Offset>,
    detection: EdgeDetection,
    tx: Sender<EdgeEvent>,
}

struct ChipState {
    lines: Vec<LineState>,
    watchers: Vec<Watcher>,
    next_watcher: u64,
    clock_ns: u64,
}

impl ChipState {
    fn line(&mut self, offset: Offset) -> Result<&mut LineState> {
        let num_lines = self.lines.len() as u32;
        self.lines
            .get_mut(offset as usize)
            .ok_or(SimError::InvalidLine { offset, num_lines })
    }

    fn check_free(&mut self, offset: Offset) -> Result<()> {
        match &self.line(offset)?.holder {
            Some(holder) => Err(SimError::LineBusy {
                offset,
                holder: holder.clone(),
            }),
            None => Ok(()),
        }
    }

    fn release(&mut self, offset: Offset) {
        if let Some(line) = self.lines.get_mut(offset as usize) {
            line.holder = None;
            line.output = false;
        }
    }
}

fn lock(state: &Mutex<ChipState>) -> MutexGuard<'_, ChipState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn reports(detection: EdgeDetection, kind: EdgeKind) -> bool {
    matches!(
        (detection, kind),
        (EdgeDetection::Both, _)
            | (EdgeDetection::Rising, EdgeKind::Rising)
            | (EdgeDetection::Falling, EdgeKind::Falling)
    )
}

/// In-memory GPIO chip
///
/// Cloning gives another handle on the same chip.
#[derive(Clone)]
pub struct SimChip {
    state: Arc<Mutex<ChipState>>,
    trace: Trace,
}

impl SimChip {
    /// Chip with `num_lines` lines, all low and unclaimed
    pub fn new(num_lines: u32) -> Self {
        Self::with_trace(num_lines, Trace::new())
    }

    /// Chip that records output writes into `trace`
    pub fn with_trace(num_lines: u32, trace: Trace) -> Self {
        let lines = (0..num_lines).map(|_| LineState::default()).collect();
        Self {
            state: Arc::new(Mutex::new(ChipState {
                lines,
                watchers: Vec::new(),
                next_watcher: 0,
                clock_ns: 0,
            })),
            trace,
        }
    }

    /// The trace output writes go to
    pub fn trace(&self) -> Trace {
        self.trace.clone()
    }

    /// Number of lines on the chip
    pub fn num_lines(&self) -> u32 {
        lock(&self.state).lines.len() as u32
    }

    /// Current level of `offset`
    pub fn level(&self, offset: Offset) -> Result<Level> {
        Ok(lock(&self.state).line(offset)?.level)
    }

    /// Consumer label of whoever holds `offset`
    pub fn holder(&self, offset: Offset) -> Option<String> {
        lock(&self.state)
            .lines
            .get(offset as usize)
            .and_then(|line| line.holder.clone())
    }

    /// Offsets currently claimed, ascending
    pub fn claimed(&self) -> Vec<Offset> {
        lock(&self.state)
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.holder.is_some())
            .map(|(offset, _)| offset as Offset)
            .collect()
    }

    /// Drive `offset` from outside the chip
    ///
    /// A level change queues an edge event for every watcher of the line
    /// whose detection covers it.
    pub fn set_input(&self, offset: Offset, level: Level) -> Result<()> {
        let mut state = lock(&self.state);
        let line = state.line(offset)?;
        if line.level == level {
            return Ok(());
        }
        line.level = level;

        let kind = if level.is_high() {
            EdgeKind::Rising
        } else {
            EdgeKind::Falling
        };
        state.clock_ns += 1_000;
        let event = EdgeEvent {
            offset,
            kind,
            timestamp_ns: state.clock_ns,
        };
        for watcher in &state.watchers {
            if watcher.offsets.contains(&offset) && reports(watcher.detection, kind) {
                // A receiver mid-teardown is not an error
                let _ = watcher.tx.send(event);
            }
        }
        log::trace!("sim_gpio: Line {} -> {:?}", offset, level);
        Ok(())
    }

    /// Raise then lower `offset`
    pub fn pulse(&self, offset: Offset) -> Result<()> {
        self.set_input(offset, Level::High)?;
        self.set_input(offset, Level::Low)
    }

    fn claim(&self, offset: Offset, label: &str, initial: Option<Level>) -> Result<SimLine> {
        let mut state = lock(&self.state);
        state.check_free(offset)?;
        let line = state.line(offset)?;
        line.holder = Some(label.to_string());
        line.output = initial.is_some();
        if let Some(level) = initial {
            line.level = level;
            self.trace.push(TraceEvent::Drive { offset, level });
        }

        Ok(SimLine {
            state: Arc::clone(&self.state),
            trace: self.trace.clone(),
            offset,
        })
    }
}

impl GpioBackend for SimChip {
    type Input = SimLine;
    type Output = SimLine;
    type Edges = SimEdges;

    fn request_input(&self, offset: Offset, label: &str) -> sx126x_core::Result<SimLine> {
        Ok(self.claim(offset, label, None)?)
    }

    fn request_output(
        &self,
        offset: Offset,
        initial: Level,
        label: &str,
    ) -> sx126x_core::Result<SimLine> {
        Ok(self.claim(offset, label, Some(initial))?)
    }

    fn request_edges(
        &self,
        lines: &[(Offset, &str)],
        detection: EdgeDetection,
    ) -> sx126x_core::Result<SimEdges> {
        if lines.is_empty() {
            return Err(SimError::NoLines.into());
        }

        let mut state = lock(&self.state);
        for &(offset, _) in lines {
            state.check_free(offset)?;
        }
        for &(offset, label) in lines {
            state.line(offset)?.holder = Some(label.to_string());
        }

        let (tx, rx) = mpsc::channel();
        let id = state.next_watcher;
        state.next_watcher += 1;
        let offsets: Vec<Offset> = lines.iter().map(|&(offset, _)| offset).collect();
        state.watchers.push(Watcher {
            id,
            offsets: offsets.clone(),
            detection,
            tx,
        });

        Ok(SimEdges {
            state: Arc::clone(&self.state),
            id,
            offsets,
            rx,
        })
    }
}

/// A claimed simulated line
pub struct SimLine {
    state: Arc<Mutex<ChipState>>,
    trace: Trace,
    offset: Offset,
}

impl SimLine {
    /// Line offset on its chip
    pub fn offset(&self) -> Offset {
        self.offset
    }
}

impl InputLine for SimLine {
    fn read(&self) -> sx126x_core::Result<Level> {
        Ok(lock(&self.state).line(self.offset)?.level)
    }
}

impl OutputLine for SimLine {
    fn write(&self, level: Level) -> sx126x_core::Result<()> {
        let mut state = lock(&self.state);
        let line = state.line(self.offset)?;
        if !line.output {
            return Err(SimError::NotOutput(self.offset).into());
        }
        line.level = level;
        self.trace.push(TraceEvent::Drive {
            offset: self.offset,
            level,
        });
        Ok(())
    }
}

impl Drop for SimLine {
    fn drop(&mut self) {
        lock(&self.state).release(self.offset);
    }
}

/// Edge queue over a set of claimed simulated lines
pub struct SimEdges {
    state: Arc<Mutex<ChipState>>,
    id: u64,
    offsets: Vec<Offset>,
    rx: Receiver<EdgeEvent>,
}

impl EdgeSource for SimEdges {
    fn wait_edge(&mut self, timeout: Duration) -> sx126x_core::Result<Option<EdgeEvent>> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SimError::Closed.into()),
        }
    }
}

impl Drop for SimEdges {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.watchers.retain(|w| w.id != self.id);
        for &offset in &self.offsets {
            state.release(offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_are_exclusive() {
        let chip = SimChip::new(8);
        let line = chip.request_input(3, "first").unwrap();
        assert!(matches!(
            chip.request_output(3, Level::Low, "second"),
            Err(sx126x_core::Error::Gpio(_))
        ));
        assert_eq!(chip.holder(3).as_deref(), Some("first"));

        drop(line);
        assert!(chip.claimed().is_empty());
        assert!(chip.request_output(3, Level::Low, "second").is_ok());
    }

    #[test]
    fn test_out_of_range() {
        let chip = SimChip::new(8);
        assert!(chip.request_input(8, "x").is_err());
        assert!(chip.set_input(8, Level::High).is_err());
    }

    #[test]
    fn test_output_levels() {
        let chip = SimChip::new(8);
        let out = chip.request_output(2, Level::High, "out").unwrap();
        assert_eq!(chip.level(2).unwrap(), Level::High);
        out.write(Level::Low).unwrap();
        assert_eq!(chip.level(2).unwrap(), Level::Low);
        assert_eq!(chip.trace().drives(2), vec![Level::High, Level::Low]);

        let input = chip.request_input(4, "in").unwrap();
        assert!(input.write(Level::High).is_err());
    }

    #[test]
    fn test_edges_follow_detection() {
        let chip = SimChip::new(8);
        let mut edges = chip
            .request_edges(&[(1, "a"), (5, "b")], EdgeDetection::Rising)
            .unwrap();

        chip.pulse(5).unwrap();
        chip.pulse(1).unwrap();
        chip.set_input(6, Level::High).unwrap();

        let timeout = Duration::from_millis(10);
        let first = edges.wait_edge(timeout).unwrap().unwrap();
        let second = edges.wait_edge(timeout).unwrap().unwrap();
        assert_eq!((first.offset, first.kind), (5, EdgeKind::Rising));
        assert_eq!((second.offset, second.kind), (1, EdgeKind::Rising));
        assert!(first.timestamp_ns < second.timestamp_ns);
        assert_eq!(edges.wait_edge(timeout).unwrap(), None);
    }

    #[test]
    fn test_edges_release_on_drop() {
        let chip = SimChip::new(8);
        let edges = chip
            .request_edges(&[(1, "a"), (5, "b")], EdgeDetection::Both)
            .unwrap();
        assert_eq!(chip.claimed(), vec![1, 5]);
        assert!(chip
            .request_edges(&[(5, "c")], EdgeDetection::Both)
            .is_err());

        drop(edges);
        assert!(chip.claimed().is_empty());
        chip.pulse(1).unwrap();
    }

    #[test]
    fn test_edge_request_is_all_or_nothing() {
        let chip = SimChip::new(8);
        let _held = chip.request_input(5, "held").unwrap();
        assert!(chip
            .request_edges(&[(1, "a"), (5, "b")], EdgeDetection::Rising)
            .is_err());
        assert_eq!(chip.claimed(), vec![5]);
    }
}
