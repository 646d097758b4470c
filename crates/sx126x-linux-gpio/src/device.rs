//! Linux GPIO character device lines
//!
//! This module provides [`LinuxGpio`], a handle on one `/dev/gpiochipN`
//! that hands out [`GpioLine`]s and a [`DioEvents`] edge source.

use crate::error::{LinuxGpioError, Result};

use gpiocdev::chip::Chip;
use gpiocdev::line::{EdgeDetection as CdevEdgeDetection, EdgeKind as CdevEdgeKind, Value};
use gpiocdev::request::{Config, Request};

use sx126x_core::{
    EdgeDetection, EdgeEvent, EdgeKind, EdgeSource, GpioBackend, InputLine, Level, Offset,
    OutputLine,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

fn to_value(level: Level) -> Value {
    match level {
        Level::High => Value::Active,
        Level::Low => Value::Inactive,
    }
}

fn from_value(value: Value) -> Level {
    match value {
        Value::Active => Level::High,
        Value::Inactive => Level::Low,
    }
}

fn to_cdev_detection(detection: EdgeDetection) -> CdevEdgeDetection {
    match detection {
        EdgeDetection::Rising => CdevEdgeDetection::RisingEdge,
        EdgeDetection::Falling => CdevEdgeDetection::FallingEdge,
        EdgeDetection::Both => CdevEdgeDetection::BothEdges,
    }
}

/// Consumer label for one request covering several lines
///
/// The kernel keeps one label per request, so `SX126x DIO1` and `SX126x DIO3`
/// become `SX126x DIO1+DIO3`.
fn edge_consumer(lines: &[(Offset, &str)]) -> String {
    let mut consumer = String::new();
    for (i, &(_, label)) in lines.iter().enumerate() {
        if i == 0 {
            consumer.push_str(label);
        } else {
            consumer.push('+');
            consumer.push_str(label.rsplit_once(' ').map_or(label, |(_, name)| name));
        }
    }
    consumer
}

/// Path of GPIO chip number `n`
pub fn chip_path(n: u32) -> PathBuf {
    PathBuf::from(format!("/dev/gpiochip{}", n))
}

/// One GPIO chip
#[derive(Debug, Clone)]
pub struct LinuxGpio {
    path: PathBuf,
    num_lines: u32,
}

impl LinuxGpio {
    /// Open the chip at `path` and read its line count
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let info = Chip::from_path(path)
            .and_then(|chip| chip.info())
            .map_err(|e| LinuxGpioError::ChipOpenFailed {
                path: display.clone(),
                source: e,
            })?;

        log::debug!(
            "linux_gpio: Opened {} ({}, label '{}', {} lines)",
            display,
            info.name,
            info.label,
            info.num_lines
        );

        Ok(Self {
            path: path.to_path_buf(),
            num_lines: info.num_lines,
        })
    }

    /// Open `/dev/gpiochip{n}`
    pub fn from_number(n: u32) -> Result<Self> {
        Self::open(chip_path(n))
    }

    /// Chip device path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines on the chip
    pub fn num_lines(&self) -> u32 {
        self.num_lines
    }

    fn check_offset(&self, offset: Offset) -> Result<()> {
        if offset >= self.num_lines {
            return Err(LinuxGpioError::InvalidLineNumber {
                offset,
                chip: self.path.display().to_string(),
                num_lines: self.num_lines,
            });
        }
        Ok(())
    }

    fn request(&self, config: Config, offset: Offset, label: &str) -> Result<Request> {
        Request::from_config(config)
            .on_chip(&self.path)
            .with_consumer(label)
            .request()
            .map_err(|e| LinuxGpioError::LineRequestFailed {
                offset,
                label: label.to_string(),
                source: e,
            })
    }

    /// Claim `offset` as an input
    pub fn input(&self, offset: Offset, label: &str) -> Result<GpioLine> {
        self.check_offset(offset)?;

        let mut config = Config::default();
        config.with_line(offset).as_input();
        let request = self.request(config, offset, label)?;

        log::debug!("linux_gpio: Claimed line {} as input ({})", offset, label);
        Ok(GpioLine { request, offset })
    }

    /// Claim `offset` as an output driven to `initial`
    pub fn output(&self, offset: Offset, initial: Level, label: &str) -> Result<GpioLine> {
        self.check_offset(offset)?;

        let mut config = Config::default();
        config.with_line(offset).as_output(to_value(initial));
        let request = self.request(config, offset, label)?;

        log::debug!(
            "linux_gpio: Claimed line {} as output, initially {:?} ({})",
            offset,
            initial,
            label
        );
        Ok(GpioLine { request, offset })
    }

    /// Claim `lines` as inputs with edge detection in one request
    ///
    /// One request gives one kernel event queue, so edges from different
    /// lines arrive in timestamp order. Its consumer label joins the
    /// per-line labels.
    pub fn edges(&self, lines: &[(Offset, &str)], detection: EdgeDetection) -> Result<DioEvents> {
        let Some(&(first, _)) = lines.first() else {
            return Err(LinuxGpioError::InvalidParameter(
                "No interrupt lines given".into(),
            ));
        };
        for &(offset, _) in lines {
            self.check_offset(offset)?;
        }

        let offsets: Vec<Offset> = lines.iter().map(|&(offset, _)| offset).collect();
        let mut config = Config::default();
        config
            .with_lines(&offsets)
            .as_input()
            .with_edge_detection(to_cdev_detection(detection));
        let request = self.request(config, first, &edge_consumer(lines))?;

        for &(offset, label) in lines {
            log::debug!(
                "linux_gpio: Listening for {:?} edges on line {} ({})",
                detection,
                offset,
                label
            );
        }
        Ok(DioEvents { request })
    }
}

impl GpioBackend for LinuxGpio {
    type Input = GpioLine;
    type Output = GpioLine;
    type Edges = DioEvents;

    fn request_input(&self, offset: Offset, label: &str) -> sx126x_core::Result<GpioLine> {
        Ok(self.input(offset, label)?)
    }

    fn request_output(
        &self,
        offset: Offset,
        initial: Level,
        label: &str,
    ) -> sx126x_core::Result<GpioLine> {
        Ok(self.output(offset, initial, label)?)
    }

    fn request_edges(
        &self,
        lines: &[(Offset, &str)],
        detection: EdgeDetection,
    ) -> sx126x_core::Result<DioEvents> {
        Ok(self.edges(lines, detection)?)
    }
}

/// A single claimed line, released when dropped
pub struct GpioLine {
    request: Request,
    offset: Offset,
}

impl GpioLine {
    /// Line offset on its chip
    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// Sample the line
    pub fn get(&self) -> Result<Level> {
        self.request
            .value(self.offset)
            .map(from_value)
            .map_err(|e| LinuxGpioError::GetValueFailed {
                offset: self.offset,
                source: e,
            })
    }

    /// Drive the line (outputs only)
    pub fn set(&self, level: Level) -> Result<()> {
        self.request
            .set_value(self.offset, to_value(level))
            .map(|_| ())
            .map_err(|e| LinuxGpioError::SetValueFailed {
                offset: self.offset,
                source: e,
            })
    }
}

impl InputLine for GpioLine {
    fn read(&self) -> sx126x_core::Result<Level> {
        Ok(self.get()?)
    }
}

impl OutputLine for GpioLine {
    fn write(&self, level: Level) -> sx126x_core::Result<()> {
        Ok(self.set(level)?)
    }
}

/// Edge events from all DIO lines
pub struct DioEvents {
    request: Request,
}

impl EdgeSource for DioEvents {
    fn wait_edge(&mut self, timeout: Duration) -> sx126x_core::Result<Option<EdgeEvent>> {
        let ready = self
            .request
            .wait_edge_event(timeout)
            .map_err(LinuxGpioError::EdgeEventFailed)?;
        if !ready {
            return Ok(None);
        }

        let event = self
            .request
            .read_edge_event()
            .map_err(LinuxGpioError::EdgeEventFailed)?;
        let kind = match event.kind {
            CdevEdgeKind::Rising => EdgeKind::Rising,
            CdevEdgeKind::Falling => EdgeKind::Falling,
        };

        Ok(Some(EdgeEvent {
            offset: event.offset,
            kind,
            timestamp_ns: event.timestamp_ns,
        }))
    }
}

/// Resolve the GPIO chip from a list of key-value pairs
///
/// - `gpiodev=/dev/gpiochipN` - GPIO chip device path
/// - `gpiochip=N` - GPIO chip number (alternative to gpiodev)
///
/// Exactly one of the two must be given. Other keys are ignored.
pub fn parse_options(options: &[(&str, &str)]) -> Result<PathBuf> {
    let mut device: Option<PathBuf> = None;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "gpiodev" => device = Some(PathBuf::from(value)),
            "gpiochip" => {
                gpiochip = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("Invalid gpiochip value: {}", value))
                })?);
            }
            _ => {}
        }
    }

    match (device, gpiochip) {
        (Some(path), None) => Ok(path),
        (None, Some(n)) => Ok(chip_path(n)),
        (Some(_), Some(_)) => Err(LinuxGpioError::InvalidParameter(
            "Only one of 'gpiodev' or 'gpiochip' can be specified".into(),
        )),
        (None, None) => Err(LinuxGpioError::NoDevice),
    }
}
