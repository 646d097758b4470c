//! Pin roles, logic levels and the pin configuration descriptor

use crate::error::{Error, Result};
use std::fmt;

/// GPIO line offset on a chip
pub type Offset = u32;

/// Raw sentinel for "line not present" in [`PinConfig::from_raw`]
pub const UNUSED: i16 = -1;

/// Logic level of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    /// Logic 0
    #[default]
    Low,
    /// Logic 1
    High,
}

impl Level {
    /// True for [`Level::High`]
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    /// True for [`Level::Low`]
    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        Level::from(value != 0)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

/// Pin role as named by the protocol core in digital read/write calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinFunction {
    /// NRESET output
    Reset,
    /// BUSY input
    Busy,
    /// Any role this HAL does not wire up
    Other(u8),
}

impl From<u8> for PinFunction {
    fn from(code: u8) -> Self {
        match code {
            0 => PinFunction::Reset,
            1 => PinFunction::Busy,
            other => PinFunction::Other(other),
        }
    }
}

/// Which GPIO line performs each electrical role
///
/// BUSY and NRESET are mandatory. Every other role is optional: a missing
/// NSS means the SPI controller's own chip select is used, missing TXEN/RXEN
/// means the board has no RF switch to sequence, and missing DIO lines are
/// simply not listened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinConfig {
    /// BUSY input
    pub busy: Option<Offset>,
    /// NRESET output
    pub nrst: Option<Offset>,
    /// NSS (chip select) output, driven around each transfer
    pub nss: Option<Offset>,
    /// DIO1 interrupt input
    pub dio1: Option<Offset>,
    /// DIO2 interrupt input
    pub dio2: Option<Offset>,
    /// DIO3 interrupt input
    pub dio3: Option<Offset>,
    /// TX enable output of the RF switch
    pub tx_en: Option<Offset>,
    /// RX enable output of the RF switch
    pub rx_en: Option<Offset>,
}

impl PinConfig {
    /// Create a configuration with the two mandatory lines
    pub fn new(busy: Offset, nrst: Offset) -> Self {
        Self {
            busy: Some(busy),
            nrst: Some(nrst),
            ..Default::default()
        }
    }

    /// Build from raw offsets in the order busy, nrst, nss, dio1, dio2, dio3,
    /// tx_en, rx_en, where `-1` marks a line that is not present
    pub fn from_raw(raw: [i16; 8]) -> Result<Self> {
        let names = Self::ROLE_NAMES;
        let mut slots = [None; 8];
        for (i, &value) in raw.iter().enumerate() {
            slots[i] = match value {
                UNUSED => None,
                v if v >= 0 => Some(v as Offset),
                v => {
                    return Err(Error::InvalidPin {
                        name: names[i],
                        value: v.to_string(),
                    })
                }
            };
        }

        let config = Self {
            busy: slots[0],
            nrst: slots[1],
            nss: slots[2],
            dio1: slots[3],
            dio2: slots[4],
            dio3: slots[5],
            tx_en: slots[6],
            rx_en: slots[7],
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the NSS line
    pub fn with_nss(mut self, offset: Offset) -> Self {
        self.nss = Some(offset);
        self
    }

    /// Set the DIO1 line
    pub fn with_dio1(mut self, offset: Offset) -> Self {
        self.dio1 = Some(offset);
        self
    }

    /// Set the DIO2 line
    pub fn with_dio2(mut self, offset: Offset) -> Self {
        self.dio2 = Some(offset);
        self
    }

    /// Set the DIO3 line
    pub fn with_dio3(mut self, offset: Offset) -> Self {
        self.dio3 = Some(offset);
        self
    }

    /// Set the TX enable line
    pub fn with_tx_en(mut self, offset: Offset) -> Self {
        self.tx_en = Some(offset);
        self
    }

    /// Set the RX enable line
    pub fn with_rx_en(mut self, offset: Offset) -> Self {
        self.rx_en = Some(offset);
        self
    }

    const ROLE_NAMES: [&'static str; 8] =
        ["busy", "nrst", "nss", "dio1", "dio2", "dio3", "tx_en", "rx_en"];

    fn roles(&self) -> [(&'static str, Option<Offset>); 8] {
        [
            ("busy", self.busy),
            ("nrst", self.nrst),
            ("nss", self.nss),
            ("dio1", self.dio1),
            ("dio2", self.dio2),
            ("dio3", self.dio3),
            ("tx_en", self.tx_en),
            ("rx_en", self.rx_en),
        ]
    }

    /// Check that the mandatory lines are present and no line is used twice
    pub fn validate(&self) -> Result<()> {
        if self.busy.is_none() {
            return Err(Error::MissingPin("busy"));
        }
        if self.nrst.is_none() {
            return Err(Error::MissingPin("nrst"));
        }

        let roles = self.roles();
        for (i, &(first, a)) in roles.iter().enumerate() {
            let Some(a) = a else { continue };
            for &(second, b) in &roles[i + 1..] {
                if b == Some(a) {
                    return Err(Error::DuplicatePin {
                        offset: a,
                        first,
                        second,
                    });
                }
            }
        }

        Ok(())
    }

    /// Configured DIO lines with their consumer labels, in DIO1..DIO3 order
    pub fn dio_lines(&self) -> Vec<(Offset, &'static str)> {
        [
            (self.dio1, "SX126x DIO1"),
            (self.dio2, "SX126x DIO2"),
            (self.dio3, "SX126x DIO3"),
        ]
        .into_iter()
        .filter_map(|(offset, label)| offset.map(|o| (o, label)))
        .collect()
    }

    /// Apply one `key=value` option; returns `Ok(false)` if the key is not a pin role
    pub fn apply_option(&mut self, key: &str, value: &str) -> Result<bool> {
        let slot = match key {
            "busy" => &mut self.busy,
            "nrst" | "reset" => &mut self.nrst,
            "nss" | "cs" => &mut self.nss,
            "dio1" => &mut self.dio1,
            "dio2" => &mut self.dio2,
            "dio3" => &mut self.dio3,
            "tx_en" | "txen" => &mut self.tx_en,
            "rx_en" | "rxen" => &mut self.rx_en,
            _ => return Ok(false),
        };
        *slot = parse_offset(key, value)?;
        Ok(true)
    }

    /// Parse pin roles from `key=value` pairs
    ///
    /// Unknown keys are logged and skipped so the same option list can carry
    /// bus settings as well.
    pub fn parse_options(options: &[(&str, &str)]) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in options {
            if !config.apply_option(key, value)? {
                log::debug!("sx126x: Ignoring non-pin option {}={}", key, value);
            }
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_offset(key: &str, value: &str) -> Result<Option<Offset>> {
    let raw: i64 = value
        .parse()
        .map_err(|_| Error::InvalidParameter(format!("Invalid {} value: {}", key, value)))?;
    match raw {
        -1 => Ok(None),
        v if (0..=Offset::MAX as i64).contains(&v) => Ok(Some(v as Offset)),
        _ => Err(Error::InvalidParameter(format!(
            "Invalid {} value: {}",
            key, value
        ))),
    }
}

impl fmt::Display for PinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, offset) in self.roles() {
            if let Some(offset) = offset {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", name, offset)?;
                first = false;
            }
        }
        Ok(())
    }
}
