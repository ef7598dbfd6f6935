//! Status decoding: per-tag field layouts folded into a [`StatusReport`].
//!
//! Each recognized tag has a fixed field layout (protocol version 2) and a
//! dedicated decode function that validates the field count before indexing,
//! so a truncated or version-mismatched sentence degrades to a logged skip
//! instead of a panic. Unknown tags are ignored: newer firmware may emit
//! telemetry categories this decoder does not yet understand.

use std::fmt;

use tracing::warn;

use specmech_core::{Error, Result};

use crate::sentence::{self, Sentence, LINE_BREAK, SENTINEL};

/// Position of a pneumatic door or the shutter.
///
/// Decoded from the single-letter codes the controller reports. The decode
/// is total: anything other than the two known letters means the mechanism
/// was caught mid-travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
    Transiting,
}

impl DoorState {
    /// Decode a door position code: `'c'` is closed, `'o'` is open,
    /// everything else is transiting.
    pub fn from_code(code: char) -> Self {
        match code {
            'c' => DoorState::Closed,
            'o' => DoorState::Open,
            _ => DoorState::Transiting,
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorState::Open => write!(f, "open"),
            DoorState::Closed => write!(f, "closed"),
            DoorState::Transiting => write!(f, "transiting"),
        }
    }
}

/// On/off state of a pump or valve.
///
/// Decoded from the single-digit codes the controller reports: `'0'` is
/// off, everything else is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Off,
    On,
}

impl SwitchState {
    /// Decode an on/off digit: `'0'` is off, everything else is on.
    pub fn from_code(code: char) -> Self {
        match code {
            '0' => SwitchState::Off,
            _ => SwitchState::On,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchState::Off => write!(f, "off"),
            SwitchState::On => write!(f, "on"),
        }
    }
}

/// Last reported positions of the three collimator motors.
///
/// Positions are reported in motor steps; they are kept as the strings the
/// controller sent, since the gateway forwards rather than interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotorPositions {
    pub motor_a: Option<String>,
    pub motor_b: Option<String>,
    pub motor_c: Option<String>,
}

/// Temperatures and humidities from the three environment sensor pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub temperature_0: String,
    pub humidity_0: String,
    pub temperature_1: String,
    pub humidity_1: String,
    pub temperature_2: String,
    pub humidity_2: String,
}

/// Shutter, Hartmann door, and air valve states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pneumatics {
    pub shutter: DoorState,
    pub hartmann_left: DoorState,
    pub hartmann_right: DoorState,
    pub air_pressure: SwitchState,
}

/// Ion pump states for the two cryostats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vacuum {
    pub ion_pump_blue: SwitchState,
    pub ion_pump_red: SwitchState,
}

/// Accelerometer reading, one value per axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orientation {
    pub x: String,
    pub y: String,
    pub z: String,
}

/// Controller clock, boot time, and firmware version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemInfo {
    pub clock_time: Option<String>,
    pub boot_time: Option<String>,
    pub version: Option<String>,
}

/// All status categories decoded from one reply.
///
/// Built by folding the reply's sentences in order; when a tag recurs
/// within one reply, the later occurrence supersedes the earlier one.
/// Recomputed per query, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub motor_positions: MotorPositions,
    pub environment: Option<Environment>,
    pub pneumatics: Option<Pneumatics>,
    pub vacuum: Option<Vacuum>,
    pub orientation: Option<Orientation>,
    pub system_info: SystemInfo,
}

impl StatusReport {
    /// Fold one sentence into the report.
    ///
    /// Dispatches on the tag to the matching decode function. A sentence
    /// with too few fields for its tag's layout is a parse error; an
    /// unrecognized tag is not.
    pub fn apply(&mut self, sentence: &Sentence) -> Result<()> {
        let fields = &sentence.fields;
        match sentence.tag.as_str() {
            "MRA" => self.motor_positions.motor_a = Some(field(fields, 1)?),
            "MRB" => self.motor_positions.motor_b = Some(field(fields, 1)?),
            "MRC" => self.motor_positions.motor_c = Some(field(fields, 1)?),
            "ENV" => {
                self.environment = Some(Environment {
                    temperature_0: field(fields, 1)?,
                    humidity_0: field(fields, 2)?,
                    temperature_1: field(fields, 3)?,
                    humidity_1: field(fields, 4)?,
                    temperature_2: field(fields, 5)?,
                    humidity_2: field(fields, 6)?,
                })
            }
            "PNU" => {
                self.pneumatics = Some(Pneumatics {
                    shutter: DoorState::from_code(code(fields, 1)?),
                    hartmann_left: DoorState::from_code(code(fields, 2)?),
                    hartmann_right: DoorState::from_code(code(fields, 3)?),
                    air_pressure: SwitchState::from_code(code(fields, 4)?),
                })
            }
            "ION" => {
                self.vacuum = Some(Vacuum {
                    ion_pump_blue: SwitchState::from_code(code(fields, 1)?),
                    ion_pump_red: SwitchState::from_code(code(fields, 2)?),
                })
            }
            "ACC" => {
                self.orientation = Some(Orientation {
                    x: field(fields, 1)?,
                    y: field(fields, 2)?,
                    z: field(fields, 3)?,
                })
            }
            "TIM" => {
                self.system_info.clock_time = Some(field(fields, 1)?);
                // Older firmware omits the boot time.
                self.system_info.boot_time = fields.get(2).cloned();
            }
            "VER" => self.system_info.version = Some(field(fields, 1)?),
            _ => {
                // Forward compatible: newer firmware may add categories.
            }
        }
        Ok(())
    }

    /// Build a report from a batch of sentences (last write wins per tag).
    pub fn from_sentences<'a, I>(sentences: I) -> Self
    where
        I: IntoIterator<Item = &'a Sentence>,
    {
        let mut report = StatusReport::default();
        for sentence in sentences {
            if let Err(e) = report.apply(sentence) {
                warn!(tag = %sentence.tag, error = %e, "skipping undecodable sentence");
            }
        }
        report
    }

    /// Decode a raw reply into a report.
    ///
    /// Splits the reply on the device line break, parses every segment that
    /// carries the sentence sentinel, and folds the results. Non-sentence
    /// segments (the trailing `>` prompt, blank lines) are skipped silently;
    /// malformed sentences are logged and skipped.
    pub fn parse_reply(raw: &str) -> Self {
        let mut report = StatusReport::default();
        for segment in raw.split(LINE_BREAK) {
            if !segment.starts_with(SENTINEL) {
                continue;
            }
            match sentence::parse(segment) {
                Ok(sentence) => {
                    if let Err(e) = report.apply(&sentence) {
                        warn!(segment, error = %e, "skipping undecodable sentence");
                    }
                }
                Err(e) => warn!(segment, error = %e, "skipping unparsable sentence"),
            }
        }
        report
    }
}

/// Fetch field `index`, or fail with the tag's layout named in the error.
fn field(fields: &[String], index: usize) -> Result<String> {
    fields.get(index).cloned().ok_or_else(|| {
        Error::Parse(format!(
            "{} sentence has {} fields, needs at least {}",
            fields[0],
            fields.len(),
            index + 1
        ))
    })
}

/// Fetch the first character of field `index`.
fn code(fields: &[String], index: usize) -> Result<char> {
    let value = field(fields, index)?;
    value.chars().next().ok_or_else(|| {
        Error::Parse(format!("{} sentence field {} is empty", fields[0], index))
    })
}
