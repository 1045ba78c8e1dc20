//! Common types for the transport layer

use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;

/// Device identification information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Device path or identifier (backend-specific)
    pub device_path: String,
    /// Serial number if available
    pub serial: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
}

/// Physical key identifier as reported in input report 0x04.
///
/// Unknown codes are kept as-is so firmware additions still produce events.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Key(pub u16);

impl Key {
    /// No key (empty slot in a key report)
    pub const NONE: Key = Key(0x00);

    pub const SMART_INSRT: Key = Key(0x01);
    pub const APPND: Key = Key(0x02);
    pub const RIPL_OWR: Key = Key(0x03);
    pub const CLOSE_UP: Key = Key(0x04);
    pub const PLACE_ON_TOP: Key = Key(0x05);
    pub const SRC_OWR: Key = Key(0x06);

    pub const IN: Key = Key(0x07);
    pub const OUT: Key = Key(0x08);
    pub const TRIM_IN: Key = Key(0x09);
    pub const TRIM_OUT: Key = Key(0x0a);
    pub const ROLL: Key = Key(0x0b);
    pub const SLIP_SRC: Key = Key(0x0c);
    pub const SLIP_DEST: Key = Key(0x0d);
    pub const TRANS_DUR: Key = Key(0x0e);
    pub const CUT: Key = Key(0x0f);
    pub const DIS: Key = Key(0x10);
    pub const SMTH_CUT: Key = Key(0x11);

    pub const SOURCE: Key = Key(0x1a);
    pub const TIMELINE: Key = Key(0x1b);

    pub const SHTL: Key = Key(0x1c);
    pub const JOG: Key = Key(0x1d);
    pub const SCRL: Key = Key(0x1e);

    pub const SYNC_BIN: Key = Key(0x1f);
    pub const TRANS: Key = Key(0x22);
    pub const VIDEO_ONLY: Key = Key(0x25);
    pub const AUDIO_ONLY: Key = Key(0x26);
    pub const RIPL_DEL: Key = Key(0x2b);
    pub const AUDIO_LEVEL: Key = Key(0x2c);
    pub const FULL_VIEW: Key = Key(0x2d);
    pub const SNAP: Key = Key(0x2e);
    pub const SPLIT: Key = Key(0x2f);
    pub const LIVE_OWR: Key = Key(0x30);
    pub const ESC: Key = Key(0x31);

    pub const CAM1: Key = Key(0x33);
    pub const CAM2: Key = Key(0x34);
    pub const CAM3: Key = Key(0x35);
    pub const CAM4: Key = Key(0x36);
    pub const CAM5: Key = Key(0x37);
    pub const CAM6: Key = Key(0x38);
    pub const CAM7: Key = Key(0x39);
    pub const CAM8: Key = Key(0x3a);
    pub const CAM9: Key = Key(0x3b);
    pub const STOP_PLAY: Key = Key(0x3c);

    /// Raw 16-bit key code
    pub fn code(self) -> u16 {
        self.0
    }

    /// Get the keycap label for this code, if known
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Key::NONE => "NONE",
            Key::SMART_INSRT => "SMART_INSRT",
            Key::APPND => "APPND",
            Key::RIPL_OWR => "RIPL_OWR",
            Key::CLOSE_UP => "CLOSE_UP",
            Key::PLACE_ON_TOP => "PLACE_ON_TOP",
            Key::SRC_OWR => "SRC_OWR",
            Key::IN => "IN",
            Key::OUT => "OUT",
            Key::TRIM_IN => "TRIM_IN",
            Key::TRIM_OUT => "TRIM_OUT",
            Key::ROLL => "ROLL",
            Key::SLIP_SRC => "SLIP_SRC",
            Key::SLIP_DEST => "SLIP_DEST",
            Key::TRANS_DUR => "TRANS_DUR",
            Key::CUT => "CUT",
            Key::DIS => "DIS",
            Key::SMTH_CUT => "SMTH_CUT",
            Key::SOURCE => "SOURCE",
            Key::TIMELINE => "TIMELINE",
            Key::SHTL => "SHTL",
            Key::JOG => "JOG",
            Key::SCRL => "SCRL",
            Key::SYNC_BIN => "SYNC_BIN",
            Key::TRANS => "TRANS",
            Key::VIDEO_ONLY => "VIDEO_ONLY",
            Key::AUDIO_ONLY => "AUDIO_ONLY",
            Key::RIPL_DEL => "RIPL_DEL",
            Key::AUDIO_LEVEL => "AUDIO_LEVEL",
            Key::FULL_VIEW => "FULL_VIEW",
            Key::SNAP => "SNAP",
            Key::SPLIT => "SPLIT",
            Key::LIVE_OWR => "LIVE_OWR",
            Key::ESC => "ESC",
            Key::CAM1 => "CAM1",
            Key::CAM2 => "CAM2",
            Key::CAM3 => "CAM3",
            Key::CAM4 => "CAM4",
            Key::CAM5 => "CAM5",
            Key::CAM6 => "CAM6",
            Key::CAM7 => "CAM7",
            Key::CAM8 => "CAM8",
            Key::CAM9 => "CAM9",
            Key::STOP_PLAY => "STOP_PLAY",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

/// Set of currently held keys. Ordered so events derived from it are
/// emitted deterministically.
pub type KeySet = BTreeSet<Key>;

bitflags! {
    /// LEDs of the main keys, sent as a LE32 bitfield in output report 0x02
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Leds: u32 {
        const CLOSE_UP = 1 << 0;
        const CUT = 1 << 1;
        const DIS = 1 << 2;
        const SMTH_CUT = 1 << 3;
        const TRANS = 1 << 4;
        const SNAP = 1 << 5;
        const CAM7 = 1 << 6;
        const CAM8 = 1 << 7;
        const CAM9 = 1 << 8;
        const LIVE_OWR = 1 << 9;
        const CAM4 = 1 << 10;
        const CAM5 = 1 << 11;
        const CAM6 = 1 << 12;
        const VIDEO_ONLY = 1 << 13;
        const CAM1 = 1 << 14;
        const CAM2 = 1 << 15;
        const CAM3 = 1 << 16;
        const AUDIO_ONLY = 1 << 17;
    }
}

impl Leds {
    /// All nine camera LEDs (mutually exclusive by convention)
    pub const CAMERAS: Leds = Leds::CAM1
        .union(Leds::CAM2)
        .union(Leds::CAM3)
        .union(Leds::CAM4)
        .union(Leds::CAM5)
        .union(Leds::CAM6)
        .union(Leds::CAM7)
        .union(Leds::CAM8)
        .union(Leds::CAM9);

    /// The three transition LEDs (mutually exclusive by convention)
    pub const TRANSITIONS: Leds = Leds::CUT.union(Leds::DIS).union(Leds::SMTH_CUT);

    /// LED sitting under a given key, if that key has one
    pub fn for_key(key: Key) -> Option<Leds> {
        let led = match key {
            Key::CLOSE_UP => Leds::CLOSE_UP,
            Key::CUT => Leds::CUT,
            Key::DIS => Leds::DIS,
            Key::SMTH_CUT => Leds::SMTH_CUT,
            Key::TRANS => Leds::TRANS,
            Key::SNAP => Leds::SNAP,
            Key::CAM1 => Leds::CAM1,
            Key::CAM2 => Leds::CAM2,
            Key::CAM3 => Leds::CAM3,
            Key::CAM4 => Leds::CAM4,
            Key::CAM5 => Leds::CAM5,
            Key::CAM6 => Leds::CAM6,
            Key::CAM7 => Leds::CAM7,
            Key::CAM8 => Leds::CAM8,
            Key::CAM9 => Leds::CAM9,
            Key::LIVE_OWR => Leds::LIVE_OWR,
            Key::VIDEO_ONLY => Leds::VIDEO_ONLY,
            Key::AUDIO_ONLY => Leds::AUDIO_ONLY,
            _ => return None,
        };
        Some(led)
    }
}

bitflags! {
    /// LEDs of the jog group keys, sent as a single byte in output report 0x04
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JogLeds: u8 {
        const JOG = 1 << 0;
        const SHTL = 1 << 1;
        const SCRL = 1 << 2;
    }
}

/// Jog wheel mode, governing how the jog value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum JogMode {
    /// Relative delta since the previous report
    #[default]
    Relative0 = 0,
    /// Absolute position from where the mode was set, -4096..4096 is about half a turn
    AbsoluteContinuous = 1,
    /// Relative, behaves like mode 0
    Relative2 = 2,
    /// Absolute with a small dead band around zero
    AbsoluteDeadZero = 3,
}

impl JogMode {
    /// Get mode from its wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Relative0),
            1 => Some(Self::AbsoluteContinuous),
            2 => Some(Self::Relative2),
            3 => Some(Self::AbsoluteDeadZero),
            _ => None,
        }
    }

    /// Whether the reported value is a position rather than a delta
    pub fn is_absolute(self) -> bool {
        matches!(self, Self::AbsoluteContinuous | Self::AbsoluteDeadZero)
    }
}

/// Camera selection for the mutually exclusive camera LED group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Camera {
    Cam1 = 1,
    Cam2 = 2,
    Cam3 = 3,
    Cam4 = 4,
    Cam5 = 5,
    Cam6 = 6,
    Cam7 = 7,
    Cam8 = 8,
    Cam9 = 9,
}

impl Camera {
    /// LED lit when this camera is selected
    pub fn led(self) -> Leds {
        match self {
            Self::Cam1 => Leds::CAM1,
            Self::Cam2 => Leds::CAM2,
            Self::Cam3 => Leds::CAM3,
            Self::Cam4 => Leds::CAM4,
            Self::Cam5 => Leds::CAM5,
            Self::Cam6 => Leds::CAM6,
            Self::Cam7 => Leds::CAM7,
            Self::Cam8 => Leds::CAM8,
            Self::Cam9 => Leds::CAM9,
        }
    }

    /// Camera selected by a camera key
    pub fn for_key(key: Key) -> Option<Self> {
        match key.code() {
            code @ 0x33..=0x3b => Self::try_from((code - 0x32) as u8).ok(),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Camera {
    type Error = u8;

    /// Camera numbers are 1-based, matching the keycaps
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cam1),
            2 => Ok(Self::Cam2),
            3 => Ok(Self::Cam3),
            4 => Ok(Self::Cam4),
            5 => Ok(Self::Cam5),
            6 => Ok(Self::Cam6),
            7 => Ok(Self::Cam7),
            8 => Ok(Self::Cam8),
            9 => Ok(Self::Cam9),
            other => Err(other),
        }
    }
}

/// Transition selection for the mutually exclusive transition LED group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Transition {
    Cut = 1,
    Dissolve = 2,
    SmoothCut = 3,
}

impl Transition {
    /// LED lit when this transition is selected
    pub fn led(self) -> Leds {
        match self {
            Self::Cut => Leds::CUT,
            Self::Dissolve => Leds::DIS,
            Self::SmoothCut => Leds::SMTH_CUT,
        }
    }

    /// Transition selected by a transition key
    pub fn for_key(key: Key) -> Option<Self> {
        match key {
            Key::CUT => Some(Self::Cut),
            Key::DIS => Some(Self::Dissolve),
            Key::SMTH_CUT => Some(Self::SmoothCut),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Transition {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cut),
            2 => Ok(Self::Dissolve),
            3 => Ok(Self::SmoothCut),
            other => Err(other),
        }
    }
}

/// Jog wheel update (input report 0x03)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JogReport {
    /// Mode the firmware used to produce `value`
    pub mode: JogMode,
    /// Relative delta or absolute position, depending on `mode`
    pub value: i32,
}

/// Held-key snapshot (input report 0x04)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyReport {
    pub keys: KeySet,
}

/// Battery status (input report 0x07)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatteryReport {
    /// Device is connected to a power source and charging
    pub charging: bool,
    /// Battery level 0-100
    pub level: u8,
}

/// Decoded input report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReport {
    Jog(JogReport),
    Keys(KeyReport),
    Battery(BatteryReport),
}
