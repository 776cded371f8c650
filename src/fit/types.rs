//! FIT type registry.
//!
//! Every field in the message profile references one of the [`FitType`]s
//! below. A [`TypeDescriptor`] pairs the wire base type (size and tag byte)
//! with the transform between application values and wire integers:
//!
//! | type          | base type | application value      | wire value                |
//! |---------------|-----------|------------------------|---------------------------|
//! | `semicircles` | sint32    | degrees                | `deg / 180 * 2^31`        |
//! | `date_time`   | uint32    | Unix epoch ms          | seconds since 1989-12-31  |
//! | `distance`    | uint32    | meters                 | centimeters               |
//! | `altitude`    | uint16    | meters                 | `(m + 500) * 5`           |
//! | `seconds`     | uint32    | seconds                | milliseconds              |
//! | `string`      | string    | text                   | NUL terminated UTF-8      |
//! | `enum_*`      | enum      | symbol (`"left"`, ...) | small integer             |
//!
//! The registry is built once and shared by every encoder and decoder.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{FitCourseError, Result};
use crate::route::TurnKind;

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

const SEMICIRCLES_PER_180: f64 = 2_147_483_648.0;

/// Wire-level base types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Enum,
    Sint8,
    Uint8,
    Sint16,
    Uint16,
    Sint32,
    Uint32,
    String,
}

impl BaseType {
    /// Base type byte written in field definitions.
    pub fn tag(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::Sint8 => 0x01,
            BaseType::Uint8 => 0x02,
            BaseType::Sint16 => 0x83,
            BaseType::Uint16 => 0x84,
            BaseType::Sint32 => 0x85,
            BaseType::Uint32 => 0x86,
            BaseType::String => 0x07,
        }
    }

    /// Fixed size in bytes; 0 for variable length strings.
    pub fn size(self) -> u8 {
        match self {
            BaseType::Enum | BaseType::Sint8 | BaseType::Uint8 => 1,
            BaseType::Sint16 | BaseType::Uint16 => 2,
            BaseType::Sint32 | BaseType::Uint32 => 4,
            BaseType::String => 0,
        }
    }

    fn range(self) -> (i64, i64) {
        match self {
            BaseType::Enum | BaseType::Uint8 => (0, u8::MAX as i64),
            BaseType::Sint8 => (i8::MIN as i64, i8::MAX as i64),
            BaseType::Sint16 => (i16::MIN as i64, i16::MAX as i64),
            BaseType::Uint16 => (0, u16::MAX as i64),
            BaseType::Sint32 => (i32::MIN as i64, i32::MAX as i64),
            BaseType::Uint32 => (0, u32::MAX as i64),
            BaseType::String => (0, 0),
        }
    }

    /// Value marking a field as "invalid" (not present) in FIT data.
    fn invalid_value(self) -> Option<i64> {
        match self {
            BaseType::Enum | BaseType::Uint8 => Some(0xFF),
            BaseType::Sint8 => Some(0x7F),
            BaseType::Sint16 => Some(0x7FFF),
            BaseType::Uint16 => Some(0xFFFF),
            BaseType::Sint32 => Some(0x7FFF_FFFF),
            BaseType::Uint32 => Some(0xFFFF_FFFF),
            BaseType::String => None,
        }
    }

    /// Append `value` big-endian. Caller guarantees it is in range.
    fn write(self, value: i64, out: &mut Vec<u8>) {
        match self {
            BaseType::Enum | BaseType::Uint8 => out.push(value as u8),
            BaseType::Sint8 => out.push(value as i8 as u8),
            BaseType::Sint16 => {
                let mut buf = [0u8; 2];
                BigEndian::write_i16(&mut buf, value as i16);
                out.extend_from_slice(&buf);
            }
            BaseType::Uint16 => {
                let mut buf = [0u8; 2];
                BigEndian::write_u16(&mut buf, value as u16);
                out.extend_from_slice(&buf);
            }
            BaseType::Sint32 => {
                let mut buf = [0u8; 4];
                BigEndian::write_i32(&mut buf, value as i32);
                out.extend_from_slice(&buf);
            }
            BaseType::Uint32 => {
                let mut buf = [0u8; 4];
                BigEndian::write_u32(&mut buf, value as u32);
                out.extend_from_slice(&buf);
            }
            BaseType::String => {}
        }
    }

    /// Read an integer of this type. `bytes` must hold at least `size()` bytes.
    fn read(self, bytes: &[u8], little_endian: bool) -> i64 {
        match (self, little_endian) {
            (BaseType::Enum | BaseType::Uint8, _) => bytes[0] as i64,
            (BaseType::Sint8, _) => bytes[0] as i8 as i64,
            (BaseType::Sint16, true) => LittleEndian::read_i16(bytes) as i64,
            (BaseType::Sint16, false) => BigEndian::read_i16(bytes) as i64,
            (BaseType::Uint16, true) => LittleEndian::read_u16(bytes) as i64,
            (BaseType::Uint16, false) => BigEndian::read_u16(bytes) as i64,
            (BaseType::Sint32, true) => LittleEndian::read_i32(bytes) as i64,
            (BaseType::Sint32, false) => BigEndian::read_i32(bytes) as i64,
            (BaseType::Uint32, true) => LittleEndian::read_u32(bytes) as i64,
            (BaseType::Uint32, false) => BigEndian::read_u32(bytes) as i64,
            (BaseType::String, _) => 0,
        }
    }
}

/// Named field types referenced by the message profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitType {
    EnumFile,
    EnumSport,
    EnumEvent,
    EnumEventType,
    EnumCoursePoint,
    Sint8,
    Uint8,
    Sint16,
    Uint16,
    Sint32,
    Uint32,
    String,
    Seconds,
    Distance,
    Semicircles,
    Altitude,
    DateTime,
}

impl FitType {
    pub const ALL: [FitType; 17] = [
        FitType::EnumFile,
        FitType::EnumSport,
        FitType::EnumEvent,
        FitType::EnumEventType,
        FitType::EnumCoursePoint,
        FitType::Sint8,
        FitType::Uint8,
        FitType::Sint16,
        FitType::Uint16,
        FitType::Sint32,
        FitType::Uint32,
        FitType::String,
        FitType::Seconds,
        FitType::Distance,
        FitType::Semicircles,
        FitType::Altitude,
        FitType::DateTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FitType::EnumFile => "enum_file",
            FitType::EnumSport => "enum_sport",
            FitType::EnumEvent => "enum_event",
            FitType::EnumEventType => "enum_event_type",
            FitType::EnumCoursePoint => "enum_course_point",
            FitType::Sint8 => "sint8",
            FitType::Uint8 => "uint8",
            FitType::Sint16 => "sint16",
            FitType::Uint16 => "uint16",
            FitType::Sint32 => "sint32",
            FitType::Uint32 => "uint32",
            FitType::String => "string",
            FitType::Seconds => "seconds",
            FitType::Distance => "distance",
            FitType::Semicircles => "semicircles",
            FitType::Altitude => "altitude",
            FitType::DateTime => "date_time",
        }
    }
}

/// An application-level field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.is_finite() => Some(v.round() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "'{}'", s),
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

value_from_int!(u8, u16, u32, i32, i64, usize);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<TurnKind> for Value {
    fn from(v: TurnKind) -> Self {
        Value::Text(v.as_str().to_string())
    }
}

/// Closed symbol table of an application-level enum.
#[derive(Debug, Clone)]
pub struct EnumTable {
    entries: Vec<(&'static str, u8)>,
}

impl EnumTable {
    fn new(entries: &[(&'static str, u8)]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }

    pub fn value_of(&self, symbol: &str) -> Option<u8> {
        self.entries
            .iter()
            .find(|(name, _)| *name == symbol)
            .map(|&(_, v)| v)
    }

    pub fn symbol_of(&self, value: u8) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|&&(_, v)| v == value)
            .map(|&(name, _)| name)
    }
}

#[derive(Debug, Clone)]
enum Transform {
    Raw,
    /// `wire = round((value + offset) * scale)`
    Scaled { scale: f64, offset: f64 },
    Semicircles,
    DateTime,
    Text,
    Enum(EnumTable),
}

/// Size, wire tag and value mapping of one [`FitType`].
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub fit_type: FitType,
    pub base_type: BaseType,
    transform: Transform,
}

impl TypeDescriptor {
    pub fn name(&self) -> &'static str {
        self.fit_type.name()
    }

    /// Fixed wire size in bytes; 0 for strings (size depends on the value).
    pub fn size(&self) -> u8 {
        self.base_type.size()
    }

    pub fn is_string(&self) -> bool {
        self.base_type == BaseType::String
    }

    /// Whether a field definition read from a file matches this type.
    ///
    /// Strings match any size since their length is chosen per message.
    pub fn matches_wire(&self, base_type_tag: u8, size: u8) -> bool {
        self.base_type.tag() == base_type_tag && (self.is_string() || self.size() == size)
    }

    /// Map an application value to the wire integer.
    ///
    /// Fails for strings, unknown enum symbols and values outside the range of
    /// the base type.
    pub fn map_value(&self, value: &Value) -> Result<i64> {
        let out_of_range = || FitCourseError::ValueOutOfRange {
            type_name: self.name(),
            value: value.to_string(),
        };

        let raw = match (&self.transform, value) {
            (Transform::Enum(table), Value::Text(symbol)) => {
                table
                    .value_of(symbol)
                    .ok_or_else(|| FitCourseError::UnknownEnumSymbol {
                        type_name: self.name(),
                        symbol: symbol.clone(),
                    })? as i64
            }
            (Transform::Text, _) | (_, Value::Text(_)) => return Err(out_of_range()),
            (Transform::Raw | Transform::Enum(_), v) => v.as_i64().ok_or_else(out_of_range)?,
            (Transform::Scaled { scale, offset }, v) => {
                let v = v.as_f64().ok_or_else(out_of_range)?;
                round_checked((v + offset) * scale).ok_or_else(out_of_range)?
            }
            (Transform::Semicircles, v) => {
                let deg = v.as_f64().ok_or_else(out_of_range)?;
                round_checked(deg / 180.0 * SEMICIRCLES_PER_180).ok_or_else(out_of_range)?
            }
            (Transform::DateTime, v) => {
                let ms = v.as_f64().ok_or_else(out_of_range)?;
                round_checked(ms / 1000.0).ok_or_else(out_of_range)? - FIT_EPOCH_OFFSET
            }
        };

        let (min, max) = self.base_type.range();
        if raw < min || raw > max {
            return Err(out_of_range());
        }
        Ok(raw)
    }

    /// Map a wire integer back to the application value.
    ///
    /// Enum values without a symbol pass through as [`Value::Int`].
    pub fn unmap_value(&self, raw: i64) -> Value {
        match &self.transform {
            Transform::Raw | Transform::Text => Value::Int(raw),
            Transform::Scaled { scale, offset } => Value::Float(raw as f64 / scale - offset),
            Transform::Semicircles => Value::Float(raw as f64 / SEMICIRCLES_PER_180 * 180.0),
            Transform::DateTime => Value::Int((raw + FIT_EPOCH_OFFSET) * 1000),
            Transform::Enum(table) => match table.symbol_of(raw as u8) {
                Some(symbol) => Value::Text(symbol.to_string()),
                None => Value::Int(raw),
            },
        }
    }

    /// Wire size of `value` for this type (NUL-inclusive length for strings).
    pub fn encoded_size(&self, value: &Value) -> Result<u8> {
        if !self.is_string() {
            return Ok(self.size());
        }
        let text = value.as_str().ok_or_else(|| FitCourseError::ValueOutOfRange {
            type_name: self.name(),
            value: value.to_string(),
        })?;
        u8::try_from(encoded_strlen(text)).map_err(|_| FitCourseError::ValueOutOfRange {
            type_name: self.name(),
            value: value.to_string(),
        })
    }

    /// Encode `value` to its big-endian wire bytes.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        if self.is_string() {
            self.encoded_size(value)?;
            return Ok(value.as_str().map(encode_str).unwrap_or_default());
        }
        let raw = self.map_value(value)?;
        let mut out = Vec::with_capacity(self.size() as usize);
        self.base_type.write(raw, &mut out);
        Ok(out)
    }

    /// Decode wire bytes; `None` for the FIT "invalid" sentinel.
    ///
    /// `bytes` must be exactly the field's size from its definition.
    pub fn decode(&self, bytes: &[u8], little_endian: bool) -> Option<Value> {
        if self.is_string() {
            return Some(Value::Text(decode_str(bytes)));
        }
        if bytes.len() < self.size() as usize {
            return None;
        }
        let raw = self.base_type.read(bytes, little_endian);
        if self.base_type.invalid_value() == Some(raw) {
            return None;
        }
        Some(self.unmap_value(raw))
    }
}

/// Length in bytes of the encoded string, including the NUL terminator.
pub fn encoded_strlen(s: &str) -> usize {
    s.len() + 1
}

/// NUL terminated UTF-8 encoding.
pub fn encode_str(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(encoded_strlen(s));
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

/// Decode a string field, dropping trailing NUL padding.
pub fn decode_str(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn round_checked(v: f64) -> Option<i64> {
    if v.is_finite() && v.abs() < i64::MAX as f64 {
        Some(v.round() as i64)
    } else {
        None
    }
}

/// All type descriptors, indexed by `FitType as usize`.
struct TypeRegistry {
    types: Vec<TypeDescriptor>,
}

static REGISTRY: Lazy<TypeRegistry> = Lazy::new(|| {
    let course_points: Vec<(&'static str, u8)> = TurnKind::ALL
        .iter()
        .map(|k| (k.as_str(), k.wire_value()))
        .collect();

    let types = FitType::ALL
        .iter()
        .map(|&fit_type| {
            let (base_type, transform) = match fit_type {
                FitType::EnumFile => (
                    BaseType::Enum,
                    Transform::Enum(EnumTable::new(&[("activity", 4), ("course", 6)])),
                ),
                FitType::EnumSport => (
                    BaseType::Enum,
                    Transform::Enum(EnumTable::new(&[
                        ("generic", 0),
                        ("running", 1),
                        ("cycling", 2),
                        ("walking", 11),
                        ("hiking", 17),
                    ])),
                ),
                FitType::EnumEvent => (
                    BaseType::Enum,
                    Transform::Enum(EnumTable::new(&[("timer", 0)])),
                ),
                FitType::EnumEventType => (
                    BaseType::Enum,
                    Transform::Enum(EnumTable::new(&[
                        ("start", 0),
                        ("stop", 1),
                        ("marker", 3),
                        ("stop_all", 4),
                        ("stop_disable", 8),
                        ("stop_disable_all", 9),
                    ])),
                ),
                FitType::EnumCoursePoint => {
                    (BaseType::Enum, Transform::Enum(EnumTable::new(&course_points)))
                }
                FitType::Sint8 => (BaseType::Sint8, Transform::Raw),
                FitType::Uint8 => (BaseType::Uint8, Transform::Raw),
                FitType::Sint16 => (BaseType::Sint16, Transform::Raw),
                FitType::Uint16 => (BaseType::Uint16, Transform::Raw),
                FitType::Sint32 => (BaseType::Sint32, Transform::Raw),
                FitType::Uint32 => (BaseType::Uint32, Transform::Raw),
                FitType::String => (BaseType::String, Transform::Text),
                FitType::Seconds => (
                    BaseType::Uint32,
                    Transform::Scaled {
                        scale: 1000.0,
                        offset: 0.0,
                    },
                ),
                FitType::Distance => (
                    BaseType::Uint32,
                    Transform::Scaled {
                        scale: 100.0,
                        offset: 0.0,
                    },
                ),
                FitType::Altitude => (
                    BaseType::Uint16,
                    Transform::Scaled {
                        scale: 5.0,
                        offset: 500.0,
                    },
                ),
                FitType::Semicircles => (BaseType::Sint32, Transform::Semicircles),
                FitType::DateTime => (BaseType::Uint32, Transform::DateTime),
            };
            TypeDescriptor {
                fit_type,
                base_type,
                transform,
            }
        })
        .collect();

    TypeRegistry { types }
});

/// Descriptor for a field type.
pub fn describe(fit_type: FitType) -> &'static TypeDescriptor {
    &REGISTRY.types[fit_type as usize]
}

/// Descriptor lookup by type name (`"semicircles"`, `"enum_course_point"`, ...).
pub fn describe_by_name(name: &str) -> Option<&'static TypeDescriptor> {
    REGISTRY.types.iter().find(|t| t.name() == name)
}
