//! Static FIT message profile: the message kinds this crate reads and
//! writes, with their global numbers and the fields of interest.
//!
//! Field numbers follow the Garmin FIT global profile. Only fields used by
//! courses are listed; other fields in decoded files are skipped by size.

use crate::error::{FitCourseError, Result};
use crate::fit::types::FitType;

/// One field of a message definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefn {
    pub name: &'static str,
    pub number: u8,
    pub fit_type: FitType,
}

const fn field(name: &'static str, number: u8, fit_type: FitType) -> FieldDefn {
    FieldDefn {
        name,
        number,
        fit_type,
    }
}

const FILE_ID_FIELDS: &[FieldDefn] = &[
    field("type", 0, FitType::EnumFile),
    field("manufacturer", 1, FitType::Uint16),
    field("product", 2, FitType::Uint16),
    field("time_created", 4, FitType::DateTime),
];

const COURSE_FIELDS: &[FieldDefn] = &[
    field("sport", 4, FitType::EnumSport),
    field("name", 5, FitType::String),
];

const LAP_FIELDS: &[FieldDefn] = &[
    field("timestamp", 253, FitType::DateTime),
    field("start_time", 2, FitType::DateTime),
    field("start_position_lat", 3, FitType::Semicircles),
    field("start_position_long", 4, FitType::Semicircles),
    field("end_position_lat", 5, FitType::Semicircles),
    field("end_position_long", 6, FitType::Semicircles),
    field("total_elapsed_time", 7, FitType::Seconds),
    field("total_timer_time", 8, FitType::Seconds),
    field("total_distance", 9, FitType::Distance),
    field("total_ascent", 21, FitType::Uint16),
    field("total_descent", 22, FitType::Uint16),
];

const RECORD_FIELDS: &[FieldDefn] = &[
    field("timestamp", 253, FitType::DateTime),
    field("position_lat", 0, FitType::Semicircles),
    field("position_long", 1, FitType::Semicircles),
    field("altitude", 2, FitType::Altitude),
    field("distance", 5, FitType::Distance),
];

const EVENT_FIELDS: &[FieldDefn] = &[
    field("timestamp", 253, FitType::DateTime),
    field("event", 0, FitType::EnumEvent),
    field("event_type", 1, FitType::EnumEventType),
    field("event_group", 4, FitType::Uint8),
];

const COURSE_POINT_FIELDS: &[FieldDefn] = &[
    field("timestamp", 1, FitType::DateTime),
    field("position_lat", 2, FitType::Semicircles),
    field("position_long", 3, FitType::Semicircles),
    field("distance", 4, FitType::Distance),
    field("type", 5, FitType::EnumCoursePoint),
    field("name", 6, FitType::String),
];

/// Message kinds supported on write (and of interest on read).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    FileId,
    Course,
    Lap,
    Record,
    Event,
    CoursePoint,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        MessageKind::FileId,
        MessageKind::Course,
        MessageKind::Lap,
        MessageKind::Record,
        MessageKind::Event,
        MessageKind::CoursePoint,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MessageKind::FileId => "file_id",
            MessageKind::Course => "course",
            MessageKind::Lap => "lap",
            MessageKind::Record => "record",
            MessageKind::Event => "event",
            MessageKind::CoursePoint => "course_point",
        }
    }

    /// Global message number.
    pub fn mesg_num(self) -> u16 {
        match self {
            MessageKind::FileId => 0,
            MessageKind::Lap => 19,
            MessageKind::Record => 20,
            MessageKind::Event => 21,
            MessageKind::Course => 31,
            MessageKind::CoursePoint => 32,
        }
    }

    /// Field definitions in the order they are written.
    pub fn fields(self) -> &'static [FieldDefn] {
        match self {
            MessageKind::FileId => FILE_ID_FIELDS,
            MessageKind::Course => COURSE_FIELDS,
            MessageKind::Lap => LAP_FIELDS,
            MessageKind::Record => RECORD_FIELDS,
            MessageKind::Event => EVENT_FIELDS,
            MessageKind::CoursePoint => COURSE_POINT_FIELDS,
        }
    }

    pub fn field_by_name(self, name: &str) -> Option<&'static FieldDefn> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn field_by_number(self, number: u8) -> Option<&'static FieldDefn> {
        self.fields().iter().find(|f| f.number == number)
    }

    pub fn from_mesg_num(mesg_num: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.mesg_num() == mesg_num)
    }

    /// Look up a message kind by name, failing with `UnknownMessage`.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == name)
            .ok_or_else(|| FitCourseError::UnknownMessage {
                name: name.to_string(),
            })
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
