//! FIT file writer.
//!
//! [`FitEncoder`] assigns local message numbers per message kind, emits a
//! definition record only when a message's shape differs from the last one
//! written to its slot, and assembles header, records and trailer CRC.
//! [`encode_course`] builds the complete message sequence of a course file
//! from a [`Route`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FitCourseError, Result};
use crate::fit::crc::crc16;
use crate::fit::mesg::{Mesg, MesgDefinition, MesgValues};
use crate::fit::profile::MessageKind;
use crate::fit::{HEADER_LEN, MAGIC, PROFILE_VERSION, PROTOCOL_VERSION};
use crate::route::{now_millis, Route};

/// MIME type of an encoded FIT file.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Highest local message number a record header can address.
const MAX_LOCAL_NUM: usize = 15;

/// One-shot FIT file builder.
///
/// # Example
/// ```
/// use fit_course::fit::{FitEncoder, MesgValues};
///
/// let mut encoder = FitEncoder::new();
/// encoder.write_file_id(MesgValues::new().set("type", "course")).unwrap();
/// encoder.write_course(MesgValues::new().set("name", "Morning loop")).unwrap();
/// let file = encoder.finish();
/// assert_eq!(&file.bytes()[8..12], b".FIT");
/// ```
#[derive(Debug, Default)]
pub struct FitEncoder {
    local_nums: HashMap<MessageKind, u8>,
    definitions: HashMap<u8, MesgDefinition>,
    records: Vec<Vec<u8>>,
}

impl FitEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_file_id(&mut self, values: MesgValues) -> Result<()> {
        self.write_mesg(MessageKind::FileId, &values)
    }

    pub fn write_course(&mut self, values: MesgValues) -> Result<()> {
        self.write_mesg(MessageKind::Course, &values)
    }

    pub fn write_lap(&mut self, values: MesgValues) -> Result<()> {
        self.write_mesg(MessageKind::Lap, &values)
    }

    pub fn write_record(&mut self, values: MesgValues) -> Result<()> {
        self.write_mesg(MessageKind::Record, &values)
    }

    pub fn write_event(&mut self, values: MesgValues) -> Result<()> {
        self.write_mesg(MessageKind::Event, &values)
    }

    pub fn write_course_point(&mut self, values: MesgValues) -> Result<()> {
        self.write_mesg(MessageKind::CoursePoint, &values)
    }

    /// Write a message, preceded by a definition record if its shape changed.
    pub fn write_mesg(&mut self, kind: MessageKind, values: &MesgValues) -> Result<()> {
        let local_num = self.local_num_for(kind)?;
        let mesg = Mesg::for_kind(local_num, kind, values)?;

        let unchanged = self
            .definitions
            .get(&local_num)
            .is_some_and(|defn| mesg.same_definition_as(defn));
        if !unchanged {
            self.records.push(mesg.definition_record());
            self.definitions.insert(local_num, mesg.definition());
        }
        self.records.push(mesg.data_record());
        Ok(())
    }

    fn local_num_for(&mut self, kind: MessageKind) -> Result<u8> {
        if let Some(&num) = self.local_nums.get(&kind) {
            return Ok(num);
        }
        let next = self.local_nums.len();
        if next > MAX_LOCAL_NUM {
            return Err(FitCourseError::TooManyMessageKinds { local_num: next });
        }
        self.local_nums.insert(kind, next as u8);
        Ok(next as u8)
    }

    /// Total length of all records written so far.
    pub fn data_len(&self) -> usize {
        self.records.iter().map(Vec::len).sum()
    }

    /// Number of records (definition and data) written so far.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn data_crc(&self) -> u16 {
        self.records.iter().fold(0, |crc, record| crc16(record, crc))
    }

    /// 14-byte file header including its own CRC.
    pub fn header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0] = HEADER_LEN as u8;
        header[1] = PROTOCOL_VERSION;
        header[2..4].copy_from_slice(&PROFILE_VERSION.to_le_bytes());
        header[4..8].copy_from_slice(&(self.data_len() as u32).to_le_bytes());
        header[8..12].copy_from_slice(&MAGIC.to_be_bytes());
        let crc = crc16(&header[..12], 0);
        header[12..14].copy_from_slice(&crc.to_le_bytes());
        header
    }

    /// 2-byte CRC over the complete record stream.
    pub fn trailer(&self) -> [u8; 2] {
        self.data_crc().to_le_bytes()
    }

    /// Assemble header, records and trailer.
    pub fn finish(self) -> FitFile {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data_len() + 2);
        bytes.extend_from_slice(&self.header());
        for record in &self.records {
            bytes.extend_from_slice(record);
        }
        bytes.extend_from_slice(&self.trailer());

        log::debug!(
            "[Fit] Encoded {} records, {} bytes",
            self.records.len(),
            bytes.len()
        );
        FitFile { bytes }
    }
}

/// A finished FIT file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitFile {
    bytes: Vec<u8>,
}

impl FitFile {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Options for [`encode_course`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseOptions {
    /// Write annotated points as course points.
    /// Default: true
    pub include_turns: bool,
    /// Course points are ordered this many meters ahead of their position so
    /// devices announce them before the turn.
    /// Default: 50.0
    pub turn_lead_distance: f64,
    /// FIT sport symbol.
    /// Default: "cycling"
    pub sport: String,
    /// Creation time (Unix ms); current time when unset.
    pub time_created: Option<i64>,
    /// Spread this duration (ms) over the points before writing, replacing
    /// their timestamps.
    pub duration_ms: Option<i64>,
}

impl Default for CourseOptions {
    fn default() -> Self {
        Self {
            include_turns: true,
            turn_lead_distance: 50.0,
            sport: "cycling".to_string(),
            time_created: None,
            duration_ms: None,
        }
    }
}

enum CourseEntry<'a> {
    Record(&'a crate::route::Point),
    Turn(&'a crate::route::Point),
}

/// Encode a route as a FIT course file.
///
/// Message sequence: file_id, course, lap summary, timer start event, records
/// interleaved with course points, timer stop event.
pub fn encode_course(route: &Route, options: &CourseOptions) -> Result<FitFile> {
    if let Some(duration) = options.duration_ms {
        let mut timed = route.clone();
        timed.set_duration(duration);
        return encode_course(
            &timed,
            &CourseOptions {
                duration_ms: None,
                ..options.clone()
            },
        );
    }

    let (Some(start), Some(finish)) = (route.points.first(), route.points.last()) else {
        return Err(FitCourseError::EmptyRoute {
            name: route.name.clone(),
        });
    };

    let mut encoder = FitEncoder::new();
    encoder.write_file_id(
        MesgValues::new()
            .set("type", "course")
            .set("time_created", options.time_created.unwrap_or_else(now_millis)),
    )?;
    encoder.write_course(
        MesgValues::new()
            .set("name", route.name.as_str())
            .set("sport", options.sport.as_str()),
    )?;

    let timer_time = match (start.time, finish.time) {
        (Some(s), Some(f)) => Some((f - s) as f64 / 1000.0),
        _ => None,
    };
    encoder.write_lap(
        MesgValues::new()
            .set_opt("timestamp", start.time)
            .set_opt("start_time", start.time)
            .set("start_position_lat", start.lat)
            .set("start_position_long", start.lon)
            .set("end_position_lat", finish.lat)
            .set("end_position_long", finish.lon)
            .set_opt("total_elapsed_time", timer_time)
            .set_opt("total_timer_time", timer_time)
            .set("total_distance", finish.distance)
            .set("total_ascent", route.ele_gain.round())
            .set("total_descent", route.ele_loss.round()),
    )?;
    encoder.write_event(
        MesgValues::new()
            .set_opt("timestamp", start.time)
            .set("event", "timer")
            .set("event_type", "start")
            .set("event_group", 0u8),
    )?;

    let mut entries: Vec<(f64, CourseEntry)> = Vec::with_capacity(route.points.len());
    for point in &route.points {
        entries.push((point.distance, CourseEntry::Record(point)));
        if options.include_turns && point.turn.is_some() {
            entries.push((
                point.distance - options.turn_lead_distance,
                CourseEntry::Turn(point),
            ));
        }
    }
    // stable: equal keys keep route order
    entries.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut turns = 0;
    for (_, entry) in &entries {
        match entry {
            CourseEntry::Record(p) => encoder.write_record(
                MesgValues::new()
                    .set_opt("timestamp", p.time)
                    .set("position_lat", p.lat)
                    .set("position_long", p.lon)
                    .set_opt("altitude", p.ele)
                    .set("distance", p.distance),
            )?,
            CourseEntry::Turn(p) => {
                turns += 1;
                encoder.write_course_point(
                    MesgValues::new()
                        .set_opt("timestamp", p.time)
                        .set("position_lat", p.lat)
                        .set("position_long", p.lon)
                        .set("distance", p.distance)
                        .set_opt("type", p.turn)
                        .set_opt("name", p.name.as_deref()),
                )?
            }
        }
    }

    encoder.write_event(
        MesgValues::new()
            .set_opt("timestamp", finish.time)
            .set("event", "timer")
            .set("event_type", "stop_disable_all")
            .set("event_group", 0u8),
    )?;

    log::info!(
        "[Fit] Course '{}': {} points, {} course points",
        route.name,
        route.points.len(),
        turns
    );
    Ok(encoder.finish())
}
