//! FIT file reader for routes.
//!
//! Only the messages a course needs are interpreted: `file_id`, `course`,
//! `lap`, `record` and `course_point`. Everything else is skipped by the
//! size its definition declares. Header and trailer CRCs are not checked.

use std::collections::HashMap;

use geo::{Coord, LineString, SimplifyIdx};

use crate::error::{FitCourseError, OptionExt, Result};
use crate::fit::profile::MessageKind;
use crate::fit::types::{describe, Value};
use crate::fit::MAGIC;
use crate::route::{Point, Route, TurnKind};

/// Douglas-Peucker tolerance in degrees used to thin activity files.
pub const ACTIVITY_SIMPLIFY_TOLERANCE: f64 = 0.000_002;

/// Field definition as read from a definition record.
#[derive(Debug, Clone, Copy)]
struct WireField {
    number: u8,
    size: u8,
    base_type: u8,
}

#[derive(Debug, Clone)]
struct LocalDefinition {
    mesg_num: u16,
    little_endian: bool,
    fields: Vec<WireField>,
    size_fields: usize,
    size_dev_fields: usize,
}

/// Decoded fields of one data record, keyed by profile field name.
type FieldMap = HashMap<&'static str, Value>;

/// Bounds-checked reader over the file buffer.
struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self
            .bytes
            .get(self.offset..self.offset + len)
            .ok_or_truncated(self.offset, len, self.bytes.len())?;
        self.offset += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self, little_endian: bool) -> Result<u16> {
        let b = self.take(2)?;
        let pair = [b[0], b[1]];
        Ok(if little_endian {
            u16::from_le_bytes(pair)
        } else {
            u16::from_be_bytes(pair)
        })
    }

    fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }
}

/// Reader for FIT course and activity files.
///
/// # Example
/// ```
/// use fit_course::fit::{encode_course, CourseOptions, FitDecoder};
/// use fit_course::{Point, Route};
///
/// let route = Route::new("Ridge", vec![
///     Point::new(46.5, 7.9, 0.0).with_ele(1200.0),
///     Point::new(46.501, 7.9, 111.0).with_ele(1210.0),
/// ]);
/// let file = encode_course(&route, &CourseOptions::default()).unwrap();
/// let decoded = FitDecoder::new().read_route(file.bytes()).unwrap().unwrap();
/// assert_eq!(decoded.name, "Ridge");
/// assert_eq!(decoded.points.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct FitDecoder {
    definitions: HashMap<u8, LocalDefinition>,
    name: Option<String>,
    points: Vec<Point>,
    turns: Vec<FieldMap>,
    ele_gain: f64,
    ele_loss: f64,
    activity: bool,
}

impl FitDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a complete FIT file into a route.
    ///
    /// Returns `Ok(None)` for a well-formed file without any positioned
    /// record. All state from a previous call is discarded.
    pub fn read_route(&mut self, bytes: &[u8]) -> Result<Option<Route>> {
        *self = Self::default();

        if bytes.len() < 12 {
            return Err(FitCourseError::InvalidHeader {
                message: format!("file too small ({} bytes)", bytes.len()),
            });
        }

        let mut cursor = Cursor::new(bytes);
        let header_len = cursor.u8()?;
        if header_len != 12 && header_len != 14 {
            return Err(FitCourseError::InvalidHeader {
                message: format!("header size {}", header_len),
            });
        }
        let protocol = cursor.u8()?;
        let profile = cursor.u16(true)?;
        let data_len = cursor.u32_le()? as usize;
        let magic = cursor.u32_be()?;
        if magic != MAGIC {
            return Err(FitCourseError::BadMagic { found: magic });
        }
        if header_len == 14 {
            cursor.skip(2)?;
        }
        log::debug!("[Fit] Reading protocol 0x{:02x}, profile {}", protocol, profile);

        let end = cursor.offset + data_len;
        if end + 2 > bytes.len() {
            return Err(FitCourseError::TruncatedFile {
                offset: cursor.offset,
                needed: data_len + 2,
                available: bytes.len() - cursor.offset,
            });
        }
        self.read_records(&mut cursor, end)?;

        let after_trailer = cursor.offset + 2;
        if after_trailer > bytes.len() {
            return Err(FitCourseError::TruncatedFile {
                offset: cursor.offset,
                needed: 2,
                available: bytes.len() - cursor.offset,
            });
        }
        if after_trailer < bytes.len() {
            return Err(FitCourseError::ChainedFileUnsupported {
                remaining: bytes.len() - after_trailer,
            });
        }

        log::debug!(
            "[Fit] Parsed {} points and {} course points",
            self.points.len(),
            self.turns.len()
        );
        if self.points.is_empty() {
            return Ok(None);
        }

        if self.activity && self.turns.is_empty() {
            self.reduce_activity();
        }
        self.merge_turns_into_points();

        let name = match self.name.take().filter(|n| !n.is_empty()) {
            Some(name) => name,
            None if self.activity => "Track".to_string(),
            None => "Route".to_string(),
        };
        Ok(Some(Route {
            name,
            points: std::mem::take(&mut self.points),
            ele_gain: self.ele_gain,
            ele_loss: self.ele_loss,
        }))
    }

    fn read_records(&mut self, cursor: &mut Cursor, end: usize) -> Result<()> {
        while cursor.offset < end {
            let record_offset = cursor.offset;
            let header = cursor.u8()?;
            if header & 0x80 != 0 {
                return Err(FitCourseError::UnsupportedFeature {
                    feature: "compressed timestamp header".to_string(),
                });
            } else if header & 0x40 != 0 {
                self.read_definition(cursor, header, record_offset)?;
            } else if let Some((kind, fields)) = self.read_data(cursor, header, record_offset)? {
                self.process_mesg(kind, fields)?;
            }
        }
        if cursor.offset > end {
            return Err(FitCourseError::TruncatedFile {
                offset: end,
                needed: cursor.offset - end,
                available: 0,
            });
        }
        Ok(())
    }

    fn read_definition(&mut self, cursor: &mut Cursor, header: u8, offset: usize) -> Result<()> {
        let local_num = header & 0x0F;
        let has_dev_fields = header & 0x20 != 0;

        if cursor.u8()? != 0 {
            return Err(FitCourseError::InvalidDefinition { offset });
        }
        let little_endian = cursor.u8()? == 0;
        let mesg_num = cursor.u16(little_endian)?;

        let count = cursor.u8()?;
        let mut fields = Vec::with_capacity(count as usize);
        let mut size_fields = 0;
        for _ in 0..count {
            let triple = cursor.take(3)?;
            let field = WireField {
                number: triple[0],
                size: triple[1],
                base_type: triple[2],
            };
            size_fields += field.size as usize;
            fields.push(field);
        }

        let mut size_dev_fields = 0;
        if has_dev_fields {
            let dev_count = cursor.u8()?;
            for _ in 0..dev_count {
                let triple = cursor.take(3)?;
                size_dev_fields += triple[1] as usize;
            }
        }

        self.definitions.insert(
            local_num,
            LocalDefinition {
                mesg_num,
                little_endian,
                fields,
                size_fields,
                size_dev_fields,
            },
        );
        Ok(())
    }

    fn read_data(
        &self,
        cursor: &mut Cursor,
        header: u8,
        offset: usize,
    ) -> Result<Option<(MessageKind, FieldMap)>> {
        let local_num = header & 0x0F;
        let defn = self
            .definitions
            .get(&local_num)
            .ok_or(FitCourseError::UnknownLocalMessage { local_num, offset })?;

        let Some(kind) = MessageKind::from_mesg_num(defn.mesg_num) else {
            cursor.skip(defn.size_fields + defn.size_dev_fields)?;
            return Ok(None);
        };

        let mut values = FieldMap::new();
        for wire in &defn.fields {
            let bytes = cursor.take(wire.size as usize)?;
            let Some(field) = kind.field_by_number(wire.number) else {
                continue;
            };
            let descriptor = describe(field.fit_type);
            if !descriptor.matches_wire(wire.base_type, wire.size) {
                return Err(FitCourseError::FieldTypeMismatch {
                    message: kind.name(),
                    field: field.name,
                    expected_base_type: descriptor.base_type.tag(),
                    expected_size: descriptor.size(),
                    found_base_type: wire.base_type,
                    found_size: wire.size,
                });
            }
            if let Some(value) = descriptor.decode(bytes, defn.little_endian) {
                values.insert(field.name, value);
            }
        }
        cursor.skip(defn.size_dev_fields)?;
        Ok(Some((kind, values)))
    }

    fn process_mesg(&mut self, kind: MessageKind, mut fields: FieldMap) -> Result<()> {
        match kind {
            MessageKind::FileId => {
                let file_type = fields.remove("type");
                match file_type.as_ref().and_then(Value::as_str) {
                    Some("course") => self.activity = false,
                    Some("activity") => self.activity = true,
                    _ => {
                        return Err(FitCourseError::UnsupportedFileType {
                            found: file_type.map_or_else(|| "none".to_string(), |v| v.to_string()),
                        })
                    }
                }
            }
            MessageKind::Course => {
                self.name = fields
                    .remove("name")
                    .and_then(|v| v.as_str().map(str::to_string));
            }
            MessageKind::Lap => {
                self.ele_gain = fields.get("total_ascent").and_then(Value::as_f64).unwrap_or(0.0);
                self.ele_loss = fields.get("total_descent").and_then(Value::as_f64).unwrap_or(0.0);
            }
            MessageKind::Event => {}
            MessageKind::Record => {
                // indoor activities have records without a position
                let lat = fields.get("position_lat").and_then(Value::as_f64);
                let lon = fields.get("position_long").and_then(Value::as_f64);
                if let (Some(lat), Some(lon)) = (lat, lon) {
                    let distance = fields
                        .get("distance")
                        .and_then(Value::as_f64)
                        .or_else(|| self.points.last().map(|p| p.distance))
                        .unwrap_or(0.0);
                    self.points.push(Point {
                        lat,
                        lon,
                        ele: fields.get("altitude").and_then(Value::as_f64),
                        distance,
                        time: fields.get("timestamp").and_then(Value::as_i64),
                        turn: None,
                        name: None,
                    });
                }
            }
            MessageKind::CoursePoint => self.turns.push(fields),
        }
        Ok(())
    }

    /// Attach course points to the record at exactly the same position.
    ///
    /// Of several course points at one position the last one is kept; of
    /// several records at one position only the first receives it.
    fn merge_turns_into_points(&mut self) {
        if self.turns.is_empty() {
            return;
        }
        let mut by_position: HashMap<(u64, u64), FieldMap> = HashMap::new();
        for turn in self.turns.drain(..) {
            let lat = turn.get("position_lat").and_then(Value::as_f64);
            let lon = turn.get("position_long").and_then(Value::as_f64);
            if let (Some(lat), Some(lon)) = (lat, lon) {
                by_position.insert((lat.to_bits(), lon.to_bits()), turn);
            }
        }

        let mut merged = 0;
        for point in &mut self.points {
            let Some(mut turn) = by_position.remove(&(point.lat.to_bits(), point.lon.to_bits()))
            else {
                continue;
            };
            point.turn = Some(match turn.get("type") {
                Some(Value::Text(symbol)) => {
                    TurnKind::from_symbol(symbol).unwrap_or(TurnKind::Generic)
                }
                _ => TurnKind::Generic,
            });
            point.name = turn
                .remove("name")
                .and_then(|v| v.as_str().map(str::to_string));
            merged += 1;
        }
        log::debug!("[Fit] Merged {} course points", merged);
    }

    /// Thin out dense activity recordings with Douglas-Peucker.
    fn reduce_activity(&mut self) {
        let before = self.points.len();
        if before < 3 {
            return;
        }
        let line: LineString<f64> = self
            .points
            .iter()
            .map(|p| Coord { x: p.lat, y: p.lon })
            .collect();
        let mut keep = vec![false; before];
        for idx in line.simplify_idx(&ACTIVITY_SIMPLIFY_TOLERANCE) {
            keep[idx] = true;
        }

        let points = std::mem::take(&mut self.points);
        self.points = points
            .into_iter()
            .zip(keep)
            .filter_map(|(point, kept)| kept.then_some(point))
            .collect();
        log::debug!("[Fit] Reduced activity from {} to {} points", before, self.points.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::encoder::{encode_course, CourseOptions, FitEncoder};
    use crate::fit::mesg::MesgValues;

    fn course_bytes(points: Vec<Point>) -> Vec<u8> {
        let route = Route::new("Decoder test", points);
        let options = CourseOptions {
            time_created: Some(1_700_000_000_000),
            ..Default::default()
        };
        encode_course(&route, &options).unwrap().into_bytes()
    }

    fn sample_points() -> Vec<Point> {
        vec![
            Point::new(47.0, 11.0, 0.0).with_ele(500.0).with_time(1_700_000_000_000),
            Point::new(47.001, 11.001, 135.2).with_ele(512.4),
            Point::new(47.002, 11.002, 270.4)
                .with_ele(520.0)
                .with_turn(TurnKind::SharpRight, Some("Bridge")),
        ]
    }

    #[test]
    fn test_round_trip_course() {
        let bytes = course_bytes(sample_points());
        let route = FitDecoder::new().read_route(&bytes).unwrap().unwrap();

        assert_eq!(route.name, "Decoder test");
        assert_eq!(route.points.len(), 3);
        assert!((route.points[1].lat - 47.001).abs() < 1e-6);
        assert!((route.points[1].ele.unwrap() - 512.4).abs() <= 0.2);
        assert!((route.points[2].distance - 270.4).abs() < 0.01);
        assert_eq!(route.points[0].time, Some(1_700_000_000_000));
        assert_eq!(route.points[2].turn, Some(TurnKind::SharpRight));
        assert_eq!(route.points[2].name.as_deref(), Some("Bridge"));
        assert_eq!(route.points[1].turn, None);
        assert_eq!(route.ele_gain, 20.0);
    }

    #[test]
    fn test_too_small() {
        let err = FitDecoder::new().read_route(&[14, 0x10]).unwrap_err();
        assert!(matches!(err, FitCourseError::InvalidHeader { .. }));
    }

    #[test]
    fn test_invalid_header_length() {
        let mut bytes = course_bytes(sample_points());
        bytes[0] = 13;
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert!(matches!(err, FitCourseError::InvalidHeader { .. }));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = course_bytes(sample_points());
        bytes[9] = b'G';
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert!(matches!(err, FitCourseError::BadMagic { .. }));
    }

    #[test]
    fn test_corrupt_crc_is_tolerated() {
        let mut bytes = course_bytes(sample_points());
        bytes[12] ^= 0xFF;
        let len = bytes.len();
        bytes[len - 1] ^= 0xFF;
        assert!(FitDecoder::new().read_route(&bytes).unwrap().is_some());
    }

    #[test]
    fn test_truncated() {
        let bytes = course_bytes(sample_points());
        let err = FitDecoder::new().read_route(&bytes[..bytes.len() - 5]).unwrap_err();
        assert!(matches!(err, FitCourseError::TruncatedFile { .. }));
    }

    #[test]
    fn test_chained_file_rejected() {
        let mut bytes = course_bytes(sample_points());
        bytes.extend_from_slice(&[0, 0, 0]);
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert_eq!(err, FitCourseError::ChainedFileUnsupported { remaining: 3 });
    }

    /// Wrap a raw record stream in a 12-byte header and a zero trailer.
    fn wrap(records: &[u8]) -> Vec<u8> {
        let mut bytes = vec![12, 0x10, 0x1e, 0x08];
        bytes.extend_from_slice(&(records.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b".FIT");
        bytes.extend_from_slice(records);
        bytes.extend_from_slice(&[0, 0]);
        bytes
    }

    #[test]
    fn test_compressed_timestamp_unsupported() {
        let bytes = wrap(&[0x80]);
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert!(matches!(err, FitCourseError::UnsupportedFeature { .. }));
    }

    #[test]
    fn test_invalid_definition_reserved_byte() {
        let bytes = wrap(&[0x40, 1, 1, 0, 20, 0]);
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert_eq!(err, FitCourseError::InvalidDefinition { offset: 12 });
    }

    #[test]
    fn test_undefined_local_message() {
        let bytes = wrap(&[0x02, 0]);
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert_eq!(
            err,
            FitCourseError::UnknownLocalMessage {
                local_num: 2,
                offset: 12
            }
        );
    }

    #[test]
    fn test_field_type_mismatch() {
        // record.altitude declared as uint32
        let bytes = wrap(&[0x40, 0, 1, 0, 20, 1, 2, 4, 0x86, 0x00, 0, 0, 0, 1]);
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert!(matches!(
            err,
            FitCourseError::FieldTypeMismatch {
                message: "record",
                field: "altitude",
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_file_type() {
        // file_id.type = 5 (workout)
        let bytes = wrap(&[0x40, 0, 1, 0, 0, 1, 0, 1, 0x00, 0x00, 5]);
        let err = FitDecoder::new().read_route(&bytes).unwrap_err();
        assert!(matches!(err, FitCourseError::UnsupportedFileType { .. }));
    }

    #[test]
    fn test_little_endian_unknown_messages_and_dev_fields() {
        let mut records = vec![
            // local 0: file_id little endian, type activity
            0x40, 0, 0, 0, 0, 1, 0, 1, 0x00, //
            0x00, 4, //
            // local 1: unknown global message 18 (session), skipped by size
            0x41, 0, 0, 18, 0, 1, 7, 4, 0x86, //
            0x01, 1, 2, 3, 4,
            // local 2: record with lat/long, an unknown field 3 and one dev field
            0x62, 0, 0, 20, 0, 3, 0, 4, 0x85, 1, 4, 0x85, 3, 1, 0x02, 1, 0, 2, 0,
        ];
        let lat: i32 = 1 << 29; // 45 degrees
        let lon: i32 = -(1 << 28); // -22.5 degrees
        records.push(0x02);
        records.extend_from_slice(&lat.to_le_bytes());
        records.extend_from_slice(&lon.to_le_bytes());
        records.extend_from_slice(&[140, 0xAA, 0xBB]);

        let route = FitDecoder::new().read_route(&wrap(&records)).unwrap().unwrap();
        assert_eq!(route.name, "Track");
        assert_eq!(route.points.len(), 1);
        assert_eq!(route.points[0].lat, 45.0);
        assert_eq!(route.points[0].lon, -22.5);
        assert_eq!(route.points[0].ele, None);
    }

    #[test]
    fn test_no_points_is_none() {
        let mut encoder = FitEncoder::new();
        encoder.write_file_id(MesgValues::new().set("type", "course")).unwrap();
        encoder.write_course(MesgValues::new().set("name", "Nothing")).unwrap();
        let file = encoder.finish();
        assert_eq!(FitDecoder::new().read_route(file.bytes()).unwrap(), None);
    }

    #[test]
    fn test_records_without_position_dropped() {
        let mut encoder = FitEncoder::new();
        encoder.write_file_id(MesgValues::new().set("type", "course")).unwrap();
        encoder.write_record(MesgValues::new().set("altitude", 10.0)).unwrap();
        encoder
            .write_record(
                MesgValues::new()
                    .set("position_lat", 1.0)
                    .set("position_long", 2.0),
            )
            .unwrap();
        let file = encoder.finish();
        let route = FitDecoder::new().read_route(file.bytes()).unwrap().unwrap();
        assert_eq!(route.name, "Route");
        assert_eq!(route.points.len(), 1);
    }

    #[test]
    fn test_duplicate_coordinates_get_one_turn() {
        let mut points = sample_points();
        points.push(Point::new(47.002, 11.002, 270.4).with_ele(520.0));
        let bytes = course_bytes(points);
        let route = FitDecoder::new().read_route(&bytes).unwrap().unwrap();
        assert_eq!(route.points[2].turn, Some(TurnKind::SharpRight));
        assert_eq!(route.points[3].turn, None);
    }

    #[test]
    fn test_activity_is_simplified() {
        let mut encoder = FitEncoder::new();
        encoder.write_file_id(MesgValues::new().set("type", "activity")).unwrap();
        for i in 0..50 {
            encoder
                .write_record(
                    MesgValues::new()
                        .set("position_lat", 47.0 + i as f64 * 0.0001)
                        .set("position_long", 11.0)
                        .set("distance", i as f64 * 11.1),
                )
                .unwrap();
        }
        let file = encoder.finish();
        let route = FitDecoder::new().read_route(file.bytes()).unwrap().unwrap();
        assert_eq!(route.name, "Track");
        assert!(route.points.len() < 50);
        assert!(route.points.len() >= 2);
        assert_eq!(route.points[0].distance, 0.0);
    }

    #[test]
    fn test_decoder_is_reusable() {
        let bytes = course_bytes(sample_points());
        let mut decoder = FitDecoder::new();
        let first = decoder.read_route(&bytes).unwrap();
        let second = decoder.read_route(&bytes).unwrap();
        assert_eq!(first, second);
    }
}
