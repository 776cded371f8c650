//! # FIT codec
//!
//! Bit-exact writer and reader for the subset of the Garmin FIT protocol
//! that course files use.
//!
//! - [`types`]: field types with their wire base type and value transform
//! - [`profile`]: message kinds and field numbers
//! - [`mesg`]: definition and data records of a single message
//! - [`crc`]: the FIT CRC-16
//! - [`encoder`]: [`FitEncoder`] and the complete course writer
//! - [`decoder`]: [`FitDecoder`] for course and activity files
//!
//! Files are always written big-endian with a 14-byte header. Both byte
//! orders and both header sizes are accepted on read.

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod mesg;
pub mod profile;
pub mod types;

pub use crc::{crc16, crc_byte};
pub use decoder::{FitDecoder, ACTIVITY_SIMPLIFY_TOLERANCE};
pub use encoder::{encode_course, CourseOptions, FitEncoder, FitFile, CONTENT_TYPE};
pub use mesg::{Mesg, MesgDefinition, MesgValues};
pub use profile::{FieldDefn, MessageKind};
pub use types::{describe, describe_by_name, BaseType, FitType, TypeDescriptor, Value};

/// Length of the header this crate writes.
pub const HEADER_LEN: usize = 14;

/// Protocol version 1.0.
pub const PROTOCOL_VERSION: u8 = 0x10;

/// Profile version 20.78.
pub const PROFILE_VERSION: u16 = 2078;

/// ".FIT" read as a big-endian u32.
pub const MAGIC: u32 = 0x2E46_4954;

/// Decode a FIT file into a route; `None` if it holds no positioned records.
pub fn read_route(bytes: &[u8]) -> crate::Result<Option<crate::Route>> {
    FitDecoder::new().read_route(bytes)
}
