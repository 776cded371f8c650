//! A single FIT message ready to be written: its definition record and its
//! data record.
//!
//! Values are mapped through their field type when the message is built, so
//! producing the records cannot fail afterwards.

use crate::error::{FitCourseError, Result};
use crate::fit::profile::MessageKind;
use crate::fit::types::{describe, Value};

/// Bag of named field values for one message.
///
/// Absent values are simply not set; `set_opt` makes that convenient for
/// optional point attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MesgValues {
    values: Vec<(String, Value)>,
}

impl MesgValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any earlier value for the same name.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
        self
    }

    /// Set a field only if `value` is present.
    pub fn set_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(name, v),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shape of one field in a definition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape {
    pub number: u8,
    pub size: u8,
    pub base_type: u8,
}

/// Shape of a message: two messages with equal definitions can share one
/// definition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MesgDefinition {
    pub local_num: u8,
    pub mesg_num: u16,
    pub fields: Vec<FieldShape>,
}

#[derive(Debug, Clone)]
struct EncodedField {
    shape: FieldShape,
    bytes: Vec<u8>,
}

/// A message instance bound to a local message number.
#[derive(Debug, Clone)]
pub struct Mesg {
    kind: MessageKind,
    local_num: u8,
    fields: Vec<EncodedField>,
}

impl Mesg {
    /// Build a message, validating field names and mapping every value.
    ///
    /// Fails with `UnknownMessage` for an unknown kind and with `UnknownField`
    /// naming every key that is not a field of the message.
    pub fn new(local_num: u8, mesg_name: &str, values: &MesgValues) -> Result<Self> {
        let kind = MessageKind::from_name(mesg_name)?;
        Self::for_kind(local_num, kind, values)
    }

    pub fn for_kind(local_num: u8, kind: MessageKind, values: &MesgValues) -> Result<Self> {
        let unknown: Vec<String> = values
            .values
            .iter()
            .filter(|(name, _)| kind.field_by_name(name).is_none())
            .map(|(name, _)| name.clone())
            .collect();
        if !unknown.is_empty() {
            return Err(FitCourseError::UnknownField {
                message: kind.name(),
                fields: unknown,
            });
        }

        let mut fields = Vec::new();
        for defn in kind.fields() {
            let Some(value) = values.get(defn.name) else {
                continue;
            };
            let descriptor = describe(defn.fit_type);
            fields.push(EncodedField {
                shape: FieldShape {
                    number: defn.number,
                    size: descriptor.encoded_size(value)?,
                    base_type: descriptor.base_type.tag(),
                },
                bytes: descriptor.encode(value)?,
            });
        }

        Ok(Self {
            kind,
            local_num,
            fields,
        })
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn local_num(&self) -> u8 {
        self.local_num
    }

    pub fn definition(&self) -> MesgDefinition {
        MesgDefinition {
            local_num: self.local_num,
            mesg_num: self.kind.mesg_num(),
            fields: self.fields.iter().map(|f| f.shape).collect(),
        }
    }

    /// Whether `previous` describes exactly this message's shape, so no new
    /// definition record is needed.
    pub fn same_definition_as(&self, previous: &MesgDefinition) -> bool {
        previous.mesg_num == self.kind.mesg_num()
            && previous.local_num == self.local_num
            && previous.fields.len() == self.fields.len()
            && previous
                .fields
                .iter()
                .zip(&self.fields)
                .all(|(prev, cur)| *prev == cur.shape)
    }

    /// Definition record, always declaring big-endian architecture.
    pub fn definition_record(&self) -> Vec<u8> {
        let mut record = Vec::with_capacity(6 + 3 * self.fields.len());
        record.push(0x40 | (self.local_num & 0x0F));
        record.push(0); // reserved
        record.push(1); // big endian
        record.extend_from_slice(&self.kind.mesg_num().to_be_bytes());
        record.push(self.fields.len() as u8);
        for field in &self.fields {
            record.push(field.shape.number);
            record.push(field.shape.size);
            record.push(field.shape.base_type);
        }
        record
    }

    /// Data record: the local number followed by every field's wire bytes.
    pub fn data_record(&self) -> Vec<u8> {
        let len = 1 + self.fields.iter().map(|f| f.bytes.len()).sum::<usize>();
        let mut record = Vec::with_capacity(len);
        record.push(self.local_num & 0x0F);
        for field in &self.fields {
            record.extend_from_slice(&field.bytes);
        }
        record
    }
}
