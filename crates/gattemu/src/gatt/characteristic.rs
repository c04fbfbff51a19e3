//! Characteristic model
//!
//! A characteristic holds its current value in encoded form. The value is
//! guarded by its own lock, so updates to one characteristic never wait on
//! another characteristic or on an in-flight notification fan-out.

use super::constants::ATT_MAX_VALUE_LEN;
use super::descriptor::{Descriptor, DescriptorKind};
use super::format::{self, EncodingError, ValueFormat};
use super::types::{CharacteristicProperties, Operation};
use crate::error::{GattError, GattResult};
use crate::uuid::Uuid;
use log::trace;
use std::sync::{PoisonError, RwLock};

/// A GATT characteristic with its descriptors
#[derive(Debug)]
pub struct Characteristic {
    uuid: Uuid,
    properties: CharacteristicProperties,
    format: ValueFormat,
    offset: usize,
    value: RwLock<Vec<u8>>,
    descriptors: Vec<Descriptor>,
}

impl Characteristic {
    /// Creates a characteristic whose numeric field of `format` lives at
    /// byte `offset`. The value starts zeroed and must fit an ATT value.
    pub fn new(
        uuid: Uuid,
        properties: CharacteristicProperties,
        format: ValueFormat,
        offset: usize,
    ) -> GattResult<Self> {
        let len = field_end(format, offset)?;
        if len > ATT_MAX_VALUE_LEN {
            return Err(EncodingError::InvalidLength {
                expected: ATT_MAX_VALUE_LEN,
                actual: len,
            }
            .into());
        }
        Ok(Self {
            uuid,
            properties,
            format,
            offset,
            value: RwLock::new(vec![0u8; len]),
            descriptors: Vec::new(),
        })
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn properties(&self) -> CharacteristicProperties {
        self.properties
    }

    pub fn format(&self) -> ValueFormat {
        self.format
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, kind: DescriptorKind) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.kind() == kind)
    }

    /// Appends a descriptor. Only possible while the characteristic is still
    /// owned by its definition, before it becomes part of a service.
    pub fn add_descriptor(&mut self, descriptor: Descriptor) -> GattResult<()> {
        if self.descriptor(descriptor.kind()).is_some() {
            return Err(GattError::DuplicateDescriptor {
                characteristic: self.uuid,
                descriptor: descriptor.uuid(),
            });
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Encodes `numeric` as `format` at `offset`, which must be the declared
    /// offset. Bytes before the field are kept.
    pub fn set_value(&self, numeric: i64, format: ValueFormat, offset: usize) -> GattResult<()> {
        self.check_field(format, offset)?;
        let encoded = format::encode_int(numeric, format)?;
        self.store_field(&encoded);
        trace!("characteristic {} set to {} ({})", self.uuid, numeric, format);
        Ok(())
    }

    /// Encodes `mantissa * 10^exponent` as an IEEE-11073 float at `offset`.
    pub fn set_float_value(
        &self,
        mantissa: i32,
        exponent: i8,
        format: ValueFormat,
        offset: usize,
    ) -> GattResult<()> {
        self.check_field(format, offset)?;
        let encoded = format::encode_float(mantissa, exponent, format)?;
        self.store_field(&encoded);
        trace!(
            "characteristic {} set to {}e{} ({})",
            self.uuid,
            mantissa,
            exponent,
            format
        );
        Ok(())
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> Vec<u8> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decodes the integer stored at `offset`.
    pub fn int_value(&self, format: ValueFormat, offset: usize) -> GattResult<i64> {
        let value = self.value();
        let field = field(&value, format, offset)?;
        Ok(format::decode_int(field, format)?)
    }

    /// Decodes the IEEE-11073 float stored at `offset` as `(mantissa, exponent)`.
    pub fn float_value(&self, format: ValueFormat, offset: usize) -> GattResult<(i32, i8)> {
        let value = self.value();
        let field = field(&value, format, offset)?;
        Ok(format::decode_float(field, format)?)
    }

    /// Read request from a remote device.
    pub fn read(&self) -> GattResult<Vec<u8>> {
        self.require(self.properties.can_read(), Operation::Read)?;
        Ok(self.value())
    }

    /// Write request from a remote device. The payload must cover the
    /// declared offset and format exactly.
    pub fn write(&self, bytes: &[u8]) -> GattResult<()> {
        self.require(self.properties.can_write(), Operation::Write)?;

        let expected = self.declared_len();
        if bytes.len() != expected {
            return Err(EncodingError::InvalidLength {
                expected,
                actual: bytes.len(),
            }
            .into());
        }

        let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
        value.clear();
        value.extend_from_slice(bytes);
        trace!("characteristic {} written remotely: {:02x?}", self.uuid, bytes);
        Ok(())
    }

    pub(crate) fn require(&self, allowed: bool, operation: Operation) -> GattResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(GattError::OperationNotPermitted {
                characteristic: self.uuid,
                operation,
            })
        }
    }

    /// The field written by a numeric update must be the declared one, so
    /// the value keeps its `offset + width` length.
    fn check_field(&self, format: ValueFormat, offset: usize) -> Result<(), EncodingError> {
        if format.width() != self.format.width() {
            return Err(EncodingError::WidthMismatch {
                format,
                expected: self.format.width(),
                actual: format.width(),
            });
        }
        if offset != self.offset {
            return Err(EncodingError::InvalidLength {
                expected: self.declared_len(),
                actual: offset.saturating_add(format.width()),
            });
        }
        Ok(())
    }

    fn declared_len(&self) -> usize {
        self.offset + self.format.width()
    }

    fn store_field(&self, encoded: &[u8]) {
        let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
        value[self.offset..].copy_from_slice(encoded);
    }
}

fn field_end(format: ValueFormat, offset: usize) -> Result<usize, EncodingError> {
    offset
        .checked_add(format.width())
        .ok_or(EncodingError::InvalidLength {
            expected: format.width(),
            actual: usize::MAX,
        })
}

fn field(value: &[u8], format: ValueFormat, offset: usize) -> Result<&[u8], EncodingError> {
    let end = field_end(format, offset)?;
    value.get(offset..end).ok_or(EncodingError::InvalidLength {
        expected: end,
        actual: value.len(),
    })
}
