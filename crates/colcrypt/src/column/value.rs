//! Typed cell values ↔ tagged plaintext bytes.
//!
//! The plaintext handed to the cipher is `[tag] ++ payload`:
//!
//! | kind | payload |
//! |---|---|
//! | `utf8`, `large_utf8` | UTF-8 bytes |
//! | `binary`, `large_binary` | raw bytes |
//! | `boolean` | one byte, `0` or `1` |
//! | integers, floats | little-endian, native width |
//!
//! The tag sits inside the authenticated plaintext, so a decrypted value's
//! type cannot be altered without failing authentication.

use std::sync::Arc;

use arrow_array::{
    cast::AsArray,
    types::{
        ArrowPrimitiveType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
        UInt16Type, UInt32Type, UInt64Type, UInt8Type,
    },
    Array, ArrayRef, BinaryArray, BooleanArray, LargeBinaryArray, LargeStringArray,
    PrimitiveArray, StringArray,
};
use arrow_schema::DataType;
use common::FailureReason;
use zeroize::Zeroizing;

/// Logical type of an encryptable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Utf8,
    LargeUtf8,
    Binary,
    LargeBinary,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

const ALL_KINDS: [ValueKind; 15] = [
    ValueKind::Utf8,
    ValueKind::LargeUtf8,
    ValueKind::Binary,
    ValueKind::LargeBinary,
    ValueKind::Boolean,
    ValueKind::Int8,
    ValueKind::Int16,
    ValueKind::Int32,
    ValueKind::Int64,
    ValueKind::UInt8,
    ValueKind::UInt16,
    ValueKind::UInt32,
    ValueKind::UInt64,
    ValueKind::Float32,
    ValueKind::Float64,
];

impl ValueKind {
    /// Tag byte written in front of every plaintext payload.
    pub fn tag(self) -> u8 {
        match self {
            ValueKind::Utf8 => 1,
            ValueKind::LargeUtf8 => 2,
            ValueKind::Binary => 3,
            ValueKind::LargeBinary => 4,
            ValueKind::Boolean => 5,
            ValueKind::Int8 => 6,
            ValueKind::Int16 => 7,
            ValueKind::Int32 => 8,
            ValueKind::Int64 => 9,
            ValueKind::UInt8 => 10,
            ValueKind::UInt16 => 11,
            ValueKind::UInt32 => 12,
            ValueKind::UInt64 => 13,
            ValueKind::Float32 => 14,
            ValueKind::Float64 => 15,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        ALL_KINDS.into_iter().find(|k| k.tag() == tag)
    }

    /// Name stored in field metadata.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Utf8 => "utf8",
            ValueKind::LargeUtf8 => "large_utf8",
            ValueKind::Binary => "binary",
            ValueKind::LargeBinary => "large_binary",
            ValueKind::Boolean => "boolean",
            ValueKind::Int8 => "int8",
            ValueKind::Int16 => "int16",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::UInt8 => "uint8",
            ValueKind::UInt16 => "uint16",
            ValueKind::UInt32 => "uint32",
            ValueKind::UInt64 => "uint64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_KINDS.into_iter().find(|k| k.name() == name)
    }

    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        Some(match data_type {
            DataType::Utf8 => ValueKind::Utf8,
            DataType::LargeUtf8 => ValueKind::LargeUtf8,
            DataType::Binary => ValueKind::Binary,
            DataType::LargeBinary => ValueKind::LargeBinary,
            DataType::Boolean => ValueKind::Boolean,
            DataType::Int8 => ValueKind::Int8,
            DataType::Int16 => ValueKind::Int16,
            DataType::Int32 => ValueKind::Int32,
            DataType::Int64 => ValueKind::Int64,
            DataType::UInt8 => ValueKind::UInt8,
            DataType::UInt16 => ValueKind::UInt16,
            DataType::UInt32 => ValueKind::UInt32,
            DataType::UInt64 => ValueKind::UInt64,
            DataType::Float32 => ValueKind::Float32,
            DataType::Float64 => ValueKind::Float64,
            _ => return None,
        })
    }

    pub fn data_type(self) -> DataType {
        match self {
            ValueKind::Utf8 => DataType::Utf8,
            ValueKind::LargeUtf8 => DataType::LargeUtf8,
            ValueKind::Binary => DataType::Binary,
            ValueKind::LargeBinary => DataType::LargeBinary,
            ValueKind::Boolean => DataType::Boolean,
            ValueKind::Int8 => DataType::Int8,
            ValueKind::Int16 => DataType::Int16,
            ValueKind::Int32 => DataType::Int32,
            ValueKind::Int64 => DataType::Int64,
            ValueKind::UInt8 => DataType::UInt8,
            ValueKind::UInt16 => DataType::UInt16,
            ValueKind::UInt32 => DataType::UInt32,
            ValueKind::UInt64 => DataType::UInt64,
            ValueKind::Float32 => DataType::Float32,
            ValueKind::Float64 => DataType::Float64,
        }
    }

    /// Exact payload width for fixed-width kinds.
    fn fixed_width(self) -> Option<usize> {
        match self {
            ValueKind::Boolean | ValueKind::Int8 | ValueKind::UInt8 => Some(1),
            ValueKind::Int16 | ValueKind::UInt16 => Some(2),
            ValueKind::Int32 | ValueKind::UInt32 | ValueKind::Float32 => Some(4),
            ValueKind::Int64 | ValueKind::UInt64 | ValueKind::Float64 => Some(8),
            _ => None,
        }
    }
}

/// Native values with a fixed little-endian byte form.
trait LeBytes: Sized {
    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_le_bytes {
    ($($t:ty),*) => {
        $(
            impl LeBytes for $t {
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Option<Self> {
                    bytes.try_into().ok().map(<$t>::from_le_bytes)
                }
            }
        )*
    };
}

impl_le_bytes!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// Read-only view of a source column that yields tagged plaintext per row.
pub struct PlaintextColumn<'a> {
    array: &'a dyn Array,
    kind: ValueKind,
}

impl<'a> PlaintextColumn<'a> {
    /// Returns `None` if the array's type is not encryptable.
    pub fn new(array: &'a dyn Array) -> Option<Self> {
        let kind = ValueKind::from_data_type(array.data_type())?;
        Some(Self { array, kind })
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Tagged plaintext of `row`, or `None` for a null cell.
    pub fn cell(&self, row: usize) -> Option<Zeroizing<Vec<u8>>> {
        if self.array.is_null(row) {
            return None;
        }
        let mut out = Zeroizing::new(Vec::with_capacity(16));
        out.push(self.kind.tag());
        let a = self.array;
        match self.kind {
            ValueKind::Utf8 => out.extend_from_slice(a.as_string::<i32>().value(row).as_bytes()),
            ValueKind::LargeUtf8 => out.extend_from_slice(a.as_string::<i64>().value(row).as_bytes()),
            ValueKind::Binary => out.extend_from_slice(a.as_binary::<i32>().value(row)),
            ValueKind::LargeBinary => out.extend_from_slice(a.as_binary::<i64>().value(row)),
            ValueKind::Boolean => out.push(a.as_boolean().value(row) as u8),
            ValueKind::Int8 => a.as_primitive::<Int8Type>().value(row).write_le(&mut out),
            ValueKind::Int16 => a.as_primitive::<Int16Type>().value(row).write_le(&mut out),
            ValueKind::Int32 => a.as_primitive::<Int32Type>().value(row).write_le(&mut out),
            ValueKind::Int64 => a.as_primitive::<Int64Type>().value(row).write_le(&mut out),
            ValueKind::UInt8 => a.as_primitive::<UInt8Type>().value(row).write_le(&mut out),
            ValueKind::UInt16 => a.as_primitive::<UInt16Type>().value(row).write_le(&mut out),
            ValueKind::UInt32 => a.as_primitive::<UInt32Type>().value(row).write_le(&mut out),
            ValueKind::UInt64 => a.as_primitive::<UInt64Type>().value(row).write_le(&mut out),
            ValueKind::Float32 => a.as_primitive::<Float32Type>().value(row).write_le(&mut out),
            ValueKind::Float64 => a.as_primitive::<Float64Type>().value(row).write_le(&mut out),
        }
        Some(out)
    }
}

/// A verified, decrypted cell: its kind and untagged payload.
#[derive(Debug)]
pub struct DecodedCell {
    pub kind: ValueKind,
    payload: Zeroizing<Vec<u8>>,
}

impl DecodedCell {
    /// Split and validate tagged plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`FailureReason::InvalidPlaintext`] for an unknown tag, a
    /// payload of the wrong width, invalid UTF-8, or a boolean byte other
    /// than `0`/`1`.
    pub fn parse(plaintext: &[u8]) -> Result<Self, FailureReason> {
        let (&tag, payload) = plaintext
            .split_first()
            .ok_or(FailureReason::InvalidPlaintext)?;
        let kind = ValueKind::from_tag(tag).ok_or(FailureReason::InvalidPlaintext)?;
        if let Some(width) = kind.fixed_width() {
            if payload.len() != width {
                return Err(FailureReason::InvalidPlaintext);
            }
        }
        let valid = match kind {
            ValueKind::Utf8 | ValueKind::LargeUtf8 => std::str::from_utf8(payload).is_ok(),
            ValueKind::Boolean => payload[0] <= 1,
            _ => true,
        };
        if !valid {
            return Err(FailureReason::InvalidPlaintext);
        }
        Ok(Self {
            kind,
            payload: Zeroizing::new(payload.to_vec()),
        })
    }

    fn str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    fn native<T: LeBytes>(&self) -> Option<T> {
        T::read_le(&self.payload)
    }
}

/// Build an array of `kind` from decoded cells; `None` cells become null.
///
/// Cells of a different kind must have been filtered out by the caller.
pub fn build_array(kind: ValueKind, cells: &[Option<DecodedCell>]) -> ArrayRef {
    fn primitive<T>(cells: &[Option<DecodedCell>]) -> ArrayRef
    where
        T: ArrowPrimitiveType,
        T::Native: LeBytes,
    {
        Arc::new(
            cells
                .iter()
                .map(|c| c.as_ref().and_then(DecodedCell::native::<T::Native>))
                .collect::<PrimitiveArray<T>>(),
        )
    }

    match kind {
        ValueKind::Utf8 => Arc::new(
            cells
                .iter()
                .map(|c| c.as_ref().and_then(DecodedCell::str))
                .collect::<StringArray>(),
        ),
        ValueKind::LargeUtf8 => Arc::new(
            cells
                .iter()
                .map(|c| c.as_ref().and_then(DecodedCell::str))
                .collect::<LargeStringArray>(),
        ),
        ValueKind::Binary => Arc::new(
            cells
                .iter()
                .map(|c| c.as_ref().map(|c| c.payload.as_slice()))
                .collect::<BinaryArray>(),
        ),
        ValueKind::LargeBinary => Arc::new(
            cells
                .iter()
                .map(|c| c.as_ref().map(|c| c.payload.as_slice()))
                .collect::<LargeBinaryArray>(),
        ),
        ValueKind::Boolean => Arc::new(
            cells
                .iter()
                .map(|c| c.as_ref().map(|c| c.payload[0] == 1))
                .collect::<BooleanArray>(),
        ),
        ValueKind::Int8 => primitive::<Int8Type>(cells),
        ValueKind::Int16 => primitive::<Int16Type>(cells),
        ValueKind::Int32 => primitive::<Int32Type>(cells),
        ValueKind::Int64 => primitive::<Int64Type>(cells),
        ValueKind::UInt8 => primitive::<UInt8Type>(cells),
        ValueKind::UInt16 => primitive::<UInt16Type>(cells),
        ValueKind::UInt32 => primitive::<UInt32Type>(cells),
        ValueKind::UInt64 => primitive::<UInt64Type>(cells),
        ValueKind::Float32 => primitive::<Float32Type>(cells),
        ValueKind::Float64 => primitive::<Float64Type>(cells),
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{Float64Array, Int32Array};

    use super::*;

    fn round_trip(array: ArrayRef) -> ArrayRef {
        let column = PlaintextColumn::new(array.as_ref()).unwrap();
        let cells: Vec<Option<DecodedCell>> = (0..column.len())
            .map(|row| column.cell(row).map(|pt| DecodedCell::parse(&pt).unwrap()))
            .collect();
        build_array(column.kind(), &cells)
    }

    #[test]
    fn tags_and_names_are_unique_and_reversible() {
        for kind in ALL_KINDS {
            assert_eq!(ValueKind::from_tag(kind.tag()), Some(kind));
            assert_eq!(ValueKind::from_name(kind.name()), Some(kind));
            assert_eq!(ValueKind::from_data_type(&kind.data_type()), Some(kind));
        }
        assert_eq!(ValueKind::from_tag(0), None);
    }

    #[test]
    fn unsupported_types_rejected() {
        assert_eq!(ValueKind::from_data_type(&DataType::Date32), None);
        let nulls = arrow_array::NullArray::new(3);
        assert!(PlaintextColumn::new(&nulls).is_none());
    }

    #[test]
    fn string_cell_layout() {
        let array = StringArray::from(vec![Some("A1"), None]);
        let column = PlaintextColumn::new(&array).unwrap();
        assert_eq!(column.cell(0).unwrap().as_slice(), &[1, b'A', b'1']);
        assert!(column.cell(1).is_none());
    }

    #[test]
    fn integer_cell_is_little_endian() {
        let array = Int32Array::from(vec![0x0102_0304]);
        let column = PlaintextColumn::new(&array).unwrap();
        assert_eq!(column.cell(0).unwrap().as_slice(), &[8, 4, 3, 2, 1]);
    }

    #[test]
    fn typed_columns_round_trip_with_nulls() {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec![Some("x"), None, Some("")])),
            Arc::new(BinaryArray::from(vec![Some(&b"\x00\xff"[..]), None])),
            Arc::new(BooleanArray::from(vec![Some(true), None, Some(false)])),
            Arc::new(Int32Array::from(vec![Some(-7), None, Some(i32::MAX)])),
            Arc::new(Float64Array::from(vec![Some(1.5), None, Some(f64::MIN)])),
        ];
        for array in arrays {
            assert_eq!(round_trip(array.clone()).as_ref(), array.as_ref());
        }
    }

    #[test]
    fn parse_rejects_malformed_plaintext() {
        assert_eq!(DecodedCell::parse(&[]).unwrap_err(), FailureReason::InvalidPlaintext);
        assert_eq!(DecodedCell::parse(&[99, 1]).unwrap_err(), FailureReason::InvalidPlaintext);
        // int64 with a 3-byte payload
        assert_eq!(
            DecodedCell::parse(&[9, 1, 2, 3]).unwrap_err(),
            FailureReason::InvalidPlaintext
        );
        // utf8 with invalid bytes
        assert_eq!(
            DecodedCell::parse(&[1, 0xff, 0xfe]).unwrap_err(),
            FailureReason::InvalidPlaintext
        );
        assert_eq!(DecodedCell::parse(&[5, 2]).unwrap_err(), FailureReason::InvalidPlaintext);
    }
}
