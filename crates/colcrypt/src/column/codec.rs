//! (ciphertext, nonce) pairs ↔ Arrow columns.
//!
//! Encoded columns hold one variable-length cell per row with no cross-row
//! padding. Nulls use the Arrow validity bitmap, never a sentinel value.

use std::borrow::Cow;
use std::sync::Arc;

use arrow_array::{
    cast::AsArray, Array, ArrayRef, BinaryArray, FixedSizeBinaryArray, GenericBinaryArray,
    GenericStringArray, OffsetSizeTrait, StringArray,
};
use arrow_schema::DataType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{CellEncoding, EngineError, FailureReason};

use crate::crypto::Nonce;

/// Output of encrypting one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCell {
    /// Ciphertext followed by the authentication tag.
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce,
}

/// Encodes and decodes ciphertext/nonce columns in one [`CellEncoding`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnCodec {
    encoding: CellEncoding,
}

impl ColumnCodec {
    pub fn new(encoding: CellEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> CellEncoding {
        self.encoding
    }

    /// Arrow type of the columns [`ColumnCodec::encode`] produces.
    pub fn data_type(&self) -> DataType {
        match self.encoding {
            CellEncoding::Binary => DataType::Binary,
            CellEncoding::Hex | CellEncoding::Base64 => DataType::Utf8,
        }
    }

    /// Encode rows into `(ciphertext column, nonce column)`, preserving order.
    pub fn encode(&self, rows: &[Option<EncryptedCell>]) -> (ArrayRef, ArrayRef) {
        let ciphertexts = self.encode_cells(
            rows.iter()
                .map(|r| r.as_ref().map(|c| c.ciphertext.as_slice())),
        );
        let nonces =
            self.encode_cells(rows.iter().map(|r| r.as_ref().map(|c| c.nonce.as_bytes())));
        (ciphertexts, nonces)
    }

    fn encode_cells<'a>(&self, cells: impl Iterator<Item = Option<&'a [u8]>>) -> ArrayRef {
        match self.encoding {
            CellEncoding::Binary => Arc::new(cells.collect::<BinaryArray>()),
            CellEncoding::Hex => Arc::new(cells.map(|c| c.map(hex::encode)).collect::<StringArray>()),
            CellEncoding::Base64 => {
                Arc::new(cells.map(|c| c.map(|b| STANDARD.encode(b))).collect::<StringArray>())
            }
        }
    }

    /// Validate a ciphertext/nonce column pair and return a row reader.
    ///
    /// Text columns are decoded with this codec's encoding; a codec configured
    /// for [`CellEncoding::Binary`] reads text columns as hex.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Schema`] if the columns differ in length or
    /// either has a type that cannot hold encoded cells.
    pub fn decode<'a>(
        &self,
        ciphertexts: &'a dyn Array,
        nonces: &'a dyn Array,
    ) -> Result<EncryptedColumns<'a>, EngineError> {
        if ciphertexts.len() != nonces.len() {
            return Err(EngineError::Schema(format!(
                "ciphertext column has {} rows but nonce column has {}",
                ciphertexts.len(),
                nonces.len()
            )));
        }
        let text_encoding = match self.encoding {
            CellEncoding::Binary => CellEncoding::Hex,
            other => other,
        };
        Ok(EncryptedColumns {
            ciphertexts: CellReader::new(ciphertexts, text_encoding, "ciphertext")?,
            nonces: CellReader::new(nonces, text_encoding, "nonce")?,
        })
    }
}

/// Typed, zero-copy access to the cells of one encoded column.
#[derive(Clone, Copy)]
enum CellReader<'a> {
    Binary(&'a BinaryArray),
    LargeBinary(&'a GenericBinaryArray<i64>),
    FixedSize(&'a FixedSizeBinaryArray),
    Utf8(&'a StringArray, CellEncoding),
    LargeUtf8(&'a GenericStringArray<i64>, CellEncoding),
}

impl<'a> CellReader<'a> {
    fn new(array: &'a dyn Array, text: CellEncoding, role: &str) -> Result<Self, EngineError> {
        Ok(match array.data_type() {
            DataType::Binary => CellReader::Binary(array.as_binary::<i32>()),
            DataType::LargeBinary => CellReader::LargeBinary(array.as_binary::<i64>()),
            DataType::FixedSizeBinary(_) => CellReader::FixedSize(array.as_fixed_size_binary()),
            DataType::Utf8 => CellReader::Utf8(array.as_string::<i32>(), text),
            DataType::LargeUtf8 => CellReader::LargeUtf8(array.as_string::<i64>(), text),
            other => {
                return Err(EngineError::Schema(format!(
                    "{role} column has type {other}, expected binary or encoded text"
                )))
            }
        })
    }

    fn cell(&self, row: usize) -> Option<Result<Cow<'a, [u8]>, FailureReason>> {
        match *self {
            CellReader::Binary(a) => binary_cell(a, row).map(Ok),
            CellReader::LargeBinary(a) => binary_cell(a, row).map(Ok),
            CellReader::FixedSize(a) => (!a.is_null(row)).then(|| Ok(Cow::Borrowed(a.value(row)))),
            CellReader::Utf8(a, encoding) => text_cell(a, row, encoding),
            CellReader::LargeUtf8(a, encoding) => text_cell(a, row, encoding),
        }
    }
}

fn binary_cell<'a, O: OffsetSizeTrait>(
    array: &'a GenericBinaryArray<O>,
    row: usize,
) -> Option<Cow<'a, [u8]>> {
    (!array.is_null(row)).then(|| Cow::Borrowed(array.value(row)))
}

fn text_cell<'a, O: OffsetSizeTrait>(
    array: &'a GenericStringArray<O>,
    row: usize,
    encoding: CellEncoding,
) -> Option<Result<Cow<'a, [u8]>, FailureReason>> {
    if array.is_null(row) {
        return None;
    }
    let text = array.value(row);
    let decoded = match encoding {
        CellEncoding::Base64 => STANDARD.decode(text).ok(),
        CellEncoding::Hex | CellEncoding::Binary => hex::decode(text).ok(),
    };
    Some(decoded.map(Cow::Owned).ok_or(FailureReason::InvalidEncoding))
}

/// One encrypted row: ciphertext and nonce bytes.
pub type EncryptedRow<'a> = (Cow<'a, [u8]>, Cow<'a, [u8]>);

/// Row reader over a validated ciphertext/nonce column pair.
pub struct EncryptedColumns<'a> {
    ciphertexts: CellReader<'a>,
    nonces: CellReader<'a>,
}

impl<'a> EncryptedColumns<'a> {
    /// Read one row.
    ///
    /// Returns `Ok(None)` when the ciphertext cell is null; the nonce cell is
    /// then ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FailureReason::MissingNonce`] when a ciphertext has no nonce
    /// and [`FailureReason::InvalidEncoding`] when a text cell does not decode.
    pub fn row(&self, row: usize) -> Result<Option<EncryptedRow<'a>>, FailureReason> {
        let ciphertext = match self.ciphertexts.cell(row) {
            None => return Ok(None),
            Some(c) => c?,
        };
        let nonce = self
            .nonces
            .cell(row)
            .ok_or(FailureReason::MissingNonce)??;
        Ok(Some((ciphertext, nonce)))
    }
}
