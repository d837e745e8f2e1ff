use crate::driver::{DriverRow, DriverValue};
use crate::encoding::Codepage;
use crate::error::OpenEdgeDbError;
use crate::types::RowValues;

/// Parameters converted for one native call.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub(crate) values: Vec<DriverValue>,
}

impl Params {
    /// Convert middleware values into driver values.
    ///
    /// Text is encoded in `codepage`; booleans become `1`/`0` because the engine has no
    /// boolean parameter type.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::EncodingError` if a text value cannot be encoded.
    pub fn convert(params: &[RowValues], codepage: Codepage) -> Result<Params, OpenEdgeDbError> {
        let mut values = Vec::with_capacity(params.len());
        for p in params {
            values.push(encode_value(p, codepage)?);
        }
        Ok(Params { values })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[DriverValue] {
        &self.values
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<DriverValue> {
        self.values
    }
}

fn encode_value(value: &RowValues, codepage: Codepage) -> Result<DriverValue, OpenEdgeDbError> {
    Ok(match value {
        RowValues::Int(i) => DriverValue::Int(*i),
        RowValues::Float(f) => DriverValue::Float(*f),
        RowValues::Text(s) => DriverValue::Text(codepage.encode(s)?),
        RowValues::Bool(b) => DriverValue::Int(i64::from(*b)),
        RowValues::Timestamp(dt) => DriverValue::Timestamp(*dt),
        RowValues::Null => DriverValue::Null,
        RowValues::Blob(bytes) => DriverValue::Binary(bytes.clone()),
    })
}

/// Decode one driver row element-wise into middleware values.
///
/// # Errors
/// Returns `OpenEdgeDbError::EncodingError` if a text value is not valid in `codepage`.
pub fn decode_row(row: DriverRow, codepage: Codepage) -> Result<Vec<RowValues>, OpenEdgeDbError> {
    row.into_iter()
        .map(|value| {
            Ok(match value {
                DriverValue::Null => RowValues::Null,
                DriverValue::Int(i) => RowValues::Int(i),
                DriverValue::Float(f) => RowValues::Float(f),
                DriverValue::Text(bytes) => RowValues::Text(codepage.decode(&bytes)?),
                DriverValue::Timestamp(dt) => RowValues::Timestamp(dt),
                DriverValue::Binary(bytes) => RowValues::Blob(bytes),
            })
        })
        .collect()
}
