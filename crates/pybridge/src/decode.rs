//! Typed decoding of tagged reply payloads.
//!
//! Every decoder validates the payload tag against the kind the caller asked
//! for and fails with a decode error on mismatch. There is no coercion: a
//! wrong tag means the generated caller and the actual remote schema
//! disagree, and hiding that would corrupt data silently.

use crate::encode::validate_expression;
use crate::error::{Error, Result};
use crate::handle::RemoteEnum;
use crate::wire::RawValue;

/// Scalar kinds decodable straight out of a payload.
pub trait FromPayload: Sized {
    /// Kind name used in decode diagnostics.
    const KIND: &'static str;

    fn from_payload(payload: &RawValue) -> Result<Self>;
}

impl FromPayload for bool {
    const KIND: &'static str = "bool";

    fn from_payload(payload: &RawValue) -> Result<Self> {
        match payload {
            RawValue::Bool(value) => Ok(*value),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

impl FromPayload for i64 {
    const KIND: &'static str = "int";

    fn from_payload(payload: &RawValue) -> Result<Self> {
        match payload {
            RawValue::Int(value) => Ok(*value),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

impl FromPayload for f64 {
    const KIND: &'static str = "float";

    fn from_payload(payload: &RawValue) -> Result<Self> {
        match payload {
            RawValue::Float(value) => Ok(*value),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

impl FromPayload for String {
    const KIND: &'static str = "str";

    fn from_payload(payload: &RawValue) -> Result<Self> {
        match payload {
            RawValue::Str(value) => Ok(value.clone()),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

/// Decode a payload expected to carry no value.
pub fn decode_void(payload: &RawValue) -> Result<()> {
    match payload {
        RawValue::None => Ok(()),
        other => Err(mismatch("none", other)),
    }
}

/// Decode a scalar payload with strict tag checking.
pub fn decode_scalar<T: FromPayload>(payload: &RawValue) -> Result<T> {
    T::from_payload(payload)
}

/// Decode an enum value from its remote literal name.
pub fn decode_enum<E: RemoteEnum>(payload: &RawValue) -> Result<E> {
    match payload {
        RawValue::Str(name) => E::from_name(name)
            .ok_or_else(|| Error::decode("enum literal", format!("unknown name {name:?}"))),
        other => Err(mismatch("enum literal", other)),
    }
}

/// Decode an enum-set payload: a list of remote literal names.
pub fn decode_enum_set<E: RemoteEnum>(payload: &RawValue) -> Result<Vec<E>> {
    match payload {
        RawValue::List(items) => items.iter().map(decode_enum).collect(),
        other => Err(mismatch("enum set", other)),
    }
}

/// Decode a fixed-length array of scalars. The payload must be a list whose
/// length matches the declared length exactly.
pub fn decode_array<T: FromPayload>(payload: &RawValue, len: usize) -> Result<Vec<T>> {
    match payload {
        RawValue::List(items) => {
            if items.len() != len {
                return Err(Error::decode(
                    format!("list of length {len}"),
                    format!("list of length {}", items.len()),
                ));
            }
            items.iter().map(T::from_payload).collect()
        }
        other => Err(mismatch("list", other)),
    }
}

/// Decode a row-major matrix. Both the row count and every row's length are
/// checked against the declared dimensions.
pub fn decode_matrix<T: FromPayload>(
    payload: &RawValue,
    rows: usize,
    cols: usize,
) -> Result<Vec<Vec<T>>> {
    match payload {
        RawValue::List(outer) => {
            if outer.len() != rows {
                return Err(Error::decode(
                    format!("matrix of {rows} rows"),
                    format!("list of length {}", outer.len()),
                ));
            }
            outer.iter().map(|row| decode_array(row, cols)).collect()
        }
        other => Err(mismatch("matrix", other)),
    }
}

/// Decode an object reference. The accessor path becomes the new handle's
/// expression verbatim; only its syntactic shape is checked.
pub fn decode_ref(payload: &RawValue) -> Result<String> {
    match payload {
        RawValue::Ref(path) => {
            validate_expression(path)?;
            Ok(path.clone())
        }
        other => Err(mismatch("ref", other)),
    }
}

fn mismatch(expected: &str, actual: &RawValue) -> Error {
    Error::decode(expected, actual.tag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Axis {
        X,
        Y,
        Z,
    }

    impl RemoteEnum for Axis {
        fn name(&self) -> &'static str {
            match self {
                Self::X => "X",
                Self::Y => "Y",
                Self::Z => "Z",
            }
        }

        fn from_name(name: &str) -> Option<Self> {
            match name {
                "X" => Some(Self::X),
                "Y" => Some(Self::Y),
                "Z" => Some(Self::Z),
                _ => None,
            }
        }
    }

    fn expect_decode_error(err: Error) -> (String, String) {
        match err {
            Error::Decode { expected, actual } => (expected, actual),
            other => panic!("expected a decode error, got {other}"),
        }
    }

    #[test]
    fn scalars_round_trip() {
        assert!(decode_scalar::<bool>(&RawValue::Bool(true)).unwrap());
        assert_eq!(decode_scalar::<i64>(&RawValue::Int(-3)).unwrap(), -3);
        assert_eq!(decode_scalar::<f64>(&RawValue::Float(0.5)).unwrap(), 0.5);
        assert_eq!(
            decode_scalar::<String>(&RawValue::Str("cube".to_string())).unwrap(),
            "cube"
        );
        decode_void(&RawValue::None).unwrap();
    }

    #[test]
    fn tags_are_never_coerced() {
        let (expected, actual) = expect_decode_error(
            decode_scalar::<bool>(&RawValue::Str("true".to_string())).unwrap_err(),
        );
        assert_eq!(expected, "bool");
        assert_eq!(actual, "str");

        // an int payload is not a float, even though the lift would be lossless
        let err = decode_scalar::<f64>(&RawValue::Int(1)).unwrap_err();
        expect_decode_error(err);

        decode_void(&RawValue::Int(0)).unwrap_err();
    }

    #[test]
    fn enum_decoding() {
        assert_eq!(
            decode_enum::<Axis>(&RawValue::Str("Y".to_string())).unwrap(),
            Axis::Y
        );
        decode_enum::<Axis>(&RawValue::Str("W".to_string())).unwrap_err();
        decode_enum::<Axis>(&RawValue::Int(1)).unwrap_err();

        let set = decode_enum_set::<Axis>(&RawValue::List(vec![
            RawValue::Str("Z".to_string()),
            RawValue::Str("X".to_string()),
        ]))
        .unwrap();
        assert_eq!(set, vec![Axis::Z, Axis::X]);

        let empty = decode_enum_set::<Axis>(&RawValue::List(Vec::new())).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn array_length_is_checked() {
        let payload = RawValue::List(vec![RawValue::Int(1), RawValue::Int(2), RawValue::Int(3)]);
        assert_eq!(decode_array::<i64>(&payload, 3).unwrap(), vec![1, 2, 3]);

        let (expected, actual) = expect_decode_error(decode_array::<i64>(&payload, 4).unwrap_err());
        assert_eq!(expected, "list of length 4");
        assert_eq!(actual, "list of length 3");
    }

    #[test]
    fn matrix_checks_both_dimensions() {
        let payload = RawValue::List(vec![
            RawValue::List(vec![RawValue::Float(1.0), RawValue::Float(0.0)]),
            RawValue::List(vec![RawValue::Float(0.0), RawValue::Float(1.0)]),
        ]);
        let matrix = decode_matrix::<f64>(&payload, 2, 2).unwrap();
        assert_eq!(matrix, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        decode_matrix::<f64>(&payload, 3, 2).unwrap_err();
        decode_matrix::<f64>(&payload, 2, 3).unwrap_err();
    }

    #[test]
    fn refs_keep_their_path_verbatim() {
        let payload = RawValue::Ref("scene.objects.get(\"a\")".to_string());
        assert_eq!(decode_ref(&payload).unwrap(), "scene.objects.get(\"a\")");

        decode_ref(&RawValue::Ref("scene.get(".to_string())).unwrap_err();
        decode_ref(&RawValue::Str("scene".to_string())).unwrap_err();
    }
}
