//! String encoding of a record's primary key tuple for use in URLs.
//!
//! A single-column key is the value's display form, verbatim. Multi-column keys escape
//! `\` as `\\` and `;` as `\;` in every segment and join the segments with a bare `;`.

use crate::error::AdminError;
use crate::model::Column;
use crate::store::Row;
use crate::value::{ColumnType, Value, ValueError};
use thiserror::Error;

const SEPARATOR: char = ';';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("expected {expected} primary key values, found {found}")]
    Arity { expected: usize, found: usize },
    #[error("primary key column '{column}': {source}")]
    Coercion { column: String, #[source] source: ValueError },
    #[error("primary key column '{0}' has no value")]
    MissingValue(String),
    #[error("model has no primary key")]
    NoPrimaryKey,
}

pub fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c == ESCAPE || c == SEPARATOR {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

pub fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut escaped = false;
    for c in segment.chars() {
        if escaped {
            if c != ESCAPE && c != SEPARATOR {
                out.push(ESCAPE);
            }
            out.push(c);
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    if escaped {
        out.push(ESCAPE);
    }
    out
}

/// Splits on unescaped separators and unescapes every segment in the same pass.
pub fn split_identifier(identifier: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in identifier.chars() {
        if escaped {
            if c != ESCAPE && c != SEPARATOR {
                current.push(ESCAPE);
            }
            current.push(c);
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == SEPARATOR {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push(ESCAPE);
    }
    segments.push(current);
    segments
}

pub fn encode_values(values: &[Value]) -> String {
    match values {
        [single] => single.to_string(),
        many => many
            .iter()
            .map(|v| escape_segment(&v.to_string()))
            .collect::<Vec<_>>()
            .join(";"),
    }
}

pub fn encode_object_identifier(row: &Row, pk_columns: &[&Column]) -> Result<String, AdminError> {
    if pk_columns.is_empty() {
        return Err(IdentifierError::NoPrimaryKey.into());
    }
    let values = pk_columns
        .iter()
        .map(|column| {
            let raw = row.get(&column.name).unwrap_or(&serde_json::Value::Null);
            match column.ty.from_json(raw) {
                Ok(Value::Null) => Err(IdentifierError::MissingValue(column.name.clone())),
                Ok(value) => Ok(value),
                Err(source) => Err(IdentifierError::Coercion { column: column.name.clone(), source }),
            }
        })
        .collect::<Result<Vec<Value>, IdentifierError>>()?;
    Ok(encode_values(&values))
}

pub fn decode_object_identifier(identifier: &str, pk_columns: &[&Column]) -> Result<Vec<Value>, IdentifierError> {
    let segments = match pk_columns.len() {
        0 => return Err(IdentifierError::NoPrimaryKey),
        1 => vec![identifier.to_string()],
        _ => split_identifier(identifier),
    };
    if segments.len() != pk_columns.len() {
        return Err(IdentifierError::Arity { expected: pk_columns.len(), found: segments.len() });
    }
    segments
        .iter()
        .zip(pk_columns)
        .map(|(segment, column)| coerce_segment(segment, column.ty, &column.name))
        .collect()
}

fn coerce_segment(segment: &str, ty: ColumnType, column: &str) -> Result<Value, IdentifierError> {
    ty.parse(segment).map_err(|source| IdentifierError::Coercion { column: column.to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelMeta;
    use serde_json::json;

    fn person() -> ModelMeta {
        ModelMeta::new("Person", "people")
            .column(Column::text("family_id").primary_key())
            .column(Column::integer("member_id").primary_key())
            .column(Column::text("version").primary_key())
    }

    fn family() -> ModelMeta {
        ModelMeta::new("Family", "family").column(Column::text("id").primary_key())
    }

    fn profile() -> ModelMeta {
        ModelMeta::new("Profile", "profile").column(Column::integer("id").primary_key())
    }

    fn person_row(family_id: &str, member_id: i64, version: &str) -> Row {
        json!({"family_id": family_id, "member_id": member_id, "version": version})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn encode(meta: &ModelMeta, row: serde_json::Value) -> String {
        encode_object_identifier(row.as_object().unwrap(), &meta.primary_keys()).unwrap()
    }

    #[test]
    fn single_pk_identifier_is_verbatim() {
        assert_eq!(encode(&family(), json!({"id": "test"})), "test");
        assert_eq!(encode(&family(), json!({"id": "C:\\Files\\"})), "C:\\Files\\");
        assert_eq!(encode(&family(), json!({"id": r"1;2\;3"})), r"1;2\;3");
        assert_eq!(encode(&profile(), json!({"id": 0})), "0");
        assert_eq!(encode(&profile(), json!({"id": 3217})), "3217");
    }

    #[test]
    fn single_pk_values_are_not_unescaped() {
        let fam = family();
        let pks = fam.primary_keys();
        assert_eq!(decode_object_identifier("test", &pks).unwrap(), vec![Value::from("test")]);
        assert_eq!(decode_object_identifier("C:\\Files\\", &pks).unwrap(), vec![Value::from("C:\\Files\\")]);
        assert_eq!(decode_object_identifier(r"1;2\;3", &pks).unwrap(), vec![Value::from(r"1;2\;3")]);
        let prof = profile();
        assert_eq!(decode_object_identifier("0", &prof.primary_keys()).unwrap(), vec![Value::Int(0)]);
        assert_eq!(decode_object_identifier("3217", &prof.primary_keys()).unwrap(), vec![Value::Int(3217)]);
    }

    #[test]
    fn multi_pk_identifier_escapes_each_segment() {
        let meta = person();
        let pks = meta.primary_keys();
        let id = |f: &str, m: i64, v: &str| encode_object_identifier(&person_row(f, m, v), &pks).unwrap();
        assert_eq!(id("Johnson", 7, "A"), "Johnson;7;A");
        assert_eq!(id("C:\\Files\\", 404, "F"), r"C:\\Files\\;404;F");
        assert_eq!(id(r"1;2\;3", 201, "S"), r"1\;2\\\;3;201;S");
        assert_eq!(id("Doe", 3, "\\"), "Doe;3;\\\\");
        assert_eq!(id("", 1, ""), ";1;");
    }

    #[test]
    fn multi_pk_values_are_unescaped() {
        let meta = person();
        let pks = meta.primary_keys();
        let values = |ident: &str| decode_object_identifier(ident, &pks).unwrap();
        let triple = |f: &str, m: i64, v: &str| vec![Value::from(f), Value::Int(m), Value::from(v)];
        assert_eq!(values("Johnson;7;A"), triple("Johnson", 7, "A"));
        assert_eq!(values(r"C:\\Files\\;404;F"), triple("C:\\Files\\", 404, "F"));
        assert_eq!(values(r"1\;2\\\;3;201;S"), triple(r"1;2\;3", 201, "S"));
        assert_eq!(values("Doe;3;\\\\"), triple("Doe", 3, "\\"));
        assert_eq!(values(";1;"), triple("", 1, ""));
    }

    #[test]
    fn malformed_identifiers_fail() {
        let meta = person();
        let pks = meta.primary_keys();
        assert_eq!(
            decode_object_identifier("Missing;1", &pks),
            Err(IdentifierError::Arity { expected: 3, found: 2 })
        );
        assert_eq!(
            decode_object_identifier("Johnson;7;A;Extra", &pks),
            Err(IdentifierError::Arity { expected: 3, found: 4 })
        );
        assert!(matches!(
            decode_object_identifier("Johnson;seven;A", &pks),
            Err(IdentifierError::Coercion { column, .. }) if column == "member_id"
        ));
    }

    #[test]
    fn round_trip_holds_for_awkward_values() {
        let meta = person();
        let pks = meta.primary_keys();
        let awkward = ["", ";", "\\", "\\;", ";;", "a\\", "\\\\;x", "plain", "12"];
        for family_id in awkward {
            for version in awkward {
                let row = person_row(family_id, 42, version);
                let ident = encode_object_identifier(&row, &pks).unwrap();
                let decoded = decode_object_identifier(&ident, &pks).unwrap();
                assert_eq!(decoded, vec![Value::from(family_id), Value::Int(42), Value::from(version)], "identifier {ident}");
            }
        }
    }

    #[test]
    fn escape_and_unescape_are_inverse() {
        for raw in ["", "1;2\\;3", "\\", "a;b;c", "trailing\\"] {
            assert_eq!(unescape_segment(&escape_segment(raw)), raw);
        }
        assert_eq!(escape_segment(r"1;2\;3"), r"1\;2\\\;3");
    }

    #[test]
    fn split_tracks_adjacent_escapes() {
        assert_eq!(split_identifier(r"1\;2\\\;3;201"), vec![r"1;2\;3".to_string(), "201".to_string()]);
        assert_eq!(split_identifier(r"\\;x"), vec!["\\".to_string(), "x".to_string()]);
        assert_eq!(split_identifier(""), vec![String::new()]);
    }

    #[test]
    fn missing_pk_value_in_row_fails() {
        let meta = profile();
        let row = json!({"id": "abc"}).as_object().cloned().unwrap();
        assert!(encode_object_identifier(&row, &meta.primary_keys()).is_err());
        let row = json!({"name": "no id"}).as_object().cloned().unwrap();
        assert!(matches!(
            encode_object_identifier(&row, &meta.primary_keys()),
            Err(AdminError::Identifier(IdentifierError::MissingValue(_)))
        ));
    }
}
