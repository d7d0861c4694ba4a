//! Object to key/value flattening.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use crate::codec;
use crate::descriptor::{Descriptor, MapDescriptor, StructDescriptor};
use crate::error::{EncodingError, EncodingResult};
use crate::format::{Format, Segment};
use crate::selector::Selector;
use crate::walker::{locate_fields, Cursor};

/// Encodes the object (or the sub-object at `fields`) into the key/value
/// pairs that store it under `format`.
///
/// Absent pointees stored as blobs are written as `null`; absent pointees
/// stored recursively produce no pair. Fails with
/// [`EncodingError::DuplicateKey`] when two values would share a key.
pub fn encode(
    object: &Value,
    descriptor: &Descriptor,
    format: &str,
    fields: &[Selector],
) -> EncodingResult<BTreeMap<String, String>> {
    let cursor = locate_fields(Cursor::new(object, descriptor, Format::parse(format)), fields)?;
    let value = cursor.value().ok_or(EncodingError::ObjectNotFound)?;

    let mut encoder = Encoder::default();
    let mut keypath = cursor.keypath().to_vec();
    encoder.encode(
        Some(value),
        cursor.declared(),
        &mut keypath,
        cursor.format().clone(),
    )?;
    trace!(format, pairs = encoder.pairs.len(), "Encoded object");
    Ok(encoder.pairs)
}

#[derive(Default)]
struct Encoder {
    pairs: BTreeMap<String, String>,
}

impl Encoder {
    fn encode(
        &mut self,
        value: Option<&Value>,
        descriptor: &Descriptor,
        keypath: &mut Vec<String>,
        mut format: Format,
    ) -> EncodingResult<()> {
        let declared = descriptor;
        let mut value = value;
        let mut descriptor = descriptor;
        while let Descriptor::Pointer(inner) = descriptor {
            value = value.filter(|v| !v.is_null());
            descriptor = inner;
        }

        let depth = keypath.len();
        while let Some(Segment::Literal(_)) = format.first() {
            if let Some(Segment::Literal(lit)) = format.pop_front() {
                keypath.push(lit);
            }
        }

        let result = match value {
            _ if format.is_empty() => {
                self.emit(keypath, value.unwrap_or(&Value::Null), declared)
            }
            None => Ok(()),
            Some(value) => match descriptor {
                Descriptor::Struct(s) => self.encode_struct(value, s, keypath, &format),
                Descriptor::Map(m) => self.encode_map(value, m, keypath, format),
                Descriptor::Sequence(_) => Err(EncodingError::NotImplemented("sequence layout")),
                _ => Err(EncodingError::ScalarType),
            },
        };
        keypath.truncate(depth);
        result
    }

    fn encode_struct(
        &mut self,
        value: &Value,
        descriptor: &StructDescriptor,
        keypath: &mut Vec<String>,
        format: &Format,
    ) -> EncodingResult<()> {
        match format.first() {
            Some(Segment::Key) => return Err(EncodingError::StructFormat),
            Some(Segment::Index) => return Err(EncodingError::NotImplemented("{index}")),
            _ => {}
        }
        let Value::Object(entries) = value else {
            return Err(EncodingError::MalformedValue(format!(
                "expected struct {}, found {value}",
                descriptor.name()
            )));
        };
        for field in descriptor.fields() {
            let zero;
            let field_value = match entries.get(field.name()) {
                Some(v) => v,
                None => {
                    zero = field.descriptor().zero();
                    &zero
                }
            };
            self.encode(Some(field_value), field.descriptor(), keypath, field.format()?)?;
        }
        Ok(())
    }

    fn encode_map(
        &mut self,
        value: &Value,
        descriptor: &MapDescriptor,
        keypath: &mut Vec<String>,
        mut format: Format,
    ) -> EncodingResult<()> {
        match format.pop_front() {
            Some(Segment::Key) => {}
            Some(Segment::Index) => return Err(EncodingError::NotImplemented("{index}")),
            _ => return Err(EncodingError::MapFormat),
        }
        let Value::Object(entries) = value else {
            return Err(EncodingError::MalformedValue(format!(
                "expected a map, found {value}"
            )));
        };
        for (key, entry) in entries {
            let component = codec::serialize_key(&codec::deserialize_key(key, descriptor.key())?);
            if component.contains('/') {
                return Err(EncodingError::InvalidMapKey {
                    segment: component,
                    reason: "a key component cannot contain '/'".to_string(),
                });
            }
            keypath.push(component);
            let result = self.encode(Some(entry), descriptor.value(), keypath, format.clone());
            keypath.pop();
            result?;
        }
        Ok(())
    }

    fn emit(&mut self, keypath: &[String], value: &Value, descriptor: &Descriptor) -> EncodingResult<()> {
        let key = keypath.join("/");
        if let Some(existing) = self.pairs.get(&key) {
            return Err(EncodingError::DuplicateKey {
                key,
                value: existing.clone(),
            });
        }
        let text = codec::serialize(value, descriptor)?;
        self.pairs.insert(key, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Describe;
    use crate::fields;
    use serde_json::json;
    use std::collections::HashMap;

    fn s1() -> Descriptor {
        StructDescriptor::new("S1")
            .field::<i64>("A")
            .field::<String>("B")
            .field::<f64>("C")
            .build()
    }

    fn s2() -> Descriptor {
        StructDescriptor::new("S2")
            .field_with_descriptor("A", Some("custom".into()), s1())
            .field_with_descriptor("B", Some("sub/".into()), s1())
            .build()
    }

    fn s3() -> Descriptor {
        StructDescriptor::new("S3")
            .field_with_format::<HashMap<String, String>>("A", "{key}/after")
            .field_with_descriptor(
                "B",
                Some("prev/{key}/".into()),
                Descriptor::Map(MapDescriptor::new(crate::descriptor::ScalarKind::I64, s1())),
            )
            .field_with_format::<HashMap<String, String>>("C", "C/{key}/")
            .build()
    }

    fn pairs(list: &[(&str, &str)]) -> BTreeMap<String, String> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn o1() -> Value {
        json!({"A": 1, "B": "test", "C": 3.3})
    }

    #[test]
    fn blob_and_recursive_struct() {
        assert_eq!(
            encode(&o1(), &s1(), "/here", &[]).unwrap(),
            pairs(&[("/here", r#"{"A":1,"B":"test","C":3.3}"#)])
        );
        assert_eq!(
            encode(&o1(), &s1(), "/here/", &[]).unwrap(),
            pairs(&[("/here/A", "1"), ("/here/B", "test"), ("/here/C", "3.3")])
        );
    }

    #[test]
    fn field_formats_and_sub_objects() {
        let o2 = json!({"A": o1(), "B": o1()});
        let sub = [
            ("/here/sub/A", "1"),
            ("/here/sub/B", "test"),
            ("/here/sub/C", "3.3"),
        ];
        let custom = ("/here/custom", r#"{"A":1,"B":"test","C":3.3}"#);

        let mut all = sub.to_vec();
        all.push(custom);
        assert_eq!(encode(&o2, &s2(), "/here/", &[]).unwrap(), pairs(&all));
        assert_eq!(encode(&o2, &s2(), "/here/", &fields!["B"]).unwrap(), pairs(&sub));
        assert_eq!(
            encode(&o2, &s2(), "/here/", &fields!["A"]).unwrap(),
            pairs(&[custom])
        );
    }

    #[test]
    fn maps() {
        let d = s3();
        let mut o = d.zero();
        assert!(encode(&o, &d, "/here/", &fields!["A"]).unwrap().is_empty());
        assert!(encode(&o, &d, "/here/", &fields!["B"]).unwrap().is_empty());
        assert!(encode(&o, &d, "/here/", &[]).unwrap().is_empty());

        o["B"]["1"] = json!({"A": 4, "B": "test2", "C": 3.5});
        assert!(encode(&o, &d, "/here/", &fields!["A"]).unwrap().is_empty());
        let mut expected = vec![
            ("/here/prev/1/A", "4"),
            ("/here/prev/1/B", "test2"),
            ("/here/prev/1/C", "3.5"),
        ];
        assert_eq!(encode(&o, &d, "/here/", &fields!["B"]).unwrap(), pairs(&expected));

        o["B"]["4"] = json!({"A": 0, "B": "test3", "C": 0.0});
        expected.extend([
            ("/here/prev/4/A", "0"),
            ("/here/prev/4/B", "test3"),
            ("/here/prev/4/C", "0.0"),
        ]);
        assert_eq!(encode(&o, &d, "/here/", &fields!["B"]).unwrap(), pairs(&expected));
        assert_eq!(encode(&o, &d, "/here/", &[]).unwrap(), pairs(&expected));

        o["A"]["nyu"] = json!("test6");
        expected.push(("/here/nyu/after", "test6"));
        assert_eq!(encode(&o, &d, "/here/", &[]).unwrap(), pairs(&expected));

        assert_eq!(
            encode(&o, &d, "/here/", &fields!["B", 1, "B"]).unwrap(),
            pairs(&[("/here/prev/1/B", "test2")])
        );
        assert_eq!(
            encode(&o, &d, "/here/", &fields!["B", 9]),
            Err(EncodingError::ObjectNotFound)
        );
    }

    #[test]
    fn absent_pointees() {
        let d = StructDescriptor::new("P")
            .field::<Option<i64>>("Blob")
            .field_with_descriptor(
                "Rec",
                Some("rec/".into()),
                Descriptor::Pointer(Box::new(s1())),
            )
            .build();
        let o = json!({"Blob": null, "Rec": null});
        assert_eq!(
            encode(&o, &d, "", &[]).unwrap(),
            pairs(&[("Blob", "null")])
        );

        let o = json!({"Blob": 3, "Rec": {"A": 1, "B": "", "C": 0.5}});
        assert_eq!(
            encode(&o, &d, "", &[]).unwrap(),
            pairs(&[
                ("Blob", "3"),
                ("rec/A", "1"),
                ("rec/B", ""),
                ("rec/C", "0.5")
            ])
        );
    }

    #[test]
    fn missing_fields_encode_as_zero() {
        assert_eq!(
            encode(&json!({"B": "x"}), &s1(), "k/", &[]).unwrap(),
            pairs(&[("k/A", "0"), ("k/B", "x"), ("k/C", "0.0")])
        );
    }

    #[test]
    fn duplicate_keys() {
        let d = StructDescriptor::new("Dup")
            .field_with_format::<i64>("A", "x")
            .field_with_format::<i64>("B", "x")
            .build();
        assert_eq!(
            encode(&json!({"A": 1, "B": 2}), &d, "/", &[]),
            Err(EncodingError::DuplicateKey {
                key: "/x".into(),
                value: "1".into()
            })
        );
    }

    #[test]
    fn scalar_cannot_be_recursive() {
        assert_eq!(
            encode(&json!(1), &i64::describe(), "/n/", &[]),
            Err(EncodingError::ScalarType)
        );
    }

    #[test]
    fn map_keys_cannot_span_components() {
        let d = HashMap::<String, i64>::describe();
        assert!(matches!(
            encode(&json!({"a/b": 1}), &d, "m/{key}", &[]),
            Err(EncodingError::InvalidMapKey { .. })
        ));
        assert_eq!(
            encode(&json!({"a/b": 1}), &d, "m", &[]).unwrap(),
            pairs(&[("m", r#"{"a/b":1}"#)])
        );
    }
}
