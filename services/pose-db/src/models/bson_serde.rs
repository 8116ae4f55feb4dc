//! Serde helpers mapping model fields onto their stored BSON representation.
//!
//! Identifiers are written as binary subtype 4 (standard UUID) and timestamps
//! as BSON datetimes holding the store-local wall clock. Readers accept the
//! stored form as well as plain strings, so JSON input parses too.

use bson::spec::BinarySubtype;
use bson::Bson;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Model identifiers are random (version 4) UUIDs
fn uuid_from_bson<E: serde::de::Error>(value: Bson) -> Result<Uuid, E> {
    let uuid = match value {
        Bson::Binary(binary)
            if matches!(binary.subtype, BinarySubtype::Uuid | BinarySubtype::UuidOld) =>
        {
            Uuid::from_slice(&binary.bytes).map_err(E::custom)?
        }
        Bson::String(s) => Uuid::parse_str(&s).map_err(E::custom)?,
        other => {
            return Err(E::custom(format!(
                "expected UUID, found {:?}",
                other.element_type()
            )))
        }
    };

    match uuid.get_version_num() {
        4 => Ok(uuid),
        version => Err(E::custom(format!(
            "expected version 4 UUID, found version {version}: {uuid}"
        ))),
    }
}

pub mod uuid_as_binary {
    use super::*;

    pub fn serialize<S>(uuid: &Uuid, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bson::Uuid::from_bytes(uuid.into_bytes()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Uuid, D::Error>
    where
        D: Deserializer<'de>,
    {
        uuid_from_bson(Bson::deserialize(deserializer)?)
    }
}

pub mod uuid_vec_as_binary {
    use super::*;

    pub fn serialize<S>(uuids: &[Uuid], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let binary: Vec<bson::Uuid> = uuids
            .iter()
            .map(|uuid| bson::Uuid::from_bytes(uuid.into_bytes()))
            .collect();
        binary.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Uuid>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<Bson>::deserialize(deserializer)?
            .into_iter()
            .map(uuid_from_bson)
            .collect()
    }
}

/// Naive (zone-less) timestamps stored as BSON datetimes.
///
/// BSON datetimes hold whole milliseconds; finer precision is truncated on write.
pub mod naive_as_bson_datetime {
    use super::*;

    pub fn serialize<S>(naive: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bson::DateTime::from_chrono(naive.and_utc()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Bson::deserialize(deserializer)? {
            Bson::DateTime(dt) => Ok(dt.to_chrono().naive_utc()),
            Bson::String(s) => parse_naive(&s).map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "expected datetime, found {:?}",
                other.element_type()
            ))),
        }
    }

    fn parse_naive(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        // An explicit offset is dropped: the wall clock is already store-local.
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.naive_local())
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
    }
}

/// Calendar dates always written as `YYYY-MM-DD`
pub mod date_ymd {
    use super::*;

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "uuid_as_binary")]
        id: Uuid,
        #[serde(with = "uuid_vec_as_binary")]
        ids: Vec<Uuid>,
        #[serde(with = "naive_as_bson_datetime")]
        at: NaiveDateTime,
        #[serde(with = "date_ymd")]
        day: NaiveDate,
    }

    fn sample() -> Sample {
        Sample {
            id: Uuid::new_v4(),
            ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            at: NaiveDate::from_ymd_opt(2023, 6, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            day: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        }
    }

    #[test]
    fn test_stored_representation() {
        let value = sample();
        let document = bson::to_document(&value).unwrap();

        match document.get("id") {
            Some(Bson::Binary(binary)) => {
                assert_eq!(binary.subtype, BinarySubtype::Uuid);
                assert_eq!(binary.bytes, value.id.as_bytes().to_vec());
            }
            other => panic!("expected binary id, got {other:?}"),
        }
        assert_eq!(
            document.get_datetime("at").unwrap().to_chrono().naive_utc(),
            value.at
        );
        assert_eq!(document.get_str("day").unwrap(), "2023-06-01");

        let decoded: Sample = bson::from_document(document).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_reads_plain_strings() {
        let id = Uuid::new_v4();
        let document = doc! {
            "id": id.to_string(),
            "ids": [id.to_string()],
            "at": "2023-06-01T09:30:00",
            "day": "2023-06-01",
        };

        let decoded: Sample = bson::from_document(document).unwrap();
        assert_eq!(decoded.id, id);
        assert_eq!(decoded.ids, vec![id]);
        assert_eq!(decoded.at.to_string(), "2023-06-01 09:30:00");
    }

    #[test]
    fn test_rejects_non_random_uuid() {
        // Version 1 (time based)
        let document = doc! {
            "id": "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
            "ids": [],
            "at": "2023-06-01T09:30:00",
            "day": "2023-06-01",
        };
        assert!(bson::from_document::<Sample>(document).is_err());

        let document = doc! {
            "id": Uuid::new_v4().to_string(),
            "ids": [bson::Uuid::from_bytes(Uuid::nil().into_bytes())],
            "at": "2023-06-01T09:30:00",
            "day": "2023-06-01",
        };
        assert!(bson::from_document::<Sample>(document).is_err());
    }

    #[test]
    fn test_timestamps_stored_to_the_millisecond() {
        let mut value = sample();
        value.at += chrono::Duration::microseconds(1_500);
        let document = bson::to_document(&value).unwrap();

        let decoded: Sample = bson::from_document(document).unwrap();
        assert_eq!(decoded.at, value.at - chrono::Duration::microseconds(500));
    }

    #[test]
    fn test_rejects_malformed_uuid() {
        let document = doc! {
            "id": "not-a-uuid",
            "ids": [],
            "at": "2023-06-01T09:30:00",
            "day": "2023-06-01",
        };

        assert!(bson::from_document::<Sample>(document).is_err());
    }
}
