use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

pub const PHOTO_SEPARATOR: char = ',';

/// Backend identifier of a stored incident. The backend may send it as a
/// JSON number; it is always kept and sent back as a string.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct IncidentId(String);

impl IncidentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for IncidentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Unsigned(n) => Self(n.to_string()),
            Raw::Signed(n) => Self(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("unknown incident field '{0}'")]
    Unknown(String),
}

/// The editable properties of an incident, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncidentField {
    DriverName,
    TruckId,
    ShipmentReference,
    TypeOfDamage,
    DamageDescription,
    Severity,
    GoodsAffected,
    CauseOfDamage,
    Witnesses,
    Photos,
    AdditionalComments,
}

impl IncidentField {
    pub const ALL: [IncidentField; 11] = [
        Self::DriverName,
        Self::TruckId,
        Self::ShipmentReference,
        Self::TypeOfDamage,
        Self::DamageDescription,
        Self::Severity,
        Self::GoodsAffected,
        Self::CauseOfDamage,
        Self::Witnesses,
        Self::Photos,
        Self::AdditionalComments,
    ];

    /// Wire name, as used in the backend JSON.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DriverName => "driverName",
            Self::TruckId => "truckId",
            Self::ShipmentReference => "shipmentReference",
            Self::TypeOfDamage => "typeOfDamage",
            Self::DamageDescription => "damageDescription",
            Self::Severity => "severity",
            Self::GoodsAffected => "goodsAffected",
            Self::CauseOfDamage => "causeOfDamage",
            Self::Witnesses => "witnesses",
            Self::Photos => "photos",
            Self::AdditionalComments => "additionalComments",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DriverName => "Driver Name",
            Self::TruckId => "Truck ID",
            Self::ShipmentReference => "Shipment Reference",
            Self::TypeOfDamage => "Type of Damage",
            Self::DamageDescription => "Damage Description",
            Self::Severity => "Severity",
            Self::GoodsAffected => "Goods Affected",
            Self::CauseOfDamage => "Cause of Damage",
            Self::Witnesses => "Witnesses",
            Self::Photos => "Photos (URLs or Base64)",
            Self::AdditionalComments => "Additional Comments",
        }
    }

    /// Text area height for long-form fields; `None` renders a single line.
    #[must_use]
    pub const fn multiline_rows(self) -> Option<u8> {
        match self {
            Self::DamageDescription => Some(4),
            Self::AdditionalComments => Some(3),
            Self::GoodsAffected | Self::Witnesses => Some(2),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, FieldError> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| FieldError::Unknown(name.to_owned()))
    }
}

impl FromStr for IncidentField {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for IncidentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A damage report as exchanged with the backend.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IncidentId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub driver_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub truck_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub shipment_reference: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub type_of_damage: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub damage_description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub severity: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub goods_affected: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cause_of_damage: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub witnesses: String,
    /// Comma-delimited photo tokens, kept flat for display.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub photos: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub additional_comments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_and_time: Option<String>,
}

// Redact debug output because this can contain personal data (drivers, witnesses).
impl fmt::Debug for IncidentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncidentRecord")
            .field("id", &self.id)
            .field("truck_id", &self.truck_id)
            .field("shipment_reference", &self.shipment_reference)
            .field("severity", &self.severity)
            .field("driver_name_present", &!self.driver_name.is_empty())
            .field("witnesses_present", &!self.witnesses.is_empty())
            .field("photo_count", &self.photo_tokens().count())
            .field("date_and_time", &self.date_and_time)
            .finish_non_exhaustive()
    }
}

impl IncidentRecord {
    #[must_use]
    pub fn field(&self, field: IncidentField) -> &str {
        match field {
            IncidentField::DriverName => &self.driver_name,
            IncidentField::TruckId => &self.truck_id,
            IncidentField::ShipmentReference => &self.shipment_reference,
            IncidentField::TypeOfDamage => &self.type_of_damage,
            IncidentField::DamageDescription => &self.damage_description,
            IncidentField::Severity => &self.severity,
            IncidentField::GoodsAffected => &self.goods_affected,
            IncidentField::CauseOfDamage => &self.cause_of_damage,
            IncidentField::Witnesses => &self.witnesses,
            IncidentField::Photos => &self.photos,
            IncidentField::AdditionalComments => &self.additional_comments,
        }
    }

    fn field_mut(&mut self, field: IncidentField) -> &mut String {
        match field {
            IncidentField::DriverName => &mut self.driver_name,
            IncidentField::TruckId => &mut self.truck_id,
            IncidentField::ShipmentReference => &mut self.shipment_reference,
            IncidentField::TypeOfDamage => &mut self.type_of_damage,
            IncidentField::DamageDescription => &mut self.damage_description,
            IncidentField::Severity => &mut self.severity,
            IncidentField::GoodsAffected => &mut self.goods_affected,
            IncidentField::CauseOfDamage => &mut self.cause_of_damage,
            IncidentField::Witnesses => &mut self.witnesses,
            IncidentField::Photos => &mut self.photos,
            IncidentField::AdditionalComments => &mut self.additional_comments,
        }
    }

    /// Replaces one property verbatim. No trimming, coercion or limits.
    pub fn set_field(&mut self, field: IncidentField, value: impl Into<String>) {
        *self.field_mut(field) = value.into();
    }

    pub fn photo_tokens(&self) -> impl Iterator<Item = &str> {
        self.photos
            .split(PHOTO_SEPARATOR)
            .filter(|token| !token.trim().is_empty())
    }

    /// Appends stored-photo tokens after any existing ones and returns how
    /// many were appended. Tokens that would break the list (blank, or
    /// containing the separator) are dropped.
    pub fn append_photos<I, S>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let accepted: Vec<String> = tokens
            .into_iter()
            .filter_map(|token| {
                let token = token.as_ref();
                if is_valid_photo_token(token) {
                    Some(token.to_owned())
                } else {
                    warn!(token, "dropping malformed photo token");
                    None
                }
            })
            .collect();

        if accepted.is_empty() {
            return 0;
        }

        let joined = accepted.join(",");
        if self.photos.is_empty() {
            self.photos = joined;
        } else {
            self.photos.push(PHOTO_SEPARATOR);
            self.photos.push_str(&joined);
        }

        accepted.len()
    }

    /// Copy carrying the submission timestamp (`YYYY-MM-DDTHH:MM:SS.sssZ`).
    #[must_use]
    pub fn stamped(&self, now: DateTime<Utc>) -> Self {
        Self {
            date_and_time: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ..self.clone()
        }
    }
}

fn is_valid_photo_token(token: &str) -> bool {
    !token.trim().is_empty() && !token.contains(PHOTO_SEPARATOR)
}

/// Whether the form writes a new record or overwrites an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormMode {
    #[default]
    Create,
    Edit(IncidentId),
}

impl FormMode {
    pub fn incident_id(&self) -> Option<&IncidentId> {
        match self {
            Self::Create => None,
            Self::Edit(id) => Some(id),
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, Self::Edit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::collection::vec;
    use proptest::prelude::*;

    fn sample_record() -> IncidentRecord {
        let mut record = IncidentRecord {
            id: Some(IncidentId::new("7")),
            date_and_time: Some("2024-01-01T00:00:00.000Z".into()),
            ..IncidentRecord::default()
        };
        for field in IncidentField::ALL {
            record.set_field(field, format!("{}-value", field.name()));
        }
        record
    }

    #[test]
    fn field_names_round_trip() {
        for field in IncidentField::ALL {
            assert_eq!(IncidentField::from_name(field.name()), Ok(field));
            assert_eq!(
                serde_json::to_string(&field).unwrap(),
                format!("\"{}\"", field.name())
            );
        }
        assert_eq!(
            "dateAndTime".parse::<IncidentField>(),
            Err(FieldError::Unknown("dateAndTime".into()))
        );
    }

    #[test]
    fn serializes_with_backend_keys() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["driverName"], "driverName-value");
        assert_eq!(json["typeOfDamage"], "typeOfDamage-value");
        assert_eq!(json["dateAndTime"], "2024-01-01T00:00:00.000Z");

        let fresh = serde_json::to_value(IncidentRecord::default()).unwrap();
        assert!(fresh.get("id").is_none());
        assert!(fresh.get("dateAndTime").is_none());
        assert_eq!(fresh["photos"], "");
    }

    #[test]
    fn deserializes_numeric_id_and_nulls() {
        let record: IncidentRecord = serde_json::from_str(
            r#"{"id": 42, "driverName": "Bob", "witnesses": null, "photos": "p1.jpg"}"#,
        )
        .unwrap();
        assert_eq!(record.id, Some(IncidentId::new("42")));
        assert_eq!(record.driver_name, "Bob");
        assert_eq!(record.witnesses, "");
        assert_eq!(record.truck_id, "");
        assert_eq!(record.photos, "p1.jpg");
    }

    #[test]
    fn append_to_empty_and_existing() {
        let mut record = IncidentRecord::default();
        assert_eq!(record.append_photos(["p1.jpg"]), 1);
        assert_eq!(record.photos, "p1.jpg");

        assert_eq!(record.append_photos(["p2.jpg", "p3.jpg"]), 2);
        assert_eq!(record.photos, "p1.jpg,p2.jpg,p3.jpg");
    }

    #[test]
    fn append_drops_malformed_tokens() {
        let mut record = IncidentRecord::default();
        assert_eq!(record.append_photos(["", "a,b", "  ", "ok.jpg"]), 1);
        assert_eq!(record.photos, "ok.jpg");

        let nothing: [&str; 0] = [];
        assert_eq!(record.append_photos(nothing), 0);
        assert_eq!(record.photos, "ok.jpg");
    }

    #[test]
    fn stamped_uses_millisecond_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let stamped = sample_record().stamped(now);
        assert_eq!(stamped.date_and_time.as_deref(), Some("2024-03-05T14:07:09.000Z"));
        assert_eq!(stamped.driver_name, "driverName-value");
    }

    #[test]
    fn debug_redacts_personal_fields() {
        let debug = format!("{:?}", sample_record());
        assert!(!debug.contains("driverName-value"));
        assert!(!debug.contains("witnesses-value"));
        assert!(debug.contains("truckId-value"));
    }

    #[test]
    fn form_mode_accessors() {
        assert_eq!(FormMode::Create.incident_id(), None);
        let edit = FormMode::Edit(IncidentId::new("9"));
        assert!(edit.is_edit());
        assert_eq!(edit.incident_id().map(IncidentId::as_str), Some("9"));
    }

    proptest! {
        #[test]
        fn set_field_only_touches_named_field(idx in 0usize..IncidentField::ALL.len(), value in ".*") {
            let field = IncidentField::ALL[idx];
            let before = sample_record();
            let mut record = before.clone();

            record.set_field(field, value.clone());

            prop_assert_eq!(record.field(field), value.as_str());
            for other in IncidentField::ALL.into_iter().filter(|f| *f != field) {
                prop_assert_eq!(record.field(other), before.field(other));
            }
            prop_assert_eq!(&record.id, &before.id);
            prop_assert_eq!(&record.date_and_time, &before.date_and_time);
        }

        #[test]
        fn append_adds_exactly_the_returned_tokens(
            existing in vec("[a-z0-9]{1,8}\\.jpg", 0..5),
            returned in vec("[a-z0-9]{1,8}\\.jpg", 0..5),
        ) {
            let mut record = IncidentRecord { photos: existing.join(","), ..IncidentRecord::default() };

            let appended = record.append_photos(&returned);

            prop_assert_eq!(appended, returned.len());
            let tokens: Vec<&str> = record.photo_tokens().collect();
            let expected: Vec<&str> = existing.iter().chain(returned.iter()).map(String::as_str).collect();
            prop_assert_eq!(tokens, expected);
        }
    }
}
