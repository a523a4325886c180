//! Data records for every persisted entity, plus the allow-listed payloads
//! handlers accept when creating or changing them.
//!
//! Records are plain structs decoded by `sqlx::FromRow` and serialized with
//! `serde`; they carry no database handle. Payloads keep loosely typed JSON
//! values until validation so that bad input produces field-keyed errors
//! instead of a deserializer failure.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Violations;
use crate::filter::parse_datetime;

/// Define a closed set of string choices stored as TEXT.
macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::InvalidChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::InvalidChoice(other.to_string())),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::InvalidChoice;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

mod energy;
mod item;
mod plant;
mod sensor;
mod sensor_data;
mod user;

pub use energy::{DailyEnergy, EnergyConsumption, EnergyPayload, SensorEnergyCost};
pub use item::{Item, ItemPayload, NewItem};
pub use plant::{NewPlant, Plant, PlantPayload};
pub use sensor::{NewSensor, Sensor, SensorPayload};
pub use sensor_data::{NewSensorData, SensorData, SensorDataPayload, SensorDataView};
pub use user::{
    normalize_email, LoginRequest, ProfileUpdate, RegisterRequest, Role, User, UserProfile,
};

// ---

/// Maximum length of short text columns.
pub const MAX_CHAR_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
#[error("\"{0}\" is not a valid choice.")]
pub struct InvalidChoice(pub String);

/// Deserialize a field so that an explicit `null` (`Some(None)`) can be told
/// apart from an absent key (`None`). Use with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Validate a text field: trimmed, non-blank, at most `MAX_CHAR_LEN` chars.
pub(crate) fn text(v: &mut Violations, field: &str, value: Option<String>) -> Option<String> {
    // ---
    let value = value?.trim().to_string();
    if value.is_empty() {
        v.add(field, "This field may not be blank.");
        return None;
    }
    if value.chars().count() > MAX_CHAR_LEN {
        v.add(
            field,
            format!("Ensure this field has no more than {} characters.", MAX_CHAR_LEN),
        );
        return None;
    }
    Some(value)
}

/// Validate a choice field against `T`'s accepted values.
pub(crate) fn choice<T>(v: &mut Violations, field: &str, value: Option<String>) -> Option<T>
where
    T: std::str::FromStr<Err = InvalidChoice>,
{
    match value?.trim().parse::<T>() {
        Ok(choice) => Some(choice),
        Err(err) => {
            v.add(field, err.to_string());
            None
        }
    }
}

/// Primary-key reference given as a JSON number or numeric string.
pub(crate) fn pk(v: &mut Violations, field: &str, value: &Value) -> Option<i64> {
    // ---
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        v.add(field, "Incorrect type. Expected pk value.");
    }
    parsed
}

/// Non-negative count that fits an INTEGER column.
pub(crate) fn count(v: &mut Violations, field: &str, value: &Value) -> Option<i32> {
    // ---
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        None => {
            v.add(field, "A valid integer is required.");
            None
        }
        Some(n) if n < 0 => {
            v.add(field, "Ensure this value is greater than or equal to 0.");
            None
        }
        Some(n) => match i32::try_from(n) {
            Ok(n) => Some(n),
            Err(_) => {
                v.add(field, "Ensure this value is less than or equal to 2147483647.");
                None
            }
        },
    }
}

/// NUMERIC(10,2) value: at most 8 integer digits and 2 decimal places.
pub(crate) fn decimal(v: &mut Violations, field: &str, value: &Value) -> Option<BigDecimal> {
    // ---
    let parsed = match value {
        Value::Number(n) => n.to_string().parse::<BigDecimal>().ok(),
        Value::String(s) => s.trim().parse::<BigDecimal>().ok(),
        _ => None,
    };
    let Some(parsed) = parsed else {
        v.add(field, "A valid number is required.");
        return None;
    };

    let normalized = parsed.normalized();
    let (_, scale) = normalized.as_bigint_and_exponent();
    if scale > 2 {
        v.add(field, "Ensure that there are no more than 2 decimal places.");
        return None;
    }
    if normalized.abs() >= BigDecimal::from(100_000_000i64) {
        v.add(
            field,
            "Ensure that there are no more than 8 digits before the decimal point.",
        );
        return None;
    }
    Some(normalized.with_scale(2))
}

pub(crate) fn boolean(v: &mut Violations, field: &str, value: &Value) -> Option<bool> {
    // ---
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    if parsed.is_none() {
        v.add(field, "Must be a valid boolean.");
    }
    parsed
}

/// ISO-8601 datetime; naive values are read in the reference timezone.
pub(crate) fn datetime(
    v: &mut Violations,
    field: &str,
    value: &Value,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    // ---
    let parsed = value.as_str().and_then(|s| parse_datetime(s, tz));
    if parsed.is_none() {
        v.add(
            field,
            "Datetime has wrong format. Use one of these formats instead: YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].",
        );
    }
    parsed
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_trims_and_limits_length() {
        // ---
        let mut v = Violations::new();
        assert_eq!(text(&mut v, "name", Some("  Line 1 ".into())), Some("Line 1".into()));
        assert_eq!(text(&mut v, "name", None), None);
        assert!(v.finish().is_ok());

        let mut v = Violations::new();
        assert_eq!(text(&mut v, "name", Some("   ".into())), None);
        assert_eq!(text(&mut v, "location", Some("x".repeat(256))), None);
        assert!(v.finish().is_err());
    }

    #[test]
    fn test_pk_accepts_numbers_and_numeric_strings() {
        // ---
        let mut v = Violations::new();
        assert_eq!(pk(&mut v, "plant", &json!(7)), Some(7));
        assert_eq!(pk(&mut v, "plant", &json!(" 12 ")), Some(12));
        assert!(v.finish().is_ok());

        let mut v = Violations::new();
        assert_eq!(pk(&mut v, "plant", &json!("seven")), None);
        assert_eq!(pk(&mut v, "plant", &json!(true)), None);
        assert!(v.finish().is_err());
    }

    #[test]
    fn test_count_rejects_negative_and_overflow() {
        // ---
        let mut v = Violations::new();
        assert_eq!(count(&mut v, "items_scanned", &json!(0)), Some(0));
        assert_eq!(count(&mut v, "items_scanned", &json!("42")), Some(42));
        assert!(v.finish().is_ok());

        let mut v = Violations::new();
        assert_eq!(count(&mut v, "items_scanned", &json!(-1)), None);
        assert_eq!(count(&mut v, "items_scanned", &json!(3_000_000_000i64)), None);
        assert_eq!(count(&mut v, "items_scanned", &json!(1.5)), None);
        assert!(v.finish().is_err());
    }

    #[test]
    fn test_decimal_enforces_numeric_10_2() {
        // ---
        let mut v = Violations::new();
        let d = decimal(&mut v, "energy_kwh", &json!(12.5)).unwrap();
        assert_eq!(d.to_string(), "12.50");
        let d = decimal(&mut v, "energy_kwh", &json!("99999999.99")).unwrap();
        assert_eq!(d.to_string(), "99999999.99");
        let d = decimal(&mut v, "energy_kwh", &json!("3.100")).unwrap();
        assert_eq!(d.to_string(), "3.10");
        assert!(v.finish().is_ok());

        let mut v = Violations::new();
        assert!(decimal(&mut v, "energy_kwh", &json!("1.234")).is_none());
        assert!(decimal(&mut v, "energy_kwh", &json!(100_000_000)).is_none());
        assert!(decimal(&mut v, "energy_kwh", &json!("lots")).is_none());
        assert!(v.finish().is_err());
    }

    #[test]
    fn test_boolean_accepts_common_spellings() {
        // ---
        let mut v = Violations::new();
        assert_eq!(boolean(&mut v, "is_active", &json!(false)), Some(false));
        assert_eq!(boolean(&mut v, "is_active", &json!("true")), Some(true));
        assert_eq!(boolean(&mut v, "is_active", &json!(0)), Some(false));
        assert!(v.finish().is_ok());

        let mut v = Violations::new();
        assert_eq!(boolean(&mut v, "is_active", &json!("maybe")), None);
        assert!(v.finish().is_err());
    }

    #[test]
    fn test_nullable_distinguishes_null_from_absent() {
        // ---
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "nullable")]
            description: Option<Option<String>>,
        }

        let absent: Patch = serde_json::from_value(json!({})).unwrap();
        let null: Patch = serde_json::from_value(json!({ "description": null })).unwrap();
        let set: Patch = serde_json::from_value(json!({ "description": "bins" })).unwrap();

        assert_eq!(absent.description, None);
        assert_eq!(null.description, Some(None));
        assert_eq!(set.description, Some(Some("bins".to_string())));
    }
}
