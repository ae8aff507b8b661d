//! Types for app users and the editable profile properties.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{ProfileSyncError, Result};

/// Names of the user properties that may be read from or written to the remote profile.
pub const EDITABLE_PROPERTIES: [&str; 5] = [
    "givenName",
    "surname",
    "email",
    "signedUpAt",
    "properties",
];

// ─────────────────────────────────────────────────────────────────────────────
// Editable Fields
// ─────────────────────────────────────────────────────────────────────────────

/// A user property that is part of the editable allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditableField {
    GivenName,
    Surname,
    Email,
    SignedUpAt,
    /// Free-form custom properties, merged per top-level key.
    Properties,
}

impl EditableField {
    pub const ALL: [EditableField; 5] = [
        EditableField::GivenName,
        EditableField::Surname,
        EditableField::Email,
        EditableField::SignedUpAt,
        EditableField::Properties,
    ];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        EDITABLE_PROPERTIES[*self as usize]
    }

    /// Whether `value` has a shape this field can hold. `null` clears any field.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            EditableField::GivenName | EditableField::Surname | EditableField::Email => {
                matches!(value, Value::Null | Value::String(_))
            }
            // ISO-8601 string or epoch timestamp
            EditableField::SignedUpAt => {
                matches!(value, Value::Null | Value::String(_) | Value::Number(_))
            }
            EditableField::Properties => matches!(value, Value::Null | Value::Object(_)),
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            EditableField::SignedUpAt => "a string or a number",
            EditableField::Properties => "an object",
            _ => "a string",
        }
    }

    /// Look up a field by wire name. Returns `None` for anything outside the allowlist.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == key)
    }
}

impl std::fmt::Display for EditableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// App User
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of the app user as known to the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    /// Server-assigned identifier. `None` until the user exists remotely.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Sign-up time, either an ISO-8601 string or an epoch timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_up_at: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Server fields this client does not edit; carried through merges untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppUser {
    /// Create a user with the given identifier and no profile data.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Current value of an editable field as JSON. Missing values are `null`.
    pub fn field_value(&self, field: EditableField) -> Value {
        let text = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
        match field {
            EditableField::GivenName => text(&self.given_name),
            EditableField::Surname => text(&self.surname),
            EditableField::Email => text(&self.email),
            EditableField::SignedUpAt => self.signed_up_at.clone().unwrap_or(Value::Null),
            EditableField::Properties => Value::Object(self.properties.clone()),
        }
    }

    /// Return a copy of this user with `props` applied.
    ///
    /// Scalar fields are replaced; `properties` is merged shallowly so keys not
    /// present in `props` keep their current value. Fails only for props that
    /// do not pass [`UserProps::validate`].
    pub fn merged_with(&self, props: &UserProps) -> Result<AppUser> {
        let mut value = serde_json::to_value(self)?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| ProfileSyncError::invalid_request("user is not a JSON object"))?;

        for (field, proposed) in props.iter() {
            match field {
                EditableField::Properties => {
                    let merged = merge_properties(&self.properties, proposed)?;
                    object.insert(field.as_str().to_string(), Value::Object(merged));
                }
                _ => {
                    object.insert(field.as_str().to_string(), proposed.clone());
                }
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}

fn merge_properties(current: &Map<String, Value>, proposed: &Value) -> Result<Map<String, Value>> {
    let mut merged = current.clone();
    match proposed {
        Value::Null => {}
        Value::Object(patch) => {
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
        }
        other => {
            return Err(ProfileSyncError::invalid_request(format!(
                "properties must be an object, got {}",
                other
            )))
        }
    }
    Ok(merged)
}

// ─────────────────────────────────────────────────────────────────────────────
// User Props
// ─────────────────────────────────────────────────────────────────────────────

/// A set of proposed values for editable user fields.
///
/// Keys are restricted to [`EditableField`], so anything outside the allowlist is
/// dropped when a `UserProps` is built from arbitrary JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct UserProps(BTreeMap<EditableField, Value>);

impl UserProps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build props from a JSON value. Non-object values are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ProfileSyncError::invalid_request(format!(
                "user props must be an object, got {}",
                other
            ))),
        }
    }

    /// Set a field, replacing any previous value.
    pub fn with(mut self, field: EditableField, value: impl Into<Value>) -> Self {
        self.0.insert(field, value.into());
        self
    }

    pub fn given_name(self, value: impl Into<String>) -> Self {
        self.with(EditableField::GivenName, value.into())
    }

    pub fn surname(self, value: impl Into<String>) -> Self {
        self.with(EditableField::Surname, value.into())
    }

    pub fn email(self, value: impl Into<String>) -> Self {
        self.with(EditableField::Email, value.into())
    }

    pub fn signed_up_at(self, value: impl Into<Value>) -> Self {
        self.with(EditableField::SignedUpAt, value)
    }

    pub fn properties(self, value: Map<String, Value>) -> Self {
        self.with(EditableField::Properties, Value::Object(value))
    }

    pub fn get(&self, field: EditableField) -> Option<&Value> {
        self.0.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EditableField, &Value)> {
        self.0.iter().map(|(field, value)| (*field, value))
    }

    /// Overlay `other` on top of `self`. Later values win per field.
    pub fn merge(&mut self, other: &UserProps) {
        for (field, value) in other.iter() {
            self.0.insert(field, value.clone());
        }
    }

    /// Return `self` overlaid with `other`.
    pub fn merged(&self, other: &UserProps) -> UserProps {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Fields whose proposed value differs from the user's current value.
    pub fn dirty_fields(&self, user: &AppUser) -> Vec<EditableField> {
        self.iter()
            .filter(|(field, proposed)| user.field_value(*field) != **proposed)
            .map(|(field, _)| field)
            .collect()
    }

    /// Check that every value has a shape its field can hold.
    pub fn validate(&self) -> Result<()> {
        match self.iter().find(|(field, value)| !field.accepts(value)) {
            Some((field, value)) => Err(ProfileSyncError::invalid_request(format!(
                "{} must be {}, got {}",
                field,
                field.expected(),
                value
            ))),
            None => Ok(()),
        }
    }
}

impl From<Map<String, Value>> for UserProps {
    fn from(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .filter_map(|(key, value)| EditableField::from_key(&key).map(|field| (field, value)))
            .collect();
        Self(fields)
    }
}

impl From<UserProps> for Map<String, Value> {
    fn from(props: UserProps) -> Self {
        props
            .0
            .into_iter()
            .map(|(field, value)| (field.as_str().to_string(), value))
            .collect()
    }
}
