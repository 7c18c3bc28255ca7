//! Peripheral model shared by the dispatcher and the activity directory.
//!
//! A peripheral is anything the discovery pipeline can see: it has a unique
//! key, a kind tag, a proximity class and an accuracy estimate in meters.
//! Variants contribute their own wire fields through
//! [`Peripheral::write_fields`], so consumers never switch on the kind tag.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Tag for the iBeacon variant.
pub const KIND_IBEACON: &str = "ibeacon";

/// Tag for the generic variant.
pub const KIND_GENERIC: &str = "generic";

/// Kind tag of a peripheral.
///
/// Extensible: tags the core does not know are carried verbatim in
/// [`PeripheralKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PeripheralKind {
    /// A peripheral without variant specific identifiers.
    Generic,
    /// An Apple iBeacon advertising uuid/major/minor.
    IBeacon,
    /// Any other tag reported by the discovery pipeline.
    Other(String),
}

impl PeripheralKind {
    /// Returns the wire representation of the tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Generic => KIND_GENERIC,
            Self::IBeacon => KIND_IBEACON,
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for PeripheralKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            KIND_GENERIC => Self::Generic,
            KIND_IBEACON => Self::IBeacon,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for PeripheralKind {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<PeripheralKind> for String {
    fn from(kind: PeripheralKind) -> Self {
        match kind {
            PeripheralKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PeripheralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal proximity class reported by the radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    /// Within a few centimeters.
    Immediate,
    /// Within a couple of meters.
    Near,
    /// Further away but still in range.
    Far,
    /// The stack could not estimate the distance.
    Unknown,
}

impl Proximity {
    /// Returns the lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Near => "near",
            Self::Far => "far",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Proximity {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "near" => Ok(Self::Near),
            "far" => Ok(Self::Far),
            "unknown" => Ok(Self::Unknown),
            other => Err(PayloadError::UnknownProximity(other.to_string())),
        }
    }
}

/// Flat string mapping sent to subscribers.
///
/// Keys are kept sorted so that JSON bodies and query strings are
/// reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadFields(BTreeMap<String, String>);

impl PayloadFields {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no field has been written.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Capability set every detected device exposes.
pub trait Peripheral: Send + Sync + fmt::Debug {
    /// Stable identity of the device.
    fn unique_key(&self) -> &str;

    /// Kind tag.
    fn kind(&self) -> &PeripheralKind;

    /// Proximity class of the last sighting.
    fn proximity(&self) -> Proximity;

    /// Estimated distance in meters.
    fn accuracy(&self) -> f64;

    /// Writes the variant specific wire fields.
    ///
    /// The common fields (`name`, `kind`, `proximity`, `accuracy`) are
    /// written by the caller; implementations add only what their kind
    /// carries on top.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::KindMismatch`] when the declared kind requires
    /// fields this variant cannot supply.
    fn write_fields(&self, fields: &mut PayloadFields) -> Result<(), PayloadError> {
        let _ = fields;
        Ok(())
    }
}

/// Formats an accuracy estimate with exactly six fractional digits.
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{accuracy:.6}")
}

/// Peripheral with no identifiers beyond the common capability set.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericPeripheral {
    key: String,
    kind: PeripheralKind,
    proximity: Proximity,
    accuracy: f64,
}

impl GenericPeripheral {
    /// Creates a generic peripheral tagged [`PeripheralKind::Generic`].
    pub fn new(key: impl Into<String>, proximity: Proximity, accuracy: f64) -> Self {
        Self::with_kind(key, PeripheralKind::Generic, proximity, accuracy)
    }

    /// Creates a generic peripheral carrying an arbitrary kind tag.
    pub fn with_kind(
        key: impl Into<String>,
        kind: impl Into<PeripheralKind>,
        proximity: Proximity,
        accuracy: f64,
    ) -> Self {
        Self { key: key.into(), kind: kind.into(), proximity, accuracy }
    }
}

impl Peripheral for GenericPeripheral {
    fn unique_key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> &PeripheralKind {
        &self.kind
    }

    fn proximity(&self) -> Proximity {
        self.proximity
    }

    fn accuracy(&self) -> f64 {
        self.accuracy
    }

    fn write_fields(&self, _fields: &mut PayloadFields) -> Result<(), PayloadError> {
        // An iBeacon tag promises uuid/major/minor, which this variant lacks.
        if self.kind == PeripheralKind::IBeacon {
            return Err(PayloadError::KindMismatch {
                key: self.key.clone(),
                kind: self.kind.to_string(),
            });
        }
        Ok(())
    }
}

/// iBeacon advertisement.
#[derive(Debug, Clone, PartialEq)]
pub struct IBeaconPeripheral {
    key: String,
    kind: PeripheralKind,
    uuid: String,
    major: u16,
    minor: u16,
    proximity: Proximity,
    accuracy: f64,
}

impl IBeaconPeripheral {
    /// Creates a beacon keyed by `uuid-major-minor`.
    pub fn new(
        uuid: impl Into<String>,
        major: u16,
        minor: u16,
        proximity: Proximity,
        accuracy: f64,
    ) -> Self {
        let uuid = uuid.into();
        let key = format!("{uuid}-{major}-{minor}");

        Self { key, kind: PeripheralKind::IBeacon, uuid, major, minor, proximity, accuracy }
    }

    /// Proximity UUID.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Major group identifier.
    pub fn major(&self) -> u16 {
        self.major
    }

    /// Minor identifier within the group.
    pub fn minor(&self) -> u16 {
        self.minor
    }
}

impl Peripheral for IBeaconPeripheral {
    fn unique_key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> &PeripheralKind {
        &self.kind
    }

    fn proximity(&self) -> Proximity {
        self.proximity
    }

    fn accuracy(&self) -> f64 {
        self.accuracy
    }

    fn write_fields(&self, fields: &mut PayloadFields) -> Result<(), PayloadError> {
        fields.insert("uuid", self.uuid.clone());
        fields.insert("major", self.major.to_string());
        fields.insert("minor", self.minor.to_string());
        Ok(())
    }
}
