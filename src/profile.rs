//! Device profiles
//!
//! A [`DeviceProfile`] bundles everything the polling engine needs to know
//! about one device family: how logical slots map to registers, how values
//! are encoded, how hard to retry, and whether a sentinel pre-flight read
//! gates each batch. Profiles are plain data, loadable from YAML or JSON,
//! and the known device families ship as preset constructors.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::AddressScheme;
use crate::codec::{ByteOrder, MissingValuePolicy, WordOrder};
use crate::error::{ToolboxError, ToolboxResult};

/// Default attempt budget per register operation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
/// Default pause between attempts, in milliseconds
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

// ============================================================================
// Retry policy
// ============================================================================

/// Bounded retry with a fixed pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per operation (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed pause between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }

    /// Pause between attempts as a `Duration`
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

// ============================================================================
// Device profile
// ============================================================================

/// How a slot's raw registers turn into a typed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeKind {
    /// IEEE-754 float across two registers, order per profile
    Float32,
    /// Two-register `int.frac` decimal
    FixedPoint,
    /// Single coil / discrete input
    Boolean,
}

impl DecodeKind {
    /// Registers one logical slot occupies on the wire
    pub fn words_per_value(&self) -> u16 {
        match self {
            DecodeKind::Float32 | DecodeKind::FixedPoint => 2,
            DecodeKind::Boolean => 1,
        }
    }
}

/// Everything the engine needs to know about one device family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Display name for logs
    pub name: String,
    /// Logical-slot to raw-address mapping
    pub scheme: AddressScheme,
    /// Byte order inside each register
    #[serde(default)]
    pub byte_order: ByteOrder,
    /// Register order for 32-bit values
    #[serde(default)]
    pub word_order: WordOrder,
    /// Value encoding for this family's slots
    pub decode_kind: DecodeKind,
    /// Handling of registers missing from a short response
    #[serde(default)]
    pub missing_value_policy: MissingValuePolicy,
    /// Gate each batch poll on a pre-flight read of `sentinel_address`
    #[serde(default)]
    pub require_sentinel: bool,
    /// Raw address probed by the sentinel pre-flight
    #[serde(default)]
    pub sentinel_address: Option<u32>,
    /// Per-operation retry budget
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl DeviceProfile {
    /// Validate internal consistency.
    ///
    /// # Errors
    /// `InvalidProfile` for a zero stride, an empty fixed offset table, a
    /// zero attempt budget, or a sentinel requirement without an address.
    pub fn validate(&self) -> ToolboxResult<()> {
        match &self.scheme {
            AddressScheme::Linear { stride, .. } if *stride == 0 => {
                return Err(ToolboxError::invalid_profile(format!(
                    "{}: linear scheme with zero stride",
                    self.name
                )));
            }
            AddressScheme::Fixed { offsets, .. } if offsets.is_empty() => {
                return Err(ToolboxError::invalid_profile(format!(
                    "{}: fixed scheme with empty offset table",
                    self.name
                )));
            }
            _ => {}
        }

        if self.retry.max_attempts == 0 {
            return Err(ToolboxError::invalid_profile(format!(
                "{}: max_attempts must be at least 1",
                self.name
            )));
        }

        if self.require_sentinel && self.sentinel_address.is_none() {
            return Err(ToolboxError::invalid_profile(format!(
                "{}: sentinel required but no sentinel_address set",
                self.name
            )));
        }

        Ok(())
    }

    /// Registers one logical slot occupies on the wire
    pub fn words_per_value(&self) -> u16 {
        self.decode_kind.words_per_value()
    }
}

// ============================================================================
// Preset device families
// ============================================================================

impl DeviceProfile {
    /// Wireless transmitter base stations: byte-swapped floats every 10
    /// registers starting at 15, gated by a sentinel read of register 15.
    pub fn accutech() -> Self {
        Self {
            name: "accutech".to_string(),
            scheme: AddressScheme::Linear {
                offset: 5,
                stride: 10,
            },
            byte_order: ByteOrder::Little,
            word_order: WordOrder::Big,
            decode_kind: DecodeKind::Float32,
            missing_value_policy: MissingValuePolicy::Absent,
            require_sentinel: true,
            sentinel_address: Some(15),
            retry: RetryPolicy::new(2, DEFAULT_BACKOFF_MS),
        }
    }

    /// General-purpose PLCs: big-endian floats, three attempts per
    /// operation, block reads for fast scans.
    pub fn generic_plc() -> Self {
        Self {
            name: "generic_plc".to_string(),
            scheme: AddressScheme::Linear { offset: 0, stride: 2 },
            byte_order: ByteOrder::Big,
            word_order: WordOrder::Big,
            decode_kind: DecodeKind::Float32,
            missing_value_policy: MissingValuePolicy::Absent,
            require_sentinel: false,
            sentinel_address: None,
            retry: RetryPolicy::new(3, DEFAULT_BACKOFF_MS),
        }
    }

    /// The same PLC family's decimal registers: two-register `int.frac`
    /// pairs instead of IEEE floats, same link behavior otherwise.
    pub fn generic_plc_decimal() -> Self {
        Self {
            name: "generic_plc_decimal".to_string(),
            decode_kind: DecodeKind::FixedPoint,
            ..Self::generic_plc()
        }
    }

    /// Compact PLCs with 1-based addressing: word-swapped floats back to
    /// back from 40001, coils in the discrete-input table from 10001.
    ///
    /// The profile speaks the device manual's 1-based register numbers
    /// (slot 1 is "40001"); if the underlying protocol stack expects
    /// zero-based wire addresses, the transport implementation applies
    /// the -1, not the caller.
    pub fn wenlen_plc() -> Self {
        Self {
            name: "wenlen_plc".to_string(),
            scheme: AddressScheme::Linear {
                offset: 39_999,
                stride: 2,
            },
            byte_order: ByteOrder::Big,
            word_order: WordOrder::Little,
            decode_kind: DecodeKind::Float32,
            missing_value_policy: MissingValuePolicy::Absent,
            require_sentinel: false,
            sentinel_address: None,
            retry: RetryPolicy::new(2, DEFAULT_BACKOFF_MS),
        }
    }

    /// Serial-to-ethernet analog gateways: four word-swapped float channels
    /// at fixed offsets inside one 14-register block at 106.
    pub fn usr_w610() -> Self {
        Self {
            name: "usr_w610".to_string(),
            scheme: AddressScheme::Fixed {
                base: 106,
                offsets: vec![0, 4, 8, 12],
            },
            byte_order: ByteOrder::Big,
            word_order: WordOrder::Little,
            decode_kind: DecodeKind::Float32,
            missing_value_policy: MissingValuePolicy::Absent,
            require_sentinel: false,
            sentinel_address: None,
            retry: RetryPolicy::new(2, DEFAULT_BACKOFF_MS),
        }
    }
}

// ============================================================================
// Profile sets
// ============================================================================

/// Named collection of profiles, typically loaded from a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSet {
    #[serde(flatten)]
    profiles: HashMap<String, DeviceProfile>,
}

impl ProfileSet {
    /// Parse a YAML document mapping profile names to profiles.
    ///
    /// # Errors
    /// `InvalidProfile` on parse failure or when any contained profile
    /// fails [`DeviceProfile::validate`].
    pub fn from_yaml_str(s: &str) -> ToolboxResult<Self> {
        let set: Self = serde_yaml::from_str(s)
            .map_err(|e| ToolboxError::invalid_profile(format!("YAML parse error: {e}")))?;
        set.validate()?;
        Ok(set)
    }

    /// Parse a YAML document from a reader (e.g. an open config file).
    ///
    /// # Errors
    /// Same contract as [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_reader<R: std::io::Read>(reader: R) -> ToolboxResult<Self> {
        let set: Self = serde_yaml::from_reader(reader)
            .map_err(|e| ToolboxError::invalid_profile(format!("YAML parse error: {e}")))?;
        set.validate()?;
        Ok(set)
    }

    /// Parse a JSON document mapping profile names to profiles.
    ///
    /// # Errors
    /// Same contract as [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_json_str(s: &str) -> ToolboxResult<Self> {
        let set: Self = serde_json::from_str(s)
            .map_err(|e| ToolboxError::invalid_profile(format!("JSON parse error: {e}")))?;
        set.validate()?;
        Ok(set)
    }

    /// Built-in profiles for all known device families
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in [
            DeviceProfile::accutech(),
            DeviceProfile::generic_plc(),
            DeviceProfile::generic_plc_decimal(),
            DeviceProfile::wenlen_plc(),
            DeviceProfile::usr_w610(),
        ] {
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles }
    }

    pub fn get(&self, name: &str) -> Option<&DeviceProfile> {
        self.profiles.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, profile: DeviceProfile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    fn validate(&self) -> ToolboxResult<()> {
        for profile in self.profiles.values() {
            profile.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for profile in [
            DeviceProfile::accutech(),
            DeviceProfile::generic_plc(),
            DeviceProfile::generic_plc_decimal(),
            DeviceProfile::wenlen_plc(),
            DeviceProfile::usr_w610(),
        ] {
            profile.validate().unwrap();
        }
    }

    #[test]
    fn test_accutech_preset_shape() {
        let p = DeviceProfile::accutech();
        assert_eq!(p.scheme.logical_to_raw(1).unwrap(), 15);
        assert_eq!(p.scheme.logical_to_raw(30).unwrap(), 305);
        assert_eq!(p.byte_order, ByteOrder::Little);
        assert_eq!(p.word_order, WordOrder::Big);
        assert_eq!(p.decode_kind, DecodeKind::Float32);
        assert!(p.require_sentinel);
        assert_eq!(p.sentinel_address, Some(15));
        assert_eq!(p.retry.max_attempts, 2);
    }

    #[test]
    fn test_generic_plc_decimal_preset_shape() {
        let float = DeviceProfile::generic_plc();
        let decimal = DeviceProfile::generic_plc_decimal();
        // Same device family, only the register encoding differs
        assert_eq!(decimal.decode_kind, DecodeKind::FixedPoint);
        assert_eq!(float.decode_kind, DecodeKind::Float32);
        assert_eq!(decimal.scheme, float.scheme);
        assert_eq!(decimal.retry, float.retry);
        assert_eq!(decimal.retry.max_attempts, 3);
    }

    #[test]
    fn test_wenlen_preset_shape() {
        let p = DeviceProfile::wenlen_plc();
        assert_eq!(p.scheme.logical_to_raw(1).unwrap(), 40_001);
        assert_eq!(p.word_order, WordOrder::Little);
        assert_eq!(p.words_per_value(), 2);
    }

    #[test]
    fn test_validate_zero_stride() {
        let mut p = DeviceProfile::generic_plc();
        p.scheme = AddressScheme::Linear { offset: 0, stride: 0 };
        assert!(matches!(p.validate(), Err(ToolboxError::InvalidProfile(_))));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut p = DeviceProfile::generic_plc();
        p.retry.max_attempts = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_sentinel_without_address() {
        let mut p = DeviceProfile::accutech();
        p.sentinel_address = None;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_profile_set_from_yaml() {
        let yaml = r#"
tank_farm:
  name: tank_farm
  scheme:
    kind: linear
    offset: 5
    stride: 10
  byte_order: little
  word_order: big
  decode_kind: fixed_point
  require_sentinel: true
  sentinel_address: 15
  retry:
    max_attempts: 2
    backoff_ms: 1000
"#;
        let set = ProfileSet::from_yaml_str(yaml).unwrap();
        let p = set.get("tank_farm").unwrap();
        assert_eq!(p.scheme.logical_to_raw(1).unwrap(), 15);
        assert_eq!(p.decode_kind, DecodeKind::FixedPoint);
        // Unspecified fields take defaults
        assert_eq!(p.missing_value_policy, MissingValuePolicy::Absent);
    }

    #[test]
    fn test_profile_set_rejects_invalid_entry() {
        let yaml = r#"
broken:
  name: broken
  scheme:
    kind: linear
    offset: 0
    stride: 0
  decode_kind: float32
"#;
        assert!(ProfileSet::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_retry_policy_defaults_in_yaml() {
        let yaml = "max_attempts: 3";
        let policy: RetryPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_ms, DEFAULT_BACKOFF_MS);
        assert_eq!(policy.backoff(), Duration::from_millis(1000));
    }

    #[test]
    fn test_builtin_set() {
        let set = ProfileSet::builtin();
        assert_eq!(set.len(), 5);
        assert!(set.get("usr_w610").is_some());
        assert!(set.get("nonexistent").is_none());
    }

    #[test]
    fn test_profile_json_round_trip() {
        let p = DeviceProfile::usr_w610();
        let json = serde_json::to_string(&p).unwrap();
        let back: DeviceProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
