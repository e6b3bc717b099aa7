//! Type-erased option values and the typed bridge to them

use crate::hash_set_layer::{HashSetLayer, format_hash, parse_hash};
use crate::keys::VirtualKeys;
use crate::math::{self, Vector2, Vector2i, Vector3, Vector4};
use optlayer_conf::ConfigValue;
use std::fmt;

/// Type tag of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Bool,
    Int,
    Float,
    Vector2,
    Vector3,
    Vector4,
    Vector2i,
    String,
    HashSet,
    HashVector,
    VirtualKeys,
}

impl OptionKind {
    pub fn name(self) -> &'static str {
        match self {
            OptionKind::Bool => "bool",
            OptionKind::Int => "int",
            OptionKind::Float => "float",
            OptionKind::Vector2 => "float2",
            OptionKind::Vector3 => "float3",
            OptionKind::Vector4 => "float4",
            OptionKind::Vector2i => "int2",
            OptionKind::String => "string",
            OptionKind::HashSet => "hash set",
            OptionKind::HashVector => "hash vector",
            OptionKind::VirtualKeys => "virtual keys",
        }
    }

    /// Continuous types interpolate between layers by blend strength.
    pub fn is_continuous(self) -> bool {
        matches!(
            self,
            OptionKind::Float | OptionKind::Vector2 | OptionKind::Vector3 | OptionKind::Vector4
        )
    }

    /// Types that honor min/max bounds.
    pub fn is_clampable(self) -> bool {
        matches!(
            self,
            OptionKind::Int
                | OptionKind::Float
                | OptionKind::Vector2
                | OptionKind::Vector3
                | OptionKind::Vector2i
        )
    }

    /// Types whose text form can grow without bound.
    pub fn is_long_entry(self) -> bool {
        matches!(
            self,
            OptionKind::String
                | OptionKind::HashSet
                | OptionKind::HashVector
                | OptionKind::VirtualKeys
        )
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An owned option value of any supported type.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector2(Vector2),
    Vector3(Vector3),
    Vector4(Vector4),
    Vector2i(Vector2i),
    String(String),
    HashSet(HashSetLayer),
    HashVector(Vec<u64>),
    VirtualKeys(VirtualKeys),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Float(_) => OptionKind::Float,
            OptionValue::Vector2(_) => OptionKind::Vector2,
            OptionValue::Vector3(_) => OptionKind::Vector3,
            OptionValue::Vector4(_) => OptionKind::Vector4,
            OptionValue::Vector2i(_) => OptionKind::Vector2i,
            OptionValue::String(_) => OptionKind::String,
            OptionValue::HashSet(_) => OptionKind::HashSet,
            OptionValue::HashVector(_) => OptionKind::HashVector,
            OptionValue::VirtualKeys(_) => OptionKind::VirtualKeys,
        }
    }

    /// Parse a config string as a value of `kind`.
    pub fn parse(kind: OptionKind, raw: &str) -> Option<Self> {
        Some(match kind {
            OptionKind::Bool => OptionValue::Bool(bool::parse_config(raw)?),
            OptionKind::Int => OptionValue::Int(i32::parse_config(raw)?),
            OptionKind::Float => OptionValue::Float(f32::parse_config(raw)?),
            OptionKind::Vector2 => OptionValue::Vector2(Vector2::parse_config(raw)?),
            OptionKind::Vector3 => OptionValue::Vector3(Vector3::parse_config(raw)?),
            OptionKind::Vector4 => OptionValue::Vector4(Vector4::parse_config(raw)?),
            OptionKind::Vector2i => OptionValue::Vector2i(Vector2i::parse_config(raw)?),
            OptionKind::String => OptionValue::String(String::parse_config(raw)?),
            OptionKind::HashSet => OptionValue::HashSet(HashSetLayer::parse(raw)),
            OptionKind::HashVector => OptionValue::HashVector(parse_hash_vector(raw)),
            OptionKind::VirtualKeys => OptionValue::VirtualKeys(VirtualKeys::parse_config(raw)?),
        })
    }

    /// Text form written to config files.
    pub fn to_config_string(&self) -> String {
        match self {
            OptionValue::Bool(v) => v.to_config_string(),
            OptionValue::Int(v) => v.to_config_string(),
            OptionValue::Float(v) => v.to_config_string(),
            OptionValue::Vector2(v) => v.to_config_string(),
            OptionValue::Vector3(v) => v.to_config_string(),
            OptionValue::Vector4(v) => v.to_config_string(),
            OptionValue::Vector2i(v) => v.to_config_string(),
            OptionValue::String(v) => v.clone(),
            OptionValue::HashSet(v) => v.to_string(),
            OptionValue::HashVector(v) => v
                .iter()
                .map(|h| format_hash(*h))
                .collect::<Vec<_>>()
                .join(", "),
            OptionValue::VirtualKeys(v) => v.to_config_string(),
        }
    }

    /// Interpolate towards `target` by `t`. Non-continuous values (and
    /// mismatched kinds) snap to `target`.
    pub(crate) fn lerp(&self, target: &OptionValue, t: f32) -> OptionValue {
        match (self, target) {
            (OptionValue::Float(a), OptionValue::Float(b)) => OptionValue::Float(math::lerp(*a, *b, t)),
            (OptionValue::Vector2(a), OptionValue::Vector2(b)) => OptionValue::Vector2(a.lerp(*b, t)),
            (OptionValue::Vector3(a), OptionValue::Vector3(b)) => OptionValue::Vector3(a.lerp(*b, t)),
            (OptionValue::Vector4(a), OptionValue::Vector4(b)) => OptionValue::Vector4(a.lerp(*b, t)),
            _ => target.clone(),
        }
    }

    /// Clamp into `[min, max]`. Kinds without ordering pass through.
    pub(crate) fn clamp(self, min: Option<&OptionValue>, max: Option<&OptionValue>) -> OptionValue {
        let value = match (self, min) {
            (OptionValue::Int(v), Some(OptionValue::Int(lo))) => OptionValue::Int(v.max(*lo)),
            (OptionValue::Float(v), Some(OptionValue::Float(lo))) => OptionValue::Float(v.max(*lo)),
            (OptionValue::Vector2(v), Some(OptionValue::Vector2(lo))) => OptionValue::Vector2(v.max(*lo)),
            (OptionValue::Vector3(v), Some(OptionValue::Vector3(lo))) => OptionValue::Vector3(v.max(*lo)),
            (OptionValue::Vector2i(v), Some(OptionValue::Vector2i(lo))) => OptionValue::Vector2i(v.max(*lo)),
            (value, _) => value,
        };
        match (value, max) {
            (OptionValue::Int(v), Some(OptionValue::Int(hi))) => OptionValue::Int(v.min(*hi)),
            (OptionValue::Float(v), Some(OptionValue::Float(hi))) => OptionValue::Float(v.min(*hi)),
            (OptionValue::Vector2(v), Some(OptionValue::Vector2(hi))) => OptionValue::Vector2(v.min(*hi)),
            (OptionValue::Vector3(v), Some(OptionValue::Vector3(hi))) => OptionValue::Vector3(v.min(*hi)),
            (OptionValue::Vector2i(v), Some(OptionValue::Vector2i(hi))) => OptionValue::Vector2i(v.min(*hi)),
            (value, _) => value,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_config_string())
    }
}

fn parse_hash_vector(raw: &str) -> Vec<u64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let hash = parse_hash(s);
            if hash.is_none() {
                tracing::warn!(entry = s, "Skipping invalid hash entry");
            }
            hash
        })
        .collect()
}

/// Rust types usable as option values.
pub trait OptionType: Clone + PartialEq + Default + Send + Sync + 'static {
    const KIND: OptionKind;

    fn into_value(self) -> OptionValue;

    /// Extract from a type-erased value; `None` when the kind differs.
    fn from_value(value: &OptionValue) -> Option<Self>;
}

/// Option types that accept min/max bounds.
pub trait Clampable: OptionType {}

macro_rules! option_type {
    ($ty:ty, $variant:ident) => {
        impl OptionType for $ty {
            const KIND: OptionKind = OptionKind::$variant;

            fn into_value(self) -> OptionValue {
                OptionValue::$variant(self)
            }

            fn from_value(value: &OptionValue) -> Option<Self> {
                match value {
                    OptionValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

option_type!(bool, Bool);
option_type!(i32, Int);
option_type!(f32, Float);
option_type!(Vector2, Vector2);
option_type!(Vector3, Vector3);
option_type!(Vector4, Vector4);
option_type!(Vector2i, Vector2i);
option_type!(String, String);
option_type!(HashSetLayer, HashSet);
option_type!(Vec<u64>, HashVector);
option_type!(VirtualKeys, VirtualKeys);

impl Clampable for i32 {}
impl Clampable for f32 {}
impl Clampable for Vector2 {}
impl Clampable for Vector3 {}
impl Clampable for Vector2i {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OptionKind::Bool, "1", OptionValue::Bool(true))]
    #[case(OptionKind::Int, "-4", OptionValue::Int(-4))]
    #[case(OptionKind::Float, "0.25", OptionValue::Float(0.25))]
    #[case(OptionKind::Vector2i, "3, 4", OptionValue::Vector2i(Vector2i::new(3, 4)))]
    #[case(OptionKind::String, "hello", OptionValue::String("hello".into()))]
    #[case(OptionKind::HashVector, "0x1, 0xff", OptionValue::HashVector(vec![1, 255]))]
    fn parses_by_kind(#[case] kind: OptionKind, #[case] raw: &str, #[case] expected: OptionValue) {
        assert_eq!(OptionValue::parse(kind, raw), Some(expected));
    }

    #[test]
    fn parse_failures_are_none() {
        assert_eq!(OptionValue::parse(OptionKind::Int, "abc"), None);
        assert_eq!(OptionValue::parse(OptionKind::Vector3, "1, 2"), None);
        assert_eq!(OptionValue::parse(OptionKind::String, ""), None);
    }

    #[test]
    fn hash_vector_text_form() {
        let value = OptionValue::HashVector(vec![0xA, 0xB]);
        assert_eq!(value.to_config_string(), "0x000000000000000A, 0x000000000000000B");
    }

    #[test]
    fn lerp_only_blends_continuous_kinds() {
        let half = OptionValue::Float(1.5).lerp(&OptionValue::Float(10.0), 0.5);
        assert_eq!(half, OptionValue::Float(5.75));

        let snapped = OptionValue::Int(1).lerp(&OptionValue::Int(9), 0.5);
        assert_eq!(snapped, OptionValue::Int(9));
    }

    #[test]
    fn clamp_applies_both_bounds() {
        let lo = OptionValue::Int(0);
        let hi = OptionValue::Int(10);
        assert_eq!(OptionValue::Int(-3).clamp(Some(&lo), Some(&hi)), OptionValue::Int(0));
        assert_eq!(OptionValue::Int(30).clamp(Some(&lo), Some(&hi)), OptionValue::Int(10));
        assert_eq!(OptionValue::Int(5).clamp(None, Some(&hi)), OptionValue::Int(5));
    }

    #[test]
    fn clamp_vectors_component_wise() {
        let lo = OptionValue::Vector2(Vector2::new(0.0, 0.0));
        let hi = OptionValue::Vector2(Vector2::new(1.0, 1.0));
        let clamped = OptionValue::Vector2(Vector2::new(-1.0, 0.5)).clamp(Some(&lo), Some(&hi));
        assert_eq!(clamped, OptionValue::Vector2(Vector2::new(0.0, 0.5)));
    }

    #[test]
    fn typed_bridge_rejects_other_kinds() {
        assert_eq!(i32::from_value(&OptionValue::Int(3)), Some(3));
        assert_eq!(f32::from_value(&OptionValue::Int(3)), None);
        assert_eq!(<Vec<u64>>::KIND, OptionKind::HashVector);
    }
}
