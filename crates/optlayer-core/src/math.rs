//! Small fixed-size vector types carried by vector-valued options

use optlayer_conf::ConfigValue;
use optlayer_conf::value::{join_components, parse_components};
use std::fmt;

macro_rules! vector_type {
    ($name:ident, $scalar:ty, $len:literal, $($field:ident),+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Default)]
        pub struct $name {
            $(pub $field: $scalar,)+
        }

        impl $name {
            pub const fn new($($field: $scalar),+) -> Self {
                Self { $($field),+ }
            }

            pub fn to_array(self) -> [$scalar; $len] {
                [$(self.$field),+]
            }

            pub fn from_array(values: [$scalar; $len]) -> Self {
                let [$($field),+] = values;
                Self { $($field),+ }
            }

            /// Component-wise minimum.
            pub fn min(self, other: Self) -> Self {
                Self { $($field: if other.$field < self.$field { other.$field } else { self.$field }),+ }
            }

            /// Component-wise maximum.
            pub fn max(self, other: Self) -> Self {
                Self { $($field: if other.$field > self.$field { other.$field } else { self.$field }),+ }
            }
        }

        impl From<[$scalar; $len]> for $name {
            fn from(values: [$scalar; $len]) -> Self {
                Self::from_array(values)
            }
        }

        impl ConfigValue for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn parse_config(raw: &str) -> Option<Self> {
                parse_components::<$scalar, $len>(raw).map(Self::from_array)
            }

            fn to_config_string(&self) -> String {
                join_components(&self.to_array())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_config_string())
            }
        }
    };
}

vector_type!(Vector2, f32, 2, x, y);
vector_type!(Vector3, f32, 3, x, y, z);
vector_type!(Vector4, f32, 4, x, y, z, w);
vector_type!(Vector2i, i32, 2, x, y);

macro_rules! float_lerp {
    ($($name:ident),+) => {
        $(impl $name {
            /// Linear interpolation towards `target` by `t`.
            pub fn lerp(self, target: Self, t: f32) -> Self {
                Self::from_array(std::array::from_fn(|i| {
                    lerp(self.to_array()[i], target.to_array()[i], t)
                }))
            }
        })+
    };
}

float_lerp!(Vector2, Vector3, Vector4);

/// Scalar linear interpolation; `t = 0` yields `from`, `t = 1` yields `to`.
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints_are_exact() {
        assert_eq!(lerp(1.5, 10.0, 0.0), 1.5);
        assert_eq!(lerp(1.5, 10.0, 1.0), 10.0);
        assert_eq!(lerp(1.5, 10.0, 0.5), 5.75);
    }

    #[test]
    fn vector_lerp_is_component_wise() {
        let a = Vector3::new(0.0, 2.0, 4.0);
        let b = Vector3::new(2.0, 2.0, 0.0);
        assert_eq!(a.lerp(b, 0.5), Vector3::new(1.0, 2.0, 2.0));
    }

    #[test]
    fn min_max_are_component_wise() {
        let v = Vector2i::new(5, -5);
        assert_eq!(v.min(Vector2i::new(3, 3)), Vector2i::new(3, -5));
        assert_eq!(v.max(Vector2i::new(0, 0)), Vector2i::new(5, 0));
    }

    #[test]
    fn config_strings_round_trip() {
        let v = Vector4::new(1.0, 0.5, -2.0, 3.25);
        assert_eq!(v.to_config_string(), "1, 0.5, -2, 3.25");
        assert_eq!(Vector4::parse_config("1, 0.5, -2, 3.25"), Some(v));
        assert_eq!(Vector2::parse_config("1"), None);
    }
}
