//! Typed codecs between config strings and values
//!
//! Numbers parse leniently: leading whitespace is skipped and trailing
//! garbage after a valid prefix is ignored, so `"12px"` reads as `12`.

/// A value that can be read from and written to a config entry.
pub trait ConfigValue: Sized {
    /// Name used in diagnostics when a stored string fails to parse
    const TYPE_NAME: &'static str;

    /// Parse a raw config string, returning `None` when it is not valid.
    fn parse_config(raw: &str) -> Option<Self>;

    /// Render the value the way it is written to config files.
    fn to_config_string(&self) -> String;
}

impl ConfigValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn parse_config(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn to_config_string(&self) -> String {
        if *self { "True" } else { "False" }.to_string()
    }
}

impl ConfigValue for i32 {
    const TYPE_NAME: &'static str = "integer";

    fn parse_config(raw: &str) -> Option<Self> {
        parse_int_prefix(raw).and_then(|v| i32::try_from(v).ok())
    }

    fn to_config_string(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for u32 {
    const TYPE_NAME: &'static str = "unsigned integer";

    fn parse_config(raw: &str) -> Option<Self> {
        parse_int_prefix(raw).and_then(|v| u32::try_from(v).ok())
    }

    fn to_config_string(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for f32 {
    const TYPE_NAME: &'static str = "float";

    fn parse_config(raw: &str) -> Option<Self> {
        parse_float_prefix(raw)
    }

    fn to_config_string(&self) -> String {
        // Display already yields the shortest round-trip form ("1.5", "10")
        self.to_string()
    }
}

impl ConfigValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse_config(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else {
            Some(raw.to_string())
        }
    }

    fn to_config_string(&self) -> String {
        self.clone()
    }
}

impl ConfigValue for Vec<String> {
    const TYPE_NAME: &'static str = "list";

    fn parse_config(raw: &str) -> Option<Self> {
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    fn to_config_string(&self) -> String {
        self.join(", ")
    }
}

/// Parse the first `N` comma-separated components of `raw`.
///
/// Extra components are ignored; missing or invalid ones fail the parse.
pub fn parse_components<T: ConfigValue, const N: usize>(raw: &str) -> Option<[T; N]> {
    let mut parts = raw.split(',');
    let mut values = Vec::with_capacity(N);
    for _ in 0..N {
        values.push(T::parse_config(parts.next()?)?);
    }
    values.try_into().ok()
}

/// Join components with the `", "` separator used by vector entries.
pub fn join_components<T: ConfigValue>(values: &[T]) -> String {
    values
        .iter()
        .map(ConfigValue::to_config_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse an optionally signed decimal integer prefix.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (sign, digits) = match s.as_bytes().first()? {
        b'-' => (-1, &s[1..]),
        b'+' => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}

/// Parse the longest valid floating point prefix.
pub fn parse_float_prefix(raw: &str) -> Option<f32> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<f32>() {
        return Some(v);
    }
    let end = s
        .bytes()
        .position(|b| !(b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E')))
        .unwrap_or(s.len());
    let candidate = &s[..end];
    (1..=candidate.len())
        .rev()
        .find_map(|n| candidate[..n].parse::<f32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("true", Some(true))]
    #[case("TRUE", Some(true))]
    #[case("1", Some(true))]
    #[case("False", Some(false))]
    #[case("0", Some(false))]
    #[case("yes", None)]
    #[case("", None)]
    fn bool_parsing(#[case] raw: &str, #[case] expected: Option<bool>) {
        assert_eq!(bool::parse_config(raw), expected);
    }

    #[rstest]
    #[case("42", Some(42))]
    #[case("  -7", Some(-7))]
    #[case("12px", Some(12))]
    #[case("+3", Some(3))]
    #[case("abc", None)]
    #[case("-", None)]
    #[case("99999999999", None)]
    fn int_parsing(#[case] raw: &str, #[case] expected: Option<i32>) {
        assert_eq!(i32::parse_config(raw), expected);
    }

    #[rstest]
    #[case("1.5", Some(1.5))]
    #[case(" 10", Some(10.0))]
    #[case("2.5f", Some(2.5))]
    #[case("1e2", Some(100.0))]
    #[case("x", None)]
    fn float_parsing(#[case] raw: &str, #[case] expected: Option<f32>) {
        assert_eq!(f32::parse_config(raw), expected);
    }

    #[test]
    fn bool_writes_capitalized() {
        assert_eq!(true.to_config_string(), "True");
        assert_eq!(false.to_config_string(), "False");
    }

    #[test]
    fn float_writes_shortest_form() {
        assert_eq!(1.5f32.to_config_string(), "1.5");
        assert_eq!(10.0f32.to_config_string(), "10");
        assert_eq!(0.1f32.to_config_string(), "0.1");
    }

    #[test]
    fn components_parse_and_join() {
        let parsed: [f32; 3] = parse_components("1, 2.5,3").unwrap();
        assert_eq!(parsed, [1.0, 2.5, 3.0]);
        assert_eq!(join_components(&parsed), "1, 2.5, 3");
    }

    #[test]
    fn components_require_enough_parts() {
        assert!(parse_components::<i32, 2>("4").is_none());
        assert!(parse_components::<i32, 2>("4, x").is_none());
        assert_eq!(parse_components::<i32, 2>("4, 5, 6"), Some([4, 5]));
    }

    #[test]
    fn empty_string_is_no_value() {
        assert_eq!(String::parse_config(""), None);
        assert_eq!(String::parse_config("abc"), Some("abc".to_string()));
    }

    #[test]
    fn string_list_trims_entries() {
        assert_eq!(
            Vec::<String>::parse_config("a, b ,,c"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }
}
