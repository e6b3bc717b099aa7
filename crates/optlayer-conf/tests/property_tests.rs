use optlayer_conf::ConfigStore;
use optlayer_conf::value::{ConfigValue, parse_components};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_parser_never_panics(text in "\\PC*") {
        let _ = ConfigStore::parse(&text);
    }

    #[test]
    fn test_written_entries_read_back(
        entries in prop::collection::btree_map("[a-z]{1,8}\\.[a-zA-Z0-9_]{1,12}", "[a-zA-Z0-9 ,.-]{0,24}", 0..16)
    ) {
        let store: ConfigStore = entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let reparsed = ConfigStore::parse(&store.to_text(None));

        for (key, value) in &entries {
            // Leading whitespace is not significant in the file format
            prop_assert_eq!(reparsed.get_str(key), Some(value.trim_start_matches([' ', '\t'])));
        }
    }

    #[test]
    fn test_int_text_round_trip(value in any::<i32>()) {
        prop_assert_eq!(i32::parse_config(&value.to_config_string()), Some(value));
    }

    #[test]
    fn test_float_text_round_trip(value in -1.0e6f32..1.0e6f32) {
        prop_assert_eq!(f32::parse_config(&value.to_config_string()), Some(value));
    }

    #[test]
    fn test_vector_components_tolerate_spacing(a in -1000i32..1000, b in -1000i32..1000) {
        let raw = format!("{a},   {b}");
        prop_assert_eq!(parse_components::<i32, 2>(&raw), Some([a, b]));
    }
}
