//! Key-Space Schema
//!
//! Keys are derived from domain values verbatim, with no hashing, so the data
//! can be inspected from `redis-cli`:
//!
//! ```text
//! fmods            SET     every module name
//! fmod/<module>    SET     fortune ids of <module>
//! f/<id>           STRING  text of fortune <id>
//! fid              STRING  id counter (INCR)
//! ```

use crate::constants::{
    FORTUNE_TEXT_PREFIX, ID_COUNTER_KEY, MODULE_FORTUNE_SET_PREFIX, MODULE_SET_KEY,
};

/// Key of the set of all module names.
#[must_use]
pub fn module_set_key() -> &'static str {
    MODULE_SET_KEY
}

/// Key of the set of fortune ids belonging to `module`.
#[must_use]
pub fn module_fortune_set_key(module: &str) -> String {
    format!("{MODULE_FORTUNE_SET_PREFIX}{module}")
}

/// Key of the text entry of fortune `id`.
#[must_use]
pub fn fortune_text_key(id: u64) -> String {
    format!("{FORTUNE_TEXT_PREFIX}{id}")
}

/// Key of the id-minting counter.
#[must_use]
pub fn id_counter_key() -> &'static str {
    ID_COUNTER_KEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(module_set_key(), "fmods");
        assert_eq!(module_fortune_set_key("zen"), "fmod/zen");
        assert_eq!(fortune_text_key(42), "f/42");
        assert_eq!(id_counter_key(), "fid");
    }

    #[test]
    fn test_keys_are_verbatim() {
        // Module names are not escaped or hashed.
        assert_eq!(module_fortune_set_key("a b/c"), "fmod/a b/c");
    }

    #[test]
    fn test_keys_do_not_collide() {
        let keys = [
            module_set_key().to_string(),
            module_fortune_set_key("1"),
            fortune_text_key(1),
            id_counter_key().to_string(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
