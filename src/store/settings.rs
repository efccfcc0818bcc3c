use crate::store::{Binding, Store, keys};

const MASK_VISIBLE: usize = 4;

/// The Gemini API key, kept as plain text in the store.
#[derive(Clone)]
pub struct ApiKeySetting {
    key: Binding<String>,
}

impl ApiKeySetting {
    pub fn new(store: &Store) -> Self {
        Self { key: store.bind(keys::API_KEY, String::new()) }
    }

    /// The stored key, `None` if unset or blank.
    pub fn get(&self) -> Option<String> {
        Some(self.key.get().trim().to_string()).filter(|k| !k.is_empty())
    }

    pub fn set(&self, api_key: &str) {
        log::info!("[set] Updated API key");
        self.key.set(&api_key.trim().to_string());
    }

    pub fn clear(&self) {
        log::info!("[clear] Cleared API key");
        self.key.clear();
    }

    /// The key with all but its last four characters hidden. At least half
    /// of a short key is always hidden.
    pub fn masked(&self) -> Option<String> {
        self.get().map(|k| {
            let chars: Vec<char> = k.chars().collect();
            let hidden = chars.len() - (chars.len() / 2).min(MASK_VISIBLE);
            chars
                .iter()
                .enumerate()
                .map(|(i, c)| if i < hidden { '*' } else { *c })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    #[test]
    fn blank_key_counts_as_missing() {
        let (store, _dir) = temp_store();
        let setting = ApiKeySetting::new(&store);
        assert_eq!(setting.get(), None);

        setting.set("   ");
        assert_eq!(setting.get(), None);
    }

    #[test]
    fn key_is_trimmed_and_masked() {
        let (store, _dir) = temp_store();
        let setting = ApiKeySetting::new(&store);
        setting.set("  AIzaSecret1234 \n");

        assert_eq!(setting.get().as_deref(), Some("AIzaSecret1234"));
        assert_eq!(setting.masked().as_deref(), Some("**********1234"));

        setting.clear();
        assert_eq!(setting.get(), None);
    }

    #[test]
    fn short_keys_are_mostly_hidden() {
        let (store, _dir) = temp_store();
        let setting = ApiKeySetting::new(&store);

        for (key, masked) in [("a", "*"), ("ab", "*b"), ("abcd", "**cd"), ("abcdefgh", "****efgh")] {
            setting.set(key);
            assert_eq!(setting.masked().as_deref(), Some(masked), "{key}");
        }
    }

    #[test]
    fn key_is_shared_through_the_store() {
        let (store, _dir) = temp_store();
        ApiKeySetting::new(&store).set("abc");
        assert_eq!(ApiKeySetting::new(&store).get().as_deref(), Some("abc"));
        assert_eq!(store.read(keys::API_KEY, String::new()), "abc");
    }
}
