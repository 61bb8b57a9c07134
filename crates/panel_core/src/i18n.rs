use std::collections::HashMap;

/// Message catalogue for one language. Keys are the English source text;
/// a key without a translation renders as itself.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    language: String,
    messages: HashMap<String, String>,
}

impl Translator {
    pub fn new(language: impl Into<String>, messages: HashMap<String, String>) -> Self {
        Self {
            language: language.into(),
            messages,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn t(&self, key: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_the_key() {
        let translator = Translator::new(
            "ru",
            HashMap::from([("Reboot task has been added to queue".to_string(), "Перезагрузка поставлена в очередь".to_string())]),
        );
        assert_eq!(
            translator.t("Reboot task has been added to queue"),
            "Перезагрузка поставлена в очередь"
        );
        assert_eq!(translator.t("Unknown"), "Unknown");
        assert_eq!(translator.language(), "ru");
    }
}
