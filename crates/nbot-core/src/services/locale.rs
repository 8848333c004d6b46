use std::collections::HashMap;

use crate::{errors::Error, Result};

/// Translation table loaded once at startup.
///
/// Lookups fall back to the default locale, then to the key itself, so a
/// missing translation never fails a handler.
#[derive(Clone, Debug)]
pub struct LocaleStore {
    default_locale: String,
    table: HashMap<String, HashMap<String, String>>,
}

impl LocaleStore {
    /// `table` maps locale → key → template. Templates use `{name}` placeholders.
    pub fn load<L, K, V>(
        default_locale: &str,
        table: impl IntoIterator<Item = (L, Vec<(K, V)>)>,
    ) -> Result<Self>
    where
        L: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        let table: HashMap<String, HashMap<String, String>> = table
            .into_iter()
            .map(|(locale, entries)| {
                (
                    locale.into(),
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.into(), v.into()))
                        .collect(),
                )
            })
            .collect();

        if !table.contains_key(default_locale) {
            return Err(Error::Config(format!(
                "default locale `{default_locale}` has no translations"
            )));
        }
        Ok(Self {
            default_locale: default_locale.to_string(),
            table,
        })
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn t(&self, locale: &str, key: &str) -> String {
        self.lookup(locale, key).unwrap_or(key).to_string()
    }

    pub fn t_with(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut out = self.t(locale, key);
        for (name, value) in args {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.table
            .get(locale)
            .and_then(|m| m.get(key))
            .or_else(|| self.table.get(&self.default_locale)?.get(key))
            .map(String::as_str)
    }
}
