//! Batch-level transfer metadata.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::ParseError;

/// Key holding the registry resource the batch belongs to.
pub const RESOURCE_ID_KEY: &str = "nyu-dl-resource-id";

const RESOURCE_ID_ALIAS: &str = "Resource-ID";

/// `key: value` metadata shared by every package in a batch.
///
/// Fields keep file order so they can be copied verbatim into each bag's
/// `bag-info.txt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferInfo {
    fields: Vec<(String, String)>,
}

impl TransferInfo {
    /// Parses the YAML mapping in `transfer-info.txt`.
    ///
    /// Top-level keys keep file order. Scalar values are kept as text;
    /// an empty value becomes an empty string. A resource id is required.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ParseError::InvalidEncoding("Transfer info"))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mapping = match serde_yaml::from_str::<Value>(text)? {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Err(ParseError::Empty("Transfer info")),
            other => {
                return Err(ParseError::NotFlat(format!(
                    "document is {}",
                    kind_of(&other)
                )))
            }
        };

        let mut fields = Vec::with_capacity(mapping.len());
        for (key, value) in &mapping {
            let key = scalar_text(key)
                .ok_or_else(|| ParseError::NotFlat(format!("key is {}", kind_of(key))))?;
            let value = scalar_text(value).ok_or_else(|| {
                ParseError::NotFlat(format!("'{key}' is {}", kind_of(value)))
            })?;
            fields.push((key, value));
        }

        if fields.is_empty() {
            return Err(ParseError::Empty("Transfer info"));
        }

        let info = Self { fields };
        if info.resource_id().is_empty() {
            return Err(ParseError::MissingField(RESOURCE_ID_KEY));
        }
        Ok(info)
    }

    /// Builds transfer info from key/value pairs.
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Looks up a field by key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All fields in file order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// The registry resource id.
    ///
    /// A registry path such as `/repositories/3/resources/1234` is reduced
    /// to its trailing segment.
    pub fn resource_id(&self) -> &str {
        let value = self
            .get(RESOURCE_ID_KEY)
            .or_else(|| self.get(RESOURCE_ID_ALIAS))
            .unwrap_or_default()
            .trim_end_matches('/');
        value.rsplit('/').next().unwrap_or(value)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim().to_string()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transfer_info() {
        let text = "Source-Organization: NYU Libraries\n\
                    nyu-dl-project-name: fales/mss318\n\
                    nyu-dl-resource-id: 1234\n";
        let info = TransferInfo::parse(text.as_bytes()).unwrap();
        assert_eq!(info.resource_id(), "1234");
        assert_eq!(info.get("source-organization"), Some("NYU Libraries"));
        assert_eq!(info.fields().len(), 3);
        assert_eq!(info.fields()[0].0, "Source-Organization");
    }

    #[test]
    fn test_resource_id_from_registry_path() {
        let text = "nyu-dl-resource-id: \"/repositories/3/resources/1234\"\n";
        let info = TransferInfo::parse(text.as_bytes()).unwrap();
        assert_eq!(info.resource_id(), "1234");
    }

    #[test]
    fn test_resource_id_alias() {
        let info = TransferInfo::parse(b"Resource-ID: 77\n").unwrap();
        assert_eq!(info.resource_id(), "77");
    }

    #[test]
    fn test_trailing_comment_is_not_part_of_value() {
        let info = TransferInfo::parse(b"nyu-dl-resource-id: 1234 # mss318\n").unwrap();
        assert_eq!(info.resource_id(), "1234");
    }

    #[test]
    fn test_folded_value_and_comments() {
        let text = "# batch metadata\n\
                    Internal-Sender-Description: Letters and diaries\n  \
                    from the 1960s\n\
                    Contact-Email:\n\
                    nyu-dl-resource-id: 5\n";
        let info = TransferInfo::parse(text.as_bytes()).unwrap();
        assert_eq!(
            info.get("Internal-Sender-Description"),
            Some("Letters and diaries from the 1960s")
        );
        assert_eq!(info.get("Contact-Email"), Some(""));
        assert_eq!(info.fields()[0].0, "Internal-Sender-Description");
    }

    #[test]
    fn test_missing_resource_id_fails() {
        let err = TransferInfo::parse(b"Source-Organization: NYU\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingField(RESOURCE_ID_KEY)));
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let err = TransferInfo::parse(b"nyu-dl-resource-id: [5\n").unwrap_err();
        assert!(matches!(err, ParseError::Yaml(_)));
    }

    #[test]
    fn test_nested_value_rejected() {
        let err = TransferInfo::parse(b"nyu-dl-resource-id: 5\nextra:\n  - a\n  - b\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::NotFlat(_)));
    }

    #[test]
    fn test_plain_text_rejected() {
        let err = TransferInfo::parse(b"just some text\n").unwrap_err();
        assert!(matches!(err, ParseError::NotFlat(_)));
    }

    #[test]
    fn test_empty_fails() {
        assert!(matches!(
            TransferInfo::parse(b"\n# nothing\n"),
            Err(ParseError::Empty(_))
        ));
    }
}
