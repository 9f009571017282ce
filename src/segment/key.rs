use std::collections::BTreeMap;
use std::fmt;

/// Parsed storage key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    app_name: String,
    labels: BTreeMap<String, String>,
}

impl Key {
    /// Parse `app.name` or `app.name{key=value,...}`.
    pub fn parse(input: &str) -> Result<Self, KeyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(KeyError::Empty);
        }

        let (app_name, tags) = match input.find('{') {
            Some(open) => {
                let rest = &input[open + 1..];
                let close = rest.find('}').ok_or(KeyError::UnclosedTags)?;
                if !rest[close + 1..].trim().is_empty() {
                    return Err(KeyError::TrailingCharacters(rest[close + 1..].to_string()));
                }
                (input[..open].trim(), Some(&rest[..close]))
            }
            None => (input, None),
        };

        if app_name.is_empty() {
            return Err(KeyError::MissingAppName);
        }
        if let Some(c) = app_name.chars().find(|&c| is_reserved(c)) {
            return Err(KeyError::InvalidAppName(c));
        }

        let mut labels = BTreeMap::new();
        if let Some(tags) = tags.filter(|t| !t.trim().is_empty()) {
            for pair in tags.split(',') {
                let (k, v) = pair
                    .split_once('=')
                    .ok_or_else(|| KeyError::InvalidTag(pair.trim().to_string()))?;
                let (k, v) = (k.trim(), v.trim());
                if k.is_empty()
                    || v.is_empty()
                    || k.contains(is_reserved)
                    || v.contains(is_reserved)
                {
                    return Err(KeyError::InvalidTag(pair.trim().to_string()));
                }
                if labels.insert(k.to_string(), v.to_string()).is_some() {
                    return Err(KeyError::DuplicateTag(k.to_string()));
                }
            }
        }

        Ok(Self {
            app_name: app_name.to_string(),
            labels,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Tags, sorted by key
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Canonical form with tags sorted, used as the series identity.
    pub fn normalized(&self) -> String {
        self.to_string()
    }
}

/// Characters with structural meaning in the key grammar
fn is_reserved(c: char) -> bool {
    matches!(c, '{' | '}' | '=' | ',')
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.app_name)?;
        for (i, (k, v)) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,

    #[error("application name is missing")]
    MissingAppName,

    #[error("application name contains reserved character '{0}'")]
    InvalidAppName(char),

    #[error("tag set is not closed with '}}'")]
    UnclosedTags,

    #[error("unexpected characters after tag set: '{0}'")]
    TrailingCharacters(String),

    #[error("invalid tag '{0}', expected key=value")]
    InvalidTag(String),

    #[error("duplicate tag '{0}'")]
    DuplicateTag(String),
}

/// Turns the `name` request parameter into a storage key
pub trait KeyParser: Send + Sync {
    fn parse_key(&self, input: &str) -> Result<Key, KeyError>;
}

/// Default parser using the `app{k=v}` grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentKeyParser;

impl KeyParser for SegmentKeyParser {
    fn parse_key(&self, input: &str) -> Result<Key, KeyError> {
        Key::parse(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_app_name() {
        let key = Key::parse("app.name").unwrap();
        assert_eq!(key.app_name(), "app.name");
        assert!(key.labels().is_empty());
        assert_eq!(key.normalized(), "app.name{}");
    }

    #[test]
    fn test_tags_are_sorted() {
        let key = Key::parse("app.cpu{ region = eu ,env=prod}").unwrap();
        assert_eq!(key.app_name(), "app.cpu");
        assert_eq!(key.labels().get("env").map(String::as_str), Some("prod"));
        assert_eq!(key.normalized(), "app.cpu{env=prod,region=eu}");
    }

    #[test]
    fn test_empty_tag_set() {
        let key = Key::parse("app{}").unwrap();
        assert!(key.labels().is_empty());
    }

    #[test]
    fn test_invalid_keys() {
        assert_eq!(Key::parse(""), Err(KeyError::Empty));
        assert_eq!(Key::parse("  "), Err(KeyError::Empty));
        assert_eq!(Key::parse("{env=prod}"), Err(KeyError::MissingAppName));
        assert_eq!(Key::parse("app{env=prod"), Err(KeyError::UnclosedTags));
        assert_eq!(Key::parse("app=x"), Err(KeyError::InvalidAppName('=')));
        assert!(matches!(
            Key::parse("app{env}"),
            Err(KeyError::InvalidTag(_))
        ));
        assert!(matches!(
            Key::parse("app{env=}"),
            Err(KeyError::InvalidTag(_))
        ));
        assert!(matches!(
            Key::parse("app{env=a}x"),
            Err(KeyError::TrailingCharacters(_))
        ));
        assert_eq!(
            Key::parse("app{env=a,env=b}"),
            Err(KeyError::DuplicateTag("env".to_string()))
        );
    }

    #[test]
    fn test_reserved_characters_in_tags() {
        for input in ["app{a={b}", "app{a=x{y}", "app{{a=b}", "app{a=b=c}"] {
            assert!(
                matches!(Key::parse(input), Err(KeyError::InvalidTag(_))),
                "input {}",
                input
            );
        }
    }
}
