//! Bean names and bean name patterns.
//!
//! Syntax is `domain:key=value[,key=value]*[,*]`. The domain may carry `*`
//! and `?` wildcards, values may be quoted (`"..."` with backslash escapes) or
//! carry wildcards, and a lone `*` entry turns the key list into a pattern
//! that tolerates additional properties.

use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Bean name parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bean name '{name}': {reason}")]
pub struct ObjectNameError {
    name: String,
    reason: &'static str,
}

impl ObjectNameError {
    fn new(name: &str, reason: &'static str) -> Self {
        Self {
            name: name.to_string(),
            reason,
        }
    }

    /// Why the name was rejected
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Property {
    key: String,
    /// Value exactly as written, quotes included
    value: String,
    wildcard: bool,
}

/// Parsed bean name or bean name pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    domain: String,
    properties: Vec<Property>,
    property_list_pattern: bool,
}

impl ObjectName {
    /// Parse a bean name or pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectNameError`] when the domain separator is missing, the
    /// key list is empty, a property is malformed or a key repeats.
    pub fn parse(name: &str) -> Result<Self, ObjectNameError> {
        let Some((domain, key_list)) = name.split_once(':') else {
            return Err(ObjectNameError::new(name, "missing domain separator ':'"));
        };
        if domain.contains(['\n', '=', ',']) {
            return Err(ObjectNameError::new(name, "invalid character in domain"));
        }
        if key_list.is_empty() {
            return Err(ObjectNameError::new(name, "key properties cannot be empty"));
        }

        let mut properties: Vec<Property> = Vec::new();
        let mut property_list_pattern = false;
        let mut rest = key_list;

        loop {
            if let Some(after) = rest.strip_prefix('*') {
                if property_list_pattern {
                    return Err(ObjectNameError::new(name, "repeated '*' in key list"));
                }
                if !(after.is_empty() || after.starts_with(',')) {
                    return Err(ObjectNameError::new(name, "invalid key"));
                }
                property_list_pattern = true;
                rest = after;
            } else {
                let (property, after) = parse_property(name, rest)?;
                if properties.iter().any(|p| p.key == property.key) {
                    return Err(ObjectNameError::new(name, "duplicate key"));
                }
                properties.push(property);
                rest = after;
            }

            match rest.strip_prefix(',') {
                Some("") => return Err(ObjectNameError::new(name, "trailing ','")),
                Some(after) => rest = after,
                None => break,
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
            property_list_pattern,
        })
    }

    /// Domain part.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Value of `key` as written, quotes included.
    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Whether the domain carries wildcards.
    pub fn is_domain_pattern(&self) -> bool {
        self.domain.contains(['*', '?'])
    }

    /// Whether the key list is open (`,*`) or any value carries wildcards.
    pub fn is_property_pattern(&self) -> bool {
        self.property_list_pattern || self.properties.iter().any(|p| p.wildcard)
    }

    /// Whether this name selects zero or more beans instead of exactly one.
    pub fn is_pattern(&self) -> bool {
        self.is_domain_pattern() || self.is_property_pattern()
    }

    /// Key list sorted by key, without any `*` entry.
    pub fn canonical_key_list(&self) -> String {
        let mut sorted: Vec<&Property> = self.properties.iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));
        sorted
            .iter()
            .map(|p| format!("{}={}", p.key, p.value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `domain:` plus the canonical key list.
    pub fn canonical_name(&self) -> String {
        format!("{}:{}", self.domain, self.canonical_key_list())
    }

    /// Whether the concrete `name` is selected by this name.
    pub fn matches(&self, name: &ObjectName) -> bool {
        if !glob_match(&self.domain, &name.domain) {
            return false;
        }
        if !self.property_list_pattern && self.properties.len() != name.properties.len() {
            return false;
        }
        self.properties.iter().all(|wanted| {
            name.key_property(&wanted.key).is_some_and(|value| {
                if wanted.wildcard {
                    glob_match(&wanted.value, value)
                } else {
                    wanted.value == value
                }
            })
        })
    }
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for p in &self.properties {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", p.key, p.value)?;
            first = false;
        }
        if self.property_list_pattern {
            f.write_str(if first { "*" } else { ",*" })?;
        }
        Ok(())
    }
}

fn parse_property<'a>(name: &str, input: &'a str) -> Result<(Property, &'a str), ObjectNameError> {
    let Some((key, after_key)) = input.split_once('=') else {
        return Err(ObjectNameError::new(name, "property without '='"));
    };
    if key.is_empty() {
        return Err(ObjectNameError::new(name, "empty key"));
    }
    if key.contains([',', ':', '*', '?', '"', '\n']) {
        return Err(ObjectNameError::new(name, "invalid character in key"));
    }

    let (value, wildcard, rest) = if after_key.starts_with('"') {
        quoted_value(name, after_key)?
    } else {
        let end = after_key.find(',').unwrap_or(after_key.len());
        let value = &after_key[..end];
        if value.is_empty() {
            return Err(ObjectNameError::new(name, "empty value"));
        }
        if value.contains(['=', ':', '"', '\n']) {
            return Err(ObjectNameError::new(name, "invalid character in value"));
        }
        (value, value.contains(['*', '?']), &after_key[end..])
    };

    Ok((
        Property {
            key: key.to_string(),
            value: value.to_string(),
            wildcard,
        },
        rest,
    ))
}

/// Splits a leading quoted value off `input`; returns it with its quotes.
fn quoted_value<'a>(name: &str, input: &'a str) -> Result<(&'a str, bool, &'a str), ObjectNameError> {
    let mut wildcard = false;
    let mut escaped = false;
    for (i, c) in input.char_indices().skip(1) {
        if escaped {
            if !matches!(c, '"' | '\\' | '*' | '?' | 'n') {
                return Err(ObjectNameError::new(name, "invalid escape in quoted value"));
            }
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' | '?' => wildcard = true,
            '\n' => return Err(ObjectNameError::new(name, "newline in quoted value")),
            '"' => {
                let (value, rest) = input.split_at(i + 1);
                if !(rest.is_empty() || rest.starts_with(',')) {
                    return Err(ObjectNameError::new(name, "text after closing quote"));
                }
                return Ok((value, wildcard, rest));
            }
            _ => {}
        }
    }
    Err(ObjectNameError::new(name, "unterminated quoted value"))
}

/// `*` matches any run of characters, `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push_str("(?s)^");
    let mut literal = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            _ => translated.push_str(&regex::escape(c.encode_utf8(&mut literal))),
        }
    }
    translated.push('$');
    Regex::new(&translated).is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn name(s: &str) -> ObjectName {
        ObjectName::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let n = name("java.lang:type=Memory");
        assert_eq!(n.domain(), "java.lang");
        assert_eq!(n.key_property("type"), Some("Memory"));
        assert!(!n.is_pattern());
        assert_eq!(n.to_string(), "java.lang:type=Memory");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "java.lang",
            "java.lang:",
            "java.lang:type",
            "java.lang:=Memory",
            "java.lang:type=",
            "java.lang:type=Memory,",
            "java.lang:type=a,type=b",
            "java.lang:type=\"open",
            "java.lang:type=\"x\"y",
            "java.lang:*,*",
            "java.lang:ty*pe=x",
        ] {
            assert!(ObjectName::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_quoted_value() {
        let n = name("d:name=\"a,b=c\",type=X");
        assert_eq!(n.key_property("name"), Some("\"a,b=c\""));
        assert_eq!(n.key_property("type"), Some("X"));
        assert!(!n.is_pattern());

        let escaped = name(r#"d:name="a\"b""#);
        assert!(!escaped.is_pattern());
        assert!(name(r#"d:name="a*""#).is_pattern());
        assert!(!name(r#"d:name="a\*""#).is_pattern());
    }

    #[test]
    fn test_pattern_detection() {
        assert!(name("*:type=Memory").is_domain_pattern());
        assert!(name("java.lang:type=*").is_property_pattern());
        assert!(name("java.lang:type=Garbage?ollector,*").is_pattern());
        assert!(name("java.lang:*").is_pattern());
        assert!(name("java.lang:type=Memory,*").is_property_pattern());
        assert!(!name("java.lang:type=Memory,name=x").is_pattern());
    }

    #[test]
    fn test_canonical_key_list_sorts() {
        let n = name("java.lang:type=GarbageCollector,name=G1 Young Generation");
        assert_eq!(
            n.canonical_key_list(),
            "name=G1 Young Generation,type=GarbageCollector"
        );
        assert_eq!(
            n.to_string(),
            "java.lang:type=GarbageCollector,name=G1 Young Generation"
        );
    }

    #[test]
    fn test_matches() {
        let gc = name("java.lang:name=G1 Old Generation,type=GarbageCollector");
        assert!(name("java.lang:type=GarbageCollector,*").matches(&gc));
        assert!(name("java.lang:type=GarbageCollector,name=*").matches(&gc));
        assert!(name("java.*:type=Garbage?ollector,*").matches(&gc));
        assert!(name("*:*").matches(&gc));
        assert!(!name("java.lang:type=GarbageCollector").matches(&gc));
        assert!(!name("java.nio:*").matches(&gc));
        assert!(!name("java.lang:type=Memory,*").matches(&gc));
    }

    #[test]
    fn test_glob() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
        assert!(glob_match("*b*", "abc"));
        assert!(!glob_match("abc", "abcd"));
    }

    #[test]
    fn test_glob_metacharacters_are_literal() {
        assert!(glob_match("a.b+c", "a.b+c"));
        assert!(!glob_match("a.b+c", "axbbc"));
        assert!(glob_match("[x](y)*", "[x](y)|z"));
        assert!(!glob_match("^a$", "a"));
        assert!(glob_match("line?two", "line\ntwo"));
        assert!(glob_match("*", "multi\nline"));
    }

    proptest! {
        #[test]
        fn prop_display_reparses(
            domain in "[a-z][a-z.]{0,8}",
            props in proptest::collection::btree_map("[a-z]{1,6}", "[A-Za-z0-9 ]{1,8}", 1..4),
        ) {
            let text = format!(
                "{domain}:{}",
                props.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",")
            );
            let parsed = ObjectName::parse(&text).unwrap();
            prop_assert_eq!(parsed.to_string(), text);
            prop_assert!(!parsed.is_pattern());
            prop_assert!(parsed.matches(&parsed));
        }

        #[test]
        fn prop_star_matches_everything(text in "\\PC{0,16}") {
            prop_assert!(glob_match("*", &text));
        }
    }
}
