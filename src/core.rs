//! # Core
//!
//! Serde helpers shared by the DID and credential data models.

use serde::{Deserialize, Serialize};

/// `Kind` allows serde to serialize/deserialize a string or an object.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Kind<T> {
    /// Simple string value
    String(String),

    /// Complex object value
    Object(T),
}

impl<T> Default for Kind<T> {
    fn default() -> Self {
        Self::String(String::new())
    }
}

impl<T> Kind<T> {
    /// Returns the string value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Object(_) => None,
        }
    }

    /// Returns the object value, if any.
    pub const fn as_object(&self) -> Option<&T> {
        match self {
            Self::String(_) => None,
            Self::Object(o) => Some(o),
        }
    }
}

impl<T> From<String> for Kind<T> {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T> From<&str> for Kind<T> {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// `OneMany` allows serde to serialize/deserialize a single object or a set of
/// objects.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneMany<T> {
    /// Single object
    One(T),

    /// Set of objects
    Many(Vec<T>),
}

impl<T> Default for OneMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneMany<T> {
    /// Adds an object to the `OneMany`. If the `OneMany` is a single object, it is
    /// converted to a set of objects.
    pub fn add(&mut self, item: T) {
        match std::mem::take(self) {
            Self::One(one) => *self = Self::Many(vec![one, item]),
            Self::Many(mut many) => {
                many.push(item);
                *self = Self::Many(many);
            }
        }
    }

    /// Returns the length of the `OneMany`.
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(many) => many.len(),
        }
    }

    /// Returns `true` if the `OneMany` is an empty `Many`.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(many) => many.is_empty(),
        }
    }

    /// Iterate over the contained objects.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Self::One(one) => std::slice::from_ref(one).iter(),
            Self::Many(many) => many.iter(),
        }
    }

    /// The first object, if any.
    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }
}

impl<T: PartialEq> OneMany<T> {
    /// Returns `true` if `item` is one of the contained objects.
    pub fn contains(&self, item: &T) -> bool {
        self.iter().any(|i| i == item)
    }
}

impl<T> From<Vec<T>> for OneMany<T> {
    fn from(value: Vec<T>) -> Self {
        Self::Many(value)
    }
}

impl<'a, T> IntoIterator for &'a OneMany<T> {
    type IntoIter = std::slice::Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_many_shapes() {
        let one: OneMany<String> = serde_json::from_str(r#""a""#).expect("should deserialize");
        assert_eq!(one.len(), 1);
        assert_eq!(serde_json::to_string(&one).expect("should serialize"), r#""a""#);

        let mut many: OneMany<String> =
            serde_json::from_str(r#"["a","b"]"#).expect("should deserialize");
        many.add("c".to_string());
        assert_eq!(many.len(), 3);
        assert!(many.contains(&"c".to_string()));
    }

    #[test]
    fn add_to_one() {
        let mut one = OneMany::One(1);
        one.add(2);
        assert_eq!(one, OneMany::Many(vec![1, 2]));
    }

    #[test]
    fn kind_shapes() {
        let kind: Kind<serde_json::Value> =
            serde_json::from_str(r#"{"id":"x"}"#).expect("should deserialize");
        assert!(kind.as_object().is_some());
        assert_eq!(Kind::<serde_json::Value>::from("y").as_str(), Some("y"));
    }
}
