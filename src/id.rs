//! Code for handling IDs
//!
//! IDs are reference-counted strings, so they are cheap to clone and can be used as keys in maps
//! without copying the underlying text.

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `Mode`)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }

            /// Get the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}
pub(crate) use define_id_type;

#[cfg(test)]
mod tests {
    define_id_type!(GenericID);

    #[test]
    fn test_id_conversions() {
        let id = GenericID::new("car");
        assert_eq!(id, GenericID::from("car"));
        assert_eq!(id, GenericID::from(String::from("car")));
        assert_eq!(id.as_str(), "car");
        assert_eq!(id.to_string(), "car");
    }

    #[test]
    fn test_id_borrow() {
        let ids: indexmap::IndexSet<GenericID> =
            ["car".into(), "walk".into()].into_iter().collect();
        assert!(ids.contains("walk"));
        assert!(!ids.contains("bike"));
    }
}
