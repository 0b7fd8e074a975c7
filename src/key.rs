//! Request keys identifying what a build was asked to produce.

use std::any::TypeId;
use std::fmt;

/// Identity of a requested contract: a type or trait, optionally named.
///
/// Every build node records the key it was created for. The tracker compares
/// keys to check that post-build notifications pair with the right pre-build,
/// so equality follows the contract identity and ignores the diagnostic names.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetimes::{key_of_type, named_key_of_type, Key};
///
/// struct Database;
///
/// let unnamed = key_of_type::<Database>();
/// let primary = named_key_of_type::<Database>("primary");
/// assert_ne!(unnamed, primary);
/// assert_eq!(primary.service_name(), Some("primary"));
///
/// let logger = Key::Trait("dyn app::Logger");
/// assert_eq!(logger.display_name(), "dyn app::Logger");
/// ```
#[derive(Debug, Clone)]
pub enum Key {
    /// Concrete type with its `TypeId` and name for diagnostics.
    Type(TypeId, &'static str),
    /// Trait contract; traits have no `TypeId`, the name is the identity.
    Trait(&'static str),
    /// Named concrete type: `TypeId`, type name, registration name.
    TypeNamed(TypeId, &'static str, &'static str),
    /// Named trait contract: trait name, registration name.
    TraitNamed(&'static str, &'static str),
}

impl Key {
    /// The type or trait name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
            Key::TypeNamed(_, name, _) => name,
            Key::TraitNamed(name, _) => name,
        }
    }

    /// The registration name for named contracts.
    pub fn service_name(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) | Key::Trait(_) => None,
            Key::TypeNamed(_, _, name) => Some(name),
            Key::TraitNamed(_, name) => Some(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service_name() {
            Some(name) => write!(f, "{}[{}]", self.display_name(), name),
            None => f.write_str(self.display_name()),
        }
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::TypeNamed(a, _, name_a), Key::TypeNamed(b, _, name_b)) => {
                a == b && name_a == name_b
            }
            (Key::Trait(a), Key::Trait(b)) => a == b,
            (Key::TraitNamed(a, name_a), Key::TraitNamed(b, name_b)) => {
                a == b && name_a == name_b
            }
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::TypeNamed(id, _, name) => {
                1u8.hash(state);
                id.hash(state);
                name.hash(state);
            }
            Key::Trait(name) => {
                2u8.hash(state);
                name.hash(state);
            }
            Key::TraitNamed(name, named) => {
                3u8.hash(state);
                name.hash(state);
                named.hash(state);
            }
        }
    }
}

/// Key for an unnamed concrete type.
#[inline]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a named registration of a concrete type.
#[inline]
pub fn named_key_of_type<T: 'static>(name: &'static str) -> Key {
    Key::TypeNamed(TypeId::of::<T>(), std::any::type_name::<T>(), name)
}
