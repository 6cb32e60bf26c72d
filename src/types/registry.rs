//! Named type definitions for the node's custom on-chain types.
//!
//! The registry mirrors the type-bundle shape the JavaScript API consumes:
//!
//! ```json
//! {
//!   "BlogId": "u64",
//!   "Change": { "account": "AccountId", "block": "BlockNumber", "time": "Moment" },
//!   "ReactionKind": { "_enum": ["Upvote", "Downvote"] }
//! }
//! ```
//!
//! Struct field order is significant (SCALE encodes fields in order), so
//! definitions are kept in registration order rather than in a sorted map.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Types every node understands without registration.
const PRIMITIVES: &[&str] = &[
    "Null",
    "bool",
    "u8",
    "u16",
    "u32",
    "u64",
    "u128",
    "i8",
    "i16",
    "i32",
    "i64",
    "i128",
    "Text",
    "Bytes",
    "AccountId",
    "BlockNumber",
    "Moment",
    "Balance",
    "Hash",
];

/// Generic wrappers that take exactly one type argument.
const WRAPPERS: &[&str] = &["Vec", "Option", "Compact", "Box"];

// ============================================================================
// TypeDef
// ============================================================================

/// One enum variant, optionally carrying a payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Variant name.
    pub name: String,
    /// Payload type expression, `None` for unit variants.
    pub payload: Option<String>,
}

/// A custom type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    /// Another name for an existing type expression.
    Alias(String),
    /// Struct with ordered `(field, type)` pairs.
    Struct(Vec<(String, String)>),
    /// Tagged enum.
    Enum(Vec<Variant>),
}

impl TypeDef {
    /// Creates an alias definition.
    #[inline]
    #[must_use]
    pub fn alias(target: &str) -> Self {
        Self::Alias(target.to_string())
    }

    /// Creates a struct definition from `(field, type)` pairs.
    #[must_use]
    pub fn structure(fields: &[(&str, &str)]) -> Self {
        Self::Struct(
            fields
                .iter()
                .map(|(field, ty)| ((*field).to_string(), (*ty).to_string()))
                .collect(),
        )
    }

    /// Creates an enum of unit variants.
    #[must_use]
    pub fn unit_enum(variants: &[&str]) -> Self {
        Self::Enum(
            variants
                .iter()
                .map(|name| Variant {
                    name: (*name).to_string(),
                    payload: None,
                })
                .collect(),
        )
    }

    /// Creates an enum whose variants may carry a payload.
    #[must_use]
    pub fn data_enum(variants: &[(&str, Option<&str>)]) -> Self {
        Self::Enum(
            variants
                .iter()
                .map(|(name, payload)| Variant {
                    name: (*name).to_string(),
                    payload: payload.map(str::to_string),
                })
                .collect(),
        )
    }

    /// Returns every type expression this definition refers to.
    fn references(&self) -> Vec<&str> {
        match self {
            Self::Alias(target) => vec![target.as_str()],
            Self::Struct(fields) => fields.iter().map(|(_, ty)| ty.as_str()).collect(),
            Self::Enum(variants) => variants
                .iter()
                .filter_map(|v| v.payload.as_deref())
                .collect(),
        }
    }
}

impl Serialize for TypeDef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Alias(target) => serializer.serialize_str(target),
            Self::Struct(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (field, ty) in fields {
                    map.serialize_entry(field, ty)?;
                }
                map.end()
            }
            Self::Enum(variants) => {
                let mut map = serializer.serialize_map(Some(1))?;
                if variants.iter().all(|v| v.payload.is_none()) {
                    let names: Vec<&str> = variants.iter().map(|v| v.name.as_str()).collect();
                    map.serialize_entry("_enum", &names)?;
                } else {
                    map.serialize_entry("_enum", &VariantMap(variants))?;
                }
                map.end()
            }
        }
    }
}

/// Object form of `_enum`, unit variants mapped to `"Null"`.
struct VariantMap<'a>(&'a [Variant]);

impl Serialize for VariantMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for variant in self.0 {
            map.serialize_entry(&variant.name, variant.payload.as_deref().unwrap_or("Null"))?;
        }
        map.end()
    }
}

// ============================================================================
// TypeRegistry
// ============================================================================

/// Ordered collection of named custom types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    /// Definitions in registration order.
    types: Vec<(String, TypeDef)>,
    /// Name → position in `types`.
    index: FxHashMap<String, usize>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one named type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeRegistration`] if the name is a primitive or
    /// already registered.
    pub fn register(&mut self, name: &str, def: TypeDef) -> Result<()> {
        if PRIMITIVES.contains(&name) {
            return Err(Error::type_registration(format!(
                "{name} shadows a built-in type"
            )));
        }
        if self.index.contains_key(name) {
            return Err(Error::type_registration(format!(
                "{name} is registered twice"
            )));
        }

        self.index.insert(name.to_string(), self.types.len());
        self.types.push((name.to_string(), def));
        Ok(())
    }

    /// Checks that every referenced type resolves.
    ///
    /// Forward references are allowed, so this runs after a whole bundle
    /// has been registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeRegistration`] naming the first unresolved type.
    pub fn validate(&self) -> Result<()> {
        for (name, def) in &self.types {
            for expr in def.references() {
                if !self.resolves(expr) {
                    return Err(Error::type_registration(format!(
                        "{name} refers to unknown type {expr}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns a definition by name.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.index.get(name).map(|&i| &self.types[i].1)
    }

    /// Returns `true` if a type with this name is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|(name, _)| name.as_str())
    }

    /// Serializes the registry as a type bundle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns `true` if a type expression resolves against this registry.
    #[must_use]
    pub fn resolves(&self, expr: &str) -> bool {
        let expr = expr.trim();

        if let Some(inner) = expr.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            return split_top_level(inner)
                .into_iter()
                .filter(|part| !part.trim().is_empty())
                .all(|part| self.resolves(part));
        }

        if let Some(inner) = expr.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return match inner.rsplit_once(';') {
                Some((ty, len)) => len.trim().parse::<usize>().is_ok() && self.resolves(ty),
                None => false,
            };
        }

        if let Some((wrapper, rest)) = expr.split_once('<') {
            return match rest.strip_suffix('>') {
                Some(inner) => WRAPPERS.contains(&wrapper.trim()) && self.resolves(inner),
                None => false,
            };
        }

        PRIMITIVES.contains(&expr) || self.index.contains_key(expr)
    }
}

impl Serialize for TypeRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.types.len()))?;
        for (name, def) in &self.types {
            map.serialize_entry(name, def)?;
        }
        map.end()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Splits on commas that are not nested inside `<>`, `()` or `[]`.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

// ============================================================================
// Tests
// ============================================================================
