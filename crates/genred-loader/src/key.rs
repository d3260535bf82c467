//! Content-addressed routine identity
//!
//! A routine is identified by the blake3 digest of its aliases, formula and
//! precision. File names on disk are limited in length, so the digest (not
//! the formula itself) names the compiled library.

use std::ffi::OsString;

use crate::precision::Precision;

/// Cache key of one routine set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutineKey {
    name: String,
    precision: Precision,
}

impl RoutineKey {
    /// Hash already-normalized aliases and formula
    fn from_normalized(aliases: &[String], formula: &str, precision: Precision) -> Self {
        let mut hasher = blake3::Hasher::new();
        for alias in aliases {
            hasher.update(alias.as_bytes());
            hasher.update(b",");
        }
        hasher.update(formula.as_bytes());
        hasher.update(b"_");
        hasher.update(precision.type_name().as_bytes());

        Self {
            name: hasher.finalize().to_hex().to_string(),
            precision,
        }
    }

    /// Hex digest naming the routine
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Platform library file name (`lib<digest>.so`, `<digest>.dll`, ...)
    pub fn library_file_name(&self) -> OsString {
        libloading::library_filename(&self.name)
    }

    /// Manifest file name written next to the library
    pub fn manifest_file_name(&self) -> String {
        format!("{}.json", self.name)
    }
}

/// Everything needed to locate or build one routine set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineRequest {
    key: RoutineKey,
    aliases: Vec<String>,
    formula: String,
}

impl RoutineRequest {
    /// Normalize (strip whitespace) and hash the inputs
    pub fn new<S: AsRef<str>>(aliases: &[S], formula: &str, precision: Precision) -> Self {
        let aliases: Vec<String> = aliases.iter().map(|a| strip_whitespace(a.as_ref())).collect();
        let formula = strip_whitespace(formula);
        let key = RoutineKey::from_normalized(&aliases, &formula, precision);
        Self { key, aliases, formula }
    }

    pub fn key(&self) -> &RoutineKey {
        &self.key
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn precision(&self) -> Precision {
        self.key.precision
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> Vec<String> {
        vec!["x=Var(0,3,0)".to_string(), "y=Var(1,3,1)".to_string()]
    }

    #[test]
    fn whitespace_is_insignificant() {
        let a = RoutineRequest::new(&aliases(), "SqDist(x,y)", Precision::Float);
        let b = RoutineRequest::new(&["x = Var(0, 3, 0)", " y=Var(1,3,1)"], "SqDist( x, y )", Precision::Float);
        assert_eq!(a.key(), b.key());
        assert_eq!(b.formula(), "SqDist(x,y)");
        assert_eq!(b.aliases()[0], "x=Var(0,3,0)");
    }

    #[test]
    fn precision_salts_the_key() {
        let f = RoutineRequest::new(&aliases(), "SqDist(x,y)", Precision::Float);
        let d = RoutineRequest::new(&aliases(), "SqDist(x,y)", Precision::Double);
        assert_ne!(f.key().name(), d.key().name());
    }

    #[test]
    fn formula_and_aliases_change_the_key() {
        let base = RoutineRequest::new(&aliases(), "SqDist(x,y)", Precision::Float);
        let other_formula = RoutineRequest::new(&aliases(), "SqNorm2(x-y)", Precision::Float);
        let other_aliases = RoutineRequest::new(&aliases()[..1], "SqDist(x,y)", Precision::Float);
        assert_ne!(base.key(), other_formula.key());
        assert_ne!(base.key(), other_aliases.key());
    }

    #[test]
    fn name_is_a_hex_digest() {
        let key = RoutineRequest::new(&aliases(), "SqDist(x,y)", Precision::Double).key().clone();
        assert_eq!(key.name().len(), 64);
        assert!(key.name().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(key.library_file_name().to_string_lossy().contains(key.name()));
        assert_eq!(key.manifest_file_name(), format!("{}.json", key.name()));
    }
}
