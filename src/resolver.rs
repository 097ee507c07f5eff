//! Implicit scalar/collection tag resolution (YAML 1.1 core schema).
//!
//! A [`Resolver`] holds the fixed table of (tag, regex) rules used to assign
//! a tag to a plain scalar that carries no explicit tag, indexed by the
//! scalar's first character for O(1) dispatch to a short candidate list.
//! The same table is consulted on the load path (by the Composer, to decide
//! a node's tag) and on the dump path (by the Serializer, to decide whether
//! a node's tag can be omitted because the resolver would reconstruct it).

use std::collections::HashMap;

use regex::Regex;

use crate::{DEFAULT_MAPPING_TAG, DEFAULT_SCALAR_TAG, DEFAULT_SEQUENCE_TAG};

/// `tag:yaml.org,2002:bool`
pub const BOOL_TAG: &str = "tag:yaml.org,2002:bool";
/// `tag:yaml.org,2002:int`
pub const INT_TAG: &str = "tag:yaml.org,2002:int";
/// `tag:yaml.org,2002:float`
pub const FLOAT_TAG: &str = "tag:yaml.org,2002:float";
/// `tag:yaml.org,2002:null`
pub const NULL_TAG: &str = "tag:yaml.org,2002:null";
/// `tag:yaml.org,2002:timestamp`
pub const TIMESTAMP_TAG: &str = "tag:yaml.org,2002:timestamp";
/// `tag:yaml.org,2002:merge`
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";
/// `tag:yaml.org,2002:value`
pub const VALUE_TAG: &str = "tag:yaml.org,2002:value";
/// `tag:yaml.org,2002:yaml`
pub const YAML_TAG: &str = "tag:yaml.org,2002:yaml";
/// `tag:yaml.org,2002:binary`
pub const BINARY_TAG: &str = "tag:yaml.org,2002:binary";
/// `tag:yaml.org,2002:set`
pub const SET_TAG: &str = "tag:yaml.org,2002:set";
/// `tag:yaml.org,2002:omap`
pub const OMAP_TAG: &str = "tag:yaml.org,2002:omap";
/// `tag:yaml.org,2002:pairs`
pub const PAIRS_TAG: &str = "tag:yaml.org,2002:pairs";

/// Which kind of node a [`Resolver::resolve`] call is resolving a tag for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResolveKind {
    /// A plain or quoted scalar.
    Scalar,
    /// A sequence (block or flow).
    Sequence,
    /// A mapping (block or flow).
    Mapping,
}

struct ResolverRule {
    tag: &'static str,
    regex: Regex,
}

/// The implicit-tag resolution table for the YAML 1.1 core schema.
///
/// Cheap to clone (it is typically built once via [`Resolver::default`] and
/// shared by reference between a loader and a dumper).
pub struct Resolver {
    rules: Vec<ResolverRule>,
    by_first_char: HashMap<char, Vec<usize>>,
    empty_candidates: Vec<usize>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("rules", &self.rules.iter().map(|r| r.tag).collect::<Vec<_>>())
            .finish()
    }
}

impl Resolver {
    /// Build an empty resolver with no rules (only the default scalar,
    /// sequence, and mapping tags apply).
    pub fn empty() -> Resolver {
        Resolver {
            rules: Vec::new(),
            by_first_char: HashMap::new(),
            empty_candidates: Vec::new(),
        }
    }

    /// Register one (tag, pattern, first-chars) rule at the end of the
    /// priority list. `pattern` is matched against the whole scalar value
    /// (it is automatically anchored). `first_chars` lists every character
    /// a matching value can start with; include `'\0'` if an empty string
    /// should be considered.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` does not compile as a regular expression. This
    /// is only ever called with the fixed, compile-time-known patterns in
    /// this module, so a panic here indicates a bug in this crate.
    pub fn add_implicit_resolver(&mut self, tag: &'static str, pattern: &str, first_chars: &str) {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored).expect("resolver pattern must compile");
        let index = self.rules.len();
        self.rules.push(ResolverRule { tag, regex });
        for ch in first_chars.chars() {
            if ch == '\0' {
                self.empty_candidates.push(index);
            } else {
                self.by_first_char.entry(ch).or_default().push(index);
            }
        }
    }

    /// Resolve the implicit tag for a node.
    ///
    /// `tag` is the node's explicit tag, if any (`None` and `Some("!")`
    /// both mean "no explicit tag" per YAML 1.1). `value` is the scalar's
    /// text; ignored for sequences and mappings. `implicit` is whether the
    /// scalar was written in a style eligible for implicit resolution
    /// (plain, or an unquoted flow entry) — quoted scalars are never
    /// implicitly resolved to anything but `!!str`.
    pub fn resolve(
        &self,
        kind: ResolveKind,
        tag: Option<&str>,
        value: Option<&str>,
        implicit: bool,
    ) -> String {
        if let Some(tag) = tag {
            if !tag.is_empty() && tag != "!" {
                return tag.to_string();
            }
        }
        match kind {
            ResolveKind::Sequence => DEFAULT_SEQUENCE_TAG.to_string(),
            ResolveKind::Mapping => DEFAULT_MAPPING_TAG.to_string(),
            ResolveKind::Scalar => {
                if !implicit {
                    return DEFAULT_SCALAR_TAG.to_string();
                }
                let value = value.unwrap_or("");
                let candidates: &[usize] = if value.is_empty() {
                    &self.empty_candidates
                } else {
                    match value.chars().next().and_then(|c| self.by_first_char.get(&c)) {
                        Some(v) => v,
                        None => {
                            log::trace!("resolver: no rule for first character of {value:?}, falling back to {DEFAULT_SCALAR_TAG}");
                            return DEFAULT_SCALAR_TAG.to_string();
                        }
                    }
                };
                for &index in candidates {
                    if self.rules[index].regex.is_match(value) {
                        return self.rules[index].tag.to_string();
                    }
                }
                log::trace!("resolver: no rule matched {value:?}, falling back to {DEFAULT_SCALAR_TAG}");
                DEFAULT_SCALAR_TAG.to_string()
            }
        }
    }
}

impl Default for Resolver {
    /// The standard YAML 1.1 core schema resolver: bool, int, float, null,
    /// timestamp, merge, value, and the documentation-only `!`/`&`/`*`
    /// `yaml` tag, in that priority order.
    fn default() -> Resolver {
        let mut resolver = Resolver::empty();
        resolver.add_implicit_resolver(
            BOOL_TAG,
            "yes|Yes|YES|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF",
            "yYnNtTfFoO",
        );
        resolver.add_implicit_resolver(
            INT_TAG,
            concat!(
                r"[-+]?0b[0-1_]+",
                r"|[-+]?0[0-7_]+",
                r"|[-+]?(?:0|[1-9][0-9_]*)",
                r"|[-+]?0x[0-9a-fA-F_]+",
                r"|[-+]?[1-9][0-9_]*(?::[0-5]?[0-9])+",
            ),
            "-+0123456789",
        );
        resolver.add_implicit_resolver(
            FLOAT_TAG,
            concat!(
                r"[-+]?(?:[0-9][0-9_]*)\.[0-9_]*(?:[eE][-+]?[0-9]+)?",
                r"|\.[0-9_]+(?:[eE][-+]?[0-9]+)?",
                r"|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*",
                r"|[-+]?\.(?:inf|Inf|INF)",
                r"|\.(?:nan|NaN|NAN)",
            ),
            "-+0123456789.",
        );
        resolver.add_implicit_resolver(NULL_TAG, r"~|null|Null|NULL|", "~nN\0");
        resolver.add_implicit_resolver(
            TIMESTAMP_TAG,
            concat!(
                r"[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]",
                r"|[0-9][0-9][0-9][0-9]-[0-9][0-9]?-[0-9][0-9]?",
                r"(?:[Tt]|[ \t]+)[0-9][0-9]?:[0-9][0-9]:[0-9][0-9](?:\.[0-9]*)?",
                r"(?:[ \t]*(?:Z|[-+][0-9][0-9]?(?::[0-9][0-9])?))?",
            ),
            "0123456789",
        );
        resolver.add_implicit_resolver(MERGE_TAG, "<<", "<");
        resolver.add_implicit_resolver(VALUE_TAG, "=", "=");
        resolver.add_implicit_resolver(YAML_TAG, r"!|&|\*", "!&*");
        resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_scalar(resolver: &Resolver, value: &str) -> String {
        resolver.resolve(ResolveKind::Scalar, None, Some(value), true)
    }

    #[test]
    fn resolves_booleans() {
        let resolver = Resolver::default();
        for value in ["yes", "NO", "True", "on", "OFF"] {
            assert_eq!(resolve_scalar(&resolver, value), BOOL_TAG, "{value}");
        }
    }

    #[test]
    fn resolves_null() {
        let resolver = Resolver::default();
        for value in ["", "~", "null", "Null", "NULL"] {
            assert_eq!(resolve_scalar(&resolver, value), NULL_TAG, "{value:?}");
        }
    }

    #[test]
    fn resolves_sexagesimal_int_and_float() {
        let resolver = Resolver::default();
        assert_eq!(resolve_scalar(&resolver, "190:20:30"), INT_TAG);
        assert_eq!(resolve_scalar(&resolver, "190:20:30.15"), FLOAT_TAG);
    }

    #[test]
    fn resolves_merge_and_value() {
        let resolver = Resolver::default();
        assert_eq!(resolve_scalar(&resolver, "<<"), MERGE_TAG);
        assert_eq!(resolve_scalar(&resolver, "="), VALUE_TAG);
    }

    #[test]
    fn plain_string_falls_back_to_str() {
        let resolver = Resolver::default();
        assert_eq!(resolve_scalar(&resolver, "hello world"), DEFAULT_SCALAR_TAG);
    }

    #[test]
    fn non_implicit_scalar_is_always_str() {
        let resolver = Resolver::default();
        assert_eq!(
            resolver.resolve(ResolveKind::Scalar, None, Some("yes"), false),
            DEFAULT_SCALAR_TAG
        );
    }

    #[test]
    fn explicit_tag_is_returned_unchanged() {
        let resolver = Resolver::default();
        assert_eq!(
            resolver.resolve(ResolveKind::Scalar, Some("tag:example.com,2000:custom"), Some("yes"), true),
            "tag:example.com,2000:custom"
        );
    }

    #[test]
    fn collections_get_default_tags() {
        let resolver = Resolver::default();
        assert_eq!(
            resolver.resolve(ResolveKind::Sequence, None, None, true),
            DEFAULT_SEQUENCE_TAG
        );
        assert_eq!(
            resolver.resolve(ResolveKind::Mapping, None, None, true),
            DEFAULT_MAPPING_TAG
        );
    }
}
