//! Converting typed Rust values into tagged [`Document`] nodes — the
//! inverse of [`crate::constructor`].
//!
//! Style selection follows one rule throughout: a collection defaults to
//! flow style if every one of its immediate children is a plain scalar,
//! and to block style otherwise. Scalar style defaults to plain unless the
//! value's text would be misread as something else (or contains characters
//! that force quoting), in which case it is single-quoted.

use base64::Engine;

use crate::constructor::Timestamp;
use crate::resolver::{BINARY_TAG, OMAP_TAG, PAIRS_TAG, SET_TAG};
use crate::{
    Document, MappingStyle, NodeData, RepresenterError, ScalarStyle, SequenceStyle, BOOL_TAG,
    FLOAT_TAG, INT_TAG, NULL_TAG, STR_TAG, TIMESTAMP_TAG,
};

/// Represent `null`.
pub fn represent_null(document: &mut Document) -> i32 {
    document.add_scalar(Some(NULL_TAG), "~", ScalarStyle::Plain)
}

/// Represent a boolean.
pub fn represent_bool(document: &mut Document, value: bool) -> i32 {
    let text = if value { "true" } else { "false" };
    document.add_scalar(Some(BOOL_TAG), text, ScalarStyle::Plain)
}

/// Represent an integer.
pub fn represent_int(document: &mut Document, value: i64) -> i32 {
    document.add_scalar(Some(INT_TAG), &value.to_string(), ScalarStyle::Plain)
}

/// Represent a float, using `.inf`/`-.inf`/`.nan` for non-finite values.
pub fn represent_float(document: &mut Document, value: f64) -> i32 {
    let text = if value.is_nan() {
        ".nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            ".inf".to_string()
        } else {
            "-.inf".to_string()
        }
    } else {
        let mut text = format!("{value}");
        if !text.contains('.') && !text.contains('e') && !text.contains('E') {
            text.push_str(".0");
        }
        text
    };
    document.add_scalar(Some(FLOAT_TAG), &text, ScalarStyle::Plain)
}

/// Represent a timestamp in ISO-8601 extended form.
pub fn represent_timestamp(document: &mut Document, value: &Timestamp) -> i32 {
    let text = value.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string();
    document.add_scalar(Some(TIMESTAMP_TAG), &text, ScalarStyle::Plain)
}

/// Represent a byte string as `!!binary`, base64-encoded in literal block
/// style so long payloads stay readable.
pub fn represent_bytes(document: &mut Document, value: &[u8]) -> i32 {
    let text = base64::engine::general_purpose::STANDARD.encode(value);
    document.add_scalar(Some(BINARY_TAG), &text, ScalarStyle::Literal)
}

/// Represent a string. Quoted unless it is safe to write plain (i.e. unless
/// the core schema would resolve the bare text to something other than
/// `!!str`, or the text is empty).
pub fn represent_str(document: &mut Document, value: &str) -> i32 {
    let style = if needs_quoting(value) {
        ScalarStyle::SingleQuoted
    } else {
        ScalarStyle::Plain
    };
    document.add_scalar(Some(STR_TAG), value, style)
}

fn needs_quoting(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let resolver = crate::resolver::Resolver::default();
    resolver.resolve(crate::resolver::ResolveKind::Scalar, None, Some(value), true) != STR_TAG
}

/// Represent a sequence of already-constructed nodes.
pub fn represent_sequence(document: &mut Document, tag: Option<&str>, items: &[i32]) -> i32 {
    let style = sequence_collection_style(document, items.iter().copied());
    let sequence = document.add_sequence(tag, style);
    for &item in items {
        document.append_sequence_item(sequence, item);
    }
    sequence
}

/// Represent a mapping of already-constructed key/value node pairs.
pub fn represent_mapping(document: &mut Document, tag: Option<&str>, pairs: &[(i32, i32)]) -> i32 {
    let children = pairs.iter().flat_map(|&(k, v)| [k, v]);
    let style = mapping_collection_style(document, children);
    let mapping = document.add_mapping(tag, style);
    for &(key, value) in pairs {
        document.yaml_document_append_mapping_pair(mapping, key, value);
    }
    mapping
}

/// Represent `!!set`: a mapping whose keys are the given nodes, each paired
/// with a `null` value.
pub fn represent_set(document: &mut Document, keys: &[i32]) -> i32 {
    let style = mapping_collection_style(document, keys.iter().copied());
    let mapping = document.add_mapping(Some(SET_TAG), style);
    for &key in keys {
        let value = represent_null(document);
        document.yaml_document_append_mapping_pair(mapping, key, value);
    }
    mapping
}

/// Represent `!!omap`: a sequence of single-pair mappings. Errors if two
/// pairs share an equal key, per the ordered-map invariant.
pub fn represent_omap(
    document: &mut Document,
    pairs: &[(i32, i32)],
) -> Result<i32, RepresenterError> {
    for (i, &(key_a, _)) in pairs.iter().enumerate() {
        for &(key_b, _) in &pairs[i + 1..] {
            if keys_equal(document, key_a, key_b) {
                return Err(RepresenterError::DuplicateOmapKey);
            }
        }
    }
    Ok(represent_ordered_pairs(document, OMAP_TAG, pairs))
}

/// Represent `!!pairs`: a sequence of single-pair mappings, duplicates
/// permitted.
pub fn represent_pairs(document: &mut Document, pairs: &[(i32, i32)]) -> i32 {
    represent_ordered_pairs(document, PAIRS_TAG, pairs)
}

fn represent_ordered_pairs(document: &mut Document, tag: &'static str, pairs: &[(i32, i32)]) -> i32 {
    let mut entries = Vec::with_capacity(pairs.len());
    for &(key, value) in pairs {
        let entry = document.add_mapping(Some(STR_TAG), MappingStyle::Flow);
        document.yaml_document_append_mapping_pair(entry, key, value);
        entries.push(entry);
    }
    let sequence = document.add_sequence(Some(tag), SequenceStyle::Block);
    for entry in entries {
        document.append_sequence_item(sequence, entry);
    }
    sequence
}

fn keys_equal(document: &Document, a: i32, b: i32) -> bool {
    let (Some(a), Some(b)) = (document.get_node(a), document.get_node(b)) else {
        return false;
    };
    match (&a.data, &b.data) {
        (NodeData::Scalar { value: va, .. }, NodeData::Scalar { value: vb, .. }) => {
            a.tag == b.tag && va == vb
        }
        _ => false,
    }
}

/// Flow style is only used when every immediate child is a plain scalar.
fn all_plain_scalars(document: &Document, children: impl Iterator<Item = i32>) -> bool {
    let mut any = false;
    for child in children {
        any = true;
        let is_plain_scalar = document
            .get_node(child)
            .map(|node| matches!(&node.data, NodeData::Scalar { style, .. } if *style == ScalarStyle::Plain))
            .unwrap_or(false);
        if !is_plain_scalar {
            return false;
        }
    }
    any
}

fn sequence_collection_style(document: &Document, children: impl Iterator<Item = i32>) -> SequenceStyle {
    if all_plain_scalars(document, children) {
        SequenceStyle::Flow
    } else {
        SequenceStyle::Block
    }
}

fn mapping_collection_style(document: &Document, children: impl Iterator<Item = i32>) -> MappingStyle {
    if all_plain_scalars(document, children) {
        MappingStyle::Flow
    } else {
        MappingStyle::Block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn represents_scalars_with_expected_tags() {
        let mut document = Document::new(None, &[], true, true);
        let n = represent_int(&mut document, 42);
        assert!(matches!(&document.get_node(n).unwrap().data, NodeData::Scalar { value, .. } if value == "42"));
        assert_eq!(document.get_node(n).unwrap().tag.as_deref(), Some(INT_TAG));
    }

    #[test]
    fn represents_float_infinities() {
        let mut document = Document::new(None, &[], true, true);
        let n = represent_float(&mut document, f64::NEG_INFINITY);
        assert!(matches!(&document.get_node(n).unwrap().data, NodeData::Scalar { value, .. } if value == "-.inf"));
    }

    #[test]
    fn plain_scalar_sequence_gets_flow_style() {
        let mut document = Document::new(None, &[], true, true);
        let a = represent_int(&mut document, 1);
        let b = represent_int(&mut document, 2);
        let seq = represent_sequence(&mut document, None, &[a, b]);
        assert!(matches!(
            &document.get_node(seq).unwrap().data,
            NodeData::Sequence { style: SequenceStyle::Flow, .. }
        ));
    }

    #[test]
    fn quoted_string_child_forces_block_style() {
        let mut document = Document::new(None, &[], true, true);
        let a = document.add_scalar(Some(STR_TAG), "needs quoting: yes", ScalarStyle::SingleQuoted);
        let seq = represent_sequence(&mut document, None, &[a]);
        assert!(matches!(
            &document.get_node(seq).unwrap().data,
            NodeData::Sequence { style: SequenceStyle::Block, .. }
        ));
    }

    #[test]
    fn omap_rejects_duplicate_keys() {
        let mut document = Document::new(None, &[], true, true);
        let k1 = represent_str(&mut document, "a");
        let v1 = represent_int(&mut document, 1);
        let k2 = represent_str(&mut document, "a");
        let v2 = represent_int(&mut document, 2);
        let err = represent_omap(&mut document, &[(k1, v1), (k2, v2)]).unwrap_err();
        assert!(matches!(err, RepresenterError::DuplicateOmapKey));
    }

    #[test]
    fn string_resolving_to_bool_is_quoted() {
        let mut document = Document::new(None, &[], true, true);
        let n = represent_str(&mut document, "yes");
        assert!(matches!(
            &document.get_node(n).unwrap().data,
            NodeData::Scalar { style: ScalarStyle::SingleQuoted, .. }
        ));
    }
}
