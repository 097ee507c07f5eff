//! The Serializer: walks a [`Document`]'s node arena and feeds the
//! resulting event stream to the [`Emitter`].
//!
//! Mirrors the Composer's node-building half of the round trip: where
//! [`Document::load`] resolves implicit tags on the way in, [`yaml_emitter_dump`]
//! asks the same [`Resolver`] whether a node's tag is the one the core schema
//! would have inferred, and only emits an explicit tag when it isn't.

use crate::{
    yaml_emitter_emit, AnchorInfo, Document, Emitter, EmitterError, Event, Node, NodeData,
    ResolveKind, Resolver,
};

/// Start a YAML stream.
///
/// This function should be used before [`yaml_emitter_dump`] is called.
pub fn yaml_emitter_open(emitter: &mut Emitter) -> Result<(), EmitterError> {
    assert!(!emitter.opened, "emitter already opened");
    let event = Event::stream_start(emitter.encoding);
    yaml_emitter_emit(emitter, event)?;
    emitter.opened = true;
    Ok(())
}

/// Finish a YAML stream.
///
/// This function should be used after [`yaml_emitter_dump`] is called.
pub fn yaml_emitter_close(emitter: &mut Emitter) -> Result<(), EmitterError> {
    assert!(emitter.opened, "emitter not opened");
    if emitter.closed {
        return Ok(());
    }
    yaml_emitter_emit(emitter, Event::stream_end())?;
    emitter.closed = true;
    Ok(())
}

/// Emit a YAML document.
///
/// The document's nodes are consumed: the document is empty again once this
/// returns, whether or not it succeeded. Call [`yaml_emitter_open`] first
/// (once per stream); call this once per document, then [`yaml_emitter_close`]
/// after the last one.
///
/// Implicit tags are resolved against the YAML 1.1 core schema.
pub fn yaml_emitter_dump(
    emitter: &mut Emitter,
    document: &mut Document,
) -> Result<(), EmitterError> {
    let resolver = Resolver::default();
    yaml_emitter_dump_with_resolver(emitter, document, &resolver)
}

/// Like [`yaml_emitter_dump`], but resolving implicit tags with a
/// caller-supplied [`Resolver`]. Share one `Resolver` between loading and
/// dumping to guarantee that a node's tag round-trips exactly.
pub fn yaml_emitter_dump_with_resolver(
    emitter: &mut Emitter,
    document: &mut Document,
    resolver: &Resolver,
) -> Result<(), EmitterError> {
    if !emitter.opened {
        if let Err(err) = yaml_emitter_open(emitter) {
            yaml_emitter_delete_document_and_anchors(emitter, document);
            return Err(err);
        }
    }
    if document.nodes.is_empty() {
        yaml_emitter_close(emitter)?;
    } else {
        assert!(emitter.opened, "emitter not opened");
        emitter.anchors = vec![AnchorInfo::default(); document.nodes.len()];
        let event = Event::document_start(
            document.version_directive,
            &core::mem::take(&mut document.tag_directives),
            document.start_implicit,
        );
        yaml_emitter_emit(emitter, event)?;
        yaml_emitter_anchor_node(emitter, document, 1);
        yaml_emitter_dump_node(emitter, document, 1, resolver)?;
        let event = Event::document_end(document.end_implicit);
        yaml_emitter_emit(emitter, event)?;
    }

    yaml_emitter_delete_document_and_anchors(emitter, document);
    Ok(())
}

fn yaml_emitter_delete_document_and_anchors(emitter: &mut Emitter, document: &mut Document) {
    if emitter.anchors.is_empty() {
        document.nodes.clear();
        return;
    }

    for node in &mut document.nodes {
        match &mut node.data {
            NodeData::Sequence { items, .. } => items.clear(),
            NodeData::Mapping { pairs, .. } => pairs.clear(),
            _ => {}
        }
    }

    document.nodes.clear();
    emitter.anchors.clear();
    emitter.last_anchor_id = 0;
    log::trace!("reset emitter anchor table");
}

fn yaml_emitter_anchor_node_sub(emitter: &mut Emitter, index: i32) {
    emitter.anchors[index as usize - 1].references += 1;
    if emitter.anchors[index as usize - 1].references == 2 {
        emitter.last_anchor_id += 1;
        emitter.anchors[index as usize - 1].anchor = emitter.last_anchor_id;
    }
}

fn yaml_emitter_anchor_node(emitter: &mut Emitter, document: &Document, index: i32) {
    let node = &document.nodes[index as usize - 1];
    emitter.anchors[index as usize - 1].references += 1;
    if emitter.anchors[index as usize - 1].references == 1 {
        match &node.data {
            NodeData::Sequence { items, .. } => {
                for &item in items {
                    yaml_emitter_anchor_node_sub(emitter, item);
                }
            }
            NodeData::Mapping { pairs, .. } => {
                for pair in pairs {
                    yaml_emitter_anchor_node_sub(emitter, pair.key);
                    yaml_emitter_anchor_node_sub(emitter, pair.value);
                }
            }
            _ => {}
        }
    } else if emitter.anchors[index as usize - 1].references == 2 {
        emitter.last_anchor_id += 1;
        emitter.anchors[index as usize - 1].anchor = emitter.last_anchor_id;
    }
}

fn yaml_emitter_generate_anchor(anchor_id: i32) -> String {
    format!("id{anchor_id:03}")
}

fn yaml_emitter_dump_node(
    emitter: &mut Emitter,
    document: &mut Document,
    index: i32,
    resolver: &Resolver,
) -> Result<(), EmitterError> {
    let anchor_id = emitter.anchors[index as usize - 1].anchor;
    let anchor = (anchor_id != 0).then(|| yaml_emitter_generate_anchor(anchor_id));
    if emitter.anchors[index as usize - 1].serialized {
        return yaml_emitter_dump_alias(emitter, anchor.unwrap());
    }
    emitter.anchors[index as usize - 1].serialized = true;

    let node = core::mem::take(&mut document.nodes[index as usize - 1]);
    match node.data {
        NodeData::Scalar { .. } => yaml_emitter_dump_scalar(emitter, node, anchor, resolver),
        NodeData::Sequence { .. } => {
            yaml_emitter_dump_sequence(emitter, document, node, anchor, resolver)
        }
        NodeData::Mapping { .. } => {
            yaml_emitter_dump_mapping(emitter, document, node, anchor, resolver)
        }
        NodeData::NoNode => unreachable!("empty node reached the dumper"),
    }
}

fn yaml_emitter_dump_alias(emitter: &mut Emitter, anchor: String) -> Result<(), EmitterError> {
    yaml_emitter_emit(emitter, Event::alias(&anchor))
}

fn yaml_emitter_dump_scalar(
    emitter: &mut Emitter,
    node: Node,
    anchor: Option<String>,
    resolver: &Resolver,
) -> Result<(), EmitterError> {
    let NodeData::Scalar { value, style } = node.data else {
        unreachable!()
    };

    let resolved = resolver.resolve(ResolveKind::Scalar, None, Some(&value), true);
    let implicit = node.tag.as_deref() == Some(resolved.as_str());

    let event = Event::scalar(
        anchor.as_deref(),
        node.tag.as_deref(),
        &value,
        implicit,
        implicit,
        style,
    );
    yaml_emitter_emit(emitter, event)
}

fn yaml_emitter_dump_sequence(
    emitter: &mut Emitter,
    document: &mut Document,
    node: Node,
    anchor: Option<String>,
    resolver: &Resolver,
) -> Result<(), EmitterError> {
    let NodeData::Sequence { items, style } = node.data else {
        unreachable!()
    };

    let resolved = resolver.resolve(ResolveKind::Sequence, None, None, true);
    let implicit = node.tag.as_deref() == Some(resolved.as_str());

    let event = Event::sequence_start(anchor.as_deref(), node.tag.as_deref(), implicit, style);
    yaml_emitter_emit(emitter, event)?;
    for item in items {
        yaml_emitter_dump_node(emitter, document, item, resolver)?;
    }
    yaml_emitter_emit(emitter, Event::sequence_end())
}

fn yaml_emitter_dump_mapping(
    emitter: &mut Emitter,
    document: &mut Document,
    node: Node,
    anchor: Option<String>,
    resolver: &Resolver,
) -> Result<(), EmitterError> {
    let NodeData::Mapping { pairs, style } = node.data else {
        unreachable!()
    };

    let resolved = resolver.resolve(ResolveKind::Mapping, None, None, true);
    let implicit = node.tag.as_deref() == Some(resolved.as_str());

    let event = Event::mapping_start(anchor.as_deref(), node.tag.as_deref(), implicit, style);
    yaml_emitter_emit(emitter, event)?;
    for pair in pairs {
        yaml_emitter_dump_node(emitter, document, pair.key, resolver)?;
        yaml_emitter_dump_node(emitter, document, pair.value, resolver)?;
    }
    yaml_emitter_emit(emitter, Event::mapping_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{yaml_emitter_new, yaml_emitter_set_output_string, Parser, ScalarStyle, SequenceStyle};

    fn dump(document: &mut Document) -> String {
        let mut emitter = yaml_emitter_new();
        let mut output = Vec::new();
        yaml_emitter_set_output_string(&mut emitter, &mut output);
        yaml_emitter_dump(&mut emitter, document).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn repeated_node_gets_single_anchor_and_two_aliases() {
        let mut document = Document::new(None, &[], true, true);
        let shared = document.add_scalar(None, "1", ScalarStyle::Plain);
        let seq = document.add_sequence(None, SequenceStyle::Block);
        document.append_sequence_item(seq, shared);
        document.append_sequence_item(seq, shared);
        document.append_sequence_item(seq, shared);

        let text = dump(&mut document);
        assert_eq!(text.matches("&id001").count(), 1);
        assert_eq!(text.matches("*id001").count(), 2);
    }

    #[test]
    fn round_trip_preserves_values_tags_and_structure() {
        let mut document = Document::new(None, &[], true, true);
        let mapping = document.add_mapping(None, crate::MappingStyle::Block);
        let key = document.add_scalar(None, "x", ScalarStyle::Plain);
        let value = document.add_scalar(None, "1", ScalarStyle::Plain);
        document.yaml_document_append_mapping_pair(mapping, key, value);

        let text = dump(&mut document);

        let mut bytes = text.as_bytes();
        let mut parser = Parser::new();
        parser.set_input_string(&mut bytes);
        let mut loaded = Document::load(&mut parser).unwrap();

        let root = loaded.get_root_node().unwrap().clone();
        let NodeData::Mapping { pairs, .. } = root.data else {
            panic!("expected mapping");
        };
        assert_eq!(pairs.len(), 1);
        let NodeData::Scalar { value, .. } = &loaded.get_node(pairs[0].value).unwrap().data else {
            panic!("expected scalar");
        };
        assert_eq!(value, "1");
        assert_eq!(
            loaded.get_node(pairs[0].value).unwrap().tag.as_deref(),
            Some(crate::INT_TAG)
        );
    }
}
