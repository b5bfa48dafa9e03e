//! The YAML collaborator (§6.1).
//!
//! `yaml-rust2` exposes two layers: a convenience `Yaml` tree (`YamlLoader`) and
//! the underlying event stream (`Parser`/`Event`). Only the event stream hands
//! tag names and markers (line/column) to the same callback at the same time, so
//! [`parse_document`] drives the event stream directly through a
//! [`MarkedEventReceiver`] and reassembles a small [`YamlNode`] tree — tag plus
//! scalar/sequence/mapping payload plus [`Span`] — which is the actual boundary
//! the rest of the core consumes. Nothing downstream of this module ever touches
//! `yaml_rust2::Yaml`.

use ahash::AHashMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle, TokenType};

use crate::error::YamletError;
use crate::span::{Position, Span, SourceName};

/// A YAML node, reduced to what the materializer needs: its tag (if any, with
/// the leading `!` stripped), its payload, and where it came from.
#[derive(Debug, Clone)]
pub struct YamlNode {
    pub span: Span,
    pub tag: Option<String>,
    pub data: YamlData,
}

#[derive(Debug, Clone)]
pub enum YamlData {
    /// `plain` is `false` for quoted/literal/folded scalars: only a *plain*
    /// scalar undergoes YAML 1.1 core-schema resolution (§6.1's pinned detail)
    /// into `true`/`false`/`null`/int/float — a quoted `"true"` stays a string.
    Scalar { text: String, plain: bool },
    Sequence(Vec<YamlNode>),
    /// Order-preserving; YAML mappings are not deduplicated or sorted by this layer.
    Mapping(Vec<(YamlNode, YamlNode)>),
    /// `~`/`null` with no tag, or an empty plain scalar. Kept distinct from a
    /// plain `Scalar` so the materializer doesn't need to re-derive it.
    Null,
}

/// Parses `source` (one YAML document) into a [`YamlNode`] tree.
pub fn parse_document(source: &str, file: SourceName) -> Result<YamlNode, YamletError> {
    let mut builder = Builder::new(file);
    let mut parser = Parser::new(source.chars());
    parser.load(&mut builder, false).map_err(|err| YamletError::YamlError {
        message: err.to_string(),
        span: builder.span_at(*err.marker()),
    })?;
    if let Some(err) = builder.error.take() {
        return Err(err);
    }
    builder.root.ok_or_else(|| YamletError::YamlError {
        message: "document contains no content".to_owned(),
        span: Span::new(builder.file.clone(), Position::new(1, 1)),
    })
}

/// Extracts a shorthand tag's suffix (e.g. `!expr` → `"expr"`), ignoring the
/// handle. Non-shorthand (verbatim `!!`/URI) tags are not used by this core and
/// are treated as absent.
fn tag_suffix(tag: Option<TokenType>) -> Option<String> {
    match tag {
        Some(TokenType::Tag(handle, suffix)) if handle == "!" => Some(suffix),
        _ => None,
    }
}

enum Frame {
    Sequence {
        tag: Option<String>,
        span: Span,
        aid: usize,
        items: Vec<YamlNode>,
    },
    Mapping {
        tag: Option<String>,
        span: Span,
        aid: usize,
        entries: Vec<(YamlNode, YamlNode)>,
        pending_key: Option<YamlNode>,
    },
}

struct Builder {
    file: SourceName,
    stack: Vec<Frame>,
    anchors: AHashMap<usize, YamlNode>,
    root: Option<YamlNode>,
    error: Option<YamletError>,
}

impl Builder {
    fn new(file: SourceName) -> Self {
        Self {
            file,
            stack: Vec::new(),
            anchors: AHashMap::new(),
            root: None,
            error: None,
        }
    }

    fn span_at(&self, mark: Marker) -> Span {
        // yaml-rust2 markers are zero-indexed; every other span in the core is
        // one-indexed (§4.7), so both axes shift by one here and nowhere else.
        Span::new(self.file.clone(), Position::new(mark.line() as u32, mark.col() as u32 + 1))
    }

    fn remember_anchor(&mut self, aid: usize, node: &YamlNode) {
        if aid != 0 {
            self.anchors.insert(aid, node.clone());
        }
    }

    fn push_complete(&mut self, node: YamlNode) {
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { pending_key, entries, .. }) => match pending_key.take() {
                None => *pending_key = Some(node),
                Some(key) => entries.push((key, node)),
            },
        }
    }
}

impl MarkedEventReceiver for Builder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        let span = self.span_at(mark);
        match ev {
            Event::Nothing | Event::StreamStart | Event::StreamEnd | Event::DocumentStart | Event::DocumentEnd => {}
            Event::Alias(aid) => match self.anchors.get(&aid).cloned() {
                Some(node) => self.push_complete(node),
                None => {
                    self.error = Some(YamletError::YamlError {
                        message: format!("unresolved alias *{aid}"),
                        span,
                    })
                }
            },
            Event::Scalar(value, style, aid, tag) => {
                let tag = tag_suffix(tag);
                let plain = style == TScalarStyle::Plain;
                let is_plain_null = tag.is_none() && plain && matches!(value.as_str(), "~" | "null" | "Null" | "NULL" | "");
                let node = YamlNode {
                    span,
                    tag,
                    data: if is_plain_null {
                        YamlData::Null
                    } else {
                        YamlData::Scalar { text: value, plain }
                    },
                };
                self.remember_anchor(aid, &node);
                self.push_complete(node);
            }
            Event::SequenceStart(aid, tag) => {
                self.stack.push(Frame::Sequence {
                    tag: tag_suffix(tag),
                    span,
                    aid,
                    items: Vec::new(),
                });
            }
            Event::SequenceEnd => {
                let Some(Frame::Sequence { tag, span, aid, items }) = self.stack.pop() else {
                    self.error = Some(YamletError::YamlError {
                        message: "unbalanced sequence end".to_owned(),
                        span,
                    });
                    return;
                };
                let node = YamlNode {
                    span,
                    tag,
                    data: YamlData::Sequence(items),
                };
                self.remember_anchor(aid, &node);
                self.push_complete(node);
            }
            Event::MappingStart(aid, tag) => {
                self.stack.push(Frame::Mapping {
                    tag: tag_suffix(tag),
                    span,
                    aid,
                    entries: Vec::new(),
                    pending_key: None,
                });
            }
            Event::MappingEnd => {
                let Some(Frame::Mapping { tag, span, aid, entries, .. }) = self.stack.pop() else {
                    self.error = Some(YamletError::YamlError {
                        message: "unbalanced mapping end".to_owned(),
                        span,
                    });
                    return;
                };
                let node = YamlNode {
                    span,
                    tag,
                    data: YamlData::Mapping(entries),
                };
                self.remember_anchor(aid, &node);
                self.push_complete(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> YamlNode {
        parse_document(src, SourceName::from("<test>")).unwrap()
    }

    #[test]
    fn parses_plain_mapping() {
        let node = parse("a: 1\nb: two\n");
        match node.data {
            YamlData::Mapping(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_tagged_scalar() {
        let node = parse("a: !expr \"1 + 2\"\n");
        match node.data {
            YamlData::Mapping(entries) => {
                let (_, value) = &entries[0];
                assert_eq!(value.tag.as_deref(), Some("expr"));
                match &value.data {
                    YamlData::Scalar { text, .. } => assert_eq!(text, "1 + 2"),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_sequence() {
        let node = parse("- 1\n- 2\n- 3\n");
        match node.data {
            YamlData::Sequence(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolves_plain_null() {
        let node = parse("a: ~\nb: null\n");
        match node.data {
            YamlData::Mapping(entries) => {
                assert!(matches!(entries[0].1.data, YamlData::Null));
                assert!(matches!(entries[1].1.data, YamlData::Null));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
