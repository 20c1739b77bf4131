//! Events annotated with the value they were produced from.
//!
//! Visitors create these, the event emitter chain fills in tags and styles,
//! and the innermost stage turns them into plain [`Event`]s.

use crate::descriptor::ValueDescriptor;
use crate::events::{CollectionStyle, Event, ScalarStyle};
use crate::ser::render::scalar_text;

#[derive(Clone, Debug)]
pub struct AliasEventInfo {
    pub source: ValueDescriptor,
    pub alias: String,
}

#[derive(Clone, Debug)]
pub struct ScalarEventInfo {
    pub source: ValueDescriptor,
    pub anchor: Option<String>,
    pub tag: Option<String>,
    pub rendered_value: String,
    pub style: ScalarStyle,
    pub plain_implicit: bool,
    pub quoted_implicit: bool,
}

impl ScalarEventInfo {
    pub fn new(source: ValueDescriptor) -> Self {
        let rendered_value = scalar_text(source.value()).unwrap_or_default();
        let style = source.scalar_style();
        Self {
            source,
            anchor: None,
            tag: None,
            rendered_value,
            style,
            plain_implicit: true,
            quoted_implicit: true,
        }
    }
}

/// Start of a mapping or a sequence.
#[derive(Clone, Debug)]
pub struct CollectionEventInfo {
    pub source: ValueDescriptor,
    pub anchor: Option<String>,
    pub tag: Option<String>,
    pub implicit: bool,
    pub style: CollectionStyle,
}

impl CollectionEventInfo {
    pub fn new(source: ValueDescriptor) -> Self {
        Self {
            source,
            anchor: None,
            tag: None,
            implicit: true,
            style: CollectionStyle::Any,
        }
    }
}

#[derive(Clone, Debug)]
pub enum EventInfo {
    Alias(AliasEventInfo),
    Scalar(ScalarEventInfo),
    MappingStart(CollectionEventInfo),
    MappingEnd(ValueDescriptor),
    SequenceStart(CollectionEventInfo),
    SequenceEnd(ValueDescriptor),
}

impl EventInfo {
    pub fn source(&self) -> &ValueDescriptor {
        match self {
            EventInfo::Alias(info) => &info.source,
            EventInfo::Scalar(info) => &info.source,
            EventInfo::MappingStart(info) | EventInfo::SequenceStart(info) => &info.source,
            EventInfo::MappingEnd(source) | EventInfo::SequenceEnd(source) => source,
        }
    }
}

impl From<EventInfo> for Event {
    fn from(info: EventInfo) -> Self {
        match info {
            EventInfo::Alias(a) => Event::Alias { anchor: a.alias },
            EventInfo::Scalar(s) => Event::Scalar {
                anchor: s.anchor,
                tag: s.tag,
                value: s.rendered_value,
                style: s.style,
                plain_implicit: s.plain_implicit,
                quoted_implicit: s.quoted_implicit,
            },
            EventInfo::MappingStart(m) => Event::MappingStart {
                anchor: m.anchor,
                tag: m.tag,
                implicit: m.implicit,
                style: m.style,
            },
            EventInfo::MappingEnd(_) => Event::MappingEnd,
            EventInfo::SequenceStart(s) => Event::SequenceStart {
                anchor: s.anchor,
                tag: s.tag,
                implicit: s.implicit,
                style: s.style,
            },
            EventInfo::SequenceEnd(_) => Event::SequenceEnd,
        }
    }
}
