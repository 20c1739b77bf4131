//! The event emitter chain.
//!
//! Each stage decorates the next one: it may adjust tags, styles and implicit
//! flags of an [`EventInfo`] before handing it on. The innermost stage writes
//! to the [`Emitter`].

use std::sync::Arc;

use crate::events::{CollectionStyle, Emitter, Event, ScalarStyle};
use crate::ser::event_info::{CollectionEventInfo, EventInfo, ScalarEventInfo};
use crate::ser::Error;
use crate::ser_quoting::resolves_as_non_string;
use crate::tags::{
    TAG_BINARY, TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_STR, TAG_TIMESTAMP, TagMappings,
    class_tag,
};
use crate::value::Value;

pub trait EventEmitter {
    fn emit(&self, event: EventInfo, emitter: &mut dyn Emitter) -> Result<(), Error>;
}

/// Innermost stage: forwards to the emitter.
#[derive(Debug, Default)]
pub struct WriterEventEmitter;

impl EventEmitter for WriterEventEmitter {
    fn emit(&self, event: EventInfo, emitter: &mut dyn Emitter) -> Result<(), Error> {
        emitter.emit(Event::from(event))
    }
}

/// Assigns core schema tags to scalars and type tags to polymorphic collections.
pub struct TypeAssigningEventEmitter {
    next: Box<dyn EventEmitter>,
    tag_mappings: Arc<TagMappings>,
    quote_necessary_strings: bool,
}

impl TypeAssigningEventEmitter {
    pub fn new(
        next: Box<dyn EventEmitter>,
        tag_mappings: Arc<TagMappings>,
        quote_necessary_strings: bool,
    ) -> Self {
        Self {
            next,
            tag_mappings,
            quote_necessary_strings,
        }
    }

    fn assign_scalar(&self, info: &mut ScalarEventInfo) {
        if info.tag.is_some() {
            return;
        }
        let value = info.source.value();
        let core = match value {
            Value::Null => TAG_NULL,
            Value::Bool(_) => TAG_BOOL,
            Value::F32(_) | Value::F64(_) | Value::Decimal(_) => TAG_FLOAT,
            Value::Char(_) | Value::String(_) | Value::Enum(_) => TAG_STR,
            Value::Timestamp(_) => TAG_TIMESTAMP,
            Value::Bytes(_) => TAG_BINARY,
            Value::Object(_) | Value::Sequence(_) | Value::Mapping(_) => return,
            _ => TAG_INT,
        };

        if let Some(tag) = self.tag_mappings.tag_for(info.source.actual_type()) {
            // A user tag is never implied by the text.
            info.tag = Some(tag.to_owned());
            info.plain_implicit = false;
            info.quoted_implicit = false;
            return;
        }

        info.tag = Some(core.to_owned());
        match value {
            Value::Char(_) | Value::String(_) | Value::Enum(_) => {
                if self.quote_necessary_strings
                    && matches!(info.style, ScalarStyle::Any | ScalarStyle::Plain)
                    && resolves_as_non_string(&info.rendered_value)
                {
                    info.style = ScalarStyle::DoubleQuoted;
                }
                info.plain_implicit = true;
                info.quoted_implicit = true;
            }
            Value::Bytes(_) => {
                info.plain_implicit = false;
                info.quoted_implicit = false;
            }
            _ => {
                info.plain_implicit = true;
                info.quoted_implicit = false;
            }
        }
    }

    fn assign_collection(&self, info: &mut CollectionEventInfo) {
        if info.tag.is_none() {
            let actual = info.source.actual_type();
            info.tag = match self.tag_mappings.tag_for(actual) {
                Some(tag) => Some(tag.to_owned()),
                None => actual
                    .as_class()
                    .filter(|_| info.source.static_type().unwrap_nullable() != actual)
                    .map(|class| class_tag(class)),
            };
        }
        info.implicit = info.tag.is_none();
    }
}

impl EventEmitter for TypeAssigningEventEmitter {
    fn emit(&self, mut event: EventInfo, emitter: &mut dyn Emitter) -> Result<(), Error> {
        match &mut event {
            EventInfo::Scalar(info) => self.assign_scalar(info),
            EventInfo::MappingStart(info) | EventInfo::SequenceStart(info) => {
                self.assign_collection(info)
            }
            _ => {}
        }
        self.next.emit(event, emitter)
    }
}

/// JSON compatible output: flow collections, quoted strings, no tags, no aliases.
pub struct JsonEventEmitter {
    next: Box<dyn EventEmitter>,
}

impl JsonEventEmitter {
    pub fn new(next: Box<dyn EventEmitter>) -> Self {
        Self { next }
    }
}

impl EventEmitter for JsonEventEmitter {
    fn emit(&self, mut event: EventInfo, emitter: &mut dyn Emitter) -> Result<(), Error> {
        match &mut event {
            EventInfo::Alias(info) => {
                return Err(Error::AliasInJson {
                    anchor: info.alias.clone(),
                });
            }
            EventInfo::Scalar(info) => {
                info.anchor = None;
                info.tag = None;
                info.plain_implicit = true;
                info.quoted_implicit = true;
                info.style = match info.source.value() {
                    Value::F32(f) if !f.is_finite() => ScalarStyle::DoubleQuoted,
                    Value::F64(f) if !f.is_finite() => ScalarStyle::DoubleQuoted,
                    Value::Char(_)
                    | Value::String(_)
                    | Value::Enum(_)
                    | Value::Bytes(_)
                    | Value::Timestamp(_) => ScalarStyle::DoubleQuoted,
                    _ => ScalarStyle::Plain,
                };
            }
            EventInfo::MappingStart(info) | EventInfo::SequenceStart(info) => {
                info.anchor = None;
                info.tag = None;
                info.implicit = true;
                info.style = CollectionStyle::Flow;
            }
            _ => {}
        }
        self.next.emit(event, emitter)
    }
}
