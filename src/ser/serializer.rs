//! The configured serializer and its builder.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

use crate::component_list::{ComponentList, Position, UnknownComponent};
use crate::converter::TypeConverter;
use crate::events::{Emitter, Event, ScalarStyle};
use crate::factory::{DefaultObjectFactory, ObjectFactory};
use crate::inspector::{
    CachedTypeInspector, ReadableMembersInspector, TypeInspector, WritableMembersInspector,
};
use crate::resolver::{DynamicTypeResolver, StaticTypeResolver, TypeResolver};
use crate::ser::Error;
use crate::ser::anchors::{AliasState, AnchorAssigner};
use crate::ser::event_emitters::{
    EventEmitter, JsonEventEmitter, TypeAssigningEventEmitter, WriterEventEmitter,
};
use crate::ser::stages;
use crate::ser::traversal::ObjectGraphTraversal;
use crate::ser::visitors::{
    AnchorAssigningVisitor, CommentsVisitor, CustomSerializationVisitor, DefaultValuesVisitor,
    EmissionVisitor, EmittingVisitor,
};
use crate::ser::yaml_writer::YamlWriter;
use crate::serializer_options::{SerializerOptions, TypeResolution};
use crate::tags::TagMappings;
use crate::types::{ClassType, Type};
use crate::value::Value;

/// Wraps the next visitor of the emission chain into a new stage.
pub type VisitorFactory =
    Arc<dyn Fn(Box<EmissionVisitor>, &Rc<EmissionScope>) -> Box<EmissionVisitor> + Send + Sync>;

/// Wraps the next event emitter into a new stage.
pub type EventEmitterFactory = Arc<
    dyn Fn(Box<dyn EventEmitter>, &SerializerSettings) -> Box<dyn EventEmitter> + Send + Sync,
>;

/// Everything a built [`Serializer`] knows. Shared by all its runs.
pub struct SerializerSettings {
    options: SerializerOptions,
    tag_mappings: Arc<TagMappings>,
    converters: Arc<[Arc<dyn TypeConverter>]>,
    object_factory: Arc<dyn ObjectFactory>,
    traversal: ObjectGraphTraversal,
    visitors: Vec<VisitorFactory>,
    event_emitters: Vec<EventEmitterFactory>,
}

impl SerializerSettings {
    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn tag_mappings(&self) -> &Arc<TagMappings> {
        &self.tag_mappings
    }

    pub fn converters(&self) -> &[Arc<dyn TypeConverter>] {
        &self.converters
    }

    /// Receives the serialization hooks of every class instance.
    pub fn object_factory(&self) -> &dyn ObjectFactory {
        self.object_factory.as_ref()
    }
}

/// State of one serialization call: the anchors found by the pre-pass, the
/// event emitter chain and the depth counter. Nested serializations started
/// by converters run in the same scope.
pub struct EmissionScope {
    settings: Arc<SerializerSettings>,
    aliases: Option<AliasState>,
    event_emitter: Rc<dyn EventEmitter>,
    pending_anchor: RefCell<Option<String>>,
    depth: Cell<usize>,
}

impl EmissionScope {
    fn new(settings: Arc<SerializerSettings>, aliases: Option<AliasState>) -> Rc<Self> {
        let mut event_emitter: Box<dyn EventEmitter> = Box::new(WriterEventEmitter);
        for factory in settings.event_emitters.iter().rev() {
            event_emitter = factory(event_emitter, &settings);
        }
        Rc::new(Self {
            settings,
            aliases,
            event_emitter: Rc::from(event_emitter),
            pending_anchor: RefCell::new(None),
            depth: Cell::new(0),
        })
    }

    pub fn settings(&self) -> &SerializerSettings {
        &self.settings
    }

    /// Anchors of this run; `None` when aliases are disabled.
    pub fn aliases(&self) -> Option<&AliasState> {
        self.aliases.as_ref()
    }

    pub fn event_emitter(&self) -> &Rc<dyn EventEmitter> {
        &self.event_emitter
    }

    /// Anchor for the next start or scalar event.
    pub fn set_pending_anchor(&self, anchor: Option<String>) {
        *self.pending_anchor.borrow_mut() = anchor;
    }

    pub fn take_pending_anchor(&self) -> Option<String> {
        self.pending_anchor.borrow_mut().take()
    }

    fn visitor_chain(self: &Rc<Self>) -> Box<EmissionVisitor> {
        let mut chain: Box<EmissionVisitor> = Box::new(EmittingVisitor::new(self.clone()));
        for factory in self.settings.visitors.iter().rev() {
            chain = factory(chain, self);
        }
        chain
    }

    /// Run `value` through a fresh visitor chain.
    pub(crate) fn serialize_value(
        self: &Rc<Self>,
        value: &Value,
        ty: &Type,
        emitter: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        let traversal = &self.settings.traversal;
        let root = traversal.describe(value.clone(), ty, ScalarStyle::Any);
        let mut chain = self.visitor_chain();
        traversal.traverse::<dyn Emitter>(&root, chain.as_mut(), emitter, &self.depth)
    }
}

/// Serializes object graphs into events or YAML text.
///
/// Cheap to clone; the configuration is shared.
#[derive(Clone)]
pub struct Serializer {
    settings: Arc<SerializerSettings>,
}

impl Default for Serializer {
    fn default() -> Self {
        SerializerBuilder::new().assemble()
    }
}

impl Serializer {
    pub fn builder() -> SerializerBuilder {
        SerializerBuilder::new()
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.settings.options
    }

    /// Emit one complete stream holding a single document.
    pub fn serialize<E: Emitter + 'static>(
        &self,
        emitter: &mut E,
        value: &Value,
        ty: &Type,
    ) -> Result<(), Error> {
        let emitter: &mut (dyn Emitter + 'static) = emitter;
        let settings = &self.settings;

        let aliases = if settings.options.aliases {
            let mut assigner = AnchorAssigner::new();
            let root = settings.traversal.describe(value.clone(), ty, ScalarStyle::Any);
            settings
                .traversal
                .traverse::<()>(&root, &mut assigner, &mut (), &Cell::new(0))?;
            debug!("anchor pre-pass assigned {} anchors", assigner.anchor_count());
            Some(AliasState::new(assigner))
        } else {
            None
        };

        let scope = EmissionScope::new(settings.clone(), aliases);
        emitter.emit(Event::StreamStart)?;
        emitter.emit(Event::DocumentStart {
            implicit: !settings.options.explicit_start,
        })?;
        scope.serialize_value(value, ty, emitter)?;
        emitter.emit(Event::DocumentEnd { implicit: true })?;
        emitter.emit(Event::StreamEnd)
    }

    /// Serialize into YAML text.
    pub fn serialize_to_string(&self, value: &Value, ty: &Type) -> Result<String, Error> {
        let mut writer = YamlWriter::new(String::new(), self.settings.options.indent_step);
        self.serialize(&mut writer, value, ty)?;
        Ok(writer.into_inner())
    }
}

/// Configures every part of a [`Serializer`].
///
/// ```rust
/// use saphyr_graph::{SerializerBuilder, Type, Value};
///
/// let serializer = SerializerBuilder::new()
///     .with_options(saphyr_graph::serializer_options! { json: true })
///     .build()
///     .unwrap();
/// let yaml = serializer.serialize_to_string(&Value::from("hi"), &Type::String).unwrap();
/// assert_eq!(yaml, "\"hi\"\n");
/// ```
pub struct SerializerBuilder {
    options: SerializerOptions,
    tag_mappings: TagMappings,
    converters: Vec<Arc<dyn TypeConverter>>,
    inspector: Option<Arc<dyn TypeInspector>>,
    resolver: Option<Arc<dyn TypeResolver>>,
    object_factory: Option<Arc<dyn ObjectFactory>>,
    visitors: ComponentList<VisitorFactory>,
    event_emitters: ComponentList<EventEmitterFactory>,
    errors: Vec<UnknownComponent>,
}

impl Default for SerializerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializerBuilder {
    pub fn new() -> Self {
        let mut visitors: ComponentList<VisitorFactory> = ComponentList::new();
        visitors.push(stages::CUSTOM_SERIALIZATION, Arc::new(custom_serialization_stage));
        visitors.push(stages::ANCHOR_ASSIGNING, Arc::new(anchor_assigning_stage));
        visitors.push(stages::DEFAULT_VALUES, Arc::new(default_values_stage));
        visitors.push(stages::COMMENTS, Arc::new(comments_stage));

        let mut event_emitters: ComponentList<EventEmitterFactory> = ComponentList::new();
        event_emitters.push(stages::TYPE_ASSIGNING, Arc::new(type_assigning_stage));

        Self {
            options: SerializerOptions::default(),
            tag_mappings: TagMappings::new(),
            converters: Vec::new(),
            inspector: None,
            resolver: None,
            object_factory: None,
            visitors,
            event_emitters,
            errors: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// JSON compatible output: flow style, quoted strings, no tags.
    pub fn json_compatible(mut self) -> Self {
        self.options.json = true;
        self
    }

    pub fn disable_aliases(mut self) -> Self {
        self.options.aliases = false;
        self
    }

    pub fn ensure_roundtrip(mut self) -> Self {
        self.options.roundtrip = true;
        self
    }

    pub fn with_tag_mapping<S: Into<String>>(mut self, tag: S, ty: Type) -> Self {
        self.tag_mappings.add(tag, ty);
        self
    }

    /// Tag `class` as `!<class name>` wherever it is emitted.
    pub fn with_class_tag(mut self, class: &Arc<ClassType>) -> Self {
        self.tag_mappings.register_class(class);
        self
    }

    /// Converters are asked in registration order; the first that accepts a type wins.
    pub fn with_type_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_type_inspector(mut self, inspector: Arc<dyn TypeInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn with_type_resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Only the `on_serializing` and `on_serialized` hooks are used here.
    pub fn with_object_factory(mut self, factory: Arc<dyn ObjectFactory>) -> Self {
        self.object_factory = Some(factory);
        self
    }

    /// Add a visitor stage. An unknown reference stage is reported by [`build`](Self::build).
    pub fn with_emission_visitor<F>(mut self, position: Position<'_>, name: &str, factory: F) -> Self
    where
        F: Fn(Box<EmissionVisitor>, &Rc<EmissionScope>) -> Box<EmissionVisitor>
            + Send
            + Sync
            + 'static,
    {
        if let Err(e) = self.visitors.insert(position, name, Arc::new(factory)) {
            self.errors.push(e);
        }
        self
    }

    pub fn without_emission_visitor(mut self, name: &str) -> Self {
        if let Err(e) = self.visitors.remove(name) {
            self.errors.push(e);
        }
        self
    }

    /// Add an event emitter stage. An unknown reference stage is reported by [`build`](Self::build).
    pub fn with_event_emitter<F>(mut self, position: Position<'_>, name: &str, factory: F) -> Self
    where
        F: Fn(Box<dyn EventEmitter>, &SerializerSettings) -> Box<dyn EventEmitter>
            + Send
            + Sync
            + 'static,
    {
        if let Err(e) = self.event_emitters.insert(position, name, Arc::new(factory)) {
            self.errors.push(e);
        }
        self
    }

    pub fn without_event_emitter(mut self, name: &str) -> Self {
        if let Err(e) = self.event_emitters.remove(name) {
            self.errors.push(e);
        }
        self
    }

    pub fn build(self) -> Result<Serializer, Error> {
        if let Some(e) = self.errors.first() {
            return Err(Error::InvalidOptions(e.to_string()));
        }
        self.options.consistent()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> Serializer {
        let options = self.options;
        let mut inspector = self
            .inspector
            .unwrap_or_else(|| Arc::new(ReadableMembersInspector));
        if options.roundtrip {
            inspector = Arc::new(WritableMembersInspector::new(inspector));
        }
        let inspector: Arc<dyn TypeInspector> = Arc::new(CachedTypeInspector::new(inspector));
        let resolver = self.resolver.unwrap_or_else(|| match options.type_resolution {
            TypeResolution::Dynamic => Arc::new(DynamicTypeResolver) as Arc<dyn TypeResolver>,
            TypeResolution::Static => Arc::new(StaticTypeResolver),
        });
        let converters: Arc<[Arc<dyn TypeConverter>]> = Arc::from(self.converters);

        debug!(
            "serializer stages: visitors [{}], event emitters [{}]",
            self.visitors.names().collect::<Vec<_>>().join(", "),
            self.event_emitters.names().collect::<Vec<_>>().join(", ")
        );

        let traversal = ObjectGraphTraversal::new(
            inspector,
            resolver,
            options.max_recursion,
            options.roundtrip,
            converters.clone(),
        );
        Serializer {
            settings: Arc::new(SerializerSettings {
                options,
                tag_mappings: Arc::new(self.tag_mappings),
                converters,
                object_factory: self
                    .object_factory
                    .unwrap_or_else(|| Arc::new(DefaultObjectFactory)),
                traversal,
                visitors: self.visitors.into_components(),
                event_emitters: self.event_emitters.into_components(),
            }),
        }
    }
}

fn custom_serialization_stage(
    next: Box<EmissionVisitor>,
    scope: &Rc<EmissionScope>,
) -> Box<EmissionVisitor> {
    Box::new(CustomSerializationVisitor::new(next, scope.clone()))
}

fn anchor_assigning_stage(
    next: Box<EmissionVisitor>,
    scope: &Rc<EmissionScope>,
) -> Box<EmissionVisitor> {
    if scope.aliases().is_some() {
        Box::new(AnchorAssigningVisitor::new(next, scope.clone()))
    } else {
        next
    }
}

fn default_values_stage(
    next: Box<EmissionVisitor>,
    scope: &Rc<EmissionScope>,
) -> Box<EmissionVisitor> {
    let handling = scope.settings().options().default_values;
    Box::new(DefaultValuesVisitor::new(next, handling))
}

fn comments_stage(next: Box<EmissionVisitor>, scope: &Rc<EmissionScope>) -> Box<EmissionVisitor> {
    let options = scope.settings().options();
    if options.comments && !options.json {
        Box::new(CommentsVisitor::new(next))
    } else {
        next
    }
}

/// Type assignment, or JSON compatibility when JSON output is requested.
fn type_assigning_stage(
    next: Box<dyn EventEmitter>,
    settings: &SerializerSettings,
) -> Box<dyn EventEmitter> {
    let options = settings.options();
    if options.json {
        Box::new(JsonEventEmitter::new(next))
    } else {
        Box::new(TypeAssigningEventEmitter::new(
            next,
            settings.tag_mappings().clone(),
            options.quote_necessary_strings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventRecorder;

    #[test]
    fn unknown_stage_fails_build() {
        let err = SerializerBuilder::new()
            .with_emission_visitor(Position::Before("nope"), "mine", |next, _| next)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidOptions(msg) if msg.contains("nope")));
    }

    #[test]
    fn emits_stream_and_document_frame() {
        let serializer = SerializerBuilder::new()
            .with_options(crate::serializer_options! { explicit_start: true })
            .build()
            .unwrap();
        let mut recorder = EventRecorder::new();
        serializer
            .serialize(&mut recorder, &Value::I32(7), &Type::I32)
            .unwrap();
        let events = recorder.into_events();
        assert_eq!(events[0], Event::StreamStart);
        assert_eq!(events[1], Event::DocumentStart { implicit: false });
        assert!(matches!(&events[2], Event::Scalar { value, .. } if value == "7"));
        assert_eq!(events[3], Event::DocumentEnd { implicit: true });
        assert_eq!(events[4], Event::StreamEnd);
    }

    #[test]
    fn custom_event_emitter_stage_sees_every_event() {
        struct Upper(Box<dyn EventEmitter>);
        impl EventEmitter for Upper {
            fn emit(
                &self,
                mut event: crate::ser::event_info::EventInfo,
                emitter: &mut dyn Emitter,
            ) -> Result<(), Error> {
                if let crate::ser::event_info::EventInfo::Scalar(info) = &mut event {
                    info.rendered_value = info.rendered_value.to_uppercase();
                }
                self.0.emit(event, emitter)
            }
        }
        let serializer = SerializerBuilder::new()
            .with_event_emitter(Position::Last, "upper", |next, _| Box::new(Upper(next)))
            .build()
            .unwrap();
        let yaml = serializer
            .serialize_to_string(&Value::from("shout"), &Type::String)
            .unwrap();
        assert_eq!(yaml, "SHOUT\n");
    }
}
