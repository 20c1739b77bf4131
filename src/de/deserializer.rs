//! The configured deserializer and its builder.

use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::component_list::{ComponentList, Position, UnknownComponent};
use crate::converter::TypeConverter;
use crate::de::discriminators::{TypeDiscriminatingNodeDeserializer, TypeDiscriminator};
use crate::de::node_deserializers::{
    DictionaryNodeDeserializer, NodeDeserializer, NullNodeDeserializer, ObjectNodeDeserializer,
    ScalarNodeDeserializer, SequenceNodeDeserializer, TypeConverterNodeDeserializer,
};
use crate::de::stages;
use crate::de::type_resolvers::{
    ConvertibleNodeTypeResolver, DefaultContainersNodeTypeResolver, NodeTypeResolver,
    RejectUnknownTagsNodeTypeResolver, TagNodeTypeResolver, TypeMappingNodeTypeResolver,
};
use crate::de::value_deserializer::{NestedDeserializer, ValueDeserializer};
use crate::error::Error;
use crate::events::{EvKind, Events};
use crate::factory::{DefaultObjectFactory, ObjectFactory};
use crate::inspector::{CachedTypeInspector, ReadableMembersInspector, TypeInspector};
use crate::live_events::LiveEvents;
use crate::options::{DuplicateKeyPolicy, Options};
use crate::tags::TagMappings;
use crate::types::{ClassType, Type};
use crate::value::Value;

/// Everything a built [`Deserializer`] knows. Shared by all its runs.
pub struct DeserializerSettings {
    options: Options,
    tag_mappings: TagMappings,
    type_mappings: AHashMap<Type, Type>,
    converters: Vec<Arc<dyn TypeConverter>>,
    factory: Arc<dyn ObjectFactory>,
    inspector: Arc<dyn TypeInspector>,
    node_deserializers: Vec<Arc<dyn NodeDeserializer>>,
    type_resolvers: Vec<Arc<dyn NodeTypeResolver>>,
}

impl DeserializerSettings {
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn tag_mappings(&self) -> &TagMappings {
        &self.tag_mappings
    }

    /// Abstract type to the concrete type substituted for untagged nodes.
    pub fn type_mappings(&self) -> &AHashMap<Type, Type> {
        &self.type_mappings
    }

    pub fn converters(&self) -> &[Arc<dyn TypeConverter>] {
        &self.converters
    }

    pub fn object_factory(&self) -> &dyn ObjectFactory {
        self.factory.as_ref()
    }

    pub fn type_inspector(&self) -> &dyn TypeInspector {
        self.inspector.as_ref()
    }

    pub fn node_deserializers(&self) -> &[Arc<dyn NodeDeserializer>] {
        &self.node_deserializers
    }

    pub fn type_resolvers(&self) -> &[Arc<dyn NodeTypeResolver>] {
        &self.type_resolvers
    }
}

/// Reads object graphs from events or YAML text.
///
/// Cheap to clone; the configuration is shared.
#[derive(Clone)]
pub struct Deserializer {
    settings: Arc<DeserializerSettings>,
}

impl Default for Deserializer {
    fn default() -> Self {
        DeserializerBuilder::new().assemble()
    }
}

impl Deserializer {
    pub fn builder() -> DeserializerBuilder {
        DeserializerBuilder::new()
    }

    pub fn options(&self) -> &Options {
        &self.settings.options
    }

    pub fn settings(&self) -> &DeserializerSettings {
        &self.settings
    }

    pub(crate) fn value_deserializer(&self) -> ValueDeserializer {
        ValueDeserializer::new(self.settings.clone())
    }

    /// Read a single document.
    ///
    /// Stream and document markers are optional, but each one consumed must be
    /// closed by its matching end. An empty document reads as null.
    pub fn deserialize(&self, events: &mut dyn Events, ty: &Type) -> Result<Value, Error> {
        let mut values = self.value_deserializer();
        let stream = events.consume(EvKind::StreamStart)?.is_some();
        let value = read_document(events, ty, &mut values)?;
        if let Some(ev) = events.peek()? {
            if ev.kind() == EvKind::DocumentStart {
                return Err(Error::msg(
                    "multiple YAML documents detected; use deserialize_all or from_multiple",
                )
                .with_location(ev.location()));
            }
        }
        if stream {
            events.expect(EvKind::StreamEnd)?;
        }
        Ok(value)
    }

    /// Read every document of a stream. Anchors do not carry over between documents.
    pub fn deserialize_all(&self, events: &mut dyn Events, ty: &Type) -> Result<Vec<Value>, Error> {
        let mut values = self.value_deserializer();
        let stream = events.consume(EvKind::StreamStart)?.is_some();
        let mut documents = Vec::new();
        loop {
            match events.peek_kind()? {
                None => break,
                Some(EvKind::StreamEnd) if stream => {
                    events.next()?;
                    break;
                }
                Some(_) => {
                    values.reset();
                    documents.push(read_document(events, ty, &mut values)?);
                }
            }
        }
        debug!("read {} documents", documents.len());
        Ok(documents)
    }

    pub fn deserialize_str(&self, input: &str, ty: &Type) -> Result<Value, Error> {
        let mut events = LiveEvents::new(input);
        self.deserialize(&mut events, ty)
    }
}

fn read_document(
    events: &mut dyn Events,
    ty: &Type,
    values: &mut ValueDeserializer,
) -> Result<Value, Error> {
    let document = events.consume(EvKind::DocumentStart)?.is_some();
    let value = match events.peek_kind()? {
        None | Some(EvKind::DocumentEnd | EvKind::StreamEnd) => Value::Null,
        Some(_) => values.deserialize(events, ty)?,
    };
    if document {
        events.expect(EvKind::DocumentEnd)?;
    }
    Ok(value)
}

/// Configures every part of a [`Deserializer`].
///
/// ```rust
/// use saphyr_graph::{ClassType, DeserializerBuilder, Type, Value};
///
/// let point = ClassType::builder("geo.Point")
///     .field("x", Type::I32)
///     .field("y", Type::I32)
///     .build();
/// let deserializer = DeserializerBuilder::new()
///     .ignore_unmatched_properties()
///     .build()
///     .unwrap();
/// let value = deserializer
///     .deserialize_str("x: 1\ny: 2\nz: 3\n", &Type::Class(point))
///     .unwrap();
/// assert_eq!(value.as_object().unwrap().get("y"), Some(Value::I32(2)));
/// ```
pub struct DeserializerBuilder {
    options: Options,
    tag_mappings: TagMappings,
    type_mappings: AHashMap<Type, Type>,
    converters: Vec<Arc<dyn TypeConverter>>,
    factory: Option<Arc<dyn ObjectFactory>>,
    inspector: Option<Arc<dyn TypeInspector>>,
    node_deserializers: ComponentList<Arc<dyn NodeDeserializer>>,
    type_resolvers: ComponentList<Arc<dyn NodeTypeResolver>>,
    discriminators: Vec<Arc<dyn TypeDiscriminator>>,
    discriminator_buffer: usize,
    errors: Vec<String>,
}

impl Default for DeserializerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeserializerBuilder {
    pub fn new() -> Self {
        let mut node_deserializers: ComponentList<Arc<dyn NodeDeserializer>> =
            ComponentList::new();
        node_deserializers.push(stages::TYPE_CONVERTER, Arc::new(TypeConverterNodeDeserializer));
        node_deserializers.push(stages::NULL, Arc::new(NullNodeDeserializer));
        node_deserializers.push(stages::SCALAR, Arc::new(ScalarNodeDeserializer));
        node_deserializers.push(stages::SEQUENCE, Arc::new(SequenceNodeDeserializer));
        node_deserializers.push(stages::DICTIONARY, Arc::new(DictionaryNodeDeserializer));
        node_deserializers.push(stages::OBJECT, Arc::new(ObjectNodeDeserializer));

        let mut type_resolvers: ComponentList<Arc<dyn NodeTypeResolver>> = ComponentList::new();
        type_resolvers.push(stages::TYPE_MAPPING, Arc::new(TypeMappingNodeTypeResolver));
        type_resolvers.push(stages::CONVERTIBLE, Arc::new(ConvertibleNodeTypeResolver));
        type_resolvers.push(stages::TAG, Arc::new(TagNodeTypeResolver));
        type_resolvers.push(
            stages::REJECT_UNKNOWN_TAGS,
            Arc::new(RejectUnknownTagsNodeTypeResolver),
        );
        type_resolvers.push(
            stages::DEFAULT_CONTAINERS,
            Arc::new(DefaultContainersNodeTypeResolver),
        );

        Self {
            options: Options::default(),
            tag_mappings: TagMappings::new(),
            type_mappings: AHashMap::new(),
            converters: Vec::new(),
            factory: None,
            inspector: None,
            node_deserializers,
            type_resolvers,
            discriminators: Vec::new(),
            discriminator_buffer: 1024,
            errors: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn ignore_unmatched_properties(mut self) -> Self {
        self.options.ignore_unmatched = true;
        self
    }

    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.options.duplicate_keys = policy;
        self
    }

    /// Match mapping keys to member names ignoring ASCII case.
    pub fn case_insensitive(mut self) -> Self {
        self.options.case_insensitive = true;
        self
    }

    pub fn with_tag_mapping<S: Into<String>>(mut self, tag: S, ty: Type) -> Self {
        self.tag_mappings.add(tag, ty);
        self
    }

    /// Accept `!<class name>` as a tag for `class`.
    pub fn with_class_tag(mut self, class: &Arc<ClassType>) -> Self {
        self.tag_mappings.register_class(class);
        self
    }

    /// Read untagged nodes declared as `abstract_type` as `concrete`.
    ///
    /// `concrete` must be assignable to `abstract_type`, otherwise
    /// [`build`](Self::build) fails.
    pub fn with_type_mapping(mut self, abstract_type: Type, concrete: Type) -> Self {
        if !abstract_type.is_assignable_from(&concrete) {
            self.errors.push(format!(
                "type mapping target `{concrete}` is not assignable to `{abstract_type}`"
            ));
        }
        self.type_mappings.insert(abstract_type, concrete);
        self
    }

    /// Converters are asked in registration order; the first that accepts a type wins.
    pub fn with_type_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_object_factory(mut self, factory: Arc<dyn ObjectFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_type_inspector(mut self, inspector: Arc<dyn TypeInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Choose the type of mappings from their content.
    ///
    /// All discriminators share one buffering stage, placed before the
    /// dictionary deserializer. The first that recognizes a mapping wins.
    pub fn with_type_discriminator(mut self, discriminator: Arc<dyn TypeDiscriminator>) -> Self {
        self.discriminators.push(discriminator);
        self
    }

    /// Most events a mapping may have to be buffered for discrimination.
    pub fn with_discriminator_buffer_limit(mut self, events: usize) -> Self {
        self.discriminator_buffer = events;
        self
    }

    /// Add a node deserializer stage. An unknown reference stage is reported by [`build`](Self::build).
    pub fn with_node_deserializer<D>(mut self, position: Position<'_>, name: &str, stage: D) -> Self
    where
        D: NodeDeserializer + 'static,
    {
        let inserted = self.node_deserializers.insert(position, name, Arc::new(stage));
        self.record(inserted)
    }

    pub fn without_node_deserializer(mut self, name: &str) -> Self {
        let removed = self.node_deserializers.remove(name).map(drop);
        self.record(removed)
    }

    /// Add a node type resolver stage. An unknown reference stage is reported by [`build`](Self::build).
    pub fn with_node_type_resolver<R>(mut self, position: Position<'_>, name: &str, stage: R) -> Self
    where
        R: NodeTypeResolver + 'static,
    {
        let inserted = self.type_resolvers.insert(position, name, Arc::new(stage));
        self.record(inserted)
    }

    pub fn without_node_type_resolver(mut self, name: &str) -> Self {
        let removed = self.type_resolvers.remove(name).map(drop);
        self.record(removed)
    }

    fn record(mut self, result: Result<(), UnknownComponent>) -> Self {
        if let Err(e) = result {
            self.errors.push(e.to_string());
        }
        self
    }

    pub fn build(self) -> Result<Deserializer, Error> {
        if let Some(e) = self.errors.first() {
            return Err(Error::msg(e.clone()));
        }
        if self.options.max_depth == 0 {
            return Err(Error::msg("max_depth must be at least 1"));
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> Deserializer {
        let inspector = self
            .inspector
            .unwrap_or_else(|| Arc::new(ReadableMembersInspector));
        let inspector: Arc<dyn TypeInspector> = Arc::new(CachedTypeInspector::new(inspector));
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(DefaultObjectFactory));

        let mut node_deserializers = self.node_deserializers;
        if !self.discriminators.is_empty() {
            let stage: Arc<dyn NodeDeserializer> = Arc::new(TypeDiscriminatingNodeDeserializer::new(
                self.discriminators,
                self.discriminator_buffer,
            ));
            let position = if node_deserializers.contains(stages::DICTIONARY) {
                Position::Before(stages::DICTIONARY)
            } else {
                Position::Last
            };
            if let Err(e) = node_deserializers.insert(position, stages::TYPE_DISCRIMINATING, stage) {
                debug!("type discrimination not installed: {e}");
            }
        }

        debug!(
            "deserializer stages: type resolvers [{}], node deserializers [{}]",
            self.type_resolvers.names().collect::<Vec<_>>().join(", "),
            node_deserializers.names().collect::<Vec<_>>().join(", ")
        );

        Deserializer {
            settings: Arc::new(DeserializerSettings {
                options: self.options,
                tag_mappings: self.tag_mappings,
                type_mappings: self.type_mappings,
                converters: self.converters,
                factory,
                inspector,
                node_deserializers: node_deserializers.into_components(),
                type_resolvers: self.type_resolvers.into_components(),
            }),
        }
    }
}
