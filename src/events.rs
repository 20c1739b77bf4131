//! YAML event model shared by the reading and the writing side.
//!
//! Writing pushes [`Event`]s into an [`Emitter`]; anchors travel by name.
//! Reading pulls [`Ev`]s from an [`Events`] source; anchors travel as numeric
//! ids the way `saphyr-parser` reports them (0 means "no anchor").

use std::collections::VecDeque;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Location};
use crate::ser_error::Error as SerError;

/// Presentation style of a scalar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarStyle {
    /// Let the emitter choose.
    #[default]
    Any,
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    pub fn is_quoted(self) -> bool {
        matches!(self, ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)
    }
}

/// Presentation style of a mapping or sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionStyle {
    #[default]
    Any,
    Block,
    Flow,
}

/// Event pushed into an [`Emitter`].
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    StreamStart,
    StreamEnd,
    DocumentStart {
        implicit: bool,
    },
    DocumentEnd {
        implicit: bool,
    },
    Alias {
        anchor: String,
    },
    Scalar {
        anchor: Option<String>,
        tag: Option<String>,
        value: String,
        style: ScalarStyle,
        /// The tag may be omitted when the scalar is written plain.
        plain_implicit: bool,
        /// The tag may be omitted when the scalar is written quoted.
        quoted_implicit: bool,
    },
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        style: CollectionStyle,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        style: CollectionStyle,
    },
    MappingEnd,
    /// Comment line placed before the next node. Ignored in flow context.
    Comment {
        text: String,
    },
}

/// Push-model sink of events.
pub trait Emitter {
    fn emit(&mut self, event: Event) -> Result<(), SerError>;
}

/// Emitter that only records what it receives.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Turn the recording into a pull source, as if it had been parsed.
    ///
    /// Anchor names become numeric ids in order of first appearance. An alias
    /// to a name that was never anchored gets an id no anchor carries.
    pub fn into_replay(self) -> EventReplay {
        let mut ids: AHashMap<String, usize> = AHashMap::new();
        let mut next_id = 1;
        let mut id_of = |name: &str, ids: &mut AHashMap<String, usize>| -> usize {
            *ids.entry(name.to_owned()).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            })
        };
        let mut out = Vec::with_capacity(self.events.len());
        for event in self.events {
            let location = Location::UNKNOWN;
            let ev = match event {
                Event::StreamStart => Ev::StreamStart { location },
                Event::StreamEnd => Ev::StreamEnd { location },
                Event::DocumentStart { implicit } => Ev::DocumentStart {
                    explicit: !implicit,
                    location,
                },
                Event::DocumentEnd { .. } => Ev::DocumentEnd { location },
                Event::Alias { anchor } => {
                    let id = match ids.get(&anchor) {
                        Some(id) => *id,
                        None => usize::MAX,
                    };
                    Ev::Alias { id, location }
                }
                Event::Scalar {
                    anchor,
                    tag,
                    value,
                    style,
                    plain_implicit,
                    quoted_implicit,
                } => {
                    // A parser only reports tags that were written out.
                    let implicit = if style.is_quoted() { quoted_implicit } else { plain_implicit };
                    Ev::Scalar {
                        value,
                        tag: if implicit { None } else { tag },
                        style: if style == ScalarStyle::Any { ScalarStyle::Plain } else { style },
                        anchor: anchor.map_or(0, |a| id_of(&a, &mut ids)),
                        location,
                    }
                }
                Event::SequenceStart { anchor, tag, .. } => Ev::SeqStart {
                    anchor: anchor.map_or(0, |a| id_of(&a, &mut ids)),
                    tag,
                    location,
                },
                Event::SequenceEnd => Ev::SeqEnd { location },
                Event::MappingStart { anchor, tag, .. } => Ev::MapStart {
                    anchor: anchor.map_or(0, |a| id_of(&a, &mut ids)),
                    tag,
                    location,
                },
                Event::MappingEnd => Ev::MapEnd { location },
                Event::Comment { .. } => continue,
            };
            out.push(ev);
        }
        EventReplay::new(out)
    }
}

impl Emitter for EventRecorder {
    fn emit(&mut self, event: Event) -> Result<(), SerError> {
        self.events.push(event);
        Ok(())
    }
}

/// Owned event pulled from an [`Events`] source.
#[derive(Clone, Debug, PartialEq)]
pub enum Ev {
    StreamStart {
        location: Location,
    },
    StreamEnd {
        location: Location,
    },
    DocumentStart {
        explicit: bool,
        location: Location,
    },
    DocumentEnd {
        location: Location,
    },
    Scalar {
        value: String,
        tag: Option<String>,
        style: ScalarStyle,
        anchor: usize,
        location: Location,
    },
    SeqStart {
        anchor: usize,
        tag: Option<String>,
        location: Location,
    },
    SeqEnd {
        location: Location,
    },
    MapStart {
        anchor: usize,
        tag: Option<String>,
        location: Location,
    },
    MapEnd {
        location: Location,
    },
    Alias {
        id: usize,
        location: Location,
    },
}

/// Discriminant of [`Ev`], used by the `accept`/`expect`/`consume` helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvKind {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    Scalar,
    SeqStart,
    SeqEnd,
    MapStart,
    MapEnd,
    Alias,
}

impl EvKind {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            EvKind::StreamStart => "stream start",
            EvKind::StreamEnd => "stream end",
            EvKind::DocumentStart => "document start",
            EvKind::DocumentEnd => "document end",
            EvKind::Scalar => "scalar",
            EvKind::SeqStart => "sequence start",
            EvKind::SeqEnd => "sequence end",
            EvKind::MapStart => "mapping start",
            EvKind::MapEnd => "mapping end",
            EvKind::Alias => "alias",
        }
    }
}

impl Ev {
    pub fn location(&self) -> Location {
        match self {
            Ev::StreamStart { location }
            | Ev::StreamEnd { location }
            | Ev::DocumentStart { location, .. }
            | Ev::DocumentEnd { location }
            | Ev::Scalar { location, .. }
            | Ev::SeqStart { location, .. }
            | Ev::SeqEnd { location }
            | Ev::MapStart { location, .. }
            | Ev::MapEnd { location }
            | Ev::Alias { location, .. } => *location,
        }
    }

    pub fn kind(&self) -> EvKind {
        match self {
            Ev::StreamStart { .. } => EvKind::StreamStart,
            Ev::StreamEnd { .. } => EvKind::StreamEnd,
            Ev::DocumentStart { .. } => EvKind::DocumentStart,
            Ev::DocumentEnd { .. } => EvKind::DocumentEnd,
            Ev::Scalar { .. } => EvKind::Scalar,
            Ev::SeqStart { .. } => EvKind::SeqStart,
            Ev::SeqEnd { .. } => EvKind::SeqEnd,
            Ev::MapStart { .. } => EvKind::MapStart,
            Ev::MapEnd { .. } => EvKind::MapEnd,
            Ev::Alias { .. } => EvKind::Alias,
        }
    }

    /// Anchor id carried by a node event, 0 if none.
    pub fn anchor(&self) -> usize {
        match self {
            Ev::Scalar { anchor, .. } | Ev::SeqStart { anchor, .. } | Ev::MapStart { anchor, .. } => {
                *anchor
            }
            _ => 0,
        }
    }

    /// Tag carried by a node event.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Ev::Scalar { tag, .. } | Ev::SeqStart { tag, .. } | Ev::MapStart { tag, .. } => {
                tag.as_deref()
            }
            _ => None,
        }
    }
}

/// Pull-model source of events with one event of lookahead.
pub trait Events {
    /// Consume and return the next event, `None` at the end of input.
    fn next(&mut self) -> Result<Option<Ev>, Error>;
    /// Return the next event without consuming it.
    fn peek(&mut self) -> Result<Option<Ev>, Error>;
    /// Location of the last consumed event.
    fn last_location(&self) -> Location;

    fn peek_kind(&mut self) -> Result<Option<EvKind>, Error> {
        Ok(self.peek()?.map(|ev| ev.kind()))
    }

    /// Is the next event of `kind`?
    fn accept(&mut self, kind: EvKind) -> Result<bool, Error> {
        Ok(self.peek_kind()? == Some(kind))
    }

    /// Consume the next event, which must be of `kind`.
    fn expect(&mut self, kind: EvKind) -> Result<Ev, Error> {
        match self.next()? {
            Some(ev) if ev.kind() == kind => Ok(ev),
            Some(ev) => Err(Error::unexpected(kind.describe()).with_location(ev.location())),
            None => Err(Error::eof().with_location(self.last_location())),
        }
    }

    /// Consume the next event only if it is of `kind`.
    fn consume(&mut self, kind: EvKind) -> Result<Option<Ev>, Error> {
        if self.accept(kind)? {
            self.next()
        } else {
            Ok(None)
        }
    }

    /// Consume one complete node (scalar, alias or a whole collection).
    fn skip_node(&mut self) -> Result<(), Error> {
        let mut depth = 0usize;
        loop {
            let ev = self
                .next()?
                .ok_or_else(|| Error::eof().with_location(self.last_location()))?;
            match ev {
                Ev::SeqStart { .. } | Ev::MapStart { .. } => depth += 1,
                Ev::SeqEnd { .. } | Ev::MapEnd { .. } => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::unexpected("node").with_location(ev.location()))?;
                }
                Ev::Scalar { .. } | Ev::Alias { .. } => {}
                other => {
                    return Err(Error::unexpected("node").with_location(other.location()));
                }
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }
}

/// Events served from memory.
#[derive(Clone, Debug, Default)]
pub struct EventReplay {
    buf: VecDeque<Ev>,
    last_location: Location,
}

impl EventReplay {
    pub fn new(events: Vec<Ev>) -> Self {
        Self {
            buf: events.into(),
            last_location: Location::UNKNOWN,
        }
    }
}

impl Events for EventReplay {
    fn next(&mut self) -> Result<Option<Ev>, Error> {
        let ev = self.buf.pop_front();
        if let Some(ev) = &ev {
            self.last_location = ev.location();
        }
        Ok(ev)
    }

    fn peek(&mut self) -> Result<Option<Ev>, Error> {
        Ok(self.buf.front().cloned())
    }

    fn last_location(&self) -> Location {
        self.last_location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(value: &str) -> Ev {
        Ev::Scalar {
            value: value.to_owned(),
            tag: None,
            style: ScalarStyle::Plain,
            anchor: 0,
            location: Location::UNKNOWN,
        }
    }

    #[test]
    fn skip_node_consumes_whole_collection() {
        let loc = Location::UNKNOWN;
        let mut events = EventReplay::new(vec![
            Ev::MapStart { anchor: 0, tag: None, location: loc },
            scalar("a"),
            Ev::SeqStart { anchor: 0, tag: None, location: loc },
            scalar("1"),
            Ev::SeqEnd { location: loc },
            Ev::MapEnd { location: loc },
            scalar("after"),
        ]);
        events.skip_node().unwrap();
        assert_eq!(events.next().unwrap(), Some(scalar("after")));
    }

    #[test]
    fn expect_reports_mismatch() {
        let mut events = EventReplay::new(vec![scalar("x")]);
        assert!(!events.accept(EvKind::MapStart).unwrap());
        let err = events.expect(EvKind::MapStart).unwrap_err();
        assert!(matches!(err, Error::Unexpected { expected: "mapping start", .. }));
    }

    #[test]
    fn replay_assigns_anchor_ids_by_name() {
        let mut recorder = EventRecorder::new();
        recorder
            .emit(Event::SequenceStart {
                anchor: Some("o0".into()),
                tag: None,
                implicit: true,
                style: CollectionStyle::Any,
            })
            .unwrap();
        recorder.emit(Event::Alias { anchor: "o0".into() }).unwrap();
        recorder.emit(Event::SequenceEnd).unwrap();
        let mut replay = recorder.into_replay();
        let start = replay.next().unwrap().unwrap();
        let alias = replay.next().unwrap().unwrap();
        assert_eq!(start.anchor(), 1);
        assert!(matches!(alias, Ev::Alias { id: 1, .. }));
    }
}
