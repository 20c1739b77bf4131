//! Live events: an [`Events`] source over `saphyr_parser::Parser`.
//!
//! Raw parser events are turned into owned [`Ev`]s:
//! - stream and document markers are kept, the read side needs them for its
//!   document state machine;
//! - anchors stay numeric ids, aliases are resolved by the deserializer;
//! - tags are normalized to their canonical form (`!!int` becomes
//!   `tag:yaml.org,2002:int`);
//! - every event carries the location it started at.
//!
//! One event of lookahead is kept for `peek`.

use saphyr_parser::{Event, Parser, ScalarStyle as RawStyle, StrInput};

use crate::error::{Error, Location, location_from_span};
use crate::events::{Ev, Events, ScalarStyle};
use crate::tags::normalize_tag;

pub struct LiveEvents<'a> {
    /// Source text, for error details the parser does not report.
    input: &'a str,
    /// Underlying streaming parser.
    parser: Parser<'a, StrInput<'a>>,
    /// Peeked event not yet consumed.
    look: Option<Ev>,
    /// Location of the last yielded event.
    last_location: Location,
    /// Set once the parser reported the end of the stream.
    finished: bool,
}

impl<'a> LiveEvents<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            parser: Parser::new_from_str(input),
            look: None,
            last_location: Location::UNKNOWN,
            finished: false,
        }
    }

    /// Pull the next event from the parser, skipping the ones with no meaning here.
    fn next_impl(&mut self) -> Result<Option<Ev>, Error> {
        if self.finished {
            return Ok(None);
        }
        while let Some(item) = self.parser.next() {
            let (raw, span) = item.map_err(|e| Error::from_scan_error(e, self.input))?;
            let location = location_from_span(&span);

            let ev = match raw {
                Event::StreamStart => Ev::StreamStart { location },
                Event::StreamEnd => {
                    self.finished = true;
                    Ev::StreamEnd { location }
                }
                Event::DocumentStart(explicit) => Ev::DocumentStart { explicit, location },
                Event::DocumentEnd => Ev::DocumentEnd { location },
                Event::Scalar(value, style, anchor, tag) => Ev::Scalar {
                    value: value.into_owned(),
                    tag: tag.map(|t| normalize_tag(&t.to_string())),
                    style: scalar_style(style),
                    anchor,
                    location,
                },
                Event::SequenceStart(anchor, tag) => Ev::SeqStart {
                    anchor,
                    tag: tag.map(|t| normalize_tag(&t.to_string())),
                    location,
                },
                Event::SequenceEnd => Ev::SeqEnd { location },
                Event::MappingStart(anchor, tag) => Ev::MapStart {
                    anchor,
                    tag: tag.map(|t| normalize_tag(&t.to_string())),
                    location,
                },
                Event::MappingEnd => Ev::MapEnd { location },
                Event::Alias(id) => Ev::Alias { id, location },
                Event::Nothing => continue,
            };
            return Ok(Some(ev));
        }
        self.finished = true;
        Ok(None)
    }
}

#[allow(unreachable_patterns)]
fn scalar_style(style: RawStyle) -> ScalarStyle {
    match style {
        RawStyle::Plain => ScalarStyle::Plain,
        RawStyle::SingleQuoted => ScalarStyle::SingleQuoted,
        RawStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        RawStyle::Literal => ScalarStyle::Literal,
        RawStyle::Folded => ScalarStyle::Folded,
        _ => ScalarStyle::Plain,
    }
}

impl Events for LiveEvents<'_> {
    fn next(&mut self) -> Result<Option<Ev>, Error> {
        let ev = match self.look.take() {
            Some(ev) => Some(ev),
            None => self.next_impl()?,
        };
        if let Some(ev) = &ev {
            self.last_location = ev.location();
        }
        Ok(ev)
    }

    fn peek(&mut self) -> Result<Option<Ev>, Error> {
        if self.look.is_none() {
            self.look = self.next_impl()?;
        }
        Ok(self.look.clone())
    }

    fn last_location(&self) -> Location {
        self.last_location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EvKind;
    use crate::tags::TAG_INT;

    fn kinds(input: &str) -> Vec<EvKind> {
        let mut events = LiveEvents::new(input);
        let mut out = Vec::new();
        while let Some(ev) = events.next().unwrap() {
            out.push(ev.kind());
        }
        out
    }

    #[test]
    fn keeps_stream_and_document_markers() {
        assert_eq!(
            kinds("a: 1\n"),
            [
                EvKind::StreamStart,
                EvKind::DocumentStart,
                EvKind::MapStart,
                EvKind::Scalar,
                EvKind::Scalar,
                EvKind::MapEnd,
                EvKind::DocumentEnd,
                EvKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn tags_are_normalized_and_anchors_numbered() {
        let mut events = LiveEvents::new("- &x !!int 5\n- *x\n");
        events.expect(EvKind::StreamStart).unwrap();
        events.expect(EvKind::DocumentStart).unwrap();
        events.expect(EvKind::SeqStart).unwrap();
        let scalar = events.next().unwrap().unwrap();
        assert_eq!(scalar.tag(), Some(TAG_INT));
        assert_ne!(scalar.anchor(), 0);
        let alias = events.next().unwrap().unwrap();
        assert!(matches!(alias, Ev::Alias { id, .. } if id == scalar.anchor()));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut events = LiveEvents::new("x");
        assert!(events.accept(EvKind::StreamStart).unwrap());
        assert!(events.accept(EvKind::StreamStart).unwrap());
        events.next().unwrap();
        assert!(events.accept(EvKind::DocumentStart).unwrap());
    }

    #[test]
    fn scan_errors_carry_location() {
        let mut events = LiveEvents::new("a: [1, 2\nb: 3\n");
        let err = loop {
            match events.next() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected a scan error"),
                Err(e) => break e,
            }
        };
        assert!(err.location().is_some());
    }
}
