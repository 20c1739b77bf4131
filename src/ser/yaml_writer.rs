//! Renders an event stream as YAML text.

use std::fmt::Write;

use crate::events::{CollectionStyle, Emitter, Event, ScalarStyle};
use crate::ser::Error;
use crate::ser_quoting::{is_plain_key_safe, is_plain_value_safe};
use crate::tags::YAML_TAG_PREFIX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    BlockSeq,
    BlockMap,
    FlowSeq,
    FlowMap,
}

impl Kind {
    fn is_block(self) -> bool {
        matches!(self, Kind::BlockSeq | Kind::BlockMap)
    }

    fn is_map(self) -> bool {
        matches!(self, Kind::BlockMap | Kind::FlowMap)
    }
}

/// Where a node sits relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Root,
    SeqItem,
    MapKey,
    MapValue,
    FlowItem,
    FlowKey,
    FlowValue,
}

impl Slot {
    fn in_flow(self) -> bool {
        matches!(self, Slot::FlowItem | Slot::FlowKey | Slot::FlowValue)
    }

    fn is_key(self) -> bool {
        matches!(self, Slot::MapKey | Slot::FlowKey)
    }

    /// Separator written between what the parent wrote and the node itself.
    fn lead(self) -> &'static str {
        match self {
            Slot::SeqItem | Slot::MapValue | Slot::FlowValue => " ",
            Slot::Root | Slot::MapKey | Slot::FlowItem | Slot::FlowKey => "",
        }
    }
}

#[derive(Debug)]
struct Frame {
    kind: Kind,
    /// Column of the children (block collections only).
    indent: usize,
    /// Completed child nodes; keys and values count separately.
    count: usize,
    /// Block collections are opened lazily so that empty ones render as `[]`/`{}`.
    opened: bool,
    /// Anchor and tag, written when the collection is opened.
    props: String,
    parent: Slot,
    /// The first child continues the parent's `-` line.
    inline_first: bool,
}

/// [`Emitter`] producing YAML text.
///
/// Collections are written in block style unless the event asks for flow
/// style, they sit inside a flow collection, or they are used as a mapping
/// key. Scalars are written plain when that reads back unchanged, as literal
/// blocks when multi-line, and double-quoted otherwise.
///
/// ```rust
/// use saphyr_graph::{Emitter, Event, ScalarStyle, YamlWriter};
///
/// let mut w = YamlWriter::new(String::new(), 2);
/// for event in [
///     Event::StreamStart,
///     Event::DocumentStart { implicit: true },
///     Event::Scalar {
///         anchor: None,
///         tag: None,
///         value: "hello".into(),
///         style: ScalarStyle::Any,
///         plain_implicit: true,
///         quoted_implicit: true,
///     },
///     Event::DocumentEnd { implicit: true },
///     Event::StreamEnd,
/// ] {
///     w.emit(event).unwrap();
/// }
/// assert_eq!(w.into_inner(), "hello\n");
/// ```
pub struct YamlWriter<W: Write> {
    out: W,
    indent_step: usize,
    stack: Vec<Frame>,
    line_start: bool,
    documents: usize,
}

impl<W: Write> YamlWriter<W> {
    pub fn new(out: W, indent_step: usize) -> Self {
        Self {
            out,
            indent_step: indent_step.max(1),
            stack: Vec::new(),
            line_start: true,
            documents: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_str(&mut self, s: &str) -> Result<(), Error> {
        if !s.is_empty() {
            self.out.write_str(s)?;
            self.line_start = false;
        }
        Ok(())
    }

    fn newline(&mut self) -> Result<(), Error> {
        self.out.write_char('\n')?;
        self.line_start = true;
        Ok(())
    }

    fn write_indent(&mut self, width: usize) -> Result<(), Error> {
        for _ in 0..width {
            self.out.write_char(' ')?;
        }
        self.line_start = false;
        Ok(())
    }

    fn slot(&self) -> Slot {
        match self.stack.last() {
            None => Slot::Root,
            Some(frame) => match frame.kind {
                Kind::BlockSeq => Slot::SeqItem,
                Kind::FlowSeq => Slot::FlowItem,
                Kind::BlockMap if frame.count % 2 == 0 => Slot::MapKey,
                Kind::BlockMap => Slot::MapValue,
                Kind::FlowMap if frame.count % 2 == 0 => Slot::FlowKey,
                Kind::FlowMap => Slot::FlowValue,
            },
        }
    }

    /// Write the deferred header of the innermost block collection.
    fn open_top(&mut self) -> Result<(), Error> {
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        if frame.opened || !frame.kind.is_block() {
            return Ok(());
        }
        frame.opened = true;
        let props = std::mem::take(&mut frame.props);
        match frame.parent {
            Slot::Root => {
                if !props.is_empty() {
                    self.write_str(&props)?;
                    self.newline()?;
                }
            }
            Slot::MapValue => {
                if !props.is_empty() {
                    self.write_str(" ")?;
                    self.write_str(&props)?;
                }
                self.newline()?;
            }
            Slot::SeqItem => {
                if props.is_empty() {
                    frame.inline_first = true;
                } else {
                    self.write_str(" ")?;
                    self.write_str(&props)?;
                    self.newline()?;
                }
            }
            other => {
                return Err(Error::unexpected(&format!(
                    "block collection cannot be placed as {other:?}"
                )));
            }
        }
        Ok(())
    }

    /// Start of a line inside the innermost block collection.
    fn block_prefix(&mut self) -> Result<(), Error> {
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        if frame.inline_first {
            frame.inline_first = false;
            return self.write_str(" ");
        }
        let indent = frame.indent;
        if !self.line_start {
            self.newline()?;
        }
        self.write_indent(indent)
    }

    /// Write whatever precedes a node in its slot and return the slot.
    fn begin_node(&mut self) -> Result<Slot, Error> {
        self.open_top()?;
        let slot = self.slot();
        match slot {
            Slot::SeqItem => {
                self.block_prefix()?;
                self.write_str("-")?;
            }
            Slot::MapKey => self.block_prefix()?,
            Slot::FlowItem | Slot::FlowKey => {
                if self.stack.last().is_some_and(|f| f.count > 0) {
                    self.write_str(", ")?;
                }
            }
            Slot::Root | Slot::MapValue | Slot::FlowValue => {}
        }
        Ok(slot)
    }

    fn finish_node(&mut self, slot: Slot) -> Result<(), Error> {
        if let Some(parent) = self.stack.last_mut() {
            parent.count += 1;
        }
        match slot {
            Slot::Root | Slot::SeqItem | Slot::MapValue => {
                if !self.line_start {
                    self.newline()?;
                }
                Ok(())
            }
            Slot::MapKey | Slot::FlowKey => self.write_str(":"),
            Slot::FlowItem | Slot::FlowValue => Ok(()),
        }
    }

    /// Column of the content of a block scalar placed in `slot`.
    fn block_scalar_indent(&self, slot: Slot) -> usize {
        let parent = self.stack.last().map_or(0, |f| f.indent);
        match slot {
            Slot::SeqItem => parent + 2,
            Slot::Root => self.indent_step,
            _ => parent + self.indent_step,
        }
    }

    fn write_props(&mut self, props: &str) -> Result<(), Error> {
        if !props.is_empty() {
            self.write_str(props)?;
            self.write_str(" ")?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn scalar(
        &mut self,
        anchor: Option<&str>,
        tag: Option<&str>,
        value: &str,
        style: ScalarStyle,
        plain_implicit: bool,
        quoted_implicit: bool,
    ) -> Result<(), Error> {
        let slot = self.begin_node()?;
        let style = choose_style(value, style, slot);
        let implicit = if style == ScalarStyle::Plain {
            plain_implicit
        } else {
            quoted_implicit
        };
        let props = properties(anchor, if implicit { None } else { tag });
        self.write_str(slot.lead())?;
        self.write_props(&props)?;
        match style {
            ScalarStyle::Plain => self.write_str(value)?,
            ScalarStyle::SingleQuoted => self.write_single_quoted(value)?,
            ScalarStyle::Literal => self.write_literal(value, self.block_scalar_indent(slot))?,
            _ => self.write_quoted(value)?,
        }
        self.finish_node(slot)
    }

    fn alias(&mut self, anchor: &str) -> Result<(), Error> {
        let slot = self.begin_node()?;
        self.write_str(slot.lead())?;
        self.write_str("*")?;
        self.write_str(anchor)?;
        if slot.is_key() {
            // ':' may be part of an anchor name.
            self.write_str(" ")?;
        }
        self.finish_node(slot)
    }

    fn collection_start(&mut self, map: bool, props: String, style: CollectionStyle) -> Result<(), Error> {
        let upcoming = self.slot();
        let flow = style == CollectionStyle::Flow || upcoming.in_flow() || upcoming.is_key();
        let slot = self.begin_node()?;
        if flow {
            self.write_str(slot.lead())?;
            self.write_props(&props)?;
            self.write_str(if map { "{" } else { "[" })?;
            self.stack.push(Frame {
                kind: if map { Kind::FlowMap } else { Kind::FlowSeq },
                indent: 0,
                count: 0,
                opened: true,
                props: String::new(),
                parent: slot,
                inline_first: false,
            });
            return Ok(());
        }

        let parent_indent = self.stack.last().map_or(0, |f| f.indent);
        let indent = match slot {
            Slot::Root => 0,
            Slot::SeqItem => parent_indent + 2,
            _ => parent_indent + self.indent_step,
        };
        self.stack.push(Frame {
            kind: if map { Kind::BlockMap } else { Kind::BlockSeq },
            indent,
            count: 0,
            opened: false,
            props,
            parent: slot,
            inline_first: false,
        });
        Ok(())
    }

    fn collection_end(&mut self, map: bool) -> Result<(), Error> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| Error::unexpected("collection end without a start"))?;
        if frame.kind.is_map() != map {
            return Err(Error::unexpected("collection end does not match its start"));
        }
        if frame.kind.is_map() && frame.count % 2 != 0 {
            return Err(Error::unexpected("mapping key without a value"));
        }
        match frame.kind {
            Kind::FlowSeq => self.write_str("]")?,
            Kind::FlowMap => self.write_str("}")?,
            _ if !frame.opened => {
                self.write_str(frame.parent.lead())?;
                self.write_props(&frame.props)?;
                self.write_str(if map { "{}" } else { "[]" })?;
            }
            _ => {}
        }
        self.finish_node(frame.parent)
    }

    fn comment(&mut self, text: &str) -> Result<(), Error> {
        if self.stack.last().is_some_and(|f| !f.kind.is_block()) {
            return Ok(());
        }
        if self.slot() == Slot::MapValue {
            return Ok(());
        }
        self.open_top()?;
        if let Some(frame) = self.stack.last_mut() {
            frame.inline_first = false;
        }
        if !self.line_start {
            self.newline()?;
        }
        let indent = self.stack.last().map_or(0, |f| f.indent);
        for line in text.lines() {
            self.write_indent(indent)?;
            self.write_str("#")?;
            if !line.is_empty() {
                self.write_str(" ")?;
                self.write_str(line)?;
            }
            self.newline()?;
        }
        Ok(())
    }

    fn write_quoted(&mut self, s: &str) -> Result<(), Error> {
        self.line_start = false;
        self.out.write_char('"')?;
        for ch in s.chars() {
            match ch {
                '\\' => self.out.write_str("\\\\")?,
                '"' => self.out.write_str("\\\"")?,
                '\0' => self.out.write_str("\\0")?,
                '\u{7}' => self.out.write_str("\\a")?,
                '\u{8}' => self.out.write_str("\\b")?,
                '\t' => self.out.write_str("\\t")?,
                '\n' => self.out.write_str("\\n")?,
                '\u{b}' => self.out.write_str("\\v")?,
                '\u{c}' => self.out.write_str("\\f")?,
                '\r' => self.out.write_str("\\r")?,
                '\u{1b}' => self.out.write_str("\\e")?,
                '\u{FEFF}' => self.out.write_str("\\uFEFF")?,
                '\u{0085}' => self.out.write_str("\\N")?,
                '\u{2028}' => self.out.write_str("\\L")?,
                '\u{2029}' => self.out.write_str("\\P")?,
                c if (c as u32) <= 0xFF && c.is_control() => {
                    write!(self.out, "\\x{:02X}", c as u32)?
                }
                c if c.is_control() => write!(self.out, "\\u{:04X}", c as u32)?,
                c => self.out.write_char(c)?,
            }
        }
        self.out.write_char('"')?;
        Ok(())
    }

    fn write_single_quoted(&mut self, s: &str) -> Result<(), Error> {
        self.line_start = false;
        self.out.write_char('\'')?;
        for ch in s.chars() {
            if ch == '\'' {
                self.out.write_str("''")?;
            } else {
                self.out.write_char(ch)?;
            }
        }
        self.out.write_char('\'')?;
        Ok(())
    }

    fn write_literal(&mut self, s: &str, indent: usize) -> Result<(), Error> {
        let body = s.trim_end_matches('\n');
        let trailing = s.len() - body.len();
        self.write_str(match trailing {
            0 => "|-",
            1 => "|",
            _ => "|+",
        })?;
        self.newline()?;
        for line in body.split('\n') {
            if !line.is_empty() {
                self.write_indent(indent)?;
                self.write_str(line)?;
            }
            self.newline()?;
        }
        for _ in 1..trailing {
            self.newline()?;
        }
        Ok(())
    }
}

impl<W: Write> Emitter for YamlWriter<W> {
    fn emit(&mut self, event: Event) -> Result<(), Error> {
        match event {
            Event::StreamStart => Ok(()),
            Event::StreamEnd => {
                if self.stack.is_empty() {
                    Ok(())
                } else {
                    Err(Error::unexpected("stream ended inside a collection"))
                }
            }
            Event::DocumentStart { implicit } => {
                if !implicit || self.documents > 0 {
                    if !self.line_start {
                        self.newline()?;
                    }
                    self.write_str("---")?;
                    self.newline()?;
                }
                self.documents += 1;
                Ok(())
            }
            Event::DocumentEnd { .. } => {
                if !self.stack.is_empty() {
                    return Err(Error::unexpected("document ended inside a collection"));
                }
                if !self.line_start {
                    self.newline()?;
                }
                Ok(())
            }
            Event::Alias { anchor } => self.alias(&anchor),
            Event::Scalar {
                anchor,
                tag,
                value,
                style,
                plain_implicit,
                quoted_implicit,
            } => self.scalar(
                anchor.as_deref(),
                tag.as_deref(),
                &value,
                style,
                plain_implicit,
                quoted_implicit,
            ),
            Event::SequenceStart {
                anchor,
                tag,
                implicit,
                style,
            } => {
                let tag = if implicit { None } else { tag };
                let props = properties(anchor.as_deref(), tag.as_deref());
                self.collection_start(false, props, style)
            }
            Event::SequenceEnd => self.collection_end(false),
            Event::MappingStart {
                anchor,
                tag,
                implicit,
                style,
            } => {
                let tag = if implicit { None } else { tag };
                let props = properties(anchor.as_deref(), tag.as_deref());
                self.collection_start(true, props, style)
            }
            Event::MappingEnd => self.collection_end(true),
            Event::Comment { text } => self.comment(&text),
        }
    }
}

/// `&anchor !tag`, either part optional.
fn properties(anchor: Option<&str>, tag: Option<&str>) -> String {
    let mut props = String::new();
    if let Some(anchor) = anchor {
        props.push('&');
        props.push_str(anchor);
    }
    if let Some(tag) = tag {
        if !props.is_empty() {
            props.push(' ');
        }
        props.push_str(&tag_shorthand(tag));
    }
    props
}

fn tag_shorthand(tag: &str) -> String {
    if let Some(name) = tag.strip_prefix(YAML_TAG_PREFIX) {
        format!("!!{name}")
    } else if tag.starts_with('!') {
        tag.to_owned()
    } else {
        format!("!<{tag}>")
    }
}

/// Literal blocks keep the text as is, provided it has no characters a
/// literal block cannot carry and does not start with whitespace.
fn literal_safe(s: &str) -> bool {
    !s.starts_with([' ', '\t', '\n'])
        && !s.chars().any(|c| {
            (c.is_control() && c != '\n' && c != '\t')
                || matches!(c, '\u{FEFF}' | '\u{2028}' | '\u{2029}')
        })
}

fn choose_style(value: &str, requested: ScalarStyle, slot: Slot) -> ScalarStyle {
    let in_flow = slot.in_flow();
    let literal_ok =
        !slot.is_key() && !in_flow && value.contains('\n') && literal_safe(value);
    match requested {
        ScalarStyle::Literal | ScalarStyle::Folded if literal_ok => ScalarStyle::Literal,
        ScalarStyle::Literal | ScalarStyle::Folded | ScalarStyle::DoubleQuoted => {
            ScalarStyle::DoubleQuoted
        }
        ScalarStyle::SingleQuoted => {
            if value.chars().any(|c| c.is_control()) {
                ScalarStyle::DoubleQuoted
            } else {
                ScalarStyle::SingleQuoted
            }
        }
        ScalarStyle::Plain | ScalarStyle::Any => {
            let plain_ok = if slot.is_key() {
                is_plain_key_safe(value) && (!in_flow || is_plain_value_safe(value, true))
            } else {
                is_plain_value_safe(value, in_flow)
            };
            if plain_ok {
                ScalarStyle::Plain
            } else if requested == ScalarStyle::Any && literal_ok {
                ScalarStyle::Literal
            } else {
                ScalarStyle::DoubleQuoted
            }
        }
    }
}
