//! Dolphin XML export.
//!
//! ```xml
//! <DolphinResult meet="008" race="4" numbering="1-10">
//!   <Event number="12" heat="3" round="Final"/>
//!   <Lane number="1" dq="false" empty="false">
//!     <Split><Watch>31.00</Watch><Watch/></Split>
//!     <Watch>1:02.34</Watch><Watch>1:02.35</Watch><Watch/>
//!   </Lane>
//! </DolphinResult>
//! ```

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event as XmlEvent};

use super::{parse_watch, skipped};
use crate::error::{ParseError, Parsed, RecordWarning};
use crate::model::{EventNumber, NumberingMode, RaceResult, Round};
use crate::parse::ResultFormat;
use crate::time::RaceTime;

/// A `<Lane>` element as read, before lane numbers are normalized.
#[derive(Default)]
struct LaneElement {
    number: u32,
    times: Vec<Option<RaceTime>>,
    splits: Vec<Vec<Option<RaceTime>>>,
    is_dq: bool,
    is_empty: bool,
    /// First bad watch in the lane; the whole lane is skipped.
    error: Option<ParseError>,
}

#[derive(Default)]
struct Document {
    root_seen: bool,
    meet: Option<String>,
    race: Option<u32>,
    event: Option<EventNumber>,
    heat: Option<u32>,
    round: Round,
    numbering: Option<NumberingMode>,
    lanes: Vec<(usize, LaneElement)>,
}

/// Where the reader is inside a lane.
#[derive(Default)]
struct Cursor {
    lane: Option<(usize, LaneElement)>,
    split: Option<Vec<Option<RaceTime>>>,
    watch: Option<String>,
}

fn attributes(file: &str, element: &BytesStart<'_>) -> Result<HashMap<String, String>, ParseError> {
    element
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| ParseError::malformed(file, e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::malformed(file, e.to_string()))?;
            Ok((key, value.into_owned()))
        })
        .collect()
}

fn flag(attrs: &HashMap<String, String>, name: &str) -> bool {
    attrs
        .get(name)
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

fn number<T: std::str::FromStr>(
    file: &str,
    attrs: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, ParseError> {
    attrs
        .get(name)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ParseError::malformed(file, format!("invalid {name} {v:?}")))
        })
        .transpose()
}

/// 1-based line of a byte offset.
fn line_at(text: &str, offset: u64) -> usize {
    let offset = usize::try_from(offset).unwrap_or(text.len()).min(text.len());
    text.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

impl Document {
    fn open(
        &mut self,
        cursor: &mut Cursor,
        file: &str,
        line: usize,
        element: &BytesStart<'_>,
    ) -> Result<(), ParseError> {
        match element.name().as_ref() {
            b"DolphinResult" => {
                let attrs = attributes(file, element)?;
                self.root_seen = true;
                self.meet = attrs.get("meet").cloned();
                self.race = number(file, &attrs, "race")?;
                self.numbering = attrs
                    .get("numbering")
                    .map(|value| {
                        value
                            .parse::<NumberingMode>()
                            .map_err(|e| ParseError::malformed(file, e.to_string()))
                    })
                    .transpose()?;
            }
            b"Event" => {
                let attrs = attributes(file, element)?;
                if let Some(value) = attrs.get("number") {
                    let event =
                        EventNumber::new(value.as_str()).map_err(|e| ParseError::malformed(file, e.to_string()))?;
                    self.event = Some(event);
                }
                self.heat = number(file, &attrs, "heat")?;
                self.round = attrs
                    .get("round")
                    .map(|r| Round::from_dolphin(r.trim()))
                    .unwrap_or_default();
            }
            b"Lane" => {
                let attrs = attributes(file, element)?;
                let lane = match number(file, &attrs, "number") {
                    Ok(Some(n)) => LaneElement {
                        number: n,
                        is_dq: flag(&attrs, "dq"),
                        is_empty: flag(&attrs, "empty"),
                        ..LaneElement::default()
                    },
                    Ok(None) => LaneElement {
                        error: Some(ParseError::malformed(file, "lane without a number")),
                        ..LaneElement::default()
                    },
                    Err(err) => LaneElement {
                        error: Some(err),
                        ..LaneElement::default()
                    },
                };
                cursor.lane = Some((line, lane));
            }
            b"Split" if cursor.lane.is_some() => cursor.split = Some(Vec::new()),
            b"Watch" if cursor.lane.is_some() => cursor.watch = Some(String::new()),
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, cursor: &mut Cursor, name: &[u8]) {
        match name {
            b"Watch" => {
                let Some(text) = cursor.watch.take() else { return };
                let Some((_, lane)) = cursor.lane.as_mut() else { return };
                let time = match parse_watch(&text) {
                    Ok(time) => time,
                    Err(err) => {
                        lane.error.get_or_insert(err);
                        None
                    }
                };
                match cursor.split.as_mut() {
                    Some(split) => split.push(time),
                    None => lane.times.push(time),
                }
            }
            b"Split" => {
                if let (Some(split), Some((_, lane))) = (cursor.split.take(), cursor.lane.as_mut()) {
                    lane.splits.push(split);
                }
            }
            b"Lane" => {
                if let Some(lane) = cursor.lane.take() {
                    self.lanes.push(lane);
                }
            }
            _ => {}
        }
    }
}

pub(super) fn parse(file: &str, text: &str) -> Result<Parsed<RaceResult>, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut doc = Document::default();
    let mut cursor = Cursor::default();
    loop {
        let event = reader.read_event().map_err(|e| {
            ParseError::malformed(file, format!("line {}: {e}", line_at(text, reader.error_position())))
        })?;
        let line = line_at(text, reader.buffer_position());
        match event {
            XmlEvent::Start(element) => doc.open(&mut cursor, file, line, &element)?,
            XmlEvent::Empty(element) => {
                doc.open(&mut cursor, file, line, &element)?;
                doc.close(&mut cursor, element.name().as_ref());
            }
            XmlEvent::Text(content) => {
                if let Some(watch) = cursor.watch.as_mut() {
                    let content = content
                        .unescape()
                        .map_err(|e| ParseError::malformed(file, e.to_string()))?;
                    watch.push_str(&content);
                }
            }
            XmlEvent::End(element) => doc.close(&mut cursor, element.name().as_ref()),
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if !doc.root_seen {
        return Err(ParseError::malformed(file, "missing DolphinResult element"));
    }
    let heat = doc
        .heat
        .filter(|&h| h >= 1)
        .ok_or_else(|| ParseError::malformed(file, "missing heat"))?;

    let mut warnings = Vec::new();
    let event = doc.event.unwrap_or_else(|| {
        warnings.push(RecordWarning::new(0, "event number is blank"));
        EventNumber::blank()
    });
    let mut result = RaceResult::new(event, heat, ResultFormat::DolphinXml);
    result.meet_id = doc.meet;
    result.race = doc.race;
    result.round = doc.round;

    let (good, bad): (Vec<_>, Vec<_>) = doc.lanes.into_iter().partition(|(_, lane)| lane.error.is_none());
    for (line, lane) in bad {
        if let Some(err) = lane.error {
            warnings.push(skipped(line, &err));
        }
    }
    // Unused lanes may be left out, so the lowest lane only decides when the
    // root element doesn't say.
    result.numbering = doc.numbering.unwrap_or_else(|| {
        NumberingMode::from_lowest_lane(good.iter().map(|(_, l)| l.number).min().unwrap_or(1))
    });
    for (line, element) in good {
        let Some(lane_no) = result.numbering.to_canonical(element.number) else {
            warnings.push(RecordWarning::new(line, format!("lane {} out of range", element.number)));
            continue;
        };
        if let Some(lane) = result.lane_mut(lane_no) {
            lane.times = element.times;
            lane.splits = element.splits;
            lane.is_dq = element.is_dq;
            lane.is_empty = element.is_empty;
        }
    }

    Ok(Parsed::new(result, warnings))
}
