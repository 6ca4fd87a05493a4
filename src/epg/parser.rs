//! XMLTV reader
//! Streaming parser for XMLTV guides - the document is never held in memory
//! Supports both plain XML and gzip-compressed (.xml.gz) files

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::Result;
use crate::models::EpgEvent;

const READ_CAPACITY: usize = 64 * 1024;
/// Longest `&name;` accepted as an entity
const ENTITY_MAX_LEN: usize = 10;
/// Give up on a document that keeps failing
const MAX_PARSE_ERRORS: usize = 10_000;

/// A scheduled programme, times in UTC epoch seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Programme {
    pub start: i64,
    pub stop: i64,
    pub title: String,
    pub desc: Option<String>,
}

/// One `<channel>` of the guide with its programmes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub id: String,
    /// Every `<display-name>` the channel goes by
    pub names: BTreeSet<String>,
    /// Ordered by start time once parsing finishes
    pub events: Vec<Programme>,
}

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    Programme,
    Title,
    Desc,
    DisplayName,
}

/// XMLTV reader - streaming, memory efficient
#[derive(Debug, Default)]
pub struct XmlTvReader {
    services: HashMap<String, Service>,
    parse_errors: usize,
}

impl XmlTvReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> &HashMap<String, Service> {
        &self.services
    }

    pub fn parse_error_count(&self) -> usize {
        self.parse_errors
    }

    /// Total number of programmes
    pub fn programme_count(&self) -> usize {
        self.services.values().map(|s| s.events.len()).sum()
    }

    pub fn clear(&mut self) {
        self.services.clear();
        self.parse_errors = 0;
    }

    /// Parse a guide held in memory (for smaller documents)
    pub fn parse_str(&mut self, xml: &str) {
        self.parse_reader(SanitizingBufReader::new(xml.as_bytes()));
    }

    /// Parse a guide file, gzip-compressed or plain
    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        info!("Processing XMLTV data...");
        let mut reader = BufReader::with_capacity(READ_CAPACITY, File::open(path)?);

        // Check for gzip magic bytes (1f 8b)
        let gzip = reader.fill_buf()?.starts_with(&[0x1f, 0x8b]);
        if gzip {
            let decoder = BufReader::with_capacity(READ_CAPACITY, GzDecoder::new(reader));
            self.parse_reader(SanitizingBufReader::new(decoder));
        } else {
            self.parse_reader(SanitizingBufReader::new(reader));
        }

        info!(
            "XMLTV data parsing is complete: {} channels, {} programmes",
            self.services.len(),
            self.programme_count()
        );
        Ok(())
    }

    /// Stream a guide into the service cache.
    ///
    /// Channels must be declared before their programmes; a programme for an
    /// unknown channel is skipped. Malformed elements are counted and dropped.
    pub fn parse_reader<R: BufRead>(&mut self, reader: R) {
        let mut xml_reader = Reader::from_reader(reader);
        // Text around entity references arrives in pieces, trim when the element closes
        xml_reader.config_mut().trim_text(false);

        let mut buf = Vec::with_capacity(8192);
        let mut state = ParserState::Root;
        let mut current_channel: Option<Service> = None;
        let mut current_programme: Option<(String, Option<i64>, Option<i64>)> = None;
        let mut title = String::new();
        let mut desc = String::new();
        let mut text_buf = String::new();

        loop {
            let position = xml_reader.buffer_position();
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"channel" => {
                        state = ParserState::Channel;
                        current_channel = Some(Service {
                            id: get_attribute(e, b"id").unwrap_or_default(),
                            ..Default::default()
                        });
                    }
                    b"programme" => {
                        state = ParserState::Programme;
                        title.clear();
                        desc.clear();
                        current_programme = Some((
                            get_attribute(e, b"channel").unwrap_or_default(),
                            get_attribute(e, b"start").and_then(|s| parse_xmltv_time(&s)),
                            get_attribute(e, b"stop").and_then(|s| parse_xmltv_time(&s)),
                        ));
                    }
                    b"title" if state == ParserState::Programme => {
                        state = ParserState::Title;
                        text_buf.clear();
                    }
                    b"desc" if state == ParserState::Programme => {
                        state = ParserState::Desc;
                        text_buf.clear();
                    }
                    b"display-name" if state == ParserState::Channel => {
                        state = ParserState::DisplayName;
                        text_buf.clear();
                    }
                    _ => {}
                },
                Ok(Event::Empty(ref e)) if e.name().as_ref() == b"channel" => {
                    // <channel id="x"/> declares a channel without names
                    if let Some(id) = get_attribute(e, b"id").filter(|id| !id.is_empty()) {
                        self.services.entry(id.clone()).or_insert_with(|| Service {
                            id,
                            ..Default::default()
                        });
                    }
                }
                Ok(Event::Text(e)) => {
                    if matches!(state, ParserState::Title | ParserState::Desc | ParserState::DisplayName) {
                        text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Ok(Event::CData(e)) => {
                    if matches!(state, ParserState::Title | ParserState::Desc | ParserState::DisplayName) {
                        text_buf.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    if matches!(state, ParserState::Title | ParserState::Desc | ParserState::DisplayName) {
                        let entity = String::from_utf8_lossy(&e).to_string();
                        match resolve_entity(&entity) {
                            Some(resolved) => text_buf.push(resolved),
                            None => {
                                text_buf.push('&');
                                text_buf.push_str(&entity);
                                text_buf.push(';');
                            }
                        }
                    }
                }
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"channel" => {
                        if let Some(channel) = current_channel.take() {
                            self.add_service(channel);
                        }
                        state = ParserState::Root;
                    }
                    b"programme" => {
                        if let Some((channel_id, start, stop)) = current_programme.take() {
                            self.add_programme(&channel_id, start, stop, &title, &desc);
                        }
                        state = ParserState::Root;
                    }
                    b"title" if state == ParserState::Title => {
                        if title.is_empty() {
                            title = text_buf.trim().to_string();
                        }
                        state = ParserState::Programme;
                    }
                    b"desc" if state == ParserState::Desc => {
                        if desc.is_empty() {
                            desc = text_buf.trim().to_string();
                        }
                        state = ParserState::Programme;
                    }
                    b"display-name" if state == ParserState::DisplayName => {
                        if let Some(ref mut channel) = current_channel {
                            let name = text_buf.trim();
                            if !name.is_empty() {
                                channel.names.insert(name.to_string());
                            }
                        }
                        state = ParserState::Channel;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    self.parse_errors += 1;
                    debug!("XML error at byte {}: {}", position, e);

                    if matches!(e, quick_xml::Error::Io(_)) || self.parse_errors >= MAX_PARSE_ERRORS {
                        warn!("Giving up on XMLTV data after {} errors: {}", self.parse_errors, e);
                        break;
                    }

                    // Reset state to root to skip malformed element
                    current_programme = None;
                    current_channel = None;
                    state = ParserState::Root;
                    text_buf.clear();
                }
                _ => {}
            }
            buf.clear();
        }

        for service in self.services.values_mut() {
            service.events.sort_by_key(|p| p.start);
        }

        if self.parse_errors > 0 {
            warn!("XMLTV data had {} parse errors", self.parse_errors);
        }
    }

    fn add_service(&mut self, channel: Service) {
        if channel.id.is_empty() {
            return;
        }
        // A channel declared twice keeps every alias
        let service = self
            .services
            .entry(channel.id.clone())
            .or_insert_with(|| Service {
                id: channel.id.clone(),
                ..Default::default()
            });
        service.names.extend(channel.names);
    }

    fn add_programme(&mut self, channel_id: &str, start: Option<i64>, stop: Option<i64>, title: &str, desc: &str) {
        let Some(service) = self.services.get_mut(channel_id) else {
            debug!("Programme for unknown channel `{}`", channel_id);
            return;
        };
        let (Some(start), Some(stop)) = (start, stop) else {
            return;
        };
        if title.is_empty() {
            return;
        }
        service.events.push(Programme {
            start,
            stop,
            title: title.to_string(),
            desc: Some(desc.to_string()).filter(|d| !d.is_empty()),
        });
    }

    /// Programmes still airing or upcoming for the given channel ids and names
    pub fn get_current_events(&self, ids: &HashSet<String>) -> HashMap<String, Vec<EpgEvent>> {
        self.get_current_events_at(ids, chrono::Utc::now().timestamp(), local_offset())
    }

    /// Events whose stop is after `now` (UTC epoch seconds), shifted by
    /// `offset` seconds to local wall-clock time.
    ///
    /// A service matches by id or by any display name. Each matching key
    /// gets its own copy of the events.
    pub fn get_current_events_at(&self, ids: &HashSet<String>, now: i64, offset: i64) -> HashMap<String, Vec<EpgEvent>> {
        let mut events: HashMap<String, Vec<EpgEvent>> = HashMap::new();

        for service in self.services.values() {
            let mut keys: Vec<&str> = Vec::new();
            if ids.contains(&service.id) {
                keys.push(&service.id);
            }
            keys.extend(
                service
                    .names
                    .iter()
                    .filter(|name| ids.contains(*name) && **name != service.id)
                    .map(String::as_str),
            );
            if keys.is_empty() {
                continue;
            }

            for programme in service.events.iter().filter(|p| p.stop > now) {
                let start = programme.start + offset;
                let end = programme.stop + offset;
                for key in &keys {
                    events.entry(key.to_string()).or_default().push(EpgEvent {
                        channel: key.to_string(),
                        title: programme.title.clone(),
                        desc: programme.desc.clone().unwrap_or_default(),
                        start,
                        end,
                        length: end - start,
                    });
                }
            }
        }

        events
    }
}

/// Seconds local wall-clock time is ahead of UTC
pub fn local_offset() -> i64 {
    i64::from(Local::now().offset().local_minus_utc())
}

/// BufReader wrapper that filters out illegal XML 1.0 characters on read
/// Legal XML 1.0: #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
/// Also escapes bare ampersands, a common defect in provider guides
pub struct SanitizingBufReader<R> {
    inner: R,
    buffer: Vec<u8>,
    /// Unterminated `&...` held back from the previous read
    carry: Vec<u8>,
    scratch: Vec<u8>,
    out_buffer: Vec<u8>,
    pos: usize,
    filled: usize,
}

impl<R: Read> SanitizingBufReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: vec![0u8; READ_CAPACITY],
            carry: Vec::with_capacity(ENTITY_MAX_LEN),
            scratch: Vec::with_capacity(READ_CAPACITY + ENTITY_MAX_LEN),
            out_buffer: Vec::with_capacity(96 * 1024), // Slightly larger for escapes
            pos: 0,
            filled: 0,
        }
    }

    fn sanitize_byte(b: u8) -> u8 {
        match b {
            0x09 | 0x0A | 0x0D => b, // Tab, LF, CR - keep
            0x00..=0x1F => 0x20,     // Control chars -> space
            0x7F => 0x20,            // DEL -> space
            _ => b,
        }
    }

    fn refill_buffer(&mut self) -> std::io::Result<()> {
        self.out_buffer.clear();
        self.pos = 0;

        // An entity cut by the read boundary needs the next read before it can be judged
        loop {
            let n = loop {
                match self.inner.read(&mut self.buffer) {
                    Ok(n) => break n,
                    Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            let eof = n == 0;

            self.scratch.clear();
            self.scratch.append(&mut self.carry);
            self.scratch.extend_from_slice(&self.buffer[..n]);

            for i in 0..self.scratch.len() {
                let b = Self::sanitize_byte(self.scratch[i]);
                if b != b'&' {
                    self.out_buffer.push(b);
                    continue;
                }
                match Self::entity_start(&self.scratch[i..]) {
                    Some(true) => self.out_buffer.push(b),
                    None if !eof => {
                        self.carry.extend_from_slice(&self.scratch[i..]);
                        break;
                    }
                    _ => self.out_buffer.extend_from_slice(b"&amp;"),
                }
            }

            if eof || !self.out_buffer.is_empty() {
                break;
            }
        }

        self.filled = self.out_buffer.len();
        Ok(())
    }

    /// Whether bytes starting with & look like a valid XML entity.
    /// `None` when they end before that can be told.
    fn entity_start(bytes: &[u8]) -> Option<bool> {
        match bytes.get(1) {
            None => return None,
            Some(b'#') => return Some(true),
            Some(_) => {}
        }

        for end in 1..ENTITY_MAX_LEN {
            match bytes.get(end) {
                None => return None,
                Some(b';') => return Some(end > 1),
                Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9') => {}
                Some(_) => return Some(false),
            }
        }
        Some(false)
    }
}

impl<R: Read> Read for SanitizingBufReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let to_copy = available.len().min(buf.len());
        buf[..to_copy].copy_from_slice(&available[..to_copy]);
        self.consume(to_copy);
        Ok(to_copy)
    }
}

impl<R: Read> BufRead for SanitizingBufReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.pos >= self.filled {
            self.refill_buffer()?;
        }
        Ok(&self.out_buffer[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

/// `amp` -> `&`, `#233` -> `é`
fn resolve_entity(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    }
}

/// Decode XML entities in an attribute value
fn decode_xml_entities(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';').and_then(|end| resolve_entity(&tail[1..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                result.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                result.push('&');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Get attribute value from XML element
fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| decode_xml_entities(&String::from_utf8_lossy(attr.value.as_ref())))
}

/// Parse XMLTV time format: "20240115120000 +0100" -> UTC epoch seconds.
/// Without an offset the time is already UTC.
pub fn parse_xmltv_time(time_str: &str) -> Option<i64> {
    let time_str = time_str.trim();

    let (datetime, tz_offset) = match time_str.split_once(' ') {
        Some((dt, tz)) => (dt, parse_tz_offset(tz)),
        None => match (time_str.get(..14), time_str.get(14..)) {
            (Some(dt), Some(tz)) => (dt, parse_tz_offset(tz)),
            _ => (time_str, 0),
        },
    };

    let naive = NaiveDateTime::parse_from_str(datetime.get(..14)?, "%Y%m%d%H%M%S").ok()?;
    Some(naive.and_utc().timestamp() - tz_offset)
}

/// Parse timezone offset like "+0100" or "-0530" to seconds
fn parse_tz_offset(tz: &str) -> i64 {
    let tz = tz.trim();
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let digits = tz.trim_start_matches(['+', '-']);

    let hours: i64 = digits.get(0..2).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i64 = digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    sign * (hours * 3600 + minutes * 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ids(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_parse_xmltv_time() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap().timestamp();
        assert_eq!(parse_xmltv_time("20240101120000 +0200"), Some(expected));

        let noon = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap().timestamp();
        assert_eq!(parse_xmltv_time("20240101120000"), Some(noon));
        assert_eq!(parse_xmltv_time("20240101120000 +0000"), Some(noon));
        assert_eq!(parse_xmltv_time("20240101120000-0100"), Some(noon + 3600));
        assert_eq!(parse_xmltv_time("20240101120000 +0530"), Some(noon - 19_800));

        assert_eq!(parse_xmltv_time("2024"), None);
        assert_eq!(parse_xmltv_time("20241301120000"), None);
    }

    #[test]
    fn test_parse_simple_guide() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="bbc1.uk">
    <display-name>BBC One</display-name>
    <display-name lang="en">BBC 1</display-name>
    <icon src="http://example.com/bbc1.png"/>
  </channel>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="bbc1.uk">
    <title>News at Noon</title>
    <desc>Daily news broadcast</desc>
    <category>News</category>
  </programme>
  <programme start="20240115130000 +0000" stop="20240115140000 +0000" channel="unknown">
    <title>Lost</title>
  </programme>
</tv>"#;

        let mut reader = XmlTvReader::new();
        reader.parse_str(xml);

        assert_eq!(reader.services().len(), 1);
        let service = &reader.services()["bbc1.uk"];
        let names: Vec<&str> = service.names.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["BBC 1", "BBC One"]);
        assert_eq!(service.events.len(), 1);
        assert_eq!(service.events[0].title, "News at Noon");
        assert_eq!(service.events[0].desc.as_deref(), Some("Daily news broadcast"));
        assert_eq!(reader.programme_count(), 1);
    }

    #[test]
    fn test_incomplete_programmes_are_dropped() {
        let xml = r#"<tv>
  <channel id="ch1"><display-name>One</display-name></channel>
  <programme start="20240115120000" stop="20240115130000" channel="ch1"><title>Kept</title></programme>
  <programme start="20240115130000" channel="ch1"><title>No stop</title></programme>
  <programme start="20240115140000" stop="20240115150000" channel="ch1"><title>  </title></programme>
  <programme start="bad" stop="20240115150000" channel="ch1"><title>Bad start</title></programme>
</tv>"#;
        let mut reader = XmlTvReader::new();
        reader.parse_str(xml);
        let events = &reader.services()["ch1"].events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Kept");
        assert_eq!(events[0].desc, None);
    }

    #[test]
    fn test_entities_and_bare_ampersands() {
        let xml = "<tv><channel id=\"c&amp;c\"><display-name>Tom &amp; Jerry&#39;s</display-name></channel>\
                   <programme start=\"20240115120000\" stop=\"20240115130000\" channel=\"c&amp;c\">\
                   <title>Rock & Roll</title><desc>caf&#xE9;\u{1}</desc></programme></tv>";
        let mut reader = XmlTvReader::new();
        reader.parse_str(xml);

        let service = &reader.services()["c&c"];
        assert!(service.names.contains("Tom & Jerry's"));
        assert_eq!(service.events[0].title, "Rock & Roll");
        assert_eq!(service.events[0].desc.as_deref(), Some("café"));
    }

    /// Hands out a few bytes per read, like a slow socket
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_entities_split_across_reads() {
        let xml = b"<tv><channel id=\"c1\"><display-name>C</display-name></channel>\
                    <programme start=\"20240115120000\" stop=\"20240115130000\" channel=\"c1\">\
                    <title>Tom &amp; Jerry</title><desc>caf&#233; & more &amp</desc></programme></tv>";
        for step in [1, 2, 7, 13] {
            let mut reader = XmlTvReader::new();
            reader.parse_reader(SanitizingBufReader::new(Trickle { data: xml, step }));
            let event = &reader.services()["c1"].events[0];
            assert_eq!(event.title, "Tom & Jerry", "step {}", step);
            assert_eq!(event.desc.as_deref(), Some("café & more &amp"), "step {}", step);
        }
    }

    #[test]
    fn test_events_sorted_by_start() {
        let xml = r#"<tv>
  <channel id="ch1"/>
  <programme start="20240115130000" stop="20240115140000" channel="ch1"><title>Second</title></programme>
  <programme start="20240115120000" stop="20240115130000" channel="ch1"><title>First</title></programme>
</tv>"#;
        let mut reader = XmlTvReader::new();
        reader.parse_str(xml);
        let titles: Vec<&str> = reader.services()["ch1"].events.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[test]
    fn test_current_events_exclude_finished() {
        let xml = r#"<tv>
  <channel id="news.uk"><display-name>News</display-name><display-name>News HD</display-name></channel>
  <programme start="20240101080000 +0000" stop="20240101090000 +0000" channel="news.uk"><title>Breakfast</title></programme>
  <programme start="20240101090000 +0000" stop="20240101100000 +0000" channel="news.uk"><title>Morning</title><desc>Live</desc></programme>
</tv>"#;
        let mut reader = XmlTvReader::new();
        reader.parse_str(xml);

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap().timestamp();
        let events = reader.get_current_events_at(&ids(&["news.uk", "News HD", "Other"]), now, 3600);

        assert_eq!(events.len(), 2);
        let by_id = &events["news.uk"];
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].title, "Morning");
        assert_eq!(by_id[0].desc, "Live");
        assert_eq!(by_id[0].start, parse_xmltv_time("20240101100000").unwrap());
        assert_eq!(by_id[0].length, 3600);
        assert_eq!(events["News HD"][0].channel, "News HD");
        assert!(!events.contains_key("News"));
    }

    #[test]
    fn test_current_events_by_name_only() {
        let xml = r#"<tv>
  <channel id="x1"><display-name>Sport</display-name></channel>
  <programme start="20240101080000" stop="20240101090000" channel="x1"><title>Match</title></programme>
</tv>"#;
        let mut reader = XmlTvReader::new();
        reader.parse_str(xml);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap().timestamp();

        assert_eq!(reader.get_current_events_at(&ids(&["Sport"]), now, 0)["Sport"].len(), 1);
        assert!(reader.get_current_events_at(&ids(&["sport"]), now, 0).is_empty());
    }

    #[test]
    fn test_parse_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide_epg.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(br#"<tv><channel id="a"><display-name>A</display-name></channel></tv>"#)
            .unwrap();
        encoder.finish().unwrap();

        let mut reader = XmlTvReader::new();
        reader.parse_file(&path).unwrap();
        assert!(reader.services().contains_key("a"));

        let plain = dir.path().join("plain.xml");
        std::fs::write(&plain, r#"<tv><channel id="b"/></tv>"#).unwrap();
        reader.parse_file(&plain).unwrap();
        assert_eq!(reader.services().len(), 2);

        assert!(reader.parse_file(&dir.path().join("missing.gz")).is_err());
    }

    #[test]
    fn test_decode_xml_entities() {
        assert_eq!(decode_xml_entities("a &amp; b &lt;c&gt; &#65;"), "a & b <c> A");
        assert_eq!(decode_xml_entities("AT&T &bogus;"), "AT&T &bogus;");
    }
}
