use std::io::BufRead;

use log::{debug, trace};

use crate::event::{PixelEvent, WHITE, parse_hex_color};

const KEY_VALUE_MARKER: &str = "px=";
const NARRATIVE_MARKER: &str = "Pixel drawn at (";

/// Line encodings produced by the supported pixel generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `px=<int>, py=<int>, valid=<0|1>`, no color on the line.
    KeyValue { default_color: u32 },
    /// `Pixel drawn at (<int>, <int>) Color: <hex>`, always valid.
    Narrative,
    /// `x,y,pixel_valid,color` with a hex color.
    Delimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Event(PixelEvent),
    NoMatch,
    ParseError(String),
}

/// Per-line counters. In auto mode, lines read before the format is known
/// are counted under the detected format once it is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub records: usize,
    pub retained: usize,
    pub invalid: usize,
    pub no_match: usize,
    pub parse_errors: usize,
}

impl LogFormat {
    pub fn key_value() -> Self {
        LogFormat::KeyValue {
            default_color: WHITE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogFormat::KeyValue { .. } => "key-value",
            LogFormat::Narrative => "narrative",
            LogFormat::Delimited => "delimited",
        }
    }

    pub fn parse_line(&self, line: &str) -> LineOutcome {
        match self {
            LogFormat::KeyValue { default_color } => parse_key_value(line, *default_color),
            LogFormat::Narrative => parse_narrative(line),
            LogFormat::Delimited => parse_delimited(line),
        }
    }

    /// Every format, in detection order.
    pub fn candidates(default_color: u32) -> [LogFormat; 3] {
        [
            LogFormat::KeyValue { default_color },
            LogFormat::Narrative,
            LogFormat::Delimited,
        ]
    }

    /// Returns the first format that reads `line` as a pixel record.
    pub fn detect_line(line: &str, default_color: u32) -> Option<LogFormat> {
        LogFormat::candidates(default_color)
            .into_iter()
            .find(|format| matches!(format.parse_line(line), LineOutcome::Event(_)))
    }

    pub fn detect<'a, I>(lines: I, default_color: u32) -> Option<LogFormat>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .find_map(|line| LogFormat::detect_line(line, default_color))
    }
}

fn split_digits(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text.split_at(end)
}

fn parse_coord(digits: &str, name: &str) -> Result<u32, String> {
    if digits.is_empty() {
        return Err(format!("Missing {} value", name));
    }
    digits
        .parse::<u32>()
        .map_err(|e| format!("Invalid {} value {:?}: {}", name, digits, e))
}

fn parse_key_value(line: &str, default_color: u32) -> LineOutcome {
    let mut error = None;

    for (idx, _) in line.match_indices(KEY_VALUE_MARKER) {
        match parse_key_value_at(&line[idx + KEY_VALUE_MARKER.len()..], default_color) {
            Ok(event) => return LineOutcome::Event(event),
            Err(e) => {
                error.get_or_insert(e);
            }
        }
    }

    match error {
        Some(e) => LineOutcome::ParseError(e),
        None => LineOutcome::NoMatch,
    }
}

fn parse_key_value_at(text: &str, default_color: u32) -> Result<PixelEvent, String> {
    let (px, rest) = split_digits(text);
    let rest = rest
        .strip_prefix(", py=")
        .ok_or("Expected `, py=` after px")?;
    let (py, rest) = split_digits(rest);
    let rest = rest
        .strip_prefix(", valid=")
        .ok_or("Expected `, valid=` after py")?;

    let x = parse_coord(px, "px")?;
    let y = parse_coord(py, "py")?;
    let valid = match rest.chars().next() {
        Some(c) if c.is_ascii_digit() => c == '1',
        _ => return Err("Missing valid flag".to_string()),
    };

    Ok(PixelEvent::new(x, y, valid, default_color))
}

fn parse_narrative(line: &str) -> LineOutcome {
    let mut error = None;

    for (idx, _) in line.match_indices(NARRATIVE_MARKER) {
        match parse_narrative_at(&line[idx + NARRATIVE_MARKER.len()..]) {
            Ok(event) => return LineOutcome::Event(event),
            Err(e) => {
                error.get_or_insert(e);
            }
        }
    }

    match error {
        Some(e) => LineOutcome::ParseError(e),
        None => LineOutcome::NoMatch,
    }
}

fn parse_narrative_at(text: &str) -> Result<PixelEvent, String> {
    let (x, rest) = split_digits(text);
    let rest = rest
        .strip_prefix(',')
        .ok_or("Expected `,` between coordinates")?
        .trim_start();
    let (y, rest) = split_digits(rest);
    let rest = rest
        .strip_prefix(") Color: ")
        .ok_or("Expected `) Color: ` after coordinates")?;

    let hex = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))
        .or_else(|| rest.strip_prefix('#'))
        .unwrap_or(rest);
    let end = hex
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(hex.len());

    let x = parse_coord(x, "x")?;
    let y = parse_coord(y, "y")?;
    let color = parse_hex_color(&hex[..end])?;

    Ok(PixelEvent::new(x, y, true, color))
}

fn parse_delimited(line: &str) -> LineOutcome {
    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() != 4 {
        return LineOutcome::NoMatch;
    }

    match parse_delimited_fields(&fields) {
        Ok(event) => LineOutcome::Event(event),
        Err(e) => LineOutcome::ParseError(e),
    }
}

fn parse_delimited_fields(fields: &[&str]) -> Result<PixelEvent, String> {
    let x = fields[0]
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("Invalid x field {:?}: {}", fields[0], e))?;
    let y = fields[1]
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("Invalid y field {:?}: {}", fields[1], e))?;
    let pixel_valid = fields[2]
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("Invalid pixel_valid field {:?}: {}", fields[2], e))?;
    let color = parse_hex_color(fields[3].trim())?;

    Ok(PixelEvent::new(x, y, pixel_valid == 1, color))
}

/// Turns log lines into retained events, counting everything it skips.
#[derive(Debug, Clone)]
pub struct EventParser {
    format: Option<LogFormat>,
    default_color: u32,
    stats: ParseStats,
    // Malformed lines per candidate format, seen before detection.
    pending_errors: [usize; 3],
}

impl EventParser {
    pub fn new(format: LogFormat) -> Self {
        let default_color = match format {
            LogFormat::KeyValue { default_color } => default_color,
            _ => WHITE,
        };
        EventParser {
            format: Some(format),
            default_color,
            stats: ParseStats::default(),
            pending_errors: [0; 3],
        }
    }

    /// Picks the format from the first line any encoding accepts.
    pub fn auto(default_color: u32) -> Self {
        EventParser {
            format: None,
            default_color,
            stats: ParseStats::default(),
            pending_errors: [0; 3],
        }
    }

    pub fn format(&self) -> Option<LogFormat> {
        self.format
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn feed(&mut self, line: &str) -> Option<PixelEvent> {
        self.stats.lines += 1;
        let line_no = self.stats.lines;

        let format = match self.format {
            Some(format) => format,
            None => {
                let candidates = LogFormat::candidates(self.default_color);
                let outcomes = candidates.map(|format| format.parse_line(line));

                match outcomes
                    .iter()
                    .position(|outcome| matches!(outcome, LineOutcome::Event(_)))
                {
                    Some(idx) => {
                        let format = candidates[idx];
                        debug!("Detected {} log format at line {}", format.name(), line_no);
                        let malformed = self.pending_errors[idx];
                        self.stats.no_match -= malformed;
                        self.stats.parse_errors += malformed;
                        self.format = Some(format);
                        format
                    }
                    None => {
                        for (pending, outcome) in self.pending_errors.iter_mut().zip(&outcomes) {
                            if matches!(outcome, LineOutcome::ParseError(_)) {
                                *pending += 1;
                            }
                        }
                        self.stats.no_match += 1;
                        return None;
                    }
                }
            }
        };

        match format.parse_line(line) {
            LineOutcome::Event(event) => {
                self.stats.records += 1;
                if event.valid {
                    self.stats.retained += 1;
                    Some(event)
                } else {
                    self.stats.invalid += 1;
                    None
                }
            }
            LineOutcome::NoMatch => {
                self.stats.no_match += 1;
                trace!("line {}: not a pixel record", line_no);
                None
            }
            LineOutcome::ParseError(msg) => {
                self.stats.parse_errors += 1;
                trace!("line {}: skipped malformed record: {}", line_no, msg);
                None
            }
        }
    }
}

/// Calls `f` with every line of `reader`, decoding invalid UTF-8 lossily.
pub fn for_each_line<R: BufRead, F: FnMut(&str)>(mut reader: R, mut f: F) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buffer);
        f(line.trim_end_matches(['\n', '\r']));
    }
}

pub fn read_events<R: BufRead>(
    reader: R,
    mut parser: EventParser,
) -> std::io::Result<(Vec<PixelEvent>, ParseStats)> {
    let mut events = Vec::new();
    for_each_line(reader, |line| events.extend(parser.feed(line)))?;
    Ok((events, parser.stats()))
}
