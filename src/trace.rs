use crate::event::{COLOR_MASK, PixelEvent};
use crate::parser::LogFormat;

/// Formats an event as one log line of the given encoding.
///
/// The key-value encoding carries no color, so that part of the event is lost.
pub fn format_event(format: &LogFormat, event: &PixelEvent) -> String {
    match format {
        LogFormat::KeyValue { .. } => format!(
            "px={}, py={}, valid={}",
            event.x, event.y, event.valid as u8
        ),
        LogFormat::Narrative => format!(
            "Pixel drawn at ({}, {}) Color: {:06X}",
            event.x,
            event.y,
            event.color & COLOR_MASK
        ),
        LogFormat::Delimited => format!(
            "{},{},{},{:06X}",
            event.x,
            event.y,
            event.valid as u8,
            event.color & COLOR_MASK
        ),
    }
}

pub fn format_events<'a, I>(format: &LogFormat, events: I) -> String
where
    I: IntoIterator<Item = &'a PixelEvent>,
{
    events
        .into_iter()
        .map(|event| format_event(format, event))
        .collect::<Vec<_>>()
        .join("\n")
}
