use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info, warn};

use crate::error::RasterError;
use crate::event::WHITE;
use crate::framebuffer::{DEFAULT_MAX_CELLS, DEFAULT_PAD, FramebufferBuilder, Raster, Viewport};
use crate::parser::{EventParser, LogFormat, ParseStats, for_each_line};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// `None` detects the encoding from the log itself.
    pub format: Option<LogFormat>,
    /// Color for key-value events when the format is detected.
    pub default_color: u32,
    pub pad: usize,
    pub max_cells: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            format: None,
            default_color: WHITE,
            pad: DEFAULT_PAD,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub raster: Raster,
    pub format: LogFormat,
    pub stats: ParseStats,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    fn parser(&self) -> EventParser {
        match self.config.format {
            Some(format) => EventParser::new(format),
            None => EventParser::auto(self.config.default_color),
        }
    }

    /// Single pass: keeps every retained event until the bounds are known.
    pub fn run_reader<R: BufRead>(&self, reader: R) -> Result<Rendered, RasterError> {
        let mut parser = self.parser();
        let mut builder =
            FramebufferBuilder::new(self.config.pad).with_max_cells(self.config.max_cells);

        for_each_line(reader, |line| builder.extend(parser.feed(line)))?;

        let stats = parser.stats();
        log_stats(&stats);
        let format = match parser.format() {
            Some(format) if !builder.is_empty() => format,
            _ => return Err(no_pixels()),
        };

        Ok(Rendered {
            raster: builder.finish()?,
            format,
            stats,
        })
    }

    /// Two passes over the log: bounds first, then cell writes. Only the
    /// raster is held in memory.
    pub fn run_seekable<R: BufRead + Seek>(&self, mut reader: R) -> Result<Rendered, RasterError> {
        let start = reader.stream_position()?;
        let mut parser = self.parser();
        let mut viewport: Option<Viewport> = None;

        for_each_line(&mut reader, |line| {
            if let Some(event) = parser.feed(line) {
                match viewport.as_mut() {
                    Some(v) => v.include(event.x, event.y),
                    None => viewport = Some(Viewport::around(event.x, event.y, self.config.pad)),
                }
            }
        })?;

        let stats = parser.stats();
        log_stats(&stats);
        let (Some(viewport), Some(format)) = (viewport, parser.format()) else {
            return Err(no_pixels());
        };

        let mut raster = Raster::blank(viewport, self.config.max_cells)?;
        reader.seek(SeekFrom::Start(start))?;

        let mut replay = EventParser::new(format);
        for_each_line(&mut reader, |line| {
            if let Some(event) = replay.feed(line) {
                raster.plot(&event);
            }
        })?;

        Ok(Rendered {
            raster,
            format,
            stats,
        })
    }

    pub fn run_path<P: AsRef<Path>>(&self, path: P) -> Result<Rendered, RasterError> {
        let path = path.as_ref();
        debug!("Reading pixel log {}", path.display());
        let file = File::open(path)?;
        self.run_seekable(BufReader::new(file))
    }
}

fn no_pixels() -> RasterError {
    warn!("No valid pixels found in log. Check the file format or valid flag.");
    RasterError::Empty
}

fn log_stats(stats: &ParseStats) {
    info!(
        "Read {} lines: {} pixels retained, {} invalid, {} not pixel records, {} malformed",
        stats.lines, stats.retained, stats.invalid, stats.no_match, stats.parse_errors
    );
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Write};

    use super::*;

    const SIM_OUT: &str = "\
VCD info: dumpfile rect.vcd opened for output.
4,2,1,FF0000
5,2,1,00FF00
6,2,0,0000FF
4,3,1,0000FF
4,3,1,FFFF00
garbage,line,here,!
";

    fn config(pad: usize) -> PipelineConfig {
        PipelineConfig {
            pad,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_run_reader_detects_delimited() {
        let rendered = Pipeline::new(config(1))
            .run_reader(SIM_OUT.as_bytes())
            .unwrap();

        assert_eq!(rendered.format, LogFormat::Delimited);
        assert_eq!(rendered.stats.retained, 4);
        assert_eq!(rendered.stats.invalid, 1);
        assert_eq!(rendered.stats.parse_errors, 1);
        assert_eq!(rendered.stats.no_match, 1);

        let fb = &rendered.raster.framebuffer;
        assert_eq!((fb.height(), fb.width()), (4, 4));
        assert_eq!(fb.cell(1, 1), Some((0xFF, 0, 0)));
        assert_eq!(fb.cell(1, 2), Some((0, 0xFF, 0)));
        assert_eq!(fb.cell(2, 1), Some((0xFF, 0xFF, 0)));
        assert_eq!(fb.cell(2, 2), Some((0, 0, 0)));
    }

    #[test]
    fn test_two_pass_matches_single_pass() {
        let pipeline = Pipeline::new(config(3));
        let single = pipeline.run_reader(SIM_OUT.as_bytes()).unwrap();
        let double = pipeline.run_seekable(Cursor::new(SIM_OUT)).unwrap();
        assert_eq!(single, double);
    }

    #[test]
    fn test_explicit_key_value_format() {
        let log = "t=0 px=2, py=2, valid=1\nt=1 px=3, py=2, valid=0\nt=2 px=2, py=4, valid=1\n";
        let pipeline = Pipeline::new(PipelineConfig {
            format: Some(LogFormat::KeyValue {
                default_color: 0x808080,
            }),
            pad: 0,
            ..PipelineConfig::default()
        });
        let rendered = pipeline.run_reader(log.as_bytes()).unwrap();
        let fb = &rendered.raster.framebuffer;

        assert_eq!((fb.height(), fb.width()), (3, 1));
        assert_eq!(fb.cell(0, 0), Some((0x80, 0x80, 0x80)));
        assert_eq!(fb.cell(1, 0), Some((0, 0, 0)));
        assert_eq!(fb.cell(2, 0), Some((0x80, 0x80, 0x80)));
    }

    #[test]
    fn test_wrong_explicit_format_is_empty() {
        let pipeline = Pipeline::new(PipelineConfig {
            format: Some(LogFormat::Narrative),
            ..PipelineConfig::default()
        });
        assert!(matches!(
            pipeline.run_reader(SIM_OUT.as_bytes()),
            Err(RasterError::Empty)
        ));
        assert!(matches!(
            pipeline.run_seekable(Cursor::new(SIM_OUT)),
            Err(RasterError::Empty)
        ));
    }

    #[test]
    fn test_only_invalid_pixels_is_empty() {
        let log = "px=1, py=1, valid=0\npx=2, py=2, valid=0\n";
        let pipeline = Pipeline::new(PipelineConfig::default());
        assert!(matches!(
            pipeline.run_reader(log.as_bytes()),
            Err(RasterError::Empty)
        ));
        assert!(matches!(
            pipeline.run_seekable(Cursor::new(log)),
            Err(RasterError::Empty)
        ));
    }

    #[test]
    fn test_run_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Pixel drawn at (10, 10) Color: 00FF00").unwrap();
        writeln!(file, "Pixel drawn at (12, 11) Color: FF00FF").unwrap();
        file.flush().unwrap();

        let rendered = Pipeline::new(config(0)).run_path(file.path()).unwrap();
        assert_eq!(rendered.format, LogFormat::Narrative);
        assert_eq!(rendered.raster.viewport.extent(), [10, 13, 12, 10]);
        assert_eq!(rendered.raster.framebuffer.cell(1, 2), Some((0xFF, 0, 0xFF)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Pipeline::new(PipelineConfig::default()).run_path(dir.path().join("nope.txt"));
        assert!(matches!(result, Err(RasterError::Io(_))));
    }
}
