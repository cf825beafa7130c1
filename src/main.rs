use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use error_iter::ErrorIter as _;
use log::{error, info};
use pixels::{Pixels, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::KeyCode;
use winit::window::WindowBuilder;
use winit_input_helper::WinitInputHelper;

use pixlog::event::parse_hex_color;
use pixlog::framebuffer::{DEFAULT_MAX_CELLS, DEFAULT_PAD, Raster};
use pixlog::parser::{EventParser, LogFormat, read_events};
use pixlog::pipeline::{Pipeline, PipelineConfig};
use pixlog::render::{Canvas, write_ppm};
use pixlog::trace::format_events;

const MAX_WINDOW_DIM: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Auto,
    KeyValue,
    Narrative,
    Delimited,
}

/// Rebuild a raster image from a pixel-draw event log.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Log file to read
    log: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    format: FormatArg,

    /// Empty cells around the drawn region
    #[arg(long, default_value_t = DEFAULT_PAD)]
    pad: usize,

    /// Color for key-value records, which carry none
    #[arg(long, default_value = "FFFFFF", value_parser = parse_hex_color)]
    default_color: u32,

    #[arg(long, default_value_t = DEFAULT_MAX_CELLS)]
    max_cells: usize,

    /// Screen pixels per raster cell
    #[arg(long, default_value_t = 16)]
    scale: u32,

    /// Draw grid lines between cells
    #[arg(long)]
    grid: bool,

    /// Save the raster as a PPM image
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Don't open a window
    #[arg(long)]
    headless: bool,

    /// Print retained pixels as `x,y,valid,color` lines
    #[arg(long)]
    dump: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let format = match self.format {
            FormatArg::Auto => None,
            FormatArg::KeyValue => Some(LogFormat::KeyValue {
                default_color: self.default_color,
            }),
            FormatArg::Narrative => Some(LogFormat::Narrative),
            FormatArg::Delimited => Some(LogFormat::Delimited),
        };

        PipelineConfig {
            format,
            default_color: self.default_color,
            pad: self.pad,
            max_cells: self.max_cells,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let pipeline = Pipeline::new(args.pipeline_config());

    let rendered = match pipeline.run_path(&args.log) {
        Ok(rendered) => rendered,
        // Already reported by the pipeline; nothing to draw is not a failure.
        Err(e) if e.is_empty() => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to rasterize {}", args.log.display()));
        }
    };

    let viewport = rendered.raster.viewport;
    info!(
        "{} log, x {}..={}, y {}..={}, {}x{} cells",
        rendered.format.name(),
        viewport.min_x,
        viewport.max_x,
        viewport.min_y,
        viewport.max_y,
        viewport.width(),
        viewport.height()
    );

    if args.dump {
        let file = File::open(&args.log)
            .with_context(|| format!("Failed to reopen {}", args.log.display()))?;
        let (events, _) = read_events(BufReader::new(file), EventParser::new(rendered.format))?;
        println!("{}", format_events(&LogFormat::Delimited, &events));
    }

    if let Some(path) = &args.output {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        write_ppm(&rendered.raster, BufWriter::new(file))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved raster to {}", path.display());
    }

    if args.headless {
        return Ok(());
    }

    let canvas = Canvas::new(args.scale, args.grid).fit(&rendered.raster, MAX_WINDOW_DIM);
    let title = format!("pixlog - {}", args.log.display());
    show(&rendered.raster, canvas, &title)
}

fn show(raster: &Raster, canvas: Canvas, title: &str) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    let mut input = WinitInputHelper::new();
    let (width, height) = canvas
        .size(raster)
        .context("Raster is too large to display")?;

    let window = {
        let size = LogicalSize::new(width as f64, height as f64);
        WindowBuilder::new()
            .with_title(title)
            .with_inner_size(size)
            .with_min_inner_size(size)
            .build(&event_loop)?
    };

    let mut pixels = {
        let window_size = window.inner_size();
        let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, &window);
        Pixels::new(width, height, surface_texture)?
    };
    canvas.draw(raster, pixels.frame_mut());

    event_loop.run(|event, elwt| {
        if let Event::WindowEvent {
            event: WindowEvent::RedrawRequested,
            ..
        } = event
        {
            if let Err(err) = pixels.render() {
                log_error("pixels.render", err);
                elwt.exit();
                return;
            }
        }

        if input.update(&event) {
            if input.key_pressed(KeyCode::Escape) || input.close_requested() {
                elwt.exit();
                return;
            }

            if let Some(size) = input.window_resized() {
                if let Err(err) = pixels.resize_surface(size.width, size.height) {
                    log_error("pixels.resize_surface", err);
                    elwt.exit();
                    return;
                }
            }

            window.request_redraw();
        }
    })?;

    Ok(())
}

fn log_error<E: std::error::Error + 'static>(method_name: &str, err: E) {
    error!("{method_name}() failed: {err}");
    for source in err.sources().skip(1) {
        error!("  Caused by: {source}");
    }
}
