//! termtosvg CLI - record terminal sessions and render them as animated SVG.
//!
//! Three modes: `record` writes an asciicast v2 file, `render` turns a cast
//! into SVG, and the default runs both back to back.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use termtosvg::record::{record_session, RecordOptions};
use termtosvg::render::{render_animation_file, render_still_files, RenderOptions};
use termtosvg::{templates, Template};

/// Exit code reported after an interrupting SIGINT (128 + 2).
const SIGINT_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(name = "termtosvg")]
#[command(version)]
#[command(about = "Record terminal sessions and render them as animated SVG")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output path for the rendered SVG; defaults to a file under the
    /// system temporary directory
    output: Option<PathBuf>,

    /// Program (with arguments) to run inside the PTY
    #[arg(short = 'c', long = "command", global = true, value_name = "COMMAND")]
    shell_command: Option<String>,

    /// Terminal geometry, e.g. 82x19
    #[arg(
        short = 'g',
        long = "screen-geometry",
        global = true,
        value_parser = parse_geometry,
        value_name = "COLSxROWS"
    )]
    screen_geometry: Option<(u16, u16)>,

    /// Minimum frame duration in milliseconds
    #[arg(short = 'm', long, global = true, default_value_t = 1, value_name = "MS")]
    min_frame_duration: u64,

    /// Maximum frame duration in milliseconds (unlimited when absent)
    #[arg(short = 'M', long, global = true, value_name = "MS")]
    max_frame_duration: Option<u64>,

    /// Pause before the animation loops, in milliseconds
    #[arg(short = 'D', long, global = true, default_value_t = 1000, value_name = "MS")]
    loop_delay: u64,

    /// Built-in template name or path to a template file
    #[arg(
        short = 't',
        long,
        global = true,
        default_value = templates::DEFAULT,
        value_name = "NAME_OR_PATH"
    )]
    template: String,

    /// Emit one still SVG per frame instead of a single animated SVG
    #[arg(short = 's', long, global = true)]
    still_frames: bool,

    /// Log phase transitions and intermediate data sizes
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a terminal session to an asciicast v2 file
    Record {
        /// Cast output path; defaults to a file under the system temporary
        /// directory
        path: Option<PathBuf>,
    },
    /// Render an asciicast recording to SVG
    Render {
        /// Input cast file (asciicast v1 or v2)
        input: PathBuf,
        /// Output path
        path: Option<PathBuf>,
    },
}

fn parse_geometry(value: &str) -> Result<(u16, u16), String> {
    let (cols, rows) = value
        .split_once('x')
        .ok_or_else(|| format!("{value:?} is not of the form COLSxROWS"))?;
    let cols = cols
        .parse::<u16>()
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| format!("{cols:?} is not a positive column count"))?;
    let rows = rows
        .parse::<u16>()
        .ok()
        .filter(|r| *r > 0)
        .ok_or_else(|| format!("{rows:?} is not a positive row count"))?;
    Ok((cols, rows))
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1; --help and --version exit 0.
            let code = i32::from(e.use_stderr());
            let _ = e.print();
            std::process::exit(code);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.verbose {
        "debug"
    } else {
        "warn"
    }))
    .format_timestamp_secs()
    .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("termtosvg: {e:#}");
            std::process::exit(exit_code(&e));
        }
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<termtosvg::Error>()
        .map_or(1, termtosvg::Error::exit_code)
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    if cli.min_frame_duration < 1 {
        anyhow::bail!("--min-frame-duration must be at least 1");
    }
    if let Some(max) = cli.max_frame_duration {
        if max < cli.min_frame_duration {
            anyhow::bail!("--max-frame-duration must be at least --min-frame-duration");
        }
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupt))
        .context("failed to install SIGINT handler")?;

    let record_opts = RecordOptions {
        command: cli.shell_command.clone(),
        geometry: cli.screen_geometry,
    };
    let render_opts = RenderOptions {
        min_frame_duration: cli.min_frame_duration,
        max_frame_duration: cli.max_frame_duration,
        loop_delay: cli.loop_delay,
        geometry: cli.screen_geometry,
    };

    match cli.command {
        Some(Commands::Record { path }) => {
            let cast_path = match path {
                Some(path) => path,
                None => temp_file_path(".cast")?,
            };
            let outcome = record_session(&cast_path, &record_opts, &interrupt)?;
            println!("Recording saved to {}", cast_path.display());
            Ok(if outcome.interrupted { SIGINT_EXIT_CODE } else { 0 })
        }
        Some(Commands::Render { input, path }) => {
            let template = load_template(&cli.template)?;
            render(&input, path.or(cli.output), &template, &render_opts, cli.still_frames)?;
            Ok(0)
        }
        None => {
            // Validate the template before recording so a typo in -t does
            // not cost a whole session.
            let template = load_template(&cli.template)?;
            let cast_path = temp_file_path(".cast")?;
            let outcome = record_session(&cast_path, &record_opts, &interrupt)?;
            println!("Recording saved to {}", cast_path.display());
            if outcome.interrupted {
                return Ok(SIGINT_EXIT_CODE);
            }
            render(&cast_path, cli.output, &template, &render_opts, cli.still_frames)?;
            Ok(0)
        }
    }
}

fn load_template(name_or_path: &str) -> anyhow::Result<Template> {
    let text = templates::load(name_or_path)?;
    let template = Template::parse(&text)
        .with_context(|| format!("template {name_or_path:?}"))?;
    Ok(template)
}

fn render(
    input: &Path,
    output: Option<PathBuf>,
    template: &Template,
    opts: &RenderOptions,
    still_frames: bool,
) -> anyhow::Result<()> {
    if still_frames {
        let out_dir = match output {
            Some(dir) => dir,
            None => temp_dir_path()?,
        };
        let stem = input
            .file_stem()
            .map_or_else(|| "termtosvg".to_string(), |s| s.to_string_lossy().into_owned());
        let summary = render_still_files(input, &out_dir, &stem, template, opts)?;
        println!(
            "Rendering successful, {} still frame(s) written to {}",
            summary.frames,
            out_dir.display()
        );
    } else {
        let out_path = match output {
            Some(path) => path,
            None => temp_file_path(".svg")?,
        };
        let summary = render_animation_file(input, &out_path, template, opts)?;
        println!(
            "Rendering successful ({} frames, {} ms loop), SVG written to {}",
            summary.frames,
            summary.loop_duration_ms,
            out_path.display()
        );
    }
    Ok(())
}

fn temp_file_path(suffix: &str) -> anyhow::Result<PathBuf> {
    let tmp = tempfile::Builder::new()
        .prefix("termtosvg_")
        .suffix(suffix)
        .rand_bytes(6)
        .tempfile()
        .context("failed to create a temporary file")?;
    let (_, path) = tmp.keep().context("failed to keep the temporary file")?;
    Ok(path)
}

fn temp_dir_path() -> anyhow::Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix("termtosvg_")
        .rand_bytes(6)
        .tempdir()
        .context("failed to create a temporary directory")?;
    Ok(dir.keep())
}
