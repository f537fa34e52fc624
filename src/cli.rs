// ============================================================================
// Retouch CLI — headless batch editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   retouch -i photo.png -e grayscale -e blur=5 -o result.png
//   retouch -i photo.jpg -e rotate=90 -e flip=horizontal -e undo -o out.png
//   retouch -i "shots/*.jpg" -e contrast=140 --output-dir processed/ -f png
//   retouch -i scan.tiff -e edges=50,150 -o edges.bmp
//
// Each file is edited in its own Project: slider edits (blur, brightness,
// contrast) run as a full preview gesture, everything else commits in one
// step, and `undo` / `redo` walk the same history the editor uses.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;

use crate::error::EditError;
use crate::io::SaveFormat;
use crate::ops::Operation;
use crate::project::Project;
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// One `--edit` step.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    Apply(Operation),
    /// `edges` without thresholds: use the configured ones.
    Edges,
    Undo,
    Redo,
}

impl FromStr for Edit {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "undo" => Ok(Edit::Undo),
            "redo" => Ok(Edit::Redo),
            "edges" | "canny" => Ok(Edit::Edges),
            _ => s.parse().map(Edit::Apply),
        }
    }
}

fn parse_edit(s: &str) -> Result<Edit, String> {
    s.parse().map_err(|e: EditError| e.to_string())
}

/// Retouch headless image editor.
#[derive(Parser, Debug)]
#[command(
    name = "retouch",
    about = "Retouch headless batch image editor",
    long_about = "Apply editor operations to image files without opening the GUI.\n\
                  Supports PNG, JPEG, BMP and TIFF.\n\n\
                  Edits: grayscale, edges[=LOW,HIGH], blur=K, brightness=N,\n\
                  contrast=PERCENT, rotate=90|180|270, flip=horizontal|vertical,\n\
                  resize=PERCENT, undo, redo.\n\n\
                  Example:\n  \
                  retouch -i photo.png -e grayscale -e blur=5 -o result.png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Edit to apply, in order. Repeatable.
    #[arg(short, long, value_name = "EDIT", value_parser = parse_edit)]
    pub edit: Vec<Edit>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, tiff.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100). Defaults to the configured quality.
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Settings file to use instead of the per-user one.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print the status line and per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };
    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());
    let quality = args.quality.unwrap_or(settings.jpeg_quality).clamp(1, 100);
    if args.quality.is_some() && !save_format.supports_quality() {
        eprintln!("warning: --quality has no effect on {} output.", save_format.label());
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &args.edit, save_format, quality, &settings) {
            Ok(status) => {
                if args.verbose {
                    println!("  {}", status);
                }
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("CLI: {} failed: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Load, edit and save one file.  Returns the final status line.
pub fn run_one(
    input: &Path,
    output: &Path,
    edits: &[Edit],
    format: SaveFormat,
    quality: u8,
    settings: &EditorSettings,
) -> Result<String, EditError> {
    let mut project = Project::open(input, settings)?;
    project.jpeg_quality = quality;

    for edit in edits {
        match edit {
            Edit::Apply(op) => apply_edit(&mut project, &settings.configure(op.clone()))?,
            Edit::Edges => apply_edit(&mut project, &settings.edges_operation())?,
            Edit::Undo => step(project.undo().map(|_| ()), "undo")?,
            Edit::Redo => step(project.redo().map(|_| ()), "redo")?,
        }
    }

    project.save_as(output, Some(format))?;
    Ok(project.status().to_string())
}

/// Slider edits go through a preview gesture, the rest commit directly.
fn apply_edit(project: &mut Project, op: &Operation) -> Result<(), EditError> {
    if op.is_one_shot() {
        return project.apply(op).map(|_| ());
    }
    project.begin_gesture()?;
    let previewed = project.spawn_preview(op).map(|_| project.finish_previews());
    let committed = previewed.and_then(|_| project.commit_gesture().map(|_| ()));
    if committed.is_err() {
        project.cancel_gesture();
    }
    committed
}

/// Nothing to undo/redo is worth a warning, not a failed file.
fn step(result: Result<(), EditError>, what: &str) -> Result<(), EditError> {
    match result {
        Err(EditError::EmptyHistory) => {
            eprintln!("  warning: nothing to {}", what);
            log_warn!("CLI: nothing to {}", what);
            Ok(())
        }
        other => other,
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(f) = format_arg {
        return SaveFormat::from_extension(f).unwrap_or_else(|| {
            eprintln!("warning: unknown format '{}', writing PNG.", f);
            SaveFormat::Png
        });
    }
    output.and_then(SaveFormat::from_path).unwrap_or_default()
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    // Never overwrite the input
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
