// ============================================================================
// Cartoonify CLI — headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   cartoonify --input photo.png --filter cartoon --output result.png
//   cartoonify -i photo.jpg -f sketch -o out.png
//   cartoonify -i "*.jpg" --filter clone --seed 7 --output-dir processed/
//   cartoonify -i portrait.png -f oilpaint -o art.jpg --quality 85
//
// All processing runs synchronously on the current thread; each input is
// loaded into a fresh session, filtered, and encoded.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::{decode_image, encode_and_write, SaveFormat};
use crate::session::{FilterKind, FilterSession};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Cartoonify headless image stylizer.
///
/// Apply a stylization filter to image files and write the results, no GUI
/// required.
#[derive(Parser, Debug)]
#[command(
    name = "cartoonify",
    about = "Cartoonify headless batch image stylizer",
    long_about = "Apply a stylization filter (cartoon, sketch, oilpaint, colorshift,\n\
                  clone) to image files and write the results as PNG, JPEG or BMP.\n\n\
                  Example:\n  \
                  cartoonify --input photo.png --filter cartoon --output result.png\n  \
                  cartoonify -i \"*.jpg\" --filter clone --seed 7 --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Filter to apply: cartoon, sketch, oilpaint, colorshift, clone.
    #[arg(short, long, default_value = "cartoon")]
    pub filter: String,

    /// Seed for the clone filter's layout jitter. Equal seeds reproduce
    /// equal collages; ignored by the other filters.
    #[arg(long, default_value_t = 0)]
    pub seed: u32,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's
    /// extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp.
    /// When omitted, the format is inferred from --output's extension,
    /// defaulting to png.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let kind: FilterKind = match args.filter.parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

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

    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, kind, args.seed, save_format, args.quality) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    kind: FilterKind,
    seed: u32,
    format: SaveFormat,
    quality: u8,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let image = decode_image(input).map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Filter --------------------------------------------------
    let mut session = FilterSession::new();
    session.set_clone_seed(seed);
    session.load(image);
    let result = session
        .apply_filter(kind)
        .map_err(|e| format!("{} filter failed: {}", kind.as_str(), e))?;

    // -- Step 3: Save ----------------------------------------------------
    encode_and_write(result, output, format, quality)
        .map_err(|e| format!("save failed: {}", e))?;

    Ok(())
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
            // Literal path: use directly
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        // Treat as glob pattern
        if let Ok(entries) = glob::glob(pattern) {
            for entry in entries.flatten() {
                if !result.contains(&entry) {
                    result.push(entry);
                }
            }
        }
    }

    result
}

/// Pick the save format from an explicit --format, else the output path's
/// extension, else PNG.
fn parse_format(explicit: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(name) = explicit {
        return match name.to_lowercase().as_str() {
            "jpg" | "jpeg" => SaveFormat::Jpeg,
            "bmp" => SaveFormat::Bmp,
            _ => SaveFormat::Png,
        };
    }
    if let Some(path) = output
        && let Some(ext) = path.extension().and_then(|e| e.to_str())
    {
        return match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => SaveFormat::Jpeg,
            "bmp" => SaveFormat::Bmp,
            _ => SaveFormat::Png,
        };
    }
    SaveFormat::Png
}

/// Determine where one input's result lands.
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(dir) = output_dir {
        let stem = input.file_stem()?;
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(format.extension());
        return Some(dir.join(name));
    }
    if let Some(path) = output {
        return Some(path.to_path_buf());
    }
    // Single input, no explicit destination: write next to the input.
    let stem = input.file_stem()?;
    let mut name = stem.to_os_string();
    name.push("_stylized.");
    name.push(format.extension());
    Some(input.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_inference_prefers_explicit_over_extension() {
        let out = PathBuf::from("x.bmp");
        assert_eq!(parse_format(Some("jpeg"), Some(&out)), SaveFormat::Jpeg);
        assert_eq!(parse_format(None, Some(&out)), SaveFormat::Bmp);
        assert_eq!(parse_format(None, None), SaveFormat::Png);
    }

    #[test]
    fn batch_output_path_uses_dir_and_format_extension() {
        let p = build_output_path(
            Path::new("shots/portrait.jpg"),
            None,
            Some(Path::new("out")),
            SaveFormat::Png,
        )
        .unwrap();
        assert_eq!(p, PathBuf::from("out/portrait.png"));
    }

    #[test]
    fn default_output_path_lands_next_to_the_input() {
        let p = build_output_path(Path::new("dir/photo.png"), None, None, SaveFormat::Png).unwrap();
        assert_eq!(p, PathBuf::from("dir/photo_stylized.png"));
    }
}
