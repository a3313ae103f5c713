//! CLI binary for edgequake-txt2doc.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_txt2doc::pipeline::input;
use edgequake_txt2doc::{
    convert_batch, convert_file, segment_with, BatchItem, ConversionConfig,
    ConversionProgressCallback, EncodingPolicy, OutputFormat, ProgressCallback, SegmentOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// document. Documents may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Target formats, e.g. `docx + pdf`.
    label: String,
}

impl CliProgressCallback {
    fn new(formats: &[OutputFormat]) -> Arc<Self> {
        let label = formats
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} docs  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix(label.clone());
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar, label })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} document(s) to {}…", self.label))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, size_bytes: u64) {
        self.bar.println(format!(
            "  {} Doc {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{size_bytes:>8} bytes")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        // Keep the log line on one row.
        let first_line = error.lines().next().unwrap_or(error);
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(['…']).collect()
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} Doc {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} document(s) converted to {}",
                green("✔"),
                bold(&success_count.to_string()),
                self.label
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word document next to the input (notes.docx)
  txt2doc notes.txt

  # PDF with an explicit output file
  txt2doc --format pdf notes.txt -o handout.pdf

  # Both formats from stdin (output.docx + output.pdf)
  cat chat.txt | txt2doc --format both -

  # Batch into a directory, four documents at a time
  txt2doc --format pdf -c 4 -o out/ docs/*.txt

  # Inspect how the text is split, without rendering
  txt2doc --segments-only notes.txt

  # Fail instead of substituting characters the PDF fonts lack
  txt2doc --format pdf --strict-encoding notes.txt

FENCES:
  Text between a pair of ``` fences becomes a code block (monospace,
  shaded). Everything else is prose. An unmatched ``` stays as literal
  text. With --strip-lang a leading word such as `python` right after the
  opening fence is dropped from the code block.

ENVIRONMENT VARIABLES:
  TXT2DOC_FORMAT       Default output format (docx, pdf, both)
  TXT2DOC_OUTPUT       Output file or directory
  TXT2DOC_CONCURRENCY  Documents converted at once in batch mode
  RUST_LOG             Log filter (overrides --verbose / --quiet)
"#;

/// Convert text with ``` code fences into DOCX or PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "txt2doc",
    version,
    about = "Convert text with ``` code fences into DOCX or PDF documents",
    long_about = "Convert plain text containing fenced code blocks into a Word (DOCX) or PDF \
document. Prose is set in the body font; code blocks get a monospace font on a shaded background.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Text files to convert, or `-` for stdin.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Output format.
    #[arg(short, long, env = "TXT2DOC_FORMAT", value_enum, default_value = "docx")]
    format: FormatArg,

    /// Output file (one input, one format) or directory.
    #[arg(short, long, env = "TXT2DOC_OUTPUT")]
    output: Option<PathBuf>,

    /// Drop a leading language tag (```python) from code blocks.
    #[arg(long, env = "TXT2DOC_STRIP_LANG")]
    strip_lang: bool,

    /// Fail on characters the output format cannot encode.
    #[arg(long, env = "TXT2DOC_STRICT_ENCODING")]
    strict_encoding: bool,

    /// Document title written into the file's metadata.
    #[arg(long, env = "TXT2DOC_TITLE")]
    title: Option<String>,

    /// Number of documents converted at once in batch mode.
    #[arg(short, long, env = "TXT2DOC_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print conversion results as JSON on stdout.
    #[arg(long, env = "TXT2DOC_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TXT2DOC_NO_PROGRESS")]
    no_progress: bool,

    /// Print the segment sequence as JSON and exit without rendering.
    #[arg(long)]
    segments_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TXT2DOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TXT2DOC_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Docx,
    Pdf,
    Both,
}

impl FormatArg {
    fn formats(self) -> Vec<OutputFormat> {
        match self {
            FormatArg::Docx => vec![OutputFormat::Docx],
            FormatArg::Pdf => vec![OutputFormat::Pdf],
            FormatArg::Both => OutputFormat::ALL.to_vec(),
        }
    }
}

/// Where `-o` sends the documents.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    /// Exactly this file.
    File(PathBuf),
    /// Into this directory, or beside each input when `None`.
    Dir(Option<PathBuf>),
}

/// `-o` names a file only when one document is produced and the path is
/// not an existing directory (or written with a trailing separator).
fn resolve_target(output: Option<&Path>, inputs: usize, formats: usize) -> Target {
    match output {
        None => Target::Dir(None),
        Some(path) => {
            let looks_like_dir = path.is_dir()
                || path
                    .as_os_str()
                    .to_string_lossy()
                    .ends_with(std::path::MAIN_SEPARATOR);
            if inputs == 1 && formats == 1 && !looks_like_dir {
                Target::File(path.to_path_buf())
            } else {
                Target::Dir(Some(path.to_path_buf()))
            }
        }
    }
}

#[derive(Serialize)]
struct SegmentReport {
    source: String,
    segments: Vec<edgequake_txt2doc::Segment>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.segments_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Segments-only mode ───────────────────────────────────────────────
    if cli.segments_only {
        let options = SegmentOptions {
            strip_info_string: cli.strip_lang,
        };
        let mut reports = Vec::with_capacity(cli.inputs.len());
        for source in &cli.inputs {
            let text = input::read_input(source)
                .with_context(|| format!("Failed to read {}", input::display_name(source)))?;
            reports.push(SegmentReport {
                source: source.clone(),
                segments: segment_with(&text, &options),
            });
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise segments")?
        );
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let formats = cli.format.formats();
    let target = resolve_target(cli.output.as_deref(), cli.inputs.len(), formats.len());
    let started = Instant::now();
    let mut items: Vec<BatchItem> = Vec::new();

    // One batch covers every format, so each input (stdin included) is
    // read once.
    let progress: Option<ProgressCallback> = if show_progress && cli.inputs.len() > 1 {
        Some(CliProgressCallback::new(&formats) as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, formats[0], progress)?;

    match target {
        Target::File(ref path) => {
            items.push(convert_single(&cli.inputs[0], formats[0], path, &config).await?);
        }
        Target::Dir(ref dir) => {
            items.extend(convert_batch(&cli.inputs, &formats, dir.as_deref(), &config).await);
        }
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&items).context("Failed to serialise results")?
        );
    } else if !cli.quiet {
        print_summary(&items, started.elapsed());
    }

    let failed = items.iter().filter(|i| !i.is_ok()).count();
    if failed > 0 {
        if !cli.json {
            for item in items.iter().filter(|i| !i.is_ok()) {
                if let Err(ref e) = item.result {
                    eprintln!("{} {}", red("error:"), e);
                }
            }
        }
        anyhow::bail!("{failed} of {} document(s) failed", items.len());
    }

    Ok(())
}

/// Convert one input straight to the file the user named.
async fn convert_single(
    source: &str,
    format: OutputFormat,
    path: &Path,
    config: &ConversionConfig,
) -> Result<BatchItem> {
    let output = convert_file(source, format, config)
        .await
        .with_context(|| format!("Conversion of {} failed", input::display_name(source)))?;
    let written = output
        .artifact
        .persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(BatchItem {
        index: 0,
        source: source.to_string(),
        format,
        output: Some(written),
        result: Ok(output.stats),
    })
}

fn print_summary(items: &[BatchItem], elapsed: Duration) {
    for item in items {
        if let (Ok(stats), Some(path)) = (&item.result, &item.output) {
            let pages = stats
                .pages
                .map(|p| format!(", {p} page(s)"))
                .unwrap_or_default();
            eprintln!(
                "{}  {} prose / {} code block(s){}  {}  →  {}",
                green("✔"),
                stats.prose_blocks,
                stats.code_blocks,
                pages,
                dim(&format!("{} bytes", stats.size_bytes)),
                bold(&path.display().to_string()),
            );
            if stats.replaced_chars > 0 {
                eprintln!(
                    "   {} {} character(s) not supported by {} were substituted",
                    cyan("⚠"),
                    stats.replaced_chars,
                    stats.format
                );
            }
        }
    }
    eprintln!("   {}", dim(&format!("{}ms total", elapsed.as_millis())));
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    format: OutputFormat,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let policy = if cli.strict_encoding {
        EncodingPolicy::Strict
    } else {
        EncodingPolicy::Replace
    };

    let mut builder = ConversionConfig::builder()
        .format(format)
        .encoding_policy(policy)
        .strip_info_string(cli.strip_lang)
        .concurrency(cli.concurrency);

    if let Some(ref title) = cli.title {
        builder = builder.document_title(title.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn format_both_expands_in_order() {
        assert_eq!(
            FormatArg::Both.formats(),
            vec![OutputFormat::Docx, OutputFormat::Pdf]
        );
        assert_eq!(FormatArg::Pdf.formats(), vec![OutputFormat::Pdf]);
    }

    #[test]
    fn output_is_file_for_single_document() {
        assert_eq!(
            resolve_target(Some(Path::new("out.pdf")), 1, 1),
            Target::File(PathBuf::from("out.pdf"))
        );
    }

    #[test]
    fn output_is_directory_for_many_documents() {
        assert_eq!(
            resolve_target(Some(Path::new("out")), 3, 1),
            Target::Dir(Some(PathBuf::from("out")))
        );
        assert_eq!(
            resolve_target(Some(Path::new("out")), 1, 2),
            Target::Dir(Some(PathBuf::from("out")))
        );
        assert_eq!(resolve_target(None, 1, 1), Target::Dir(None));
    }

    #[test]
    fn existing_directory_is_never_a_file_target() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_target(Some(dir.path()), 1, 1),
            Target::Dir(Some(dir.path().to_path_buf()))
        );
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "txt2doc",
            "--format",
            "both",
            "--strip-lang",
            "--strict-encoding",
            "-c",
            "2",
            "a.txt",
            "-",
        ])
        .unwrap();
        assert_eq!(cli.format, FormatArg::Both);
        assert_eq!(cli.inputs, vec!["a.txt", "-"]);
        assert!(cli.strip_lang && cli.strict_encoding);

        let config = build_config(&cli, OutputFormat::Pdf, None).unwrap();
        assert_eq!(config.encoding_policy, EncodingPolicy::Strict);
        assert!(config.strip_info_string);
        assert_eq!(config.concurrency, 2);
    }
}
