//! Batch conversion: many inputs, one or more formats, bounded concurrency.
//!
//! Each input is read exactly once and rendered to every requested format
//! from that text; stdin (`-`) is read once for the whole batch. Different
//! inputs are converted concurrently (at most `config.concurrency` at a
//! time). Every (input, format) pair is one job with one [`BatchItem`].
//!
//! Output paths are assigned before anything is rendered. A job whose path
//! is already taken by an earlier job fails with a [`DocumentError`]
//! instead of overwriting it. One bad input never aborts the batch.
//!
//! Jobs finish in completion order; the returned vector is sorted back
//! into input order, then format order.

use crate::config::{ConversionConfig, OutputFormat};
use crate::convert::{config_for_source, convert_sync};
use crate::error::{DocumentError, Txt2DocError};
use crate::output::{BatchItem, ConversionStats};
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

type ReadFn = Arc<dyn Fn(&str) -> Result<String, Txt2DocError> + Send + Sync>;

/// Input text shared by all formats of one input, or the read failure.
type SharedText = Result<Arc<String>, String>;

/// One input with its resolved config and one output slot per format.
struct InputPlan {
    index: usize,
    source: String,
    config: ConversionConfig,
    outputs: Vec<Result<PathBuf, String>>,
}

/// Convert every input in `inputs` to each of `formats`.
///
/// Each source is a file path or `-` for stdin. Artifacts are named after
/// their input (`notes.txt` → `notes.pdf`); stdin uses the configured stem.
/// Progress events are per job: `total` is `inputs.len() * formats.len()`.
pub async fn convert_batch(
    inputs: &[String],
    formats: &[OutputFormat],
    output_dir: Option<&Path>,
    config: &ConversionConfig,
) -> Vec<BatchItem> {
    let read: ReadFn = Arc::new(input::read_input);
    run_batch(inputs, formats, output_dir, config, read).await
}

async fn run_batch(
    inputs: &[String],
    formats: &[OutputFormat],
    output_dir: Option<&Path>,
    config: &ConversionConfig,
    read: ReadFn,
) -> Vec<BatchItem> {
    let total = inputs.len() * formats.len();
    let names: Vec<String> = formats.iter().map(|f| f.to_string()).collect();
    info!(
        "Starting batch of {} document(s) → {}",
        total,
        names.join(" + ")
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // Stdin drains on first read; every `-` shares this text.
    let stdin = if inputs.iter().any(|s| input::is_stdin(s)) {
        Some(load(input::STDIN, &read).await)
    } else {
        None
    };

    let plans = plan_outputs(inputs, formats, output_dir, config);
    let groups: Vec<Vec<BatchItem>> = stream::iter(plans.into_iter().map(|plan| {
        let read = Arc::clone(&read);
        let stdin = stdin.clone();
        async move { convert_input(plan, formats, stdin, read, total).await }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    let mut items: Vec<BatchItem> = groups.into_iter().flatten().collect();
    items.sort_by_key(|item| (item.index, formats.iter().position(|f| *f == item.format)));

    let succeeded = items.iter().filter(|i| i.is_ok()).count();
    info!("Batch complete: {}/{} document(s) converted", succeeded, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }
    items
}

/// Resolve every output path up front. The first job to claim a path owns
/// it; later jobs mapping to the same path get an error slot.
fn plan_outputs(
    inputs: &[String],
    formats: &[OutputFormat],
    output_dir: Option<&Path>,
    config: &ConversionConfig,
) -> Vec<InputPlan> {
    let mut claimed: HashMap<PathBuf, usize> = HashMap::new();
    let mut plans = Vec::with_capacity(inputs.len());

    for (index, source) in inputs.iter().enumerate() {
        let config = config_for_source(source, config);
        let mut outputs = Vec::with_capacity(formats.len());
        for &format in formats {
            let dest = destination(source, &config.file_name_for(format), output_dir);
            match claimed.get(&dest) {
                Some(&owner) => outputs.push(Err(format!(
                    "Output {} is already written by input {} ('{}')",
                    dest.display(),
                    owner + 1,
                    input::display_name(&inputs[owner])
                ))),
                None => {
                    claimed.insert(dest.clone(), index);
                    outputs.push(Ok(dest));
                }
            }
        }
        plans.push(InputPlan {
            index,
            source: source.clone(),
            config,
            outputs,
        });
    }
    plans
}

async fn convert_input(
    plan: InputPlan,
    formats: &[OutputFormat],
    stdin: Option<SharedText>,
    read: ReadFn,
    total: usize,
) -> Vec<BatchItem> {
    let name = input::display_name(&plan.source);
    let text = match stdin {
        Some(text) if input::is_stdin(&plan.source) => text,
        _ => load(&plan.source, &read).await,
    };

    let mut items = Vec::with_capacity(formats.len());
    for (slot, (&format, output)) in formats.iter().zip(plan.outputs).enumerate() {
        let job = plan.index * formats.len() + slot;
        if let Some(ref cb) = plan.config.progress_callback {
            cb.on_document_start(job, total, &name);
        }

        let outcome = match (&text, output) {
            (Err(detail), _) => Err(detail.clone()),
            (Ok(_), Err(detail)) => Err(detail),
            (Ok(text), Ok(dest)) => render_to(text, format, &dest, &plan.config)
                .await
                .map(|stats| (stats, dest))
                .map_err(|e| e.to_string()),
        };

        items.push(match outcome {
            Ok((stats, path)) => {
                if let Some(ref cb) = plan.config.progress_callback {
                    cb.on_document_complete(job, total, stats.size_bytes);
                }
                BatchItem {
                    index: plan.index,
                    source: plan.source.clone(),
                    format,
                    output: Some(path),
                    result: Ok(stats),
                }
            }
            Err(detail) => {
                warn!("Document {} ('{}') → {} failed: {}", plan.index, name, format, detail);
                if let Some(ref cb) = plan.config.progress_callback {
                    cb.on_document_error(job, total, &detail);
                }
                BatchItem {
                    index: plan.index,
                    source: plan.source.clone(),
                    format,
                    output: None,
                    result: Err(DocumentError {
                        index: plan.index,
                        name: name.clone(),
                        detail,
                    }),
                }
            }
        });
    }
    items
}

async fn load(source: &str, read: &ReadFn) -> SharedText {
    let owned = source.to_string();
    let read = Arc::clone(read);
    let result = tokio::task::spawn_blocking(move || read(&owned))
        .await
        .map_err(|e| Txt2DocError::Internal(format!("read task failed: {e}")))
        .and_then(|r| r);
    match result {
        Ok(text) => {
            debug!("Read {} chars from {}", text.chars().count(), input::display_name(source));
            Ok(Arc::new(text))
        }
        Err(e) => Err(e.to_string()),
    }
}

async fn render_to(
    text: &Arc<String>,
    format: OutputFormat,
    dest: &Path,
    config: &ConversionConfig,
) -> Result<ConversionStats, Txt2DocError> {
    let text = Arc::clone(text);
    let task_config = config.clone();
    let output = tokio::task::spawn_blocking(move || convert_sync(&text, format, &task_config))
        .await
        .map_err(|e| Txt2DocError::Internal(format!("conversion task failed: {e}")))??;
    output.artifact.persist(dest)?;
    Ok(output.stats)
}

/// Where a batch artifact goes: `output_dir` if given, else beside the
/// input file, else (stdin) the working directory.
pub fn destination(source: &str, file_name: &str, output_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = output_dir {
        return dir.join(file_name);
    }
    if input::is_stdin(source) {
        return PathBuf::from(file_name);
    }
    Path::new(source)
        .parent()
        .map(|p| p.join(file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConversionProgressCallback;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        completed: AtomicUsize,
        failed: AtomicUsize,
        success: AtomicUsize,
    }

    impl ConversionProgressCallback for Counter {
        fn on_document_start(&self, _index: usize, _total: usize, _name: &str) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_document_complete(&self, _index: usize, _total: usize, _size_bytes: u64) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn destination_rules() {
        assert_eq!(
            destination("/a/b/notes.txt", "notes.pdf", None),
            PathBuf::from("/a/b/notes.pdf")
        );
        assert_eq!(
            destination("/a/b/notes.txt", "notes.pdf", Some(Path::new("/out"))),
            PathBuf::from("/out/notes.pdf")
        );
        assert_eq!(destination("-", "output.pdf", None), PathBuf::from("output.pdf"));
    }

    #[tokio::test]
    async fn batch_keeps_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let c = dir.path().join("c.txt");
        std::fs::write(&a, "alpha ```one```").unwrap();
        std::fs::write(&c, "gamma").unwrap();
        let inputs = vec![
            a.to_string_lossy().into_owned(),
            dir.path().join("missing.txt").to_string_lossy().into_owned(),
            c.to_string_lossy().into_owned(),
        ];

        let counter = Arc::new(Counter::default());
        let config = ConversionConfig::builder()
            .concurrency(2)
            .progress_callback(counter.clone())
            .build()
            .unwrap();
        let out_dir = dir.path().join("out");
        let items = convert_batch(&inputs, &[OutputFormat::Docx], Some(&out_dir), &config).await;

        assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(items[0].is_ok());
        assert!(!items[1].is_ok());
        assert!(items[2].is_ok());
        assert_eq!(items[0].output.as_deref(), Some(out_dir.join("a.docx").as_path()));
        assert!(out_dir.join("a.docx").exists());
        assert!(out_dir.join("c.docx").exists());

        let err = items[1].result.as_ref().unwrap_err();
        assert_eq!(err.name, "missing.txt");

        assert_eq!(counter.started.load(Ordering::SeqCst), 3);
        assert_eq!(counter.completed.load(Ordering::SeqCst), 2);
        assert_eq!(counter.failed.load(Ordering::SeqCst), 1);
        assert_eq!(counter.success.load(Ordering::SeqCst), 2);
    }

    fn document_xml(path: &Path) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[tokio::test]
    async fn stdin_is_read_once_for_all_formats() {
        let dir = tempfile::tempdir().unwrap();
        let reads = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&reads);
        // Behaves like a pipe: the second read finds nothing left.
        let read: ReadFn = Arc::new(move |_source: &str| {
            let text = if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                "hello ```print(1)``` world"
            } else {
                ""
            };
            Ok(text.to_string())
        });

        let inputs = vec!["-".to_string()];
        let items = run_batch(
            &inputs,
            &OutputFormat::ALL,
            Some(dir.path()),
            &ConversionConfig::default(),
            read,
        )
        .await;

        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(
            items.iter().map(|i| i.format).collect::<Vec<_>>(),
            OutputFormat::ALL.to_vec()
        );
        for item in &items {
            let stats = item.result.as_ref().unwrap();
            assert_eq!(stats.segments, 3, "{}", item.format);
            assert_eq!(stats.code_blocks, 1, "{}", item.format);
        }
        assert!(dir.path().join("output.docx").exists());
        assert!(dir.path().join("output.pdf").exists());
    }

    #[tokio::test]
    async fn colliding_outputs_fail_instead_of_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        let a = dir.path().join("a/notes.txt");
        let b = dir.path().join("b/notes.txt");
        std::fs::write(&a, "AAA").unwrap();
        std::fs::write(&b, "BBB").unwrap();
        let inputs = vec![
            a.to_string_lossy().into_owned(),
            b.to_string_lossy().into_owned(),
        ];

        let out_dir = dir.path().join("out");
        let items = convert_batch(
            &inputs,
            &[OutputFormat::Docx],
            Some(&out_dir),
            &ConversionConfig::default(),
        )
        .await;

        assert!(items[0].is_ok());
        assert_eq!(items[0].output.as_deref(), Some(out_dir.join("notes.docx").as_path()));
        let err = items[1].result.as_ref().unwrap_err();
        assert_eq!(err.index, 1);
        assert!(err.detail.contains("already written"), "got: {}", err.detail);
        assert_eq!(items[1].output, None);

        let xml = document_xml(&out_dir.join("notes.docx"));
        assert!(xml.contains("AAA") && !xml.contains("BBB"));
    }

    #[test]
    fn same_stem_beside_inputs_does_not_collide() {
        let inputs = vec!["/a/notes.txt".to_string(), "/b/notes.txt".to_string()];
        let plans = plan_outputs(
            &inputs,
            &[OutputFormat::Pdf],
            None,
            &ConversionConfig::default(),
        );
        assert_eq!(plans[0].outputs[0], Ok(PathBuf::from("/a/notes.pdf")));
        assert_eq!(plans[1].outputs[0], Ok(PathBuf::from("/b/notes.pdf")));
    }
}
