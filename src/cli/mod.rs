//! # CLI Module
//!
//! Command-line interface for page duplicate detection.
//!
//! ## Usage
//! ```bash
//! # Trim trailing duplicate pages (preview first)
//! page-dedup dedupe-tail --input captures/dune --dry-run
//! page-dedup dedupe-tail --input captures/dune --max-remove 3
//!
//! # Capture a book with the commands from config.yaml
//! page-dedup capture --book "Dune" --max-pages 500
//!
//! # Inspect pages
//! page-dedup fingerprint captures/dune/page_0001.png
//! page-dedup compare captures/dune/page_0041.png captures/dune/page_0042.png
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use page_dedup::config::{Overrides, Settings, DEFAULT_CONFIG_FILE};
use page_dedup::core::comparator::Comparator;
use page_dedup::core::hasher::{Extractor, PerceptualHash};
use page_dedup::core::pages::display_name;
use page_dedup::core::session::{CaptureSession, CaptureSummary, CommandActuator};
use page_dedup::core::tail::{dedupe_tail, TailReport, TailStop};
use page_dedup::error::{ActuatorError, Result};
use page_dedup::events::{CaptureEvent, Event, EventChannel, EventReceiver, TailEvent};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// page-dedup - Detect repeated pages in e-reader captures
#[derive(Parser, Debug)]
#[command(name = "page-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Remove trailing duplicate pages from a capture directory
    DedupeTail {
        /// Directory containing page_*.png
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Minimum pages to keep
        #[arg(long, allow_negative_numbers = true)]
        min_pages: Option<i64>,

        /// Stop after removing this many pages
        #[arg(long, allow_negative_numbers = true)]
        max_remove: Option<i64>,

        /// Only report duplicates, do not delete files
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Capture pages with the configured device commands
    Capture {
        /// Book name (used for the output directory)
        #[arg(long)]
        book: String,

        /// Output directory (default: <output_dir>/<book>)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Maximum pages to capture
        #[arg(long, allow_negative_numbers = true)]
        max_pages: Option<i64>,

        /// Seconds to wait after each page turn
        #[arg(long, allow_negative_numbers = true)]
        wait: Option<f64>,

        /// Seconds to wait before the first capture
        #[arg(long, allow_negative_numbers = true)]
        initial_wait: Option<f64>,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Consecutive duplicates before probing for the end of the book
        #[arg(long, allow_negative_numbers = true)]
        dup_limit: Option<i64>,

        /// Minimum pages before the duplicate stop applies
        #[arg(long, allow_negative_numbers = true)]
        min_pages: Option<i64>,
    },

    /// Print the difference hash and size of page images
    Fingerprint {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Compare two page images and explain the verdict
    Compare {
        previous: PathBuf,
        current: PathBuf,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

/// Duplicate thresholds shared by every command that decides
#[derive(Args, Debug, Clone, Default)]
struct ThresholdArgs {
    /// Duplicate hash distance threshold (0-64)
    #[arg(long, allow_negative_numbers = true)]
    dup_threshold: Option<i64>,

    /// Duplicate mean pixel difference threshold
    #[arg(long, allow_negative_numbers = true)]
    dup_diff_mean: Option<f64>,

    /// Duplicate size delta threshold in KB
    #[arg(long, allow_negative_numbers = true)]
    dup_size_kb: Option<f64>,

    /// Duplicate size delta ratio threshold
    #[arg(long, allow_negative_numbers = true)]
    dup_size_ratio: Option<f64>,
}

impl ThresholdArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            duplicate_threshold: self.dup_threshold,
            duplicate_diff_mean: self.dup_diff_mean,
            duplicate_size_kb: self.dup_size_kb,
            duplicate_size_ratio: self.dup_size_ratio,
            ..Overrides::default()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::DedupeTail {
            thresholds,
            min_pages,
            max_remove,
            ..
        } => Overrides {
            min_pages: *min_pages,
            max_remove: *max_remove,
            ..thresholds.overrides()
        },
        Commands::Capture {
            thresholds,
            max_pages,
            wait,
            initial_wait,
            dup_limit,
            min_pages,
            ..
        } => Overrides {
            duplicate_limit: *dup_limit,
            min_pages: *min_pages,
            max_pages: *max_pages,
            wait_after_turn: *wait,
            initial_wait: *initial_wait,
            ..thresholds.overrides()
        },
        Commands::Compare { thresholds, .. } => thresholds.overrides(),
        Commands::Fingerprint { .. } => Overrides::default(),
    };
    let overrides = Overrides {
        log_file: cli.log_file.clone(),
        ..overrides
    };

    let settings = Settings::load(&cli.config, overrides)?;
    page_dedup::init_tracing(settings.log_file.as_deref())?;

    match cli.command {
        Commands::DedupeTail {
            input,
            dry_run,
            output,
            ..
        } => run_dedupe_tail(&settings, &input, dry_run, output),
        Commands::Capture { book, output, .. } => run_capture(&settings, &book, output),
        Commands::Fingerprint { files, output } => run_fingerprint(&files, output),
        Commands::Compare {
            previous,
            current,
            output,
            ..
        } => run_compare(&settings, &previous, &current, output),
    }
}

fn run_dedupe_tail(
    settings: &Settings,
    input: &Path,
    dry_run: bool,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();
    let config = settings.tail_config(dry_run);

    if matches!(output, OutputFormat::Pretty) {
        print_header(&term, "Tail dedupe");
    }

    let (sender, receiver) = EventChannel::new();
    let progress = matches!(output, OutputFormat::Pretty).then(spinner);
    let event_thread = spawn_tail_progress(receiver, progress);

    let report = dedupe_tail(input, &config, &Comparator::default(), &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    let report = report?;

    match output {
        OutputFormat::Pretty => print_tail_report(&term, &report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn spawn_tail_progress(receiver: EventReceiver, progress: Option<ProgressBar>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = progress.as_ref() else {
                continue;
            };
            match event {
                Event::Tail(TailEvent::PairChecked {
                    current, verdict, ..
                }) => {
                    pb.inc(1);
                    pb.set_message(format!("{}: {}", display_name(&current), verdict));
                }
                Event::Tail(TailEvent::RemovalFailed { path, message }) => {
                    pb.println(format!(
                        "  {} {}: {}",
                        style("!").red().bold(),
                        display_name(&path),
                        message
                    ));
                }
                Event::Tail(TailEvent::Completed { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
    })
}

fn print_tail_report(term: &Term, report: &TailReport) {
    term.write_line("").ok();
    if report.marked.is_empty() {
        term.write_line(&format!(
            "{} No trailing duplicate pages found.",
            style("✓").green().bold()
        ))
        .ok();
    } else {
        let (action, pages) = if report.dry_run {
            ("Would remove", &report.marked)
        } else {
            ("Removed", &report.removed)
        };
        term.write_line(&format!(
            "{} {} {} trailing duplicate page(s).",
            style("✓").green().bold(),
            action,
            style(pages.len()).cyan()
        ))
        .ok();
        for path in pages {
            term.write_line(&format!("  - {}", display_name(path))).ok();
        }
    }

    for failure in &report.failures {
        term.write_line(&format!("  {} {}", style("✗").red(), failure)).ok();
    }

    let stop = match &report.stop {
        TailStop::TooFewPages => "not enough pages to compare".to_string(),
        TailStop::FloorReached => "reached min_pages".to_string(),
        TailStop::LimitReached => "reached max_remove".to_string(),
        TailStop::NonDuplicate => "found the last new page".to_string(),
        TailStop::ComparisonFailed { path, message } => {
            format!("could not compare {}: {}", display_name(path), message)
        }
    };
    term.write_line(&format!(
        "  {} {} of {} pages remain ({})",
        style("·").dim(),
        style(report.remaining).cyan(),
        report.pages_before,
        style(stop).dim()
    ))
    .ok();
}

fn run_capture(settings: &Settings, book: &str, output: Option<PathBuf>) -> Result<()> {
    let term = Term::stderr();
    if settings.capture_command.is_none() {
        return Err(ActuatorError::NotConfigured {
            action: "capture (set app_capture.capture_command)",
        }
        .into());
    }

    let output_dir = output.unwrap_or_else(|| settings.book_dir(book));
    print_header(&term, &format!("Capturing \"{}\"", book));
    term.write_line(&format!("  Output: {}", display_path(&output_dir))).ok();

    let (sender, receiver) = EventChannel::new();
    let session = CaptureSession::new(
        settings.session_config(Some(book.to_string())),
        Comparator::default(),
        &output_dir,
        sender,
    )?;
    let progress = spinner();
    if let Some(max_pages) = settings.max_pages {
        progress.set_length(max_pages as u64);
        progress.set_style(bar_style());
    }
    let event_thread = spawn_capture_progress(receiver, progress);

    if let Err(e) = ctrlc::set_handler(interrupt_handler(session.cancel_flag())) {
        warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let mut actuator = CommandActuator::new(settings.actuator_config());
    // The session owns the sender, so the event thread ends when run returns
    let summary = session.run(&mut actuator);
    event_thread.join().ok();

    print_capture_summary(&term, &summary?, &output_dir);
    Ok(())
}

fn spawn_capture_progress(receiver: EventReceiver, pb: ProgressBar) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Capture(CaptureEvent::PageCaptured(decision)) => {
                    pb.inc(1);
                    let marker = if decision.is_duplicate() {
                        style(format!("duplicate x{}", decision.streak)).yellow().to_string()
                    } else {
                        style("new").green().to_string()
                    };
                    pb.set_message(format!("page {} {}", decision.page, marker));
                }
                Event::Capture(CaptureEvent::RecoveryStarted { page, streak }) => {
                    pb.println(format!(
                        "  {} {} duplicates at page {}, probing next page",
                        style("?").yellow().bold(),
                        streak,
                        page
                    ));
                }
                Event::Capture(CaptureEvent::RecoveryAdvanced { confirm_page, .. }) => {
                    pb.inc(1);
                    pb.println(format!(
                        "  {} page {} is new, continuing",
                        style("✓").green(),
                        confirm_page
                    ));
                }
                Event::Capture(CaptureEvent::EndOfContent { flagged_page, .. }) => {
                    pb.println(format!(
                        "  {} end of content after page {}",
                        style("■").cyan(),
                        flagged_page.saturating_sub(1)
                    ));
                }
                Event::Capture(
                    CaptureEvent::RecoveryFailed { page, message }
                    | CaptureEvent::ComparisonFailed { page, message },
                ) => {
                    pb.println(format!("  {} page {}: {}", style("✗").red(), page, message));
                }
                Event::Capture(CaptureEvent::Completed { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
        pb.finish_and_clear();
    })
}

fn print_capture_summary(term: &Term, summary: &CaptureSummary, output_dir: &Path) {
    term.write_line("").ok();
    term.write_line(&format!(
        "{} Capture complete ({})",
        style("✓").green().bold(),
        style(summary.stop_reason).dim()
    ))
    .ok();
    term.write_line(&format!(
        "  {} pages in {}",
        style(summary.pages.len()).cyan(),
        display_path(output_dir)
    ))
    .ok();
    term.write_line(&format!("  Session {}", style(&summary.session_id).dim()))
        .ok();
}

fn run_fingerprint(files: &[PathBuf], output: OutputFormat) -> Result<()> {
    let extractor = Extractor::default();
    let mut fingerprints = Vec::with_capacity(files.len());
    for file in files {
        fingerprints.push(extractor.fingerprint_file(file)?);
    }

    match output {
        OutputFormat::Pretty => {
            for fingerprint in &fingerprints {
                println!(
                    "{}  {:>9.2} KB  {}",
                    style(fingerprint.hash.to_hex()).cyan(),
                    fingerprint.size_kb,
                    display_path(&fingerprint.source)
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&fingerprints)?),
    }
    Ok(())
}

fn run_compare(
    settings: &Settings,
    previous: &Path,
    current: &Path,
    output: OutputFormat,
) -> Result<()> {
    let metrics = Comparator::default().compare_files(previous, current)?;
    let verdict = settings.policy.evaluate(&metrics);

    match output {
        OutputFormat::Pretty => {
            let term = Term::stdout();
            let headline = if verdict.is_duplicate {
                style("duplicate").yellow().bold()
            } else {
                style("new page").green().bold()
            };
            term.write_line(&format!(
                "{} -> {}: {}",
                display_name(previous),
                display_name(current),
                headline
            ))
            .ok();
            term.write_line(&format!(
                "  hash distance  {:>8}   (<= {})",
                metrics.hamming_distance, settings.policy.hash_threshold
            ))
            .ok();
            term.write_line(&format!(
                "  mean diff      {:>8.2}   (<= {:.2})",
                metrics.mean_diff, settings.policy.mean_diff_threshold
            ))
            .ok();
            term.write_line(&format!("  size delta     {:>8.2} KB", metrics.size_delta_kb))
                .ok();
            if let Some(ratio) = metrics.size_ratio {
                term.write_line(&format!("  size ratio     {:>8.4}", ratio)).ok();
            }
            term.write_line(&format!("  {}", style(verdict).dim())).ok();
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "previous": previous,
                "current": current,
                "metrics": metrics,
                "verdict": verdict,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// First Ctrl-C stops the capture after the current page; a second one exits
/// at once.
fn interrupt_handler(cancel: Arc<AtomicBool>) -> impl FnMut() + Send + 'static {
    move || {
        if cancel.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        warn!("Interrupted, stopping after the current page (Ctrl-C again to abort)");
    }
}

fn print_header(term: &Term, title: &str) {
    term.write_line(&format!(
        "{} {}",
        style("page-dedup").bold().cyan(),
        style(title).dim()
    ))
    .ok();
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

/// Path with the home directory shortened to `~`
fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_sets_the_cancel_flag() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut handler = interrupt_handler(Arc::clone(&cancel));

        handler();

        assert!(cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn capture_flags_parse() {
        let cli = Cli::try_parse_from([
            "page-dedup",
            "capture",
            "--book",
            "Dune",
            "--max-pages",
            "40",
            "--dup-limit",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Capture {
                book,
                max_pages,
                dup_limit,
                ..
            } => {
                assert_eq!(book, "Dune");
                assert_eq!(max_pages, Some(40));
                assert_eq!(dup_limit, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
