//! CLI binary for edgequake-pdf2mcq.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig`, prompts for anything missing, and writes the two
//! JSON files.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2mcq::output::{write_outputs, DEFAULT_KEYWORDS_FILE, DEFAULT_MCQ_FILE};
use edgequake_pdf2mcq::pipeline::input::clean_path_argument;
use edgequake_pdf2mcq::{
    generate, inspect, Difficulty, GenerationConfig, GenerationProgressCallback, Pass,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Count used when the interactive answer is not an integer.
const FALLBACK_COUNT: usize = 100;

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

/// Terminal progress: one bar counting accepted questions against the target,
/// plus a log line per abandoned chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    abandoned: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF and extracting keywords…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            abandoned: AtomicUsize::new(0),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, target: usize, total_chunks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} MCQs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(target as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating {target} MCQs from {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, total_chunks: usize, pass: Pass) {
        self.bar
            .set_message(dim(&format!("chunk {chunk}/{total_chunks} ({pass})")));
    }

    fn on_chunk_complete(&self, _chunk: usize, produced: usize, _target: usize, _added: usize) {
        self.bar.set_position(produced as u64);
    }

    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        self.abandoned.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>4}/{:<4}  {}",
            red("✗"),
            chunk,
            total_chunks,
            red(&msg)
        ));
    }

    fn on_second_pass(&self, remaining: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Second pass for {remaining} more MCQs…"))
        ));
    }

    fn on_generation_complete(&self, produced: usize, target: usize) {
        self.bar.finish_and_clear();
        let abandoned = self.abandoned.load(Ordering::SeqCst);
        if produced >= target {
            eprintln!("{} {} MCQs generated", green("✔"), bold(&produced.to_string()));
        } else {
            eprintln!(
                "{} {}/{} MCQs generated  ({} chunks abandoned)",
                if produced == 0 { red("✘") } else { cyan("⚠") },
                bold(&produced.to_string()),
                target,
                red(&abandoned.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive: asks for the PDF path and the number of questions
  pdf2mcq

  # 30 questions, default output files (pdf_mcqs.json, pdf_keywords.json)
  pdf2mcq lecture.pdf --count 30

  # Moderate difficulty, custom output paths
  pdf2mcq paper.pdf -n 20 --difficulty moderate \
      --mcq-output out/mcqs.json --keywords-output out/keywords.json

  # Use a specific model
  pdf2mcq --model gpt-4.1 --provider openai notes.pdf -n 10

  # From a URL, full result (questions, keywords, stats) on stdout
  pdf2mcq https://arxiv.org/pdf/1706.03762 -n 15 --json > result.json

  # Check how much text a PDF yields (no API key needed)
  pdf2mcq --inspect-only scanned.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise ./libpdfium or the system library)
  RUST_LOG                Log filter, e.g. RUST_LOG=edgequake_pdf2mcq=debug
"#;

/// Generate multiple-choice questions from PDF files and URLs using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2mcq",
    version,
    about = "Generate multiple-choice questions from PDF files and URLs using LLMs",
    long_about = "Generate multiple-choice questions (MCQs) and a keyword list from a PDF \
document. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible \
endpoint (Ollama, vLLM, LiteLLM, etc.).",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL. Prompted for when omitted.
    input: Option<String>,

    /// Number of MCQs to generate. Prompted for when omitted.
    #[arg(short = 'n', long, env = "PDF2MCQ_COUNT")]
    count: Option<usize>,

    /// Where to write the MCQ list.
    #[arg(long, env = "PDF2MCQ_MCQ_OUTPUT", default_value = DEFAULT_MCQ_FILE)]
    mcq_output: PathBuf,

    /// Where to write the keyword list.
    #[arg(long, env = "PDF2MCQ_KEYWORDS_OUTPUT", default_value = DEFAULT_KEYWORDS_FILE)]
    keywords_output: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature for the first pass (0.0–2.0).
    #[arg(long, env = "PDF2MCQ_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Question difficulty requested from the model.
    #[arg(long, env = "PDF2MCQ_DIFFICULTY", value_enum, default_value = "hard")]
    difficulty: DifficultyArg,

    /// LLM attempts per chunk before it is abandoned.
    #[arg(long, env = "PDF2MCQ_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2MCQ_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2MCQ_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Chunks processed at once (1 = strictly sequential).
    #[arg(short, long, env = "PDF2MCQ_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Seed for chunk order and retry jitter.
    #[arg(long, env = "PDF2MCQ_SEED")]
    seed: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MCQ_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2MCQ_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print the full result (MCQs, keywords, stats) as JSON on stdout instead of writing files.
    #[arg(long, env = "PDF2MCQ_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MCQ_NO_PROGRESS")]
    no_progress: bool,

    /// Print page, character and chunk counts only; no LLM calls.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MCQ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MCQ_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DifficultyArg {
    Easy,
    Moderate,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(v: DifficultyArg) -> Self {
        match v {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Moderate => Difficulty::Moderate,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs unless --verbose is set.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Resolve input ────────────────────────────────────────────────────
    let input = match cli.input {
        Some(ref raw) => clean_path_argument(raw),
        None => clean_path_argument(&prompt_line("Enter the path to your PDF file: ")?),
    };
    if input.is_empty() {
        anyhow::bail!("No PDF path given");
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let info = inspect(&input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:         {}", input);
            println!("Pages:        {}", info.page_count);
            println!("Characters:   {}", info.char_count);
            println!("Chunks:       {}", info.chunk_count);
        }
        return Ok(());
    }

    let count = match cli.count {
        Some(n) => n,
        None => parse_count(&prompt_line("Enter the number of MCQs to generate: ")?),
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run generation ───────────────────────────────────────────────────
    let output = generate(&input, count, &config)
        .await
        .context("Generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let written = write_outputs(&output, &cli.mcq_output, &cli.keywords_output)
        .await
        .context("Failed to write output files")?;

    if !cli.quiet {
        let stats = &output.stats;
        if !show_progress {
            eprintln!(
                "Generated {}/{} MCQs in {}ms",
                stats.produced, stats.target, stats.total_duration_ms
            );
        }
        eprintln!(
            "   {} chunks  /  {} failed attempts  /  {} keywords{}",
            dim(&stats.chunks_attempted.to_string()),
            dim(&stats.failed_attempts.to_string()),
            dim(&stats.keyword_count.to_string()),
            if stats.second_pass_ran {
                dim("  (second pass)")
            } else {
                String::new()
            },
        );
        for path in [written.mcqs, written.keywords].into_iter().flatten() {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .temperature(cli.temperature)
        .difficulty(cli.difficulty.clone().into())
        .max_attempts(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .concurrency(cli.concurrency);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(seed) = cli.seed {
        builder = builder.shuffle_seed(seed);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Print `prompt` on stderr and read one line from stdin.
fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

/// Parse an interactively entered count; anything but an integer means 100.
fn parse_count(raw: &str) -> usize {
    raw.trim().parse().unwrap_or_else(|_| {
        eprintln!(
            "{} '{}' is not a number, generating {} MCQs",
            cyan("⚠"),
            raw.trim(),
            FALLBACK_COUNT
        );
        FALLBACK_COUNT
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_parsing() {
        assert_eq!(parse_count("25"), 25);
        assert_eq!(parse_count("  7 \n"), 7);
        assert_eq!(parse_count("twenty"), FALLBACK_COUNT);
        assert_eq!(parse_count(""), FALLBACK_COUNT);
        assert_eq!(parse_count("-3"), FALLBACK_COUNT);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "pdf2mcq",
            "paper.pdf",
            "-n",
            "12",
            "--difficulty",
            "moderate",
            "--seed",
            "9",
        ])
        .unwrap();
        assert_eq!(cli.input.as_deref(), Some("paper.pdf"));
        assert_eq!(cli.count, Some(12));
        assert!(matches!(cli.difficulty, DifficultyArg::Moderate));
        assert_eq!(cli.seed, Some(9));
        assert_eq!(cli.mcq_output, PathBuf::from(DEFAULT_MCQ_FILE));
    }
}
