use anyhow::{anyhow, Context, Result};
use chapters_docx::{
    ingest, plan_to_json, write_docx_file, Assembler, CompileOptions, FetchOptions, HttpFetcher,
    PackageMetadata, StyleCapabilities,
};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CSV file with `id,title,body` rows after a header row.
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output .docx path (defaults to the input path with a .docx extension).
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Document title written to the package properties.
    #[arg(long)]
    title: Option<String>,

    /// Drop figures instead of fetching and embedding them.
    #[arg(long)]
    no_images: bool,

    /// Drop figure captions.
    #[arg(long)]
    no_captions: bool,

    /// Only honor the class registry, text-align and hex colors.
    #[arg(long)]
    basic_css: bool,

    /// Per-image fetch timeout in seconds (0 disables the timeout).
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Widest image in pixels; percentage widths scale against it.
    #[arg(long, default_value_t = 600)]
    reference_width_px: u32,

    /// User agent sent with image requests.
    #[arg(long, default_value = "Mozilla/5.0")]
    user_agent: String,

    /// Also write the compiled plan and diagnostics as JSON.
    #[arg(long, value_name = "FILE")]
    plan_json: Option<PathBuf>,
}

impl Args {
    fn compile_options(&self) -> CompileOptions {
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        let style = if self.basic_css {
            StyleCapabilities::basic()
        } else {
            StyleCapabilities::default()
        };
        CompileOptions::new()
            .with_images(!self.no_images)
            .with_captions(!self.no_captions)
            .with_style(style)
            .with_reference_width(self.reference_width_px)
            .with_fetch(
                FetchOptions::default()
                    .with_user_agent(self.user_agent.clone())
                    .with_timeout(timeout),
            )
    }

    fn output_path(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| self.input.with_extension("docx"))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let ingested = ingest::read_chapters(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    if ingested.records.is_empty() {
        return Err(anyhow!(
            "no usable chapter rows in {} ({} malformed)",
            args.input.display(),
            ingested.diagnostics.len()
        ));
    }

    let options = args.compile_options();
    let fetcher = HttpFetcher::new(&options.fetch).context("build HTTP client")?;
    let mut conversion = Assembler::new(options, &fetcher).assemble(&ingested.records);

    // Ingestion problems come first in the report.
    let mut report = ingested.diagnostics;
    report.extend(conversion.report);
    conversion.report = report;

    let out = args.output_path();
    let title = args.title.clone().unwrap_or_else(|| {
        args.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let meta = PackageMetadata::default().with_title(title);
    write_docx_file(&out, &conversion.plan, &meta)
        .with_context(|| format!("write {}", out.display()))?;

    if let Some(path) = &args.plan_json {
        let json = plan_to_json(&conversion)?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    }

    log::info!(
        "wrote {} ({} blocks, {} images, {} diagnostics)",
        out.display(),
        conversion.plan.blocks.len(),
        conversion.plan.images.len(),
        conversion.report.len()
    );
    Ok(())
}
