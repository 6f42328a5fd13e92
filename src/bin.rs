//! `thread-gpt` binary: parse flags, install logging, load config, serve Slack.

use clap::Parser;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use thread_gpt::base::{config::Config, types::Void};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Thread-gpt: answers Slack mentions and thread replies with an LLM.
///
/// Tokens, the model, and the transport (`socket` or `http`) are read from a
/// TOML file and `THREAD_GPT_*` environment variables; the variables win.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML config file (defaults to `.hidden/config.toml` when it exists).
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Log more: `-v` for DEBUG (skipped events, choice counts), `-vv` for TRACE.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Export spans to an OTLP collector over HTTP.
    ///
    /// The endpoint is taken from the standard `OTEL_EXPORTER_OTLP_*`
    /// environment variables.
    #[arg(long)]
    otlp: bool,
}

#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer, if requested.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("thread-gpt");

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    let config = Config::load(args.config.as_deref())?;

    thread_gpt::start(config).await
}
