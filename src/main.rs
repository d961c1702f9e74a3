use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use epub_zhconv::archive::WorkdirLocation;
use epub_zhconv::config::{self, Config};
use epub_zhconv::convert::{self, Direction};
use epub_zhconv::ops::{self, ConversionRequest, Pipeline};
use epub_zhconv::extract;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "epub-zhconv")]
#[command(version = VERSION)]
#[command(about = "Convert EPUB books between Chinese script variants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Convert an EPUB archive
    Convert {
        /// Input EPUB
        input: PathBuf,
        /// Output EPUB (default: <input stem>_<variant>.epub)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Term override file, one `original,replacement` per line
        #[arg(short, long)]
        dictionary: Option<PathBuf>,
        /// Do not pick up dictionary.txt next to the input or the last used dictionary
        #[arg(long)]
        no_default_dictionary: bool,
        /// Also write a plain-text rendition next to the output (default: last used)
        #[arg(short, long)]
        text: bool,
        /// Do not write the plain-text rendition even if the last run did
        #[arg(long, conflicts_with = "text")]
        no_text: bool,
        /// Conversion direction (default: last used, else s2t)
        #[arg(long, value_enum)]
        direction: Option<Direction>,
        /// Extract into this directory instead of a temporary one (its content is deleted)
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Keep the working directory after the run
        #[arg(long)]
        keep_workdir: bool,
    },
    /// Print the plain-text rendition of one markup file
    ExtractText {
        path: PathBuf,
    },
    /// List supported conversion directions
    Directions,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let app_dir = Config::get_app_data_dir();
    let file_appender = tracing_appender::rolling::never(&app_dir, config::LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(tracing_subscriber::EnvFilter::new("debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
                ),
        )
        .init();

    let result = run(cli.command);

    // Drop guard to flush and close the log file
    drop(guard);

    // Keep the log only when something went wrong
    if result.is_ok() {
        let log_file = Config::get_log_path();
        if log_file.exists() {
            let _ = std::fs::remove_file(log_file);
        }
    }
    result
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Convert {
            input,
            output,
            dictionary,
            no_default_dictionary,
            text,
            no_text,
            direction,
            workdir,
            keep_workdir,
        } => {
            let saved = Config::load();
            let direction = direction.unwrap_or_else(|| saved.direction());
            let pipeline = Pipeline::new(convert::converter_for(direction));

            let output = match output {
                Some(o) => o,
                None => ops::default_output_path(&input, direction, pipeline.converter())?,
            };
            let dictionary = dictionary.or_else(|| {
                if no_default_dictionary {
                    None
                } else {
                    ops::default_dictionary_path(&input).or_else(|| saved.dictionary())
                }
            });
            if let Some(d) = &dictionary {
                tracing::info!("Using dictionary {:?}", d);
            }

            let request = ConversionRequest {
                input: input.clone(),
                output,
                dictionary,
                emit_text: saved.emit_text(text, no_text),
                direction,
                workdir: workdir.map(WorkdirLocation::At).unwrap_or_default(),
                keep_workdir,
            };

            match pipeline.run(&request) {
                Ok(report) => {
                    println!(
                        "Converted {} files: {} -> {}",
                        report.files_converted,
                        input.display(),
                        report.output.display()
                    );
                    if let Some(txt) = &report.text_output {
                        println!("Plain text: {}", txt.display());
                    }
                    if let Some(dir) = &report.kept_workdir {
                        println!("Working directory kept at {}", dir.display());
                    }
                    if let Err(e) = Config::save_last_run(
                        direction,
                        request.dictionary.as_deref(),
                        request.emit_text,
                    ) {
                        tracing::warn!("Failed to save settings: {}", e);
                    }
                    Ok(())
                }
                Err(e) => {
                    let stage = e.stage();
                    tracing::error!("Conversion failed at {}: {}", stage, e);
                    eprintln!("Log kept at {}", Config::get_log_path().display());
                    Err(anyhow::Error::new(e).context(format!("{stage} stage failed")))
                }
            }
        }
        Commands::ExtractText { path } => {
            let content = std::fs::read_to_string(&path)?;
            println!("{}", extract::markup_to_text(&content));
            Ok(())
        }
        Commands::Directions => {
            for d in Direction::ALL {
                println!("{:<10} output suffix {}", d.name(), d.output_suffix());
            }
            Ok(())
        }
    }
}
