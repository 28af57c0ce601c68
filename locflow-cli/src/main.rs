use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use locflow::{Codec, ExportParams, ImportAddFilesParams, ParseOptions};
use locflow_cli::{
    config::{Config, ForceArg, parse_delimiter, parse_dialect, parse_export_format},
    convert::{ConvertOptions, run_convert},
    export::run_export,
    import::{ImportOptions, run_import},
    view::print_view,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./locflow.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// View localization files.
    View {
        /// The input files to view
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Optional language code to filter entries by
        #[arg(short, long)]
        lang: Option<String>,

        /// Display full value without truncation
        #[arg(long)]
        full: bool,
    },

    /// Convert localization files between formats.
    Convert {
        /// The input files to read
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output directory, or a `.zip` file
        #[arg(short, long)]
        output: String,

        /// Target format (json, xliff, apple-xliff, po, android, apple-strings, arb, properties)
        #[arg(short, long)]
        format: Option<String>,

        /// Placeholder dialect for PO output (c, php, python)
        #[arg(long)]
        message_format: Option<String>,

        /// Only export these languages (comma separated)
        #[arg(long, value_delimiter = ',')]
        languages: Option<Vec<String>>,

        /// Delimiter of nested JSON keys; empty for flat keys
        #[arg(long)]
        structure_delimiter: Option<String>,

        /// Language of inputs that do not declare one
        #[arg(long)]
        lang: Option<String>,

        /// Source language of XLIFF output
        #[arg(long)]
        base_language: Option<String>,

        /// Reject inputs whose language cannot be determined
        #[arg(long)]
        strict: bool,
    },

    /// Import files into a project snapshot.
    Import {
        /// Files or zip archives to import
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Project snapshot file
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        #[arg(long)]
        project: Option<u64>,

        #[arg(long)]
        user: Option<u64>,

        /// Base language created for an empty project
        #[arg(long)]
        base_language: Option<String>,

        /// Namespace of every imported file
        #[arg(long)]
        namespace: Option<String>,

        /// How to treat conflicts with committed translations
        #[arg(long, value_enum)]
        force: Option<ForceArg>,

        /// Number of translations written per storage batch
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Tag every imported key (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Delimiter of nested JSON keys; empty for flat keys
        #[arg(long)]
        structure_delimiter: Option<String>,

        /// Keep printf placeholders as literal text
        #[arg(long)]
        raw_placeholders: bool,

        /// Print progress as NDJSON status lines
        #[arg(long)]
        stream: bool,
    },

    /// Export the translations of a project snapshot.
    Export {
        /// Project snapshot file
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        #[arg(long)]
        project: Option<u64>,

        /// Output directory, or a `.zip` file
        #[arg(short, long)]
        output: String,

        #[arg(short, long)]
        format: Option<String>,

        #[arg(long)]
        message_format: Option<String>,

        #[arg(long, value_delimiter = ',')]
        languages: Option<Vec<String>>,

        #[arg(long)]
        structure_delimiter: Option<String>,
    },
}

const DEFAULT_SNAPSHOT: &str = "locflow-project.json";
const DEFAULT_PROJECT: u64 = 1;
const DEFAULT_USER: u64 = 1;

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Resolves a flag against its config value and default.
fn delimiter(flag: Option<String>, configured: Option<String>) -> Result<Option<char>, String> {
    match flag.or(configured) {
        Some(value) => parse_delimiter(&value),
        None => Ok(Some('.')),
    }
}

fn export_params(
    config: &Config,
    format: Option<String>,
    message_format: Option<String>,
    languages: Option<Vec<String>>,
    structure_delimiter: Option<String>,
) -> Result<ExportParams, String> {
    let format = format
        .or_else(|| config.export.format.clone())
        .ok_or_else(|| "An output format is required (--format or [export] format)".to_string())?;
    let dialect = message_format
        .or_else(|| config.export.message_format.clone())
        .map(|value| parse_dialect(&value))
        .transpose()?;
    Ok(ExportParams::new(parse_export_format(&format)?)
        .with_message_format(dialect)
        .with_languages(languages.or_else(|| config.export.languages.clone()))
        .with_structure_delimiter(delimiter(structure_delimiter, config.export.structure_delimiter.clone())?))
}

async fn run(args: Args) -> Result<(), String> {
    let config = Config::load(args.config.as_deref())?;

    match args.commands {
        Commands::View { inputs, lang, full } => {
            let mut codec = Codec::new();
            for input in &inputs {
                codec
                    .read_file_by_extension(input, &ParseOptions::default())
                    .map_err(|e| format!("Failed to read {}: {}", input, e))?;
            }
            print_view(&codec, &lang, full)
        }
        Commands::Convert {
            inputs,
            output,
            format,
            message_format,
            languages,
            structure_delimiter,
            lang,
            base_language,
            strict,
        } => {
            let params = export_params(&config, format, message_format, languages, structure_delimiter)?;
            let options = ConvertOptions {
                format: params.format,
                message_format: params.message_format,
                languages: params.languages,
                structure_delimiter: params.structure_delimiter,
                language_hint: lang,
                base_language,
                strict,
            };
            let count = run_convert(&inputs, &output, &options)?;
            println!("Wrote {} file(s) to {}", count, output);
            Ok(())
        }
        Commands::Import {
            inputs,
            snapshot,
            project,
            user,
            base_language,
            namespace,
            force,
            chunk_size,
            tags,
            structure_delimiter,
            raw_placeholders,
            stream,
        } => {
            let imports = &config.import;
            let convert_placeholders = if raw_placeholders {
                false
            } else {
                imports.convert_placeholders.unwrap_or(true)
            };
            let options = ImportOptions {
                snapshot: snapshot
                    .or_else(|| imports.snapshot.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT)),
                project: project.or(imports.project).unwrap_or(DEFAULT_PROJECT),
                user: user.or(imports.user).unwrap_or(DEFAULT_USER),
                base_language: base_language.or_else(|| imports.base_language.clone()),
                namespace,
                params: ImportAddFilesParams {
                    structure_delimiter: delimiter(structure_delimiter, imports.structure_delimiter.clone())?,
                    store_raw_files: false,
                    convert_placeholders,
                },
                force: force.or(imports.force).unwrap_or(ForceArg::No).into(),
                chunk_size: chunk_size.or(imports.chunk_size),
                tags: if tags.is_empty() { imports.tags.clone() } else { tags },
                stream,
            };
            run_import(&inputs, &options).await.map(|_| ())
        }
        Commands::Export {
            snapshot,
            project,
            output,
            format,
            message_format,
            languages,
            structure_delimiter,
        } => {
            let params = export_params(&config, format, message_format, languages, structure_delimiter)?;
            let snapshot = snapshot
                .or_else(|| config.import.snapshot.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT));
            let project = project.or(config.import.project).unwrap_or(DEFAULT_PROJECT);
            let count = run_export(&snapshot, project, &output, &params)?;
            println!("Wrote {} file(s) to {}", count, output);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
