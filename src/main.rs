//! Purpose: `unmht` CLI entry point: inspect or unpack an MHT archive with a parsing program.
//! Role: Binary crate root; parses args, runs one extraction, emits JSON on stdout.
//! Invariants: Successful commands print exactly one JSON summary on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `unmht::to_exit_code`.
//! Invariants: Diagnostics (`print`, tracing) go to stderr only.
#![allow(clippy::result_large_err)]
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod summary_json;

use summary_json::{document_summary, part_file_name};
use unmht::{Document, Error, ErrorKind, ReferenceMode, extract, release_document, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint(clap_error_hint(&err)));
            }
        },
    };

    match cli.command {
        Command::Inspect { source, pretty } => {
            let document = source.extract()?;
            let summary = document_summary(&document);
            release_document(document);
            emit_json(&summary, pretty)?;
        }
        Command::Unpack {
            source,
            out,
            pretty,
        } => {
            let document = source.extract()?;
            unpack_parts(&document, &out)?;
            let summary = document_summary(&document).with_files(&out);
            release_document(document);
            emit_json(&summary, pretty)?;
        }
    }
    Ok(RunOutcome::ok())
}

#[derive(Parser)]
#[command(
    name = "unmht",
    version,
    about = "Extract the parts of an MHT web archive",
    long_about = None,
    after_help = r#"EXAMPLES
  $ unmht inspect page.mht --program mht.jq
  $ unmht inspect page.mht --program mht.jq --cid --pretty
  $ unmht unpack page.mht --program mht.jq --out ./page

NOTES
  - The parsing program is a jq filter; `$text` holds the archive bytes
  - Set RUST_LOG=debug for extraction diagnostics on stderr"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Print a JSON summary of the archive's parts",
        after_help = r#"EXAMPLES
  $ unmht inspect page.mht --program mht.jq
  $ unmht inspect page.mht --program mht.jq | jq '.parts[] | .mediaType'"#
    )]
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, help = "Pretty-print the JSON summary")]
        pretty: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Write each part's content to a directory",
        after_help = r#"EXAMPLES
  $ unmht unpack page.mht --program mht.jq --out ./page

NOTES
  - Parts are written as DIR/part-000, DIR/part-001, ... in archive order
  - DIR is created if it does not exist"#
    )]
    Unpack {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(
            long,
            value_name = "DIR",
            help = "Output directory",
            value_hint = ValueHint::DirPath
        )]
        out: PathBuf,
        #[arg(long, help = "Pretty-print the JSON summary")]
        pretty: bool,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    #[arg(help = "Archive file", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    #[arg(
        long,
        value_name = "PATH",
        help = "Parsing program (jq filter file)",
        value_hint = ValueHint::FilePath
    )]
    program: PathBuf,
    #[arg(long, help = "Resolve cross-part references through content ids")]
    cid: bool,
}

impl SourceArgs {
    fn extract(&self) -> Result<Document, Error> {
        let text = read_input(&self.file, "failed to read archive")?;
        let program = read_input(&self.program, "failed to read parsing program")?;
        let program = String::from_utf8(program).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("parsing program is not valid UTF-8")
                .with_path(&self.program)
                .with_source(err)
        })?;
        debug!(
            file = %self.file.display(),
            bytes = text.len(),
            cid = self.cid,
            "extracting archive"
        );
        extract(&text, &program, ReferenceMode::from(self.cid)).map_err(|err| {
            if err.path().is_some() {
                err
            } else {
                err.with_path(&self.file)
            }
        })
    }
}

fn read_input(path: &Path, message: &str) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(message)
            .with_path(path)
            .with_source(err)
    })
}

fn unpack_parts(document: &Document, out: &Path) -> Result<(), Error> {
    fs::create_dir_all(out).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to create output directory")
            .with_path(out)
            .with_source(err)
    })?;
    for (index, part) in document.parts().iter().enumerate() {
        let path = out.join(part_file_name(index));
        fs::write(&path, part.content()).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write part")
                .with_path(&path)
                .with_index(index as u32)
                .with_source(err)
        })?;
    }
    Ok(())
}

fn emit_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), Error> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode summary")
            .with_source(err)
    })?;
    println!("{json}");
    Ok(())
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Collaborator => "parsing program failed".to_string(),
        ErrorKind::Shape => "malformed result tree".to_string(),
        ErrorKind::Codec => "codec failure".to_string(),
        ErrorKind::Integrity => "inconsistent result tree".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(index) = err.index() {
        inner.insert("part".to_string(), json!(index));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(field) = err.field() {
        lines.push(format!("field: {field}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(index) = err.index() {
        lines.push(format!("part: {index}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let mut lines = rendered.lines().map(str::trim).skip_while(|line| line.is_empty());
    let Some(first) = lines.next() else {
        return "invalid arguments".to_string();
    };
    let summary = first.strip_prefix("error:").unwrap_or(first).trim();
    if !summary.ends_with(':') {
        return summary.to_string();
    }
    // Lists such as missing required arguments follow on their own lines.
    let items: Vec<&str> = lines.take_while(|line| !line.is_empty()).collect();
    if items.is_empty() {
        summary.trim_end_matches(':').to_string()
    } else {
        format!("{} {}", summary, items.join(", "))
    }
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let missing_required = rendered.contains("required arguments were not provided")
        || rendered.contains("required argument was not provided");
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `unmht --help`.".to_string();
    };
    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "unmht") else {
        return "Try `unmht --help`.".to_string();
    };
    let Some(command) = tokens
        .get(pos + 1)
        .filter(|t| !t.starts_with('-') && !t.starts_with('<') && !t.starts_with('['))
    else {
        return "Try `unmht --help`.".to_string();
    };

    if missing_required && clap_error_summary(err).contains("--program") {
        return format!(
            "Pass a parsing program, for example: `unmht {command} page.mht --program programs/mht.jq`."
        );
    }
    format!("Try `unmht {command} --help`.")
}
