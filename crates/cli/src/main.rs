// papergrid CLI - headless extraction sheet operations

mod corpus;
mod exit_codes;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use papergrid_ai::ChatClient;
use papergrid_config::{AiConfigStatus, Diagnostics, ResolvedAiConfig, Settings};
use papergrid_engine::export::sheet_to_rows;
use papergrid_engine::{
    Column, ColumnId, ColumnPreset, ColumnType, ExtractionEngine, GridError, RowId, RunReport,
    Sheet, SheetStore, VersionId,
};
use papergrid_store::SqliteStore;

use corpus::DirCorpus;
use exit_codes::{
    EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_AI_SERVICE, EXIT_CORPUS, EXIT_ERROR,
    EXIT_EXTRACT_BUSY, EXIT_EXTRACT_PARTIAL, EXIT_NOT_FOUND, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "pgrid")]
#[command(about = "AI-assisted extraction sheets over a research paper corpus")]
#[command(version)]
struct Cli {
    /// Sheet store path (defaults to settings, then the platform data dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new sheet for a document collection
    Init {
        /// Sheet name
        name: String,

        /// Collection the sheet draws documents from
        #[arg(long)]
        collection: String,

        /// Start from a built-in column preset
        #[arg(long)]
        preset: Option<String>,
    },

    /// List sheets in a collection
    Ls {
        #[arg(long)]
        collection: String,
    },

    /// Add a document to a sheet (one Pending row)
    Add {
        sheet: String,
        document_id: String,

        /// Display title (defaults to the document id)
        #[arg(long)]
        title: Option<String>,
    },

    /// Remove a document's row from a sheet
    Rm {
        sheet: String,
        document_id: String,
    },

    /// Run AI extraction over rows
    Extract {
        sheet: String,

        /// Restrict the run to these document ids (repeatable)
        #[arg(long = "rows", value_name = "DOCUMENT_ID")]
        rows: Vec<String>,

        /// Re-extract rows that are already Completed
        #[arg(long)]
        force: bool,

        /// Corpus directory of <document_id>.txt files
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Manage columns
    Column {
        #[command(subcommand)]
        action: ColumnAction,
    },

    /// Export the visible grid as a delimited table
    Export {
        sheet: String,

        /// Field delimiter (single ASCII character)
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Export a saved version instead of the live grid
        #[arg(long)]
        version: Option<String>,
    },

    /// Manage saved versions
    Versions {
        sheet: String,

        #[command(subcommand)]
        action: VersionAction,
    },

    /// Print AI configuration diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum ColumnAction {
    /// Add a column to a sheet
    Add {
        sheet: String,
        name: String,

        /// Extraction instruction for the AI
        #[arg(long)]
        prompt: String,

        /// Column type: text, number, boolean, single-select, multi-select
        #[arg(long = "type", default_value = "text")]
        column_type: String,

        /// Allowed option (repeatable; required for select types)
        #[arg(long = "option", value_name = "LABEL")]
        options: Vec<String>,
    },

    /// Remove a column and its cells
    Rm { sheet: String, column: String },

    /// Re-run extraction for one column across every row
    Run {
        sheet: String,
        column: String,

        /// Corpus directory of <document_id>.txt files
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum VersionAction {
    /// List saved versions
    List,

    /// Snapshot the live columns and rows
    Save {
        #[arg(long)]
        name: String,
    },

    /// Print a saved version's grid (the live sheet is untouched)
    Preview { version: String },

    /// Print the live grid
    Live,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            name,
            collection,
            preset,
        } => cmd_init(cli.store, name, collection, preset),
        Commands::Ls { collection } => cmd_ls(cli.store, collection),
        Commands::Add {
            sheet,
            document_id,
            title,
        } => cmd_add(cli.store, sheet, document_id, title),
        Commands::Rm { sheet, document_id } => cmd_rm(cli.store, sheet, document_id),
        Commands::Extract {
            sheet,
            rows,
            force,
            corpus,
        } => cmd_extract(cli.store, sheet, rows, force, corpus),
        Commands::Column { action } => match action {
            ColumnAction::Add {
                sheet,
                name,
                prompt,
                column_type,
                options,
            } => cmd_column_add(cli.store, sheet, name, prompt, column_type, options),
            ColumnAction::Rm { sheet, column } => cmd_column_rm(cli.store, sheet, column),
            ColumnAction::Run {
                sheet,
                column,
                corpus,
            } => cmd_column_run(cli.store, sheet, column, corpus),
        },
        Commands::Export {
            sheet,
            delimiter,
            output,
            version,
        } => cmd_export(cli.store, sheet, delimiter, output, version),
        Commands::Versions { sheet, action } => cmd_versions(cli.store, sheet, action),
        Commands::Doctor => cmd_doctor(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_USAGE,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_NOT_FOUND,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_ERROR,
            message: msg.into(),
            hint: None,
        }
    }

    /// Map an engine error to its exit code.
    pub fn grid(err: GridError) -> Self {
        let code = match &err {
            GridError::Store(_) => EXIT_STORE,
            GridError::UnknownColumn(_)
            | GridError::UnknownVersion(_)
            | GridError::UnknownRow(_) => EXIT_NOT_FOUND,
            GridError::DocumentUnavailable { .. } => EXIT_CORPUS,
            GridError::Service(_) | GridError::Parse(_) => EXIT_AI_SERVICE,
            GridError::Busy => EXIT_EXTRACT_BUSY,
            GridError::ReadOnly => EXIT_ERROR,
        };
        Self {
            code,
            message: err.to_string(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared plumbing
// ============================================================================

fn open_store(store_flag: Option<PathBuf>) -> Result<SqliteStore, CliError> {
    let path = match store_flag {
        Some(p) => p,
        None => Settings::load().effective_store_path(),
    };
    SqliteStore::open(&path).map_err(CliError::grid)
}

fn load_sheet(store: &SqliteStore, sheet_id: &str) -> Result<Sheet, CliError> {
    store
        .load_sheet(sheet_id)
        .map_err(|_| CliError::not_found(format!("no sheet with id '{}'", sheet_id)))
}

fn corpus_dir(flag: Option<PathBuf>) -> Result<DirCorpus, CliError> {
    let dir = flag.or_else(|| Settings::load().corpus_dir).ok_or_else(|| {
        CliError {
            code: EXIT_CORPUS,
            message: "no corpus directory configured".to_string(),
            hint: Some("pass --corpus or set corpus.dir in settings.json".to_string()),
        }
    })?;
    if !dir.is_dir() {
        return Err(CliError {
            code: EXIT_CORPUS,
            message: format!("corpus directory '{}' does not exist", dir.display()),
            hint: None,
        });
    }
    Ok(DirCorpus::new(&dir))
}

fn resolve_ai_client() -> Result<ChatClient, CliError> {
    let config = ResolvedAiConfig::load();
    match config.status {
        AiConfigStatus::Disabled => Err(CliError {
            code: EXIT_AI_DISABLED,
            message: "AI is disabled".to_string(),
            hint: Some("set ai.provider to \"openai\" or \"local\" in settings.json".to_string()),
        }),
        AiConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: config
                .blocking_reason
                .clone()
                .unwrap_or_else(|| "API key missing".to_string()),
            hint: None,
        }),
        AiConfigStatus::Ready => ChatClient::from_config(&config).map_err(|e| CliError {
            code: EXIT_AI_SERVICE,
            message: e.to_string(),
            hint: None,
        }),
    }
}

/// Find a column by name first, then by id.
fn find_column(sheet: &Sheet, needle: &str) -> Result<ColumnId, CliError> {
    sheet
        .columns
        .iter()
        .find(|c| c.name == needle)
        .or_else(|| sheet.columns.iter().find(|c| c.id.as_str() == needle))
        .map(|c| c.id.clone())
        .ok_or_else(|| CliError::not_found(format!("no column named '{}'", needle)))
}

/// Map document ids to row ids, rejecting unknown documents up front.
fn find_rows(sheet: &Sheet, document_ids: &[String]) -> Result<Vec<RowId>, CliError> {
    document_ids
        .iter()
        .map(|doc| {
            sheet
                .rows
                .iter()
                .find(|r| &r.document_id == doc)
                .map(|r| r.id.clone())
                .ok_or_else(|| {
                    CliError::not_found(format!("no row for document '{}'", doc))
                })
        })
        .collect()
}

fn print_report(report: &RunReport) -> Result<(), CliError> {
    println!(
        "completed: {}  failed: {}  skipped: {}",
        report.completed, report.failed, report.skipped
    );
    for err in &report.persist_errors {
        eprintln!("warning: persist failed for {}", err);
    }
    if report.failed > 0 {
        return Err(CliError {
            code: EXIT_EXTRACT_PARTIAL,
            message: format!("{} row(s) ended in Error", report.failed),
            hint: Some("re-run with --rows to retry failed documents".to_string()),
        });
    }
    Ok(())
}

fn write_table(
    rows: &[Vec<String>],
    delimiter: char,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    if !delimiter.is_ascii() {
        return Err(CliError::usage("delimiter must be a single ASCII character"));
    }
    let mut builder = csv::WriterBuilder::new();
    builder.delimiter(delimiter as u8);

    let write = |w: &mut dyn Write| -> Result<(), CliError> {
        let mut writer = builder.from_writer(vec![]);
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| CliError::io(e.to_string()))?;
        }
        let data = writer
            .into_inner()
            .map_err(|e| CliError::io(e.to_string()))?;
        w.write_all(&data).map_err(|e| CliError::io(e.to_string()))
    };

    match output {
        Some(path) => {
            let mut file =
                std::fs::File::create(&path).map_err(|e| CliError::io(e.to_string()))?;
            write(&mut file)
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            write(&mut handle)
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_init(
    store_flag: Option<PathBuf>,
    name: String,
    collection: String,
    preset: Option<String>,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = Sheet::new(&name, &collection);

    if let Some(preset_name) = preset {
        let preset = ColumnPreset::by_name(&preset_name).ok_or_else(|| {
            let names: Vec<String> = ColumnPreset::builtin()
                .into_iter()
                .map(|p| p.name)
                .collect();
            CliError::usage(format!("unknown preset '{}'", preset_name))
                .with_hint(format!("available presets: {}", names.join(", ")))
        })?;
        sheet.apply_preset(&preset);
    }

    store.create_sheet(&sheet).map_err(CliError::grid)?;
    println!("{}", sheet.id);
    Ok(())
}

fn cmd_ls(store_flag: Option<PathBuf>, collection: String) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let sheets = store.list_sheets(&collection).map_err(CliError::grid)?;
    for sheet in sheets {
        println!(
            "{}\t{}\t{} columns\t{} rows",
            sheet.id,
            sheet.name,
            sheet.columns.len(),
            sheet.rows.len()
        );
    }
    Ok(())
}

fn cmd_add(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    document_id: String,
    title: Option<String>,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;
    let title = title.unwrap_or_else(|| document_id.clone());
    sheet.add_document(&document_id, &title);
    store.update_sheet(&sheet).map_err(CliError::grid)?;
    Ok(())
}

fn cmd_rm(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    document_id: String,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;
    if sheet.remove_document(&document_id).is_none() {
        return Err(CliError::not_found(format!(
            "no row for document '{}'",
            document_id
        )));
    }
    store
        .delete_row(&sheet.id, &document_id)
        .map_err(CliError::grid)?;
    Ok(())
}

fn cmd_extract(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    rows: Vec<String>,
    force: bool,
    corpus: Option<PathBuf>,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;
    if sheet.columns.is_empty() {
        return Err(
            CliError::usage("sheet has no columns").with_hint("add one with `pgrid column add`")
        );
    }

    let corpus = corpus_dir(corpus)?;
    let client = resolve_ai_client()?;
    let mut engine = ExtractionEngine::new(&corpus, &client, &store);

    let targets = if rows.is_empty() {
        None
    } else {
        Some(find_rows(&sheet, &rows)?)
    };
    let report = engine
        .run_rows(&mut sheet, targets.as_deref(), force)
        .map_err(CliError::grid)?;
    print_report(&report)
}

fn cmd_column_add(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    name: String,
    prompt: String,
    column_type: String,
    options: Vec<String>,
) -> Result<(), CliError> {
    let column_type = match column_type.as_str() {
        "text" => ColumnType::Text,
        "number" => ColumnType::Number,
        "boolean" => ColumnType::Boolean,
        "single-select" => ColumnType::SingleSelect,
        "multi-select" => ColumnType::MultiSelect,
        other => {
            return Err(CliError::usage(format!("unknown column type '{}'", other)).with_hint(
                "valid types: text, number, boolean, single-select, multi-select",
            ))
        }
    };

    let mut column = Column::new(&name, column_type, &prompt);
    column.options = options;
    column.validate().map_err(CliError::usage)?;

    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;
    let id = column.id.clone();
    sheet.add_column(column);
    store.update_sheet(&sheet).map_err(CliError::grid)?;
    println!("{}", id);
    Ok(())
}

fn cmd_column_rm(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    column: String,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;
    let column_id = find_column(&sheet, &column)?;
    sheet.remove_column(&column_id);
    store.update_sheet(&sheet).map_err(CliError::grid)?;
    Ok(())
}

fn cmd_column_run(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    column: String,
    corpus: Option<PathBuf>,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;
    let column_id = find_column(&sheet, &column)?;

    let corpus = corpus_dir(corpus)?;
    let client = resolve_ai_client()?;
    let mut engine = ExtractionEngine::new(&corpus, &client, &store);

    let report = engine
        .run_column(&mut sheet, &column_id)
        .map_err(CliError::grid)?;
    print_report(&report)
}

fn cmd_export(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    delimiter: char,
    output: Option<PathBuf>,
    version: Option<String>,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;

    if let Some(version_id) = version {
        sheet
            .enter_preview(&VersionId(version_id))
            .map_err(CliError::grid)?;
    }

    let rows = sheet_to_rows(&sheet);
    write_table(&rows, delimiter, output)
}

fn cmd_versions(
    store_flag: Option<PathBuf>,
    sheet_id: String,
    action: VersionAction,
) -> Result<(), CliError> {
    let store = open_store(store_flag)?;
    let mut sheet = load_sheet(&store, &sheet_id)?;

    match action {
        VersionAction::List => {
            for version in &sheet.versions {
                println!(
                    "{}\t{}\t{}\t{} rows",
                    version.id,
                    version.name,
                    version.created_at.to_rfc3339(),
                    version.rows.len()
                );
            }
            Ok(())
        }
        VersionAction::Save { name } => {
            let version = sheet.save_version(&name).clone();
            store
                .append_version(&sheet.id, &version)
                .map_err(CliError::grid)?;
            println!("{}", version.id);
            Ok(())
        }
        VersionAction::Preview { version } => {
            sheet
                .enter_preview(&VersionId(version))
                .map_err(CliError::grid)?;
            let rows = sheet_to_rows(&sheet);
            write_table(&rows, '\t', None)
        }
        VersionAction::Live => {
            sheet.exit_preview();
            let rows = sheet_to_rows(&sheet);
            write_table(&rows, '\t', None)
        }
    }
}

fn cmd_doctor() -> Result<(), CliError> {
    let settings = Settings::load();
    let config = ResolvedAiConfig::load();
    let diagnostics = Diagnostics::from_resolved(&config);

    print!("{}", diagnostics);
    println!("Store path:  {}", settings.effective_store_path().display());
    match &settings.corpus_dir {
        Some(dir) => println!("Corpus dir:  {}", dir.display()),
        None => println!("Corpus dir:  (not set)"),
    }

    match config.status {
        AiConfigStatus::Ready => Ok(()),
        AiConfigStatus::Disabled => Err(CliError {
            code: EXIT_AI_DISABLED,
            message: String::new(),
            hint: None,
        }),
        AiConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: String::new(),
            hint: None,
        }),
    }
}
