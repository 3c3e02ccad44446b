//! cellquery - run a Rhai query expression against spreadsheet ranges.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cellquery_core::storage::{load_styles, parse_csv_field, read_csv, to_csv};
use cellquery_core::{
    Analyzer, Config, EmitOptions, EvaluationUnit, FailureKind, ReservedNames, Workbook,
};
use cellquery_engine::engine::{Dynamic, format_grid};
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: cellquery [OPTIONS] <EXPRESSION>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <EXPRESSION>              Rhai expression or closure, e.g. 'tbl.where(|r| r.age > 30)'");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -t, --table <NAME=FILE>   Bind a CSV file with a header row (can be repeated)");
    eprintln!("  -g, --grid <NAME=FILE>    Bind a CSV file without headers (can be repeated)");
    eprintln!("  -v, --value <NAME=VALUE>  Bind a single value (can be repeated)");
    eprintln!("  -s, --styles <FILE>       Load cell formatting from a TOML file");
    eprintln!("  -n, --name <NAME>         Name for the evaluation unit");
    eprintln!("  --config <FILE>           Config file (default: <config dir>/cellquery/config.toml)");
    eprintln!("  --emit                    Print the generated unit instead of running it");
    eprintln!("  --csv                     Print the result as CSV");
    eprintln!("  --verbose                 Log to stderr (filtered by RUST_LOG)");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default)]
struct Options {
    expression: Option<String>,
    tables: Vec<(String, PathBuf)>,
    grids: Vec<(String, PathBuf)>,
    values: Vec<(String, String)>,
    styles: Vec<PathBuf>,
    name: Option<String>,
    config: Option<PathBuf>,
    emit: bool,
    csv: bool,
    verbose: bool,
}

fn split_binding(flag: &str, arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => bail!("{} expects NAME=VALUE, got '{}'", flag, arg),
    }
}

fn flag_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a String> {
    *i += 1;
    args.get(*i)
        .with_context(|| format!("{} requires a value", flag))
}

/// Returns `None` when help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => return Ok(None),
            "-t" | "--table" => {
                let (name, path) = split_binding(flag, flag_value(args, &mut i, flag)?)?;
                options.tables.push((name, PathBuf::from(path)));
            }
            "-g" | "--grid" => {
                let (name, path) = split_binding(flag, flag_value(args, &mut i, flag)?)?;
                options.grids.push((name, PathBuf::from(path)));
            }
            "-v" | "--value" => {
                let binding = split_binding(flag, flag_value(args, &mut i, flag)?)?;
                options.values.push(binding);
            }
            "-s" | "--styles" => options.styles.push(PathBuf::from(flag_value(args, &mut i, flag)?)),
            "-n" | "--name" => options.name = Some(flag_value(args, &mut i, flag)?.clone()),
            "--config" => options.config = Some(PathBuf::from(flag_value(args, &mut i, flag)?)),
            "--emit" => options.emit = true,
            "--csv" => options.csv = true,
            "--verbose" => options.verbose = true,
            arg if arg.starts_with('-') && arg.len() > 1 => bail!("Unknown option: {}", arg),
            arg => {
                if options.expression.is_some() {
                    bail!("Unexpected argument: {}", arg);
                }
                options.expression = Some(arg.to_string());
            }
        }
        i += 1;
    }
    Ok(Some(options))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Ok(Config::load(path)?);
    }
    let default = ProjectDirs::from("", "", "cellquery")
        .map(|proj| proj.config_dir().join("config.toml"))
        .filter(|p| p.exists());
    match default {
        Some(path) => Ok(Config::load(&path)?),
        None => Ok(Config::default()),
    }
}

/// Load every bound input into `book`, returning the argument for each name.
fn bind_inputs(options: &Options, book: &Workbook) -> Result<HashMap<String, Dynamic>> {
    let mut bindings = HashMap::new();

    let sheets = options
        .tables
        .iter()
        .map(|(name, path)| (name, path, true))
        .chain(options.grids.iter().map(|(name, path)| (name, path, false)));
    for (name, path, headers) in sheets {
        let grid = read_csv(path).with_context(|| format!("loading {}", path.display()))?;
        book.add_sheet(name.clone(), grid);
        let handle = book
            .used_range(name, headers)
            .with_context(|| format!("sheet '{}' vanished after loading", name))?;
        bindings.insert(name.clone(), Dynamic::from(handle));
    }

    for (name, text) in &options.values {
        bindings.insert(name.clone(), parse_csv_field(text).to_dynamic());
    }

    for path in &options.styles {
        let styles = load_styles(path).with_context(|| format!("loading {}", path.display()))?;
        let applied = book.apply_styles(&styles);
        tracing::debug!(path = %path.display(), applied, "applied styles");
    }

    Ok(bindings)
}

fn run(options: &Options) -> Result<()> {
    let Some(expression) = options.expression.as_deref() else {
        bail!("missing expression");
    };
    let config = load_config(options.config.as_deref())?;

    let book = Workbook::new();
    let bindings = bind_inputs(options, &book)?;

    let analyzer = Analyzer::new(config.max_expression_bytes);
    let analysis = if config.restrict_free_variables {
        analyzer.analyze_in_scope(expression, |name| bindings.contains_key(name))
    } else {
        analyzer.analyze(expression)
    }
    .map_err(cellquery_core::Error::from)?;

    let emit_options = EmitOptions {
        preferred_name: options.name.clone(),
        reserved: ReservedNames::with_extra(&config.reserved_names),
    };
    let unit = EvaluationUnit::from_analysis(analysis, &emit_options, book.bridges())?;

    if options.emit {
        print!("{}", unit.source());
        return Ok(());
    }

    let grid = unit.invoke_with(|name| bindings.get(name).cloned())?;
    if options.csv {
        print!("{}", to_csv(&grid));
    } else {
        let text = format_grid(&grid);
        if !text.is_empty() {
            println!("{}", text);
        }
    }
    Ok(())
}

fn failure_kind(err: &anyhow::Error) -> FailureKind {
    err.downcast_ref::<cellquery_core::Error>()
        .map(cellquery_core::Error::kind)
        .unwrap_or(FailureKind::Host)
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if options.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .init();
    }

    if let Err(e) = run(&options) {
        eprintln!("error[{}]: {:#}", failure_kind(&e), e);
        std::process::exit(1);
    }
}
