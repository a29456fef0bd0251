//! bindery - bind a folder of Markdown into an EPUB

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use bindery::{Conversion, ConvertOptions, convert};

#[derive(Parser)]
#[command(name = "bindery")]
#[command(version, about = "Bind a folder of Markdown, HTML and images into an EPUB", long_about = None)]
#[command(after_help = "EXAMPLES:
    bindery notes/ notes.epub                     Convert a directory
    bindery docs/ docs.epub --css style.css       Link a stylesheet from Markdown pages
    bindery docs/ docs.epub --exclude target -v   Skip build output, log each file")]
struct Cli {
    /// Source directory
    #[arg(value_name = "SRC")]
    source: PathBuf,

    /// Output EPUB file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Book title (defaults to the source directory name)
    #[arg(long)]
    title: Option<String>,

    /// Book author
    #[arg(long)]
    author: Option<String>,

    /// Publication date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    /// Encoding of Markdown and HTML sources
    #[arg(long, default_value = "utf8")]
    encoding: String,

    /// Copy SVG files as they are instead of rasterizing them to PNG
    #[arg(long)]
    no_svg: bool,

    /// Stylesheet linked from every Markdown page, relative to SRC
    #[arg(long, value_name = "HREF")]
    css: Option<String>,

    /// Directory name to skip at any depth (repeatable; replaces the default `.git`)
    #[arg(long, value_name = "NAME")]
    exclude: Vec<String>,

    /// Keep the rasterized PNGs next to their SVG sources
    #[arg(long)]
    keep_temp: bool,

    /// Print a JSON report of the conversion on stdout
    #[arg(long)]
    json: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> ConvertOptions {
        let mut options = ConvertOptions::default()
            .with_encoding(&self.encoding)
            .with_convert_svg(!self.no_svg)
            .with_return_temp_files(true);
        if let Some(title) = &self.title {
            options = options.with_title(title);
        }
        if let Some(author) = &self.author {
            options = options.with_author(author);
        }
        if let Some(date) = &self.date {
            options = options.with_date(date);
        }
        if let Some(css) = &self.css {
            options = options.with_stylesheet(css);
        }
        if !self.exclude.is_empty() {
            options = options.with_excluded_dirs(&self.exclude);
        }
        options
    }
}

#[derive(Serialize)]
struct Report<'a> {
    output: &'a Path,
    title: &'a str,
    pages: Vec<PageEntry<'a>>,
    images: usize,
    others: usize,
    temp_files: Vec<&'a Path>,
}

#[derive(Serialize)]
struct PageEntry<'a> {
    source: &'a str,
    dest: &'a str,
    links: Vec<String>,
}

impl<'a> Report<'a> {
    fn new(output: &'a Path, conversion: &'a Conversion) -> Self {
        let pages = conversion
            .pages
            .iter()
            .map(|page| PageEntry {
                source: page.source.as_str(),
                dest: page.dest.as_str(),
                links: page
                    .links
                    .iter()
                    .map(|link| match &link.fragment {
                        Some(fragment) => format!("{}#{fragment}", link.path),
                        None => link.path.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            output,
            title: &conversion.epub.metadata.title,
            pages,
            images: conversion.images,
            others: conversion.others,
            temp_files: conversion.temp_files.iter().map(PathBuf::as_path).collect(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.quiet, cli.verbose);

    match run(&cli) {
        Ok(output) => {
            if let Some(output) = output {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn setup_tracing(quiet: bool, verbosity: u8) {
    let default = match (quiet, verbosity) {
        (true, _) => "bindery=warn",
        (false, 0) => "bindery=info",
        (false, 1) => "bindery=debug",
        (false, _) => "bindery=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// Convert and write the package; returns what to print on stdout.
fn run(cli: &Cli) -> Result<Option<String>, String> {
    let mut conversion = convert(&cli.source, &cli.options()).map_err(|e| e.to_string())?;
    let written = conversion.write(&cli.output);

    // Built before cleanup drains the temp file list.
    let json = cli
        .json
        .then(|| serde_json::to_string_pretty(&Report::new(&cli.output, &conversion)));

    // Rasterized files go even when writing failed.
    if !cli.keep_temp
        && let Err(e) = conversion.remove_temp_files()
    {
        if written.is_ok() {
            return Err(e.to_string());
        }
        tracing::warn!("{e}");
    }
    written.map_err(|e| e.to_string())?;

    if let Some(json) = json {
        return json.map(Some).map_err(|e| e.to_string());
    }
    if cli.quiet {
        return Ok(None);
    }
    Ok(Some(format!(
        "{} -> {} ({} pages, {} images, {} other files)",
        cli.source.display(),
        cli.output.display(),
        conversion.pages.len(),
        conversion.images,
        conversion.others
    )))
}
