use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::{fs, path::PathBuf};
use structopt::StructOpt;
use syn::visit::Visit;
use syn::ExprMethodCall;
use walkdir::WalkDir;

/// Static check that every call into the tenant-scoped repository trait
/// threads a `TenantId` argument. The trait shape already makes an
/// untenanted call a compile error for anything implementing `Repository`
/// directly, but call sites going through a generic `R: Repository` bound
/// or a trait object can still pass the wrong variable in the tenant
/// position — this catches that class of mistake by checking that the
/// first argument's own tokens mention "tenant".
#[derive(StructOpt, Debug)]
#[structopt(name = "tenant-lint")]
struct Cli {
    /// Root directory to scan
    #[structopt(parse(from_os_str), default_value = ".")]
    root: PathBuf,
    /// Emit a JSON report to this path
    #[structopt(long, parse(from_os_str))]
    json: Option<PathBuf>,
    /// Exit non-zero if any call site is flagged
    #[structopt(long)]
    deny: bool,
}

const REPOSITORY_METHODS: &[&str] = &["find", "list", "insert", "update", "delete"];
const IGNORE_TAG: &str = "tenant-lint:ignore";

#[derive(Debug, Serialize)]
struct Finding {
    file: String,
    line: usize,
    method: String,
}

#[derive(Debug, Serialize)]
struct Report {
    scanned_files: usize,
    call_sites_checked: usize,
    findings: Vec<Finding>,
}

struct CallCollector<'a> {
    source: &'a str,
    findings: Vec<Finding>,
    checked: usize,
    file: String,
}

impl<'a> Visit<'a> for CallCollector<'a> {
    fn visit_expr_method_call(&mut self, call: &'a ExprMethodCall) {
        let method = call.method.to_string();
        if REPOSITORY_METHODS.contains(&method.as_str()) {
            self.checked += 1;
            let first_arg_mentions_tenant = call
                .args
                .first()
                .map(|arg| quote::quote!(#arg).to_string().to_lowercase().contains("tenant"))
                .unwrap_or(false);

            let line = call.method.span().start().line;
            let line_text = self.source.lines().nth(line.saturating_sub(1)).unwrap_or("");
            let ignored = line_text.contains(IGNORE_TAG);

            if !first_arg_mentions_tenant && !ignored {
                self.findings.push(Finding { file: self.file.clone(), line, method: method.clone() });
            }
        }
        syn::visit::visit_expr_method_call(self, call);
    }
}

fn main() -> Result<()> {
    let cli = Cli::from_args();

    let files: Vec<PathBuf> = WalkDir::new(&cli.root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map(|ext| ext == "rs").unwrap_or(false))
        .filter(|path| {
            let text = path.to_string_lossy();
            !text.contains("/target/") && !text.contains("/examples/")
        })
        .collect();

    let results: Vec<(usize, Vec<Finding>)> = files
        .par_iter()
        .map(|path| {
            let source = fs::read_to_string(path).unwrap_or_default();
            let syntax: syn::File = match syn::parse_file(&source) {
                Ok(file) => file,
                Err(_) => return (0, Vec::new()),
            };
            let mut collector = CallCollector {
                source: &source,
                findings: Vec::new(),
                checked: 0,
                file: path.to_string_lossy().to_string(),
            };
            collector.visit_file(&syntax);
            (collector.checked, collector.findings)
        })
        .collect();

    let call_sites_checked = results.iter().map(|(checked, _)| checked).sum();
    let findings: Vec<Finding> = results.into_iter().flat_map(|(_, findings)| findings).collect();

    let report = Report { scanned_files: files.len(), call_sites_checked, findings };

    println!(
        "tenant-lint: scanned {} files, checked {} repository call sites, {} flagged",
        report.scanned_files,
        report.call_sites_checked,
        report.findings.len()
    );
    for finding in &report.findings {
        println!("  {}:{} — `.{}(...)` does not appear to pass a tenant id as its first argument", finding.file, finding.line, finding.method);
    }

    if let Some(json_path) = &cli.json {
        fs::write(json_path, serde_json::to_string_pretty(&report)?)?;
    }

    if cli.deny && !report.findings.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
