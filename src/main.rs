// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;

mod aggregate;
mod config;
mod diagnostics;
mod function;
mod instruction;
mod platform;
mod populate;
mod recursion;
mod worst_case;

use config::RunConfig;
use diagnostics::Diagnostics;
use platform::avr::Avr;
use platform::msp430::Msp430;
use platform::Platform;

/// Worst-case stack-depth analysis for MSP430/AVR firmware disassembly.
#[derive(Debug, Parser)]
#[clap(max_term_width = 80)]
struct Args {
    /// Target board. Selects both the architecture model and the
    /// disassembler binary invoked against the input file.
    platform: String,

    /// Path to the compiled binary. Defaults to `./build/<platform>/main.exe`.
    binary_path: Option<PathBuf>,

    /// Repair call-graph cycles by dropping the back-edge instead of
    /// aborting the run.
    #[clap(short = 'r')]
    repair_recursion: bool,

    /// Print the call graph.
    #[clap(short = 'p')]
    print_graph: bool,

    /// Print the call graph in depth (implies -p).
    #[clap(short = 'v')]
    verbose_graph: bool,

    /// Print per-function byte sizes, sorted by name.
    #[clap(short = 's')]
    print_sizes: bool,

    /// Override the critical-section-begin function name.
    #[clap(short = 'b')]
    critical_start: Option<String>,

    /// Override the critical-section-end function name.
    #[clap(short = 'e')]
    critical_stop: Option<String>,

    /// Dump the structured analysis result as JSON to this path.
    #[clap(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let is_avr = platform::avr::BOARDS.contains(&args.platform.as_str());
    let is_msp430 = platform::msp430::BOARDS.contains(&args.platform.as_str());
    if !is_avr && !is_msp430 {
        bail!(
            "unknown platform {:?}; expected one of {:?} (msp430) or {:?} (avr)",
            args.platform,
            platform::msp430::BOARDS,
            platform::avr::BOARDS,
        );
    }

    let binary_path = args
        .binary_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("./build/{}/main.exe", args.platform)));
    if !binary_path.exists() {
        bail!("input file {} does not exist", binary_path.display());
    }

    let objdump = if is_avr { "avr-objdump" } else { "msp430-objdump" };
    let output = Command::new(objdump)
        .arg("-d")
        .arg(&binary_path)
        .output()
        .with_context(|| format!("could not run {objdump}; is it on PATH?"))?;
    if !output.status.success() {
        bail!("{objdump} exited with {}", output.status);
    }
    let text = String::from_utf8(output.stdout).context("disassembler output was not valid UTF-8")?;

    let mut config = RunConfig::default();
    config.recursion_repair = args.repair_recursion;
    if let Some(name) = args.critical_start {
        config.critical_start = name;
    }
    if let Some(name) = args.critical_stop {
        config.critical_stop = name;
    }

    let mut diags = Diagnostics::new();
    let mut program = function::group_functions(text.lines(), &mut diags);

    let mut platform: Box<dyn Platform> = if is_avr { Box::new(Avr::new()) } else { Box::new(Msp430::new()) };
    populate::populate(&mut program, platform.as_mut(), &config, &mut diags);

    if recursion::check_and_repair(&mut program, config.recursion_repair, &mut diags).is_err() {
        print_diagnostics(&diags);
        bail!("cycle found in the call graph; rerun with -r to repair it");
    }

    // Dependency counts (and thus the task list, which excludes anything
    // with an incoming call) must reflect the call graph *after* recursion
    // repair has dropped back-edges, not before.
    populate::compute_dep_counts(&mut program);

    let worst = worst_case::compute_all(&program);
    for (f, w) in program.functions.iter_mut().zip(worst.iter()) {
        f.worst_case_stack = w.0;
    }
    let report = aggregate::aggregate(&program, platform.as_ref(), &worst, &config, &mut diags);

    print_diagnostics(&diags);

    if args.print_sizes {
        print_sizes(&program);
    }
    if args.print_graph || args.verbose_graph {
        print_graph(&program, args.verbose_graph);
    }

    println!();
    println!("{}", "summary".bold());
    println!("  simple total:            {}", report.simple_total);
    println!("  context-sensitive total: {}", report.context_sensitive_total);
    println!("  interrupt overhead:      {}", report.int_overhead);
    println!("  interrupts: {:?}", report.interrupts);
    println!("  signals:    {:?}", report.signals);
    println!("  tasks:      {:?}", report.tasks);

    let header_text = aggregate::render_header(&report.header);
    fs::write("stack.h", &header_text).context("could not write stack.h")?;

    if let Some(json_path) = args.json {
        let dump = JsonReport {
            simple_total: report.simple_total,
            context_sensitive_total: report.context_sensitive_total,
            int_overhead: report.int_overhead,
            interrupts: report.interrupts.clone(),
            signals: report.signals.clone(),
            tasks: report.tasks.clone(),
        };
        fs::write(&json_path, serde_json::to_string_pretty(&dump)?)
            .with_context(|| format!("could not write {}", json_path.display()))?;
    }

    if diags.has_errors() {
        bail!("analysis completed with errors");
    }
    Ok(())
}

fn print_diagnostics(diags: &Diagnostics) {
    for d in diags.iter() {
        println!("{d}");
    }
}

fn print_sizes(program: &function::Program) {
    let mut names: Vec<&function::Function> = program.functions.iter().collect();
    names.sort_by(|a, b| a.name.cmp(&b.name));
    let mut total: u32 = 0;
    for f in &names {
        let size = f.address_range.1 - f.address_range.0;
        total += size;
        println!("{:<40} {size}", f.name);
    }
    println!("{:<40} {total}", "total".bold());
}

fn print_graph(program: &function::Program, verbose: bool) {
    for f in &program.functions {
        println!("{}", f.name.cyan());
        if verbose {
            for (dep, masked) in f.deps.iter().zip(f.deps_masked.iter()) {
                let marker = if *masked { "masked" } else { "unmasked" };
                println!("  -> {dep} ({marker})");
            }
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct JsonReport {
    simple_total: u32,
    context_sensitive_total: u32,
    int_overhead: u32,
    interrupts: Vec<String>,
    signals: Vec<String>,
    tasks: Vec<String>,
}
