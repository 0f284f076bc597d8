use arguments::Arguments;
use clap::Parser;
use error::AnalysisError;
use log::{error, info};
use report::Report;
use simple_logger::SimpleLogger;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::thread;

mod arguments;
mod dynvalue;
mod error;
mod handlers;
mod html;
mod intern;
mod lexer;
mod lockgraph;
mod lockset;
mod parser;
mod report;
mod ssa;
mod stack;
mod valuestate;
mod walker;

/// The walker recurses along the deepest analyzable call chain, so it
/// runs on a thread with a large stack.
const WALKER_STACK_BYTES: usize = 256 * 1024 * 1024;

fn main() -> ExitCode {
    let _ = SimpleLogger::new().env().init();
    let arguments = Arguments::parse();

    match run(&arguments) {
        // finding cycles is not an error; only internal failures are
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(arguments: &Arguments) -> Result<(), AnalysisError> {
    let program = ssa::load_program(&arguments.input)?;

    let entries = if arguments.entry.is_empty() {
        program.entries.clone()
    } else {
        let mut entries = Vec::new();
        for name in &arguments.entry {
            entries.push(
                program
                    .lookup_function(name)
                    .ok_or_else(|| AnalysisError::Resolve {
                        message: format!("unknown entry function '{name}'"),
                        line: 0,
                    })?,
            );
        }
        entries
    };
    if entries.is_empty() {
        return Err(AnalysisError::NoEntryPoints);
    }

    let mut result = thread::scope(|scope| {
        let walker = thread::Builder::new()
            .name("walker".to_string())
            .stack_size(WALKER_STACK_BYTES)
            .spawn_scoped(scope, || walker::run_analysis(&program, &entries))
            .map_err(AnalysisError::from)?;

        match walker.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })?;

    info!(
        "analysis interned {} lock classes over {} edges with {} warnings",
        result.intern.len(),
        result.graph.edge_count(),
        result.warnings
    );

    let report = Report::new(&program, &mut result);
    info!("{} lock cycles were identified", report.cycle_count());

    let stdout = std::io::stdout();
    report.write_text(&mut stdout.lock(), arguments.verbose)?;

    if arguments.graph {
        match fs::create_dir_all("output") {
            Ok(()) => fs::write("output/lockgraph.dot", report.render_dot())?,
            Err(err) => eprintln!("Failed to create directory {:?}: {}", "output", err),
        }
    }

    if let Some(dir) = &arguments.html {
        html::write_html(Path::new(dir), &report)?;
    }

    Ok(())
}
