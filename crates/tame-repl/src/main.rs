use std::{
    fs,
    io::{self, IsTerminal, Read},
    process::ExitCode,
};

use anyhow::Result;
use clap::{Arg, Command};
use tame_core::{init_tracing, Dialect};

mod repl;
use repl::{Repl, RewriteOutcome};

fn main() -> Result<ExitCode> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let matches = Command::new("tame-repl")
        .version(tame_core::VERSION)
        .about("Interactive driver for the tame capability-security rewriter")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Rewrite a script file on startup instead of reading the terminal")
                .index(1),
        )
        .arg(
            Arg::new("dialect")
                .long("dialect")
                .value_name("DIALECT")
                .help("Rule chain to apply: strict or compat")
                .default_value("strict"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit diagnostics as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .help("Suppress the rewritten source, printing diagnostics only")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let dialect: Dialect = matches
        .get_one::<String>("dialect")
        .unwrap()
        .parse()
        .map_err(anyhow::Error::msg)?;
    let json = matches.get_flag("json");
    let quiet = matches.get_flag("quiet");
    let input_file = matches.get_one::<String>("file").cloned();

    let mut repl = Repl::new(dialect);

    // Batch modes: an explicit file, or piped stdin.
    if let Some(filename) = input_file {
        let source = fs::read_to_string(&filename)?;
        return Ok(run_batch(&mut repl, &source, json, quiet));
    }
    if !io::stdin().is_terminal() {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        return Ok(run_batch(&mut repl, &source, json, quiet));
    }

    println!("Tame REPL v{}", tame_core::VERSION);
    println!("Dialect: {:?}", dialect);
    println!("Type .help for help, .quit to exit");
    println!();

    run_repl(&mut repl)?;
    Ok(ExitCode::SUCCESS)
}

fn run_batch(repl: &mut Repl, source: &str, json: bool, quiet: bool) -> ExitCode {
    let outcome = repl.rewrite_source(source);
    print_outcome(&outcome, json, quiet);
    if outcome.fatal {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_outcome(outcome: &RewriteOutcome, json: bool, quiet: bool) {
    if let Some(parse_error) = &outcome.parse_error {
        eprintln!("parse error: {parse_error}");
        return;
    }
    if json {
        match serde_json::to_string_pretty(&outcome.messages) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => eprintln!("error rendering diagnostics: {e}"),
        }
    } else {
        for message in &outcome.messages {
            eprintln!("{message}");
        }
    }
    if !quiet {
        if let Some(source) = &outcome.rewritten {
            println!("{source}");
        }
    }
}

fn run_repl(repl: &mut Repl) -> Result<()> {
    use rustyline::{error::ReadlineError, DefaultEditor};

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("tame> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;
                match trimmed {
                    ".quit" | ".exit" => break,
                    ".help" => {
                        println!(".help            show this help");
                        println!(".dialect <name>  switch dialect (strict or compat)");
                        println!(".quit            exit the REPL");
                        println!("anything else is parsed, rewritten, and printed");
                    }
                    _ if trimmed.starts_with(".dialect") => {
                        match trimmed.trim_start_matches(".dialect").trim().parse::<Dialect>() {
                            Ok(dialect) => {
                                repl.set_dialect(dialect);
                                println!("dialect: {dialect:?}");
                            }
                            Err(e) => eprintln!("{e}"),
                        }
                    }
                    _ => {
                        let outcome = repl.rewrite_source(trimmed);
                        print_outcome(&outcome, false, false);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }
    Ok(())
}
