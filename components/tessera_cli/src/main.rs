//! Tessera CLI
//!
//! Parses arguments, installs logging and hands the input file to a
//! [`Runner`].

use clap::Parser;
use std::process;
use tessera_cli::{disassemble, logging, Cli, CliError, CliResult, Runner};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = logging::init(&cli.log_level, cli.log_format) {
        eprintln!("Error: {}", error);
    }
    if let Err(error) = run(cli) {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let Some(path) = cli.file.clone() else {
        println!("Tessera player v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage:");
        println!("  tessera --file <FILE>                 Run an action block or ABC file");
        println!("  tessera --file <FILE> --disassemble   List its instructions");
        println!();
        println!("Run 'tessera --help' for more options.");
        return Ok(());
    };

    if cli.disassemble {
        let data = std::fs::read(&path).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?;
        for line in disassemble(&data, cli.format.resolve(&data, Some(&path)))? {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut runner = Runner::new(cli.player_config()?).with_frames(cli.frames);
    let result = runner.run_file(&path, cli.format);
    for line in runner.take_output() {
        println!("{}", line);
    }
    result?;
    for name in &cli.dump {
        println!("{}", runner.dump(name)?);
    }
    if cli.stats {
        eprintln!("{}", runner.stats_line());
    }
    Ok(())
}
