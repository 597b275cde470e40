// SPDX-License-Identifier: GPL-2.0-or-later

mod run;

use run::{run_build, BuildArgs};
use std::{path::PathBuf, process::ExitCode};

fn main() -> ExitCode {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-V", "--version"]) {
        print!("{}", env!("CARGO_PKG_VERSION").to_owned());
        return ExitCode::SUCCESS;
    }

    let Ok(subcommand) = pargs.subcommand() else {
        println!("invalid args");
        return ExitCode::FAILURE;
    };
    let Some(subcommand) = subcommand else {
        print!("{HELP}");
        return ExitCode::FAILURE;
    };
    match subcommand.as_str() {
        "build" => {
            if pargs.contains(["-h", "--help"]) {
                print!("{HELP_BUILD}");
                return ExitCode::SUCCESS;
            }
            let Ok(config) = pargs.value_from_str::<_, PathBuf>("--config") else {
                println!("missing '--config <PATH>'");
                return ExitCode::FAILURE;
            };
            let Ok(output) = pargs.opt_value_from_str::<_, PathBuf>("--output") else {
                println!("invalid '--output <PATH>'");
                return ExitCode::FAILURE;
            };
            let args = BuildArgs {
                config,
                output,
                size_only: pargs.contains("--size-only"),
            };
            if let Err(e) = run_build(&args, &mut std::io::stdout().lock()) {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
        v => {
            println!("invalid subcommand '{v}'");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

const HELP: &str = "\
Usage: mp4_init [OPTIONS] <COMMAND>

Commands:
  build    Build a fragmented mp4 initialization segment
  help     Print this message or the help of the given subcommand(s)

Options:
  -h, --help     Print help
  -V, --version  Print version
";

const HELP_BUILD: &str = "\
Build a fragmented mp4 initialization segment

Usage: mp4_init build --config <PATH> [OPTIONS]

Options:
      --config <PATH>  Media set description
      --output <PATH>  Output file [default: stdout]
      --size-only      Print the segment size without building it
  -h, --help           Print help
";
