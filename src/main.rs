use argh::FromArgs;
use pipesh::{Interpreter, ShellConfig, logging};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Interactive shell with pipelines, aliases and variables.
struct Args {
    #[argh(option)]
    /// path to a TOML config file
    config: Option<PathBuf>,

    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status
    command: Option<String>,
}

fn main() {
    let args: Args = argh::from_env();

    let config = match ShellConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pipesh: {e}; using defaults");
            ShellConfig::default()
        }
    };
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("pipesh: {e:#}");
    }

    let mut sh = Interpreter::new(config);
    let status = match args.command {
        Some(line) => sh.run_terminal(&line).status,
        None => match sh.repl() {
            Ok(status) => status,
            Err(e) => {
                eprintln!("pipesh: {e}");
                1
            }
        },
    };
    std::process::exit(status);
}
