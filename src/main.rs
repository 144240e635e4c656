use std::io::{self, Read};
use std::process::ExitCode;

use glipso::{Environment, load_prelude, logging, run};
use tracing::debug;

const USAGE: &str = "usage: glipso [path]";

// Reads the program from the path argument, or stdin when there is none
fn read_program(path: Option<&str>) -> io::Result<(String, String)> {
    match path {
        Some(path) => Ok((path.to_string(), std::fs::read_to_string(path)?)),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(("<stdin>".to_string(), source))
        }
    }
}

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() > 1 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    let (name, source) = match read_program(args.first().map(String::as_str)) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("glipso: {}", err);
            return ExitCode::FAILURE;
        }
    };
    debug!(name = %name, bytes = source.len(), "program read");

    let global_env = Environment::new();
    if let Err(err) = load_prelude(&global_env) {
        eprintln!("glipso: failed to load prelude: {}", err);
        return ExitCode::FAILURE;
    }

    match run(&source, &global_env) {
        Ok(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            if err.pretty_print(&name, &source).is_err() {
                eprintln!("Error: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}
