use gclvm::program::Program;
use gclvm::runtime::{ExecutionResult, Machine};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: gclvm <program.json>");
        return ExitCode::from(2);
    };

    let program = match Program::load(&path) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::from(2);
        }
    };

    let mut machine = Machine::builder().build();
    let main = match program.install(&mut machine) {
        Ok(main) => main,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::from(2);
        }
    };

    let result = match machine.execute(&main) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::info!(?result, "program finished");

    machine.dump();
    if let Err(e) = machine.teardown() {
        eprintln!("{path}: {e}");
        return ExitCode::from(2);
    }

    match result {
        ExecutionResult::Success | ExecutionResult::UserQuit => ExitCode::SUCCESS,
        ExecutionResult::FailureAtLine(line) => {
            eprintln!("Failure at line {line}");
            ExitCode::from(1)
        }
    }
}
