use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Error;
use clap::{value_t, App, AppSettings};
use env_logger::{fmt, Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use parsat::{Lit, Solver, Verdict};
use parsat_dimacs::DimacsParser;

mod signal;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("PARSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

fn default_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::from(elapsed.subsec_nanos()) ^ elapsed.as_secs())
        .unwrap_or(0)
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("parsat")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT]... 'The input files to use (stdin if omitted)'")
        .arg_from_usage("[threads] --threads=[N] 'Number of solver threads'")
        .arg_from_usage("[seed] --seed=[S] 'Base seed for the solver threads'")
        .arg_from_usage("--keep-going 'Enumerate all models'")
        .get_matches();

    init_logging();

    info!("This is parsat {}", env!("CARGO_PKG_VERSION"));

    let threads = match matches.value_of("threads") {
        Some(_) => value_t!(matches, "threads", usize)?,
        None => default_thread_count(),
    };

    let seed = match matches.value_of("seed") {
        Some(_) => value_t!(matches, "seed", u64)?,
        None => default_seed(),
    };

    let mut parser = DimacsParser::new();

    match matches.values_of("INPUT") {
        Some(paths) => {
            for path in paths {
                info!("Reading file '{}'", path);
                read_into_parser(&mut parser, fs::File::open(path)?)?;
            }
        }
        None => {
            info!("Reading from stdin");
            let stdin = io::stdin();
            let locked_stdin = stdin.lock();
            read_into_parser(&mut parser, locked_stdin)?;
        }
    }
    parser.eof()?;

    info!(
        "Parsed formula with {} variables and {} clauses",
        parser.var_count(),
        parser.clause_count()
    );

    let names = parser.names().to_owned();
    let formula = parser.take_formula();

    let keep_going = matches.is_present("keep-going");

    let mut solver = Solver::new();
    solver.config_mut().keep_going = keep_going;
    solver.add_formula(&formula);

    signal::install(solver.interrupt_flag());

    let outcome = if keep_going {
        // Stream every model as it is found; the verdict line follows.
        solver.solve_with(threads, seed, |model| print_model(model, &names))?
    } else {
        solver.solve(threads, seed)?
    };

    match outcome.verdict {
        Verdict::Sat => {
            println!("s SATISFIABLE");
            if !keep_going {
                if let Some(ref model) = outcome.model {
                    print_model(model, &names);
                }
            }
            Ok(0)
        }
        Verdict::Unsat => {
            println!("s UNSATISFIABLE");
            Ok(0)
        }
        Verdict::Unknown => {
            info!("interrupted");
            Ok(1)
        }
    }
}

fn read_into_parser(parser: &mut DimacsParser, mut input: impl Read) -> Result<(), Error> {
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let len = input.read(&mut buffer)?;
        if len == 0 {
            return Ok(());
        }
        parser.parse_chunk(&buffer[..len])?;
    }
}

/// Print a model under the original DIMACS variable names, in registration
/// order.
fn print_model(model: &[Lit], names: &[usize]) {
    print!("v");
    for &lit in model {
        let name = names[lit.index()];
        if lit.is_negative() {
            print!(" -{}", name);
        } else {
            print!(" {}", name);
        }
    }
    println!(" 0");
}
