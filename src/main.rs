use clap::Parser;
use cli::{Cli, Command};

// executable-specific modules
mod cli;
mod driver;

pub fn interface() -> driver::Result {
    let Cli { config, command } = Cli::parse();

    match command {
        Command::Check { input, types } => {
            let config = driver::load_config(&input, config.as_deref())?;
            driver::check(&input, &config, types)
        }
        Command::Emit { input, output } => {
            let config = driver::load_config(&input, config.as_deref())?;
            driver::emit(&input, output.as_deref(), &config)
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(error) = interface() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
