//! Central plumbing between CLI commands and the library.

use std::path::Path;

use log::info;
use thiserror::Error;

use shapec::{
    Checked,
    codegen::{Backend, JavaScript},
    config::{CONFIG_FILE_NAME, Config, ConfigError, PreludeBinding},
    diagnostic::{Diagnostic, InvariantViolation},
    expr::Node,
    syntax::{self, ParseError},
};

/// The public result type of the [`driver`] module.
///
/// [`driver`]: self
pub type Result<T = ()> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("in the prelude binding {name}: {error}")]
    Prelude { name: Box<str>, error: ParseError },
    #[error("{0}")]
    Invariant(#[from] InvariantViolation),
    #[error("found {0} problems, refusing to emit")]
    Diagnostics(usize),
}

/// Loads the configuration for `input`: the explicit `config` if there is
/// one, else a `shapec.toml` next to `input` if it exists, else the defaults.
pub fn load_config(input: &Path, config: Option<&Path>) -> Result<Config> {
    if let Some(path) = config {
        return Ok(Config::load(path)?);
    }

    let sibling = input
        .parent()
        .unwrap_or(Path::new("."))
        .join(CONFIG_FILE_NAME);

    match sibling.exists() {
        true => {
            info!("using configuration from {}", sibling.display());
            Ok(Config::load(sibling)?)
        }
        false => Ok(Config::default()),
    }
}

/// Wraps `program` in the prelude bindings of `config`, outermost first.
pub fn with_prelude(prelude: &[PreludeBinding], program: Node) -> Result<Node> {
    prelude.iter().rev().try_fold(program, |body, binding| {
        let value = syntax::parse(&binding.value).map_err(|error| Error::Prelude {
            name: binding.name.clone(),
            error,
        })?;

        Ok(Node::binding(binding.name.as_ref(), value, body))
    })
}

/// Reads, parses and checks the program at `input`.
pub fn check_file(input: &Path, config: &Config) -> Result<Checked> {
    let source = std::fs::read_to_string(input)?;
    let program = syntax::parse(&source)?;
    let program = with_prelude(&config.prelude, program)?;

    info!("checking {}", input.display());
    let checked = shapec::check(&program, config)?;
    report(&checked.messages);

    Ok(checked)
}

/// Checks the program at `input` and prints its type if `types` is set.
pub fn check(input: &Path, config: &Config, types: bool) -> Result {
    let checked = check_file(input, config)?;

    if types {
        println!("{}", checked.node.ty());
    }

    Ok(())
}

/// Checks the program at `input` and emits it as JavaScript, to `output` if
/// given and to stdout otherwise.
pub fn emit(input: &Path, output: Option<&Path>, config: &Config) -> Result {
    let checked = check_file(input, config)?;
    if !checked.messages.is_empty() {
        return Err(Error::Diagnostics(checked.messages.len()));
    }

    let code = JavaScript::default().emit(&checked.node);
    match output {
        Some(path) => {
            std::fs::write(path, code)?;
            info!("wrote {}", path.display());
        }
        None => print!("{code}"),
    }

    Ok(())
}

fn report(messages: &[Diagnostic]) {
    for message in messages {
        eprintln!("warning: {message}");
    }
}
