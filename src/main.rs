use clap::{Args, Parser, Subcommand};
use flux::{eval, parse, tokenize, Environment, Error};
use miette::{IntoDiagnostic, WrapErr};
use std::collections::HashMap;
use std::path::PathBuf;
use std::{fs, io::{self, Write}};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the tokens of an expression, one per line.
    Tokenize(Input),
    /// Print the fully parenthesized parse of an expression.
    Parse(Input),
    /// Evaluate an expression with the built-in functions and constants.
    Eval {
        #[command(flatten)]
        input: Input,
        /// Bind a variable, e.g. `-v psx=640`. May be repeated.
        #[arg(short = 'v', long = "var", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,
    },
    /// Interactive calculator.
    Calc,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Input {
    /// The expression.
    expr: Option<String>,
    /// Read the expression from a file instead.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl Input {
    fn read(self) -> miette::Result<String> {
        match (self.expr, self.file) {
            (Some(expr), _) => Ok(expr),
            (None, Some(filename)) => {
                let file_contents = fs::read_to_string(&filename)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("reading '{}' failed", filename.display()))?;
                Ok(file_contents.trim().to_string())
            }
            (None, None) => Err(miette::miette!("no expression given")),
        }
    }
}

fn parse_binding(binding: &str) -> Result<(String, f64), String> {
    let (name, value) = binding
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{binding}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid value for '{}': {err}", name.trim()))?;
    Ok((name.trim().to_string(), value))
}

fn report(err: impl Into<Error>, source: &str) -> miette::Report {
    miette::Report::new(err.into()).with_source_code(source.to_string())
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tokenize(input) => {
            let source = input.read()?;
            for token in tokenize(&source).map_err(|e| report(e, &source))? {
                println!("{:?}", token);
            }
        }
        Commands::Parse(input) => {
            let source = input.read()?;
            let tokens = tokenize(&source).map_err(|e| report(e, &source))?;
            let tree = parse(&tokens).map_err(|e| report(e, &source))?;
            println!("{tree}");
        }
        Commands::Eval { input, vars } => {
            let source = input.read()?;
            let variables: HashMap<String, f64> = vars.into_iter().collect();
            let env = Environment::with_builtins();
            let value = eval(&source, &variables, &env).map_err(|e| report(e, &source))?;
            println!("{value}");
        }
        Commands::Calc => calc()?,
    }

    Ok(())
}

fn calc() -> miette::Result<()> {
    let env = Environment::with_builtins();
    let mut variables = HashMap::new();

    loop {
        print!("calc> ");
        io::stdout().flush().into_diagnostic()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input).into_diagnostic()? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }

        // `let name = expr` keeps the result for later lines.
        let (binding, source) = match input.strip_prefix("let ") {
            Some(rest) => match rest.split_once('=') {
                Some((name, source)) => (Some(name.trim()), source.trim()),
                None => {
                    eprintln!("expected `let name = expression`");
                    continue;
                }
            },
            None => (None, input),
        };

        match eval(source, &variables, &env) {
            Ok(value) => {
                println!("{value}");
                if let Some(name) = binding {
                    variables.insert(name.to_string(), value);
                }
            }
            Err(err) => eprintln!("{:?}", report(err, source)),
        }
    }

    Ok(())
}
