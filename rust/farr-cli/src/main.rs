//! Farr CLI — command-line interface for the Farr programming language.

use clap::{Parser as ClapParser, Subcommand};
use farr_rt::interpreter::{Interpreter, InterpretError};
use farr_rt::modules::ModuleLoader;
use std::path::PathBuf;

fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}
fn green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}

#[derive(ClapParser)]
#[command(
    name = "farr",
    version,
    about = "Use Farr and enjoy!",
    long_about = "Farr is a dynamically typed, interpreted scripting language.\n\n\
                  Learn more at: https://github.com/sheikhartin/farr",
    help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}

Examples:
  farr run hello.farr            Run code from a file
  farr cmd \"println(1 + 1);\"      Run a string containing code
  farr shell                     Start the interactive REPL
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run code from a file
    Run {
        /// Path to the source file
        #[arg()]
        filepath: PathBuf,
    },
    /// Run a string containing code
    Cmd {
        /// The code to execute
        #[arg()]
        code: String,
    },
    /// Start the interactive REPL
    Shell,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Run { filepath } => cmd_run(&filepath),
        Commands::Cmd { code } => cmd_cmd(&code),
        Commands::Shell => cmd_shell(),
    };
    std::process::exit(exit_code);
}

fn cmd_run(filepath: &PathBuf) -> i32 {
    let source = match std::fs::read_to_string(filepath) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{} cannot read file '{}': {}",
                red("error:"),
                filepath.display(),
                e
            );
            return 1;
        }
    };
    run_source(&source)
}

fn cmd_cmd(code: &str) -> i32 {
    run_source(code)
}

fn run_source(source: &str) -> i32 {
    let module = match farr_compiler::compile(source) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{} {}", red("error:"), e);
            return 1;
        }
    };
    let mut interpreter = Interpreter::new(ModuleLoader::new(None));
    match interpreter.run(&module) {
        Ok(_) => 0,
        Err(flow) => {
            eprintln!("{}", render_flow(flow));
            1
        }
    }
}

/// Turns an escaped non-local exit reaching the top level into the
/// `<ErrorKind>: <message>! Around line <row>, column <column>.` contract.
/// `break!`/`continue!`/`return!` outside any enclosing construct surface
/// as a RuntimeError, since they have nowhere left to travel to.
fn render_flow(flow: farr_rt::interpreter::Flow) -> String {
    use farr_rt::interpreter::Flow;
    match flow {
        Flow::Error(err) => format!("{} {}", red("Error:"), err),
        _ => format!(
            "{} RuntimeError: break!/continue!/return! used outside a loop or function!",
            red("Error:")
        ),
    }
}

fn cmd_shell() -> i32 {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    let mut interpreter = Interpreter::new(ModuleLoader::new(None));
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{} cannot start shell: {}", red("error:"), e);
            return 1;
        }
    };

    loop {
        match rl.readline("Farr> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                if line.trim().is_empty() {
                    continue;
                }
                let module = match farr_compiler::compile(&line) {
                    Ok(m) => m,
                    Err(e) => {
                        println!("{} {}", red("Error:"), e);
                        continue;
                    }
                };
                match interpreter.run(&module) {
                    Ok(value) => {
                        if !matches!(value, farr_rt::values::Value::Null) {
                            println!("{}", value.display_string());
                        }
                    }
                    Err(farr_rt::interpreter::Flow::Error(InterpretError { error, span: _ }))
                        if error.kind == farr_core::errors::ErrorKind::SystemExit =>
                    {
                        println!("{} {}", green("Exiting REPL..."), error.message);
                        return 0;
                    }
                    Err(flow) => println!("{}", render_flow(flow)),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", green("Exiting REPL..."));
                return 0;
            }
            Err(e) => {
                eprintln!("{} {}", red("error:"), e);
                return 1;
            }
        }
    }
}
