use clap::{Parser, Subcommand};
use std::path::Path;
use std::process;

use lispet::devtools;
use lispet::error::Diagnostic;
use lispet::interp::Interp;
use lispet::lexer::Lexer;
use lispet::repl::Repl;
use lispet::stream::{FileStream, Source};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "lispet")]
#[command(version = VERSION)]
#[command(about = "Lispet - a small Scheme-like Lisp interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Pretty-print the AST before running
    #[arg(long, global = true)]
    print_ast: bool,

    /// Dump the token list before running
    #[arg(long, global = true)]
    print_tokens: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive REPL
    Repl,

    /// Execute a Lispet source file and print the final value
    Run {
        /// Path to the source file
        file: String,
    },
}

fn run_file(file_path: &str, print_tokens: bool, print_ast: bool) -> Result<(), Diagnostic> {
    let path = Path::new(file_path);
    let source = Source::File(path.to_path_buf());

    let mut stream = FileStream::new();
    let mut interp = Interp::new();

    stream
        .open(path)
        .map_err(|e| Diagnostic::new(e, String::new(), source.clone()))?;
    interp.parse(&mut stream, source).map_err(|e| interp.diagnostic(e))?;

    if print_tokens {
        // The parse already accepted the source; re-tokenizing cannot fail.
        if let Ok(tokens) = Lexer::tokenize(interp.source()) {
            print!("{}", devtools::dump_tokens(&tokens));
        }
    }
    if print_ast {
        println!("{}", devtools::pretty_print_ast(interp.arena(), interp.ast()));
    }

    let result = interp.run().map_err(|e| interp.diagnostic(e))?;
    println!("{}", interp.render(result));
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Repl) | None => {
            let mut repl = Repl::new(cli.print_ast);
            repl.run();
            Ok(())
        }
        Some(Commands::Run { file }) => run_file(&file, cli.print_tokens, cli.print_ast),
    };

    if let Err(e) = result {
        eprintln!("{}", e.format());
        process::exit(1);
    }
}
