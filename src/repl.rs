//! Interactive REPL.
//!
//! Features:
//! - Colored output for values and errors
//! - Command history with persistence
//! - Special commands: :help, :clear, :load, :quit
//! - Multi-line input detection by paren/string balance

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::path::Path;

use crate::devtools;
use crate::interp::Interp;
use crate::lexer::Lexer;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const HISTORY_FILE: &str = ".lispet-history";

pub struct Repl {
    print_ast: bool,
    interp: Interp,
}

enum CommandResult {
    Print(String),
    Error(String),
    Clear,
    Quit,
}

impl Repl {
    pub fn new(print_ast: bool) -> Self {
        Repl { print_ast, interp: Interp::new() }
    }

    fn rep(&mut self, input: &str) -> Result<String, String> {
        if self.print_ast {
            if let Ok(tokens) = Lexer::tokenize(input) {
                let mut scratch = crate::arena::Arena::new();
                if let Ok(ast) = crate::reader::Reader::parse(&mut scratch, tokens) {
                    println!("{}", devtools::pretty_print_ast(&scratch, ast));
                }
            }
        }

        self.interp.rep(input).map_err(|e| e.format())
    }

    /// Handles special REPL commands that start with `:`.
    fn handle_command(&mut self, command: &str) -> Option<CommandResult> {
        let parts: Vec<&str> = command.trim().split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }

        match parts[0] {
            ":help" | ":h" | ":?" => Some(CommandResult::Print(self.help_message())),
            ":clear" | ":cls" => Some(CommandResult::Clear),
            ":quit" | ":exit" | ":q" => Some(CommandResult::Quit),
            ":load" | ":l" => {
                if parts.len() < 2 {
                    Some(CommandResult::Error("Usage: :load <file>".to_string()))
                } else {
                    Some(self.load_file(parts[1]))
                }
            }
            _ => None,
        }
    }

    fn help_message(&self) -> String {
        format!(
            r#"{}

{}
  :help, :h, :?     Show this help message
  :clear, :cls      Clear the screen
  :quit, :exit, :q  Exit the REPL
  :load <file>      Load and evaluate a file

{}
  Ctrl+C            Cancel current input
  Ctrl+D            Exit the REPL
  Up/Down arrows    Navigate history

{}
  (+ 1 2 3)               => 6
  (define x 42)           => nil
  (cons 1 2)              => ( 1 . 2 )
  ((lambda (n) (* n n)) 8) => 64
"#,
            format!("Lispet REPL v{}", VERSION).bold(),
            "Commands:".yellow().bold(),
            "Keyboard Shortcuts:".yellow().bold(),
            "Examples:".yellow().bold()
        )
    }

    fn load_file(&mut self, path: &str) -> CommandResult {
        let file_path = Path::new(path);
        match fs::read_to_string(file_path) {
            Ok(source) => match self.rep(&source) {
                Ok(value) => CommandResult::Print(format!(
                    "{} {}\n=> {}",
                    "Loaded:".green(),
                    path,
                    value
                )),
                Err(e) => CommandResult::Error(e),
            },
            Err(e) => {
                CommandResult::Error(format!("Failed to read file '{}': {}", path, e))
            }
        }
    }

    /// Checks if input appears to be incomplete: unbalanced parens or an
    /// open string. Strings are verbatim, so every quote toggles.
    fn is_incomplete(&self, input: &str) -> bool {
        let mut paren_depth = 0i32;
        let mut in_string = false;
        let mut in_comment = false;

        for c in input.chars() {
            match c {
                '\n' => in_comment = false,
                _ if in_comment => {}
                '"' => in_string = !in_string,
                _ if in_string => {}
                ';' => in_comment = true,
                '(' => paren_depth += 1,
                ')' => paren_depth -= 1,
                _ => {}
            }
        }

        paren_depth > 0 || in_string
    }

    fn print_welcome(&self) {
        println!(
            "{}",
            format!(
                r#"
 _     _                 _
| |   (_)___ _ __   ___ | |_
| |   | / __| '_ \ / _ \| __|
| |___| \__ \ |_) |  __/| |_
|_____|_|___/ .__/ \___| \__|
            |_|          v{}
"#,
                VERSION
            )
            .cyan()
        );
        println!(
            "Type {} for help, {} to exit.\n",
            ":help".yellow(),
            ":quit".yellow()
        );
    }

    pub fn run(&mut self) {
        let mut rl = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                eprintln!("{}: {:?}", "Failed to start line editor".red(), e);
                return;
            }
        };
        if rl.load_history(HISTORY_FILE).is_err() {}

        self.print_welcome();

        let mut input_buffer = String::new();

        'repl_loop: loop {
            let prompt = if input_buffer.is_empty() {
                format!("{}> ", "lispet".green())
            } else {
                format!("{}. ", "..".dimmed())
            };

            let readline = rl.readline(&prompt);
            match readline {
                Ok(line) => {
                    // Check for commands (only when buffer is empty)
                    if input_buffer.is_empty() && line.trim().starts_with(':') {
                        if let Err(err) = rl.add_history_entry(line.as_str()) {
                            eprintln!("{}: {:?}", "History error".red(), err);
                        }

                        if let Some(result) = self.handle_command(&line) {
                            match result {
                                CommandResult::Print(msg) => println!("{}", msg),
                                CommandResult::Error(msg) => {
                                    eprintln!("{}: {}", "Error".red().bold(), msg);
                                }
                                CommandResult::Clear => {
                                    print!("\x1B[2J\x1B[1;1H");
                                    self.print_welcome();
                                }
                                CommandResult::Quit => break 'repl_loop,
                            }
                        }
                        continue 'repl_loop;
                    }

                    // Accumulate input
                    if !input_buffer.is_empty() {
                        input_buffer.push('\n');
                    }
                    input_buffer.push_str(&line);

                    // Check if input is complete
                    if self.is_incomplete(&input_buffer) {
                        continue 'repl_loop;
                    }

                    // Save to history
                    if let Err(err) = rl.add_history_entry(input_buffer.as_str()) {
                        eprintln!("{}: {:?}", "History error".red(), err);
                    }

                    if let Err(err) = rl.save_history(HISTORY_FILE) {
                        eprintln!("{}: {:?}", "Save history error".red(), err);
                    }

                    // Evaluate the complete input
                    if !input_buffer.trim().is_empty() {
                        match self.rep(&input_buffer) {
                            Ok(out) => {
                                let colored_out = self.colorize_output(&out);
                                println!("{}", colored_out);
                            }
                            Err(e) => {
                                println!("{}", e);
                            }
                        }
                    }

                    input_buffer.clear();
                }
                Err(ReadlineError::Interrupted) => {
                    if !input_buffer.is_empty() {
                        println!("{}", "Input cancelled".dimmed());
                        input_buffer.clear();
                    }
                    continue 'repl_loop;
                }
                Err(ReadlineError::Eof) => break 'repl_loop,
                Err(err) => {
                    println!("{}: {:?}", "Error".red(), err);
                    break 'repl_loop;
                }
            }
        }

        println!("\n{}", "Goodbye!".cyan());
    }

    /// Colorizes REPL output based on the rendered value.
    fn colorize_output(&self, output: &str) -> String {
        if output == "nil" {
            return output.dimmed().to_string();
        }
        if output == "#t" {
            return output.green().to_string();
        }
        if output == "#f" {
            return output.red().to_string();
        }
        if output == "#func" {
            return output.magenta().to_string();
        }
        if output.starts_with('"') {
            return output.green().to_string();
        }
        if output.starts_with('\'') {
            return output.yellow().to_string();
        }
        if output.parse::<f64>().is_ok() {
            return output.blue().to_string();
        }

        output.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_detection_balances_parens_and_strings() {
        let repl = Repl::new(false);
        assert!(repl.is_incomplete("(define x"));
        assert!(repl.is_incomplete("\"open string"));
        assert!(repl.is_incomplete("(display \"a)\""));
        assert!(!repl.is_incomplete("(+ 1 2)"));
        assert!(!repl.is_incomplete("(f) ; trailing ( comment"));
    }
}
