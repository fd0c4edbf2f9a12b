use crate::arena::Arena;
use crate::env::EnvStack;
use crate::error::{Diagnostic, Error};
use crate::lexer::Lexer;
use crate::printer::{self, ConsoleSink, PrintSink};
use crate::reader::Reader;
use crate::stream::{self, CharStream, Source, StringStream};
use crate::value::NodeRef;

/// State of the current top-level program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Unparsed,
    Parsed,
    Running,
    Done,
    Failed,
}

//===----------------------------------------------------------------------===//
// Interp
//===----------------------------------------------------------------------===//

/// One interpreter instance: the node pool, the environment stack, the
/// print sink, and the parsed program. Instances share nothing; evaluation
/// is single-threaded and recursive.
pub struct Interp {
    pub(crate) arena: Arena,
    pub(crate) env: EnvStack,
    pub(crate) sink: Box<dyn PrintSink>,
    state: RunState,
    ast: NodeRef,
    source: String,
    file: Source,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub fn new() -> Self {
        Self::with_sink(Box::new(ConsoleSink))
    }

    /// Build an interpreter whose `display`/`print` output goes to `sink`.
    pub fn with_sink(sink: Box<dyn PrintSink>) -> Self {
        Self {
            arena: Arena::new(),
            env: EnvStack::new(),
            sink,
            state: RunState::Unparsed,
            ast: None,
            source: String::new(),
            file: Source::Repl,
        }
    }

    /// Lex and parse a program from a character stream. On success the
    /// interpreter transitions to Parsed; the stream is no longer needed.
    pub fn parse(&mut self, input: &mut dyn CharStream, file: Source) -> Result<(), Error> {
        self.state = RunState::Unparsed;
        self.ast = None;
        self.source = stream::read_to_string(input);
        self.file = file;

        let tokens = Lexer::tokenize(&self.source)?;
        self.ast = Reader::parse(&mut self.arena, tokens)?;
        self.state = RunState::Parsed;
        Ok(())
    }

    pub fn parse_str(&mut self, source: &str, file: Source) -> Result<(), Error> {
        let mut input = StringStream::new(source);
        self.parse(&mut input, file)
    }

    /// Evaluate the parsed program: reset the environment stack, then run
    /// the top-level expression list in sequence. Returns the last
    /// expression's value. Requires a successful `parse`; a completed run
    /// (Done or Failed) may be re-run from scratch.
    pub fn run(&mut self) -> Result<NodeRef, Error> {
        match self.state {
            RunState::Parsed | RunState::Done | RunState::Failed => {}
            RunState::Unparsed | RunState::Running => return Err(Error::NotParsed),
        }

        self.state = RunState::Running;
        if let Err(e) = self.env.reset(&mut self.arena) {
            self.state = RunState::Failed;
            return Err(e);
        }

        match self.eval_sequence(self.ast, 0) {
            Ok(value) => {
                self.state = RunState::Done;
                Ok(value)
            }
            Err(e) => {
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    /// Read-eval-print step for interactive sessions: evaluates `input` in
    /// the existing global environment (initializing it on first use) and
    /// returns the rendered result. Unlike `run`, definitions persist
    /// across calls.
    pub fn rep(&mut self, input: &str) -> Result<String, Diagnostic> {
        match self.eval_more(input) {
            Ok(value) => Ok(self.render(value)),
            Err(e) => Err(Diagnostic::new(e, input.to_string(), Source::Repl)),
        }
    }

    fn eval_more(&mut self, input: &str) -> Result<NodeRef, Error> {
        if !self.env.is_initialized() {
            self.env.reset(&mut self.arena)?;
        }
        let tokens = Lexer::tokenize(input)?;
        let ast = Reader::parse(&mut self.arena, tokens)?;
        self.eval_sequence(ast, 0)
    }

    /// Wrap an error with this interpreter's source context for reporting.
    pub fn diagnostic(&self, error: Error) -> Diagnostic {
        Diagnostic::new(error, self.source.clone(), self.file.clone())
    }

    pub fn render(&self, node: NodeRef) -> String {
        printer::render_node(&self.arena, node)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn ast(&self) -> NodeRef {
        self.ast
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_then_run_returns_the_last_value() {
        let mut interp = Interp::new();
        interp.parse_str("(+ 1 2) (* 2 3)", Source::Repl).unwrap();
        assert_eq!(interp.state(), RunState::Parsed);

        let result = interp.run().unwrap();
        assert_eq!(interp.render(result), "6");
        assert_eq!(interp.state(), RunState::Done);
    }

    #[test]
    fn run_before_parse_is_an_error() {
        let mut interp = Interp::new();
        assert!(matches!(interp.run(), Err(Error::NotParsed)));
    }

    #[test]
    fn failed_runs_can_be_rerun() {
        let mut interp = Interp::new();
        interp.parse_str("(car 5)", Source::Repl).unwrap();
        assert!(interp.run().is_err());
        assert_eq!(interp.state(), RunState::Failed);

        // The same program fails the same way; state stays consistent.
        assert!(interp.run().is_err());
    }

    #[test]
    fn run_resets_the_environment_each_time() {
        let mut interp = Interp::new();
        interp.parse_str("(define x 1) (set! x (+ x 1)) x", Source::Repl).unwrap();
        let first = interp.run().unwrap();
        assert_eq!(interp.render(first), "2");
        let second = interp.run().unwrap();
        assert_eq!(interp.render(second), "2");
    }

    #[test]
    fn rep_keeps_definitions_across_inputs() {
        let mut interp = Interp::new();
        interp.rep("(define x 21)").unwrap();
        assert_eq!(interp.rep("(* x 2)").unwrap(), "42");
    }

    #[test]
    fn rep_wraps_errors_in_a_diagnostic() {
        let mut interp = Interp::new();
        let diagnostic = interp.rep("missing").unwrap_err();
        assert!(diagnostic.format().contains("was not found"));
    }
}
