pub mod arena;
pub mod devtools;
pub mod env;
pub mod error;
pub mod eval;
pub mod interp;
pub mod lexer;
pub mod printer;
pub mod reader;
pub mod repl;
pub mod stream;
pub mod value;
