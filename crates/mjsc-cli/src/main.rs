use std::process::ExitCode;

use clap::Parser;

use mjsc::{parse_eval, parse_script, CompileError, CompilerOptions};

#[derive(Debug, Parser)]
#[command(name = "mjsc", about = "Compile ECMAScript 5.1 source to register bytecode")]
struct Args {
    /// Compile the given source text instead of a file.
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Compile in eval-code mode (the result value is returned).
    #[arg(long = "eval-input", default_value_t = false)]
    eval_input: bool,

    /// Compile eval-code in strict mode (implies --eval-input).
    #[arg(long = "strict", default_value_t = false)]
    strict: bool,

    /// Print the compiled instruction stream.
    #[arg(short = 'd', long = "dump", default_value_t = false)]
    dump: bool,

    /// Source file to compile.
    #[arg()]
    file: Option<String>,
}

#[derive(Debug, Eq, PartialEq)]
enum ArgsError {
    MissingInput,
    ConflictingInputs,
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgsError::MissingInput => f.write_str("no input: pass a file or use -e"),
            ArgsError::ConflictingInputs => f.write_str("pass either a file or -e, not both"),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
enum Input {
    File(String),
    Source(String),
}

fn select_input(args: &Args) -> Result<Input, ArgsError> {
    match (&args.eval, &args.file) {
        (Some(_), Some(_)) => Err(ArgsError::ConflictingInputs),
        (Some(source), None) => Ok(Input::Source(source.clone())),
        (None, Some(file)) => Ok(Input::File(file.clone())),
        (None, None) => Err(ArgsError::MissingInput),
    }
}

fn compile(args: &Args, source: &[u8]) -> Result<mjsc::BytecodeProgram, CompileError> {
    let options = CompilerOptions {
        show_instrs: false,
    };
    if args.eval_input || args.strict {
        parse_eval(source, args.strict, &options)
    } else {
        parse_script(source, &options)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let input = match select_input(&args) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("mjsc: {err}");
            return ExitCode::from(2);
        }
    };

    let source = match &input {
        Input::Source(text) => text.clone().into_bytes(),
        Input::File(path) => match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("mjsc: {path}: {err}");
                return ExitCode::from(2);
            }
        },
    };

    match compile(&args, &source) {
        Ok(program) => {
            if args.dump {
                print!("{}", program.disassemble());
            } else {
                println!(
                    "compiled {} instructions, {} literals",
                    program.instrs().len(),
                    program.lits().len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let (line, column) = line_col(&source, err.position());
            eprintln!("mjsc: {}:{}: {}", line, column, err.message());
            ExitCode::FAILURE
        }
    }
}

/// 1-based line and 0-based column of a byte offset.
fn line_col(source: &[u8], position: usize) -> (usize, usize) {
    let upto = &source[..position.min(source.len())];
    let line = 1 + upto.iter().filter(|&&b| b == b'\n').count();
    let column = upto
        .iter()
        .rev()
        .take_while(|&&b| b != b'\n')
        .count();
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(eval: Option<&str>, file: Option<&str>) -> Args {
        Args {
            eval: eval.map(str::to_string),
            eval_input: false,
            strict: false,
            dump: false,
            file: file.map(str::to_string),
        }
    }

    #[test]
    fn input_selection_rules() {
        assert_eq!(
            select_input(&args(Some("1"), None)),
            Ok(Input::Source("1".into()))
        );
        assert_eq!(
            select_input(&args(None, Some("a.js"))),
            Ok(Input::File("a.js".into()))
        );
        assert_eq!(select_input(&args(None, None)), Err(ArgsError::MissingInput));
        assert_eq!(
            select_input(&args(Some("1"), Some("a.js"))),
            Err(ArgsError::ConflictingInputs)
        );
    }

    #[test]
    fn line_col_counts_newlines() {
        assert_eq!(line_col(b"abc", 2), (1, 2));
        assert_eq!(line_col(b"a\nbc", 3), (2, 1));
        assert_eq!(line_col(b"a\nbc", 9), (2, 2));
    }

    #[test]
    fn strict_flag_compiles_as_eval() {
        let mut cli = args(Some("var x = 1;"), None);
        cli.strict = true;
        let program = compile(&cli, b"var x = 1;").expect("compile");
        assert!(program
            .scope_flags()
            .contains(mjsc::opcode::ScopeCodeFlags::STRICT));
    }
}
