//! Purpose: Run the parsing program (a jq filter) over a container's raw text.
//! Exports: `ScriptContext`, `ScriptInputs`.
//! Role: Parsing bridge; owns the interpreter state for exactly one extraction.
//! Invariants: A context evaluates at most once; a second evaluation is a usage error.
//! Invariants: Load/compile errors, runtime errors, and empty output are collaborator failures.
//! Invariants: The returned tree is owned, so it stays valid after the context is closed.
//! Notes: `$text` is a binary string (one code point per byte); `$cidMode` is passed verbatim.

mod natives;
mod value;

use std::fmt;

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, Native, RcIter};
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::tree::{PropValue, bytes_to_binary_string};

/// Global variables visible to the program, in the order their values are bound.
const GLOBAL_VARS: [&str; 2] = ["$text", "$cidMode"];

/// Inputs injected into the program's global scope.
#[derive(Clone, Copy, Debug)]
pub struct ScriptInputs<'a> {
    pub text: &'a [u8],
    pub cid_mode: bool,
}

/// A compiled parsing program, usable for a single evaluation.
pub struct ScriptContext {
    filter: jaq_core::Filter<Native<PropValue>>,
    evaluated: bool,
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("evaluated", &self.evaluated)
            .finish()
    }
}

impl ScriptContext {
    /// Parses and compiles `program` with the prelude and native filters registered.
    pub fn load(program: &str) -> Result<Self, Error> {
        let source = format!("{}{program}", natives::PRELUDE);
        let arena = Arena::default();
        let loader = Loader::new(jaq_std::defs());
        let file = File {
            code: source.as_str(),
            path: (),
        };
        let modules = loader
            .load(&arena, file)
            .map_err(|errs| load_error("failed to parse parsing program", errs))?;

        let filter = Compiler::default()
            .with_funs(natives::with_natives(jaq_std::funs::<PropValue>()))
            .with_global_vars(GLOBAL_VARS.iter().copied())
            .compile(modules)
            .map_err(|errs| load_error("failed to compile parsing program", errs))?;

        debug!(program_len = program.len(), "parsing program loaded");
        Ok(Self {
            filter,
            evaluated: false,
        })
    }

    /// Runs the program and returns its first output.
    pub fn evaluate(&mut self, inputs: ScriptInputs<'_>) -> Result<PropValue, Error> {
        if self.evaluated {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("script context has already been evaluated"));
        }
        self.evaluated = true;

        let vars = [
            PropValue::Str(bytes_to_binary_string(inputs.text)),
            PropValue::Bool(inputs.cid_mode),
        ];
        let empty = RcIter::new(core::iter::empty::<Result<PropValue, String>>());
        let mut outputs = self.filter.run((Ctx::new(vars, &empty), PropValue::Null));

        let result = match outputs.next() {
            None => Err(Error::new(ErrorKind::Collaborator)
                .with_message("parsing program produced no output")),
            Some(Err(err)) => Err(Error::new(ErrorKind::Collaborator)
                .with_message("parsing program raised an error")
                .with_hint(format!("{err:?}"))),
            Some(Ok(PropValue::Null)) => Err(Error::new(ErrorKind::Collaborator)
                .with_message("parsing program returned no result")),
            Some(Ok(value)) => Ok(value),
        };
        debug!(
            text_len = inputs.text.len(),
            cid_mode = inputs.cid_mode,
            ok = result.is_ok(),
            "parsing program evaluated"
        );
        result
    }

    /// Tears down the interpreter state.
    pub fn close(self) {
        debug!(evaluated = self.evaluated, "script context closed");
        drop(self);
    }
}

fn load_error<E: fmt::Debug>(message: &str, errs: E) -> Error {
    Error::new(ErrorKind::Collaborator)
        .with_message(message)
        .with_hint(format!("Details: {errs:?}"))
}
