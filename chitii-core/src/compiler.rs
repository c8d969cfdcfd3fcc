use tracing::debug;

use crate::ast::Stmt;
use crate::codegen::{CodegenOptions, generate};
use crate::error::CoreError;
use crate::ir::Module;
use crate::lexer::{Token, tokenize};
use crate::parser::parse;

/// Everything one compilation produced, phase by phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub tokens: Vec<Token>,
    pub program: Vec<Stmt>,
    pub module: Module,
}

impl CompilationArtifact {
    pub fn llvm_ir(&self) -> String {
        self.module.to_string()
    }
}

/// Run lexer, parser and code generator over `source`.
///
/// The first error from any phase aborts the compilation; nothing
/// produced by earlier phases is returned in that case.
pub fn compile(source: &str, options: &CodegenOptions) -> Result<CompilationArtifact, CoreError> {
    let tokens = tokenize(source)?;
    debug!(tokens = tokens.len(), "lexed source");

    let program = parse(&tokens)?;
    debug!(statements = program.len(), "parsed program");

    let module = generate(&program, options)?;
    debug!(
        functions = module.functions.len(),
        strings = module.strings.len(),
        "generated module"
    );

    Ok(CompilationArtifact {
        tokens,
        program,
        module,
    })
}

/// Compile `source` straight to LLVM IR text.
pub fn emit_llvm_ir(source: &str, options: &CodegenOptions) -> Result<String, CoreError> {
    compile(source, options).map(|artifact| artifact.llvm_ir())
}
