//! Lowering of the statement list into an LLVM IR [`Module`].
//!
//! Generation is a single depth-first walk. The [`Codegen`] value is
//! the whole compiler context: the module-wide function table, the
//! variable table of the body being emitted, and that body's
//! [`FunctionBuilder`]. Entering a function definition swaps in a
//! fresh table and builder and restores the caller's afterwards.

use std::collections::HashMap;

use tracing::trace;

use crate::ast::{AssignTarget, Expr, FunctionDef, Stmt};
use crate::error::CodegenError;
use crate::ir::{
    Callee, ENTRY, FMT_INT, FMT_SCAN, FunctionBuilder, Module, Operand, PRINTF, SCANF,
    StringConstant, Type,
};

/// Knobs for a single compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Written into the `ModuleID` and `source_filename` header lines.
    pub module_name: String,
    /// Emitted as `target triple` when set; otherwise the consuming
    /// toolchain picks its host triple.
    pub target_triple: Option<String>,
    /// Print the value of every `return` before returning it.
    pub print_on_return: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            module_name: "chitii".to_string(),
            target_triple: None,
            print_on_return: true,
        }
    }
}

/// Lower a parsed program into a module.
///
/// Top-level statements become the body of `main`. On error the
/// partially built module is dropped.
pub fn generate(program: &[Stmt], options: &CodegenOptions) -> Result<Module, CodegenError> {
    let mut codegen = Codegen::new(options);
    for stmt in program {
        codegen.lower_stmt(stmt)?;
    }
    Ok(codegen.finish())
}

/// Storage a name is bound to within one function body.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    /// An `alloca i32` slot.
    Scalar(Operand),
    /// An `alloca [len x i32]` buffer.
    Array { base: Operand, len: usize },
}

/// Result of lowering an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Int(Operand),
    Array { base: Operand, len: usize },
    /// String literals stay as text until printed.
    Str(String),
}

impl Value {
    fn describe(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Array { .. } => "array",
            Value::Str(_) => "string",
        }
    }

    fn into_int(self) -> Result<Operand, CodegenError> {
        match self {
            Value::Int(operand) => Ok(operand),
            other => Err(CodegenError::UnsupportedValue {
                expected: "integer",
                found: other.describe(),
            }),
        }
    }
}

struct Codegen<'o> {
    options: &'o CodegenOptions,
    /// Function name to parameter count.
    functions: HashMap<String, usize>,
    variables: HashMap<String, Binding>,
    builder: FunctionBuilder,
    module: Module,
}

impl<'o> Codegen<'o> {
    fn new(options: &'o CodegenOptions) -> Self {
        Codegen {
            options,
            functions: HashMap::new(),
            variables: HashMap::new(),
            builder: FunctionBuilder::new(ENTRY),
            module: Module {
                name: options.module_name.clone(),
                target_triple: options.target_triple.clone(),
                strings: Vec::new(),
                functions: Vec::new(),
            },
        }
    }

    fn finish(mut self) -> Module {
        let entry = self.builder.finish();
        self.module.functions.push(entry);
        self.module
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
            }
            Stmt::Assign { target, value } => {
                self.lower_assign(target, value)?;
            }
            Stmt::Function(def) => self.lower_function(def)?,
            Stmt::Return(expr) => {
                let value = self.lower_expr(expr)?.into_int()?;
                if self.options.print_on_return {
                    self.print_int(value.clone());
                }
                self.builder.ret(value);
            }
            Stmt::PrintStr(text) => self.print_str(text),
            Stmt::PrintExpr(expr) => match self.lower_expr(expr)? {
                Value::Int(value) => self.print_int(value),
                Value::Str(text) => self.print_str(&text),
                array @ Value::Array { .. } => {
                    return Err(CodegenError::UnsupportedValue {
                        expected: "printable",
                        found: array.describe(),
                    });
                }
            },
        }
        Ok(())
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<Value, CodegenError> {
        match expr {
            Expr::Int(value) => Ok(Value::Int(Operand::Const(*value))),
            Expr::Str(text) => Ok(Value::Str(text.clone())),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?.into_int()?;
                let rhs = self.lower_expr(rhs)?.into_int()?;
                Ok(Value::Int(self.builder.binary(*op, lhs, rhs)))
            }
            Expr::Var(name) => match self.lookup(name)? {
                Binding::Scalar(slot) => Ok(Value::Int(self.builder.load(slot, name))),
                Binding::Array { base, len } => Ok(Value::Array { base, len }),
            },
            Expr::Array(elements) => self.lower_array(elements),
            Expr::Index { name, index } => {
                let (base, len) = self.lookup_array(name)?;
                let index = self.lower_expr(index)?.into_int()?;
                let ptr = self.builder.element_ptr(len, base, index);
                Ok(Value::Int(self.builder.load(ptr, name)))
            }
            Expr::Call { name, args } => self.lower_call(name, args),
            Expr::Input => {
                let slot = self.builder.alloca(Type::I32, "input");
                self.builder.call_void(
                    Callee::Variadic(SCANF),
                    vec![
                        (Type::Ptr, Operand::Global(FMT_SCAN.to_string())),
                        (Type::Ptr, slot.clone()),
                    ],
                );
                Ok(Value::Int(self.builder.load(slot, "input")))
            }
        }
    }

    fn lower_array(&mut self, elements: &[Expr]) -> Result<Value, CodegenError> {
        let values = elements
            .iter()
            .map(|element| self.lower_expr(element)?.into_int())
            .collect::<Result<Vec<_>, _>>()?;
        let len = values.len();
        let base = self.builder.alloca(Type::IntArray(len), "array");
        for (i, value) in values.into_iter().enumerate() {
            let index = Operand::Const(i as i32);
            let ptr = self.builder.element_ptr(len, base.clone(), index);
            self.builder.store(value, ptr);
        }
        Ok(Value::Array { base, len })
    }

    fn lower_assign(&mut self, target: &AssignTarget, value: &Expr) -> Result<Value, CodegenError> {
        match target {
            AssignTarget::Name(name) => {
                let value = self.lower_expr(value)?;
                match &value {
                    Value::Array { base, len } => {
                        self.variables.insert(
                            name.clone(),
                            Binding::Array {
                                base: base.clone(),
                                len: *len,
                            },
                        );
                    }
                    Value::Int(operand) => {
                        let slot = match self.variables.get(name) {
                            Some(Binding::Scalar(slot)) => slot.clone(),
                            _ => {
                                let slot = self.builder.alloca(Type::I32, &format!("{name}.addr"));
                                self.variables
                                    .insert(name.clone(), Binding::Scalar(slot.clone()));
                                slot
                            }
                        };
                        self.builder.store(operand.clone(), slot);
                    }
                    Value::Str(_) => {
                        return Err(CodegenError::UnsupportedValue {
                            expected: "integer or array",
                            found: value.describe(),
                        });
                    }
                }
                Ok(value)
            }
            AssignTarget::Element { name, index } => {
                let (base, len) = self.lookup_array(name)?;
                let index = self.lower_expr(index)?.into_int()?;
                let ptr = self.builder.element_ptr(len, base, index);
                let value = self.lower_expr(value)?.into_int()?;
                self.builder.store(value.clone(), ptr);
                Ok(Value::Int(value))
            }
        }
    }

    fn lower_function(&mut self, def: &FunctionDef) -> Result<(), CodegenError> {
        if self.functions.contains_key(&def.name) || is_reserved(&def.name) {
            return Err(CodegenError::DuplicateFunction(def.name.clone()));
        }
        // Registered before the body so the function can call itself.
        self.functions.insert(def.name.clone(), def.params.len());
        trace!(name = %def.name, params = def.params.len(), "lowering function");

        let caller_variables = std::mem::take(&mut self.variables);
        let caller_builder = std::mem::replace(&mut self.builder, FunctionBuilder::new(&def.name));

        let body = self.lower_function_body(def);

        let builder = std::mem::replace(&mut self.builder, caller_builder);
        self.variables = caller_variables;
        body?;

        self.module.functions.push(builder.finish());
        Ok(())
    }

    fn lower_function_body(&mut self, def: &FunctionDef) -> Result<(), CodegenError> {
        for param in &def.params {
            let incoming = self.builder.add_param(param);
            let slot = self.builder.alloca(Type::I32, &format!("{param}.addr"));
            self.builder.store(incoming, slot.clone());
            self.variables.insert(param.clone(), Binding::Scalar(slot));
        }
        for stmt in &def.body {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_call(&mut self, name: &str, args: &[Expr]) -> Result<Value, CodegenError> {
        let arity = *self
            .functions
            .get(name)
            .ok_or_else(|| CodegenError::UndefinedFunction(name.to_string()))?;
        if arity != args.len() {
            return Err(CodegenError::ArityMismatch {
                name: name.to_string(),
                expected: arity,
                found: args.len(),
            });
        }
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            lowered.push((Type::I32, self.lower_expr(arg)?.into_int()?));
        }
        let result = self.builder.call(Callee::Direct(name.to_string()), lowered);
        Ok(Value::Int(result))
    }

    fn lookup(&self, name: &str) -> Result<Binding, CodegenError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UndefinedVariable(name.to_string()))
    }

    fn lookup_array(&self, name: &str) -> Result<(Operand, usize), CodegenError> {
        match self.lookup(name)? {
            Binding::Array { base, len } => Ok((base, len)),
            Binding::Scalar(_) => Err(CodegenError::NotAnArray(name.to_string())),
        }
    }

    fn print_int(&mut self, value: Operand) {
        self.builder.call_void(
            Callee::Variadic(PRINTF),
            vec![
                (Type::Ptr, Operand::Global(FMT_INT.to_string())),
                (Type::I32, value),
            ],
        );
    }

    fn print_str(&mut self, text: &str) {
        let name = format!(".str.{}", self.module.strings.len());
        // The constant is passed as printf's format; doubling `%` keeps
        // the text verbatim.
        let escaped = text.replace('%', "%%");
        self.module
            .strings
            .push(StringConstant::new(name.clone(), escaped.as_bytes()));
        self.builder
            .call_void(Callee::Variadic(PRINTF), vec![(Type::Ptr, Operand::Global(name))]);
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, ENTRY | PRINTF | SCANF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instr;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn lower(source: &str) -> Result<Module, CodegenError> {
        lower_with(source, &CodegenOptions::default())
    }

    fn lower_with(source: &str, options: &CodegenOptions) -> Result<Module, CodegenError> {
        let tokens = tokenize(source).expect("lex");
        let program = parse(&tokens).expect("parse");
        generate(&program, options)
    }

    fn body(module: &Module, name: &str) -> Vec<String> {
        module
            .function(name)
            .expect("function present")
            .blocks
            .iter()
            .flat_map(|block| block.instrs.iter().map(ToString::to_string))
            .collect()
    }

    #[test]
    fn lowers_arithmetic_assignment_and_print() {
        let module = lower("x = 3 + 4 * 2; print x;").expect("codegen");
        assert_eq!(body(&module, "main"), vec![
            "%mul.0 = mul i32 4, 2",
            "%add.1 = add i32 3, %mul.0",
            "%x.addr.2 = alloca i32",
            "store i32 %add.1, ptr %x.addr.2",
            "%x.3 = load i32, ptr %x.addr.2",
            "call i32 (ptr, ...) @printf(ptr @.fmt.int, i32 %x.3)",
            "ret i32 0",
        ]);
    }

    #[test]
    fn integer_literals_keep_their_value() {
        for value in [0, 1, 42, 2147483647] {
            let module = lower(&format!("print {value}")).expect("codegen");
            assert_eq!(
                body(&module, "main")[0],
                format!("call i32 (ptr, ...) @printf(ptr @.fmt.int, i32 {value})")
            );
        }
    }

    #[test]
    fn reassignment_reuses_the_scalar_slot() {
        let module = lower("x = 1; x = 2;").expect("codegen");
        let allocas = body(&module, "main")
            .iter()
            .filter(|line| line.contains("alloca"))
            .count();
        assert_eq!(allocas, 1);
    }

    #[test]
    fn lowers_array_literal_and_element_access() {
        let module = lower("a = [1, 2, 3]; a[0] = 9; print a[0];").expect("codegen");
        assert_eq!(body(&module, "main"), vec![
            "%array.0 = alloca [3 x i32]",
            "%elem.1 = getelementptr inbounds [3 x i32], ptr %array.0, i32 0, i32 0",
            "store i32 1, ptr %elem.1",
            "%elem.2 = getelementptr inbounds [3 x i32], ptr %array.0, i32 0, i32 1",
            "store i32 2, ptr %elem.2",
            "%elem.3 = getelementptr inbounds [3 x i32], ptr %array.0, i32 0, i32 2",
            "store i32 3, ptr %elem.3",
            "%elem.4 = getelementptr inbounds [3 x i32], ptr %array.0, i32 0, i32 0",
            "store i32 9, ptr %elem.4",
            "%elem.5 = getelementptr inbounds [3 x i32], ptr %array.0, i32 0, i32 0",
            "%a.6 = load i32, ptr %elem.5",
            "call i32 (ptr, ...) @printf(ptr @.fmt.int, i32 %a.6)",
            "ret i32 0",
        ]);
    }

    #[test]
    fn array_variables_alias_their_buffer() {
        let module = lower("a = [5]; b = a; b[0] = 6; print a[0];").expect("codegen");
        let lines = body(&module, "main");
        assert_eq!(lines.iter().filter(|line| line.contains("alloca")).count(), 1);
    }

    #[test]
    fn element_assignment_requires_an_existing_array() {
        let err = lower("b[0] = 1;").unwrap_err();
        assert_eq!(err, CodegenError::UndefinedVariable("b".to_string()));

        let err = lower("n = 1; n[0] = 1;").unwrap_err();
        assert_eq!(err, CodegenError::NotAnArray("n".to_string()));
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = lower("print y;").unwrap_err();
        assert_eq!(err, CodegenError::UndefinedVariable("y".to_string()));
    }

    #[test]
    fn lowers_function_with_print_on_return() {
        let source = indoc! {"
            func add(a, b) {
                return a + b;
            }
            print add(2, 3);
        "};
        let module = lower(source).expect("codegen");
        assert_eq!(module.function("add").map(|f| f.params.clone()), Some(vec![
            "a.0".to_string(),
            "b.2".to_string()
        ]));
        assert_eq!(body(&module, "add"), vec![
            "%a.addr.1 = alloca i32",
            "store i32 %a.0, ptr %a.addr.1",
            "%b.addr.3 = alloca i32",
            "store i32 %b.2, ptr %b.addr.3",
            "%a.4 = load i32, ptr %a.addr.1",
            "%b.5 = load i32, ptr %b.addr.3",
            "%add.6 = add i32 %a.4, %b.5",
            "call i32 (ptr, ...) @printf(ptr @.fmt.int, i32 %add.6)",
            "ret i32 %add.6",
        ]);
        assert_eq!(body(&module, "main"), vec![
            "%call.0 = call i32 @add(i32 2, i32 3)",
            "call i32 (ptr, ...) @printf(ptr @.fmt.int, i32 %call.0)",
            "ret i32 0",
        ]);
    }

    #[test]
    fn print_on_return_can_be_disabled() {
        let options = CodegenOptions {
            print_on_return: false,
            ..CodegenOptions::default()
        };
        let module = lower_with("func one() { return 1; }", &options).expect("codegen");
        assert_eq!(body(&module, "one"), vec!["ret i32 1"]);
    }

    #[test]
    fn functions_get_an_implicit_return_zero() {
        let module = lower("func noop(x) { y = x; }").expect("codegen");
        let function = module.function("noop").expect("noop");
        assert_eq!(
            function.blocks.last().and_then(|block| block.instrs.last()),
            Some(&Instr::Ret(Operand::Const(0)))
        );
    }

    #[test]
    fn function_bodies_do_not_see_caller_variables() {
        let err = lower("x = 1; func f() { return x; }").unwrap_err();
        assert_eq!(err, CodegenError::UndefinedVariable("x".to_string()));
    }

    #[test]
    fn caller_variables_survive_a_function_definition() {
        let module = lower("x = 1; func f(x) { x = 2; } print x;").expect("codegen");
        assert!(body(&module, "main").contains(&"%x.addr.0 = alloca i32".to_string()));
        assert_eq!(module.functions.last().map(|f| f.name.as_str()), Some("main"));
    }

    #[test]
    fn recursive_calls_resolve() {
        assert!(lower("func loop(n) { return loop(n - 1); }").is_ok());
    }

    #[test]
    fn calls_must_follow_the_definition() {
        let err = lower("print later(); func later() { return 1; }").unwrap_err();
        assert_eq!(err, CodegenError::UndefinedFunction("later".to_string()));
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let err = lower("func f(a) { return a; } f(1, 2)").unwrap_err();
        assert_eq!(err, CodegenError::ArityMismatch {
            name: "f".to_string(),
            expected: 1,
            found: 2,
        });
    }

    #[test]
    fn rejects_duplicate_and_reserved_function_names() {
        let err = lower("func f() {} func f() {}").unwrap_err();
        assert_eq!(err, CodegenError::DuplicateFunction("f".to_string()));
        let err = lower("func printf() {}").unwrap_err();
        assert_eq!(err, CodegenError::DuplicateFunction("printf".to_string()));
    }

    #[test]
    fn string_prints_get_numbered_globals() {
        let module = lower("print \"a\"; print \"100%\"; \"unused\";").expect("codegen");
        assert_eq!(module.strings, vec![
            StringConstant::new(".str.0", b"a"),
            StringConstant::new(".str.1", b"100%%"),
        ]);
        assert_eq!(body(&module, "main"), vec![
            "call i32 (ptr, ...) @printf(ptr @.str.0)",
            "call i32 (ptr, ...) @printf(ptr @.str.1)",
            "ret i32 0",
        ]);
    }

    #[test]
    fn strings_are_not_integers() {
        let err = lower("x = \"text\";").unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedValue { found: "string", .. }));
        let err = lower("print 1 + \"a\"").unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedValue { found: "string", .. }));
        let err = lower("a = [1]; print a").unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedValue { found: "array", .. }));
    }

    #[test]
    fn lowers_input() {
        let module = lower("n = input();").expect("codegen");
        assert_eq!(body(&module, "main")[..3].to_vec(), vec![
            "%input.0 = alloca i32",
            "call i32 (ptr, ...) @scanf(ptr @.fmt.scan, ptr %input.0)",
            "%input.1 = load i32, ptr %input.0",
        ]);
    }

    #[test]
    fn division_by_literal_zero_is_left_to_the_runtime() {
        let module = lower("print 1 / 0").expect("codegen");
        assert_eq!(body(&module, "main")[0], "%sdiv.0 = sdiv i32 1, 0");
    }

    #[test]
    fn statements_after_return_land_in_a_dead_block() {
        let options = CodegenOptions {
            print_on_return: false,
            ..CodegenOptions::default()
        };
        let module = lower_with("return 3; print 4;", &options).expect("codegen");
        let main = module.function("main").expect("main");
        assert_eq!(main.blocks.len(), 2);
        assert_eq!(main.blocks[0].instrs, vec![Instr::Ret(Operand::Const(3))]);
        assert_eq!(main.blocks[1].instrs.last(), Some(&Instr::Ret(Operand::Const(0))));
    }
}
