//! In-memory LLVM IR and its textual rendering.
//!
//! Only the small slice of LLVM needed by the code generator is
//! modelled: `i32` scalars, stack arrays of `i32`, byte-string
//! constants, and straight-line functions. Pointers use the opaque
//! `ptr` type, so the output targets LLVM 15 or newer.

use core::fmt;

use crate::ast::BinaryOp;

/// Name of the formatted-output routine the module declares.
pub const PRINTF: &str = "printf";
/// Name of the formatted-input routine the module declares.
pub const SCANF: &str = "scanf";
/// Name of the entry routine.
pub const ENTRY: &str = "main";

pub const FMT_INT: &str = ".fmt.int";
pub const FMT_SCAN: &str = ".fmt.scan";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    I32,
    Ptr,
    /// `[N x i32]`
    IntArray(usize),
    /// `[N x i8]`
    Bytes(usize),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I32 => f.write_str("i32"),
            Type::Ptr => f.write_str("ptr"),
            Type::IntArray(len) => write!(f, "[{len} x i32]"),
            Type::Bytes(len) => write!(f, "[{len} x i8]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Const(i32),
    Local(String),
    Global(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(value) => write!(f, "{value}"),
            Operand::Local(name) => write!(f, "%{name}"),
            Operand::Global(name) => write!(f, "@{name}"),
        }
    }
}

/// Call target. Variadic callees are printed with their explicit
/// function type, as LLVM requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Direct(String),
    /// A `(ptr, ...)` routine from the C runtime.
    Variadic(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Alloca {
        dest: String,
        ty: Type,
    },
    Load {
        dest: String,
        ptr: Operand,
    },
    Store {
        value: Operand,
        ptr: Operand,
    },
    Binary {
        dest: String,
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    /// Address of element `index` of a `[len x i32]` buffer.
    ElementPtr {
        dest: String,
        len: usize,
        base: Operand,
        index: Operand,
    },
    Call {
        dest: Option<String>,
        callee: Callee,
        args: Vec<(Type, Operand)>,
    },
    Ret(Operand),
}

impl Instr {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Ret(_))
    }
}

fn mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "sdiv",
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Alloca { dest, ty } => write!(f, "%{dest} = alloca {ty}"),
            Instr::Load { dest, ptr } => write!(f, "%{dest} = load i32, ptr {ptr}"),
            Instr::Store { value, ptr } => write!(f, "store i32 {value}, ptr {ptr}"),
            Instr::Binary { dest, op, lhs, rhs } => {
                write!(f, "%{dest} = {} i32 {lhs}, {rhs}", mnemonic(*op))
            }
            Instr::ElementPtr {
                dest,
                len,
                base,
                index,
            } => write!(
                f,
                "%{dest} = getelementptr inbounds {}, ptr {base}, i32 0, i32 {index}",
                Type::IntArray(*len)
            ),
            Instr::Call { dest, callee, args } => {
                if let Some(dest) = dest {
                    write!(f, "%{dest} = ")?;
                }
                match callee {
                    Callee::Direct(name) => write!(f, "call i32 @{name}(")?,
                    Callee::Variadic(name) => write!(f, "call i32 (ptr, ...) @{name}(")?,
                }
                for (i, (ty, arg)) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty} {arg}")?;
                }
                f.write_str(")")
            }
            Instr::Ret(value) => write!(f, "ret i32 {value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub label: String,
    pub instrs: Vec<Instr>,
}

/// A function taking `params.len()` `i32` arguments and returning `i32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub blocks: Vec<Block>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "define i32 @{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "i32 %{param}")?;
        }
        f.write_str(") {\n")?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for instr in &block.instrs {
                writeln!(f, "  {instr}")?;
            }
        }
        f.write_str("}\n")
    }
}

/// Emits instructions into one function body.
///
/// Every SSA name handed out is `hint.N` with a per-function counter,
/// so names never clash with each other or with source identifiers.
/// Instructions pushed after a terminator open a fresh block that has
/// no predecessors.
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    params: Vec<String>,
    blocks: Vec<Block>,
    next_value: usize,
    terminated: bool,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionBuilder {
            name: name.into(),
            params: Vec::new(),
            blocks: vec![Block {
                label: "entry".to_string(),
                instrs: Vec::new(),
            }],
            next_value: 0,
            terminated: false,
        }
    }

    pub fn fresh(&mut self, hint: &str) -> String {
        let name = format!("{hint}.{}", self.next_value);
        self.next_value += 1;
        name
    }

    pub fn add_param(&mut self, hint: &str) -> Operand {
        let name = self.fresh(hint);
        self.params.push(name.clone());
        Operand::Local(name)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn push(&mut self, instr: Instr) {
        if self.terminated {
            let label = self.fresh("dead");
            self.blocks.push(Block {
                label,
                instrs: Vec::new(),
            });
            self.terminated = false;
        }
        self.terminated = instr.is_terminator();
        if let Some(block) = self.blocks.last_mut() {
            block.instrs.push(instr);
        }
    }

    pub fn alloca(&mut self, ty: Type, hint: &str) -> Operand {
        let dest = self.fresh(hint);
        self.push(Instr::Alloca {
            dest: dest.clone(),
            ty,
        });
        Operand::Local(dest)
    }

    pub fn load(&mut self, ptr: Operand, hint: &str) -> Operand {
        let dest = self.fresh(hint);
        self.push(Instr::Load {
            dest: dest.clone(),
            ptr,
        });
        Operand::Local(dest)
    }

    pub fn store(&mut self, value: Operand, ptr: Operand) {
        self.push(Instr::Store { value, ptr });
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand) -> Operand {
        let dest = self.fresh(mnemonic(op));
        self.push(Instr::Binary {
            dest: dest.clone(),
            op,
            lhs,
            rhs,
        });
        Operand::Local(dest)
    }

    pub fn element_ptr(&mut self, len: usize, base: Operand, index: Operand) -> Operand {
        let dest = self.fresh("elem");
        self.push(Instr::ElementPtr {
            dest: dest.clone(),
            len,
            base,
            index,
        });
        Operand::Local(dest)
    }

    pub fn call(&mut self, callee: Callee, args: Vec<(Type, Operand)>) -> Operand {
        let dest = self.fresh("call");
        self.push(Instr::Call {
            dest: Some(dest.clone()),
            callee,
            args,
        });
        Operand::Local(dest)
    }

    /// Call whose result is discarded.
    pub fn call_void(&mut self, callee: Callee, args: Vec<(Type, Operand)>) {
        self.push(Instr::Call {
            dest: None,
            callee,
            args,
        });
    }

    pub fn ret(&mut self, value: Operand) {
        self.push(Instr::Ret(value));
    }

    /// Close the body, returning 0 when control can fall off its end.
    pub fn finish(mut self) -> Function {
        if !self.terminated {
            self.ret(Operand::Const(0));
        }
        Function {
            name: self.name,
            params: self.params,
            blocks: self.blocks,
        }
    }
}

/// A read-only, NUL-terminated byte string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringConstant {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl StringConstant {
    pub fn new(name: impl Into<String>, text: &[u8]) -> Self {
        let mut bytes = text.to_vec();
        bytes.push(0);
        StringConstant {
            name: name.into(),
            bytes,
        }
    }
}

impl fmt::Display for StringConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{} = internal constant {} c\"",
            self.name,
            Type::Bytes(self.bytes.len())
        )?;
        for &byte in &self.bytes {
            if byte == b' ' || (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\{byte:02X}")?;
            }
        }
        f.write_str("\"")
    }
}

/// A complete output module: runtime declarations, format strings,
/// printed literals and functions, the entry routine last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub target_triple: Option<String>,
    pub strings: Vec<StringConstant>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = \"{}\"", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;
        if let Some(triple) = &self.target_triple {
            writeln!(f, "target triple = \"{triple}\"")?;
        }
        f.write_str("\n")?;
        writeln!(f, "{}", StringConstant::new(FMT_INT, b"%d\n"))?;
        writeln!(f, "{}", StringConstant::new(FMT_SCAN, b"%d"))?;
        for string in &self.strings {
            writeln!(f, "{string}")?;
        }
        f.write_str("\n")?;
        writeln!(f, "declare i32 @{PRINTF}(ptr, ...)")?;
        writeln!(f, "declare i32 @{SCANF}(ptr, ...)")?;
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
