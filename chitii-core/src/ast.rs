/// Arithmetic operators on 32-bit signed integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i32),
    Str(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Var(String),
    Array(Vec<Expr>),
    /// `name[index]`; the base is always a bare identifier.
    Index { name: String, index: Box<Expr> },
    Call { name: String, args: Vec<Expr> },
    /// The built-in `input()`.
    Input,
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    Name(String),
    Element { name: String, index: Expr },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Expr(Expr),
    Assign { target: AssignTarget, value: Expr },
    Function(FunctionDef),
    Return(Expr),
    /// `print "text"`: the literal is written out verbatim.
    PrintStr(String),
    PrintExpr(Expr),
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn is_call(&self, name: &str) -> bool {
        matches!(self, Expr::Call { name: n, .. } if n == name)
    }
}
