use crate::ast::{Expr, Stmt};

impl Expr {
    /// Fully parenthesized debug form, e.g. `(* (- 123) (group 45.67))`.
    pub fn print(&self) -> String {
        match self {
            Expr::Assign { name, value } => {
                parenthesize(&format!("= {}", name.lexeme), &[value.as_ref()])
            }
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => parenthesize(&operator.lexeme, &[left.as_ref(), right.as_ref()]),
            Expr::Call {
                callee, arguments, ..
            } => {
                let mut exprs = vec![callee.as_ref()];
                exprs.extend(arguments);
                parenthesize("call", &exprs)
            }
            Expr::Grouping { expression } => parenthesize("group", &[expression.as_ref()]),
            Expr::Literal { value } => value.to_string(),
            Expr::Unary { operator, right } => parenthesize(&operator.lexeme, &[right.as_ref()]),
            Expr::Variable { name } => name.lexeme.clone(),
        }
    }
}

impl Stmt {
    pub fn print(&self) -> String {
        match self {
            Stmt::Block(statements) => {
                let mut rst = String::from("(block");
                for stmt in statements {
                    rst.push(' ');
                    rst.push_str(&stmt.print());
                }
                rst.push(')');
                rst
            }
            Stmt::Expression(expr) => parenthesize(";", &[expr]),
            Stmt::Function(decl) => {
                let params = decl
                    .parameters
                    .iter()
                    .map(|p| p.lexeme.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let mut rst = format!("(fun {} ({params})", decl.name.lexeme);
                for stmt in &decl.body {
                    rst.push(' ');
                    rst.push_str(&stmt.print());
                }
                rst.push(')');
                rst
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    condition.print(),
                    then_branch.print(),
                    else_branch.print()
                ),
                None => format!("(if {} {})", condition.print(), then_branch.print()),
            },
            Stmt::Print(expr) => parenthesize("print", &[expr]),
            Stmt::Return { value, .. } => match value {
                Some(value) => parenthesize("return", &[value]),
                None => "(return)".to_string(),
            },
            Stmt::Var { name, initializer } => match initializer {
                Some(init) => parenthesize(&format!("var {}", name.lexeme), &[init]),
                None => format!("(var {})", name.lexeme),
            },
            Stmt::While { condition, body } => {
                format!("(while {} {})", condition.print(), body.print())
            }
        }
    }
}

fn parenthesize(name: &str, exprs: &[&Expr]) -> String {
    let mut rst = String::new();
    rst.push('(');
    rst.push_str(name);
    for expr in exprs {
        rst.push(' ');
        rst.push_str(&expr.print());
    }
    rst.push(')');
    rst
}
