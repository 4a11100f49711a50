//! Dependency extraction: which identifiers an expression reads.

use std::collections::BTreeSet;

use crate::ast::Expr;

/// Distinct identifier names appearing anywhere in `expr`.
pub fn identifiers(expr: &Expr) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect(expr, &mut names);
    names
}

fn collect(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Identifier(name) => {
            names.insert(name.clone());
        }
        Expr::Literal(_) => {}
        Expr::Unary { operand, .. } => collect(operand, names),
        Expr::Binary { left, right, .. } => {
            collect(left, names);
            collect(right, names);
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            collect(test, names);
            collect(consequent, names);
            collect(alternate, names);
        }
    }
}

impl Expr {
    /// See [`identifiers`].
    pub fn identifiers(&self) -> BTreeSet<String> {
        identifiers(self)
    }
}
