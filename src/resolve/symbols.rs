use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::error::ResolveError;
use crate::ir::{Builtin, IrType, MAIN_FUNCTION};
use crate::parser::ast::{AstFunction, AstTypeKind};
use crate::parser::lexer::Span;
use crate::resolve::typed::FnRef;

pub(crate) fn lower_type(kind: AstTypeKind) -> IrType {
    match kind {
        AstTypeKind::Scalar => IrType::Scalar,
        AstTypeKind::Matrix => IrType::Matrix,
        AstTypeKind::Bool => IrType::Bool,
    }
}

/// The declared interface of a user function.
#[derive(Debug, Clone)]
pub struct Signature {
    pub func: FnRef,
    pub name: String,
    pub params: Vec<(String, IrType)>,
    pub returns: Vec<IrType>,
    pub span: Span,
}

/// Every user function signature, keyed by name in definition order.
///
/// Built once before any body is resolved so that calls may refer to
/// functions defined later in the file (and to themselves).
#[derive(Debug, Default)]
pub struct FunctionTable {
    sigs: IndexMap<String, Signature>,
}

impl FunctionTable {
    pub fn build(functions: &[AstFunction]) -> Result<Self, ResolveError> {
        let mut sigs = IndexMap::new();
        for (idx, f) in functions.iter().enumerate() {
            let name = &f.name.name;
            if sigs.contains_key(name)
                || Builtin::from_name(name).is_some()
                || name == MAIN_FUNCTION
            {
                return Err(ResolveError::DuplicateFunction {
                    name: name.clone(),
                    span: f.name.span,
                });
            }
            let sig = Signature {
                func: FnRef(idx),
                name: name.clone(),
                params: f
                    .params
                    .iter()
                    .map(|p| (p.name.name.clone(), lower_type(p.ty.kind)))
                    .collect(),
                returns: f.returns.iter().map(|t| lower_type(t.kind)).collect(),
                span: f.span,
            };
            sigs.insert(name.clone(), sig);
        }
        Ok(Self { sigs })
    }

    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.sigs.get(name)
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

/// Variable bindings visible at one program point.
///
/// Tables are never mutated in place: `bind` returns a new table, and each
/// statement hands its successor the table it produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    vars: BTreeMap<String, IrType>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bind(&self, name: &str, ty: IrType) -> SymbolTable {
        let mut vars = self.vars.clone();
        vars.insert(name.to_owned(), ty);
        SymbolTable { vars }
    }

    #[must_use]
    pub fn unbind(&self, name: &str) -> SymbolTable {
        let mut vars = self.vars.clone();
        vars.remove(name);
        SymbolTable { vars }
    }

    pub fn lookup(&self, name: &str) -> Option<IrType> {
        self.vars.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, IrType)> + '_ {
        self.vars.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
