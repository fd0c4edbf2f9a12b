use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::error::{Error, SyntaxError};
use crate::interp::Interp;
use crate::printer;
use crate::value::{EnvSp, NodeId, NodeRef, Obj};

//===----------------------------------------------------------------------===//
// Primitive table
//
// Process-wide constant mapping reserved names to handlers. Dispatch
// consults the table before the environment, so these names cannot be
// shadowed by user definitions. Each handler receives the whole call pair
// and decides for itself whether to evaluate its operands.
//===----------------------------------------------------------------------===//

pub(crate) type PrimitiveFn = fn(&mut Interp, NodeId, EnvSp) -> Result<NodeRef, Error>;

static PRIMITIVES: Lazy<FxHashMap<&'static str, PrimitiveFn>> = Lazy::new(|| {
    let mut table: FxHashMap<&'static str, PrimitiveFn> = FxHashMap::default();
    // Special forms.
    table.insert("set!", form_set);
    table.insert("set-car!", form_set_car);
    table.insert("set-cdr!", form_set_cdr);
    table.insert("define", form_define);
    table.insert("lambda", form_lambda);
    table.insert("if", form_if);
    table.insert("begin", form_begin);
    table.insert("cond", form_cond);
    table.insert("quote", form_quote);
    // Applicative primitives.
    table.insert("cons", prim_cons);
    table.insert("car", prim_car);
    table.insert("cdr", prim_cdr);
    table.insert("append", prim_append);
    table.insert("display", prim_display);
    table.insert("print", prim_print);
    table.insert("eval", prim_eval);
    table.insert("boolean?", prim_boolean_p);
    table.insert("number?", prim_number_p);
    table.insert("char?", prim_char_p);
    table.insert("string?", prim_string_p);
    table.insert("+", prim_add);
    table.insert("-", prim_sub);
    table.insert("*", prim_mul);
    table.insert("/", prim_div);
    table.insert("=", prim_num_eq);
    table.insert(">", prim_gt);
    table.insert("<", prim_lt);
    table.insert(">=", prim_ge);
    table.insert("<=", prim_le);
    table
});

/// Whether `name` is reserved by the primitive table.
pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains_key(name)
}

//===----------------------------------------------------------------------===//
// Evaluator
//===----------------------------------------------------------------------===//

impl Interp {
    /// Evaluate one node in the environment at `sp`.
    ///
    /// Booleans, numbers, characters, strings, and functions evaluate to
    /// themselves; symbols resolve in the environment; a pair is a call,
    /// dispatched on its head. Anything else is invalid syntax.
    pub(crate) fn eval(&mut self, node: NodeRef, sp: EnvSp) -> Result<NodeRef, Error> {
        let Some(id) = node else {
            return Err(invalid_syntax(0));
        };
        let line = self.arena.line(id);

        match self.arena.obj(id).clone() {
            Obj::Bool(_) | Obj::Number(_) | Obj::Char(_) | Obj::Str(_) | Obj::Func { .. } => {
                Ok(Some(id))
            }
            Obj::Symbol(name) => self
                .env
                .lookup(&self.arena, sp, &name)
                .ok_or(Error::SymbolNotFound { line, name }),
            Obj::Pair { head, .. } => match head {
                Some(h) if self.arena.obj(h).as_symbol().is_some() => {
                    self.eval_call(id, h, sp)
                }
                Some(h) if self.arena.obj(h).is_pair() => {
                    // ((lambda ...) args ...): the head evaluates to the callee.
                    let func = self.eval(Some(h), sp)?;
                    self.apply(func, id, sp, line)
                }
                _ => Err(invalid_syntax(line)),
            },
        }
    }

    /// Call with a symbol head: primitive table first, then the
    /// environment, which must yield a function.
    fn eval_call(&mut self, call: NodeId, head: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
        let name = match self.arena.obj(head) {
            Obj::Symbol(name) => name.clone(),
            other => unreachable!("call head is not a symbol ({})", other.type_name()),
        };

        if let Some(handler) = PRIMITIVES.get(name.as_str()).copied() {
            return handler(self, call, sp);
        }

        let line = self.arena.line(call);
        let func = self
            .env
            .lookup(&self.arena, sp, &name)
            .ok_or_else(|| Error::SymbolNotFound { line, name })?;
        self.apply(func, call, sp, line)
    }

    /// Apply a user-defined function: evaluate the operands left-to-right
    /// in the caller's environment, push a frame over the function's
    /// captured environment, and run the body as a sequence.
    fn apply(
        &mut self,
        func: NodeRef,
        call: NodeId,
        sp: EnvSp,
        line: u64,
    ) -> Result<NodeRef, Error> {
        let (params, body, captured) = match func.map(|id| self.arena.obj(id)) {
            Some(Obj::Func { params, body, env }) => (*params, *body, *env),
            other => {
                return Err(Error::TypeMismatch {
                    line,
                    expected: "function",
                    found: other.map(Obj::type_name).unwrap_or("nil"),
                });
            }
        };

        let operands = self.arena.list_items(self.arena.tail(call));
        let expected = self.arena.list_len(params);
        if operands.len() != expected {
            return Err(Error::Syntax(SyntaxError::CallArity {
                line,
                expected,
                given: operands.len(),
            }));
        }

        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            values.push(self.eval(operand, sp)?);
        }

        let mut args: NodeRef = None;
        for value in values.into_iter().rev() {
            args = Some(self.arena.alloc_cons(value, args)?);
        }

        let new_sp = self
            .env
            .push(&mut self.arena, params, args, captured)
            .map_err(|e| e.at(line))?;
        let result = self.eval_sequence(body, new_sp);
        self.env.pop();
        result
    }

    /// Evaluate each element of a pair-list in order and return the last
    /// value; nil for an empty list. This is the `begin` rule, also used
    /// for top-level programs, function bodies, and cond clause bodies.
    pub(crate) fn eval_sequence(&mut self, list: NodeRef, sp: EnvSp) -> Result<NodeRef, Error> {
        let mut result: NodeRef = None;
        let mut cur = list;
        while let Some(id) = cur {
            let (head, tail) = match self.arena.obj(id) {
                Obj::Pair { head, tail } => (*head, *tail),
                _ => return Err(invalid_syntax(self.arena.line(id))),
            };
            result = self.eval(head, sp)?;
            cur = tail;
        }
        Ok(result)
    }

    //===------------------------------------------------------------------===//
    // Operand helpers
    //===------------------------------------------------------------------===//

    /// Operand references of a call with an exact-arity check.
    fn operands(
        &self,
        call: NodeId,
        count: usize,
        form: &'static str,
    ) -> Result<Vec<NodeRef>, Error> {
        let ops = self.arena.list_items(self.arena.tail(call));
        if ops.len() != count {
            return Err(Error::Syntax(SyntaxError::Arity {
                line: self.arena.line(call),
                form,
            }));
        }
        Ok(ops)
    }

    fn type_of(&self, node: NodeRef) -> &'static str {
        node.map(|id| self.arena.obj(id).type_name()).unwrap_or("nil")
    }

    /// Evaluate an operand that must yield a number.
    fn eval_number(&mut self, node: NodeRef, sp: EnvSp) -> Result<f64, Error> {
        let line = node.map(|id| self.arena.line(id)).unwrap_or(0);
        let value = self.eval(node, sp)?;
        match value.map(|id| self.arena.obj(id)) {
            Some(Obj::Number(n)) => Ok(*n),
            other => Err(Error::TypeMismatch {
                line,
                expected: "number",
                found: other.map(Obj::type_name).unwrap_or("nil"),
            }),
        }
    }

    /// Evaluate an operand that must yield a boolean.
    fn eval_boolean(&mut self, node: NodeRef, sp: EnvSp, line: u64) -> Result<bool, Error> {
        let value = self.eval(node, sp)?;
        match value.map(|id| self.arena.obj(id)) {
            Some(Obj::Bool(b)) => Ok(*b),
            other => Err(Error::TypeMismatch {
                line,
                expected: "boolean",
                found: other.map(Obj::type_name).unwrap_or("nil"),
            }),
        }
    }

    /// An operand that must be a symbol node, unevaluated.
    fn symbol_operand(&self, node: NodeRef, line: u64) -> Result<NodeId, Error> {
        match node {
            Some(id) if self.arena.obj(id).as_symbol().is_some() => Ok(id),
            other => Err(Error::TypeMismatch {
                line,
                expected: "symbol",
                found: self.type_of(other),
            }),
        }
    }

    fn alloc_bool(&mut self, value: bool, line: u64) -> Result<NodeRef, Error> {
        Ok(Some(self.arena.alloc_atom(Obj::Bool(value), line)?))
    }

    fn alloc_number(&mut self, value: f64, line: u64) -> Result<NodeRef, Error> {
        Ok(Some(self.arena.alloc_atom(Obj::Number(value), line)?))
    }
}

fn invalid_syntax(line: u64) -> Error {
    Error::Syntax(SyntaxError::Malformed { line, message: "invalid syntax".to_string() })
}

//===----------------------------------------------------------------------===//
// Special forms
//===----------------------------------------------------------------------===//

/// `(set! name value)`: overwrite an existing binding; the name is not
/// evaluated. Returns nil.
fn form_set(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "set!")?;
    let symbol = interp.symbol_operand(ops[0], line)?;
    let name = match interp.arena.obj(symbol) {
        Obj::Symbol(name) => name.clone(),
        _ => unreachable!(),
    };
    let value = interp.eval(ops[1], sp)?;
    interp.env.set(&mut interp.arena, sp, &name, value).map_err(|e| e.at(line))?;
    Ok(None)
}

/// `(set-car! pair value)`: both operands evaluated; the first must be a
/// pair. The overwrite is visible through every alias of the cell.
fn form_set_car(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "set-car!")?;
    let target = interp.eval(ops[0], sp)?;
    let value = interp.eval(ops[1], sp)?;

    match target {
        Some(pair) if interp.arena.obj(pair).is_pair() => {
            interp.arena.set_head(pair, value);
            interp.alloc_bool(true, line)
        }
        other => Err(Error::TypeMismatch {
            line,
            expected: "pair",
            found: interp.type_of(other),
        }),
    }
}

/// `(set-cdr! pair value)`: symmetric to `set-car!`.
fn form_set_cdr(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "set-cdr!")?;
    let target = interp.eval(ops[0], sp)?;
    let value = interp.eval(ops[1], sp)?;

    match target {
        Some(pair) if interp.arena.obj(pair).is_pair() => {
            interp.arena.set_tail(pair, value);
            interp.alloc_bool(true, line)
        }
        other => Err(Error::TypeMismatch {
            line,
            expected: "pair",
            found: interp.type_of(other),
        }),
    }
}

/// `(define name value)`: prepend a binding to the innermost frame; the
/// name is not evaluated. Returns nil.
fn form_define(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "define")?;
    let symbol = interp.symbol_operand(ops[0], line)?;
    let value = interp.eval(ops[1], sp)?;
    interp.env.define(&mut interp.arena, sp, symbol, value)?;
    Ok(None)
}

/// `(lambda (params ...) body ...)`: construct a function closing over the
/// current environment index. The parameter list is unevaluated and must
/// be nil or a proper list of symbols; at least one body form is required.
fn form_lambda(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let arity = || Error::Syntax(SyntaxError::Arity { line, form: "lambda" });

    let Some(params_cell) = interp.arena.tail(call) else {
        return Err(arity());
    };
    let params = interp.arena.head(params_cell);
    let body = interp.arena.tail(params_cell);
    if body.is_none() {
        return Err(arity());
    }

    if !interp.arena.is_proper_list(params)
        || interp
            .arena
            .list_items(params)
            .iter()
            .any(|p| p.map(|id| interp.arena.obj(id).as_symbol().is_none()).unwrap_or(true))
    {
        return Err(Error::Syntax(SyntaxError::Malformed {
            line,
            message: "lambda parameters must be a list of symbols".to_string(),
        }));
    }

    Ok(Some(interp.arena.alloc_func(params, body, sp, line)?))
}

/// `(if test consequent alternate)`: the test must yield a boolean; only
/// the chosen branch is evaluated. Exactly three operands.
fn form_if(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 3, "if")?;
    if interp.eval_boolean(ops[0], sp, line)? {
        interp.eval(ops[1], sp)
    } else {
        interp.eval(ops[2], sp)
    }
}

/// `(begin form ...)`: at least one form; evaluate in order, return the last.
fn form_begin(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let body = interp.arena.tail(call);
    if body.is_none() {
        return Err(Error::Syntax(SyntaxError::Arity {
            line: interp.arena.line(call),
            form: "begin",
        }));
    }
    interp.eval_sequence(body, sp)
}

/// `(cond (test body ...) ...)`: clauses in order; a test that is the symbol
/// `else` always takes its clause; other tests must yield booleans. With
/// no matching clause the result is nil.
fn form_cond(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let mut clause_cell = interp.arena.tail(call);
    if clause_cell.is_none() {
        return Err(Error::Syntax(SyntaxError::Arity { line, form: "cond" }));
    }

    while let Some(cell) = clause_cell {
        let (clause, rest) = match interp.arena.obj(cell) {
            Obj::Pair { head, tail } => (*head, *tail),
            _ => return Err(invalid_syntax(interp.arena.line(cell))),
        };

        let clause_id = match clause {
            Some(id) if interp.arena.obj(id).is_pair() => id,
            other => {
                return Err(Error::Syntax(SyntaxError::Malformed {
                    line: other.map(|id| interp.arena.line(id)).unwrap_or(line),
                    message: "cond clause must be a list".to_string(),
                }));
            }
        };
        let test = interp.arena.head(clause_id);
        let body = interp.arena.tail(clause_id);
        let clause_line = interp.arena.line(clause_id);

        let is_else =
            test.map(|id| interp.arena.obj(id).as_symbol() == Some("else")).unwrap_or(false);
        if is_else || interp.eval_boolean(test, sp, clause_line)? {
            return interp.eval_sequence(body, sp);
        }
        clause_cell = rest;
    }

    Ok(None)
}

/// `(quote form)`: the operand, unevaluated.
fn form_quote(interp: &mut Interp, call: NodeId, _sp: EnvSp) -> Result<NodeRef, Error> {
    let ops = interp.operands(call, 1, "quote")?;
    Ok(ops[0])
}

//===----------------------------------------------------------------------===//
// Applicative primitives
//===----------------------------------------------------------------------===//

fn prim_cons(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "cons")?;
    let head = interp.eval(ops[0], sp)?;
    let tail = interp.eval(ops[1], sp)?;
    Ok(Some(interp.arena.alloc_pair(head, tail, line)?))
}

fn prim_car(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 1, "car")?;
    let value = interp.eval(ops[0], sp)?;
    match value {
        Some(id) if interp.arena.obj(id).is_pair() => Ok(interp.arena.head(id)),
        other => Err(Error::TypeMismatch {
            line,
            expected: "pair",
            found: interp.type_of(other),
        }),
    }
}

fn prim_cdr(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 1, "cdr")?;
    let value = interp.eval(ops[0], sp)?;
    match value {
        Some(id) if interp.arena.obj(id).is_pair() => Ok(interp.arena.tail(id)),
        other => Err(Error::TypeMismatch {
            line,
            expected: "pair",
            found: interp.type_of(other),
        }),
    }
}

/// `(append list tail)`: destructive: walks the first operand, which must
/// be a proper list, and overwrites its terminal pair's tail. Returns the
/// first list.
fn prim_append(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "append")?;
    let first = interp.eval(ops[0], sp)?;
    let second = interp.eval(ops[1], sp)?;

    let Some(first_id) = first else {
        return Err(Error::TypeMismatch { line, expected: "list", found: "nil" });
    };
    if !interp.arena.obj(first_id).is_pair() {
        return Err(Error::TypeMismatch {
            line,
            expected: "list",
            found: interp.arena.obj(first_id).type_name(),
        });
    }

    let mut last = first_id;
    loop {
        match interp.arena.tail(last) {
            None => break,
            Some(next) if interp.arena.obj(next).is_pair() => last = next,
            Some(next) => {
                return Err(Error::TypeMismatch {
                    line,
                    expected: "list",
                    found: interp.arena.obj(next).type_name(),
                });
            }
        }
    }
    interp.arena.set_tail(last, second);
    Ok(first)
}

fn display_inner(
    interp: &mut Interp,
    call: NodeId,
    sp: EnvSp,
    form: &'static str,
    newline: bool,
) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 1, form)?;
    let value = interp.eval(ops[0], sp)?;
    printer::print_node(&interp.arena, value, newline, interp.sink.as_mut());
    interp.alloc_bool(true, line)
}

fn prim_display(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    display_inner(interp, call, sp, "display", true)
}

fn prim_print(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    display_inner(interp, call, sp, "print", false)
}

/// `(eval form)`: evaluate the operand, then evaluate its result.
fn prim_eval(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let ops = interp.operands(call, 1, "eval")?;
    let once = interp.eval(ops[0], sp)?;
    interp.eval(once, sp)
}

//===----------------------------------------------------------------------===//
// Type predicates
//
// The operand is evaluated and the resulting variant inspected.
//===----------------------------------------------------------------------===//

fn pred_inner(
    interp: &mut Interp,
    call: NodeId,
    sp: EnvSp,
    form: &'static str,
    matches: fn(&Obj) -> bool,
) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 1, form)?;
    let value = interp.eval(ops[0], sp)?;
    let result = value.map(|id| matches(interp.arena.obj(id))).unwrap_or(false);
    interp.alloc_bool(result, line)
}

fn prim_boolean_p(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    pred_inner(interp, call, sp, "boolean?", |obj| matches!(obj, Obj::Bool(_)))
}

fn prim_number_p(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    pred_inner(interp, call, sp, "number?", |obj| matches!(obj, Obj::Number(_)))
}

fn prim_char_p(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    pred_inner(interp, call, sp, "char?", |obj| matches!(obj, Obj::Char(_)))
}

fn prim_string_p(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    pred_inner(interp, call, sp, "string?", |obj| matches!(obj, Obj::Str(_)))
}

//===----------------------------------------------------------------------===//
// Arithmetic and comparison
//===----------------------------------------------------------------------===//

/// `(+ n ...)`: fold with identity 0; every operand must be a number.
fn prim_add(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.arena.list_items(interp.arena.tail(call));
    let mut sum = 0.0;
    for op in ops {
        sum += interp.eval_number(op, sp)?;
    }
    interp.alloc_number(sum, line)
}

/// `(* n ...)`: fold with identity 1.
fn prim_mul(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.arena.list_items(interp.arena.tail(call));
    let mut product = 1.0;
    for op in ops {
        product *= interp.eval_number(op, sp)?;
    }
    interp.alloc_number(product, line)
}

fn prim_sub(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "-")?;
    let a = interp.eval_number(ops[0], sp)?;
    let b = interp.eval_number(ops[1], sp)?;
    interp.alloc_number(a - b, line)
}

/// Division follows IEEE-754; dividing by zero yields an infinity or NaN.
fn prim_div(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, "/")?;
    let a = interp.eval_number(ops[0], sp)?;
    let b = interp.eval_number(ops[1], sp)?;
    interp.alloc_number(a / b, line)
}

#[derive(Clone, Copy)]
enum CmpOp {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
}

fn cmp_inner(
    interp: &mut Interp,
    call: NodeId,
    sp: EnvSp,
    form: &'static str,
    op: CmpOp,
) -> Result<NodeRef, Error> {
    let line = interp.arena.line(call);
    let ops = interp.operands(call, 2, form)?;
    let a = interp.eval_number(ops[0], sp)?;
    let b = interp.eval_number(ops[1], sp)?;
    let result = match op {
        CmpOp::Eq => a == b,
        CmpOp::Gt => a > b,
        CmpOp::Lt => a < b,
        CmpOp::Ge => a >= b,
        CmpOp::Le => a <= b,
    };
    interp.alloc_bool(result, line)
}

fn prim_num_eq(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    cmp_inner(interp, call, sp, "=", CmpOp::Eq)
}

fn prim_gt(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    cmp_inner(interp, call, sp, ">", CmpOp::Gt)
}

fn prim_lt(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    cmp_inner(interp, call, sp, "<", CmpOp::Lt)
}

fn prim_ge(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    cmp_inner(interp, call, sp, ">=", CmpOp::Ge)
}

fn prim_le(interp: &mut Interp, call: NodeId, sp: EnvSp) -> Result<NodeRef, Error> {
    cmp_inner(interp, call, sp, "<=", CmpOp::Le)
}
