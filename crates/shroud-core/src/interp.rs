use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ast::{
    BinaryOp, BoolOp, CompareOp, Expression, FunctionDef, Literal, Program, Statement, UnaryOp,
};

/// Tree-walking evaluator for the obfuscator's source language.
///
/// This exists so semantic preservation is checkable: the test suite runs a
/// program before and after obfuscation and compares observable behavior.
/// The CLI exposes the same check behind `--verify`.
pub struct Interpreter {
    globals: FxHashMap<String, Value>,
    locals: Vec<FxHashMap<String, Value>>,
    output: Vec<String>,
    fuel: u64,
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Int(i64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Range(i64, i64, i64),
    Function(Rc<FunctionDef>),
    Lambda(Rc<LambdaValue>),
    Builtin(Builtin),
}

#[derive(Debug)]
pub struct LambdaValue {
    pub params: Vec<String>,
    pub body: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Range,
    Len,
    Ord,
    Chr,
    Int,
    Str,
    Print,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("name {0:?} is not defined")]
    NameError(String),
    #[error("unsupported operation: {0}")]
    TypeError(String),
    #[error("integer division or modulo by zero")]
    DivisionByZero,
    #[error("shift amount out of range")]
    ShiftRange,
    #[error("index out of range")]
    IndexError,
    #[error("key not found")]
    KeyError,
    #[error("{0}() takes a different number of arguments")]
    ArityError(&'static str),
    #[error("invalid literal for int(): {0:?}")]
    ValueError(String),
    #[error("evaluation fuel exhausted")]
    FuelExhausted,
    #[error("unsupported construct: {0}")]
    Unsupported(&'static str),
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

const DEFAULT_FUEL: u64 = 50_000_000;

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            globals: FxHashMap::default(),
            locals: Vec::new(),
            output: Vec::new(),
            fuel: DEFAULT_FUEL,
        }
    }

    pub fn with_fuel(fuel: u64) -> Self {
        Interpreter {
            fuel,
            ..Self::new()
        }
    }

    /// Run a whole program. Lines printed via `print` are collected in
    /// [`Interpreter::output`]; global bindings survive for inspection.
    pub fn run(&mut self, program: &Program) -> Result<(), EvalError> {
        match self.exec_block(&program.body)? {
            Flow::Normal | Flow::Return(_) => Ok(()),
            Flow::Break | Flow::Continue => Err(EvalError::Unsupported(
                "break/continue outside of a loop",
            )),
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn globals(&self) -> &FxHashMap<String, Value> {
        &self.globals
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    fn burn(&mut self) -> Result<(), EvalError> {
        if self.fuel == 0 {
            return Err(EvalError::FuelExhausted);
        }
        self.fuel -= 1;
        Ok(())
    }

    fn exec_block(&mut self, body: &[Statement]) -> Result<Flow, EvalError> {
        for stmt in body {
            match self.exec_statement(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(&mut self, stmt: &Statement) -> Result<Flow, EvalError> {
        self.burn()?;
        match stmt {
            Statement::Assign(assign) => {
                let value = self.eval(&assign.value)?;
                self.bind(&assign.target, value);
                Ok(Flow::Normal)
            }
            Statement::AugAssign(assign) => {
                let current = self.lookup(&assign.target)?;
                let rhs = self.eval(&assign.value)?;
                let value = binary(assign.op, &current, &rhs)?;
                self.bind(&assign.target, value);
                Ok(Flow::Normal)
            }
            Statement::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Statement::If(if_stmt) => {
                let test = self.eval(&if_stmt.test)?;
                if truthy(&test) {
                    self.exec_block(&if_stmt.body)
                } else {
                    self.exec_block(&if_stmt.orelse)
                }
            }
            Statement::While(while_stmt) => {
                loop {
                    self.burn()?;
                    let test = self.eval(&while_stmt.test)?;
                    if !truthy(&test) {
                        break;
                    }
                    match self.exec_block(&while_stmt.body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::For(for_stmt) => {
                let iterable = self.eval(&for_stmt.iter)?;
                let items = iterate(&iterable)?;
                for item in items {
                    self.burn()?;
                    self.bind(&for_stmt.target, item);
                    match self.exec_block(&for_stmt.body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::FunctionDef(func) => {
                self.bind(&func.name, Value::Function(Rc::new(func.clone())));
                Ok(Flow::Normal)
            }
            Statement::ClassDef(_) => Err(EvalError::Unsupported("class definitions")),
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),
            Statement::Pass => Ok(Flow::Normal),
        }
    }

    /// Write-through binding: an existing binding in the current frame or in
    /// the globals is updated in place; otherwise the name is created in the
    /// innermost scope. Injected scratch updates inside functions therefore
    /// hit the program-top declarations instead of shadowing them.
    fn bind(&mut self, name: &str, value: Value) {
        match self.locals.last_mut() {
            Some(frame) if frame.contains_key(name) || !self.globals.contains_key(name) => {
                frame.insert(name.to_string(), value);
            }
            _ => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(frame) = self.locals.last() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        builtin_named(name)
            .map(Value::Builtin)
            .ok_or_else(|| EvalError::NameError(name.to_string()))
    }

    fn eval(&mut self, expr: &Expression) -> Result<Value, EvalError> {
        self.burn()?;
        match expr {
            Expression::Name(name) => self.lookup(name),
            Expression::Literal(lit) => Ok(match lit {
                Literal::Int(v) => Value::Int(*v),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::None => Value::None,
            }),
            Expression::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(*op, &l, &r)
            }
            Expression::Unary { op, operand } => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => match v {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Bool(b) => Ok(Value::Int(-(b as i64))),
                        _ => Err(EvalError::TypeError("unary minus on non-integer".into())),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
                }
            }
            Expression::Bool { op, values } => {
                // Short-circuit; result is an operand value, not a bool.
                let mut last = Value::None;
                for (i, value) in values.iter().enumerate() {
                    last = self.eval(value)?;
                    let done = match op {
                        BoolOp::And => !truthy(&last),
                        BoolOp::Or => truthy(&last),
                    };
                    if done && i + 1 < values.len() {
                        return Ok(last);
                    }
                    if done {
                        return Ok(last);
                    }
                }
                Ok(last)
            }
            Expression::Compare { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                compare(*op, &l, &r)
            }
            Expression::Conditional { test, then, orelse } => {
                let test = self.eval(test)?;
                if truthy(&test) {
                    self.eval(then)
                } else {
                    self.eval(orelse)
                }
            }
            Expression::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call(callee, values)
            }
            Expression::Lambda { params, body } => Ok(Value::Lambda(Rc::new(LambdaValue {
                params: params.clone(),
                body: (**body).clone(),
            }))),
            Expression::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(values))
            }
            Expression::Dict(entries) => {
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    values.push((self.eval(key)?, self.eval(value)?));
                }
                Ok(Value::Dict(values))
            }
            Expression::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                index_value(&object, &index)
            }
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, EvalError> {
        match callee {
            Value::Function(func) => {
                if args.len() != func.params.len() {
                    return Err(EvalError::ArityError("function"));
                }
                let mut frame = FxHashMap::default();
                for (param, arg) in func.params.iter().zip(args) {
                    frame.insert(param.clone(), arg);
                }
                self.locals.push(frame);
                let flow = self.exec_block(&func.body);
                self.locals.pop();
                match flow? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::None),
                    Flow::Break | Flow::Continue => {
                        Err(EvalError::Unsupported("break/continue outside of a loop"))
                    }
                }
            }
            Value::Lambda(lambda) => {
                if args.len() != lambda.params.len() {
                    return Err(EvalError::ArityError("lambda"));
                }
                let mut frame = FxHashMap::default();
                for (param, arg) in lambda.params.iter().zip(args) {
                    frame.insert(param.clone(), arg);
                }
                self.locals.push(frame);
                let result = self.eval(&lambda.body);
                self.locals.pop();
                result
            }
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            _ => Err(EvalError::TypeError("value is not callable".into())),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, EvalError> {
        match builtin {
            Builtin::Range => {
                let ints: Vec<i64> = args
                    .iter()
                    .map(|v| match v {
                        Value::Int(n) => Ok(*n),
                        Value::Bool(b) => Ok(*b as i64),
                        _ => Err(EvalError::TypeError("range() expects integers".into())),
                    })
                    .collect::<Result<_, _>>()?;
                match ints.as_slice() {
                    [stop] => Ok(Value::Range(0, *stop, 1)),
                    [start, stop] => Ok(Value::Range(*start, *stop, 1)),
                    [start, stop, step] if *step != 0 => Ok(Value::Range(*start, *stop, *step)),
                    [_, _, _] => Err(EvalError::TypeError("range() step must not be zero".into())),
                    _ => Err(EvalError::ArityError("range")),
                }
            }
            Builtin::Len => match args.as_slice() {
                [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
                [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
                [Value::Dict(entries)] => Ok(Value::Int(entries.len() as i64)),
                [_] => Err(EvalError::TypeError("len() of unsized value".into())),
                _ => Err(EvalError::ArityError("len")),
            },
            Builtin::Ord => match args.as_slice() {
                [Value::Str(s)] => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Ok(Value::Int(c as i64)),
                        _ => Err(EvalError::TypeError(
                            "ord() expects a single-character string".into(),
                        )),
                    }
                }
                [_] => Err(EvalError::TypeError("ord() expects a string".into())),
                _ => Err(EvalError::ArityError("ord")),
            },
            Builtin::Chr => match args.as_slice() {
                [Value::Int(n)] => {
                    let c = u32::try_from(*n)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| EvalError::ValueError(n.to_string()))?;
                    Ok(Value::Str(c.to_string()))
                }
                [_] => Err(EvalError::TypeError("chr() expects an integer".into())),
                _ => Err(EvalError::ArityError("chr")),
            },
            Builtin::Int => match args.as_slice() {
                [Value::Int(n)] => Ok(Value::Int(*n)),
                [Value::Bool(b)] => Ok(Value::Int(*b as i64)),
                [Value::Str(s)] => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| EvalError::ValueError(s.clone())),
                [_] => Err(EvalError::TypeError("int() of unsupported value".into())),
                _ => Err(EvalError::ArityError("int")),
            },
            Builtin::Str => match args.as_slice() {
                [value] => Ok(Value::Str(format_value(value))),
                _ => Err(EvalError::ArityError("str")),
            },
            Builtin::Print => {
                let line = args
                    .iter()
                    .map(format_value)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.output.push(line);
                Ok(Value::None)
            }
        }
    }
}

fn builtin_named(name: &str) -> Option<Builtin> {
    Some(match name {
        "range" => Builtin::Range,
        "len" => Builtin::Len,
        "ord" => Builtin::Ord,
        "chr" => Builtin::Chr,
        "int" => Builtin::Int,
        "str" => Builtin::Str,
        "print" => Builtin::Print,
        _ => return None,
    })
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::None => false,
        Value::Int(n) => *n != 0,
        Value::Bool(b) => *b,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Dict(entries) => !entries.is_empty(),
        Value::Range(start, stop, step) => {
            (*step > 0 && start < stop) || (*step < 0 && start > stop)
        }
        Value::Function(_) | Value::Lambda(_) | Value::Builtin(_) => true,
    }
}

/// Structural equality with Python's bool/int unification.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Bool(y)) | (Value::Bool(y), Value::Int(x)) => *x == *y as i64,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((ka, va), (kb, vb))| values_equal(ka, kb) && values_equal(va, vb))
        }
        (Value::Range(a1, a2, a3), Value::Range(b1, b2, b3)) => {
            a1 == b1 && a2 == b2 && a3 == b3
        }
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Lambda(x), Value::Lambda(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        _ => false,
    }
}

fn as_int(value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64),
        _ => Err(EvalError::TypeError("expected an integer".into())),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if op == BinaryOp::Add {
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => {
                let mut s = a.clone();
                s.push_str(b);
                return Ok(Value::Str(s));
            }
            (Value::List(a), Value::List(b)) => {
                let mut items = a.clone();
                items.extend(b.iter().cloned());
                return Ok(Value::List(items));
            }
            _ => {}
        }
    }
    let l = as_int(left)?;
    let r = as_int(right)?;
    let value = match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::FloorDiv => {
            if r == 0 {
                return Err(EvalError::DivisionByZero);
            }
            floor_div(l, r)
        }
        BinaryOp::Mod => {
            if r == 0 {
                return Err(EvalError::DivisionByZero);
            }
            floor_mod(l, r)
        }
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Shl => {
            if !(0..63).contains(&r) {
                return Err(EvalError::ShiftRange);
            }
            l.wrapping_shl(r as u32)
        }
        BinaryOp::Shr => {
            if !(0..63).contains(&r) {
                return Err(EvalError::ShiftRange);
            }
            l >> r
        }
    };
    Ok(Value::Int(value))
}

/// Python floor division: rounds toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Python modulo: result has the sign of the divisor.
pub fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let result = match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Lt => as_int(left)? < as_int(right)?,
        CompareOp::Le => as_int(left)? <= as_int(right)?,
        CompareOp::Gt => as_int(left)? > as_int(right)?,
        CompareOp::Ge => as_int(left)? >= as_int(right)?,
    };
    Ok(Value::Bool(result))
}

fn iterate(value: &Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::Range(start, stop, step) => {
            let mut items = Vec::new();
            let mut cur = *start;
            if *step > 0 {
                while cur < *stop {
                    items.push(Value::Int(cur));
                    cur += step;
                }
            } else {
                while cur > *stop {
                    items.push(Value::Int(cur));
                    cur += step;
                }
            }
            Ok(items)
        }
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        _ => Err(EvalError::TypeError("value is not iterable".into())),
    }
}

fn index_value(object: &Value, index: &Value) -> Result<Value, EvalError> {
    match object {
        Value::List(items) => {
            let i = normalize_index(as_int(index)?, items.len())?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(as_int(index)?, chars.len())?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Dict(entries) => entries
            .iter()
            .find(|(key, _)| values_equal(key, index))
            .map(|(_, value)| value.clone())
            .ok_or(EvalError::KeyError),
        _ => Err(EvalError::TypeError("value is not subscriptable".into())),
    }
}

fn normalize_index(index: i64, len: usize) -> Result<usize, EvalError> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) {
        Ok(i as usize)
    } else {
        Err(EvalError::IndexError)
    }
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::None => "None".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Str(s) => s.clone(),
        Value::List(items) => {
            let inner = items.iter().map(repr_value).collect::<Vec<_>>().join(", ");
            format!("[{inner}]")
        }
        Value::Dict(entries) => {
            let inner = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", repr_value(k), repr_value(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{inner}}}")
        }
        Value::Range(start, stop, step) => format!("range({start}, {stop}, {step})"),
        Value::Function(func) => format!("<function {}>", func.name),
        Value::Lambda(_) => "<lambda>".to_string(),
        Value::Builtin(_) => "<builtin>".to_string(),
    }
}

fn repr_value(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{s}'"),
        other => format_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    fn run(source: &str) -> Interpreter {
        let program = parse(source).unwrap();
        let mut interp = Interpreter::new();
        interp.run(&program).unwrap();
        interp
    }

    #[test]
    fn arithmetic_and_loops() {
        let interp = run(indoc! {"
            total = 0
            for i in range(5):
                total += i
            print(total)
        "});
        assert_eq!(interp.output(), ["10"]);
    }

    #[test]
    fn negative_step_range() {
        let interp = run(indoc! {"
            for i in range(10, 0, -2):
                print(i)
        "});
        assert_eq!(interp.output(), ["10", "8", "6", "4", "2"]);
    }

    #[test]
    fn functions_and_returns() {
        let interp = run(indoc! {"
            def add(a, b):
                return a + b
            print(add(2, 3))
        "});
        assert_eq!(interp.output(), ["5"]);
    }

    #[test]
    fn boolean_operators_return_operands() {
        let interp = run("x = 1 and 7\ny = 0 or 9\n");
        assert!(values_equal(interp.global("x").unwrap(), &Value::Int(7)));
        assert!(values_equal(interp.global("y").unwrap(), &Value::Int(9)));
    }

    #[test]
    fn floor_division_matches_python() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_mod(-7, 2), 1);
        assert_eq!(floor_mod(7, -2), -1);
    }

    #[test]
    fn assignment_writes_through_to_globals() {
        let interp = run(indoc! {"
            counter = 0
            def bump():
                counter = counter + 1
            bump()
            bump()
            print(counter)
        "});
        assert_eq!(interp.output(), ["2"]);
    }

    #[test]
    fn string_indexing_and_builtins() {
        let interp = run(indoc! {"
            s = 'abc'
            print(ord(s[1]))
            print(chr(100))
            print(len(s))
            print(int('42'))
        "});
        assert_eq!(interp.output(), ["98", "d", "3", "42"]);
    }

    #[test]
    fn fuel_limits_runaway_loops() {
        let program = parse("while True:\n    pass\n").unwrap();
        let mut interp = Interpreter::with_fuel(10_000);
        assert!(matches!(
            interp.run(&program),
            Err(EvalError::FuelExhausted)
        ));
    }
}
