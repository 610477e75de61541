use core::fmt;
use core::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::expression::Expression;
use crate::node::NodeKind;

#[derive(Clone, Debug, Default)]
pub struct StringTreeOptions<'a> {
    pub variable_names: Option<&'a [String]>,
}

pub fn default_string_variable(index: usize, names: Option<&[String]>) -> String {
    if let Some(name) = names.and_then(|names| names.get(index)) {
        return name.clone();
    }
    format!("x{index}")
}

fn string_vector(values: &[f64]) -> String {
    match values {
        [v] => v.to_string(),
        _ => {
            let parts: Vec<String> = values.iter().map(f64::to_string).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

fn strip_outer_parens(mut s: &str) -> &str {
    loop {
        let bytes = s.as_bytes();
        if bytes.len() < 2 || bytes[0] != b'(' || bytes[bytes.len() - 1] != b')' {
            return s;
        }

        let mut depth = 0i32;
        let mut encloses_all = false;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        encloses_all = i == bytes.len() - 1;
                        break;
                    }
                }
                _ => {}
            }
        }

        if encloses_all {
            s = &s[1..s.len() - 1];
            continue;
        }

        return s;
    }
}

enum OpStyle<'a> {
    Prefix(&'a str),
    Infix(&'a str),
    Call(&'a str),
}

fn combine(style: OpStyle<'_>, args: &[String]) -> String {
    match style {
        OpStyle::Prefix(tok) => {
            let a = strip_outer_parens(&args[0]);
            if a.contains(' ') {
                format!("{tok}({a})")
            } else {
                format!("{tok}{a}")
            }
        }
        OpStyle::Infix(tok) => format!("({} {} {})", args[0], tok, args[1]),
        OpStyle::Call(name) => {
            let inner: Vec<&str> = args.iter().map(|a| strip_outer_parens(a)).collect();
            format!("{name}({})", inner.join(", "))
        }
    }
}

fn style_of(kind: &NodeKind) -> OpStyle<'static> {
    match kind {
        NodeKind::Sum(..) => OpStyle::Infix("+"),
        NodeKind::Difference(..) => OpStyle::Infix("-"),
        NodeKind::Product { .. } => OpStyle::Infix("*"),
        NodeKind::Quotient { .. } => OpStyle::Infix("/"),
        NodeKind::Negation(_) => OpStyle::Prefix("-"),
        NodeKind::Dot(..) => OpStyle::Call("dot"),
        NodeKind::Cross(..) => OpStyle::Call("cross"),
        NodeKind::Norm(_) => OpStyle::Call("norm"),
        NodeKind::SquaredNorm(_) => OpStyle::Call("squared_norm"),
        NodeKind::Normalized(_) => OpStyle::Call("normalized"),
        NodeKind::SquareRoot(_) => OpStyle::Call("sqrt"),
        NodeKind::Sine(_) => OpStyle::Call("sin"),
        NodeKind::Cosine(_) => OpStyle::Call("cos"),
        NodeKind::Tangent(_) => OpStyle::Call("tan"),
        NodeKind::Arcsine(_) => OpStyle::Call("asin"),
        NodeKind::Arccosine(_) => OpStyle::Call("acos"),
        NodeKind::Exponential(_) => OpStyle::Call("exp"),
        NodeKind::Logarithm(_) => OpStyle::Call("log"),
        NodeKind::Power { .. } => OpStyle::Call("pow"),
        NodeKind::Concatenation(_) => OpStyle::Call("concat"),
        NodeKind::Composition { .. } => OpStyle::Call("compose"),
        NodeKind::Transformed { .. } => OpStyle::Call("transformed"),
        _ => OpStyle::Call("?"),
    }
}

fn string_node(
    expr: &Expression,
    opts: &StringTreeOptions<'_>,
    memo: &mut FxHashMap<usize, String>,
) -> String {
    if let Some(s) = memo.get(&expr.id()) {
        return s.clone();
    }
    let out = match expr.kind() {
        NodeKind::Constant { value } => string_vector(value),
        NodeKind::Parameter { index } => default_string_variable(*index, opts.variable_names),
        NodeKind::Identity => "x".to_string(),
        NodeKind::Linear { .. } => "linear(x)".to_string(),
        NodeKind::Elliptical { .. } => "elliptical(x)".to_string(),
        NodeKind::Scaled { scale, operand } => {
            let operand = string_node(operand, opts, memo);
            combine(OpStyle::Infix("*"), &[scale.to_string(), operand])
        }
        NodeKind::Transformed {
            operand,
            matrix,
            offset,
        } if matrix.dim() == (1, 1) => {
            let operand = string_node(operand, opts, memo);
            let (m, b) = (matrix[[0, 0]], offset[0]);
            let scaled = if m == 1.0 {
                operand
            } else {
                combine(OpStyle::Infix("*"), &[m.to_string(), operand])
            };
            if b == 0.0 {
                scaled
            } else if b < 0.0 {
                combine(OpStyle::Infix("-"), &[scaled, (-b).to_string()])
            } else {
                combine(OpStyle::Infix("+"), &[scaled, b.to_string()])
            }
        }
        NodeKind::Components { operand, start, count } => {
            let operand = string_node(operand, opts, memo);
            format!("{operand}[{start}..{}]", start + count)
        }
        NodeKind::Composition { outer, inner } => {
            // The outer expression reads its own parameters; render it with default names.
            let outer = string_node(outer, &StringTreeOptions::default(), &mut FxHashMap::default());
            let inner = string_node(inner, opts, memo);
            combine(OpStyle::Call("compose"), &[outer, inner])
        }
        kind => {
            let args: Vec<String> = kind
                .operands()
                .into_iter()
                .map(|operand| string_node(operand, opts, memo))
                .collect();
            combine(style_of(kind), &args)
        }
    };
    memo.insert(expr.id(), out.clone());
    out
}

/// Infix rendering, e.g. `sin(x0) + x1`.
pub fn string_tree(expr: &Expression, opts: StringTreeOptions<'_>) -> String {
    let mut memo = FxHashMap::default();
    strip_outer_parens(&string_node(expr, &opts, &mut memo)).to_string()
}

/// Indented dump with one `R{p} -> R{d} | Variant` line per node.
pub fn debug_tree(expr: &Expression) -> String {
    fn visit(expr: &Expression, indent: usize, out: &mut String) {
        let _ = writeln!(out, "{:indent$}{} | {}", "", expr.shape(), expr.kind().name(), indent = indent * 2);
        for operand in expr.kind().operands() {
            visit(operand, indent + 1, out);
        }
    }
    let mut out = String::new();
    visit(expr, 0, &mut out);
    out
}

pub fn print_tree(expr: &Expression) {
    println!("{}", string_tree(expr, StringTreeOptions::default()));
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&string_tree(self, StringTreeOptions::default()))
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expression({} | {self})", self.shape())
    }
}
