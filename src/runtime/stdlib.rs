//! Core operator library
//!
//! The functions behind the operator sugar, registered through signature
//! descriptions like any other library. Numeric operands are promoted
//! Integer, then Rational, then Float, to the wider of the two. Failures
//! such as division by zero come back as Error cells.

use super::binder::Args;
use super::cell::{Cell, List, StreamHandle};
use super::diagnostics::Diagnostic;
use super::executor::Machine;
use super::rational::Rational;
use super::signature::{parse_literal, FuncFlags};
use std::cmp::Ordering;

type Resolver = fn(&mut Machine, &mut Args) -> Cell;

const LISTABLE: FuncFlags = FuncFlags::LISTABLE;
const PLAIN: FuncFlags = FuncFlags::empty();

const DIVISION_BY_ZERO: &str = "Error: Division by zero";
const OVERFLOW: &str = "Error: Integer overflow";
const OUT_OF_RANGE: &str = "Error: Subscript out of range";

#[rustfmt::skip]
const LIBRARY: &[(&[&str], FuncFlags, Resolver)] = &[
    (&["Plus[x->NUMBER, y->NUMBER] =: NUMBER"], LISTABLE, plus),
    (&["Plus[x->TEXT, y->TEXT] =: TEXT"], PLAIN, plus),
    (&["Minus[x->NUMBER, y->NUMBER] =: NUMBER"], LISTABLE, minus),
    (&["Times[x->NUMBER, y->NUMBER] =: NUMBER"], LISTABLE, times),
    (&["Divide[x->NUMBER, y->NUMBER] =: NUMBER"], LISTABLE, divide),
    (&["Power[x->NUMBER, y->NUMBER] =: NUMBER"], LISTABLE, power),
    (&["IntegerDivide[x->INTEGER, y->INTEGER] =: INTEGER"], LISTABLE, integer_divide),
    (&["Modulus[x->INTEGER, y->INTEGER] =: INTEGER"], LISTABLE, modulus),
    (&["Negate[x->NUMBER] =: NUMBER"], LISTABLE, negate),
    (&["Equal[x->ANY, y->ANY] =: BOOLEAN"], PLAIN, equal),
    (&["NotEqual[x->ANY, y->ANY] =: BOOLEAN"], PLAIN, not_equal),
    (&["Less[x->NUMBER, y->NUMBER] =: BOOLEAN"], LISTABLE, less),
    (&["Less[x->TEXT, y->TEXT] =: BOOLEAN"], PLAIN, less),
    (&["Greater[x->NUMBER, y->NUMBER] =: BOOLEAN"], LISTABLE, greater),
    (&["Greater[x->TEXT, y->TEXT] =: BOOLEAN"], PLAIN, greater),
    (&["LessEqual[x->NUMBER, y->NUMBER] =: BOOLEAN"], LISTABLE, less_equal),
    (&["LessEqual[x->TEXT, y->TEXT] =: BOOLEAN"], PLAIN, less_equal),
    (&["GreaterEqual[x->NUMBER, y->NUMBER] =: BOOLEAN"], LISTABLE, greater_equal),
    (&["GreaterEqual[x->TEXT, y->TEXT] =: BOOLEAN"], PLAIN, greater_equal),
    (&["And[x->BOOLEAN, y->BOOLEAN] =: BOOLEAN"], LISTABLE, and),
    (&["Or[x->BOOLEAN, y->BOOLEAN] =: BOOLEAN"], LISTABLE, or),
    (&["Not[x->BOOLEAN] =: BOOLEAN"], LISTABLE, not),
    (&["Concat[x->TEXT, y->TEXT] =: TEXT", "Concat[x->LIST(ANY), y->LIST(ANY)] =: LIST(ANY)"], PLAIN, concat),
    (&["Length[list->LIST(ANY)] =: INTEGER", "Length[text->TEXT] =: INTEGER"], PLAIN, length),
    (&["NthElement[list->LIST(ANY), n->INTEGER] =: ANY"], PLAIN, nth_element),
    (&["NthChar[text->TEXT, n->INTEGER] =: TEXT"], PLAIN, nth_char),
    (&["Assign[x<->ANY, y->ANY] =: ANY"], PLAIN, assign),
    (&["Write[output->OUTPUT, x->ANY] =: OUTPUT"], PLAIN, write),
    (&["Read[input->INPUT, x<->ANY] =: INPUT"], PLAIN, read),
];

/// Register every core function into `machine`
pub fn install(machine: &mut Machine) {
    for (descriptions, flags, resolver) in LIBRARY {
        if let Err(err) = machine.register(descriptions, *flags, *resolver) {
            tracing::error!(%err, "core library signature rejected");
        }
    }
}

// =============================================================================
// Numbers
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Rat(Rational),
    Float(f64),
}

impl Num {
    fn of(cell: &Cell) -> Option<Num> {
        match cell {
            Cell::Integer(i) => Some(Num::Int(*i)),
            Cell::Rational(q) => Some(Num::Rat(*q)),
            Cell::Float(x) => Some(Num::Float(*x)),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Num::Int(_) => 0,
            Num::Rat(_) => 1,
            Num::Float(_) => 2,
        }
    }

    fn promote(self, rank: u8) -> Num {
        match (self, rank) {
            (Num::Int(i), 1) => Num::Rat(Rational::integer(i)),
            (Num::Int(i), 2) => Num::Float(i as f64),
            (Num::Rat(q), 2) => Num::Float(q.to_f64()),
            (n, _) => n,
        }
    }
}

/// Both operands at the wider of their two ranks
fn operands(args: &Args) -> Option<(Num, Num)> {
    let a = Num::of(args.get(0)?)?;
    let b = Num::of(args.get(1)?)?;
    let rank = a.rank().max(b.rank());
    Some((a.promote(rank), b.promote(rank)))
}

fn checked(result: Option<Cell>, failure: &str) -> Cell {
    result.unwrap_or_else(|| Cell::error(failure))
}

fn arithmetic(
    args: &Args,
    int: fn(i64, i64) -> Option<i64>,
    rat: fn(Rational, Rational) -> Option<Rational>,
    float: fn(f64, f64) -> f64,
) -> Cell {
    match operands(args) {
        Some((Num::Int(a), Num::Int(b))) => checked(int(a, b).map(Cell::Integer), OVERFLOW),
        Some((Num::Rat(a), Num::Rat(b))) => checked(rat(a, b).map(Cell::Rational), OVERFLOW),
        Some((Num::Float(a), Num::Float(b))) => Cell::Float(float(a, b)),
        _ => Cell::error("Error: Numeric operands expected"),
    }
}

fn plus(_: &mut Machine, args: &mut Args) -> Cell {
    if let (Some(a), Some(b)) = (args.text(0), args.text(1)) {
        return Cell::text(&format!("{a}{b}"));
    }
    arithmetic(args, i64::checked_add, Rational::checked_add, |a, b| a + b)
}

fn minus(_: &mut Machine, args: &mut Args) -> Cell {
    arithmetic(args, i64::checked_sub, Rational::checked_sub, |a, b| a - b)
}

fn times(_: &mut Machine, args: &mut Args) -> Cell {
    arithmetic(args, i64::checked_mul, Rational::checked_mul, |a, b| a * b)
}

fn divide(_: &mut Machine, args: &mut Args) -> Cell {
    match operands(args) {
        Some((Num::Int(_), Num::Int(0))) => Cell::error(DIVISION_BY_ZERO),
        Some((Num::Int(a), Num::Int(b))) => checked(Rational::new(a, b).map(Cell::Rational), OVERFLOW),
        Some((Num::Rat(_), Num::Rat(b))) if b.is_zero() => Cell::error(DIVISION_BY_ZERO),
        Some((Num::Rat(a), Num::Rat(b))) => checked(a.checked_div(b).map(Cell::Rational), OVERFLOW),
        Some((Num::Float(_), Num::Float(b))) if b == 0.0 => Cell::error(DIVISION_BY_ZERO),
        Some((Num::Float(a), Num::Float(b))) => Cell::Float(a / b),
        _ => Cell::error("Error: Numeric operands expected"),
    }
}

fn power(_: &mut Machine, args: &mut Args) -> Cell {
    match operands(args) {
        Some((Num::Int(0), Num::Int(b))) if b < 0 => Cell::error(DIVISION_BY_ZERO),
        Some((Num::Int(a), Num::Int(b))) if b >= 0 => checked(
            u32::try_from(b).ok().and_then(|e| a.checked_pow(e)).map(Cell::Integer),
            OVERFLOW,
        ),
        Some((Num::Int(a), Num::Int(b))) => {
            checked(Rational::integer(a).checked_pow(b).map(Cell::Rational), OVERFLOW)
        }
        Some((Num::Rat(a), Num::Rat(b))) if b.is_integer() => {
            if a.is_zero() && b.numerator() < 0 {
                return Cell::error(DIVISION_BY_ZERO);
            }
            checked(a.checked_pow(b.numerator()).map(Cell::Rational), OVERFLOW)
        }
        Some((Num::Rat(a), Num::Rat(b))) => Cell::Float(a.to_f64().powf(b.to_f64())),
        Some((Num::Float(a), Num::Float(b))) => Cell::Float(a.powf(b)),
        _ => Cell::error("Error: Numeric operands expected"),
    }
}

fn integer_operands(args: &Args) -> Option<(i64, i64)> {
    Some((args.integer(0)?, args.integer(1)?))
}

fn integer_divide(_: &mut Machine, args: &mut Args) -> Cell {
    match integer_operands(args) {
        Some((_, 0)) => Cell::error(DIVISION_BY_ZERO),
        Some((a, b)) => checked(a.checked_div(b).map(Cell::Integer), OVERFLOW),
        None => Cell::error("Error: Integer operands expected"),
    }
}

fn modulus(_: &mut Machine, args: &mut Args) -> Cell {
    match integer_operands(args) {
        Some((_, 0)) => Cell::error(DIVISION_BY_ZERO),
        Some((a, b)) => checked(a.checked_rem(b).map(Cell::Integer), OVERFLOW),
        None => Cell::error("Error: Integer operands expected"),
    }
}

fn negate(_: &mut Machine, args: &mut Args) -> Cell {
    match args.get(0).and_then(Num::of) {
        Some(Num::Int(i)) => checked(i.checked_neg().map(Cell::Integer), OVERFLOW),
        Some(Num::Rat(q)) => checked(q.checked_neg().map(Cell::Rational), OVERFLOW),
        Some(Num::Float(x)) => Cell::Float(-x),
        None => Cell::error("Error: Numeric operand expected"),
    }
}

// =============================================================================
// Comparison and logic
// =============================================================================

fn compare(a: &Cell, b: &Cell) -> Option<Ordering> {
    if let (Cell::Text(a), Cell::Text(b)) = (a, b) {
        return Some(a.cmp(b));
    }
    let (a, b) = (Num::of(a)?, Num::of(b)?);
    let rank = a.rank().max(b.rank());
    match (a.promote(rank), b.promote(rank)) {
        (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
        (Num::Rat(a), Num::Rat(b)) => Some(a.cmp(&b)),
        (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
        _ => None,
    }
}

/// Structural equality; numbers compare by value across numeric types
fn values_equal(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Cell::List(a), Cell::List(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y)),
        _ if Num::of(a).is_some() && Num::of(b).is_some() => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn ordering(args: &Args, test: fn(Ordering) -> bool) -> Cell {
    match (args.get(0), args.get(1)) {
        (Some(a), Some(b)) => Cell::Boolean(compare(a, b).is_some_and(test)),
        _ => Cell::error("Error: Comparable operands expected"),
    }
}

fn equal(_: &mut Machine, args: &mut Args) -> Cell {
    Cell::Boolean(values_equal(&args[0], &args[1]))
}

fn not_equal(_: &mut Machine, args: &mut Args) -> Cell {
    Cell::Boolean(!values_equal(&args[0], &args[1]))
}

fn less(_: &mut Machine, args: &mut Args) -> Cell {
    ordering(args, Ordering::is_lt)
}

fn greater(_: &mut Machine, args: &mut Args) -> Cell {
    ordering(args, Ordering::is_gt)
}

fn less_equal(_: &mut Machine, args: &mut Args) -> Cell {
    ordering(args, Ordering::is_le)
}

fn greater_equal(_: &mut Machine, args: &mut Args) -> Cell {
    ordering(args, Ordering::is_ge)
}

fn and(_: &mut Machine, args: &mut Args) -> Cell {
    match (args.boolean(0), args.boolean(1)) {
        (Some(a), Some(b)) => Cell::Boolean(a && b),
        _ => Cell::error("Error: Boolean operands expected"),
    }
}

fn or(_: &mut Machine, args: &mut Args) -> Cell {
    match (args.boolean(0), args.boolean(1)) {
        (Some(a), Some(b)) => Cell::Boolean(a || b),
        _ => Cell::error("Error: Boolean operands expected"),
    }
}

fn not(_: &mut Machine, args: &mut Args) -> Cell {
    match args.boolean(0) {
        Some(a) => Cell::Boolean(!a),
        None => Cell::error("Error: Boolean operand expected"),
    }
}

// =============================================================================
// Text and lists
// =============================================================================

fn concat(machine: &mut Machine, args: &mut Args) -> Cell {
    match (&args[0], &args[1]) {
        (Cell::Text(a), Cell::Text(b)) => Cell::text(&format!("{a}{b}")),
        (Cell::List(a), Cell::List(b)) => {
            let mut joined = List::new();
            for item in a.iter().chain(b.iter()) {
                if joined.push(item.value_copy()).is_err() {
                    machine.report(Diagnostic::MixedListTypes);
                    return Cell::error(Diagnostic::MixedListTypes.to_string());
                }
            }
            Cell::List(joined)
        }
        _ => Cell::error("Error: Text or list operands expected"),
    }
}

fn length(_: &mut Machine, args: &mut Args) -> Cell {
    match &args[0] {
        Cell::List(list) => Cell::Integer(list.len() as i64),
        Cell::Text(text) => Cell::Integer(text.chars().count() as i64),
        _ => Cell::error("Error: Text or list operand expected"),
    }
}

/// Convert a 1-based script index to a 0-based one
fn index(n: i64) -> Option<usize> {
    usize::try_from(n).ok()?.checked_sub(1)
}

fn nth_element(_: &mut Machine, args: &mut Args) -> Cell {
    let element = match (&args[0], args.integer(1).and_then(index)) {
        (Cell::List(list), Some(i)) => list.get(i).map(Cell::value_copy),
        _ => None,
    };
    element.unwrap_or_else(|| Cell::error(OUT_OF_RANGE))
}

fn nth_char(_: &mut Machine, args: &mut Args) -> Cell {
    let ch = match (args.text(0), args.integer(1).and_then(index)) {
        (Some(text), Some(i)) => text.chars().nth(i),
        _ => None,
    };
    match ch {
        Some(ch) => Cell::text(ch.encode_utf8(&mut [0; 4])),
        None => Cell::error(OUT_OF_RANGE),
    }
}

// =============================================================================
// Assignment and streams
// =============================================================================

fn assign(_: &mut Machine, args: &mut Args) -> Cell {
    let Some(value) = args.take(1) else {
        return Cell::error("Error: Nothing to assign");
    };
    args.set(0, value.value_copy());
    value
}

fn write(machine: &mut Machine, args: &mut Args) -> Cell {
    let Cell::Stream(stream) = args[0] else {
        return Cell::error("Error: Output stream expected");
    };
    let text = match &args[1] {
        Cell::Text(text) => text.to_string(),
        other => other.to_string(),
    };
    match machine.write_stream(stream, &text) {
        Ok(()) => Cell::Stream(stream),
        Err(err) => Cell::error(format!("Error: Write failed: {err}")),
    }
}

fn read(machine: &mut Machine, args: &mut Args) -> Cell {
    match machine.read_line() {
        Ok(Some(line)) => {
            let cell = parse_literal(&line).unwrap_or_else(|| Cell::text(&line));
            args.set(1, cell);
            Cell::Stream(StreamHandle::Input)
        }
        Ok(None) => Cell::error("Error: End of input"),
        Err(err) => Cell::error(format!("Error: Read failed: {err}")),
    }
}
