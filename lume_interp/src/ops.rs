use std::{cmp::Ordering, rc::Rc};

use lume_syntax::ast::{BinOp, LogicalOp};

use crate::{
    error::ErrorMsg,
    types::{format_number, Data, Value},
};

/// Which operand an operator error should point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blame {
    Lhs,
    Rhs,
    Both,
    /// The value being stored by an index write.
    Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OpError {
    pub msg: ErrorMsg,
    pub blame: Blame,
}

impl OpError {
    pub fn new(msg: ErrorMsg, blame: Blame) -> Self {
        Self { msg, blame }
    }
}

pub type OpResult<T> = Result<T, OpError>;

/// Position addressed by a checked index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    At(usize),
    /// One past the end, only valid for writes.
    Append,
}

fn illegal(lhs: &Value, rhs: &Value) -> OpError {
    OpError::new(
        ErrorMsg::IllegalOperation(lhs.type_name(), Some(rhs.type_name())),
        Blame::Both,
    )
}

pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    match op {
        BinOp::Plus => add(lhs, rhs),
        BinOp::Minus => subtract(lhs, rhs),
        BinOp::Star => multiply(lhs, rhs),
        BinOp::Slash | BinOp::Modulo => divide(op, lhs, rhs),
        BinOp::Equal => Ok(Value::boolean(equals(lhs, rhs))),
        BinOp::Different => Ok(Value::boolean(!equals(lhs, rhs))),
        BinOp::Less => compare(lhs, rhs).map(|o| Value::boolean(o == Ordering::Less)),
        BinOp::LessEqual => compare(lhs, rhs).map(|o| Value::boolean(o != Ordering::Greater)),
        BinOp::Greater => compare(lhs, rhs).map(|o| Value::boolean(o == Ordering::Greater)),
        BinOp::GreaterEqual => compare(lhs, rhs).map(|o| Value::boolean(o != Ordering::Less)),
    }
}

/// Both operands are always evaluated; only their truthiness matters.
pub fn logical(op: LogicalOp, lhs: &Value, rhs: &Value) -> Value {
    Value::boolean(match op {
        LogicalOp::And => lhs.is_true() && rhs.is_true(),
        LogicalOp::Or => lhs.is_true() || rhs.is_true(),
    })
}

pub fn negate(value: &Value) -> OpResult<Value> {
    multiply(value, &Value::number(-1.0)).map_err(|e| OpError::new(e.msg, Blame::Rhs))
}

fn add(lhs: &Value, rhs: &Value) -> OpResult<Value> {
    match (&lhs.data, &rhs.data) {
        (Data::Number(a), Data::Number(b)) => Ok(Value::number(a + b)),
        (Data::Char(c), Data::Number(n)) => shift_char(*c, *n),
        (Data::Char(c), Data::Str(s)) => {
            let mut bytes = vec![*c];
            bytes.extend_from_slice(s);
            Ok(Value::str(bytes))
        }
        (Data::Str(s), Data::Char(c)) => {
            let mut bytes = s.to_vec();
            bytes.push(*c);
            Ok(Value::str(bytes))
        }
        (Data::Str(a), Data::Str(b)) => Ok(Value::str([a.as_slice(), b.as_slice()].concat())),
        (Data::Str(s), Data::Number(_)) => match check_index(rhs, s.len(), false)? {
            Slot::At(i) => Ok(Value::str(s[i..].to_vec())),
            Slot::Append => Ok(Value::str(vec![])),
        },
        (Data::Array(a), Data::Array(b)) => Ok(Value::array([a.as_slice(), b.as_slice()].concat())),
        (Data::Array(items), _) => {
            let mut items = items.to_vec();
            items.push(rhs.clone().with_const(false));
            Ok(Value::array(items))
        }
        _ => Err(illegal(lhs, rhs)),
    }
}

fn subtract(lhs: &Value, rhs: &Value) -> OpResult<Value> {
    match (&lhs.data, &rhs.data) {
        (Data::Number(a), Data::Number(b)) => Ok(Value::number(a - b)),
        (Data::Char(c), Data::Number(n)) => shift_char(*c, -n),
        (Data::Array(items), _) => match check_index(rhs, items.len(), false)? {
            Slot::At(i) => {
                let mut items = items.to_vec();
                items.remove(i);
                Ok(Value::array(items))
            }
            Slot::Append => Ok(lhs.clone()),
        },
        (Data::Dict(entries), _) => {
            let key = dict_key(rhs)?;
            let mut entries = entries.as_ref().clone();
            entries.remove(&key);
            Ok(Value::dict(entries))
        }
        _ => Err(illegal(lhs, rhs)),
    }
}

fn multiply(lhs: &Value, rhs: &Value) -> OpResult<Value> {
    match (&lhs.data, &rhs.data) {
        (Data::Number(a), Data::Number(b)) => Ok(Value::number(a * b)),
        (Data::Char(c), Data::Number(n)) => Ok(Value::str(vec![*c; repeated_len(1, *n)?])),
        (Data::Str(s), Data::Number(n)) => {
            let len = repeated_len(s.len(), *n)?;
            Ok(Value::str(s.iter().copied().cycle().take(len).collect()))
        }
        (Data::Array(items), Data::Number(n)) => {
            let len = repeated_len(items.len(), *n)?;
            Ok(Value::array(items.iter().cycle().take(len).cloned().collect()))
        }
        _ => Err(illegal(lhs, rhs)),
    }
}

fn divide(op: BinOp, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    let (Data::Number(a), Data::Number(b)) = (&lhs.data, &rhs.data) else {
        return Err(illegal(lhs, rhs));
    };
    if *b == 0.0 {
        return Err(OpError::new(ErrorMsg::DivisionByZero, Blame::Rhs));
    }
    Ok(Value::number(if op == BinOp::Slash { a / b } else { a % b }))
}

/// Longest container a repetition may build.
pub const MAX_REPEATED_LEN: usize = i32::MAX as usize;

/// Length of `len` elements repeated `n` times. Fractional counts round
/// up, negative counts give nothing.
fn repeated_len(len: usize, n: f64) -> OpResult<usize> {
    let count = if n > 0.0 { n.ceil() as usize } else { 0 };
    len.checked_mul(count)
        .filter(|&total| total <= MAX_REPEATED_LEN)
        .ok_or_else(|| {
            OpError::new(
                ErrorMsg::OutOfBounds {
                    min: 0,
                    max: (MAX_REPEATED_LEN / len.max(1)) as i64,
                    found: format_number(n),
                },
                Blame::Rhs,
            )
        })
}

fn shift_char(c: u8, n: f64) -> OpResult<Value> {
    let shifted = f64::from(c) + n;
    if !(0.0..=255.0).contains(&shifted) {
        return Err(OpError::new(
            ErrorMsg::OutOfBounds {
                min: 0,
                max: 255,
                found: format_number(shifted),
            },
            Blame::Both,
        ));
    }
    Ok(Value::char(shifted as u8))
}

/// Same-typed values compare by their display text, so numbers are equal
/// when they print the same. Values of different types are never equal.
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (&lhs.data, &rhs.data) {
        (Data::Number(a), Data::Number(b)) => format_number(*a) == format_number(*b),
        (Data::Str(a), Data::Str(b)) => a == b,
        _ if lhs.type_name() == rhs.type_name() => lhs.to_string() == rhs.to_string(),
        _ => false,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> OpResult<Ordering> {
    match (&lhs.data, &rhs.data) {
        (Data::Number(a), Data::Number(b)) => {
            let (a, b) = (displayed(*a), displayed(*b));
            Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
        }
        (Data::Str(a), Data::Str(b)) => Ok(a.cmp(b)),
        (Data::Char(a), Data::Char(b)) => Ok(a.cmp(b)),
        _ if lhs.type_name() == rhs.type_name() => Ok(lhs.to_string().cmp(&rhs.to_string())),
        _ => Err(illegal(lhs, rhs)),
    }
}

fn displayed(n: f64) -> f64 {
    format_number(n).parse().unwrap_or(n)
}

/// Resolve `index` against a container of `len` elements. Negative
/// indices count from the end; writes may address one past the end.
pub fn check_index(index: &Value, len: usize, assign: bool) -> OpResult<Slot> {
    let Data::Number(n) = index.data else {
        return Err(OpError::new(ErrorMsg::Expected("NUMBER"), Blame::Rhs));
    };
    let (i, len) = (n.trunc() as i64, len as i64);
    let at = if i < 0 { i + len } else { i };
    if assign && at == len {
        return Ok(Slot::Append);
    }
    if len == 0 {
        return Err(OpError::new(ErrorMsg::EmptyContainer, Blame::Rhs));
    }
    if !(0..len).contains(&at) {
        return Err(OpError::new(
            ErrorMsg::OutOfBounds {
                min: -len,
                max: len - 1,
                found: format_number(n.trunc()),
            },
            Blame::Rhs,
        ));
    }
    Ok(Slot::At(at as usize))
}

/// Dictionary keys are stored under their quoted representation, so the
/// number `1`, the char `'1'` and the string `"1"` are distinct keys.
pub fn dict_key(key: &Value) -> OpResult<String> {
    match key.data {
        Data::Number(_) | Data::Char(_) | Data::Str(_) => Ok(key.repr()),
        _ => Err(OpError::new(
            ErrorMsg::Expected("NUMBER, CHAR, STRING"),
            Blame::Rhs,
        )),
    }
}

pub fn get_at_index(container: &Value, index: &Value) -> OpResult<Value> {
    match &container.data {
        Data::Array(items) => match check_index(index, items.len(), false)? {
            Slot::At(i) => Ok(items[i].clone()),
            Slot::Append => unreachable!("reads never resolve to an append slot"),
        },
        Data::Str(s) => match check_index(index, s.len(), false)? {
            Slot::At(i) => Ok(Value::char(s[i])),
            Slot::Append => unreachable!("reads never resolve to an append slot"),
        },
        Data::Dict(entries) => Ok(entries
            .get(&dict_key(index)?)
            .cloned()
            .unwrap_or(Value::NULL)),
        _ => Err(OpError::new(ErrorMsg::NonContainerIndex, Blame::Lhs)),
    }
}

/// Mutable access to an existing element, used to walk nested targets.
pub fn element_mut<'v>(container: &'v mut Value, index: &Value) -> OpResult<&'v mut Value> {
    match &mut container.data {
        Data::Array(items) => match check_index(index, items.len(), false)? {
            Slot::At(i) => Ok(&mut Rc::make_mut(items)[i]),
            Slot::Append => unreachable!("reads never resolve to an append slot"),
        },
        Data::Dict(entries) => {
            let key = dict_key(index)?;
            Rc::make_mut(entries)
                .get_mut(&key)
                .ok_or(OpError::new(ErrorMsg::NonContainerIndex, Blame::Rhs))
        }
        _ => Err(OpError::new(ErrorMsg::NonContainerIndex, Blame::Lhs)),
    }
}

pub fn set_at_index(container: &mut Value, index: &Value, value: Value) -> OpResult<()> {
    let is_const = container.is_const;
    let const_err = || OpError::new(ErrorMsg::IndexCannotBeConstant, Blame::Rhs);
    let value = value.with_const(false);
    match &mut container.data {
        Data::Array(items) => {
            let slot = check_index(index, items.len(), true)?;
            if is_const {
                return Err(const_err());
            }
            let items = Rc::make_mut(items);
            match slot {
                Slot::At(i) => items[i] = value,
                Slot::Append => items.push(value),
            }
        }
        Data::Str(s) => {
            let slot = check_index(index, s.len(), true)?;
            if is_const {
                return Err(const_err());
            }
            let Data::Char(c) = value.data else {
                return Err(OpError::new(ErrorMsg::Expected("CHAR"), Blame::Value));
            };
            let s = Rc::make_mut(s);
            match slot {
                Slot::At(i) => s[i] = c,
                Slot::Append => s.push(c),
            }
        }
        Data::Dict(entries) => {
            let key = dict_key(index)?;
            if is_const {
                return Err(const_err());
            }
            Rc::make_mut(entries).insert(key, value);
        }
        _ => return Err(OpError::new(ErrorMsg::NonContainerIndex, Blame::Lhs)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn num(n: f64) -> Value {
        Value::number(n)
    }

    fn arr(items: &[f64]) -> Value {
        Value::array(items.iter().copied().map(num).collect())
    }

    fn err(result: OpResult<Value>) -> ErrorMsg {
        result.unwrap_err().msg
    }

    #[test]
    fn arithmetic() {
        assert_eq!(binary(BinOp::Plus, &num(2.0), &num(3.0)), Ok(num(5.0)));
        assert_eq!(binary(BinOp::Modulo, &num(7.5), &num(2.0)), Ok(num(1.5)));
        assert_eq!(binary(BinOp::Modulo, &num(-7.0), &num(3.0)), Ok(num(-1.0)));
        assert_eq!(
            binary(BinOp::Slash, &num(1.0), &num(0.0)),
            Err(OpError::new(ErrorMsg::DivisionByZero, Blame::Rhs))
        );
        assert_eq!(err(binary(BinOp::Modulo, &num(1.0), &num(0.0))), ErrorMsg::DivisionByZero);
        assert_eq!(
            err(binary(BinOp::Minus, &Value::string("a"), &num(1.0))),
            ErrorMsg::IllegalOperation("STRING", Some("NUMBER"))
        );
    }

    #[test]
    fn chars() {
        assert_eq!(binary(BinOp::Plus, &Value::char(b'a'), &num(1.0)), Ok(Value::char(b'b')));
        assert_eq!(binary(BinOp::Minus, &Value::char(b'b'), &num(1.0)), Ok(Value::char(b'a')));
        assert_eq!(
            err(binary(BinOp::Minus, &Value::char(0), &num(1.0))),
            ErrorMsg::OutOfBounds {
                min: 0,
                max: 255,
                found: "-1".to_string()
            }
        );
        assert_eq!(
            binary(BinOp::Plus, &Value::char(b'a'), &Value::string("bc")),
            Ok(Value::string("abc"))
        );
        assert_eq!(
            binary(BinOp::Star, &Value::char(b'z'), &num(3.0)),
            Ok(Value::string("zzz"))
        );
    }

    #[test]
    fn huge_repetitions_fail() {
        let huge = num(1e30);
        let too_many = |value: &Value| err(binary(BinOp::Star, value, &huge));
        let bounds = |max: i64| ErrorMsg::OutOfBounds {
            min: 0,
            max,
            found: "1000000000000000019884624838656".to_string(),
        };
        assert_eq!(too_many(&arr(&[1.0, 2.0])), bounds(i32::MAX as i64 / 2));
        assert_eq!(too_many(&Value::string("ab")), bounds(i32::MAX as i64 / 2));
        assert_eq!(too_many(&Value::char(b'a')), bounds(i32::MAX as i64));
        assert!(binary(BinOp::Star, &Value::string("ab"), &num(f64::INFINITY)).is_err());
        // Nothing to repeat is never too large
        assert_eq!(binary(BinOp::Star, &arr(&[]), &huge), Ok(arr(&[])));
        assert_eq!(
            binary(BinOp::Star, &Value::string("ab"), &num(-1e30)),
            Ok(Value::string(""))
        );
    }

    #[test]
    fn huge_indices_are_reported_as_written() {
        assert_eq!(
            err(get_at_index(&arr(&[1.0, 2.0, 3.0]), &num(-1e30))),
            ErrorMsg::OutOfBounds {
                min: -3,
                max: 2,
                found: "-1000000000000000019884624838656".to_string()
            }
        );
        assert_eq!(
            err(get_at_index(&Value::string("ab"), &num(7.9))),
            ErrorMsg::OutOfBounds {
                min: -2,
                max: 1,
                found: "7".to_string()
            }
        );
    }

    #[test]
    fn strings() {
        let s = Value::string("hello");
        assert_eq!(binary(BinOp::Plus, &s, &Value::char(b'!')), Ok(Value::string("hello!")));
        assert_eq!(binary(BinOp::Plus, &s, &Value::string(" you")), Ok(Value::string("hello you")));
        assert_eq!(binary(BinOp::Plus, &s, &num(2.0)), Ok(Value::string("llo")));
        assert_eq!(binary(BinOp::Plus, &s, &num(-1.0)), Ok(Value::string("o")));
        assert_eq!(binary(BinOp::Star, &Value::string("ab"), &num(2.0)), Ok(Value::string("abab")));
        assert_eq!(binary(BinOp::Star, &Value::string("ab"), &num(-1.0)), Ok(Value::string("")));
        assert_eq!(
            err(binary(BinOp::Plus, &Value::string(""), &num(0.0))),
            ErrorMsg::EmptyContainer
        );
    }

    #[test]
    fn arrays() {
        assert_eq!(binary(BinOp::Plus, &arr(&[1.0]), &arr(&[2.0, 3.0])), Ok(arr(&[1.0, 2.0, 3.0])));
        assert_eq!(binary(BinOp::Plus, &arr(&[1.0]), &num(2.0)), Ok(arr(&[1.0, 2.0])));
        assert_eq!(binary(BinOp::Minus, &arr(&[1.0, 2.0, 3.0]), &num(1.0)), Ok(arr(&[1.0, 3.0])));
        assert_eq!(binary(BinOp::Star, &arr(&[1.0, 2.0]), &num(2.0)), Ok(arr(&[1.0, 2.0, 1.0, 2.0])));
        assert_eq!(
            err(binary(BinOp::Minus, &arr(&[1.0]), &num(4.0))),
            ErrorMsg::OutOfBounds {
                min: -1,
                max: 0,
                found: "4".to_string()
            }
        );
    }

    #[test]
    fn dictionaries() {
        let mut entries = BTreeMap::new();
        entries.insert("\"a\"".to_string(), num(1.0));
        entries.insert("1".to_string(), num(2.0));
        let dict = Value::dict(entries);
        let Ok(Value {
            data: Data::Dict(rest),
            ..
        }) = binary(BinOp::Minus, &dict, &Value::string("a"))
        else {
            panic!("expected a dictionary");
        };
        assert_eq!(rest.keys().collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(get_at_index(&dict, &num(1.0)), Ok(num(2.0)));
        assert_eq!(get_at_index(&dict, &Value::string("1")), Ok(Value::NULL));
        assert_eq!(
            err(get_at_index(&dict, &arr(&[]))),
            ErrorMsg::Expected("NUMBER, CHAR, STRING")
        );
    }

    #[test]
    fn comparisons() {
        let t = Value::boolean(true);
        let f = Value::boolean(false);
        assert_eq!(binary(BinOp::Equal, &num(0.1 + 0.2), &num(0.3)), Ok(t.clone()));
        assert_eq!(binary(BinOp::Equal, &num(1.0), &Value::string("1")), Ok(f.clone()));
        assert_eq!(binary(BinOp::Different, &num(1.0), &Value::string("1")), Ok(t.clone()));
        assert_eq!(binary(BinOp::Equal, &arr(&[1.0]), &arr(&[1.0])), Ok(t.clone()));
        assert_eq!(binary(BinOp::Less, &num(2.0), &num(10.0)), Ok(t.clone()));
        assert_eq!(
            binary(BinOp::Less, &Value::string("abc"), &Value::string("abd")),
            Ok(t.clone())
        );
        assert_eq!(binary(BinOp::GreaterEqual, &Value::char(b'a'), &Value::char(b'a')), Ok(t));
        assert_eq!(binary(BinOp::Greater, &num(1.0), &num(1.0)), Ok(f));
        assert_eq!(
            err(binary(BinOp::Less, &num(1.0), &Value::string("1"))),
            ErrorMsg::IllegalOperation("NUMBER", Some("STRING"))
        );
    }

    #[test]
    fn logic() {
        assert_eq!(logical(LogicalOp::And, &num(1.0), &Value::string("")), num(0.0));
        assert_eq!(logical(LogicalOp::Or, &Value::NULL, &arr(&[1.0])), num(1.0));
    }

    #[test]
    fn negation() {
        assert_eq!(negate(&num(2.0)), Ok(num(-2.0)));
        assert_eq!(
            err(negate(&Value::NULL)),
            ErrorMsg::IllegalOperation("NULL", Some("NUMBER"))
        );
    }

    #[test]
    fn indexing() {
        let a = arr(&[1.0, 2.0, 3.0]);
        assert_eq!(get_at_index(&a, &num(-1.0)), Ok(num(3.0)));
        assert_eq!(get_at_index(&a, &num(1.7)), Ok(num(2.0)));
        assert_eq!(
            err(get_at_index(&a, &num(3.0))),
            ErrorMsg::OutOfBounds {
                min: -3,
                max: 2,
                found: "3".to_string()
            }
        );
        assert_eq!(err(get_at_index(&arr(&[]), &num(0.0))), ErrorMsg::EmptyContainer);
        assert_eq!(err(get_at_index(&a, &Value::string("0"))), ErrorMsg::Expected("NUMBER"));
        assert_eq!(err(get_at_index(&num(1.0), &num(0.0))), ErrorMsg::NonContainerIndex);
        assert_eq!(get_at_index(&Value::string("hey"), &num(0.0)), Ok(Value::char(b'h')));
    }

    #[test]
    fn writes() {
        let mut a = arr(&[1.0, 2.0, 3.0]);
        let alias = a.clone();
        set_at_index(&mut a, &num(3.0), num(9.0)).unwrap();
        set_at_index(&mut a, &num(-4.0), num(0.0)).unwrap();
        assert_eq!(a, arr(&[0.0, 2.0, 3.0, 9.0]));
        // The original handle is untouched
        assert_eq!(alias, arr(&[1.0, 2.0, 3.0]));
        assert_eq!(
            set_at_index(&mut a, &num(5.0), num(1.0)).unwrap_err().msg,
            ErrorMsg::OutOfBounds {
                min: -4,
                max: 3,
                found: "5".to_string()
            }
        );

        let mut s = Value::string("cat");
        set_at_index(&mut s, &num(0.0), Value::char(b'b')).unwrap();
        assert_eq!(s, Value::string("bat"));
        assert_eq!(
            set_at_index(&mut s, &num(0.0), num(1.0)).unwrap_err(),
            OpError::new(ErrorMsg::Expected("CHAR"), Blame::Value)
        );

        let mut empty = arr(&[]);
        set_at_index(&mut empty, &num(0.0), num(1.0)).unwrap();
        assert_eq!(empty, arr(&[1.0]));

        let mut frozen = arr(&[1.0]).with_const(true);
        assert_eq!(
            set_at_index(&mut frozen, &num(0.0), num(2.0)).unwrap_err().msg,
            ErrorMsg::IndexCannotBeConstant
        );
    }

    #[test]
    fn nested_writes() {
        let mut outer = Value::array(vec![arr(&[1.0, 2.0]), arr(&[3.0])]);
        let copy = outer.clone();
        let inner = element_mut(&mut outer, &num(0.0)).unwrap();
        set_at_index(inner, &num(1.0), num(5.0)).unwrap();
        assert_eq!(outer, Value::array(vec![arr(&[1.0, 5.0]), arr(&[3.0])]));
        assert_eq!(copy, Value::array(vec![arr(&[1.0, 2.0]), arr(&[3.0])]));
        assert_eq!(
            element_mut(&mut Value::string("ab"), &num(0.0)).unwrap_err().msg,
            ErrorMsg::NonContainerIndex
        );
    }

    proptest! {
        #[test]
        fn number_arithmetic_matches_ieee(a in -1.0e6f64..1.0e6, b in -1.0e6f64..1.0e6) {
            prop_assert_eq!(binary(BinOp::Plus, &num(a), &num(b)), Ok(num(a + b)));
            prop_assert_eq!(binary(BinOp::Star, &num(a), &num(b)), Ok(num(a * b)));
            if b != 0.0 {
                prop_assert_eq!(binary(BinOp::Slash, &num(a), &num(b)), Ok(num(a / b)));
            }
        }

        #[test]
        fn indices_within_bounds_resolve(len in 1usize..64, offset in 0usize..64) {
            let i = offset % len;
            prop_assert_eq!(check_index(&num(i as f64), len, false), Ok(Slot::At(i)));
            let back = -((i + 1) as f64);
            prop_assert_eq!(check_index(&num(back), len, false), Ok(Slot::At(len - i - 1)));
            prop_assert_eq!(check_index(&num(len as f64), len, true), Ok(Slot::Append));
            prop_assert!(check_index(&num(len as f64), len, false).is_err());
        }
    }
}
