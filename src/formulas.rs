//! Helpers for building `filterByFormula` expressions.
//!
//! Everything here produces plain strings, so the helpers compose freely:
//!
//! ```
//! use airtable_rs::formulas::{and, equal, field, to_formula_value};
//!
//! let formula = and(&[
//!     equal(&field("Status"), &to_formula_value(&"Done")),
//!     equal(&field("Count"), &to_formula_value(&3)),
//! ]);
//! assert_eq!(formula, "AND({Status}='Done',{Count}=3)");
//! ```

use chrono::{DateTime, NaiveDate, Utc};

/// Evaluates to the id of the record being tested
pub const RECORD_ID: &str = "RECORD_ID()";

/// Values that can appear as literals in a formula
pub trait ToFormula {
    fn to_formula(&self) -> String;
}

impl ToFormula for str {
    fn to_formula(&self) -> String {
        str_value(self)
    }
}

impl ToFormula for String {
    fn to_formula(&self) -> String {
        str_value(self)
    }
}

impl<T: ToFormula + ?Sized> ToFormula for &T {
    fn to_formula(&self) -> String {
        (**self).to_formula()
    }
}

impl ToFormula for bool {
    fn to_formula(&self) -> String {
        let literal = if *self { "TRUE()" } else { "FALSE()" };
        literal.to_string()
    }
}

macro_rules! number_to_formula {
    ($($t:ty),*) => {
        $(impl ToFormula for $t {
            fn to_formula(&self) -> String {
                self.to_string()
            }
        })*
    };
}

number_to_formula!(i32, i64, u32, u64, usize, f32, f64);

impl ToFormula for NaiveDate {
    fn to_formula(&self) -> String {
        str_value(&self.format("%Y-%m-%d").to_string())
    }
}

impl ToFormula for DateTime<Utc> {
    fn to_formula(&self) -> String {
        str_value(&self.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    }
}

pub fn to_formula_value<T: ToFormula + ?Sized>(value: &T) -> String {
    value.to_formula()
}

/// Escape single quotes so a value can sit inside `'...'`
pub fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Quoted string literal
pub fn str_value(value: &str) -> String {
    format!("'{}'", escape_quotes(value))
}

/// Field reference, e.g. `{First Name}`
pub fn field(name: &str) -> String {
    format!("{{{}}}", name.replace('}', "\\}"))
}

pub fn equal(left: &str, right: &str) -> String {
    format!("{}={}", left, right)
}

pub fn not_equal(left: &str, right: &str) -> String {
    format!("{}!={}", left, right)
}

pub fn and<S: AsRef<str>>(parts: &[S]) -> String {
    function("AND", parts)
}

pub fn or<S: AsRef<str>>(parts: &[S]) -> String {
    function("OR", parts)
}

pub fn not(expr: &str) -> String {
    format!("NOT({})", expr)
}

pub fn lower(expr: &str) -> String {
    format!("LOWER({})", expr)
}

/// `FIND(needle, haystack)`: position of `needle`, 0 when absent
pub fn find(needle: &str, haystack: &str) -> String {
    format!("FIND({},{})", needle, haystack)
}

fn function<S: AsRef<str>>(name: &str, parts: &[S]) -> String {
    let args: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
    format!("{}({})", name, args.join(","))
}

/// Formula matching records where every (or, with `match_any`, some)
/// field equals the given value.
pub fn match_fields(pairs: &[(&str, &dyn ToFormula)], match_any: bool) -> String {
    let clauses: Vec<String> = pairs
        .iter()
        .map(|(name, value)| equal(&field(name), &value.to_formula()))
        .collect();

    match clauses.len() {
        0 => String::new(),
        1 => clauses.into_iter().next().unwrap_or_default(),
        _ if match_any => or(clauses.as_slice()),
        _ => and(clauses.as_slice()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes("Guido's"), "Guido\\'s");
        assert_eq!(str_value("it's"), "'it\\'s'");
        assert_eq!(str_value("plain"), "'plain'");
    }

    #[test]
    fn test_literals() {
        assert_eq!(to_formula_value(&true), "TRUE()");
        assert_eq!(to_formula_value(&false), "FALSE()");
        assert_eq!(to_formula_value(&42), "42");
        assert_eq!(to_formula_value(&1.5), "1.5");
        assert_eq!(to_formula_value("x"), "'x'");

        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(to_formula_value(&date), "'2023-01-01'");

        let dt = Utc.with_ymd_and_hms(2023, 4, 12, 9, 30, 0).unwrap();
        assert_eq!(to_formula_value(&dt), "'2023-04-12T09:30:00.000Z'");
    }

    #[test]
    fn test_field_reference() {
        assert_eq!(field("First Name"), "{First Name}");
    }

    #[test]
    fn test_combinators() {
        assert_eq!(and(&["A", "B"]), "AND(A,B)");
        assert_eq!(or(&["A", "B", "C"]), "OR(A,B,C)");
        assert_eq!(not("A"), "NOT(A)");
        assert_eq!(not_equal("{X}", "1"), "{X}!=1");
        assert_eq!(find(&str_value("a"), &lower(&field("Name"))), "FIND('a',LOWER({Name}))");
    }

    #[test]
    fn test_match_fields() {
        assert_eq!(match_fields(&[], false), "");
        assert_eq!(match_fields(&[("Name", &"Alice")], false), "{Name}='Alice'");
        assert_eq!(
            match_fields(&[("Name", &"Alice"), ("Age", &30)], false),
            "AND({Name}='Alice',{Age}=30)"
        );
        assert_eq!(
            match_fields(&[("Name", &"Alice"), ("Active", &true)], true),
            "OR({Name}='Alice',{Active}=TRUE())"
        );
    }
}
