//! Built-in person formula evaluator.
//!
//! Supports the small formula subset directory configurations use in
//! practice:
//!
//! | formula                | text result        | numeric result         |
//! |------------------------|--------------------|------------------------|
//! | `ShortName`            | first item value   | item value as a number |
//! | `@LowerCase(ShortName)`| lower-cased value  | error                  |
//! | `@True` / `@False`     | `"1"` / `"0"`      | 1 / 0                  |
//! | `42`                   | `"42"`             | 42                     |
//! | `"text"`               | `text`             | error                  |
//! | `Dept = "Eng"`         | `"1"` / `"0"`      | 1 / 0                  |
//!
//! Item comparisons ignore case. Anything else is rejected when the
//! evaluator is built, so a bad configuration fails at startup rather than
//! on every person record.

use dacl_domain::{DomainError, DomainResult};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, recognize, value},
    error::{context, ContextError, ParseError, VerboseError},
    number::complete::double,
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};

use crate::config::DirectorySettings;
use crate::sources::{PersonEntry, PersonEvaluator};

#[derive(Debug, Clone, PartialEq)]
enum Formula {
    Item(String),
    Text(String),
    Number(f64),
    LowerCase(Box<Formula>),
    Equals(Box<Formula>, Box<Formula>),
}

/// Parses a whole formula; trailing input is an error.
fn parse(source: &str) -> DomainResult<Formula> {
    match all_consuming(formula::<VerboseError<&str>>)(source) {
        Ok((_, formula)) => Ok(formula),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(DomainError::EvaluationFailed {
            message: format!(
                "unsupported formula '{source}': {}",
                nom::error::convert_error(source, e)
            ),
        }),
        Err(nom::Err::Incomplete(_)) => Err(DomainError::EvaluationFailed {
            message: format!("unsupported formula '{source}': incomplete input"),
        }),
    }
}

fn ws<'a, O, E, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    E: ParseError<&'a str>,
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

/// `operand` or `operand = operand`.
fn formula<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Formula, E> {
    alt((
        map(
            separated_pair(ws(operand), char('='), ws(operand)),
            |(left, right)| Formula::Equals(Box::new(left), Box::new(right)),
        ),
        ws(operand),
    ))(input)
}

fn operand<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Formula, E> {
    alt((quoted, lower_case, boolean, item, number))(input)
}

fn quoted<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Formula, E> {
    context(
        "string literal",
        map(
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
            |text: &str| Formula::Text(text.to_string()),
        ),
    )(input)
}

fn lower_case<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Formula, E> {
    context(
        "@LowerCase",
        map(
            preceded(
                tag_no_case("@lowercase"),
                delimited(ws(char('(')), operand, ws(char(')'))),
            ),
            |inner| Formula::LowerCase(Box::new(inner)),
        ),
    )(input)
}

fn boolean<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Formula, E> {
    map(
        alt((
            value(1.0, tag_no_case("@true")),
            value(0.0, tag_no_case("@false")),
        )),
        Formula::Number,
    )(input)
}

/// Item names start with a letter, `_` or `$`.
fn item<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Formula, E> {
    context(
        "item name",
        map(
            recognize(pair(
                satisfy(|c| c.is_alphabetic() || c == '_' || c == '$'),
                take_while(is_item_char),
            )),
            |name: &str| Formula::Item(name.to_string()),
        ),
    )(input)
}

fn number<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Formula, E> {
    // `double` alone would also take "inf" and "nan", which are item names here
    let (rest, digits) = recognize(pair(
        take_while(|c: char| c == '-' || c == '+'),
        take_while1(|c: char| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E'),
    ))(input)?;
    let (_, n) = all_consuming(double)(digits)?;
    Ok((rest, Formula::Number(n)))
}

fn is_item_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl Formula {
    fn text(&self, person: &PersonEntry) -> DomainResult<String> {
        Ok(match self {
            Formula::Item(name) => person.item(name).unwrap_or_default().to_string(),
            Formula::Text(text) => text.clone(),
            Formula::Number(n) => format_number(*n),
            Formula::LowerCase(inner) => inner.text(person)?.to_lowercase(),
            Formula::Equals(left, right) => {
                let equal = left.text(person)?.eq_ignore_ascii_case(&right.text(person)?);
                format_number(if equal { 1.0 } else { 0.0 })
            }
        })
    }

    fn number(&self, person: &PersonEntry) -> DomainResult<f64> {
        match self {
            Formula::Number(n) => Ok(*n),
            Formula::Equals(..) => self.text(person)?.parse::<f64>().map_err(|e| {
                DomainError::EvaluationFailed {
                    message: e.to_string(),
                }
            }),
            Formula::Item(name) => {
                let value = person.item(name).unwrap_or_default().trim();
                value.parse::<f64>().map_err(|_| DomainError::EvaluationFailed {
                    message: format!("item '{name}' is not numeric: '{value}'"),
                })
            }
            Formula::Text(_) | Formula::LowerCase(_) => Err(DomainError::EvaluationFailed {
                message: "text formula used where a number is required".to_string(),
            }),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// [`PersonEvaluator`] backed by the built-in formula subset.
#[derive(Debug, Clone)]
pub struct ItemFormulaEvaluator {
    principal: Formula,
    selection: Formula,
}

impl ItemFormulaEvaluator {
    /// Parses both formulas.
    pub fn new(principal_formula: &str, selection_formula: &str) -> DomainResult<Self> {
        Ok(Self {
            principal: parse(principal_formula)?,
            selection: parse(selection_formula)?,
        })
    }

    pub fn from_settings(settings: &DirectorySettings) -> DomainResult<Self> {
        Self::new(&settings.username_formula, &settings.selection_formula)
    }
}

impl PersonEvaluator for ItemFormulaEvaluator {
    fn principal_name(&self, person: &PersonEntry) -> DomainResult<String> {
        Ok(self.principal.text(person)?.trim().to_string())
    }

    fn selection(&self, person: &PersonEntry) -> DomainResult<f64> {
        self.selection.number(person)
    }
}
