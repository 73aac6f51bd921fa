//! Nom parser for lock expressions
//!
//! ```text
//! expr   := term ( "|" term )*
//! term   := factor ( "&" factor )*
//! factor := "!" factor | "(" expr ")" | call
//! call   := ident "(" [ arg ( "," arg )* ] ")"
//! ```
//!
//! Parsing produces raw calls (name + string args); compiling them into
//! [`LockFn`] happens afterwards so argument errors carry a useful message.
//!
//! Input length and `!`/`(` nesting are bounded so a stored lock can never
//! recurse the parser or evaluator off the end of the stack.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{all_consuming, map},
    error::{Error, ErrorKind},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    Finish, IResult,
};
use uuid::Uuid;

use super::{LockError, LockExpr, LockFn, MAX_LOCK_DEPTH, MAX_LOCK_LEN};

/// Uncompiled syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
enum Raw<'a> {
    Call(&'a str, Vec<&'a str>),
    Not(Box<Raw<'a>>),
    And(Vec<Raw<'a>>),
    Or(Vec<Raw<'a>>),
}

/// Parse and compile `input`
pub(super) fn parse(input: &str) -> Result<LockExpr, LockError> {
    if input.len() > MAX_LOCK_LEN {
        return Err(LockError::TooLong {
            len: input.len(),
            max: MAX_LOCK_LEN,
        });
    }

    let (_, raw) = all_consuming(ws(|i| expr(i, 0)))(input)
        .finish()
        .map_err(|e| match e.code {
            ErrorKind::TooLarge => LockError::TooDeep {
                max: MAX_LOCK_DEPTH,
            },
            _ => LockError::Syntax {
                expr: input.to_owned(),
                offset: input.len() - e.input.len(),
            },
        })?;
    compile(raw)
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn expr(input: &str, depth: usize) -> IResult<&str, Raw<'_>> {
    map(separated_list1(ws(char('|')), |i| term(i, depth)), |mut terms| {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Raw::Or(terms)
        }
    })(input)
}

fn term(input: &str, depth: usize) -> IResult<&str, Raw<'_>> {
    map(separated_list1(ws(char('&')), |i| factor(i, depth)), |mut factors| {
        if factors.len() == 1 {
            factors.remove(0)
        } else {
            Raw::And(factors)
        }
    })(input)
}

fn factor(input: &str, depth: usize) -> IResult<&str, Raw<'_>> {
    if depth >= MAX_LOCK_DEPTH {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    ws(alt((
        map(preceded(char('!'), |i| factor(i, depth + 1)), |inner| {
            Raw::Not(Box::new(inner))
        }),
        delimited(char('('), |i| expr(i, depth + 1), char(')')),
        call,
    )))(input)
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn arg(input: &str) -> IResult<&str, &str> {
    map(take_while1(|c: char| !matches!(c, ',' | '(' | ')')), str::trim)(input)
}

fn call(input: &str) -> IResult<&str, Raw<'_>> {
    map(
        pair(
            ident,
            delimited(
                tuple((multispace0, char('('))),
                separated_list0(char(','), arg),
                char(')'),
            ),
        ),
        |(name, args)| Raw::Call(name, args),
    )(input)
}

fn compile(raw: Raw<'_>) -> Result<LockExpr, LockError> {
    match raw {
        Raw::Call(name, args) => compile_call(name, args).map(LockExpr::Call),
        Raw::Not(inner) => Ok(LockExpr::Not(Box::new(compile(*inner)?))),
        Raw::And(items) => fold(items, LockExpr::And),
        Raw::Or(items) => fold(items, LockExpr::Or),
    }
}

fn fold(
    items: Vec<Raw<'_>>,
    join: fn(Box<LockExpr>, Box<LockExpr>) -> LockExpr,
) -> Result<LockExpr, LockError> {
    let mut compiled = items.into_iter().map(compile);
    let first = compiled.next().ok_or(LockError::Syntax {
        expr: String::new(),
        offset: 0,
    })??;
    compiled.try_fold(first, |acc, next| -> Result<LockExpr, LockError> {
        Ok(join(Box::new(acc), Box::new(next?)))
    })
}

fn compile_call(name: &str, mut args: Vec<&str>) -> Result<LockFn, LockError> {
    // `all( )` parses as one blank argument
    if args.len() == 1 && args[0].is_empty() {
        args.clear();
    }
    let lowered = name.to_ascii_lowercase();

    let arity = |expected: usize| -> Result<(), LockError> {
        if args.len() != expected || args.iter().any(|a| a.is_empty()) {
            return Err(LockError::Arity {
                name: lowered.clone(),
                expected,
                got: args.len(),
            });
        }
        Ok(())
    };
    let int = |value: &str| -> Result<i32, LockError> {
        value.parse::<i32>().map_err(|_| LockError::BadArgument {
            name: lowered.clone(),
            value: value.to_owned(),
        })
    };

    match lowered.as_str() {
        "all" => arity(0).map(|_| LockFn::All),
        "none" => arity(0).map(|_| LockFn::None),
        "admin" => {
            arity(1)?;
            Ok(LockFn::Admin(int(args[0])?))
        }
        "user" => arity(1).map(|_| LockFn::User(args[0].to_owned())),
        "name" => arity(1).map(|_| LockFn::Name(args[0].to_owned())),
        "id" => {
            arity(1)?;
            let id = Uuid::parse_str(args[0]).map_err(|_| LockError::BadArgument {
                name: lowered.clone(),
                value: args[0].to_owned(),
            })?;
            Ok(LockFn::Id(id))
        }
        "faction" => arity(1).map(|_| LockFn::Faction(args[0].to_owned())),
        "rank" => {
            arity(2)?;
            Ok(LockFn::Rank(args[0].to_owned(), int(args[1])?))
        }
        "fperm" => arity(2).map(|_| LockFn::FactionPerm(args[0].to_owned(), args[1].to_owned())),
        _ => Err(LockError::UnknownFunction(name.to_owned())),
    }
}
