use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::{multispace0, multispace1};
use nom::combinator::{all_consuming, map, map_res, opt, recognize};
use nom::character::complete::{char, digit1};
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded, tuple};

use crate::{assumptions::AssumptionKey, config::EstimationMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Calibrate { key: AssumptionKey, rows: f64 },
    Mark(AssumptionKey),
    Drop { key: AssumptionKey, rows: f64 },
    Assumptions,
    Candidates,
    Mode(EstimationMode),
    Enable,
    Disable,
    Help,
    Quit
}

pub fn parse_command(line: &str) -> IResult<&str, Command> {
    all_consuming(delimited(
        multispace0,
        alt((
            parse_calibrate,
            parse_mark,
            parse_drop,
            parse_mode,
            parse_keyword,
        )),
        multispace0
    ))(line)
}

fn parse_calibrate(rest: &str) -> IResult<&str, Command> {
    let (rest, _) = tag_no_case("calibrate")(rest)?;
    let (rest, key) = parse_key(rest)?;
    let (rest, rows) = preceded(multispace1, double)(rest)?;
    Ok((rest, Command::Calibrate { key, rows }))
}

fn parse_mark(rest: &str) -> IResult<&str, Command> {
    let (rest, _) = tag_no_case("mark")(rest)?;
    let (rest, key) = parse_key(rest)?;
    Ok((rest, Command::Mark(key)))
}

fn parse_drop(rest: &str) -> IResult<&str, Command> {
    let (rest, _) = tag_no_case("drop")(rest)?;
    let (rest, key) = parse_key(rest)?;
    let (rest, rows) = preceded(multispace1, double)(rest)?;
    Ok((rest, Command::Drop { key, rows }))
}

fn parse_mode(rest: &str) -> IResult<&str, Command> {
    let (rest, _) = tag_no_case("mode")(rest)?;
    let (rest, mode) = preceded(
        multispace1,
        map_res(take_while1(|c: char| c.is_ascii_alphabetic()), str::parse::<EstimationMode>)
    )(rest)?;
    Ok((rest, Command::Mode(mode)))
}

fn parse_keyword(rest: &str) -> IResult<&str, Command> {
    alt((
        // "assumptions" before anything that could be a prefix of it
        map(tag_no_case("assumptions"), |_| Command::Assumptions),
        map(tag_no_case("candidates"), |_| Command::Candidates),
        map(tag_no_case("enable"), |_| Command::Enable),
        map(tag_no_case("disable"), |_| Command::Disable),
        map(tag_no_case("help"), |_| Command::Help),
        map(alt((tag_no_case("quit"), tag_no_case("exit"))), |_| Command::Quit),
    ))(rest)
}

// "<space> <fingerprint>", both 32 bit signed
fn parse_key(rest: &str) -> IResult<&str, AssumptionKey> {
    let (rest, (space, fingerprint)) = tuple((
        preceded(multispace1, parse_i32),
        preceded(multispace1, parse_i32),
    ))(rest)?;
    Ok((rest, AssumptionKey::new(space, fingerprint)))
}

fn parse_i32(rest: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i32>)(rest)
}
