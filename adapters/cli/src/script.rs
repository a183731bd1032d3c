//! Parsing of single-character intent scripts.

use anyhow::{bail, Result};
use cascade_core::Intent;

/// One scripted action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// Forward an intent to the session.
    Intent(Intent),
    /// Advance the clock by one tick.
    Tick,
}

/// Parses a script such as `LLUH..RRD`.
///
/// `L`/`R` move, `D` soft drops, `H` hard drops, `U` rotates, `X` resets,
/// `C` continues after a win and `.` advances time. Whitespace is ignored.
pub(crate) fn parse(script: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::with_capacity(script.len());
    for (position, symbol) in script.chars().enumerate() {
        let step = match symbol.to_ascii_uppercase() {
            'L' => Step::Intent(Intent::MoveLeft),
            'R' => Step::Intent(Intent::MoveRight),
            'D' => Step::Intent(Intent::SoftDrop),
            'H' => Step::Intent(Intent::HardDrop),
            'U' => Step::Intent(Intent::RotateClockwise),
            'X' => Step::Intent(Intent::Reset),
            'C' => Step::Intent(Intent::ContinueAfterWin),
            '.' => Step::Tick,
            whitespace if whitespace.is_whitespace() => continue,
            other => bail!("unknown script symbol `{other}` at position {position}"),
        };
        steps.push(step);
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_intents_and_ticks() {
        let steps = parse("lU .h").expect("valid script");
        assert_eq!(
            steps,
            vec![
                Step::Intent(Intent::MoveLeft),
                Step::Intent(Intent::RotateClockwise),
                Step::Tick,
                Step::Intent(Intent::HardDrop),
            ]
        );
    }

    #[test]
    fn rejects_unknown_symbols() {
        let error = parse("LLZ").expect_err("Z is not a command");
        assert_eq!(error.to_string(), "unknown script symbol `Z` at position 2");
    }
}
