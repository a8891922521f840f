//! Referee commands typed at the scoring table while a match runs.
//!
//! One command per line:
//!
//! ```text
//! red bucket_normal          score with the table value
//! blue climb 14 #7 "note"    explicit points, optional team number and details
//! bonus red                  open the red bonus window
//! override blue 42           set a score by hand
//! delete 17                  delete event 17
//! pause | resume             field fault
//! end | stop                 end play, or emergency stop
//! ```

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use scoring_core::{Alliance, EventKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Score {
        alliance: Alliance,
        kind: EventKind,
        points: Option<u32>,
        team_number: Option<u32>,
        details: Option<String>,
    },
    Bonus(Alliance),
    Override { alliance: Alliance, score: u32 },
    Delete(u32),
    Pause,
    Resume,
    End,
    Stop,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (head, quoted) = match line.find('"') {
            Some(start) => {
                let rest = &line[start + 1..];
                let end = rest.find('"').ok_or_else(|| anyhow!("unterminated quote"))?;
                (&line[..start], Some(rest[..end].to_string()))
            }
            None => (line, None),
        };
        let words: Vec<&str> = head.split_whitespace().collect();

        let command = match words.as_slice() {
            [] => bail!("empty command"),
            ["pause"] => ConsoleCommand::Pause,
            ["resume"] => ConsoleCommand::Resume,
            ["end"] => ConsoleCommand::End,
            ["stop"] => ConsoleCommand::Stop,
            ["bonus", alliance] => ConsoleCommand::Bonus(alliance.parse()?),
            ["override", alliance, score] => ConsoleCommand::Override {
                alliance: alliance.parse()?,
                score: score.parse().context("score must be a number")?,
            },
            ["delete", id] => ConsoleCommand::Delete(id.parse().context("event id must be a number")?),
            [alliance, kind, rest @ ..] => {
                let alliance: Alliance = alliance.parse()?;
                let kind: EventKind = kind.parse()?;
                let mut points = None;
                let mut team_number = None;
                for word in rest {
                    if let Some(number) = word.strip_prefix('#') {
                        team_number = Some(number.parse().context("team number must be a number")?);
                    } else if points.is_none() {
                        points = Some(word.parse().context("points must be a number")?);
                    } else {
                        bail!("unexpected '{word}'");
                    }
                }
                ConsoleCommand::Score { alliance, kind, points, team_number, details: quoted.clone() }
            }
            [other] => bail!("unknown command '{other}'"),
        };

        if quoted.is_some() && !matches!(command, ConsoleCommand::Score { .. }) {
            bail!("only scoring events take details");
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_lines() {
        assert_eq!(
            "red bucket_normal".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Score {
                alliance: Alliance::Red,
                kind: EventKind::BucketNormal,
                points: None,
                team_number: None,
                details: None,
            }
        );
        assert_eq!(
            r#"Blue climb 14 #2056 "hung from the bar""#.parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Score {
                alliance: Alliance::Blue,
                kind: EventKind::Climb,
                points: Some(14),
                team_number: Some(2056),
                details: Some("hung from the bar".into()),
            }
        );
    }

    #[test]
    fn test_parse_control_lines() {
        assert_eq!("  pause ".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Pause);
        assert_eq!("bonus blue".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Bonus(Alliance::Blue));
        assert_eq!(
            "override red 40".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Override { alliance: Alliance::Red, score: 40 }
        );
        assert_eq!("delete 17".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Delete(17));
    }

    #[test]
    fn test_parse_errors() {
        for line in ["", "green park", "red dunk", "jump", "red park 3 4", "delete x", r#"end "why""#, r#"red park "open"#] {
            assert!(line.parse::<ConsoleCommand>().is_err(), "{line:?} should not parse");
        }
    }
}
