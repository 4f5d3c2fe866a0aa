use serde::Serialize;

use super::types::Polarity;

/// Relative changes within this many percent count as no change.
pub const NO_CHANGE_TOLERANCE_PCT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "pct")]
pub enum TrendChange {
    NoChange,
    /// Previous value was zero; no percentage exists.
    New,
    Percent(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Improved,
    Worsened,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendIndicator {
    pub direction: Direction,
    pub change: TrendChange,
    pub verdict: Verdict,
}

impl TrendIndicator {
    const UNCHANGED: TrendIndicator = TrendIndicator {
        direction: Direction::Flat,
        change: TrendChange::NoChange,
        verdict: Verdict::Neutral,
    };

    /// Short display form such as `+12%`, `new` or `=`.
    pub fn display(&self) -> String {
        match self.change {
            TrendChange::NoChange => "=".to_string(),
            TrendChange::New => "new".to_string(),
            TrendChange::Percent(p) => format!("{p:+.0}%"),
        }
    }
}

/// Compare a value against the previous period's value.
pub fn trend(previous: f64, current: f64, polarity: Polarity) -> TrendIndicator {
    if previous == 0.0 {
        if current == 0.0 {
            return TrendIndicator::UNCHANGED;
        }
        let direction = if current > 0.0 { Direction::Up } else { Direction::Down };
        return TrendIndicator {
            direction,
            change: TrendChange::New,
            verdict: verdict(direction, polarity),
        };
    }

    let pct = (current - previous) / previous.abs() * 100.0;
    if pct.abs() <= NO_CHANGE_TOLERANCE_PCT {
        return TrendIndicator::UNCHANGED;
    }
    let direction = if pct > 0.0 { Direction::Up } else { Direction::Down };
    TrendIndicator {
        direction,
        change: TrendChange::Percent(pct),
        verdict: verdict(direction, polarity),
    }
}

fn verdict(direction: Direction, polarity: Polarity) -> Verdict {
    match (direction, polarity) {
        (Direction::Flat, _) => Verdict::Neutral,
        (Direction::Up, Polarity::HigherIsBetter) | (Direction::Down, Polarity::LowerIsBetter) => {
            Verdict::Improved
        }
        _ => Verdict::Worsened,
    }
}
