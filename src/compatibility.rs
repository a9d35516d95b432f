use chrono::{DateTime, Utc};

use super::*;

/// Borrowed single-person inputs for paired analysis. The engine never
/// mutates a profile and the result does not outlive the borrowed charts.
#[derive(Debug, Clone, Copy)]
pub struct PersonProfile<'a> {
    pub chart: &'a BaziChart,
    pub wuxing: &'a WuXingAnalysis,
    pub dayun: &'a [DayunPeriod],
    pub birth: DateTime<Utc>,
    pub gender: Gender,
}

// Sub-score weights for the overall blend
const ELEMENT_WEIGHT: f64 = 0.30;
const STEM_BRANCH_WEIGHT: f64 = 0.25;
const YONGSHEN_WEIGHT: f64 = 0.25;
const DAYUN_WEIGHT: f64 = 0.20;

/// Scored fallback when a current decade period cannot be determined for
/// either side. Recoverable by design: a valid pair of charts always
/// produces a result.
const DAYUN_BASELINE: u8 = 50;

// Category deltas off the element sub-score
const LOVE_WEIGHT: f64 = 0.6;
const CAREER_WEIGHT: f64 = 0.4;
const WEALTH_WEIGHT: f64 = 0.5;
const HEALTH_WEIGHT: f64 = 0.3;
const FAMILY_WEIGHT: f64 = 0.7;

impl BaziEngine {
    /// Scores the compatibility of two independently computed charts.
    ///
    /// The `reference` instant selects each person's current decade period
    /// for the decade factor; it is an explicit argument so repeated calls
    /// stay reproducible.
    pub fn calculate_compatibility(
        &self,
        first: &PersonProfile,
        second: &PersonProfile,
        reference: DateTime<Utc>,
    ) -> Result<CompatibilityInfo> {
        let element_score = self.element_compatibility(first.wuxing, second.wuxing);
        let stem_branch_score = self.stem_branch_compatibility(first.chart, second.chart);
        let yongshen_score = self.yongshen_compatibility(first, second)?;
        let dayun_score = self.dayun_compatibility(first, second, reference);

        let overall_score = (f64::from(element_score) * ELEMENT_WEIGHT
            + f64::from(stem_branch_score) * STEM_BRANCH_WEIGHT
            + f64::from(yongshen_score) * YONGSHEN_WEIGHT
            + f64::from(dayun_score) * DAYUN_WEIGHT)
            .round()
            .clamp(0.0, 100.0) as u8;

        let (strengths, challenges, suggestions) = narrative(overall_score);

        Ok(CompatibilityInfo {
            overall_score,
            element_score,
            stem_branch_score,
            yongshen_score,
            dayun_score,
            love_score: category_score(element_score, LOVE_WEIGHT),
            career_score: category_score(element_score, CAREER_WEIGHT),
            wealth_score: category_score(element_score, WEALTH_WEIGHT),
            health_score: category_score(element_score, HEALTH_WEIGHT),
            family_score: category_score(element_score, FAMILY_WEIGHT),
            strengths,
            challenges,
            suggestions,
        })
    }

    /// Element factor: per element, a complementarity term rewarding one
    /// side being strong where the other is thin, and a generation term
    /// rewarding a dominant element that feeds the partner's weakest.
    fn element_compatibility(&self, first: &WuXingAnalysis, second: &WuXingAnalysis) -> u8 {
        let mut total = 0.0;
        for element in Element::all() {
            let gap = f64::from(first.count(element)) - f64::from(second.count(element));
            let complement = (gap.abs() / 4.0).min(1.0);

            let feeds = (first.strongest.generates() == element && second.weakest == element)
                || (second.strongest.generates() == element && first.weakest == element);
            let generation = if feeds { 1.0 } else { 0.0 };

            total += complement * 60.0 + generation * 40.0;
        }
        (total / ELEMENT_COUNT as f64).round().clamp(0.0, 100.0) as u8
    }

    /// Stem/branch factor: combination bonuses on the day, year and month
    /// positions, minus a penalty for every branch clash anywhere across
    /// the two charts.
    fn stem_branch_compatibility(&self, first: &BaziChart, second: &BaziChart) -> u8 {
        let mut score: f64 = 50.0;

        // Day stem combination (strongest factor)
        if first.day.stem.combines_with(second.day.stem) {
            score += 20.0;
        }
        // Day branch combination
        if first.day.branch.combines_with(second.day.branch) {
            score += 15.0;
        }
        // Year stem combination
        if first.year.stem.combines_with(second.year.stem) {
            score += 8.0;
        }
        // Month branch combination
        if first.month.branch.combines_with(second.month.branch) {
            score += 7.0;
        }

        // Clashes are scanned across every branch position, not just the
        // day pillars
        for own in first.branches() {
            for other in second.branches() {
                if own.clashes_with(other) {
                    score -= 8.0;
                }
            }
        }

        score.round().clamp(0.0, 100.0) as u8
    }

    /// Favorable-element factor: four discrete bands. Identical favorable
    /// elements score highest, a generation relation medium-high, a
    /// restraint relation low, anything else medium.
    fn yongshen_compatibility(
        &self,
        first: &PersonProfile,
        second: &PersonProfile,
    ) -> Result<u8> {
        let own = self.calculate_yongshen(first.wuxing, first.chart.day_master())?;
        let other = self.calculate_yongshen(second.wuxing, second.chart.day_master())?;

        let score = if own == other {
            90
        } else if own.generates() == other || other.generates() == own {
            75
        } else if own.restrains() == other || other.restrains() == own {
            30
        } else {
            55
        };
        Ok(score)
    }

    /// Decade factor: the same combination/clash tables applied to the two
    /// current decade pillars. Falls back to the baseline when either
    /// current period cannot be determined.
    fn dayun_compatibility(
        &self,
        first: &PersonProfile,
        second: &PersonProfile,
        reference: DateTime<Utc>,
    ) -> u8 {
        let own = self.current_dayun(first.dayun, first.birth, reference);
        let other = self.current_dayun(second.dayun, second.birth, reference);
        let (own, other) = match (own, other) {
            (Some(a), Some(b)) => (a, b),
            _ => return DAYUN_BASELINE,
        };

        let mut score: f64 = 50.0;
        if own.pillar.stem.combines_with(other.pillar.stem) {
            score += 20.0;
        }
        if own.pillar.branch.combines_with(other.pillar.branch) {
            score += 20.0;
        }
        if own.pillar.branch.clashes_with(other.pillar.branch) {
            score -= 25.0;
        }
        score.round().clamp(0.0, 100.0) as u8
    }
}

fn category_score(element_score: u8, weight: f64) -> u8 {
    (50.0 + weight * (f64::from(element_score) - 50.0))
        .round()
        .clamp(0.0, 100.0) as u8
}

const STRENGTHS_HIGH: &[&str] = &[
    "The two charts balance each other's element flow exceptionally well",
    "Natural harmony across the major pillar positions",
];
const CHALLENGES_HIGH: &[&str] =
    &["Little friction to speak of; guard against taking the ease for granted"];
const SUGGESTIONS_HIGH: &[&str] =
    &["Build on the strong foundation with shared long-term plans"];

const STRENGTHS_GOOD: &[&str] = &[
    "Solid element support between the charts",
    "Several pillar positions work in each other's favor",
];
const CHALLENGES_GOOD: &[&str] =
    &["A few positions pull in different directions and need patience"];
const SUGGESTIONS_GOOD: &[&str] =
    &["Lean on the complementary elements when differences surface"];

const STRENGTHS_FAIR: &[&str] = &["Some element exchange works in both directions"];
const CHALLENGES_FAIR: &[&str] = &[
    "The charts compete for the same element strengths",
    "Clashing positions call for deliberate accommodation",
];
const SUGGESTIONS_FAIR: &[&str] =
    &["Make room for each other's favorable element in daily decisions"];

const STRENGTHS_LOW: &[&str] = &["Differences can still sharpen each other with effort"];
const CHALLENGES_LOW: &[&str] = &[
    "Element flows run against each other in most positions",
    "Major pillar clashes dominate the pairing",
];
const SUGGESTIONS_LOW: &[&str] =
    &["Proceed deliberately and revisit expectations on both sides"];

/// Selects the narrative banks for an overall score. The text is data; only
/// the threshold bucketing is behavior.
fn narrative(overall: u8) -> (Vec<String>, Vec<String>, Vec<String>) {
    let (strengths, challenges, suggestions) = if overall >= 80 {
        (STRENGTHS_HIGH, CHALLENGES_HIGH, SUGGESTIONS_HIGH)
    } else if overall >= 60 {
        (STRENGTHS_GOOD, CHALLENGES_GOOD, SUGGESTIONS_GOOD)
    } else if overall >= 50 {
        (STRENGTHS_FAIR, CHALLENGES_FAIR, SUGGESTIONS_FAIR)
    } else {
        (STRENGTHS_LOW, CHALLENGES_LOW, SUGGESTIONS_LOW)
    };

    let owned = |bank: &[&str]| bank.iter().map(|s| s.to_string()).collect();
    (owned(strengths), owned(challenges), owned(suggestions))
}
