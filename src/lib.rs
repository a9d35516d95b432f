//! Four Pillars (BaZi) calculation engine.
//!
//! Converts a birth instant plus geographic longitude into the traditional
//! sexagenary chart, derives the five-element distribution and the favorable
//! element, projects the decade fortune periods, and scores the compatibility
//! of two independently computed charts. Everything is table-driven modular
//! arithmetic over fixed epochs: same input, same output, no clock reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

mod chart;
mod compatibility;
mod error;

pub use compatibility::PersonProfile;
pub use error::{Error, Result};

// ---------------------------
// ## Cycle Constants
// ---------------------------

pub const STEM_COUNT: usize = 10;
pub const BRANCH_COUNT: usize = 12;
pub const ELEMENT_COUNT: usize = 5;
/// Symbols contributing to the element histogram: 4 stems + 4 branches.
pub const SYMBOLS_PER_CHART: usize = 8;
pub const SEXAGENARY_CYCLE: usize = 60;
pub const DAYUN_PERIODS: u8 = 8;
pub const DAYUN_SPAN_YEARS: u8 = 10;

// ---------------------------
// ## Enumerations
// ---------------------------

/// One of the five elements (WuXing).
///
/// The declaration order doubles as the tie-break priority wherever a
/// strongest/weakest element is selected: Wood wins over Fire, Fire over
/// Earth, and so on down to Water.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Wood = 0,
    Fire,
    Earth,
    Metal,
    Water,
}

impl Element {
    pub fn all() -> impl Iterator<Item = Element> {
        [
            Element::Wood,
            Element::Fire,
            Element::Earth,
            Element::Metal,
            Element::Water,
        ]
        .iter()
        .copied()
    }

    /// The element this one generates (Wood feeds Fire, Fire feeds Earth, ...).
    pub fn generates(self) -> Element {
        match self {
            Element::Wood => Element::Fire,
            Element::Fire => Element::Earth,
            Element::Earth => Element::Metal,
            Element::Metal => Element::Water,
            Element::Water => Element::Wood,
        }
    }

    /// The element that generates this one.
    pub fn generated_by(self) -> Element {
        match self {
            Element::Wood => Element::Water,
            Element::Fire => Element::Wood,
            Element::Earth => Element::Fire,
            Element::Metal => Element::Earth,
            Element::Water => Element::Metal,
        }
    }

    /// The element this one restrains (Wood parts Earth, Earth dams Water, ...).
    pub fn restrains(self) -> Element {
        match self {
            Element::Wood => Element::Earth,
            Element::Fire => Element::Metal,
            Element::Earth => Element::Water,
            Element::Metal => Element::Wood,
            Element::Water => Element::Fire,
        }
    }

    /// The element that restrains this one.
    pub fn restrained_by(self) -> Element {
        match self {
            Element::Wood => Element::Metal,
            Element::Fire => Element::Water,
            Element::Earth => Element::Wood,
            Element::Metal => Element::Fire,
            Element::Water => Element::Earth,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let element_str = match self {
            Element::Wood => "Wood",
            Element::Fire => "Fire",
            Element::Earth => "Earth",
            Element::Metal => "Metal",
            Element::Water => "Water",
        };
        write!(f, "{}", element_str)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Yang,
    Yin,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Polarity::Yang => write!(f, "Yang"),
            Polarity::Yin => write!(f, "Yin"),
        }
    }
}

/// One of the 10 heavenly stems (TianGan), cycle positions 0-9.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stem {
    Jia = 0,
    Yi,
    Bing,
    Ding,
    Wu,
    Ji,
    Geng,
    Xin,
    Ren,
    Gui,
}

impl Stem {
    pub fn from_index(index: u8) -> Option<Stem> {
        match index {
            0 => Some(Stem::Jia),
            1 => Some(Stem::Yi),
            2 => Some(Stem::Bing),
            3 => Some(Stem::Ding),
            4 => Some(Stem::Wu),
            5 => Some(Stem::Ji),
            6 => Some(Stem::Geng),
            7 => Some(Stem::Xin),
            8 => Some(Stem::Ren),
            9 => Some(Stem::Gui),
            _ => None,
        }
    }

    /// Wrapping constructor: any signed offset lands on a stem, floor-safe
    /// for positions before the epoch.
    pub fn from_cycle(offset: i64) -> Stem {
        let index = offset.rem_euclid(STEM_COUNT as i64) as u8;
        Stem::from_index(index).unwrap_or(Stem::Jia)
    }

    pub fn all() -> impl Iterator<Item = Stem> {
        (0..STEM_COUNT as u8).filter_map(Stem::from_index)
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn element(self) -> Element {
        match self {
            Stem::Jia | Stem::Yi => Element::Wood,
            Stem::Bing | Stem::Ding => Element::Fire,
            Stem::Wu | Stem::Ji => Element::Earth,
            Stem::Geng | Stem::Xin => Element::Metal,
            Stem::Ren | Stem::Gui => Element::Water,
        }
    }

    /// Even cycle positions are Yang, odd are Yin.
    pub fn polarity(self) -> Polarity {
        if self.index() % 2 == 0 {
            Polarity::Yang
        } else {
            Polarity::Yin
        }
    }

    /// The five-combination table: stems five positions apart pair up
    /// (Jia-Ji, Yi-Geng, Bing-Xin, Ding-Ren, Wu-Gui).
    pub fn combines_with(self, other: Stem) -> bool {
        let (low, high) = if self.index() <= other.index() {
            (self.index(), other.index())
        } else {
            (other.index(), self.index())
        };
        matches!((low, high), (0, 5) | (1, 6) | (2, 7) | (3, 8) | (4, 9))
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stem_str = match self {
            Stem::Jia => "甲",
            Stem::Yi => "乙",
            Stem::Bing => "丙",
            Stem::Ding => "丁",
            Stem::Wu => "戊",
            Stem::Ji => "己",
            Stem::Geng => "庚",
            Stem::Xin => "辛",
            Stem::Ren => "壬",
            Stem::Gui => "癸",
        };
        write!(f, "{}", stem_str)
    }
}

/// One of the 12 earthly branches (DiZhi), cycle positions 0-11.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    Zi = 0,
    Chou,
    Yin,
    Mao,
    Chen,
    Si,
    Wu,
    Wei,
    Shen,
    You,
    Xu,
    Hai,
}

impl Branch {
    pub fn from_index(index: u8) -> Option<Branch> {
        match index {
            0 => Some(Branch::Zi),
            1 => Some(Branch::Chou),
            2 => Some(Branch::Yin),
            3 => Some(Branch::Mao),
            4 => Some(Branch::Chen),
            5 => Some(Branch::Si),
            6 => Some(Branch::Wu),
            7 => Some(Branch::Wei),
            8 => Some(Branch::Shen),
            9 => Some(Branch::You),
            10 => Some(Branch::Xu),
            11 => Some(Branch::Hai),
            _ => None,
        }
    }

    /// Wrapping constructor, floor-safe for negative offsets.
    pub fn from_cycle(offset: i64) -> Branch {
        let index = offset.rem_euclid(BRANCH_COUNT as i64) as u8;
        Branch::from_index(index).unwrap_or(Branch::Zi)
    }

    pub fn all() -> impl Iterator<Item = Branch> {
        (0..BRANCH_COUNT as u8).filter_map(Branch::from_index)
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn element(self) -> Element {
        match self {
            Branch::Yin | Branch::Mao => Element::Wood,
            Branch::Si | Branch::Wu => Element::Fire,
            Branch::Chou | Branch::Chen | Branch::Wei | Branch::Xu => Element::Earth,
            Branch::Shen | Branch::You => Element::Metal,
            Branch::Zi | Branch::Hai => Element::Water,
        }
    }

    /// The six-combination table (Zi-Chou, Yin-Hai, Mao-Xu, Chen-You,
    /// Si-Shen, Wu-Wei).
    pub fn combines_with(self, other: Branch) -> bool {
        let (low, high) = if self.index() <= other.index() {
            (self.index(), other.index())
        } else {
            (other.index(), self.index())
        };
        matches!(
            (low, high),
            (0, 1) | (2, 11) | (3, 10) | (4, 9) | (5, 8) | (6, 7)
        )
    }

    /// The six-clash table: branches six positions apart oppose each other
    /// (Zi-Wu, Chou-Wei, Yin-Shen, Mao-You, Chen-Xu, Si-Hai).
    pub fn clashes_with(self, other: Branch) -> bool {
        (self.index() + 6) % BRANCH_COUNT as u8 == other.index()
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let branch_str = match self {
            Branch::Zi => "子",
            Branch::Chou => "丑",
            Branch::Yin => "寅",
            Branch::Mao => "卯",
            Branch::Chen => "辰",
            Branch::Si => "巳",
            Branch::Wu => "午",
            Branch::Wei => "未",
            Branch::Shen => "申",
            Branch::You => "酉",
            Branch::Xu => "戌",
            Branch::Hai => "亥",
        };
        write!(f, "{}", branch_str)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Fixed decade-fortune starting age for this convention.
    pub fn dayun_start_age(self) -> u8 {
        match self {
            Gender::Male => 8,
            Gender::Female => 7,
        }
    }
}

/// Whether the day master dominates its own chart or leans on support.
/// Classified against the mean element share of the 8 symbols.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayMasterStrength {
    Strong,
    Weak,
}

// ---------------------------
// ## Structures
// ---------------------------

/// A stem-branch pillar, one of the 60 terms of the sexagenary cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GanZhi {
    pub stem: Stem,
    pub branch: Branch,
}

impl GanZhi {
    pub fn new(stem: Stem, branch: Branch) -> Self {
        GanZhi { stem, branch }
    }

    /// Builds a pillar from its sexagenary index (0-59).
    pub fn from_index(index: u8) -> Option<GanZhi> {
        if index as usize >= SEXAGENARY_CYCLE {
            return None;
        }
        Some(GanZhi {
            stem: Stem::from_cycle(i64::from(index)),
            branch: Branch::from_cycle(i64::from(index)),
        })
    }

    /// The sexagenary index of this pillar, or `None` for a stem/branch
    /// pairing that never occurs in the 60-term cycle.
    pub fn cycle_index(self) -> Option<u8> {
        (0..SEXAGENARY_CYCLE as u8).find(|i| {
            i % STEM_COUNT as u8 == self.stem.index() && i % BRANCH_COUNT as u8 == self.branch.index()
        })
    }

    /// Steps stem and branch together through their cycles; negative steps
    /// walk backward.
    pub fn stepped(self, step: i64) -> GanZhi {
        GanZhi {
            stem: Stem::from_cycle(i64::from(self.stem.index()) + step),
            branch: Branch::from_cycle(i64::from(self.branch.index()) + step),
        }
    }
}

impl fmt::Display for GanZhi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.stem, self.branch)
    }
}

/// The four pillars of a birth chart. Always fully populated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaziChart {
    pub year: GanZhi,
    pub month: GanZhi,
    pub day: GanZhi,
    pub hour: GanZhi,
}

impl BaziChart {
    /// The day stem: the chart's reference point for all analysis.
    pub fn day_master(&self) -> Stem {
        self.day.stem
    }

    pub fn pillars(&self) -> [GanZhi; 4] {
        [self.year, self.month, self.day, self.hour]
    }

    pub fn stems(&self) -> impl Iterator<Item = Stem> {
        self.pillars().into_iter().map(|p| p.stem)
    }

    pub fn branches(&self) -> impl Iterator<Item = Branch> {
        self.pillars().into_iter().map(|p| p.branch)
    }

    /// Defensive entry point for charts supplied as raw indices, in
    /// year/month/day/hour order with the stem index before the branch
    /// index for each pillar.
    pub fn from_indices(indices: [u8; 8]) -> Result<BaziChart> {
        let mut pillars = [GanZhi::new(Stem::Jia, Branch::Zi); 4];
        for (slot, pair) in pillars.iter_mut().zip(indices.chunks(2)) {
            let stem = Stem::from_index(pair[0]).ok_or(Error::InvalidSymbol(pair[0]))?;
            let branch = Branch::from_index(pair[1]).ok_or(Error::InvalidSymbol(pair[1]))?;
            *slot = GanZhi::new(stem, branch);
        }
        Ok(BaziChart {
            year: pillars[0],
            month: pillars[1],
            day: pillars[2],
            hour: pillars[3],
        })
    }
}

impl fmt::Display for BaziChart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {} {}", self.year, self.month, self.day, self.hour)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthInfo {
    pub date_time: DateTime<Utc>,
    pub longitude: f64,
    pub gender: Gender,
}

impl BirthInfo {
    pub fn generate_report(&self) -> Result<BaziReport> {
        BaziReport::calculate(self, &BaziEngine::new())
    }
}

/// Five-element distribution over the 8 chart symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WuXingAnalysis {
    /// Per-element counts in `Element` declaration order; sums to 8 for a
    /// chart-derived analysis.
    pub counts: [u8; ELEMENT_COUNT],
    /// count / 8 x 100 per element; sums to 100.
    pub percentages: [f64; ELEMENT_COUNT],
    pub strongest: Element,
    pub weakest: Element,
}

impl WuXingAnalysis {
    /// Derives percentages and the strongest/weakest labels from raw
    /// counts. Ties resolve to the earliest element in declaration order.
    pub fn from_counts(counts: [u8; ELEMENT_COUNT]) -> Self {
        let mut percentages = [0.0; ELEMENT_COUNT];
        for (pct, &count) in percentages.iter_mut().zip(counts.iter()) {
            *pct = f64::from(count) / SYMBOLS_PER_CHART as f64 * 100.0;
        }

        let mut strongest = Element::Wood;
        let mut weakest = Element::Wood;
        for element in Element::all() {
            if counts[element as usize] > counts[strongest as usize] {
                strongest = element;
            }
            if counts[element as usize] < counts[weakest as usize] {
                weakest = element;
            }
        }

        WuXingAnalysis {
            counts,
            percentages,
            strongest,
            weakest,
        }
    }

    pub fn count(&self, element: Element) -> u8 {
        self.counts[element as usize]
    }

    pub fn percentage(&self, element: Element) -> f64 {
        self.percentages[element as usize]
    }
}

impl fmt::Display for WuXingAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for element in Element::all() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", element, self.count(element))?;
            first = false;
        }
        Ok(())
    }
}

/// One ten-year fortune window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayunPeriod {
    /// 1-based position in the sequence (1-8).
    pub sequence: u8,
    pub start_age: u8,
    /// Always `start_age + 9`; periods are contiguous.
    pub end_age: u8,
    pub pillar: GanZhi,
}

impl fmt::Display for DayunPeriod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{} {}", self.start_age, self.end_age, self.pillar)
    }
}

/// Compatibility scores for a pair of charts. All scores are in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityInfo {
    pub overall_score: u8,
    pub element_score: u8,
    pub stem_branch_score: u8,
    pub yongshen_score: u8,
    pub dayun_score: u8,
    pub love_score: u8,
    pub career_score: u8,
    pub wealth_score: u8,
    pub health_score: u8,
    pub family_score: u8,
    pub strengths: Vec<String>,
    pub challenges: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Everything the single-person pipeline produces for one birth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaziReport {
    pub birth_info: BirthInfo,
    pub chart: BaziChart,
    pub wuxing: WuXingAnalysis,
    pub yongshen: Element,
    pub dayun: Vec<DayunPeriod>,
}

impl BaziReport {
    pub fn calculate(birth_info: &BirthInfo, engine: &BaziEngine) -> Result<Self> {
        // Calculate the four pillars
        let chart = engine.calculate_chart(birth_info)?;

        // Calculate the element distribution
        let wuxing = engine.calculate_wuxing(&chart);

        // Calculate the favorable element
        let yongshen = engine.calculate_yongshen(&wuxing, chart.day_master())?;

        // Calculate the decade fortune periods
        let dayun = engine.calculate_dayun(&chart, birth_info.gender);

        Ok(Self {
            birth_info: birth_info.clone(),
            chart,
            wuxing,
            yongshen,
            dayun,
        })
    }

    /// Borrowed view of this report for the compatibility engine.
    pub fn profile(&self) -> PersonProfile<'_> {
        PersonProfile {
            chart: &self.chart,
            wuxing: &self.wuxing,
            dayun: &self.dayun,
            birth: self.birth_info.date_time,
            gender: self.birth_info.gender,
        }
    }
}

// ---------------------------
// ## BaziEngine Structure
// ---------------------------

/// The calculation engine. Stateless: the symbol tables live in the closed
/// enums above, so the engine is free to construct anywhere and safe to
/// share across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaziEngine;

impl BaziEngine {
    pub fn new() -> Self {
        BaziEngine
    }
}

/// Runs the full single-person pipeline for a birth.
pub fn generate_bazi_report(engine: &BaziEngine, birth_info: &BirthInfo) -> Result<BaziReport> {
    BaziReport::calculate(birth_info, engine)
}
