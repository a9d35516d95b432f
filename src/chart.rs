use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc};
use log::debug;

use super::*;

// Fixed calendrical anchors. These are the consumed contract, not an
// astronomical claim: years cut on the civil calendar, not on the Start of
// Spring solar term.
const YEAR_EPOCH: i32 = 1984; // stem 0 / branch 0 year
const DAY_EPOCH_STEM: i64 = 6; // anchor stem of 1900-01-01
const DAY_EPOCH_BRANCH: i64 = 10; // anchor branch of 1900-01-01
const DAY_EPOCH_DAYS_FROM_CE: i64 = 693_596; // 1900-01-01 in days since CE
const REFERENCE_MERIDIAN_DEG: f64 = 120.0;
const DEGREES_PER_HOUR: f64 = 15.0;

impl BaziEngine {
    /// Shifts a civil timestamp to apparent solar time by the longitude
    /// offset from the 120°E reference meridian.
    pub fn apparent_solar_time(
        &self,
        date_time: DateTime<Utc>,
        longitude: f64,
    ) -> Result<DateTime<Utc>> {
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidLongitude(longitude));
        }

        let offset_secs = ((longitude - REFERENCE_MERIDIAN_DEG) / DEGREES_PER_HOUR * 3600.0) as i64;
        debug!("solar time correction of {}s at longitude {}", offset_secs, longitude);

        date_time
            .checked_add_signed(ChronoDuration::seconds(offset_secs))
            .ok_or_else(|| {
                Error::InvalidTimestamp(format!("solar adjustment overflows for {}", date_time))
            })
    }

    /// Derives the four pillars from a birth. The timestamp is normalized
    /// to apparent solar time first; everything after that is modular
    /// arithmetic against the fixed epochs.
    pub fn calculate_chart(&self, birth_info: &BirthInfo) -> Result<BaziChart> {
        let solar = self.apparent_solar_time(birth_info.date_time, birth_info.longitude)?;

        let year = year_pillar(solar.year());
        let month = month_pillar(year.stem, solar.month());
        let day = day_pillar(&solar);
        let hour = hour_pillar(day.stem, solar.hour());

        Ok(BaziChart {
            year,
            month,
            day,
            hour,
        })
    }

    /// Tallies the elements of the 8 chart symbols into the five-bucket
    /// distribution.
    pub fn calculate_wuxing(&self, chart: &BaziChart) -> WuXingAnalysis {
        let mut counts = [0u8; ELEMENT_COUNT];
        for stem in chart.stems() {
            counts[stem.element() as usize] += 1;
        }
        for branch in chart.branches() {
            counts[branch.element() as usize] += 1;
        }
        WuXingAnalysis::from_counts(counts)
    }

    /// Classifies a day master as strong or weak: weak when its element
    /// count falls below the mean share across the five buckets (8/5).
    pub fn classify_day_master(
        &self,
        analysis: &WuXingAnalysis,
        day_master: Stem,
    ) -> Result<DayMasterStrength> {
        let total: u32 = analysis.counts.iter().map(|&c| u32::from(c)).sum();
        if total != SYMBOLS_PER_CHART as u32 {
            return Err(Error::InvalidDayMaster(format!(
                "element counts sum to {}, expected {}",
                total, SYMBOLS_PER_CHART
            )));
        }

        let mean = SYMBOLS_PER_CHART as f64 / ELEMENT_COUNT as f64;
        if f64::from(analysis.count(day_master.element())) < mean {
            Ok(DayMasterStrength::Weak)
        } else {
            Ok(DayMasterStrength::Strong)
        }
    }

    /// Resolves the favorable element for a day master against its
    /// distribution: a weak day master is fed by its generator, a strong
    /// one channels outward into the element it generates. A deliberately
    /// simplified two-branch heuristic.
    pub fn calculate_yongshen(
        &self,
        analysis: &WuXingAnalysis,
        day_master: Stem,
    ) -> Result<Element> {
        let element = day_master.element();
        match self.classify_day_master(analysis, day_master)? {
            DayMasterStrength::Weak => Ok(element.generated_by()),
            DayMasterStrength::Strong => Ok(element.generates()),
        }
    }

    /// Projects the 8 decade fortune periods. Direction through the
    /// sexagenary cycle follows year-stem polarity and gender; the fixed
    /// starting age follows the gender convention.
    pub fn calculate_dayun(&self, chart: &BaziChart, gender: Gender) -> Vec<DayunPeriod> {
        let forward = matches!(
            (gender, chart.year.stem.polarity()),
            (Gender::Male, Polarity::Yang) | (Gender::Female, Polarity::Yin)
        );
        debug!(
            "dayun stepping {} from {}",
            if forward { "forward" } else { "backward" },
            chart.month
        );

        let first_age = gender.dayun_start_age();
        (1..=DAYUN_PERIODS)
            .map(|sequence| {
                let step = if forward {
                    i64::from(sequence)
                } else {
                    -i64::from(sequence)
                };
                let start_age = first_age + (sequence - 1) * DAYUN_SPAN_YEARS;
                DayunPeriod {
                    sequence,
                    start_age,
                    end_age: start_age + DAYUN_SPAN_YEARS - 1,
                    pillar: chart.month.stepped(step),
                }
            })
            .collect()
    }

    /// Finds the decade period active at a reference instant, or `None`
    /// when the reference falls before the first period or past the last.
    pub fn current_dayun(
        &self,
        periods: &[DayunPeriod],
        birth: DateTime<Utc>,
        reference: DateTime<Utc>,
    ) -> Option<DayunPeriod> {
        if reference < birth {
            return None;
        }
        let age = (reference.signed_duration_since(birth).num_days() as f64 / 365.25).floor() as i64;
        periods
            .iter()
            .copied()
            .find(|p| i64::from(p.start_age) <= age && age <= i64::from(p.end_age))
    }
}

fn year_pillar(year: i32) -> GanZhi {
    let offset = i64::from(year) - i64::from(YEAR_EPOCH);
    GanZhi {
        stem: Stem::from_cycle(offset),
        branch: Branch::from_cycle(offset),
    }
}

fn month_pillar(year_stem: Stem, month: u32) -> GanZhi {
    // Month 1 opens at the Yin branch
    let branch = Branch::from_cycle(i64::from(month) + 1);

    // Five-tiger rule: the year stem fixes the stem of month 1, later
    // months step the stem cyclically
    let first_month_stem = match year_stem {
        Stem::Jia | Stem::Ji => 2,   // Bing
        Stem::Yi | Stem::Geng => 4,  // Wu
        Stem::Bing | Stem::Xin => 6, // Geng
        Stem::Ding | Stem::Ren => 8, // Ren
        Stem::Wu | Stem::Gui => 0,   // Jia
    };
    let stem = Stem::from_cycle(first_month_stem + i64::from(month) - 1);

    GanZhi { stem, branch }
}

fn day_pillar(solar: &DateTime<Utc>) -> GanZhi {
    let days = i64::from(solar.date_naive().num_days_from_ce()) - DAY_EPOCH_DAYS_FROM_CE;
    GanZhi {
        stem: Stem::from_cycle(DAY_EPOCH_STEM + days),
        branch: Branch::from_cycle(DAY_EPOCH_BRANCH + days),
    }
}

fn hour_pillar(day_stem: Stem, hour: u32) -> GanZhi {
    // Double-hour buckets; 23:00-00:59 is the opening Zi bucket. The day
    // pillar is not rolled forward for the 23:00 hour.
    let branch_index = i64::from((hour + 1) / 2) % BRANCH_COUNT as i64;

    // Five-rat rule: the day stem fixes the stem of the Zi hour
    let zi_hour_stem = match day_stem {
        Stem::Jia | Stem::Ji => 0,   // Jia
        Stem::Yi | Stem::Geng => 2,  // Bing
        Stem::Bing | Stem::Xin => 4, // Wu
        Stem::Ding | Stem::Ren => 6, // Geng
        Stem::Wu | Stem::Gui => 8,   // Ren
    };

    GanZhi {
        stem: Stem::from_cycle(zi_hour_stem + branch_index),
        branch: Branch::from_cycle(branch_index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn engine() -> BaziEngine {
        BaziEngine::new()
    }

    fn birth(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        longitude: f64,
        gender: Gender,
    ) -> BirthInfo {
        BirthInfo {
            date_time: Utc
                .with_ymd_and_hms(year, month, day, hour, minute, 0)
                .unwrap(),
            longitude,
            gender,
        }
    }

    // Beijing, 1990-06-15 14:30
    fn beijing_1990() -> BirthInfo {
        birth(1990, 6, 15, 14, 30, 116.4074, Gender::Male)
    }

    #[test]
    fn test_golden_chart_beijing_1990() {
        let chart = engine().calculate_chart(&beijing_1990()).unwrap();
        assert_eq!(chart.to_string(), "庚午 癸未 丁亥 丁未");
        assert_eq!(chart.year, GanZhi::new(Stem::Geng, Branch::Wu));
        assert_eq!(chart.month, GanZhi::new(Stem::Gui, Branch::Wei));
        assert_eq!(chart.day, GanZhi::new(Stem::Ding, Branch::Hai));
        assert_eq!(chart.hour, GanZhi::new(Stem::Ding, Branch::Wei));
        assert_eq!(chart.day_master(), Stem::Ding);
    }

    #[test]
    fn test_chart_is_deterministic() {
        let first = engine().calculate_chart(&beijing_1990()).unwrap();
        let second = engine().calculate_chart(&beijing_1990()).unwrap();
        assert_eq!(first, second);

        let report_a = beijing_1990().generate_report().unwrap();
        let report_b = beijing_1990().generate_report().unwrap();
        assert_eq!(report_a, report_b);
    }

    #[test]
    fn test_solar_time_shifts_with_longitude() {
        // 105°E sits exactly one hour west of the reference meridian
        let civil = Utc.with_ymd_and_hms(1990, 6, 15, 14, 30, 0).unwrap();
        let solar = engine().apparent_solar_time(civil, 105.0).unwrap();
        assert_eq!(solar, Utc.with_ymd_and_hms(1990, 6, 15, 13, 30, 0).unwrap());

        // The reference meridian itself is untouched
        let solar = engine().apparent_solar_time(civil, 120.0).unwrap();
        assert_eq!(solar, civil);
    }

    #[test]
    fn test_solar_time_rejects_bad_longitude() {
        let civil = Utc.with_ymd_and_hms(1990, 6, 15, 14, 30, 0).unwrap();
        assert_eq!(
            engine().apparent_solar_time(civil, 181.0),
            Err(Error::InvalidLongitude(181.0))
        );
        assert_eq!(
            engine().apparent_solar_time(civil, -200.5),
            Err(Error::InvalidLongitude(-200.5))
        );
        assert!(engine().apparent_solar_time(civil, -180.0).is_ok());
        assert!(engine().apparent_solar_time(civil, 180.0).is_ok());
    }

    #[test]
    fn test_solar_time_rejects_unrepresentable_shift() {
        // An eastward shift off the far end of the representable range
        let err = engine()
            .apparent_solar_time(DateTime::<Utc>::MAX_UTC, 180.0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(_)));
    }

    #[test]
    fn test_hour_boundary_buckets() {
        // Computed at the reference meridian so no solar shift interferes
        let late = engine()
            .calculate_chart(&birth(1990, 6, 15, 23, 0, 120.0, Gender::Male))
            .unwrap();
        let early = engine()
            .calculate_chart(&birth(1990, 6, 16, 0, 59, 120.0, Gender::Male))
            .unwrap();
        let next = engine()
            .calculate_chart(&birth(1990, 6, 16, 1, 0, 120.0, Gender::Male))
            .unwrap();

        assert_eq!(late.hour.branch, Branch::Zi);
        assert_eq!(early.hour.branch, Branch::Zi);
        assert_eq!(next.hour.branch, Branch::Chou);
    }

    #[test]
    fn test_day_pillar_before_epoch() {
        // One day before the 1900-01-01 anchor must walk the cycle
        // backward, not panic or wrap upward
        let chart = engine()
            .calculate_chart(&birth(1899, 12, 31, 12, 0, 120.0, Gender::Female))
            .unwrap();
        assert_eq!(chart.day, GanZhi::new(Stem::Ji, Branch::You));
    }

    #[test]
    fn test_wuxing_counts_and_percentages() {
        let chart = engine().calculate_chart(&beijing_1990()).unwrap();
        let analysis = engine().calculate_wuxing(&chart);

        assert_eq!(analysis.counts, [0, 3, 2, 1, 2]);
        let total: u8 = analysis.counts.iter().sum();
        assert_eq!(total as usize, SYMBOLS_PER_CHART);

        let pct_sum: f64 = analysis.percentages.iter().sum();
        assert_relative_eq!(pct_sum, 100.0, epsilon = 1e-9);
        assert_relative_eq!(analysis.percentage(Element::Fire), 37.5, epsilon = 1e-9);

        assert_eq!(analysis.strongest, Element::Fire);
        assert_eq!(analysis.weakest, Element::Wood);
    }

    #[test]
    fn test_wuxing_tie_break_uses_element_order() {
        let analysis = WuXingAnalysis::from_counts([2, 2, 2, 1, 1]);
        // Wood, Fire and Earth tie at 2: the earliest element wins
        assert_eq!(analysis.strongest, Element::Wood);
        // Metal and Water tie at 1: Metal comes first
        assert_eq!(analysis.weakest, Element::Metal);
    }

    #[test]
    fn test_strong_day_master_channels_outward() {
        let analysis = WuXingAnalysis::from_counts([4, 1, 1, 1, 1]);
        assert_eq!(analysis.strongest, Element::Wood);

        // A wood day master dominating the chart counts as strong and
        // favors the element it generates
        assert_eq!(
            engine().classify_day_master(&analysis, Stem::Jia).unwrap(),
            DayMasterStrength::Strong
        );
        let yongshen = engine().calculate_yongshen(&analysis, Stem::Jia).unwrap();
        assert_eq!(yongshen, Element::Fire);
    }

    #[test]
    fn test_weak_day_master_is_fed() {
        let analysis = WuXingAnalysis::from_counts([1, 4, 1, 1, 1]);
        // A lone wood count sits below the 1.6 mean share
        assert_eq!(
            engine().classify_day_master(&analysis, Stem::Jia).unwrap(),
            DayMasterStrength::Weak
        );
        let yongshen = engine().calculate_yongshen(&analysis, Stem::Jia).unwrap();
        assert_eq!(yongshen, Element::Water);
    }

    #[test]
    fn test_yongshen_rejects_malformed_counts() {
        let analysis = WuXingAnalysis::from_counts([1, 1, 1, 1, 1]);
        let err = engine()
            .calculate_yongshen(&analysis, Stem::Jia)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDayMaster(_)));
    }

    #[test]
    fn test_dayun_contiguity_and_start_ages() {
        let info = beijing_1990();
        let chart = engine().calculate_chart(&info).unwrap();

        for (gender, first_age) in [(Gender::Male, 8), (Gender::Female, 7)] {
            let periods = engine().calculate_dayun(&chart, gender);
            assert_eq!(periods.len(), DAYUN_PERIODS as usize);
            assert_eq!(periods[0].start_age, first_age);

            for period in &periods {
                assert_eq!(period.end_age, period.start_age + 9);
            }
            for pair in periods.windows(2) {
                assert_eq!(pair[0].end_age + 1, pair[1].start_age);
                assert_eq!(pair[0].sequence + 1, pair[1].sequence);
            }
        }
    }

    #[test]
    fn test_dayun_direction_by_polarity_and_gender() {
        let chart = engine().calculate_chart(&beijing_1990()).unwrap();
        assert_eq!(chart.year.stem.polarity(), Polarity::Yang);

        // Yang year stem: a male steps forward from the month pillar
        let male = engine().calculate_dayun(&chart, Gender::Male);
        assert_eq!(male[0].pillar, chart.month.stepped(1));
        assert_eq!(male[0].pillar.to_string(), "甲申");
        assert_eq!(male[7].pillar, chart.month.stepped(8));

        // and a female steps backward
        let female = engine().calculate_dayun(&chart, Gender::Female);
        assert_eq!(female[0].pillar, chart.month.stepped(-1));
        assert_eq!(female[0].pillar.to_string(), "壬午");
        assert_eq!(female[7].pillar, chart.month.stepped(-8));
    }

    #[test]
    fn test_current_dayun_lookup() {
        let info = beijing_1990();
        let chart = engine().calculate_chart(&info).unwrap();
        let periods = engine().calculate_dayun(&chart, Gender::Male);

        // Age 10 falls inside the first period (ages 8-17)
        let reference = Utc.with_ymd_and_hms(2000, 6, 20, 0, 0, 0).unwrap();
        let current = engine()
            .current_dayun(&periods, info.date_time, reference)
            .unwrap();
        assert_eq!(current.sequence, 1);

        // Age 5 precedes the first period
        let reference = Utc.with_ymd_and_hms(1995, 6, 15, 0, 0, 0).unwrap();
        assert!(engine()
            .current_dayun(&periods, info.date_time, reference)
            .is_none());

        // A reference before birth never resolves
        let reference = Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap();
        assert!(engine()
            .current_dayun(&periods, info.date_time, reference)
            .is_none());
    }

    #[test]
    fn test_report_serializes_round_trip() {
        let report = beijing_1990().generate_report().unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: BaziReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
