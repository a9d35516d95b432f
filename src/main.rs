use bazi_core::{generate_bazi_report, BaziEngine, BirthInfo, Gender};
use chrono::{TimeZone, Utc};

fn main() {
    // Example usage
    let engine = BaziEngine::new();
    // 15th june 1990 14:30, beijing
    let birth_info = BirthInfo {
        date_time: Utc.with_ymd_and_hms(1990, 6, 15, 14, 30, 0).unwrap(),
        longitude: 116.4074,
        gender: Gender::Male,
    };

    match generate_bazi_report(&engine, &birth_info) {
        Ok(report) => println!("{:#?}", report),
        Err(e) => eprintln!("Error: {:?}", e),
    }
}
