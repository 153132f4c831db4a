// src/recorder/naming.rs
//
// Dateinamen sind zugleich Zeitindex (Listing-API filtert lexikalisch).
// Ändert sich das Schema, muss das Listing mitgezogen werden.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

pub fn timestamp_stem<Tz: TimeZone>(when: &DateTime<Tz>, pattern: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    when.format(pattern).to_string()
}

/// `<stem>.<ext>`, or `<stem>_<n>.<ext>` with the smallest free `n` when
/// a file with that name already exists (two flushes in the same second).
pub fn unique_output_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", stem, extension));
    if !first.exists() {
        return first;
    }

    let mut n: u32 = 1;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", stem, n, extension));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn stem_is_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 11, 10, 17, 45, 59).unwrap();

        let sa = timestamp_stem(&a, "%Y_%m_%d_%H_%M_%S");
        let sb = timestamp_stem(&b, "%Y_%m_%d_%H_%M_%S");

        assert_eq!(sa, "2025_03_09_07_05_01");
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb);
    }

    #[test]
    fn legacy_day_first_pattern() {
        let a = Utc.with_ymd_and_hms(2024, 11, 9, 10, 0, 0).unwrap();
        assert_eq!(timestamp_stem(&a, "%d_%m_%Y_%H_%M_%S"), "09_11_2024_10_00_00");
    }

    #[test]
    fn collisions_get_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let stem = "2025_01_01_00_00_00";

        let p0 = unique_output_path(dir.path(), stem, "mp4");
        assert_eq!(p0.file_name().unwrap(), "2025_01_01_00_00_00.mp4");
        std::fs::write(&p0, b"x").unwrap();

        let p1 = unique_output_path(dir.path(), stem, "mp4");
        assert_eq!(p1.file_name().unwrap(), "2025_01_01_00_00_00_1.mp4");
        std::fs::write(&p1, b"x").unwrap();

        let p2 = unique_output_path(dir.path(), stem, "mp4");
        assert_eq!(p2.file_name().unwrap(), "2025_01_01_00_00_00_2.mp4");

        // Suffix sortiert hinter das Original
        assert!(p0.file_name().unwrap() < p1.file_name().unwrap());
    }
}
