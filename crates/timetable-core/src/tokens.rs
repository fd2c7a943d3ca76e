//! Fixed token tables used by the published timetable

use crate::model::WeekType;
use chrono::NaiveTime;

const WEEKDAYS: [(&str, u8); 7] = [
    ("Пн", 1),
    ("Вт", 2),
    ("Ср", 3),
    ("Чт", 4),
    ("Пт", 5),
    ("Сб", 6),
    ("Нд", 7),
];

const LESSON_NUMBERS: [(&str, u8); 10] = [
    ("I", 1),
    ("II", 2),
    ("III", 3),
    ("IV", 4),
    ("V", 5),
    ("VI", 6),
    ("VII", 7),
    ("VIII", 8),
    ("IX", 9),
    ("X", 10),
];

const WEEK_TYPES: [(&str, WeekType); 2] = [
    ("чис.", WeekType::Numerator),
    ("знам.", WeekType::Denominator),
];

const TIME_FORMATS: [&str; 3] = ["%H:%M", "%H:%M:%S", "%H.%M"];

/// Weekday abbreviation to ISO weekday (Monday = 1)
pub fn weekday(token: &str) -> Option<u8> {
    lookup(&WEEKDAYS, token)
}

/// Roman lesson ordinal to its number
pub fn lesson_number(token: &str) -> Option<u8> {
    lookup(&LESSON_NUMBERS, token)
}

/// Numerator/denominator marker to its canonical week type
pub fn week_type(token: &str) -> Option<WeekType> {
    lookup(&WEEK_TYPES, token)
}

/// Normalise a clock time to "HH:MM"
pub fn clock_time(token: &str) -> Option<String> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(token, fmt).ok())
        .map(|t| t.format("%H:%M").to_string())
}

fn lookup<T: Copy>(table: &[(&str, T)], token: &str) -> Option<T> {
    table.iter().find(|(k, _)| *k == token).map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_tokens() {
        assert_eq!(weekday("Пн"), Some(1));
        assert_eq!(weekday("Нд"), Some(7));
        assert_eq!(weekday("XX"), None);
        assert_eq!(weekday("День тижня"), None);
    }

    #[test]
    fn test_lesson_number_tokens() {
        assert_eq!(lesson_number("I"), Some(1));
        assert_eq!(lesson_number("IV"), Some(4));
        assert_eq!(lesson_number("X"), Some(10));
        assert_eq!(lesson_number("XI"), None);
        assert_eq!(lesson_number("Пара"), None);
    }

    #[test]
    fn test_week_type_tokens() {
        assert_eq!(week_type("чис."), Some(WeekType::Numerator));
        assert_eq!(week_type("знам."), Some(WeekType::Denominator));
        assert_eq!(week_type("чис"), None);
    }

    #[test]
    fn test_clock_time() {
        assert_eq!(clock_time("09:00").as_deref(), Some("09:00"));
        assert_eq!(clock_time("9:50").as_deref(), Some("09:50"));
        assert_eq!(clock_time("13:25:00").as_deref(), Some("13:25"));
        assert_eq!(clock_time("8.30").as_deref(), Some("08:30"));
        assert_eq!(clock_time("noon"), None);
    }
}
