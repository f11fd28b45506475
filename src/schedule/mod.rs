//! 触发计划
//!
//! 两个 5 字段 cron 表达式（分 时 日 月 周），在固定的 UTC 偏移下求值。
//! 支持的写法：`*`、单个数字、`a,b` 列表、`a-b` 区间，以及它们的组合（如 `1-5,7`）。
//! 周字段 0 和 7 都表示周日。
//!
//! 日和周两个字段同时受限时，任一匹配即可（与常见 cron 实现一致）。

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::config::Config;
use crate::error::ConfigError;

/// 向后查找的最大天数
const SEARCH_DAYS: i64 = 366 * 5;

/// 单个字段：允许的取值集合（位图）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// 写的是 `*`
    any: bool,
}

impl Field {
    fn parse(raw: &str, min: u32, max: u32, spec: &str, name: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSchedule {
            spec: spec.to_string(),
            reason: format!("{} 字段 '{}': {}", name, raw, reason),
        };
        let number = |text: &str| -> Result<u32, ConfigError> {
            let value: u32 = text
                .parse()
                .map_err(|_| invalid(format!("'{}' 不是数字", text)))?;
            if value < min || value > max {
                return Err(invalid(format!("{} 超出范围 {}-{}", value, min, max)));
            }
            Ok(value)
        };

        if raw == "*" {
            let bits = (min..=max).fold(0u64, |acc, v| acc | (1 << v));
            return Ok(Self { bits, any: true });
        }

        let mut bits = 0u64;
        for part in raw.split(',') {
            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (number(a)?, number(b)?),
                None => {
                    let n = number(part)?;
                    (n, n)
                }
            };
            if start > end {
                return Err(invalid(format!("区间 {}-{} 起点大于终点", start, end)));
            }
            for v in start..=end {
                bits |= 1 << v;
            }
        }
        Ok(Self { bits, any: false })
    }

    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }

    fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..64u32).filter(move |v| self.contains(*v))
    }
}

/// 解析后的 cron 表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    source: String,
    minute: Field,
    hour: Field,
    day: Field,
    month: Field,
    weekday: Field,
}

impl CronSpec {
    /// 解析 5 字段表达式
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let fields: Vec<&str> = spec.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ConfigError::InvalidSchedule {
                spec: spec.to_string(),
                reason: format!("需要 5 个字段，实际 {} 个", fields.len()),
            });
        }

        let mut weekday = Field::parse(fields[4], 0, 7, spec, "周")?;
        if weekday.contains(7) {
            weekday.bits = (weekday.bits | 1) & !(1 << 7);
        }

        Ok(Self {
            source: spec.to_string(),
            minute: Field::parse(fields[0], 0, 59, spec, "分")?,
            hour: Field::parse(fields[1], 0, 23, spec, "时")?,
            day: Field::parse(fields[2], 1, 31, spec, "日")?,
            month: Field::parse(fields[3], 1, 12, spec, "月")?,
            weekday,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        if !self.month.contains(date.month()) {
            return false;
        }
        let day_ok = self.day.contains(date.day());
        let weekday_ok = self.weekday.contains(date.weekday().num_days_from_sunday());
        match (self.day.any, self.weekday.any) {
            (true, true) => true,
            (true, false) => weekday_ok,
            (false, true) => day_ok,
            (false, false) => day_ok || weekday_ok,
        }
    }

    /// 严格晚于 `after` 的下一次触发时间（精确到分钟）
    pub fn next_after(&self, after: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let offset = *after.offset();
        let local = after.naive_local();
        let start_date = local.date();

        for day_offset in 0..SEARCH_DAYS {
            let date = start_date + Duration::days(day_offset);
            if !self.matches_date(date) {
                continue;
            }
            for hour in self.hour.values() {
                for minute in self.minute.values() {
                    let Some(candidate) = date.and_hms_opt(hour, minute, 0) else {
                        continue;
                    };
                    if candidate <= local {
                        continue;
                    }
                    if let Some(at) = offset.from_local_datetime(&candidate).single() {
                        return Some(at);
                    }
                }
            }
        }
        None
    }
}

/// 工作日和周末两个计划
#[derive(Debug, Clone)]
pub struct Schedules {
    pub weekday: CronSpec,
    pub weekend: CronSpec,
    offset: FixedOffset,
}

/// 下一次触发
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextFire {
    pub at: DateTime<FixedOffset>,
    /// 触发来源（"weekday" / "weekend"）
    pub label: &'static str,
}

impl Schedules {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let offset = config
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::InvalidSchedule {
                spec: format!("UTC{:+}", config.utc_offset_hours),
                reason: "时区偏移超出范围".to_string(),
            })?;

        Ok(Self {
            weekday: CronSpec::parse(&config.cron_weekday)?,
            weekend: CronSpec::parse(&config.cron_weekend)?,
            offset,
        })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// 两个计划中较早的下一次触发
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<NextFire> {
        let now = now.with_timezone(&self.offset);
        let weekday = self.weekday.next_after(now).map(|at| NextFire {
            at,
            label: "weekday",
        });
        let weekend = self.weekend.next_after(now).map(|at| NextFire {
            at,
            label: "weekend",
        });

        match (weekday, weekend) {
            (Some(a), Some(b)) => Some(if b.at < a.at { b } else { a }),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset_hours: i32, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_rejects_bad_specs() {
        assert!(CronSpec::parse("1 8 * *").is_err());
        assert!(CronSpec::parse("60 8 * * *").is_err());
        assert!(CronSpec::parse("1 8 * * x").is_err());
        assert!(CronSpec::parse("1 14-8 * * *").is_err());

        let err = CronSpec::parse("1 25 * * *").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchedule { .. }));
    }

    #[test]
    fn test_weekday_schedule_next_slot() {
        let spec = CronSpec::parse("1 8,12,13,14,19 * * 1-5").unwrap();

        // 2024-05-06 是周一
        let next = spec.next_after(at(7, 2024, 5, 6, 8, 30)).unwrap();
        assert_eq!(next, at(7, 2024, 5, 6, 12, 1));

        // 周五最后一个时段之后跳到下周一
        let next = spec.next_after(at(7, 2024, 5, 10, 19, 1)).unwrap();
        assert_eq!(next, at(7, 2024, 5, 13, 8, 1));
    }

    #[test]
    fn test_next_is_strictly_after() {
        let spec = CronSpec::parse("0 8 * * *").unwrap();
        let next = spec.next_after(at(7, 2024, 5, 6, 8, 0)).unwrap();
        assert_eq!(next, at(7, 2024, 5, 7, 8, 0));
    }

    #[test]
    fn test_sunday_as_seven() {
        let spec = CronSpec::parse("0 9 * * 7").unwrap();
        // 2024-05-12 是周日
        let next = spec.next_after(at(0, 2024, 5, 8, 0, 0)).unwrap();
        assert_eq!(next, at(0, 2024, 5, 12, 9, 0));
    }

    #[test]
    fn test_day_or_weekday_when_both_restricted() {
        // 每月 1 号或者每个周六
        let spec = CronSpec::parse("0 0 1 * 6").unwrap();
        let next = spec.next_after(at(0, 2024, 5, 6, 12, 0)).unwrap();
        assert_eq!(next, at(0, 2024, 5, 11, 0, 0));
        let next = spec.next_after(at(0, 2024, 5, 25, 12, 0)).unwrap();
        assert_eq!(next, at(0, 2024, 6, 1, 0, 0));
    }

    #[test]
    fn test_schedules_pick_earliest_in_offset() {
        let config = Config::default();
        let schedules = Schedules::from_config(&config).unwrap();

        // 周六 00:30 UTC = 周六 07:30 UTC+7，下一次是周末计划的 08:00
        let now = Utc.with_ymd_and_hms(2024, 5, 11, 0, 30, 0).unwrap();
        let next = schedules.next_fire(now).unwrap();
        assert_eq!(next.label, "weekend");
        assert_eq!(next.at, at(7, 2024, 5, 11, 8, 0));

        // 周五 13:00 UTC = 周五 20:00 UTC+7，工作日已结束，周末计划在周六 08:00
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap();
        let next = schedules.next_fire(now).unwrap();
        assert_eq!(next.label, "weekend");
        assert_eq!(next.at, at(7, 2024, 5, 11, 8, 0));
    }

    #[test]
    fn test_invalid_offset() {
        let mut config = Config::default();
        config.utc_offset_hours = 30;
        assert!(Schedules::from_config(&config).is_err());
    }

    #[test]
    fn test_huge_offset_is_rejected_not_overflowed() {
        let mut config = Config::default();
        for hours in [i32::MAX, i32::MIN, 1_000_000] {
            config.utc_offset_hours = hours;
            let err = Schedules::from_config(&config).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidSchedule { .. }));
        }
    }
}
