//! 시각 협력자 — 현재 시각 제공과 날짜 포맷팅
//!
//! 경로 템플릿의 `{date:yyyy-MM-dd}` 같은 형식 지정자는 [`DateFormatter`]를 통해
//! 문자열로 변환됩니다. 형식 지정자는 `yyyy`, `MM`, `dd`, `HH`, `mm`, `ss`, `SSS` 같은
//! 필드 토큰과 작은따옴표로 감싼 리터럴(`'T'`)로 구성됩니다.
//! 포맷팅 실패는 `None`으로 표현하며, 호출자가 폴백 값을 선택합니다.

use std::sync::Mutex;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    /// 현재 시각
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 고정 시계 (테스트 및 재현용)
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// 지정 시각에 고정된 시계를 만듭니다.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Mutex::new(at) }
    }

    /// 시각을 바꿉니다.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.at.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 날짜 포맷터
pub trait DateFormatter: Send + Sync {
    /// 시각을 형식 지정자에 따라 문자열로 변환합니다. 실패 시 `None`.
    fn format(&self, at: DateTime<Utc>, pattern: &str) -> Option<String>;
}

/// 토큰 기반 날짜 포맷터
///
/// 형식 지정자를 chrono strftime 항목으로 번역합니다.
/// 알 수 없는 필드 토큰이나 닫히지 않은 리터럴은 실패로 처리합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternFormatter;

impl DateFormatter for PatternFormatter {
    fn format(&self, at: DateTime<Utc>, pattern: &str) -> Option<String> {
        let strftime = translate_pattern(pattern)?;
        let items: Vec<Item<'_>> = StrftimeItems::new(&strftime).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return None;
        }
        Some(at.format_with_items(items.into_iter()).to_string())
    }
}

/// 형식 지정자를 strftime 문자열로 번역합니다.
fn translate_pattern(pattern: &str) -> Option<String> {
    if pattern.is_empty() {
        return None;
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // 리터럴 구간: 닫는 따옴표까지 그대로 복사
            let close = chars[i + 1..].iter().position(|&ch| ch == '\'')?;
            for &lit in &chars[i + 1..i + 1 + close] {
                push_literal(&mut out, lit);
            }
            i += close + 2;
            continue;
        }

        if c.is_ascii_alphabetic() {
            let run = chars[i..].iter().take_while(|&&ch| ch == c).count();
            out.push_str(field_token(c, run)?);
            i += run;
            continue;
        }

        push_literal(&mut out, c);
        i += 1;
    }

    Some(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

fn field_token(c: char, run: usize) -> Option<&'static str> {
    let token = match (c, run) {
        ('y', 4) => "%Y",
        ('y', 2) => "%y",
        ('M', 1) => "%-m",
        ('M', 2) => "%m",
        ('M', 3) => "%b",
        ('M', 4) => "%B",
        ('d', 1) => "%-d",
        ('d', 2) => "%d",
        ('H', 1) => "%-H",
        ('H', 2) => "%H",
        ('h', 2) => "%I",
        ('m', 1) => "%-M",
        ('m', 2) => "%M",
        ('s', 1) => "%-S",
        ('s', 2) => "%S",
        ('S', 3) => "%3f",
        ('a', 1) => "%p",
        _ => return None,
    };
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 4, 9, 3, 5).unwrap()
    }

    #[test]
    fn formats_date_only() {
        let out = PatternFormatter.format(instant(), "yyyy-MM-dd");
        assert_eq!(out.as_deref(), Some("2024-07-04"));
    }

    #[test]
    fn formats_literals_and_time() {
        let out = PatternFormatter.format(instant(), "yyyyMMdd'T'HHmmss");
        assert_eq!(out.as_deref(), Some("20240704T090305"));
    }

    #[test]
    fn percent_is_literal() {
        let out = PatternFormatter.format(instant(), "yyyy%");
        assert_eq!(out.as_deref(), Some("2024%"));
    }

    #[test]
    fn unknown_token_fails() {
        assert!(PatternFormatter.format(instant(), "yyyy-QQ").is_none());
        assert!(PatternFormatter.format(instant(), "yyy").is_none());
    }

    #[test]
    fn unclosed_literal_fails() {
        assert!(PatternFormatter.format(instant(), "yyyy'T").is_none());
    }

    #[test]
    fn empty_spec_fails() {
        assert!(PatternFormatter.format(instant(), "").is_none());
    }

    #[test]
    fn fixed_clock_can_move() {
        let clock = FixedClock::new(instant());
        assert_eq!(clock.now(), instant());
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
