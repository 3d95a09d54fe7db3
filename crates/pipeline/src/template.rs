//! 경로 템플릿 엔진 -- `{key}` / `{key:format}` 플레이스홀더 확장
//!
//! [`TemplateEngine`]은 라우트의 경로 템플릿을 이벤트 데이터로 확장합니다.
//!
//! # 확장 규칙
//! - 플레이스홀더 키는 `^[A-Za-z0-9_]+$`만 허용하며 `__proto__`, `constructor`,
//!   `prototype`은 항상 거부합니다.
//! - 데이터 조회는 키 대소문자를 구분하지 않습니다 (정확히 일치하는 키가 우선).
//! - 형식 지정자가 있으면 값을 시각으로 해석해 날짜 포맷터에 넘깁니다.
//!   `YYYY-MM-DD` 같은 레거시 형식은 정규 형식으로 바꿔서 사용합니다.
//! - 치환된 값은 모두 경로 세그먼트 정제를 거칩니다.
//! - 플레이스홀더가 하나라도 누락되면 경로 없이 누락 키 목록을 반환합니다.
//!
//! 성공한 확장만 캐시합니다. 누락으로 실패한 확장은 나중에 필드를 채워서
//! 다시 호출하면 성공해야 하므로 캐시하지 않습니다.

use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use logroute_core::clock::{DateFormatter, PatternFormatter};
use logroute_core::sanitize::{DefaultSanitizer, Sanitizer};

use crate::context::PipelineContext;
use crate::error::DeliveryError;

/// 데이터 키로 쓸 수 없는 예약어
pub const RESERVED_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// 경로 세그먼트 최대 길이
pub const MAX_SEGMENT_LEN: usize = 64;

/// 날짜 포맷 실패 시 사용하는 고정 값
pub const EPOCH_FALLBACK: &str = "1970-01-01";

/// 레거시 날짜 형식 -> 정규 형식
const LEGACY_DATE_FORMATS: &[(&str, &str)] = &[
    ("YYYY-MM-DD", "yyyy-MM-dd"),
    ("YYYYMMDD", "yyyyMMdd"),
    ("YYYY-MM", "yyyy-MM"),
    ("YYYY", "yyyy"),
    ("DD-MM-YYYY", "dd-MM-yyyy"),
    ("MM-DD-YYYY", "MM-dd-yyyy"),
    ("YYYY-MM-DD-HH", "yyyy-MM-dd-HH"),
    ("YYYY/MM/DD", "yyyy/MM/dd"),
];

const TOKEN_PATTERN: &str = r"\{([^{}]*)\}";

/// 템플릿에서 추출한 플레이스홀더
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    /// 데이터 키
    pub key: String,
    /// 형식 지정자
    pub format: Option<String>,
}

impl PlaceholderToken {
    /// `key` 또는 `key:format` 형태의 내부 문자열을 파싱합니다.
    ///
    /// 키가 유효하지 않으면 최선의 추정 키를 `Err`로 돌려줍니다. 공백은 키의 일부로
    /// 취급하므로 `{ tenant }`는 유효하지 않습니다. 빈 토큰 `{}`는 `"{}"`로 보고합니다.
    pub fn parse(inner: &str) -> Result<Self, String> {
        if inner.is_empty() {
            return Err("{}".to_owned());
        }
        let (key, format) = match inner.split_once(':') {
            Some((key, format)) => (key, Some(format)),
            None => (inner, None),
        };

        if !is_safe_key(key) {
            return Err(key.to_owned());
        }

        Ok(Self {
            key: key.to_owned(),
            format: format.filter(|f| !f.is_empty()).map(str::to_owned),
        })
    }
}

/// 템플릿 확장 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// 확장된 상대 경로 (누락이 있으면 `None`)
    pub path: Option<String>,
    /// 누락된 플레이스홀더 키 (등장 순서, 중복 없음)
    pub missing: Vec<String>,
}

impl Expansion {
    fn resolved(path: String) -> Self {
        Self {
            path: Some(path),
            missing: Vec::new(),
        }
    }
}

/// 경로 템플릿 엔진
pub struct TemplateEngine {
    context: Arc<PipelineContext>,
    formatter: Arc<dyn DateFormatter>,
    sanitizer: Arc<dyn Sanitizer>,
    token_re: Regex,
}

impl TemplateEngine {
    /// 협력자를 지정하여 엔진을 생성합니다.
    pub fn new(
        context: Arc<PipelineContext>,
        formatter: Arc<dyn DateFormatter>,
        sanitizer: Arc<dyn Sanitizer>,
    ) -> Result<Self, DeliveryError> {
        Ok(Self {
            context,
            formatter,
            sanitizer,
            token_re: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// 기본 날짜 포맷터와 정제기로 엔진을 생성합니다.
    pub fn with_defaults(context: Arc<PipelineContext>) -> Result<Self, DeliveryError> {
        Self::new(
            context,
            Arc::new(PatternFormatter),
            Arc::new(DefaultSanitizer),
        )
    }

    /// 템플릿에 포함된 플레이스홀더를 추출합니다.
    pub fn tokens(&self, template: &str) -> Vec<Result<PlaceholderToken, String>> {
        self.token_re
            .captures_iter(template)
            .filter_map(|caps| caps.get(1))
            .map(|inner| PlaceholderToken::parse(inner.as_str()))
            .collect()
    }

    /// 템플릿을 데이터로 확장합니다.
    pub fn expand(&self, template: &str, data: &Map<String, Value>) -> Expansion {
        let mut slots: Vec<(Range<usize>, Result<PlaceholderToken, String>)> = Vec::new();
        for caps in self.token_re.captures_iter(template) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            slots.push((whole.range(), PlaceholderToken::parse(inner.as_str())));
        }

        let lookups: Vec<Option<&Value>> = slots
            .iter()
            .map(|(_, token)| match token {
                Ok(token) => lookup(data, &token.key).filter(|v| !v.is_null()),
                Err(_) => None,
            })
            .collect();

        let cache_key = if lookups.iter().all(Option::is_some) {
            cache_key(template, &slots, &lookups)
        } else {
            None
        };
        if let Some(key) = &cache_key
            && let Some(path) = self.context.cached_template(key)
        {
            tracing::debug!(template = template, "template cache hit");
            return Expansion::resolved(path);
        }

        let mut missing: Vec<String> = Vec::new();
        let mut rendered = String::with_capacity(template.len() + 32);
        let mut last = 0;

        for ((range, token), value) in slots.iter().zip(&lookups) {
            rendered.push_str(&template[last..range.start]);
            last = range.end;

            let token = match token {
                Ok(token) => token,
                Err(best_effort) => {
                    push_unique(&mut missing, best_effort);
                    continue;
                }
            };
            let Some(value) = value else {
                push_unique(&mut missing, &token.key);
                continue;
            };

            let raw = match &token.format {
                Some(format) => self.format_date(&token.key, value, format),
                None => value_to_string(value),
            };
            let segment = sanitize_segment(self.sanitizer.as_ref(), &raw);
            if segment.is_empty() {
                push_unique(&mut missing, &token.key);
                continue;
            }
            rendered.push_str(&segment);
        }
        rendered.push_str(&template[last..]);

        if !missing.is_empty() {
            return Expansion {
                path: None,
                missing,
            };
        }

        let path = normalize_path(&rendered);
        if let Some(key) = cache_key {
            self.context.cache_template(key, path.clone());
        }
        Expansion::resolved(path)
    }

    /// 값을 시각으로 해석해 포맷합니다. 실패하면 고정 epoch 값을 씁니다.
    fn format_date(&self, key: &str, value: &Value, format: &str) -> String {
        let format = normalize_format(format);
        let formatted = parse_instant(value).and_then(|at| self.formatter.format(at, format));
        match formatted {
            Some(s) => s,
            None => {
                tracing::warn!(
                    key = key,
                    format = format,
                    "date placeholder formatting failed, using epoch fallback"
                );
                EPOCH_FALLBACK.to_owned()
            }
        }
    }

    /// 정제기 참조 (라우트 리졸버와 공유)
    pub fn sanitizer(&self) -> &dyn Sanitizer {
        self.sanitizer.as_ref()
    }

    /// 날짜 포맷터 참조
    pub fn formatter(&self) -> &dyn DateFormatter {
        self.formatter.as_ref()
    }
}

/// 데이터 키로 안전한 식별자인지 확인합니다.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_KEYS.contains(&key)
}

/// 레거시 날짜 형식을 정규 형식으로 바꿉니다.
pub fn normalize_format(format: &str) -> &str {
    LEGACY_DATE_FORMATS
        .iter()
        .find(|(legacy, _)| *legacy == format)
        .map_or(format, |(_, canonical)| *canonical)
}

/// 경로 세그먼트 정제
///
/// 허용 문자(`[A-Za-z0-9._-]`) 외에는 `_`로 바꾸고, 연속된 `_`를 합치고,
/// 앞쪽 점을 제거하고, 길이를 제한하고, 3개 이상 연속된 점을 `..`로 줄입니다.
pub fn sanitize_segment(sanitizer: &dyn Sanitizer, raw: &str) -> String {
    let first = sanitizer.sanitize_string(raw);

    let mut collapsed = String::with_capacity(first.len());
    for c in first.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    // 이 시점에서 모든 문자는 ASCII
    let mut capped: String = collapsed
        .trim_start_matches('.')
        .chars()
        .take(MAX_SEGMENT_LEN)
        .collect();

    while capped.contains("...") {
        capped = capped.replace("...", "..");
    }
    capped
}

/// 빈 세그먼트와 `.` 세그먼트를 제거합니다.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// 대소문자를 구분하지 않는 키 조회 (정확히 일치하는 키 우선)
fn lookup<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    data.get(key).or_else(|| {
        data.iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

/// RFC 3339 문자열, `YYYY-MM-DD` 문자열, epoch 밀리초 숫자를 시각으로 해석합니다.
fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|at| at.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_unique(missing: &mut Vec<String>, key: &str) {
    if !missing.iter().any(|k| k == key) {
        missing.push(key.to_owned());
    }
}

/// 템플릿과 참조된 값만으로 안정적인 캐시 키를 만듭니다.
fn cache_key(
    template: &str,
    slots: &[(Range<usize>, Result<PlaceholderToken, String>)],
    lookups: &[Option<&Value>],
) -> Option<String> {
    let referenced: Vec<(&str, Option<&str>, &Value)> = slots
        .iter()
        .zip(lookups)
        .filter_map(|((_, token), value)| {
            let token = token.as_ref().ok()?;
            Some((token.key.as_str(), token.format.as_deref(), (*value)?))
        })
        .collect();
    let serialized = serde_json::to_string(&referenced).ok()?;
    Some(format!("{template}\u{1f}{serialized}"))
}
