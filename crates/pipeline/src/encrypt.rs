//! 필드 암호화 -- AES-256-GCM 필드 단위 암호화/복호화
//!
//! 지정된 `data` 필드의 값을 [`EncryptedSegment`]로 바꿉니다. 필드마다 96비트
//! 난수 nonce를 쓰며, 암호문/nonce/태그는 base64로 저장됩니다.
//!
//! 키는 설정의 base64 32바이트 키를 생성 시 한 번만 디코딩합니다.
//! 키가 없거나 잘못된 경우 쓰기 경로에서는 암호화를 생략하고 기록하며,
//! 복호화는 에러를 반환합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use logroute_core::event::{EncryptSelection, LogEvent, LogRequest};
use logroute_core::metrics as m;
use logroute_core::types::LogRoute;

use crate::context::PipelineContext;
use crate::error::DeliveryError;
use crate::template::is_safe_key;

/// 키 길이 (바이트)
pub const KEY_LEN: usize = 32;
/// nonce 길이 (바이트)
pub const NONCE_LEN: usize = 12;
/// GCM 태그 길이 (바이트)
pub const TAG_LEN: usize = 16;
/// 평문 자리에 남는 표식
pub const PLACEHOLDER: &str = "[ENCRYPTED]";
/// 알고리즘 이름
pub const ALGORITHM: &str = "aes-256-gcm";

/// 암호화된 필드 값
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSegment {
    /// 평문 자리 표식
    pub placeholder: String,
    /// base64 암호문 (태그 제외)
    #[serde(alias = "encrypted")]
    pub payload: String,
    /// base64 nonce
    pub iv: String,
    /// base64 인증 태그
    pub tag: String,
    /// 알고리즘
    pub algorithm: String,
}

impl EncryptedSegment {
    /// 값이 `{iv, tag, payload|encrypted}` 구조일 때만 세그먼트로 해석합니다.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_owned);
        let payload = text("payload").or_else(|| text("encrypted"))?;
        Some(Self {
            placeholder: text("placeholder").unwrap_or_else(|| PLACEHOLDER.to_owned()),
            payload,
            iv: text("iv")?,
            tag: text("tag")?,
            algorithm: text("algorithm").unwrap_or_else(|| ALGORITHM.to_owned()),
        })
    }
}

enum KeyState {
    Ready(Zeroizing<[u8; KEY_LEN]>),
    Missing,
    Invalid(String),
}

/// 필드 암호화기
pub struct FieldEncryptor {
    key: KeyState,
    context: Arc<PipelineContext>,
}

impl std::fmt::Debug for FieldEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = match &self.key {
            KeyState::Ready(_) => "ready",
            KeyState::Missing => "missing",
            KeyState::Invalid(_) => "invalid",
        };
        f.debug_struct("FieldEncryptor").field("key", &key).finish()
    }
}

impl FieldEncryptor {
    /// base64 키로 암호화기를 생성합니다. 키 문제는 생성 시점에 에러가 되지 않습니다.
    pub fn new(key_b64: Option<&str>, context: Arc<PipelineContext>) -> Self {
        let key = match key_b64.map(str::trim).filter(|k| !k.is_empty()) {
            None => KeyState::Missing,
            Some(encoded) => match decode_key(encoded) {
                Ok(key) => KeyState::Ready(key),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "encryption key is invalid, field encryption disabled");
                    KeyState::Invalid(reason)
                }
            },
        };
        Self { key, context }
    }

    /// 사용할 수 있는 키가 있는지 여부
    pub fn has_key(&self) -> bool {
        matches!(self.key, KeyState::Ready(_))
    }

    /// 암호화 대상 필드를 계산합니다.
    ///
    /// 호출 지정 필드 ∪ 라우트 필드 (또는 `All`이면 data 전체), 중복 제거,
    /// 안전한 키이면서 data에 실제로 있는 필드만 남깁니다.
    pub fn targets(request: &LogRequest, route: &LogRoute) -> Vec<String> {
        let candidates: Vec<&String> = match &request.encrypt {
            EncryptSelection::All => request.data.keys().collect(),
            EncryptSelection::Fields(fields) => route.encrypt_fields.iter().chain(fields).collect(),
            EncryptSelection::RouteOnly => route.encrypt_fields.iter().collect(),
        };

        let mut out: Vec<String> = Vec::new();
        for key in candidates {
            if !is_safe_key(key) || !request.data.contains_key(key.as_str()) {
                continue;
            }
            if !out.iter().any(|k| k == key) {
                out.push(key.clone());
            }
        }
        out
    }

    /// 대상 필드를 암호화한 이벤트를 돌려줍니다.
    ///
    /// 키가 없으면 평문 그대로 돌려주고 생략을 기록합니다. 필드 단위 실패는 해당
    /// 필드만 평문으로 남깁니다.
    pub fn encrypt(&self, mut event: LogEvent, targets: &[String]) -> LogEvent {
        if targets.is_empty() {
            return event;
        }
        let key = match &self.key {
            KeyState::Ready(key) => key,
            KeyState::Missing | KeyState::Invalid(_) => {
                tracing::warn!(
                    flag = %event.flag,
                    fields = ?targets,
                    "no usable encryption key, writing fields unencrypted"
                );
                metrics::counter!(m::ENCRYPTION_SKIPPED_TOTAL).increment(1);
                self.context.stats().record_encryption_skipped();
                return event;
            }
        };

        for field in targets {
            let Some(value) = event.data.get(field) else {
                continue;
            };
            if EncryptedSegment::from_value(value).is_some() {
                continue;
            }
            match seal(key, &plaintext(value)) {
                Ok(segment) => match serde_json::to_value(&segment) {
                    Ok(sealed) => {
                        event.data.insert(field.clone(), sealed);
                    }
                    Err(e) => self.record_encrypt_failure(&event.flag, field, &e.to_string()),
                },
                Err(reason) => self.record_encrypt_failure(&event.flag, field, &reason),
            }
        }
        event
    }

    /// 레코드의 암호화된 필드를 복호화합니다.
    ///
    /// `data` 객체가 있으면 그 안을, 없으면 레코드 자체를 살핍니다.
    /// 암호화된 필드가 하나도 복호화되지 않으면 `None`을 돌려줍니다.
    pub fn decrypt(&self, entry: &Value) -> Result<Option<BTreeMap<String, String>>, DeliveryError> {
        let key = match &self.key {
            KeyState::Ready(key) => key,
            KeyState::Missing => {
                return Err(DeliveryError::Encryption(
                    "no encryption key configured".to_owned(),
                ));
            }
            KeyState::Invalid(reason) => {
                return Err(DeliveryError::Encryption(format!(
                    "encryption key is invalid: {reason}"
                )));
            }
        };

        let Some(fields) = data_object(entry) else {
            return Ok(None);
        };

        let mut out = BTreeMap::new();
        for (name, value) in fields {
            let Some(segment) = EncryptedSegment::from_value(value) else {
                continue;
            };
            match open(key, &segment) {
                Ok(plain) => {
                    out.insert(name.clone(), plain);
                }
                Err(reason) => {
                    tracing::warn!(field = %name, reason = %reason, "failed to decrypt field, skipping");
                    self.context.stats().record_decryption_failure();
                }
            }
        }

        Ok(if out.is_empty() { None } else { Some(out) })
    }

    fn record_encrypt_failure(&self, flag: &str, field: &str, reason: &str) {
        tracing::warn!(flag = %flag, field = %field, reason = %reason, "failed to encrypt field, keeping plaintext");
        self.context.stats().record_encryption_failure();
    }
}

fn decode_key(encoded: &str) -> Result<Zeroizing<[u8; KEY_LEN]>, String> {
    let bytes = Zeroizing::new(B64.decode(encoded).map_err(|e| e.to_string())?);
    if bytes.len() != KEY_LEN {
        return Err(format!("expected {KEY_LEN} bytes, got {}", bytes.len()));
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// 저장소 레코드에서 로그 엔트리를 꺼냅니다.
///
/// 누락 경로 봉투의 `entries[]`와 write_errors 봉투의 `payload`(객체, 배열, 또는
/// JSON 문자열)를 따라 내려갑니다. 봉투가 아니면 레코드 자체가 엔트리입니다.
pub fn log_entries(record: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    collect_entries(record, 0, &mut out);
    out
}

/// 봉투 중첩 한도 (write_errors 안의 누락 경로 봉투까지)
const MAX_ENVELOPE_DEPTH: usize = 4;

fn collect_entries(record: &Value, depth: usize, out: &mut Vec<Value>) {
    let nested = if record.get("data").is_some() || depth >= MAX_ENVELOPE_DEPTH {
        None
    } else {
        record
            .get("entries")
            .filter(|entries| entries.is_array())
            .or_else(|| record.get("payload"))
    };

    match nested {
        Some(Value::Array(items)) => {
            for item in items {
                collect_entries(item, depth + 1, out);
            }
        }
        Some(inner @ Value::Object(_)) => collect_entries(inner, depth + 1, out),
        Some(Value::String(line)) => match serde_json::from_str::<Value>(line) {
            Ok(parsed @ Value::Object(_)) => collect_entries(&parsed, depth + 1, out),
            _ => out.push(record.clone()),
        },
        _ => out.push(record.clone()),
    }
}

fn data_object(entry: &Value) -> Option<&Map<String, Value>> {
    match entry.get("data") {
        Some(Value::Object(data)) => Some(data),
        _ => entry.as_object(),
    }
}

/// 문자열은 그대로, 그 외 값은 JSON 텍스트로 암호화합니다.
fn plaintext(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn seal(key: &[u8; KEY_LEN], plain: &str) -> Result<EncryptedSegment, String> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| e.to_string())?;
    let mut iv = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = aes_gcm::Nonce::from_slice(&iv);
    let sealed = cipher
        .encrypt(nonce, plain.as_bytes())
        .map_err(|e| e.to_string())?;
    if sealed.len() < TAG_LEN {
        return Err("ciphertext shorter than tag".to_owned());
    }
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    Ok(EncryptedSegment {
        placeholder: PLACEHOLDER.to_owned(),
        payload: B64.encode(ciphertext),
        iv: B64.encode(iv),
        tag: B64.encode(tag),
        algorithm: ALGORITHM.to_owned(),
    })
}

fn open(key: &[u8; KEY_LEN], segment: &EncryptedSegment) -> Result<String, String> {
    if !segment.algorithm.eq_ignore_ascii_case(ALGORITHM) {
        return Err(format!("unsupported algorithm {}", segment.algorithm));
    }
    let iv = B64.decode(&segment.iv).map_err(|e| e.to_string())?;
    if iv.len() != NONCE_LEN {
        return Err(format!("expected {NONCE_LEN}-byte iv, got {}", iv.len()));
    }
    let mut sealed = B64.decode(&segment.payload).map_err(|e| e.to_string())?;
    let tag = B64.decode(&segment.tag).map_err(|e| e.to_string())?;
    if tag.len() != TAG_LEN {
        return Err(format!("expected {TAG_LEN}-byte tag, got {}", tag.len()));
    }
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| e.to_string())?;
    let plain = Zeroizing::new(
        cipher
            .decrypt(aes_gcm::Nonce::from_slice(&iv), sealed.as_ref())
            .map_err(|e| e.to_string())?,
    );
    String::from_utf8(plain.to_vec()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn key_b64() -> String {
        B64.encode([7u8; KEY_LEN])
    }

    fn encryptor() -> FieldEncryptor {
        FieldEncryptor::new(Some(&key_b64()), Arc::new(PipelineContext::default()))
    }

    fn route(fields: &[&str]) -> LogRoute {
        let mut route = LogRoute::fallback("USER_SIGNUP", "u.log");
        route.encrypt_fields = fields.iter().map(|f| (*f).to_owned()).collect();
        route
    }

    fn event(request: &LogRequest) -> LogEvent {
        LogEvent::build(
            request,
            &route(&[]),
            chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            "test",
        )
    }

    #[test]
    fn targets_union_dedup_and_filter() {
        let request = LogRequest::new("F", "a", "m")
            .field("ssn", "1")
            .field("email", "e")
            .field("name", "n")
            .encrypt_fields(["email", "ssn", "__proto__", "absent"]);
        let targets = FieldEncryptor::targets(&request, &route(&["ssn"]));
        assert_eq!(targets, vec!["ssn".to_owned(), "email".to_owned()]);
    }

    #[test]
    fn targets_all_uses_every_data_key() {
        let request = LogRequest::new("F", "a", "m")
            .field("a", 1)
            .field("b", 2)
            .encrypt_all();
        let mut targets = FieldEncryptor::targets(&request, &route(&[]));
        targets.sort();
        assert_eq!(targets, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn encrypts_and_decrypts_fields() {
        let enc = encryptor();
        let request = LogRequest::new("F", "a", "m")
            .field("ssn", "123-45-6789")
            .field("age", 42)
            .field("public", "visible");
        let sealed = enc.encrypt(event(&request), &["ssn".to_owned(), "age".to_owned()]);

        assert_eq!(sealed.data["ssn"]["placeholder"], PLACEHOLDER);
        assert_eq!(sealed.data["ssn"]["algorithm"], ALGORITHM);
        assert_eq!(sealed.data["public"], "visible");

        let value = serde_json::to_value(&sealed).unwrap();
        let plain = enc.decrypt(&value).unwrap().unwrap();
        assert_eq!(plain["ssn"], "123-45-6789");
        assert_eq!(plain["age"], "42");
        assert!(!plain.contains_key("public"));
    }

    #[test]
    fn log_entries_descends_into_envelopes() {
        let enc = encryptor();
        let sealed = enc.encrypt(
            event(&LogRequest::new("F", "a", "m").field("ssn", "123")),
            &["ssn".to_owned()],
        );
        let entry = serde_json::to_value(&sealed).unwrap();

        let missing_path = serde_json::json!({
            "flag": "F",
            "missing": ["tenant"],
            "entries": [entry.clone(), entry.clone()],
        });
        let write_error = serde_json::json!({
            "error": "StorageFull",
            "payload": missing_path.to_string(),
        });

        assert_eq!(enc.decrypt(&missing_path).unwrap(), None);
        for record in [&missing_path, &write_error] {
            let entries = log_entries(record);
            assert_eq!(entries.len(), 2);
            for nested in &entries {
                assert_eq!(enc.decrypt(nested).unwrap().unwrap()["ssn"], "123");
            }
        }
        assert_eq!(log_entries(&entry), vec![entry.clone()]);
        assert_eq!(
            log_entries(&serde_json::json!({"payload": "plain text"})).len(),
            1
        );
    }

    #[test]
    fn nonces_differ_per_field() {
        let enc = encryptor();
        let request = LogRequest::new("F", "a", "m")
            .field("a", "same")
            .field("b", "same");
        let sealed = enc.encrypt(event(&request), &["a".to_owned(), "b".to_owned()]);
        assert_ne!(sealed.data["a"]["iv"], sealed.data["b"]["iv"]);
        assert_ne!(sealed.data["a"]["payload"], sealed.data["b"]["payload"]);
    }

    #[test]
    fn missing_key_skips_encryption_and_counts() {
        let ctx = Arc::new(PipelineContext::default());
        let enc = FieldEncryptor::new(None, Arc::clone(&ctx));
        let request = LogRequest::new("F", "a", "m").field("ssn", "1");
        let out = enc.encrypt(event(&request), &["ssn".to_owned()]);
        assert_eq!(out.data["ssn"], "1");
        assert_eq!(ctx.stats().snapshot().encryption_skipped, 1);
    }

    #[test]
    fn decrypt_without_key_is_error() {
        let enc = FieldEncryptor::new(Some("not base64!"), Arc::new(PipelineContext::default()));
        assert!(!enc.has_key());
        let err = enc.decrypt(&serde_json::json!({"data": {}})).unwrap_err();
        assert!(matches!(err, DeliveryError::Encryption(_)));

        let enc = FieldEncryptor::new(None, Arc::new(PipelineContext::default()));
        assert!(enc.decrypt(&serde_json::json!({})).is_err());
    }

    #[test]
    fn short_key_is_invalid() {
        let enc = FieldEncryptor::new(Some(&B64.encode([1u8; 16])), Arc::new(PipelineContext::default()));
        assert!(!enc.has_key());
    }

    #[test]
    fn tampered_field_is_skipped_not_fatal() {
        let ctx = Arc::new(PipelineContext::default());
        let enc = FieldEncryptor::new(Some(&key_b64()), Arc::clone(&ctx));
        let request = LogRequest::new("F", "a", "m").field("a", "x").field("b", "y");
        let sealed = enc.encrypt(event(&request), &["a".to_owned(), "b".to_owned()]);

        let mut value = serde_json::to_value(&sealed).unwrap();
        value["data"]["a"]["tag"] = Value::String(B64.encode([0u8; TAG_LEN]));

        let plain = enc.decrypt(&value).unwrap().unwrap();
        assert!(!plain.contains_key("a"));
        assert_eq!(plain["b"], "y");
        assert_eq!(ctx.stats().snapshot().decryption_failures, 1);
    }

    #[test]
    fn accepts_legacy_encrypted_field_name() {
        let enc = encryptor();
        let request = LogRequest::new("F", "a", "m").field("a", "legacy");
        let sealed = enc.encrypt(event(&request), &["a".to_owned()]);
        let segment = &sealed.data["a"];
        let legacy = serde_json::json!({
            "data": {
                "a": {
                    "encrypted": segment["payload"],
                    "iv": segment["iv"],
                    "tag": segment["tag"],
                }
            }
        });
        let plain = enc.decrypt(&legacy).unwrap().unwrap();
        assert_eq!(plain["a"], "legacy");
    }

    #[test]
    fn non_segment_objects_are_ignored() {
        let enc = encryptor();
        let entry = serde_json::json!({"data": {"obj": {"iv": "x"}, "s": "plain"}});
        assert_eq!(enc.decrypt(&entry).unwrap(), None);
    }

    proptest! {
        #[test]
        fn round_trip_any_string(text in ".*") {
            let enc = encryptor();
            let request = LogRequest::new("F", "a", "m").field("secret", text.clone());
            let sealed = enc.encrypt(event(&request), &["secret".to_owned()]);
            let plain = enc
                .decrypt(&serde_json::to_value(&sealed).unwrap())
                .unwrap()
                .unwrap();
            prop_assert_eq!(&plain["secret"], &text);
        }
    }
}
