#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

use logroute_pipeline::{PipelineContext, TemplateEngine};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 임의의 템플릿 (라우팅 테이블 작성자 입력)
    template: String,
    /// 호출자 데이터 (최대 8개 사용)
    fields: Vec<(String, String)>,
    /// 단일 플레이스홀더에 들어갈 값 (호출자 입력)
    value: String,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(engine) = TemplateEngine::with_defaults(Arc::new(PipelineContext::new(64))) else {
        return;
    };

    let mut data = Map::new();
    for (key, value) in input.fields.into_iter().take(8) {
        data.insert(key, Value::String(value));
    }
    let _ = engine.expand(&input.template, &data);

    // 호출자 값은 하나의 세그먼트를 벗어나지 못함
    let mut single = Map::new();
    single.insert("k".to_owned(), Value::String(input.value));
    if let Some(path) = engine.expand("{k}", &single).path {
        assert!(!path.contains('/'), "value escaped its segment: {path:?}");
        assert!(!path.starts_with('.'), "hidden or parent segment: {path:?}");
    }
});
