//! Verify header finalization against JSON test vectors in `test-vectors/`.
//!
//! Each case describes a request, the page and cookies of the host, and the
//! exact ordered header list the channel should receive. Order matters here
//! because it is what a host applies to the wire.

use std::sync::Arc;

use courier_core::headers::finalize_headers;
use courier_core::host::{CrossOrigin, OriginPolicy};
use courier_core::{
    merge, Body, Defaults, DocumentCookies, Environment, FormData, Method, PageOrigin, RequestConfig,
};
use serde_json::Value;

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let arr = pair.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn environment(case: &Value) -> Environment {
    let origin: Arc<dyn OriginPolicy> = match case["page"].as_str() {
        Some(page) => Arc::new(PageOrigin::parse(page).unwrap()),
        None => Arc::new(CrossOrigin),
    };
    Environment {
        cookies: Arc::new(DocumentCookies::new(case["cookies"].as_str().unwrap_or_default())),
        origin,
    }
}

fn request_config(request: &Value) -> RequestConfig {
    let method: Method = request["method"].as_str().unwrap().parse().unwrap();
    let mut config = RequestConfig::new(request["url"].as_str().unwrap()).method(method);

    for (name, value) in pairs(&request["headers"]) {
        config = config.header(name, value);
    }
    if let Some(json) = request.get("json") {
        config = config.json(json.clone());
    }
    if let Some(text) = request["text"].as_str() {
        config = config.data(Body::Text(text.to_string()));
    }
    if request.get("multipart").is_some() {
        let form = pairs(&request["multipart"])
            .into_iter()
            .fold(FormData::new(), |form, (k, v)| form.append(k, v));
        config = config.data(Body::Multipart(form));
    }
    if let Some(auth) = request["auth"].as_array() {
        config = config.auth(auth[0].as_str().unwrap(), auth[1].as_str().unwrap());
    }
    if let Some(with_credentials) = request["with_credentials"].as_bool() {
        config = config.with_credentials(with_credentials);
    }
    config
}

#[test]
fn header_test_vectors() {
    let raw = include_str!("../../test-vectors/headers.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let defaults = Defaults::standard();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let env = environment(case);

        let mut resolved = merge(&defaults, request_config(&case["request"]));
        let data = resolved.data.take();
        resolved.data = resolved.transform_request.apply(data, &mut resolved.headers);
        resolved.flatten_headers();

        let mut headers = resolved.headers.clone();
        finalize_headers(&mut headers, &resolved, &env);

        let actual: Vec<(String, String)> = headers.into_iter().collect();
        assert_eq!(actual, pairs(&case["expected_headers"]), "{name}: headers");
    }
}
