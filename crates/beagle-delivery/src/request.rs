//! Outbound request construction.
//!
//! Turns a peripheral into a flat field mapping and the mapping into a
//! `reqwest::Request` for one endpoint. `POST` endpoints receive the fields
//! as a JSON object; every other method receives them as a query string.

use beagle_core::{format_accuracy, Endpoint, PayloadError, PayloadFields, Peripheral};
use bytes::Bytes;
use reqwest::{
    header::{HeaderName, HeaderValue, CONTENT_TYPE},
    Method, Request, Url,
};

use crate::error::{DeliveryError, Result};

/// Builds the wire fields for `peripheral`, reported under target `name`.
///
/// # Errors
///
/// Returns `UnableToSerializePeripheral` when the peripheral is missing or
/// its declared kind does not match its variant.
pub fn serialize_peripheral(
    name: &str,
    peripheral: Option<&dyn Peripheral>,
) -> Result<PayloadFields> {
    let peripheral = peripheral.ok_or(PayloadError::MissingPeripheral)?;

    let mut fields = PayloadFields::new();
    fields.insert("name", name);
    fields.insert("kind", peripheral.kind().as_str());
    fields.insert("proximity", peripheral.proximity().as_str());
    fields.insert("accuracy", format_accuracy(peripheral.accuracy()));

    peripheral.write_fields(&mut fields)?;

    Ok(fields)
}

/// Encodes fields as `key=value` pairs joined by `&`.
///
/// Keys are form-escaped, values are written as-is. Returns `None` for an
/// empty mapping so that no query is attached at all.
pub fn encode_query(fields: &PayloadFields) -> Option<String> {
    if fields.is_empty() {
        return None;
    }

    let query = fields
        .iter()
        .map(|(key, value)| {
            let key: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join("&");

    Some(query)
}

/// Resolves the configured method. Empty means `GET`.
fn resolve_method(endpoint: &Endpoint) -> Result<Method> {
    let method = endpoint.method.trim().to_ascii_uppercase();
    if method.is_empty() {
        return Ok(Method::GET);
    }

    Method::from_bytes(method.as_bytes()).map_err(|_| DeliveryError::UnsupportedHttpMethod {
        method: endpoint.method.clone(),
        endpoint: endpoint.name.clone(),
    })
}

/// Builds the request that delivers `fields` to `endpoint`.
///
/// Endpoint headers are applied last and replace defaults with the same
/// name.
///
/// # Errors
///
/// - `EmptyEndpointUrl` when the endpoint has no URL
/// - `UnsupportedHttpMethod` when the method is not a valid HTTP token
/// - `RequestCreation` for unparsable URLs, invalid headers or a body that
///   fails to encode
pub fn build_request(endpoint: &Endpoint, fields: &PayloadFields) -> Result<Request> {
    if endpoint.url.is_empty() {
        return Err(DeliveryError::EmptyEndpointUrl { endpoint: endpoint.name.clone() });
    }

    let method = resolve_method(endpoint)?;
    let url = Url::parse(&endpoint.url).map_err(|e| {
        DeliveryError::request_creation(format!("invalid url {}: {e}", endpoint.url))
    })?;

    let mut request = Request::new(method, url);

    if request.method() == Method::POST {
        request.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = serde_json::to_vec(fields)
            .map_err(|e| DeliveryError::request_creation(format!("failed to encode body: {e}")))?;
        *request.body_mut() = Some(Bytes::from(body).into());
    } else {
        let query = encode_query(fields);
        request.url_mut().set_query(query.as_deref());
    }

    for (name, value) in &endpoint.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            DeliveryError::request_creation(format!("invalid header name {name:?}: {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            DeliveryError::request_creation(format!("invalid value for header {name}: {e}"))
        })?;
        request.headers_mut().insert(name, value);
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use beagle_core::{GenericPeripheral, IBeaconPeripheral, Proximity};
    use serde_json::Value;

    use super::*;

    fn beacon() -> Arc<dyn Peripheral> {
        Arc::new(IBeaconPeripheral::new("U1", 1, 2, Proximity::Near, 0.75))
    }

    fn body_json(request: &Request) -> Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).expect("request should have a body");
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn ibeacon_fields_include_identifiers() {
        let fields = serialize_peripheral("lobby", Some(beacon().as_ref())).unwrap();

        assert_eq!(fields.get("name"), Some("lobby"));
        assert_eq!(fields.get("kind"), Some("ibeacon"));
        assert_eq!(fields.get("proximity"), Some("near"));
        assert_eq!(fields.get("accuracy"), Some("0.750000"));
        assert_eq!(fields.get("uuid"), Some("U1"));
        assert_eq!(fields.get("major"), Some("1"));
        assert_eq!(fields.get("minor"), Some("2"));
    }

    #[test]
    fn generic_fields_omit_identifiers() {
        let generic = GenericPeripheral::new("g", Proximity::Far, 1.5);
        let fields = serialize_peripheral("hall", Some(&generic)).unwrap();

        assert_eq!(fields.len(), 4);
        assert_eq!(fields.get("accuracy"), Some("1.500000"));
        assert!(!fields.contains("uuid"));
        assert!(!fields.contains("major"));
        assert!(!fields.contains("minor"));
    }

    #[test]
    fn missing_peripheral_fails_serialization() {
        let err = serialize_peripheral("hall", None).unwrap_err();
        assert!(matches!(err, DeliveryError::UnableToSerializePeripheral { .. }));
    }

    #[test]
    fn mismatched_kind_fails_serialization() {
        let fake = GenericPeripheral::with_kind("k", "ibeacon", Proximity::Near, 1.0);

        let err = serialize_peripheral("hall", Some(&fake)).unwrap_err();
        assert!(matches!(err, DeliveryError::UnableToSerializePeripheral { .. }));
    }

    #[test]
    fn query_escapes_keys_but_not_values() {
        let mut fields = PayloadFields::new();
        fields.insert("a key", "x y");
        fields.insert("b", "1.000000");

        assert_eq!(encode_query(&fields).as_deref(), Some("a+key=x y&b=1.000000"));
    }

    #[test]
    fn empty_fields_produce_no_query() {
        assert_eq!(encode_query(&PayloadFields::new()), None);
    }

    #[test]
    fn post_request_carries_json_body() {
        let fields = serialize_peripheral("lobby", Some(beacon().as_ref())).unwrap();
        let endpoint = Endpoint::new("hook", "post", "http://sub/hook");

        let request = build_request(&endpoint, &fields).unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().as_str(), "http://sub/hook");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert!(request.url().query().is_none());

        let body = body_json(&request);
        assert_eq!(body["proximity"], "near");
        assert_eq!(body["accuracy"], "0.750000");
        assert_eq!(body["uuid"], "U1");
        assert_eq!(body["major"], "1");
        assert_eq!(body["minor"], "2");
    }

    #[test]
    fn get_request_carries_query_and_no_body() {
        let generic = GenericPeripheral::new("g", Proximity::Immediate, 0.1);
        let fields = serialize_peripheral("door", Some(&generic)).unwrap();
        let endpoint = Endpoint::new("hook", "Get", "http://sub/hook?stale=1");

        let request = build_request(&endpoint, &fields).unwrap();

        assert_eq!(request.method(), Method::GET);
        assert!(request.body().is_none());
        assert!(request.headers().get(CONTENT_TYPE).is_none());
        assert_eq!(
            request.url().query(),
            Some("accuracy=0.100000&kind=generic&name=door&proximity=immediate")
        );
    }

    #[test]
    fn empty_method_defaults_to_get() {
        let fields = serialize_peripheral("door", Some(beacon().as_ref())).unwrap();
        let endpoint = Endpoint::new("hook", "", "http://sub/hook");

        let request = build_request(&endpoint, &fields).unwrap();
        assert_eq!(request.method(), Method::GET);
    }

    #[test]
    fn configured_headers_override_defaults() {
        let fields = serialize_peripheral("lobby", Some(beacon().as_ref())).unwrap();
        let endpoint = Endpoint::new("hook", "POST", "http://sub/hook")
            .with_header("Content-Type", "text/plain")
            .with_header("X-Token", "secret");

        let request = build_request(&endpoint, &fields).unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(request.headers()["x-token"], "secret");
    }

    #[test]
    fn empty_url_is_rejected() {
        let fields = PayloadFields::new();
        let endpoint = Endpoint::new("hook", "POST", "");

        let err = build_request(&endpoint, &fields).unwrap_err();
        assert_eq!(err, DeliveryError::EmptyEndpointUrl { endpoint: "hook".into() });
    }

    #[test]
    fn invalid_method_is_unsupported() {
        let fields = PayloadFields::new();
        let endpoint = Endpoint::new("hook", "PO ST", "http://sub/hook");

        let err = build_request(&endpoint, &fields).unwrap_err();
        assert!(matches!(err, DeliveryError::UnsupportedHttpMethod { .. }));
    }

    #[test]
    fn unparsable_url_fails_request_creation() {
        let fields = PayloadFields::new();
        let endpoint = Endpoint::new("hook", "POST", "not a url");

        let err = build_request(&endpoint, &fields).unwrap_err();
        assert!(matches!(err, DeliveryError::RequestCreation { .. }));
    }

    #[test]
    fn invalid_header_fails_request_creation() {
        let fields = PayloadFields::new();
        let endpoint =
            Endpoint::new("hook", "POST", "http://sub/hook").with_header("X-Bad", "line\nbreak");

        let err = build_request(&endpoint, &fields).unwrap_err();
        assert!(matches!(err, DeliveryError::RequestCreation { .. }));
    }
}
