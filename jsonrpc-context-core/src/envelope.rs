//! Context envelope wire format.
//!
//! The calling side wraps the original request parameters in an envelope that
//! also carries the context deadline and metadata. The serving side removes
//! the envelope before the handler runs. The original parameters are embedded
//! unmodified.
//!
//! ```text
//! {
//!   "jctx":     "1",
//!   "deadline": "2009-11-10T23:00:00.00000015Z",
//!   "payload":  <original-params>,
//!   "meta":     <json-value>
//! }
//! ```
//!
//! Only the `jctx` marker is required. A message without it is not an
//! envelope and is passed through untouched, so peers that never wrap keep
//! working.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::context::Context;
use crate::error::ContextError;

/// The only envelope version this crate produces and accepts.
pub const WIRE_VERSION: &str = "1";

/// Name of the version marker field.
pub const VERSION_FIELD: &str = "jctx";

const TRACE_TARGET: &str = "jsonrpc_context";

/// Unix seconds of `0001-01-01T00:00:00Z`, which peers use as "no deadline".
const ZERO_TIME_UNIX: i64 = -62_135_596_800;

#[derive(Default, Serialize)]
struct WireContext<'a> {
    #[serde(rename = "jctx")]
    version: Option<String>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_deadline"
    )]
    deadline: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a RawValue>,

    #[serde(rename = "meta", skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a RawValue>,
}

fn serialize_deadline<S>(deadline: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match deadline {
        Some(deadline) => {
            serializer.serialize_str(&deadline.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        None => serializer.serialize_none(),
    }
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "lowercase")]
enum WireField {
    #[serde(rename = "jctx")]
    Version,
    Deadline,
    Payload,
    Meta,
    #[serde(other)]
    Unknown,
}

// A repeated field keeps its last value. A JSON `null` payload or meta is a
// present value, not an absent field.
impl<'de> Deserialize<'de> for WireContext<'de> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct WireVisitor;

        impl<'de> Visitor<'de> for WireVisitor {
            type Value = WireContext<'de>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a context envelope object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut wire = WireContext::default();
                while let Some(field) = map.next_key::<WireField>()? {
                    match field {
                        WireField::Version => wire.version = map.next_value()?,
                        WireField::Deadline => wire.deadline = map.next_value()?,
                        WireField::Payload => wire.payload = Some(map.next_value()?),
                        WireField::Meta => wire.metadata = Some(map.next_value()?),
                        WireField::Unknown => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(wire)
            }
        }

        deserializer.deserialize_map(WireVisitor)
    }
}

fn is_zero_time(t: &DateTime<Utc>) -> bool {
    t.timestamp() == ZERO_TIME_UNIX && t.timestamp_subsec_nanos() == 0
}

/// Wrap `params` in a context envelope for transmission.
///
/// A deadline on `ctx` is converted to UTC. Metadata attached with
/// [`Context::with_metadata`] is embedded verbatim; masked or absent metadata
/// produces no `meta` field. Empty `params` produce no `payload` field.
///
/// `method` is not part of the encoding.
///
/// # Errors
/// Returns [`ContextError::Json`] if `params` is not valid JSON.
pub fn encode(ctx: &Context, method: &str, params: &[u8]) -> Result<Bytes, ContextError> {
    let payload = if params.is_empty() {
        None
    } else {
        Some(serde_json::from_slice::<&RawValue>(params)?)
    };

    let wire = WireContext {
        version: Some(WIRE_VERSION.to_owned()),
        deadline: ctx.deadline().map(|deadline| deadline.with_timezone(&Utc)),
        payload,
        metadata: ctx.raw_metadata(),
    };

    tracing::trace!(
        target: TRACE_TARGET,
        method,
        deadline = ?wire.deadline,
        has_metadata = wire.metadata.is_some(),
        "encoding request context"
    );

    Ok(Bytes::from(serde_json::to_vec(&wire)?))
}

/// Remove the context envelope from a request, if there is one.
///
/// Returns a context derived from `ctx` together with the original
/// parameters. The derived context carries the envelope's metadata (see
/// [`Context::metadata`]) and its deadline, in UTC.
///
/// A request that is empty, is not a JSON object, fails to parse, or has no
/// `jctx` marker is returned as-is with a clone of `ctx`.
///
/// The deadline is only recorded on the context. Nothing here watches it;
/// enforcing it is the dispatcher's job.
///
/// # Errors
/// Returns [`ContextError::VersionMismatch`] if the marker is present but is
/// not [`WIRE_VERSION`].
pub fn decode(ctx: &Context, method: &str, req: Bytes) -> Result<(Context, Bytes), ContextError> {
    if req.first() != Some(&b'{') {
        return Ok((ctx.clone(), req));
    }

    let wire: WireContext<'_> = match serde_json::from_slice(&req) {
        Ok(wire) => wire,
        Err(err) => {
            tracing::trace!(
                target: TRACE_TARGET,
                method,
                error = %err,
                "request is not a context envelope"
            );
            return Ok((ctx.clone(), req));
        }
    };
    let Some(version) = wire.version else {
        tracing::trace!(target: TRACE_TARGET, method, "request has no context envelope");
        return Ok((ctx.clone(), req));
    };

    if version != WIRE_VERSION {
        return Err(ContextError::VersionMismatch(version));
    }

    let mut ctx = ctx.clone();
    if let Some(metadata) = wire.metadata {
        ctx = ctx.with_raw_metadata(metadata.to_owned());
    }
    if let Some(deadline) = wire.deadline.filter(|deadline| !is_zero_time(deadline)) {
        ctx = ctx.with_deadline(deadline);
    }

    let params = wire
        .payload
        .map(|payload| req.slice_ref(payload.get().as_bytes()))
        .unwrap_or_default();

    Ok((ctx, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Meta {
        a: u32,
        b: String,
    }

    fn json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }

    fn deadline() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 11, 10, 23, 0, 0).unwrap()
    }

    #[test]
    fn test_encode_bare_context() {
        let wire = encode(&Context::background(), "m", br#"[1,2]"#).unwrap();
        assert_eq!(&wire[..], br#"{"jctx":"1","payload":[1,2]}"#);
    }

    #[test]
    fn test_encode_empty_params_omits_payload() {
        let wire = encode(&Context::background(), "m", b"").unwrap();
        assert_eq!(&wire[..], br#"{"jctx":"1"}"#);
    }

    #[test]
    fn test_encode_deadline_format() {
        let deadline = Utc.with_ymd_and_hms(2009, 11, 10, 23, 0, 0).unwrap()
            + chrono::TimeDelta::nanoseconds(150);
        let ctx = Context::background().with_deadline(deadline);
        let wire = json(&encode(&ctx, "m", b"").unwrap());
        assert_eq!(wire[VERSION_FIELD], WIRE_VERSION);
        assert_eq!(wire["deadline"], "2009-11-10T23:00:00.000000150Z");
    }

    #[test]
    fn test_encode_metadata_verbatim() {
        let ctx = Context::background()
            .with_metadata(&Meta {
                a: 1,
                b: "x".into(),
            })
            .unwrap();
        let wire = json(&encode(&ctx, "m", b"{}").unwrap());
        assert_eq!(wire["meta"], serde_json::json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn test_encode_masked_metadata_omitted() {
        let ctx = Context::background()
            .with_metadata(&1)
            .unwrap()
            .without_metadata();
        let wire = json(&encode(&ctx, "m", b"{}").unwrap());
        assert!(wire.get("meta").is_none());
    }

    #[test]
    fn test_encode_invalid_params() {
        let err = encode(&Context::background(), "m", b"{not json").unwrap_err();
        assert!(matches!(err, ContextError::Json(_)));
    }

    #[test]
    fn test_round_trip() {
        let meta = Meta {
            a: 1,
            b: "x".into(),
        };
        let ctx = Context::background()
            .with_deadline(deadline())
            .with_metadata(&meta)
            .unwrap();
        let params = br#"{"x":[1,2,3]}"#;

        let wire = encode(&ctx, "Service.Method", params).unwrap();
        let (decoded, payload) = decode(&Context::background(), "Service.Method", wire).unwrap();

        assert_eq!(&payload[..], params);
        assert_eq!(decoded.deadline(), Some(deadline().fixed_offset()));
        assert_eq!(decoded.metadata::<Meta>().unwrap(), meta);
    }

    #[test]
    fn test_round_trip_without_deadline_or_metadata() {
        let wire = encode(&Context::background(), "m", b"[true]").unwrap();
        let (decoded, payload) = decode(&Context::background(), "m", wire).unwrap();

        assert_eq!(&payload[..], b"[true]");
        assert!(decoded.deadline().is_none());
        assert!(decoded.metadata::<u32>().unwrap_err().is_no_metadata());
    }

    #[test]
    fn test_deadline_normalized_to_utc() {
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2030, 6, 1, 17, 30, 0).unwrap();
        let ctx = Context::background().with_deadline(local);

        let wire = encode(&ctx, "m", b"").unwrap();
        assert_eq!(json(&wire)["deadline"], "2030-06-01T12:30:00Z");

        let (decoded, _) = decode(&Context::background(), "m", wire).unwrap();
        let restored = decoded.deadline().unwrap();
        assert_eq!(restored, local);
        assert_eq!(restored.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_fallback_unwrapped_messages() {
        let cases: [&[u8]; 5] = [br#"{"x":1}"#, b"[1,2,3]", b"", b"42", b"{broken"];
        for raw in cases {
            let req = Bytes::copy_from_slice(raw);
            let (ctx, params) = decode(&Context::background(), "m", req.clone()).unwrap();
            assert_eq!(params, req);
            assert!(ctx.deadline().is_none());
            assert!(!ctx.has_metadata());
        }
    }

    #[test]
    fn test_fallback_keeps_base_context() {
        let base = Context::background().with_metadata("base").unwrap();
        let (ctx, _) = decode(&base, "m", Bytes::from_static(br#"{"payload":1}"#)).unwrap();
        assert_eq!(ctx.metadata::<String>().unwrap(), "base");
    }

    #[test]
    fn test_fallback_null_or_non_string_marker() {
        let cases: [&[u8]; 2] = [br#"{"jctx":null,"payload":1}"#, br#"{"jctx":1}"#];
        for raw in cases {
            let req = Bytes::copy_from_slice(raw);
            let (_, params) = decode(&Context::background(), "m", req.clone()).unwrap();
            assert_eq!(params, req);
        }
    }

    #[test]
    fn test_version_mismatch() {
        let err = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"99"}"#),
        )
        .unwrap_err();
        assert!(matches!(err, ContextError::VersionMismatch(ref v) if v == "99"));
    }

    #[test]
    fn test_decode_envelope_without_payload() {
        let (_, params) = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"1"}"#),
        )
        .unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_decode_null_meta_is_present() {
        let base = Context::background().with_metadata("outer").unwrap();
        let (ctx, _) = decode(&base, "m", Bytes::from_static(br#"{"jctx":"1","meta":null}"#)).unwrap();
        assert!(ctx.has_metadata());
        assert_eq!(ctx.metadata::<Option<String>>().unwrap(), None);
    }

    #[test]
    fn test_decode_zero_deadline_ignored() {
        let (ctx, _) = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"1","deadline":"0001-01-01T00:00:00Z"}"#),
        )
        .unwrap();
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_decode_deadline_with_offset() {
        let (ctx, _) = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"1","deadline":"2030-11-11T04:00:00+05:00"}"#),
        )
        .unwrap();
        let restored = ctx.deadline().unwrap();
        assert_eq!(restored, deadline().fixed_offset());
        assert_eq!(restored.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_decode_payload_is_zero_copy_slice() {
        let req = Bytes::from_static(br#"{"jctx":"1","payload":{"k":"v"}}"#);
        let (_, params) = decode(&Context::background(), "m", req).unwrap();
        assert_eq!(&params[..], br#"{"k":"v"}"#);
    }

    #[test]
    fn test_decode_null_payload_is_present() {
        let (_, params) = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"1","payload":null}"#),
        )
        .unwrap();
        assert_eq!(&params[..], b"null");
    }

    #[test]
    fn test_decode_null_deadline_is_absent() {
        let (ctx, params) = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"1","payload":null,"deadline":null}"#),
        )
        .unwrap();
        assert!(ctx.deadline().is_none());
        assert_eq!(&params[..], b"null");
    }

    #[test]
    fn test_decode_repeated_field_keeps_last() {
        let (_, params) = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"1","payload":[1],"payload":[2]}"#),
        )
        .unwrap();
        assert_eq!(&params[..], b"[2]");
    }

    #[test]
    fn test_decode_repeated_version_keeps_last() {
        let err = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"1","jctx":"2"}"#),
        )
        .unwrap_err();
        assert!(err.is_version_mismatch());
        assert_eq!(err.to_string(), "invalid context version \"2\"");

        let (ctx, params) = decode(
            &Context::background(),
            "m",
            Bytes::from_static(br#"{"jctx":"2","jctx":"1","meta":{"k":1}}"#),
        )
        .unwrap();
        assert!(ctx.has_metadata());
        assert!(params.is_empty());
    }
}
