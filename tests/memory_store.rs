use anyhow::Result;
use serde_json::{json, Value};

use optlock::{ConfigFault, ConfigStore, ControlError, MemoryStore, OptionKind, OptionSpec, OverrideSet};

fn store() -> Result<MemoryStore> {
    let s = MemoryStore::new();
    s.declare("callback.url", OptionSpec::new(OptionKind::Str, json!("")))?;
    s.declare("callback.timeout", OptionSpec::new(OptionKind::Int, json!(5)))?;
    s.declare("timeout", OptionSpec::new(OptionKind::Int, json!(10)))?;
    Ok(s)
}

fn set(pairs: &[(&str, Value)]) -> OverrideSet {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn batch_stops_at_first_rejected_key() -> Result<()> {
    let s = store()?;

    // ascending order: callback.timeout, callback.url, timeout
    let err = s
        .update(&set(&[
            ("callback.timeout", json!(7)),
            ("callback.url", json!(42)),
            ("timeout", json!(99)),
        ]))
        .expect_err("url must be a string");
    assert_eq!(err.key(), Some("callback.url"));

    assert_eq!(s.get("callback.timeout")?, json!(7), "earlier key stays applied");
    assert_eq!(s.get("callback.url")?, json!(""));
    assert_eq!(s.get("timeout")?, json!(10), "later key is never reached");
    Ok(())
}

#[test]
fn unknown_key_is_a_config_error() -> Result<()> {
    let s = store()?;
    let err = s.update(&set(&[("nope", json!(1))])).expect_err("unknown");
    assert_eq!(err, ControlError::unknown_option("nope"));
    assert_eq!(err.http_status(), 422);
    assert_eq!(s.get("nope"), Err(ControlError::unknown_option("nope")));
    Ok(())
}

#[test]
fn null_needs_an_optional_declaration() -> Result<()> {
    let s = store()?;
    s.declare("body_size_limit", OptionSpec::new(OptionKind::Str, Value::Null).optional())?;

    s.update(&set(&[("body_size_limit", json!("3m"))]))?;
    s.update(&set(&[("body_size_limit", Value::Null)]))?;
    assert_eq!(s.get("body_size_limit")?, Value::Null);

    assert_eq!(
        s.update(&set(&[("timeout", Value::Null)])),
        Err(ControlError::config("timeout", ConfigFault::NullNotAllowed))
    );
    Ok(())
}

#[test]
fn reset_and_snapshot() -> Result<()> {
    let s = store()?;
    s.update(&set(&[("timeout", json!(11)), ("callback.url", json!("http://localhost:9090"))]))?;
    assert_eq!(
        s.snapshot(),
        set(&[
            ("callback.timeout", json!(5)),
            ("callback.url", json!("http://localhost:9090")),
            ("timeout", json!(11)),
        ])
    );

    s.reset("timeout")?;
    assert_eq!(s.get("timeout")?, json!(10));
    assert!(s.reset("missing").is_err());
    assert!(s.declare("timeout", OptionSpec::new(OptionKind::Int, json!(1))).is_err());
    assert_eq!(s.keys(), vec!["callback.timeout", "callback.url", "timeout"]);
    Ok(())
}
