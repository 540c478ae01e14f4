use confstore_core::ConfigValue;
use confstore_engine::DefaultingStrategy;
use confstore_harness::{TestStore, params};

fn layered(strategy: DefaultingStrategy) -> Result<TestStore, Box<dyn std::error::Error>> {
    let ts = TestStore::with_strategy(strategy)?;
    ts.publish("level", "INFO", &[])?;
    ts.publish("level", "WARN", &[("env", "prod")])?;
    ts.publish("level", "ERROR", &[("env", "prod"), ("name", "t1")])?;
    Ok(ts)
}

// ============================================================================
// LOOKUP
// ============================================================================

#[test]
fn lookup_falls_back_to_enclosing_scopes() -> Result<(), Box<dyn std::error::Error>> {
    let ts = layered(DefaultingStrategy::Lookup)?;

    assert_eq!(
        ts.text("level", &[("env", "prod"), ("name", "t1")])?.as_deref(),
        Some("ERROR")
    );
    assert_eq!(
        ts.text("level", &[("env", "prod"), ("name", "t2")])?.as_deref(),
        Some("WARN")
    );
    assert_eq!(
        ts.text("level", &[("env", "dev"), ("name", "t1")])?.as_deref(),
        Some("INFO")
    );
    assert_eq!(ts.text("level", &[])?.as_deref(), Some("INFO"));

    Ok(())
}

#[test]
fn lookup_reports_serving_scope() -> Result<(), Box<dyn std::error::Error>> {
    let ts = layered(DefaultingStrategy::Lookup)?;

    let result = ts
        .store
        .get("level")
        .with_parameters(params(&[("env", "prod"), ("name", "t2")]))
        .execute()?;
    let scope = result.scope.ok_or("found result should name its scope")?;
    assert_eq!(scope.to_string(), "{env=prod}");
    assert_eq!(result.parameters.len(), 2);

    Ok(())
}

#[test]
fn lookup_strips_most_recently_supplied_parameter_first() -> Result<(), Box<dyn std::error::Error>>
{
    let ts = layered(DefaultingStrategy::Lookup)?;

    // Dropping `env` first leaves {name=t2}, which was never written, then {}.
    assert_eq!(
        ts.text("level", &[("name", "t2"), ("env", "prod")])?.as_deref(),
        Some("INFO")
    );

    Ok(())
}

#[test]
fn lookup_skips_scopes_that_were_never_activated() -> Result<(), Box<dyn std::error::Error>> {
    let ts = layered(DefaultingStrategy::Lookup)?;

    ts.store
        .set("level", "DEBUG")
        .with_parameters(params(&[("env", "prod"), ("name", "t2")]))
        .execute()?;
    assert_eq!(
        ts.text("level", &[("env", "prod"), ("name", "t2")])?.as_deref(),
        Some("WARN")
    );

    ts.store
        .activate_scope(params(&[("env", "prod"), ("name", "t2")]))?;
    assert_eq!(
        ts.text("level", &[("env", "prod"), ("name", "t2")])?.as_deref(),
        Some("DEBUG")
    );

    Ok(())
}

#[test]
fn lookup_skips_scopes_missing_the_property() -> Result<(), Box<dyn std::error::Error>> {
    let ts = layered(DefaultingStrategy::Lookup)?;
    ts.publish("timeout", 30, &[])?;

    let result = ts
        .store
        .get("timeout")
        .with_parameters(params(&[("env", "prod"), ("name", "t1")]))
        .execute()?;
    assert_eq!(result.as_integer(), Some(30));
    assert_eq!(result.revision, Some(2));

    Ok(())
}

#[test]
fn explicit_revision_reads_bypass_lookup() -> Result<(), Box<dyn std::error::Error>> {
    let ts = layered(DefaultingStrategy::Lookup)?;

    let result = ts
        .store
        .get("level")
        .with_parameters(params(&[("env", "prod"), ("name", "t2")]))
        .at_revision(1)
        .execute()?;
    assert!(!result.is_found());

    Ok(())
}

// ============================================================================
// NONE
// ============================================================================

#[test]
fn none_reads_only_the_exact_scope() -> Result<(), Box<dyn std::error::Error>> {
    let ts = layered(DefaultingStrategy::None)?;

    assert_eq!(ts.text("level", &[("env", "prod"), ("name", "t2")])?, None);
    assert_eq!(ts.text("level", &[("env", "dev")])?, None);
    assert_eq!(
        ts.text("level", &[("env", "prod"), ("name", "t1")])?.as_deref(),
        Some("ERROR")
    );
    assert_eq!(ts.text("level", &[("env", "prod")])?.as_deref(), Some("WARN"));

    Ok(())
}

#[test]
fn strategy_is_per_handle() -> Result<(), Box<dyn std::error::Error>> {
    let ts = layered(DefaultingStrategy::None)?;
    let query = params(&[("env", "prod"), ("name", "t2")]);

    assert!(!ts.store.get("level").with_parameters(query.clone()).execute()?.is_found());

    let mut ts = ts;
    ts.store.set_defaulting_strategy(DefaultingStrategy::Lookup);
    assert_eq!(ts.store.defaulting_strategy(), DefaultingStrategy::Lookup);
    let result = ts.store.get("level").with_parameters(query).execute()?;
    assert_eq!(result.as_text(), Some("WARN"));

    Ok(())
}

// ============================================================================
// UNSET and NULL
// ============================================================================

#[test]
fn unset_reads_as_present() -> Result<(), Box<dyn std::error::Error>> {
    let ts = TestStore::new()?;
    ts.publish("p", ConfigValue::Unset, &[])?;

    let result = ts.store.get("p").execute()?;
    assert!(result.is_found());
    assert!(result.is_present());
    assert!(result.is_unset());
    assert!(!result.is_null());
    assert_eq!(result.value(), Some(&ConfigValue::Unset));

    Ok(())
}

#[test]
fn null_reads_as_absent() -> Result<(), Box<dyn std::error::Error>> {
    let ts = TestStore::new()?;
    ts.publish("p", ConfigValue::Null, &[])?;

    let result = ts.store.get("p").execute()?;
    assert!(result.is_found());
    assert!(!result.is_present());
    assert!(result.is_null());
    assert_eq!(result.as_text(), None);

    Ok(())
}

#[test]
fn null_entry_stops_lookup() -> Result<(), Box<dyn std::error::Error>> {
    let ts = TestStore::with_strategy(DefaultingStrategy::Lookup)?;
    ts.publish("p", "fallback", &[])?;
    ts.publish("p", ConfigValue::Null, &[("env", "prod")])?;

    let result = ts
        .store
        .get("p")
        .with_parameters(params(&[("env", "prod")]))
        .execute()?;
    assert!(result.is_null());
    assert_eq!(
        result.scope.map(|s| s.to_string()).as_deref(),
        Some("{env=prod}")
    );

    Ok(())
}

#[test]
fn typed_values_round_trip_through_the_store() -> Result<(), Box<dyn std::error::Error>> {
    let ts = TestStore::new()?;
    let endpoint = ConfigValue::uri("https://config.example.com/v1")?;
    ts.store
        .set("endpoint", endpoint)
        .and_set("ratio", 0.25)
        .and_set("enabled", true)
        .and_set("workers", 8)
        .execute()?;
    ts.store.activate()?;

    let results = ts
        .store
        .get_many(["endpoint", "ratio", "enabled", "workers"])
        .execute_all()?;
    assert_eq!(
        results[0].as_uri().map(|u| u.as_str()),
        Some("https://config.example.com/v1")
    );
    assert_eq!(results[1].as_float(), Some(0.25));
    assert_eq!(results[2].as_boolean(), Some(true));
    assert_eq!(results[3].as_integer(), Some(8));

    Ok(())
}
