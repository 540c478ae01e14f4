use confstore_core::Parameter;
use confstore_engine::{ConfigOp, ListMode, OpOutcome, QueryResult};
use confstore_harness::{TestStore, params};

fn regional() -> Result<TestStore, Box<dyn std::error::Error>> {
    let ts = TestStore::new()?;
    ts.publish("endpoint", "global.example.com", &[])?;
    ts.publish("endpoint", "eu.example.com", &[("region", "eu")])?;
    ts.publish("endpoint", "us.example.com", &[("region", "us")])?;
    ts.publish("endpoint", "gold.us.example.com", &[("region", "us"), ("tier", "gold")])?;
    ts.publish("endpoint", "gold.example.com", &[("tier", "gold")])?;
    Ok(ts)
}

fn scopes(results: &[QueryResult]) -> Vec<String> {
    results
        .iter()
        .filter_map(|r| r.scope.as_ref().map(|s| s.to_string()))
        .collect()
}

#[test]
fn exact_listing_matches_scope_names_exactly() -> Result<(), Box<dyn std::error::Error>> {
    let ts = regional()?;

    let results = ts
        .store
        .list("endpoint")
        .with_parameters([Parameter::any("region")])
        .execute()?;
    assert_eq!(scopes(&results), vec!["{region=eu}", "{region=us}"]);
    let values: Vec<Option<&str>> = results.iter().map(|r| r.as_text()).collect();
    assert_eq!(values, vec![Some("eu.example.com"), Some("us.example.com")]);

    Ok(())
}

#[test]
fn all_matching_listing_allows_extra_names() -> Result<(), Box<dyn std::error::Error>> {
    let ts = regional()?;

    let results = ts
        .store
        .list("endpoint")
        .with_parameters([Parameter::any("region")])
        .execute_all()?;
    let mut listed = scopes(&results);
    listed.sort();
    assert_eq!(
        listed,
        vec!["{region=eu}", "{region=us, tier=gold}", "{region=us}"]
    );

    Ok(())
}

#[test]
fn exact_values_narrow_the_listing() -> Result<(), Box<dyn std::error::Error>> {
    let ts = regional()?;

    let exact = ts
        .store
        .list("endpoint")
        .with_parameters(params(&[("region", "us")]))
        .execute()?;
    assert_eq!(scopes(&exact), vec!["{region=us}"]);

    let all = ts
        .store
        .list("endpoint")
        .with_parameters([Parameter::new("tier", "gold")])
        .execute_all()?;
    assert_eq!(all.len(), 2);

    Ok(())
}

#[test]
fn empty_filter_lists_global_scope_or_everything() -> Result<(), Box<dyn std::error::Error>> {
    let ts = regional()?;

    let exact = ts.store.list("endpoint").execute()?;
    assert_eq!(scopes(&exact), vec!["{}"]);

    let all = ts.store.list("endpoint").execute_all()?;
    assert_eq!(all.len(), 5);

    Ok(())
}

#[test]
fn listing_skips_inactive_scopes_and_absent_properties() -> Result<(), Box<dyn std::error::Error>> {
    let ts = regional()?;
    ts.store
        .set("endpoint", "ap.example.com")
        .with_parameters(params(&[("region", "ap")]))
        .execute()?;
    ts.publish("retries", 3, &[("region", "sa")])?;

    let results = ts
        .store
        .list("endpoint")
        .with_parameters([Parameter::any("region")])
        .execute()?;
    assert_eq!(scopes(&results), vec!["{region=eu}", "{region=us}"]);

    Ok(())
}

#[test]
fn listing_reports_active_revision_per_scope() -> Result<(), Box<dyn std::error::Error>> {
    let ts = regional()?;
    let eu = params(&[("region", "eu")]);
    ts.store
        .set("endpoint", "eu2.example.com")
        .with_parameters(eu.clone())
        .execute()?;

    let before = ts
        .store
        .list("endpoint")
        .with_parameters(eu.clone())
        .execute()?;
    assert_eq!(before[0].revision, Some(1));

    ts.store.activate_scope(eu.clone())?;
    let after = ts.store.list("endpoint").with_parameters(eu).execute()?;
    assert_eq!(after[0].revision, Some(2));
    assert_eq!(after[0].as_text(), Some("eu2.example.com"));

    Ok(())
}

#[test]
fn list_ops_run_inside_mixed_batches() -> Result<(), Box<dyn std::error::Error>> {
    let ts = regional()?;

    let outcomes = ts.store.execute(vec![
        ConfigOp::list("endpoint", ListMode::AllMatching)
            .with_parameters([Parameter::any("tier")]),
        ConfigOp::get("endpoint"),
    ])?;
    match &outcomes[0] {
        OpOutcome::Listed(results) => assert_eq!(results.len(), 2),
        other => panic!("expected listing, got {other:?}"),
    }
    match &outcomes[1] {
        OpOutcome::Value(result) => assert_eq!(result.as_text(), Some("global.example.com")),
        other => panic!("expected value, got {other:?}"),
    }

    Ok(())
}
