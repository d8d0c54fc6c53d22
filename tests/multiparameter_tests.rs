mod support;

use chrono::{NaiveDate, TimeZone, Utc};
use metadata_column::{
    AttributeSet, FieldSpec, FieldType, MetadataRecord, ModelError, ModelSchema, Result, Value,
};
use pretty_assertions::assert_eq;
use support::*;

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

#[test]
fn test_assigns_date_from_parts() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    tester.assign_attributes(pairs(&[
        ("date(1i)", text("1982")),
        ("date(2i)", text("10")),
        ("date(3i)", text("19")),
    ]))?;

    assert_eq!(
        tester.get("date")?,
        Value::Date(NaiveDate::from_ymd_opt(1982, 10, 19).unwrap())
    );
    Ok(())
}

#[test]
fn test_nil_parts_set_nil() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    tester.assign_attributes(pairs(&[
        ("date(1i)", Value::Null),
        ("date(2i)", Value::Null),
        ("date(3i)", Value::Null),
    ]))?;

    assert_eq!(tester.get("date")?, Value::Null);
    Ok(())
}

#[test]
fn test_empty_parts_set_nil() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    tester.assign_attributes(pairs(&[
        ("date(1i)", text("")),
        ("date(2i)", text("")),
        ("date(3i)", text("")),
    ]))?;

    assert_eq!(tester.get("date")?, Value::Null);
    Ok(())
}

#[test]
fn test_parts_mix_with_plain_attributes() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    tester.assign_attributes(pairs(&[
        ("date(3i)", text("19")),
        ("login", text("me")),
        ("date(1i)", text("1982")),
        ("untyped", text("foo")),
        ("date(2i)", text("10")),
    ]))?;

    assert_eq!(tester.get("login")?, text("me"));
    assert_eq!(tester.get("untyped")?, text("foo"));
    assert_eq!(
        tester.get("date")?,
        Value::Date(NaiveDate::from_ymd_opt(1982, 10, 19).unwrap())
    );
    Ok(())
}

#[test]
fn test_missing_trailing_parts_default_to_first() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    tester.assign_attributes(pairs(&[("date(1i)", text("1982"))]))?;

    assert_eq!(
        tester.get("date")?,
        Value::Date(NaiveDate::from_ymd_opt(1982, 1, 1).unwrap())
    );
    Ok(())
}

#[test]
fn test_timestamp_from_parts() -> Result<()> {
    let schema = ModelSchema::new("Event")
        .has_metadata_column(None, vec![FieldSpec::new("starts_at").typed(FieldType::Timestamp)])?;
    let store = users_table();
    let record = MetadataRecord::with_attributes(
        schema,
        store.new_record(),
        pairs(&[
            ("starts_at(1i)", text("2013")),
            ("starts_at(2i)", text("3")),
            ("starts_at(3i)", text("14")),
            ("starts_at(4i)", text("15")),
            ("starts_at(5i)", text("9")),
        ]),
    )?;

    assert_eq!(
        record.get("starts_at")?,
        Value::Timestamp(Utc.with_ymd_and_hms(2013, 3, 14, 15, 9, 0).unwrap())
    );
    Ok(())
}

#[test]
fn test_untyped_field_is_rejected() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    let err = tester
        .assign_attributes(pairs(&[("untyped(1)", text("foo"))]))
        .unwrap_err();

    assert!(matches!(err, ModelError::Configuration(ref msg) if msg.contains("untyped")));
    assert_eq!(tester.get("untyped")?, Value::Null);
    Ok(())
}

#[test]
fn test_out_of_bounds_index() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    let err = tester
        .assign_attributes(pairs(&[("date(0i)", text("1982"))]))
        .unwrap_err();

    assert!(matches!(err, ModelError::Index(_)));
    Ok(())
}

#[test]
fn test_failed_group_assigns_nothing() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    let err = tester
        .assign_attributes(pairs(&[
            ("login", text("me")),
            ("number(1i)", text("42")),
            ("date(1i)", text("1982")),
            ("date(2i)", text("13")),
        ]))
        .unwrap_err();

    assert!(matches!(err, ModelError::TypeMismatch(_)));
    assert_eq!(tester.get("login")?, Value::Null);
    assert_eq!(tester.get("number")?, Value::Integer(5));
    Ok(())
}

#[test]
fn test_native_composite_keys_go_to_the_host() -> Result<()> {
    let store = users_table();
    let mut tester = valid_tester(&store)?;
    let err = tester
        .assign_attributes(pairs(&[("login(1)", text("me"))]))
        .unwrap_err();

    assert!(matches!(err, ModelError::UnknownAttribute(ref name) if name == "login(1)"));
    Ok(())
}
