mod common;

use common::{TestWorkspace, fixture_path};
use source_profiler::{
    ProfileError,
    data::RawValue,
    sources::{self, SourceFormat, SourceOptions},
};

fn read(path: &std::path::Path) -> sources::Materialized {
    sources::read_source(path, &SourceOptions::default()).expect("read source")
}

#[test]
fn small_csv_materializes_columns_in_order() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("people.csv", "id,name\n1,Alex\n2,Ivan\n");
    let materialized = read(&path);
    assert_eq!(materialized.format, SourceFormat::Delimited);
    assert_eq!(materialized.delimiter, Some(b','));
    assert_eq!(materialized.table.headers(), vec!["id", "name"]);
    assert_eq!(materialized.table.row_count(), 2);
    assert_eq!(
        materialized.table.row(1).unwrap(),
        vec![&RawValue::text("2"), &RawValue::text("Ivan")]
    );
}

#[test]
fn semicolon_fixture_is_sniffed() {
    let materialized = read(&fixture_path("orders.csv"));
    assert_eq!(materialized.delimiter, Some(b';'));
    assert_eq!(materialized.table.columns().len(), 5);
    assert_eq!(
        materialized.table.column("amount").unwrap().values[2],
        RawValue::Missing
    );
}

#[test]
fn explicit_encoding_decodes_legacy_bytes() {
    let options = SourceOptions {
        encoding: Some("windows-1251".to_string()),
        ..SourceOptions::default()
    };
    let materialized =
        sources::read_source(&fixture_path("cities_cp1251.csv"), &options).expect("read cp1251");
    assert_eq!(materialized.encoding, Some(encoding_rs::WINDOWS_1251));
    assert_eq!(materialized.table.headers(), vec!["id", "город"]);
    assert_eq!(
        materialized.table.column("город").unwrap().values[0],
        RawValue::text("Москва")
    );
}

#[cfg(feature = "charset-detect")]
#[test]
fn legacy_encoding_is_detected_without_a_label() {
    let materialized = read(&fixture_path("cities_cp1251.csv"));
    assert_eq!(materialized.encoding, Some(encoding_rs::WINDOWS_1251));
    assert_eq!(materialized.table.headers(), vec!["id", "город"]);
    assert_eq!(
        materialized.table.column("город").unwrap().values[1],
        RawValue::text("Казань")
    );
}

#[test]
fn header_row_skips_preamble_lines() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "report.csv",
        "exported by billing\ngenerated 2024-05-01\nsku,qty\nA-1,3\nB-2,4\n",
    );
    let options = SourceOptions {
        delimiter: Some(b','),
        header_row: 2,
        ..SourceOptions::default()
    };
    let materialized = sources::read_source(&path, &options).expect("read report");
    assert_eq!(materialized.table.headers(), vec!["sku", "qty"]);
    assert_eq!(materialized.table.row_count(), 2);
}

#[test]
fn sparse_json_array_takes_the_key_union() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "users.json",
        r#"[
            {"id": 1, "name": "Alex"},
            {"id": 2, "email": "ivan@example.com"},
            {"id": 3, "name": "Mira", "email": "mira@example.com"}
        ]"#,
    );
    let table = read(&path).table;
    assert_eq!(table.headers(), vec!["id", "name", "email"]);
    assert_eq!(table.column("name").unwrap().values[1], RawValue::Missing);
    assert_eq!(table.column("email").unwrap().values[0], RawValue::Missing);
    assert_eq!(table.column("id").unwrap().values[2], RawValue::Integer(3));
}

#[test]
fn ndjson_objects_are_flattened() {
    let table = read(&fixture_path("events.ndjson")).table;
    assert_eq!(table.row_count(), 3);
    assert_eq!(
        table.headers(),
        vec!["id", "ts", "user.name", "user.tier", "ok"]
    );
    assert_eq!(table.column("user.tier").unwrap().values[1], RawValue::Missing);
    assert_eq!(table.column("ok").unwrap().values[1], RawValue::Boolean(false));
}

#[test]
fn scalar_json_document_is_unsupported() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("count.json", "42");
    let err = sources::read_source(&path, &SourceOptions::default()).unwrap_err();
    assert!(matches!(err, ProfileError::UnsupportedFormat(_)));

    let broken = workspace.write("broken.json", "[{\"id\": 1,");
    let err = sources::read_source(&broken, &SourceOptions::default()).unwrap_err();
    assert!(matches!(err, ProfileError::Malformed { .. }));
}

#[test]
fn xml_rows_use_the_dominant_element() {
    let table = read(&fixture_path("catalog.xml")).table;
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.headers(), vec!["@id", "title", "price", "published"]);
    assert_eq!(table.column("@id").unwrap().values[0], RawValue::text("bk101"));
    assert_eq!(table.column("price").unwrap().values[2], RawValue::Missing);
}

#[test]
fn xml_row_tag_can_be_forced() {
    let options = SourceOptions {
        row_tag: Some("title".to_string()),
        ..SourceOptions::default()
    };
    let table = sources::read_source(&fixture_path("catalog.xml"), &options)
        .expect("read catalog")
        .table;
    assert_eq!(table.row_count(), 3);
    assert_eq!(
        table.column("#text").unwrap().values[1],
        RawValue::text("Midnight Rain")
    );
}

#[test]
fn parquet_rows_keep_native_values() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_parquet(
        "people.parquet",
        &[(1, Some("Alex"), Some(0.5)), (2, None, Some(1.5)), (3, Some("Mira"), None)],
    );
    let materialized = read(&path);
    assert_eq!(materialized.format, SourceFormat::Parquet);
    assert_eq!(materialized.encoding, None);
    let table = materialized.table;
    assert_eq!(table.headers(), vec!["id", "name", "score"]);
    assert_eq!(table.column("id").unwrap().values[0], RawValue::Integer(1));
    assert_eq!(table.column("name").unwrap().values[1], RawValue::Missing);
    assert_eq!(table.column("score").unwrap().values[1], RawValue::Float(1.5));
    assert_eq!(table.column("score").unwrap().values[2], RawValue::Missing);
}

#[test]
fn missing_files_and_unknown_extensions_are_errors() {
    let workspace = TestWorkspace::new();
    let err = sources::read_source(&workspace.path().join("absent.csv"), &SourceOptions::default())
        .unwrap_err();
    assert!(matches!(err, ProfileError::NotFound(_)));

    let path = workspace.write("notes.docx", "not a table");
    let err = sources::read_source(&path, &SourceOptions::default()).unwrap_err();
    assert!(matches!(err, ProfileError::UnsupportedFormat(_)));
}
