//! Harvesting real files end to end.

use csv_harvester::{
    Field, FieldKind, HarvestError, HarvestOptions, HarvestWarning, InvalidRowPolicy, MemoryModel,
    Processor, Relation, Schema, SchemaConfig, WarningCategory,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn csv_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn schema_file(json: serde_json::Value) -> NamedTempFile {
    csv_file(json.to_string().as_bytes())
}

#[test]
fn test_schema_file_harvest_and_save() {
    let schema = schema_file(json!({
        "name": "People",
        "options": { "start_row": 2, "label_row": 1 },
        "default_filters": [{ "type": "trim" }],
        "fields": [
            { "name": "name", "type": "text", "max_length": 10, "blank": false },
            { "name": "age", "type": "integer" },
            { "name": "smoker", "type": "boolean", "default": false }
        ],
        "model": { "name": "Person", "attributes": ["name", "age", "smoker"] }
    }));
    let csv = csv_file(b"Name,Age,Smoker\n Ann ,30,yes\nBob,,unknown\n");

    let (schema, model) = SchemaConfig::from_file(schema.path())
        .unwrap()
        .into_schema()
        .unwrap();
    let model = model.unwrap();
    let mut processor = Processor::new(Arc::new(schema));
    processor.parse_file(csv.path()).unwrap();

    assert_eq!(processor.summary(), "2 rows parsed of 2 read");
    assert_eq!(
        processor.labels().unwrap().to_vec(),
        vec!["Name", "Age", "Smoker"]
    );

    processor.save().unwrap();
    assert_eq!(
        model.records(),
        vec![
            json!({"name": "Ann", "age": 30, "smoker": true, "id": 1}),
            json!({"name": "Bob", "age": null, "smoker": false, "id": 2}),
        ]
    );
}

#[test]
fn test_latin1_file_with_tabs() {
    let options = HarvestOptions {
        encoding: "iso-8859-1".to_string(),
        tabs: true,
        ..HarvestOptions::default()
    };
    let schema = Schema::builder("Companies")
        .field("name", Field::text())
        .field("city", Field::text())
        .options(options)
        .build()
        .unwrap();
    // "Société\tLyon" in ISO-8859-1
    let csv = csv_file(&[
        0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9, b'\t', b'L', b'y', b'o', b'n', b'\n',
    ]);

    let mut processor = Processor::new(Arc::new(schema));
    let records = processor.parse_file(csv.path()).unwrap();
    assert_eq!(records[0].values()["name"], json!("Société"));
    assert_eq!(records[0].values()["city"], json!("Lyon"));
}

#[test]
fn test_column_count_warnings_are_recorded() {
    let schema = Schema::builder("S")
        .field("a", Field::text())
        .field("b", Field::text())
        .field("c", Field::text().default("-"))
        .build()
        .unwrap();
    let csv = csv_file(b"1,2\n1,2,3,4\n");

    let mut processor = Processor::new(Arc::new(schema));
    let records = processor.parse_file(csv.path()).unwrap();

    assert_eq!(records[0].values()["c"], json!("-"));
    assert_eq!(
        records[0].warnings().to_vec(),
        vec![HarvestWarning::ShortRow {
            line: Some(1),
            expected: 3,
            found: 2
        }]
    );
    assert_eq!(records[1].warnings()[0].category(), WarningCategory::ColumnCountMismatch);
    assert_eq!(records[1].values()["c"], json!("3"));
}

#[test]
fn test_invalid_row_policy() {
    let csv = csv_file(b"Ann,30\nBob,thirty\nCy,5\n");
    let build = |policy| {
        Schema::builder("People")
            .field("name", Field::text())
            .field("age", Field::integer())
            .options(HarvestOptions {
                on_invalid: policy,
                ..HarvestOptions::default()
            })
            .build()
            .unwrap()
    };

    let mut strict = Processor::new(Arc::new(build(InvalidRowPolicy::Raise)));
    let err = strict.parse_file(csv.path()).unwrap_err();
    assert!(matches!(err, HarvestError::InvalidRow { line: 2, .. }));
    assert!(err.to_string().contains("thirty"));

    let mut lenient = Processor::new(Arc::new(build(InvalidRowPolicy::Skip)));
    lenient.parse_file(csv.path()).unwrap();
    assert_eq!(lenient.summary(), "2 rows parsed of 3 read (1 skipped)");
}

#[test]
fn test_relations_created_once_per_batch() {
    let regions = MemoryModel::new("Region", ["code"]);
    let venues = MemoryModel::new("Venue", ["name", "region"]);
    let schema = Schema::builder("Venues")
        .model(Arc::new(venues.clone()))
        .field("name", Field::text())
        .field(
            "region",
            Field::foreign_key(Relation::new(Arc::new(regions.clone()), "code")),
        )
        .build()
        .unwrap();
    assert!(matches!(
        schema.field("region").unwrap().kind(),
        FieldKind::ForeignKey(_)
    ));

    let csv = csv_file(b"Hall,NSW\nClub,NSW\nPark,VIC\n");
    let mut processor = Processor::new(Arc::new(schema));
    processor.parse_file(csv.path()).unwrap();
    let saved = processor.save().unwrap();

    assert_eq!(saved.len(), 3);
    assert_eq!(regions.len(), 2);
    assert_eq!(venues.records()[1]["region"], json!({"code": "NSW", "id": 1}));
    assert_eq!(venues.records()[2]["region"], json!({"code": "VIC", "id": 2}));
}

#[test]
fn test_missing_file_is_read_error() {
    let schema = Schema::builder("S").field("a", Field::text()).build().unwrap();
    let mut processor = Processor::new(Arc::new(schema));
    let err = processor.parse_file("/nonexistent/input.csv").unwrap_err();
    assert!(matches!(err, HarvestError::Reader(_)));
}
