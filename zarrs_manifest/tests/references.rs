#![allow(missing_docs)]

use std::num::NonZeroU64;

use serde_json::{json, Value};
use zarrs_manifest::metadata::v2::MetadataV2;
use zarrs_manifest::metadata::{Attributes, ChunkKeySeparator};
use zarrs_manifest::reference::{
    NestedReferences, ReferenceFormat, ReferenceOptions, ReferenceTable, References,
};
use zarrs_manifest::{
    ArrayEncoding, ChunkEntry, ChunkManifest, CodecRegistry, LoadedArray, MalformedReferenceError,
    ManifestArray, ShapeError, Variable, VirtualArray, VirtualDataset,
};

fn attributes(value: Value) -> Attributes {
    value.as_object().unwrap().clone()
}

fn chunk_shape(chunk_shape: &[u64]) -> Vec<NonZeroU64> {
    chunk_shape
        .iter()
        .map(|&s| NonZeroU64::new(s).unwrap())
        .collect()
}

fn temperature() -> ManifestArray {
    let encoding = ArrayEncoding::new("<f4".into(), chunk_shape(&[2, 3]), f64::NAN.into())
        .with_compressor(Some(MetadataV2::new("zlib")));
    let manifest = ChunkManifest::new(
        vec![2, 2],
        [
            (vec![0, 0], Some(ChunkEntry::new("s3://bucket/a.nc", 1024, 512))),
            (vec![0, 1], Some(ChunkEntry::new("s3://bucket/a.nc", 1536, 480))),
            (vec![1, 0], None),
            (vec![1, 1], Some(ChunkEntry::new_inline(vec![0u8; 12]))),
        ],
    )
    .unwrap();
    ManifestArray::new(vec![3, 5], encoding, manifest).unwrap()
}

fn time() -> ManifestArray {
    let encoding = ArrayEncoding::new("<i8".into(), chunk_shape(&[3]), 0i64.into());
    let manifest =
        ChunkManifest::from_present(vec![1], [(vec![0], ChunkEntry::new("s3://bucket/a.nc", 0, 24))])
            .unwrap();
    ManifestArray::new(vec![3], encoding, manifest).unwrap()
}

fn dataset() -> VirtualDataset {
    VirtualDataset::new()
        .with_variable(
            "temperature",
            Variable::new(temperature(), ["time", "x"])
                .unwrap()
                .with_attributes(attributes(json!({"units": "K", "scale_factor": 0.5}))),
        )
        .unwrap()
        .with_variable("time", Variable::new(time(), ["time"]).unwrap())
        .unwrap()
        .with_attributes(attributes(json!({"title": "surface temperature"})))
}

fn read(references: &References) -> Result<VirtualDataset, MalformedReferenceError> {
    VirtualDataset::from_references(references, &CodecRegistry::default())
}

#[test]
fn references_round_trip() {
    let ds = dataset();
    for format in [ReferenceFormat::Nested, ReferenceFormat::Columnar] {
        for separator in [ChunkKeySeparator::Dot, ChunkKeySeparator::Slash] {
            let options = ReferenceOptions::default().with_chunk_key_separator(separator);
            let references = ds.to_references(format, &options);
            assert_eq!(references.format(), format);
            assert_eq!(read(&references).unwrap(), ds);
        }
    }
}

#[test]
fn references_round_trip_json() {
    let ds = dataset();
    let References::Nested(nested) =
        ds.to_references(ReferenceFormat::Nested, &ReferenceOptions::default())
    else {
        panic!()
    };
    let nested = NestedReferences::from_json_str(&nested.to_json_string()).unwrap();
    assert_eq!(read(&nested.into()).unwrap(), ds);

    let References::Columnar(table) =
        ds.to_references(ReferenceFormat::Columnar, &ReferenceOptions::default())
    else {
        panic!()
    };
    assert_eq!(table.len(), 4);
    let table = ReferenceTable::from_json_str(&table.to_json_string()).unwrap();
    assert_eq!(read(&table.into()).unwrap(), ds);
}

#[test]
fn nested_references_document() {
    let References::Nested(nested) =
        dataset().to_references(ReferenceFormat::Nested, &ReferenceOptions::default())
    else {
        panic!()
    };
    let refs = nested.refs();
    assert_eq!(nested.version(), 1);
    assert_eq!(
        refs.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            ".zgroup",
            ".zattrs",
            "temperature/.zarray",
            "temperature/.zattrs",
            "time/.zarray",
            "time/.zattrs",
            "temperature/0.0",
            "temperature/0.1",
            "temperature/1.1",
            "time/0",
        ]
    );
    let zarray: Value =
        serde_json::from_str(refs["temperature/.zarray"].as_str().unwrap()).unwrap();
    assert_eq!(zarray["shape"], json!([3, 5]));
    assert_eq!(zarray["chunks"], json!([2, 3]));
    assert_eq!(zarray["fill_value"], json!("NaN"));
    assert_eq!(zarray["compressor"], json!({"id": "zlib"}));
    let zattrs: Value =
        serde_json::from_str(refs["temperature/.zattrs"].as_str().unwrap()).unwrap();
    assert_eq!(zattrs["_ARRAY_DIMENSIONS"], json!(["time", "x"]));
    assert_eq!(refs["temperature/0.1"], json!(["s3://bucket/a.nc", 1536, 480]));
    assert_eq!(refs["temperature/1.1"], json!("base64:AAAAAAAAAAAAAAAA"));
}

#[test]
fn nested_references_templates() {
    let ds = dataset();
    let options = ReferenceOptions::default().with_path_templates(true);
    let References::Nested(nested) = ds.to_references(ReferenceFormat::Nested, &options) else {
        panic!()
    };
    assert_eq!(nested.templates().len(), 1);
    assert_eq!(nested.templates()["u0"], "s3://bucket/a.nc");
    assert_eq!(nested.refs()["time/0"], json!(["{{u0}}", 0, 24]));
    assert_eq!(read(&nested.into()).unwrap(), ds);
}

#[test]
fn loaded_variable_round_trip() {
    let data: Vec<u8> = (0..12).collect();
    let loaded = LoadedArray::new(vec![3], "<i4".into(), 0i64.into(), data.clone()).unwrap();
    let ds = VirtualDataset::new()
        .with_variable("x", Variable::new(loaded.clone(), ["x"]).unwrap())
        .unwrap();
    for format in [ReferenceFormat::Nested, ReferenceFormat::Columnar] {
        let read_back = read(&ds.to_references(format, &ReferenceOptions::default())).unwrap();
        assert_eq!(read_back, ds);
        assert_eq!(
            read_back.variable("x").unwrap().array(),
            &VirtualArray::Loaded(loaded.clone())
        );
    }

    let References::Nested(nested) =
        ds.to_references(ReferenceFormat::Nested, &ReferenceOptions::default())
    else {
        panic!()
    };
    let zattrs: Value =
        serde_json::from_str(nested.refs()["x/.zattrs"].as_str().unwrap()).unwrap();
    assert_eq!(zattrs["_LOADED_ARRAY"], json!(true));
    assert_eq!(nested.refs()["x/0"], json!(ChunkEntry::encode_inline(&data)));
}

#[test]
fn loaded_variable_malformed() {
    let loaded_zattrs = |loaded: Value| {
        Value::String(json!({"_ARRAY_DIMENSIONS": ["x"], "_LOADED_ARRAY": loaded}).to_string())
    };
    let compressed = nested(json!({
        "x/.zarray": zarray(&[3], &[3], json!({"id": "zlib"})),
        "x/.zattrs": loaded_zattrs(json!(true)),
        "x/0": "base64:AAAAAAAAAAAAAAAA",
    }));
    assert!(matches!(
        read(&compressed),
        Err(MalformedReferenceError::InvalidMetadata { key, .. }) if key == "x/.zattrs"
    ));
    let referenced = nested(json!({
        "x/.zarray": zarray(&[3], &[3], Value::Null),
        "x/.zattrs": loaded_zattrs(json!(true)),
        "x/0": ["data.nc", 0, 24],
    }));
    assert!(matches!(
        read(&referenced),
        Err(MalformedReferenceError::InvalidMetadata { key, .. }) if key == "x/.zattrs"
    ));
    let not_a_flag = nested(json!({
        "x/.zarray": zarray(&[3], &[3], Value::Null),
        "x/.zattrs": loaded_zattrs(json!("yes")),
    }));
    assert!(matches!(
        read(&not_a_flag),
        Err(MalformedReferenceError::InvalidMetadata { key, .. }) if key == "x/.zattrs"
    ));
    let manifest = nested(json!({
        "x/.zarray": zarray(&[3], &[3], Value::Null),
        "x/.zattrs": loaded_zattrs(json!(false)),
        "x/0": ["data.nc", 0, 24],
    }));
    let ds = read(&manifest).unwrap();
    assert!(ds.variable("x").unwrap().array().as_manifest().is_some());
    assert!(ds.variable("x").unwrap().attributes().is_empty());
}

#[test]
fn scalar_empty_and_escaped_path_round_trip() {
    let scalar = ManifestArray::new(
        vec![],
        ArrayEncoding::new("<f8".into(), vec![], f64::NAN.into()),
        ChunkManifest::from_present(vec![], [(vec![], ChunkEntry::new("scalar.nc", 8, 8))])
            .unwrap(),
    )
    .unwrap();
    let empty = ManifestArray::new(
        vec![0, 4],
        ArrayEncoding::new("<i2".into(), chunk_shape(&[2, 4]), 0i64.into()),
        ChunkManifest::new_absent(vec![0, 1]).unwrap(),
    )
    .unwrap();
    let loaded_scalar =
        LoadedArray::new(vec![], "<i4".into(), 0i64.into(), 7i32.to_le_bytes().to_vec()).unwrap();
    let loaded_empty = LoadedArray::new(vec![0], "<f4".into(), 0i64.into(), Vec::new()).unwrap();
    let unusual_paths = ManifestArray::new(
        vec![6],
        ArrayEncoding::new("<f4".into(), chunk_shape(&[2]), 0i64.into()),
        ChunkManifest::from_present(
            vec![3],
            [
                (vec![0], ChunkEntry::new("base64:AAAA", 0, 8)),
                (vec![1], ChunkEntry::new("path:data.nc", 8, 8)),
                (vec![2], ChunkEntry::new_inline(vec![1u8; 8])),
            ],
        )
        .unwrap(),
    )
    .unwrap();
    let no_dimensions: [&str; 0] = [];
    let ds = VirtualDataset::new()
        .with_variable("scalar", Variable::new(scalar, no_dimensions).unwrap())
        .unwrap()
        .with_variable("empty", Variable::new(empty, ["t", "x"]).unwrap())
        .unwrap()
        .with_variable(
            "loaded_scalar",
            Variable::new(loaded_scalar, no_dimensions).unwrap(),
        )
        .unwrap()
        .with_variable("loaded_empty", Variable::new(loaded_empty, ["t"]).unwrap())
        .unwrap()
        .with_variable("paths", Variable::new(unusual_paths, ["y"]).unwrap())
        .unwrap();
    assert_eq!(ds.dimension_size("t"), Some(0));

    for format in [ReferenceFormat::Nested, ReferenceFormat::Columnar] {
        for separator in [ChunkKeySeparator::Dot, ChunkKeySeparator::Slash] {
            let options = ReferenceOptions::default().with_chunk_key_separator(separator);
            assert_eq!(read(&ds.to_references(format, &options)).unwrap(), ds);
        }
    }

    let References::Columnar(table) =
        ds.to_references(ReferenceFormat::Columnar, &ReferenceOptions::default())
    else {
        panic!()
    };
    let paths: Vec<&str> = table
        .rows()
        .filter(|row| row.variable == "paths")
        .map(|row| row.path)
        .collect();
    assert_eq!(
        paths,
        vec!["path:base64:AAAA", "path:path:data.nc", "base64:AQEBAQEBAQE="]
    );
    let table = ReferenceTable::from_json_str(&table.to_json_string()).unwrap();
    assert_eq!(read(&table.into()).unwrap(), ds);
}

#[test]
fn kerchunk_references() {
    testing_logger::setup();
    let nested = NestedReferences::from_json_value(json!({
        "version": 1,
        "refs": {
            ".zgroup": "{\"zarr_format\": 2}",
            ".zmetadata": "{}",
            "lat/.zarray": "{\"zarr_format\": 2, \"shape\": [4], \"chunks\": [2], \"dtype\": \"<f8\", \"compressor\": null, \"fill_value\": null, \"order\": \"C\", \"filters\": null}",
            "lat/.zattrs": "{\"_ARRAY_DIMENSIONS\": [\"lat\"], \"units\": \"degrees_north\"}",
            "lat/0": ["data.nc", 100, 16],
            "lat/1": "raw bytes"
        }
    }))
    .unwrap();
    let ds = read(&nested.into()).unwrap();
    testing_logger::validate(|captured_logs| {
        assert_eq!(captured_logs.len(), 1);
        assert!(captured_logs[0].body.contains(".zmetadata"));
        assert_eq!(captured_logs[0].level, log::Level::Warn);
    });

    let lat = ds.variable("lat").unwrap();
    assert_eq!(lat.dimensions(), &["lat".to_string()]);
    assert_eq!(lat.attributes()["units"], json!("degrees_north"));
    let array = lat.array().as_manifest().unwrap();
    assert_eq!(
        array.manifest().entries(),
        &[
            Some(ChunkEntry::new("data.nc", 100, 16)),
            Some(ChunkEntry::new_inline(b"raw bytes".to_vec())),
        ]
    );
    assert_eq!(ds.dimension_size("lat"), Some(4));
}

fn zarray(shape: &[u64], chunks: &[u64], compressor: Value) -> Value {
    json!(json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": chunks,
        "dtype": "<f4",
        "compressor": compressor,
        "fill_value": 0,
        "order": "C",
        "filters": null
    })
    .to_string())
}

fn nested(refs: Value) -> References {
    NestedReferences::from_json_value(json!({"version": 1, "refs": refs}))
        .unwrap()
        .into()
}

#[test]
fn malformed_references() {
    let zattrs = json!("{\"_ARRAY_DIMENSIONS\": [\"x\"]}");

    let out_of_bounds = nested(json!({
        "a/.zarray": zarray(&[4], &[2], Value::Null),
        "a/.zattrs": zattrs,
        "a/2": ["data.nc", 0, 8],
    }));
    let Err(MalformedReferenceError::InvalidManifest { variable, source }) = read(&out_of_bounds)
    else {
        panic!("expected an invalid manifest")
    };
    assert_eq!(variable, "a");
    assert!(matches!(source, ShapeError::OutOfBounds { .. }));

    let wrong_dimensionality = nested(json!({
        "a/.zarray": zarray(&[4], &[2], Value::Null),
        "a/.zattrs": zattrs,
        "a/0.0": ["data.nc", 0, 8],
    }));
    assert!(matches!(
        read(&wrong_dimensionality),
        Err(MalformedReferenceError::InvalidManifest { .. })
    ));

    let unparseable = nested(json!({
        "a/.zarray": zarray(&[4], &[2], Value::Null),
        "a/.zattrs": zattrs,
        "a/x": ["data.nc", 0, 8],
    }));
    assert!(matches!(
        read(&unparseable),
        Err(MalformedReferenceError::InvalidManifest { .. })
    ));

    let missing_zarray = nested(json!({
        "a/0": ["data.nc", 0, 8],
    }));
    assert_eq!(
        read(&missing_zarray),
        Err(MalformedReferenceError::MissingArrayMetadata("a".to_string()))
    );

    let missing_dimensions = nested(json!({
        "a/.zarray": zarray(&[4], &[2], Value::Null),
    }));
    assert!(matches!(
        read(&missing_dimensions),
        Err(MalformedReferenceError::InvalidDimensions { .. })
    ));

    let whole_file = nested(json!({
        "a/.zarray": zarray(&[4], &[2], Value::Null),
        "a/.zattrs": zattrs,
        "a/0": ["data.nc"],
    }));
    assert!(matches!(
        read(&whole_file),
        Err(MalformedReferenceError::InvalidChunkReference { .. })
    ));
}

#[test]
fn duplicate_chunk_rows() {
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "a/.zarray".to_string(),
        serde_json::from_str(zarray(&[4], &[2], Value::Null).as_str().unwrap()).unwrap(),
    );
    metadata.insert("a/.zattrs".to_string(), json!({"_ARRAY_DIMENSIONS": ["x"]}));
    let table = ReferenceTable::from_columns(
        metadata,
        vec!["a".to_string(), "a".to_string()],
        vec!["1".to_string(), "1".to_string()],
        vec!["data.nc".to_string(), "data.nc".to_string()],
        vec![0, 8],
        vec![8, 8],
    )
    .unwrap();
    let Err(MalformedReferenceError::InvalidManifest { source, .. }) = read(&table.into()) else {
        panic!("expected an invalid manifest")
    };
    assert_eq!(source, ShapeError::Duplicate(vec![1]));
}

#[test]
fn unknown_codec() {
    let refs = nested(json!({
        "a/.zarray": zarray(&[4], &[2], json!({"id": "my_codec", "level": 3})),
        "a/.zattrs": "{\"_ARRAY_DIMENSIONS\": [\"x\"]}",
    }));
    assert_eq!(
        read(&refs),
        Err(MalformedReferenceError::UnknownCodec {
            variable: "a".to_string(),
            id: "my_codec".to_string()
        })
    );

    let mut registry = CodecRegistry::default();
    registry.register("my_codec");
    let ds = VirtualDataset::from_references(&refs, &registry).unwrap();
    let array = ds.variable("a").unwrap().array().as_manifest().unwrap();
    assert_eq!(
        array.encoding().compressor().map(MetadataV2::id),
        Some("my_codec")
    );

    assert!(matches!(
        VirtualDataset::from_references(&refs, &CodecRegistry::new()),
        Err(MalformedReferenceError::UnknownCodec { .. })
    ));
}
