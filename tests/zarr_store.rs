//! Zarr facade integration tests.
//!
//! End-to-end coverage of the read facade: metadata synthesis and
//! memoisation, chunk reads including zero-padded edges and off-image
//! chunks, pyramid levels, and multi-file plane filtering.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use ome_tiff_zarr::dtype::ArrayDtype;
use ome_tiff_zarr::error::IoError;
use ome_tiff_zarr::io::{CancelToken, MemorySource};
use ome_tiff_zarr::tiff::{
    base_image_tags, encode_tiff, IfdBuilder, Tag, TagValue, TiffFormat,
};
use ome_tiff_zarr::write::{
    write_ome_tiff, AxisDescriptor, DatasetTransform, MultiscaleImage, Multiscales, PlaneReader,
    WriteOptions,
};
use ome_tiff_zarr::ZarrStore;

// =============================================================================
// Helpers
// =============================================================================

fn linear_image(width: u32, height: u32) -> Vec<u8> {
    (0..width as usize * height as usize)
        .map(|i| (i % 256) as u8)
        .collect()
}

/// Serves planes filled with `level*100 + c*10 + t`.
struct FillPlanes {
    level_dims: Vec<(u64, u64)>,
}

#[async_trait]
impl PlaneReader for FillPlanes {
    async fn read_plane(
        &self,
        level: usize,
        c: usize,
        _z: usize,
        t: usize,
        _cancel: &CancelToken,
    ) -> Result<Bytes, IoError> {
        let (w, h) = self.level_dims[level];
        let fill = (level * 100 + c * 10 + t) as u8;
        Ok(Bytes::from(vec![fill; (w * h) as usize]))
    }
}

/// Serves one exact byte buffer for level 0.
struct StaticPlane {
    bytes: Bytes,
}

#[async_trait]
impl PlaneReader for StaticPlane {
    async fn read_plane(
        &self,
        _level: usize,
        _c: usize,
        _z: usize,
        _t: usize,
        _cancel: &CancelToken,
    ) -> Result<Bytes, IoError> {
        Ok(self.bytes.clone())
    }
}

fn flat_multiscales(width: u64, height: u64) -> Multiscales {
    Multiscales {
        name: Some("facade".into()),
        axes: vec![
            AxisDescriptor::space("y", Some("micrometer".into())),
            AxisDescriptor::space("x", Some("micrometer".into())),
        ],
        images: vec![MultiscaleImage {
            dimension_names: vec!["y".into(), "x".into()],
            shape: vec![height, width],
            dtype: ArrayDtype::Uint8,
        }],
        datasets: vec![DatasetTransform {
            path: "0".into(),
            scale: vec![0.5, 0.5],
            translation: None,
        }],
        channels: Vec::new(),
    }
}

async fn open_flat_store(width: u32, height: u32, tile: u32) -> ZarrStore<MemorySource> {
    let bytes = linear_image(width, height);
    let ms = flat_multiscales(width as u64, height as u64);
    let options = WriteOptions {
        tile_size: tile,
        ..WriteOptions::default()
    };
    let file = write_ome_tiff(
        &ms,
        Arc::new(StaticPlane {
            bytes: Bytes::from(bytes),
        }),
        options,
    )
    .await
    .unwrap();
    ZarrStore::open(MemorySource::new(file)).await.unwrap()
}

// =============================================================================
// Flat image chunks (S6)
// =============================================================================

#[tokio::test]
async fn full_image_chunk() {
    let store = open_flat_store(64, 64, 64).await;
    assert_eq!(store.level_count(), 1);
    assert_eq!(store.dimensions(), (64, 64));

    let chunk = store.get("0/c/0/0").await.unwrap().unwrap();
    assert_eq!(chunk.len(), 4096);
    assert_eq!(&chunk[..], &linear_image(64, 64)[..]);
}

#[tokio::test]
async fn off_image_chunk_is_all_zero() {
    let store = open_flat_store(64, 64, 64).await;
    let chunk = store.get("0/c/2/0").await.unwrap().unwrap();
    assert_eq!(chunk.len(), 4096);
    assert!(chunk.iter().all(|&b| b == 0));
}

#[tokio::test]
async fn edge_chunk_is_zero_padded() {
    // 100x60 with 64px tiles: chunk shape [60, 64], x-chunk 1 spans
    // columns 64..100, so 36 data columns and 28 padding columns.
    let store = open_flat_store(100, 60, 64).await;
    let image = linear_image(100, 60);

    let chunk = store.get("0/c/0/1").await.unwrap().unwrap();
    assert_eq!(chunk.len(), 60 * 64);

    for row in 0..60usize {
        let data = &chunk[row * 64..row * 64 + 36];
        let expected = &image[row * 100 + 64..row * 100 + 100];
        assert_eq!(data, expected, "row {row} data");
        assert!(
            chunk[row * 64 + 36..(row + 1) * 64].iter().all(|&b| b == 0),
            "row {row} padding"
        );
    }
}

#[tokio::test]
async fn unrecognised_keys_are_missing_not_errors() {
    let store = open_flat_store(16, 16, 16).await;
    for key in [
        "nope",
        "zarr.yaml",
        "x/zarr.json",
        "0/c",
        "0/c/a/b",
        "0/c/0",       // wrong index count for a 2D store
        "0/c/0/0/0",   // wrong index count for a 2D store
        "1/zarr.json", // out-of-range level
        "1/c/0/0",
    ] {
        assert!(
            store.get(key).await.unwrap().is_none(),
            "key {key:?} must be a miss"
        );
    }

    // A leading slash is accepted.
    assert!(store.get("/zarr.json").await.unwrap().is_some());
}

// =============================================================================
// Metadata documents
// =============================================================================

#[tokio::test]
async fn root_document_shape() {
    let store = open_flat_store(64, 48, 16).await;
    let doc = store.get("zarr.json").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&doc).unwrap();

    assert_eq!(json["zarr_format"], 3);
    assert_eq!(json["node_type"], "group");

    let ome = &json["attributes"]["ome"];
    assert_eq!(ome["version"], "0.5");

    let multiscale = &ome["multiscales"][0];
    assert_eq!(multiscale["name"], "facade");
    let axes = multiscale["axes"].as_array().unwrap();
    assert_eq!(axes.len(), 2);
    assert_eq!(axes[0]["name"], "y");
    assert_eq!(axes[0]["type"], "space");
    assert_eq!(axes[0]["unit"], "micrometer");
    assert_eq!(axes[1]["name"], "x");

    let transform = &multiscale["datasets"][0]["coordinateTransformations"][0];
    assert_eq!(transform["type"], "scale");
    assert_eq!(transform["scale"], serde_json::json!([0.5, 0.5]));

    // Display hints: single channel defaults to white.
    assert_eq!(ome["omero"]["channels"][0]["color"], "FFFFFF");
}

#[tokio::test]
async fn array_document_shape() {
    let store = open_flat_store(100, 60, 64).await;
    let doc = store.get("0/zarr.json").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&doc).unwrap();

    assert_eq!(json["zarr_format"], 3);
    assert_eq!(json["node_type"], "array");
    assert_eq!(json["shape"], serde_json::json!([60, 100]));
    assert_eq!(json["data_type"], "uint8");
    assert_eq!(
        json["chunk_grid"]["configuration"]["chunk_shape"],
        serde_json::json!([60, 64])
    );
    assert_eq!(json["chunk_key_encoding"]["configuration"]["separator"], "/");
    assert_eq!(json["fill_value"], 0);
    assert_eq!(json["codecs"][0]["name"], "bytes");
    assert_eq!(json["codecs"][0]["configuration"]["endian"], "little");
    assert_eq!(json["dimension_names"], serde_json::json!(["y", "x"]));

    // Shape and chunk shape are parallel to the dimension names and
    // strictly positive.
    let shape = json["shape"].as_array().unwrap();
    let chunks = json["chunk_grid"]["configuration"]["chunk_shape"]
        .as_array()
        .unwrap();
    let names = json["dimension_names"].as_array().unwrap();
    assert_eq!(shape.len(), names.len());
    assert_eq!(chunks.len(), names.len());
    assert!(shape.iter().all(|v| v.as_u64().unwrap() > 0));
    assert!(chunks.iter().all(|v| v.as_u64().unwrap() > 0));
}

#[tokio::test]
async fn metadata_documents_are_memoised() {
    let store = open_flat_store(32, 32, 16).await;
    let a = store.get("zarr.json").await.unwrap().unwrap();
    let b = store.get("zarr.json").await.unwrap().unwrap();
    assert_eq!(a, b);

    let a = store.get("0/zarr.json").await.unwrap().unwrap();
    let b = store.get("0/zarr.json").await.unwrap().unwrap();
    assert_eq!(a, b);
}

// =============================================================================
// Pyramids and channels
// =============================================================================

async fn open_pyramid_store() -> ZarrStore<MemorySource> {
    let level_dims = vec![(32u64, 32u64), (16, 16)];
    let ms = Multiscales {
        name: Some("pyramid".into()),
        axes: vec![
            AxisDescriptor::channel("c"),
            AxisDescriptor::space("y", Some("micrometer".into())),
            AxisDescriptor::space("x", Some("micrometer".into())),
        ],
        images: level_dims
            .iter()
            .map(|&(w, h)| MultiscaleImage {
                dimension_names: vec!["c".into(), "y".into(), "x".into()],
                shape: vec![2, h, w],
                dtype: ArrayDtype::Uint8,
            })
            .collect(),
        datasets: vec![
            DatasetTransform {
                path: "0".into(),
                scale: vec![1.0, 0.25, 0.25],
                translation: None,
            },
            DatasetTransform {
                path: "1".into(),
                scale: vec![1.0, 0.5, 0.5],
                translation: None,
            },
        ],
        channels: Vec::new(),
    };

    let options = WriteOptions {
        tile_size: 16,
        ..WriteOptions::default()
    };
    let file = write_ome_tiff(&ms, Arc::new(FillPlanes { level_dims }), options)
        .await
        .unwrap();
    ZarrStore::open(MemorySource::new(file)).await.unwrap()
}

#[tokio::test]
async fn pyramid_levels_and_scales() {
    let store = open_pyramid_store().await;
    assert_eq!(store.level_count(), 2);
    assert!(store.pyramid().uses_sub_ifds);
    assert_eq!(store.pyramid().widths, vec![32, 16]);

    let doc = store.get("zarr.json").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&doc).unwrap();
    let datasets = json["attributes"]["ome"]["multiscales"][0]["datasets"]
        .as_array()
        .unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0]["path"], "0");
    assert_eq!(datasets[1]["path"], "1");

    // Level 1 spatial scale doubles: physical 0.25 times downsample 2.
    assert_eq!(
        datasets[0]["coordinateTransformations"][0]["scale"],
        serde_json::json!([1.0, 0.25, 0.25])
    );
    assert_eq!(
        datasets[1]["coordinateTransformations"][0]["scale"],
        serde_json::json!([1.0, 0.5, 0.5])
    );

    let doc = store.get("1/zarr.json").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&doc).unwrap();
    assert_eq!(json["shape"], serde_json::json!([2, 16, 16]));
    assert_eq!(
        json["chunk_grid"]["configuration"]["chunk_shape"],
        serde_json::json!([1, 16, 16])
    );

    // Past-the-end level document is a miss (S6).
    assert!(store.get("2/zarr.json").await.unwrap().is_none());
}

#[tokio::test]
async fn pyramid_chunks_resolve_through_sub_ifds() {
    let store = open_pyramid_store().await;

    // Level 0, channel 1, tile (0, 0): fill is c*10.
    let chunk = store.get("0/c/1/0/0").await.unwrap().unwrap();
    assert_eq!(chunk.len(), 16 * 16);
    assert!(chunk.iter().all(|&b| b == 10));

    // Level 1, channel 0: fill is level*100.
    let chunk = store.get("1/c/0/0/0").await.unwrap().unwrap();
    assert_eq!(chunk.len(), 16 * 16);
    assert!(chunk.iter().all(|&b| b == 100));

    // Channel index past SizeC is a miss.
    assert!(store.get("0/c/2/0/0").await.unwrap().is_none());
}

// =============================================================================
// Multi-file filtering (S5)
// =============================================================================

fn multi_file_xml() -> String {
    let mut tiff_data = String::new();
    for t in 0..20 {
        tiff_data.push_str(&format!(
            r#"<TiffData FirstC="0" FirstZ="0" FirstT="{t}" IFD="{t}" PlaneCount="1"><UUID FileName="local.ome.tif">urn:uuid:aaaa</UUID></TiffData>"#
        ));
        tiff_data.push_str(&format!(
            r#"<TiffData FirstC="1" FirstZ="0" FirstT="{t}" IFD="{t}" PlaneCount="1"><UUID FileName="remote.ome.tif">urn:uuid:bbbb</UUID></TiffData>"#
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <OME xmlns=\"http://www.openmicroscopy.org/Schemas/OME/2016-06\" UUID=\"urn:uuid:aaaa\">\
         <Image ID=\"Image:0\" Name=\"split\">\
         <Pixels ID=\"Pixels:0\" Type=\"uint8\" SizeX=\"4\" SizeY=\"4\" SizeZ=\"1\" SizeC=\"2\" SizeT=\"20\" \
         DimensionOrder=\"XYCZT\" BigEndian=\"false\">{tiff_data}</Pixels></Image></OME>"
    )
}

/// One file of a two-file set: 20 timepoint planes of channel 0.
fn multi_file_tiff() -> Vec<u8> {
    let mut ifds = Vec::new();
    for t in 0..20u8 {
        let mut ifd = IfdBuilder::new();
        ifd.tags = base_image_tags(4, 4, ArrayDtype::Uint8);
        ifd.set(Tag::RowsPerStrip, TagValue::Long(4));
        if t == 0 {
            ifd.set(Tag::ImageDescription, TagValue::Ascii(multi_file_xml()));
        }
        ifd.chunks = vec![vec![t; 16]];
        ifds.push(ifd);
    }
    encode_tiff(ifds, TiffFormat::Classic).unwrap()
}

#[tokio::test]
async fn multi_file_planes_are_filtered() {
    let store = ZarrStore::open(MemorySource::new(multi_file_tiff()))
        .await
        .unwrap();

    // The remote channel is filtered out: one channel, twenty
    // timepoints remain.
    let pixels = store.pixels();
    assert_eq!(pixels.size_c, 1);
    assert_eq!(pixels.size_z, 1);
    assert_eq!(pixels.size_t, 20);
    assert_eq!(pixels.channels.len(), 1);
    assert_eq!(pixels.channels[0].id, "Channel:0:0");

    // Axes: t, y, x (c collapsed to 1).
    let doc = store.get("0/zarr.json").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&doc).unwrap();
    assert_eq!(json["dimension_names"], serde_json::json!(["t", "y", "x"]));
    assert_eq!(json["shape"], serde_json::json!([20, 4, 4]));

    // Each timepoint resolves to its IFD through the explicit map.
    for t in [0usize, 5, 19] {
        let chunk = store.get(&format!("0/c/{t}/0/0")).await.unwrap().unwrap();
        assert_eq!(chunk.len(), 16);
        assert!(chunk.iter().all(|&b| b == t as u8), "timepoint {t}");
    }

    // Timepoints past the filtered range are misses.
    assert!(store.get("0/c/20/0/0").await.unwrap().is_none());
}

// =============================================================================
// Plain TIFF without OME-XML
// =============================================================================

#[tokio::test]
async fn plain_tiff_serves_as_flat_image() {
    let mut ifd = IfdBuilder::new();
    ifd.tags = base_image_tags(8, 8, ArrayDtype::Uint16);
    ifd.set(Tag::RowsPerStrip, TagValue::Long(8));
    ifd.chunks = vec![(0u16..64).flat_map(|v| v.to_le_bytes()).collect()];
    let file = encode_tiff(vec![ifd], TiffFormat::Classic).unwrap();

    let store = ZarrStore::open(MemorySource::new(file)).await.unwrap();
    assert_eq!(store.level_count(), 1);
    assert_eq!(store.dimensions(), (8, 8));

    let doc = store.get("0/zarr.json").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&doc).unwrap();
    assert_eq!(json["data_type"], "uint16");
    assert_eq!(json["dimension_names"], serde_json::json!(["y", "x"]));

    let chunk = store.get("0/c/0/0").await.unwrap().unwrap();
    assert_eq!(chunk.len(), 128);
    let expected: Vec<u8> = (0u16..64).flat_map(|v| v.to_le_bytes()).collect();
    assert_eq!(&chunk[..], &expected[..]);
}
