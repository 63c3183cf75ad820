//! Zarr v3 store key parsing.
//!
//! The facade recognises exactly three key shapes (ASCII, `/`
//! separated, one optional leading `/`):
//!
//! - `zarr.json`: the root group document
//! - `{level}/zarr.json`: a per-level array document
//! - `{level}/c/{i0}/{i1}/...`: one chunk's bytes
//!
//! Anything else is a miss, reported as absence rather than an error.

/// A recognised store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKey {
    /// `zarr.json`
    RootMeta,

    /// `{level}/zarr.json`
    LevelMeta(usize),

    /// `{level}/c/{i0}/{i1}/...`
    Chunk { level: usize, indices: Vec<u64> },
}

/// Parse a store key, returning `None` for anything unrecognised.
pub fn parse_store_key(key: &str) -> Option<StoreKey> {
    let key = key.strip_prefix('/').unwrap_or(key);

    if key == "zarr.json" {
        return Some(StoreKey::RootMeta);
    }

    let (first, rest) = key.split_once('/')?;
    let level = parse_decimal(first)? as usize;

    if rest == "zarr.json" {
        return Some(StoreKey::LevelMeta(level));
    }

    let indices_part = rest.strip_prefix("c/")?;
    if indices_part.is_empty() {
        return None;
    }
    let indices: Option<Vec<u64>> = indices_part.split('/').map(parse_decimal).collect();
    Some(StoreKey::Chunk {
        level,
        indices: indices?,
    })
}

/// Strict decimal parse: non-empty, digits only.
fn parse_decimal(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_meta() {
        assert_eq!(parse_store_key("zarr.json"), Some(StoreKey::RootMeta));
        assert_eq!(parse_store_key("/zarr.json"), Some(StoreKey::RootMeta));
    }

    #[test]
    fn test_level_meta() {
        assert_eq!(parse_store_key("0/zarr.json"), Some(StoreKey::LevelMeta(0)));
        assert_eq!(
            parse_store_key("12/zarr.json"),
            Some(StoreKey::LevelMeta(12))
        );
        assert_eq!(
            parse_store_key("/3/zarr.json"),
            Some(StoreKey::LevelMeta(3))
        );
    }

    #[test]
    fn test_chunk_keys() {
        assert_eq!(
            parse_store_key("0/c/0/0"),
            Some(StoreKey::Chunk {
                level: 0,
                indices: vec![0, 0]
            })
        );
        assert_eq!(
            parse_store_key("1/c/3/0/7/2"),
            Some(StoreKey::Chunk {
                level: 1,
                indices: vec![3, 0, 7, 2]
            })
        );
    }

    #[test]
    fn test_rejects_malformed_keys() {
        for key in [
            "",
            "zarr.jsonx",
            "meta/zarr.json",
            "-1/zarr.json",
            "0x1/zarr.json",
            "1.5/zarr.json",
            "0/c",
            "0/c/",
            "0/c/a/b",
            "0/c/1//2",
            "0/chunks/0/0",
            "0/zarr.json/extra",
            "//zarr.json",
        ] {
            assert_eq!(parse_store_key(key), None, "key {key:?} must be rejected");
        }
    }
}
