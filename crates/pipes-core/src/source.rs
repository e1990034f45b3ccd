use crate::attrs::AttrDict;
use crate::elem::DataType;

/// An output port of a `Tool`. A tool may own several sources (`FileInput`
/// creates one per chunk it finds plus an `orphans` catch-all); each is
/// addressed from elsewhere in the graph only through a `SourceHandle`,
/// never by reference, so the owning tool stays free to move or mutate it.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub name: String,
    pub attrs: AttrDict,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Source {
            name: name.into(),
            attrs: AttrDict::new(),
        }
    }
}

/// Reads the `dimensions` attribute: the dimension-string in canonical
/// fast-to-slow order, e.g. `"xyzt"`.
pub fn get_source_dims(src: &Source) -> &str {
    src.attrs.get_string("dimensions")
}

pub fn set_source_dims(src: &mut Source, dims: &str) {
    src.attrs.define("dimensions", dims);
}

/// Reads the `extent.<dim>` attribute for a single dimension character.
pub fn get_source_dim_extent(src: &Source, dim: char) -> i64 {
    let key = format!("extent.{dim}");
    src.attrs
        .get_string(&key)
        .parse()
        .unwrap_or_else(|_| panic!("attribute {key} is not an integer"))
}

pub fn set_source_dim_extent(src: &mut Source, dim: char, extent: i64) {
    src.attrs.define(format!("extent.{dim}"), extent.to_string());
}

pub fn get_source_datatype(src: &Source) -> DataType {
    let s = src.attrs.get_string("datatype");
    DataType::parse(s).unwrap_or_else(|| panic!("unrecognized datatype attribute {s}"))
}

pub fn set_source_datatype(src: &mut Source, ty: DataType) {
    src.attrs.define("datatype", ty.as_str());
}

/// Splits a dimension string around `dim` into the block size of
/// everything faster than `dim` (`fast_blksize`, the stride between
/// consecutive `dim` steps) and the block size of everything slower
/// (`slow_blksize`, the stride between repeats of the whole `dim` axis).
///
/// For `dims = "xyzt"` and `dim = 'y'` with extents x=2,y=3,z=4,t=5:
/// `fast_blksize = 2`, `slow_blksize = 4*5 = 20`.
pub fn calc_source_block_sizes(src: &Source, dim: char) -> (i64, i64) {
    let dims = get_source_dims(src).to_string();
    let pos = dims
        .find(dim)
        .unwrap_or_else(|| panic!("dimension {dim} not present in dims {dims}"));
    let mut fast = 1i64;
    for c in dims[..pos].chars() {
        fast *= get_source_dim_extent(src, c);
    }
    let mut slow = 1i64;
    for c in dims[pos + 1..].chars() {
        slow *= get_source_dim_extent(src, c);
    }
    (fast, slow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(dims: &str, extents: &[i64]) -> Source {
        let mut s = Source::new("images");
        set_source_dims(&mut s, dims);
        for (c, e) in dims.chars().zip(extents) {
            set_source_dim_extent(&mut s, c, *e);
        }
        s
    }

    #[test]
    fn block_sizes_split_around_dim() {
        let s = make("xyzt", &[2, 3, 4, 5]);
        assert_eq!(calc_source_block_sizes(&s, 'y'), (2, 20));
        assert_eq!(calc_source_block_sizes(&s, 'x'), (1, 60));
        assert_eq!(calc_source_block_sizes(&s, 't'), (24, 1));
    }
}
