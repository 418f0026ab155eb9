//! Asset format version understood by the loaders.

/// Major version of the JSON and binary asset formats. Documents with another major are
/// rejected.
pub const ASSET_FORMAT_MAJOR: u32 = 1;

/// Minor version written by current tooling. Older and newer minors load.
pub const ASSET_FORMAT_MINOR: u32 = 0;
