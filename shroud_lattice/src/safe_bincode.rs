use bincode::{DefaultOptions, Options};
use serde::Deserialize;

use crate::{Params, Result};

/// Get the expected size of a type for safe bincode deserialization.
pub trait GetSize {
    /// The expected size under the given [`Params`].
    fn get_size(params: &Params) -> usize;

    /// Check if the given object is valid under the given [`Params`].
    fn check_is_valid(&self, params: &Params) -> Result<()>;
}

/// The bincode configuration [`deserialize`] expects. Serialize with these options when the
/// result will be read back through [`deserialize`].
pub fn options() -> impl Options {
    DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Serializes `value` with [`options`].
pub fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(options().serialize(value)?)
}

/// Safely deserialize the given buffer given a type
pub fn deserialize<'a, T: GetSize + Deserialize<'a>>(data: &'a [u8], params: &Params) -> Result<T> {
    let options = options().with_limit(T::get_size(params) as u64);

    let mut deserializer = bincode::Deserializer::from_slice(data, options);
    let result = T::deserialize(&mut deserializer)?;
    result.check_is_valid(params)?;

    Ok(result)
}
