//! Dictionaries: data both sides agree on in advance, used as history for the first block.

use std::fs;
use std::path::Path;

use log::info;

use crate::compression::format::MAX_BLOCK_SIZE;
use crate::error::{Error, Result};

/// Load a dictionary file. Only the last [`MAX_BLOCK_SIZE`] bytes can be reached by a match,
/// so only those are kept.
pub fn load_dictionary(path: &Path) -> Result<Vec<u8>> {
    let mut data = fs::read(path)
        .map_err(|e| Error::Dictionary(format!("{}: {}", path.display(), e)))?;
    let keep = dictionary_tail(&data).len();
    data.drain(..data.len() - keep);
    info!(
        "Loaded {} byte dictionary from {}",
        data.len(),
        path.display()
    );
    Ok(data)
}

/// The part of a dictionary that serves as history.
pub fn dictionary_tail(dictionary: &[u8]) -> &[u8] {
    &dictionary[dictionary.len().saturating_sub(MAX_BLOCK_SIZE)..]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tail_is_capped() {
        let big = vec![1_u8; MAX_BLOCK_SIZE + 10];
        assert_eq!(dictionary_tail(&big).len(), MAX_BLOCK_SIZE);
        assert_eq!(dictionary_tail(b"abc"), b"abc");
    }

    #[test]
    fn missing_file() {
        let err = load_dictionary(Path::new("/nonexistent/lzsa/dictionary")).unwrap_err();
        assert!(matches!(err, Error::Dictionary(_)));
    }

    #[test]
    fn load_keeps_the_end() {
        let path = std::env::temp_dir().join(format!("lzsa-dict-{}", std::process::id()));
        let mut data = vec![0_u8; 10];
        data.extend(std::iter::repeat(7).take(MAX_BLOCK_SIZE));
        fs::write(&path, &data).unwrap();
        let loaded = load_dictionary(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.len(), MAX_BLOCK_SIZE);
        assert!(loaded.iter().all(|&b| b == 7));
    }
}
