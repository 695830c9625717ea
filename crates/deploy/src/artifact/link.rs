//! Library linking for unlinked creation bytecode.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, Bytes, hex};
use serde::Deserialize;

/// Placeholder location inside the creation bytecode, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LinkOffset {
    pub start: usize,
    pub length: usize,
}

/// `source path -> library name -> placeholder offsets`, as emitted by solc.
pub type LinkReferences = BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>;

/// Bytecode after linking, with the libraries that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedBytecode {
    pub bytecode: Bytes,
    pub unlinked: Vec<String>,
}

/// Patch every library placeholder in `code` with its address from `libraries`.
///
/// Libraries absent from `libraries` are left zeroed and reported in
/// [`LinkedBytecode::unlinked`].
pub fn link_bytecode(
    code: &str,
    references: &LinkReferences,
    libraries: &BTreeMap<String, Address>,
) -> Result<LinkedBytecode, String> {
    let mut code = code.trim().trim_start_matches("0x").to_string();
    let mut unlinked = Vec::new();

    for (source, libs) in references {
        for (library, offsets) in libs {
            let replacement = match libraries.get(library) {
                Some(address) => hex::encode(address),
                None => {
                    unlinked.push(format!("{}:{}", source, library));
                    "0".repeat(40)
                }
            };

            for offset in offsets {
                if offset.length != 20 {
                    return Err(format!(
                        "link reference for {} has length {}, expected 20",
                        library, offset.length
                    ));
                }

                let start = offset.start * 2;
                let end = start + offset.length * 2;
                if end > code.len() || !code.is_char_boundary(start) || !code.is_char_boundary(end) {
                    return Err(format!(
                        "link reference for {} at byte {} is outside the bytecode",
                        library, offset.start
                    ));
                }
                code.replace_range(start..end, &replacement);
            }
        }
    }

    if code.contains("__") {
        return Err("bytecode contains library placeholders without link references".to_string());
    }

    let bytecode = hex::decode(&code).map_err(|e| format!("invalid bytecode hex: {}", e))?;

    Ok(LinkedBytecode {
        bytecode: Bytes::from(bytecode),
        unlinked,
    })
}
