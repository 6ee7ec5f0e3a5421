//! `navdispatch decode` / `navdispatch encode`.

use anyhow::Context;
use navdispatch_core::LaunchDescriptor;
use navdispatch_core::codec;
use std::io::Read;

/// Descriptor JSON for `url`, or `null` when it is not a descriptor URL.
pub fn decode(url: &str) -> anyhow::Result<String> {
    let descriptor = codec::decode(url);
    if descriptor.is_none() {
        tracing::debug!(%url, "not a descriptor url");
    }
    Ok(serde_json::to_string_pretty(&descriptor)?)
}

pub fn encode_json(json: &str) -> anyhow::Result<String> {
    let descriptor: LaunchDescriptor =
        serde_json::from_str(json).context("parsing descriptor json")?;
    Ok(codec::encode(&descriptor))
}

pub fn encode_stdin() -> anyhow::Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading descriptor json from stdin")?;
    encode_json(&input)
}
