use xswap_core::AssetId;

use crate::error::RoutingError;

/// Route from `input` to `output`.
///
/// Direct when either side is the bridge asset, otherwise two hops through it.
pub fn route(
    input: AssetId,
    output: AssetId,
    bridge: AssetId,
) -> Result<Vec<AssetId>, RoutingError> {
    if input == output {
        return Err(RoutingError::IdenticalAssets(input));
    }
    if input == bridge || output == bridge {
        Ok(vec![input, output])
    } else {
        Ok(vec![input, bridge, output])
    }
}

/// A path needs at least two assets and no hop from an asset to itself.
pub fn validate_path(path: &[AssetId]) -> Result<(), RoutingError> {
    if path.len() < 2 {
        return Err(RoutingError::InvalidPath {
            reason: format!("path needs at least 2 assets, got {}", path.len()),
        });
    }
    if let Some(hop) = path.windows(2).find(|hop| hop[0] == hop[1]) {
        return Err(RoutingError::InvalidPath {
            reason: format!("hop from {} to itself", hop[0]),
        });
    }
    Ok(())
}
