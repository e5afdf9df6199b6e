//! Compressed-size budgets for layers.

use a3s_forge_core::config::LayerLimits;
use a3s_forge_core::error::{ForgeError, Result};

use super::layer::{LayerSet, PackedLayer};

/// Fail when a single layer is larger than `max_bytes` (equal passes).
pub fn check_layer(layer: &PackedLayer, max_bytes: u64) -> Result<()> {
    let actual = layer.compressed_size();
    if actual > max_bytes {
        return Err(ForgeError::BudgetExceeded {
            limit: max_bytes,
            actual,
            path: layer.source().map(|p| p.to_path_buf()),
        });
    }
    Ok(())
}

/// Fail when the inline layers together reach `max_bytes`.
///
/// External layers are not counted. The reported path is the layer whose
/// addition crossed the limit.
pub fn check_aggregate<'a, I>(layers: I, max_bytes: u64) -> Result<()>
where
    I: IntoIterator<Item = &'a PackedLayer>,
{
    let mut total: u64 = 0;
    let mut offender: Option<&PackedLayer> = None;
    for layer in layers.into_iter().filter(|l| l.is_inline()) {
        total = total.saturating_add(layer.compressed_size());
        if offender.is_none() && total >= max_bytes {
            offender = Some(layer);
        }
    }

    match offender {
        Some(layer) => Err(ForgeError::BudgetExceeded {
            limit: max_bytes,
            actual: total,
            path: layer.source().map(|p| p.to_path_buf()),
        }),
        None => Ok(()),
    }
}

/// Budget checks bound to a set of limits.
#[derive(Debug, Clone, Default)]
pub struct LayerBudget {
    limits: LayerLimits,
}

impl LayerBudget {
    pub fn new(limits: LayerLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LayerLimits {
        &self.limits
    }

    /// Check the build-context layer.
    pub fn check_context(&self, layer: &PackedLayer) -> Result<()> {
        check_layer(layer, self.limits.context)
    }

    /// Check one container config layer.
    pub fn check_layer(&self, layer: &PackedLayer) -> Result<()> {
        check_layer(layer, self.limits.layer)
    }

    /// Check the inline total of all layers carried by one request.
    pub fn check_request<'a, I>(&self, layers: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a PackedLayer>,
    {
        check_aggregate(layers, self.limits.aggregate)
    }

    /// Check the inline total of a layer set.
    pub fn check_set(&self, set: &LayerSet) -> Result<()> {
        check_aggregate(set.layers(), self.limits.aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn layer(name: &str, size: usize) -> PackedLayer {
        PackedLayer::from_streams(Path::new(name), b"", vec![0u8; size])
    }

    #[test]
    fn test_check_layer_at_limit() {
        assert!(check_layer(&layer("l", 1024), 1024).is_ok());
    }

    #[test]
    fn test_check_layer_one_byte_over() {
        let err = check_layer(&layer("layers/app", 1025), 1024).unwrap_err();
        match err {
            ForgeError::BudgetExceeded {
                limit,
                actual,
                path,
            } => {
                assert_eq!(limit, 1024);
                assert_eq!(actual, 1025);
                assert_eq!(path, Some(PathBuf::from("layers/app")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_aggregate_just_under() {
        let layers = vec![layer("a", 400), layer("b", 599)];
        assert!(check_aggregate(&layers, 1000).is_ok());
    }

    #[test]
    fn test_aggregate_at_limit_fails() {
        let layers = vec![layer("a", 400), layer("b", 600)];
        let err = check_aggregate(&layers, 1000).unwrap_err();
        assert!(matches!(
            err,
            ForgeError::BudgetExceeded { limit: 1000, actual: 1000, .. }
        ));
    }

    #[test]
    fn test_aggregate_crossing_names_offender() {
        // every layer fits on its own
        let layers = vec![layer("a", 300), layer("b", 300), layer("c", 300), layer("d", 300)];
        for l in &layers {
            assert!(check_layer(l, 500).is_ok());
        }
        let err = check_aggregate(&layers, 1000).unwrap_err();
        match err {
            ForgeError::BudgetExceeded { actual, path, .. } => {
                assert_eq!(actual, 1200);
                assert_eq!(path, Some(PathBuf::from("d")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_aggregate_ignores_external_layers() {
        let layers = vec![
            layer("a", 900),
            PackedLayer::external("https://x/l.tgz", "sha256:a", 50_000_000, "sha256:b"),
        ];
        assert!(check_aggregate(&layers, 1000).is_ok());
    }

    #[test]
    fn test_budget_uses_limits() {
        let budget = LayerBudget::new(LayerLimits {
            context: 100,
            layer: 10,
            aggregate: 50,
        });
        let ctx = layer("ctx", 60);
        assert!(budget.check_context(&ctx).is_ok());
        assert!(budget.check_layer(&ctx).is_err());

        let mut set = LayerSet::new();
        set.push(layer("a", 10));
        set.push(layer("b", 10));
        assert!(budget.check_set(&set).is_ok());
        assert!(budget.check_request(set.iter().chain(std::iter::once(&ctx))).is_err());
    }
}
