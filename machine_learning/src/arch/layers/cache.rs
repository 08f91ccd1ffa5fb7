use super::{
    affine::AffineCache, batch_norm::BatchNormCache, dropout::DropoutCache,
    layer_norm::LayerNormCache, relu::ReluCache,
};

/// The cache of one primitive of a fully-connected stack.
///
/// A forward pass pushes one `Cache` per primitive it runs; the backward pass
/// pops them in reverse and dispatches on the variant.
#[derive(Debug, Clone)]
pub enum Cache {
    Affine(AffineCache),
    BatchNorm(BatchNormCache),
    LayerNorm(LayerNormCache),
    Relu(ReluCache),
    Dropout(DropoutCache),
}

impl From<AffineCache> for Cache {
    fn from(cache: AffineCache) -> Self {
        Cache::Affine(cache)
    }
}

impl From<BatchNormCache> for Cache {
    fn from(cache: BatchNormCache) -> Self {
        Cache::BatchNorm(cache)
    }
}

impl From<LayerNormCache> for Cache {
    fn from(cache: LayerNormCache) -> Self {
        Cache::LayerNorm(cache)
    }
}

impl From<ReluCache> for Cache {
    fn from(cache: ReluCache) -> Self {
        Cache::Relu(cache)
    }
}

impl From<DropoutCache> for Cache {
    fn from(cache: DropoutCache) -> Self {
        Cache::Dropout(cache)
    }
}
