use cera_api::{
    CeraComputePipelineDef, CeraDeviceContext, CeraPipeline, CeraResult, CeraRootSignature,
    CeraRootSignatureDef,
};
use fnv::{FnvHashMap, FnvHasher};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

// Hash of a pipeline object's definition
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CeraPipelineHash(u64);

impl CeraPipelineHash {
    pub fn from_key<KeyT: Hash>(key: &KeyT) -> CeraPipelineHash {
        let mut hasher = FnvHasher::default();
        key.hash(&mut hasher);
        CeraPipelineHash(hasher.finish())
    }
}

/// A root signature and the hash of the definition it was created from. Pipelines are cached
/// per root signature, so they are created from this rather than a bare `CeraRootSignature`.
#[derive(Clone, Debug)]
pub struct CeraCachedRootSignature {
    root_signature: CeraRootSignature,
    hash: CeraPipelineHash,
}

impl CeraCachedRootSignature {
    pub fn root_signature(&self) -> &CeraRootSignature {
        &self.root_signature
    }

    pub fn hash(&self) -> CeraPipelineHash {
        self.hash
    }
}

struct CachedComputePipeline {
    root_signature_hash: CeraPipelineHash,
    compute_shader_bytecode: Vec<u8>,
    pipeline: Arc<CeraPipeline>,
}

#[derive(Default)]
struct CeraPipelineCacheInner {
    root_signatures: FnvHashMap<CeraPipelineHash, (CeraRootSignatureDef, CeraCachedRootSignature)>,
    compute_pipelines: FnvHashMap<CeraPipelineHash, CachedComputePipeline>,
}

/// Creates root signatures and compute pipelines, returning the existing object when an identical
/// definition was seen before. Cached objects live as long as the cache.
pub struct CeraPipelineCache {
    device_context: CeraDeviceContext,
    inner: Mutex<CeraPipelineCacheInner>,
}

impl CeraPipelineCache {
    pub fn new(device_context: &CeraDeviceContext) -> Self {
        CeraPipelineCache {
            device_context: device_context.clone(),
            inner: Default::default(),
        }
    }

    pub fn get_or_create_root_signature(
        &self,
        root_signature_def: &CeraRootSignatureDef,
    ) -> CeraResult<CeraCachedRootSignature> {
        let hash = CeraPipelineHash::from_key(root_signature_def);
        let mut inner = self.inner.lock().unwrap();
        if let Some((cached_def, cached)) = inner.root_signatures.get(&hash) {
            if cached_def == root_signature_def {
                return Ok(cached.clone());
            }

            log::warn!("Root signature hash collision {:?}, creating uncached", hash);
            let root_signature = self.device_context.create_root_signature(root_signature_def)?;
            return Ok(CeraCachedRootSignature {
                root_signature,
                hash,
            });
        }

        log::trace!(
            "Creating root signature {:?} ({} byte blob)",
            hash,
            root_signature_def.serialized_root_signature.len()
        );
        let root_signature = self.device_context.create_root_signature(root_signature_def)?;
        let cached = CeraCachedRootSignature {
            root_signature,
            hash,
        };
        inner
            .root_signatures
            .insert(hash, (root_signature_def.clone(), cached.clone()));
        Ok(cached)
    }

    pub fn get_or_create_compute_pipeline(
        &self,
        root_signature: &CeraCachedRootSignature,
        compute_shader_bytecode: &[u8],
    ) -> CeraResult<Arc<CeraPipeline>> {
        let hash = CeraPipelineHash::from_key(&(root_signature.hash, compute_shader_bytecode));
        let mut inner = self.inner.lock().unwrap();
        let create = || {
            self.device_context
                .create_compute_pipeline(&CeraComputePipelineDef {
                    root_signature: &root_signature.root_signature,
                    compute_shader_bytecode,
                })
                .map(Arc::new)
        };

        if let Some(cached) = inner.compute_pipelines.get(&hash) {
            if cached.root_signature_hash == root_signature.hash
                && cached.compute_shader_bytecode == compute_shader_bytecode
            {
                return Ok(cached.pipeline.clone());
            }

            log::warn!("Compute pipeline hash collision {:?}, creating uncached", hash);
            return create();
        }

        log::trace!("Creating compute pipeline {:?}", hash);
        let pipeline = create()?;
        inner.compute_pipelines.insert(
            hash,
            CachedComputePipeline {
                root_signature_hash: root_signature.hash,
                compute_shader_bytecode: compute_shader_bytecode.to_vec(),
                pipeline: pipeline.clone(),
            },
        );
        Ok(pipeline)
    }

    pub fn root_signature_count(&self) -> usize {
        self.inner.lock().unwrap().root_signatures.len()
    }

    pub fn compute_pipeline_count(&self) -> usize {
        self.inner.lock().unwrap().compute_pipelines.len()
    }

    /// Forget every cached object. Objects still referenced elsewhere stay alive.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.root_signatures.clear();
        inner.compute_pipelines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cera_api::CeraApi;

    #[test]
    fn test_identical_definitions_are_shared() {
        let api = CeraApi::new_null(&Default::default(), &Default::default()).unwrap();
        let cache = CeraPipelineCache::new(&api.device_context());

        let def_a = CeraRootSignatureDef {
            serialized_root_signature: vec![1, 2, 3, 4],
        };
        let def_b = CeraRootSignatureDef {
            serialized_root_signature: vec![5, 6, 7, 8],
        };
        let a = cache.get_or_create_root_signature(&def_a).unwrap();
        let a_again = cache.get_or_create_root_signature(&def_a).unwrap();
        let b = cache.get_or_create_root_signature(&def_b).unwrap();
        assert_eq!(a.hash(), a_again.hash());
        assert_ne!(a.hash(), b.hash());
        assert_eq!(cache.root_signature_count(), 2);

        let p1 = cache.get_or_create_compute_pipeline(&a, &[0xAB; 16]).unwrap();
        let p2 = cache.get_or_create_compute_pipeline(&a, &[0xAB; 16]).unwrap();
        let p3 = cache.get_or_create_compute_pipeline(&b, &[0xAB; 16]).unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
        assert!(!Arc::ptr_eq(&p1, &p3));
        assert_eq!(cache.compute_pipeline_count(), 2);

        cache.clear();
        let p4 = cache.get_or_create_compute_pipeline(&a, &[0xAB; 16]).unwrap();
        assert!(!Arc::ptr_eq(&p1, &p4));
    }

    #[test]
    fn test_creation_errors_are_not_cached() {
        let api = CeraApi::new_null(&Default::default(), &Default::default()).unwrap();
        let cache = CeraPipelineCache::new(&api.device_context());

        let empty = CeraRootSignatureDef {
            serialized_root_signature: Vec::new(),
        };
        assert!(cache.get_or_create_root_signature(&empty).is_err());
        assert_eq!(cache.root_signature_count(), 0);

        let def = CeraRootSignatureDef {
            serialized_root_signature: vec![1],
        };
        let root_signature = cache.get_or_create_root_signature(&def).unwrap();
        assert!(cache
            .get_or_create_compute_pipeline(&root_signature, &[])
            .is_err());
        assert_eq!(cache.compute_pipeline_count(), 0);
    }
}
