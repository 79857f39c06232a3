use crate::null::CeraDeviceContextNull;
use crate::{
    CeraComputePipelineDef, CeraError, CeraResult, CeraRootSignature, CeraRootSignatureDef,
};
use std::sync::Arc;

#[derive(Debug)]
struct CeraRootSignatureNullInner {
    root_signature_id: u64,
    blob_size: usize,
}

#[derive(Clone, Debug)]
pub struct CeraRootSignatureNull {
    inner: Arc<CeraRootSignatureNullInner>,
}

impl CeraRootSignatureNull {
    pub fn new(
        device_context: &CeraDeviceContextNull,
        root_signature_def: &CeraRootSignatureDef,
    ) -> CeraResult<CeraRootSignatureNull> {
        if root_signature_def.serialized_root_signature.is_empty() {
            return Err(CeraError::ResourceCreationFailed(
                "Root signature blob is empty".to_string(),
            ));
        }

        Ok(CeraRootSignatureNull {
            inner: Arc::new(CeraRootSignatureNullInner {
                root_signature_id: device_context.next_object_id(),
                blob_size: root_signature_def.serialized_root_signature.len(),
            }),
        })
    }

    pub fn root_signature_id(&self) -> u64 {
        self.inner.root_signature_id
    }

    pub fn blob_size(&self) -> usize {
        self.inner.blob_size
    }
}

#[derive(Debug)]
pub struct CeraPipelineNull {
    pipeline_id: u64,
    root_signature: CeraRootSignature,
}

impl CeraPipelineNull {
    pub fn new(
        device_context: &CeraDeviceContextNull,
        compute_pipeline_def: &CeraComputePipelineDef,
    ) -> CeraResult<CeraPipelineNull> {
        if compute_pipeline_def.compute_shader_bytecode.is_empty() {
            return Err(CeraError::ResourceCreationFailed(
                "Compute shader bytecode is empty".to_string(),
            ));
        }

        if compute_pipeline_def
            .root_signature
            .null_root_signature()
            .is_none()
        {
            return Err("Root signature was not created by the null backend")?;
        }

        Ok(CeraPipelineNull {
            pipeline_id: device_context.next_object_id(),
            root_signature: compute_pipeline_def.root_signature.clone(),
        })
    }

    pub fn pipeline_id(&self) -> u64 {
        self.pipeline_id
    }

    pub fn root_signature(&self) -> &CeraRootSignature {
        &self.root_signature
    }
}
