use crate::dx12::CeraDeviceContextDx12;
use crate::{
    CeraComputePipelineDef, CeraError, CeraResult, CeraRootSignature, CeraRootSignatureDef,
};
use std::sync::Arc;

use super::d3d12;

#[derive(Debug)]
struct CeraRootSignatureDx12Inner {
    root_signature: d3d12::ID3D12RootSignature,
}

// ID3D12RootSignature is immutable once created
unsafe impl Send for CeraRootSignatureDx12Inner {}
unsafe impl Sync for CeraRootSignatureDx12Inner {}

#[derive(Clone, Debug)]
pub struct CeraRootSignatureDx12 {
    inner: Arc<CeraRootSignatureDx12Inner>,
}

impl CeraRootSignatureDx12 {
    pub fn new(
        device_context: &CeraDeviceContextDx12,
        root_signature_def: &CeraRootSignatureDef,
    ) -> CeraResult<CeraRootSignatureDx12> {
        if root_signature_def.serialized_root_signature.is_empty() {
            return Err(CeraError::ResourceCreationFailed(
                "Root signature blob is empty".to_string(),
            ));
        }

        let root_signature: d3d12::ID3D12RootSignature = unsafe {
            device_context
                .d3d12_device()
                .CreateRootSignature(0, &root_signature_def.serialized_root_signature)
        }
        .map_err(|e| {
            CeraError::ResourceCreationFailed(format!("CreateRootSignature failed: {:?}", e))
        })?;

        log::debug!("created root signature {:?}", root_signature);

        Ok(CeraRootSignatureDx12 {
            inner: Arc::new(CeraRootSignatureDx12Inner { root_signature }),
        })
    }

    pub fn dx12_root_signature(&self) -> &d3d12::ID3D12RootSignature {
        &self.inner.root_signature
    }
}

#[derive(Debug)]
pub struct CeraPipelineDx12 {
    root_signature: CeraRootSignature,
    pipeline: d3d12::ID3D12PipelineState,
}

// ID3D12PipelineState is immutable once created
unsafe impl Send for CeraPipelineDx12 {}
unsafe impl Sync for CeraPipelineDx12 {}

impl CeraPipelineDx12 {
    pub fn new(
        device_context: &CeraDeviceContextDx12,
        pipeline_def: &CeraComputePipelineDef,
    ) -> CeraResult<CeraPipelineDx12> {
        if pipeline_def.compute_shader_bytecode.is_empty() {
            return Err(CeraError::ResourceCreationFailed(
                "Compute shader bytecode is empty".to_string(),
            ));
        }

        let root_signature = pipeline_def
            .root_signature
            .dx12_root_signature()
            .ok_or(crate::device_context::BACKEND_MISMATCH)?;

        let pipeline_state_desc = d3d12::D3D12_COMPUTE_PIPELINE_STATE_DESC {
            pRootSignature: ::windows::core::ManuallyDrop::new(
                root_signature.dx12_root_signature(),
            ),
            CS: d3d12::D3D12_SHADER_BYTECODE {
                pShaderBytecode: pipeline_def.compute_shader_bytecode.as_ptr() as _,
                BytecodeLength: pipeline_def.compute_shader_bytecode.len(),
            },
            CachedPSO: d3d12::D3D12_CACHED_PIPELINE_STATE::default(),
            Flags: d3d12::D3D12_PIPELINE_STATE_FLAG_NONE,
            NodeMask: 0,
        };

        let pipeline: d3d12::ID3D12PipelineState = unsafe {
            device_context
                .d3d12_device()
                .CreateComputePipelineState(&pipeline_state_desc)
        }
        .map_err(|e| {
            CeraError::ResourceCreationFailed(format!(
                "CreateComputePipelineState failed: {:?}",
                e
            ))
        })?;

        Ok(CeraPipelineDx12 {
            root_signature: pipeline_def.root_signature.clone(),
            pipeline,
        })
    }

    pub fn root_signature(&self) -> &CeraRootSignature {
        &self.root_signature
    }

    pub fn dx12_pipeline_state(&self) -> &d3d12::ID3D12PipelineState {
        &self.pipeline
    }
}
