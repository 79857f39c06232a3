#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraPipelineDx12;
use crate::null::CeraPipelineNull;
use crate::CeraRootSignature;

/// A compute pipeline state object
#[derive(Debug)]
pub enum CeraPipeline {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraPipelineDx12),
    Null(CeraPipelineNull),
}

impl CeraPipeline {
    pub fn root_signature(&self) -> &CeraRootSignature {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraPipeline::Dx12(inner) => inner.root_signature(),
            CeraPipeline::Null(inner) => inner.root_signature(),
        }
    }

    #[cfg(feature = "cera-dx12")]
    pub fn dx12_pipeline(&self) -> Option<&CeraPipelineDx12> {
        match self {
            CeraPipeline::Dx12(inner) => Some(inner),
            CeraPipeline::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_pipeline(&self) -> Option<&CeraPipelineNull> {
        match self {
            CeraPipeline::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
