#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraRootSignatureDx12;
use crate::null::CeraRootSignatureNull;

/// Describes the parameters a pipeline binds. Created from a serialized blob.
#[derive(Clone, Debug)]
pub enum CeraRootSignature {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraRootSignatureDx12),
    Null(CeraRootSignatureNull),
}

impl CeraRootSignature {
    #[cfg(feature = "cera-dx12")]
    pub fn dx12_root_signature(&self) -> Option<&CeraRootSignatureDx12> {
        match self {
            CeraRootSignature::Dx12(inner) => Some(inner),
            CeraRootSignature::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_root_signature(&self) -> Option<&CeraRootSignatureNull> {
        match self {
            CeraRootSignature::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
